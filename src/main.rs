use anyhow::{Result, anyhow};
use clap::Parser;
use log::{debug, info, warn};
use piano_roll::{
    Args, Command, Dataset, ImportOptions, MidiRenderer, decode_measures, decode_part,
    encode_score, import_midi_file,
};

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.codec_config()?;
    debug!("Codec config: {:?}", config);

    match &args.command {
        Command::Encode {
            midi,
            output,
            keep_drums,
        } => {
            info!("Importing MIDI file: '{}'...", midi.display());
            let score = import_midi_file(
                midi,
                &ImportOptions {
                    keep_drums: *keep_drums,
                },
            )?;

            info!(
                "Encoding {} part(s) at {} frames per measure..!",
                score.parts.len(),
                config.frames_per_measure
            );
            let parts = encode_score(&score, &config);
            if parts.is_empty() {
                warn!("No parts could be encoded, the dataset will be empty..!");
            }

            let dataset = Dataset::new(&config, score.title.clone(), parts);
            dataset.save(output)?;
            info!(
                "Wrote {} part(s), {} measure(s) to '{}'..!",
                dataset.parts.len(),
                dataset.measure_count(),
                output.display()
            );
        }
        Command::Decode {
            dataset,
            output,
            part,
        } => {
            let dataset = Dataset::load(dataset)?;
            dataset.check_compatible(&config)?;

            let parts: Vec<_> = match part {
                Some(index) => vec![dataset.parts.get(*index).ok_or_else(|| {
                    anyhow!(
                        "Part {} does not exist, the dataset has {} part(s)..!",
                        index,
                        dataset.parts.len()
                    )
                })?],
                None => dataset.parts.iter().collect(),
            };

            let mut renderer = MidiRenderer::new();
            for part in parts {
                info!(
                    "Decoding part '{}' ({} measures)...",
                    part.instrument_name,
                    part.measures.len()
                );
                decode_part(part, &config, &mut renderer)?;
            }

            renderer.save(output)?;
            info!(
                "Saved {} track(s) to '{}'..!",
                renderer.track_count(),
                output.display()
            );
        }
        Command::Inspect {
            dataset,
            max_events,
        } => {
            let dataset = Dataset::load(dataset)?;
            dataset.check_compatible(&config)?;

            info!(
                "Dataset from '{}': {} | {} part(s)",
                dataset.source.as_deref().unwrap_or("<unknown>"),
                dataset.shape,
                dataset.parts.len()
            );

            for (i, part) in dataset.parts.iter().enumerate() {
                info!(
                    "Part {}: '{}' key={} tempo={:.2} time={} measures={}",
                    i,
                    part.instrument_name,
                    part.key,
                    part.tempo,
                    part.time_signature,
                    part.measures.len()
                );

                let measures = decode_measures(part, &config)?;
                let events = measures
                    .iter()
                    .enumerate()
                    .flat_map(|(m, events)| events.iter().map(move |event| (m, event)))
                    .take(*max_events);

                for (m, event) in events {
                    info!(
                        "  measure {:>4}: pitch={:>3} offset={} duration={}",
                        m, event.pitch, event.offset, event.duration
                    );
                }
            }
        }
    }

    Ok(())
}
