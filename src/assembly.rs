use crate::codec::{decode_measure, encode_measure};
use crate::error::{AssemblyError, CodecError};
use crate::model::config::CodecConfig;
use crate::model::score::*;
use crate::renderer::Renderer;
use log::{debug, info, warn};
use rayon::prelude::*;

/// Encodes every measure of a part. Anything other than 4/4, at the part level or in any
/// measure, rejects the whole part.
pub fn encode_part(part: &SourcePart, config: &CodecConfig) -> Result<PartRecord, AssemblyError> {
    let unsupported = std::iter::once(part.time_signature)
        .chain(part.measures.iter().map(|measure| measure.time_signature))
        .find(|ts| !ts.is_common_time());

    if let Some(time_signature) = unsupported {
        return Err(AssemblyError::UnsupportedTimeSignature {
            part: part.instrument_name.clone(),
            time_signature: time_signature.to_string(),
        });
    }

    let measures = part
        .measures
        .par_iter()
        .map(|measure| {
            let grid = encode_measure(&measure.flatten(), measure.time_signature, config)?;
            Ok::<_, CodecError>(MeasureRecord {
                key: measure.key.clone(),
                tempo: measure.tempo,
                time_signature: measure.time_signature,
                grid,
            })
        })
        .collect::<Result<Vec<_>, CodecError>>()?;

    debug!(
        "Encoded part '{}' into {} measure(s)",
        part.instrument_name,
        measures.len()
    );

    Ok(PartRecord {
        instrument_name: part.instrument_name.clone(),
        key: part.key.clone(),
        tempo: part.tempo,
        time_signature: part.time_signature,
        measures,
    })
}

/// Encodes all parts in parallel, keeping score order. Parts that fail to encode are reported
/// and left out.
pub fn encode_score(score: &Score, config: &CodecConfig) -> Vec<PartRecord> {
    let total = score.parts.len();
    let results: Vec<Result<PartRecord, AssemblyError>> = score
        .parts
        .par_iter()
        .map(|part| encode_part(part, config))
        .collect();

    let mut parts = Vec::with_capacity(total);
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(part) => {
                info!(
                    "Encoded part {}/{} '{}' ({} measures)..!",
                    i + 1,
                    total,
                    part.instrument_name,
                    part.measures.len()
                );
                parts.push(part);
            }
            Err(why) => warn!("Omitting part {}/{}: {}..!", i + 1, total, why),
        }
    }

    parts
}

/// Decoded note-events for each measure of a part, in measure order.
pub fn decode_measures(
    part: &PartRecord,
    config: &CodecConfig,
) -> Result<Vec<Vec<NoteEvent>>, AssemblyError> {
    let measures = part
        .measures
        .par_iter()
        .map(|measure| decode_measure(&measure.grid, measure.time_signature, config))
        .collect::<Result<Vec<_>, CodecError>>()?;

    Ok(measures)
}

/// Decodes a part and hands its metadata and every measure's events to `renderer`.
pub fn decode_part<R: Renderer>(
    part: &PartRecord,
    config: &CodecConfig,
    renderer: &mut R,
) -> anyhow::Result<()> {
    let decoded = decode_measures(part, config)?;

    renderer.begin_part(part)?;
    for (index, (measure, events)) in part.measures.iter().zip(decoded.iter()).enumerate() {
        renderer.measure(index, measure, events)?;
    }
    renderer.finish_part()?;

    debug!(
        "Rendered part '{}' with {} event(s)",
        part.instrument_name,
        decoded.iter().map(|events| events.len()).sum::<usize>()
    );

    Ok(())
}
