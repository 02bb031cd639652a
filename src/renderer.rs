use crate::model::score::*;
use anyhow::{Result, anyhow, bail};
use log::{debug, warn};
use midly::num::{u4, u7, u15, u24, u28};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use std::fs;
use std::path::Path;

/// Receives decoded parts, one measure at a time.
pub trait Renderer {
    /// Called once per part before any of its measures, with the part's metadata.
    fn begin_part(&mut self, part: &PartRecord) -> Result<()>;

    /// Called for every measure in order, with its metadata and decoded events.
    fn measure(&mut self, index: usize, measure: &MeasureRecord, events: &[NoteEvent])
    -> Result<()>;

    fn finish_part(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Divisible by every frames-per-beat from 1 to 10, so quantized boundaries land on whole ticks.
pub const TICKS_PER_QUARTER: u16 = 2520;
const DEFAULT_VELOCITY: u8 = 80;
const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;
const DRUM_CHANNEL: u8 = 9;

// Variant order doubles as the order of events sharing a tick: meta first, releases before attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RenderedEvent {
    Tempo(u32),
    TimeSignature(u8, u8),
    KeySignature(i8, bool),
    NoteOff(u8),
    NoteOn(u8),
}

#[derive(Debug)]
struct RenderedTrack {
    name: String,
    channel: u8,
    measure_tick: u64,
    tempo: Option<f64>,
    time_signature: Option<TimeSignature>,
    key: Option<String>,
    events: Vec<(u64, RenderedEvent)>,
}

impl RenderedTrack {
    fn update_metadata(&mut self, key: &str, tempo: f64, time_signature: TimeSignature) {
        let tick = self.measure_tick;

        if self.tempo != Some(tempo) {
            if tempo > 0.0 {
                let mpqn = (MICROSECONDS_PER_MINUTE / tempo).round().clamp(1.0, 16_777_215.0);
                self.events.push((tick, RenderedEvent::Tempo(mpqn as u32)));
            } else {
                warn!("Ignoring non-positive tempo {}..!", tempo);
            }
            self.tempo = Some(tempo);
        }

        if self.time_signature != Some(time_signature) {
            self.events.push((
                tick,
                RenderedEvent::TimeSignature(
                    time_signature.numerator,
                    time_signature.denominator.trailing_zeros() as u8,
                ),
            ));
            self.time_signature = Some(time_signature);
        }

        if self.key.as_deref() != Some(key) {
            match key_signature(key) {
                Some((sharps, minor)) => self
                    .events
                    .push((tick, RenderedEvent::KeySignature(sharps, minor))),
                None => debug!("No key signature for '{}', leaving it out", key),
            }
            self.key = Some(key.to_string());
        }
    }
}

/// Collects decoded parts as tracks of a Standard MIDI File.
#[derive(Debug)]
pub struct MidiRenderer {
    tracks: Vec<RenderedTrack>,
    current: Option<RenderedTrack>,
}

impl Default for MidiRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiRenderer {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            current: None,
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn next_channel(&self) -> u8 {
        // Skip the percussion channel so pitched parts stay pitched.
        let channel = (self.tracks.len() % 15) as u8;
        if channel >= DRUM_CHANNEL { channel + 1 } else { channel }
    }

    fn quarters_to_ticks(quarters: QuarterLength) -> u64 {
        let ticks = (quarters * QuarterLength::from_integer(TICKS_PER_QUARTER as i64))
            .round()
            .to_integer();
        ticks.max(0) as u64
    }

    pub fn to_smf(&self) -> Smf<'_> {
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
        ));

        for rendered in self.tracks.iter() {
            let channel = u4::new(rendered.channel);
            let mut track: Track<'_> = vec![
                TrackEvent {
                    delta: u28::new(0),
                    kind: TrackEventKind::Meta(MetaMessage::TrackName(rendered.name.as_bytes())),
                },
                TrackEvent {
                    delta: u28::new(0),
                    kind: TrackEventKind::Meta(MetaMessage::InstrumentName(
                        rendered.name.as_bytes(),
                    )),
                },
            ];

            let mut events = rendered.events.clone();
            events.sort();

            let mut last_tick = 0u64;
            for (tick, event) in events.into_iter() {
                let delta = u28::new((tick - last_tick).min(0x0FFF_FFFF) as u32);
                last_tick = tick;

                let kind = match event {
                    RenderedEvent::Tempo(mpqn) => {
                        TrackEventKind::Meta(MetaMessage::Tempo(u24::new(mpqn)))
                    }
                    RenderedEvent::TimeSignature(numerator, denominator_pow) => {
                        TrackEventKind::Meta(MetaMessage::TimeSignature(
                            numerator,
                            denominator_pow,
                            24,
                            8,
                        ))
                    }
                    RenderedEvent::KeySignature(sharps, minor) => {
                        TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor))
                    }
                    RenderedEvent::NoteOn(key) => TrackEventKind::Midi {
                        channel,
                        message: MidiMessage::NoteOn {
                            key: u7::new(key),
                            vel: u7::new(DEFAULT_VELOCITY),
                        },
                    },
                    RenderedEvent::NoteOff(key) => TrackEventKind::Midi {
                        channel,
                        message: MidiMessage::NoteOff {
                            key: u7::new(key),
                            vel: u7::new(0),
                        },
                    },
                };

                track.push(TrackEvent { delta, kind });
            }

            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            });
            smf.tracks.push(track);
        }

        smf
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.current.is_some() {
            bail!("A part is still being rendered..!");
        }

        let mut buf = Vec::new();
        self.to_smf()
            .write(&mut buf)
            .map_err(|e| anyhow!("Failed to write MIDI: {:?}", e))?;
        Ok(buf)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path.as_ref(), &bytes).map_err(|e| {
            anyhow!(
                "Failed to write MIDI file {}: {}",
                path.as_ref().display(),
                e
            )
        })
    }
}

impl Renderer for MidiRenderer {
    fn begin_part(&mut self, part: &PartRecord) -> Result<()> {
        if self.current.is_some() {
            bail!("Part started before the previous one was finished..!");
        }

        let mut track = RenderedTrack {
            name: part.instrument_name.clone(),
            channel: self.next_channel(),
            measure_tick: 0,
            tempo: None,
            time_signature: None,
            key: None,
            events: Vec::new(),
        };
        track.update_metadata(&part.key, part.tempo, part.time_signature);

        self.current = Some(track);
        Ok(())
    }

    fn measure(
        &mut self,
        index: usize,
        measure: &MeasureRecord,
        events: &[NoteEvent],
    ) -> Result<()> {
        let Some(track) = self.current.as_mut() else {
            bail!("Measure {} rendered outside of a part..!", index);
        };

        track.update_metadata(&measure.key, measure.tempo, measure.time_signature);

        for event in events.iter() {
            if event.pitch > 127 {
                warn!("Dropping decoded pitch {} outside of MIDI range..!", event.pitch);
                continue;
            }

            let start = track.measure_tick + Self::quarters_to_ticks(event.offset);
            let end = track.measure_tick + Self::quarters_to_ticks(event.end());
            if end <= start {
                debug!(
                    "Skipping note {} in measure {} that rounds to zero ticks",
                    event.pitch, index
                );
                continue;
            }

            track.events.push((start, RenderedEvent::NoteOn(event.pitch)));
            track.events.push((end, RenderedEvent::NoteOff(event.pitch)));
        }

        track.measure_tick += Self::quarters_to_ticks(measure.time_signature.measure_length());
        Ok(())
    }

    fn finish_part(&mut self) -> Result<()> {
        let Some(track) = self.current.take() else {
            bail!("No part is being rendered..!");
        };

        debug!(
            "Finished track '{}' on channel {} with {} event(s)",
            track.name,
            track.channel,
            track.events.len()
        );
        self.tracks.push(track);
        Ok(())
    }
}
