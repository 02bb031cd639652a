use crate::model::score::*;
use anyhow::{Result, anyhow};
use log::{debug, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const DEFAULT_MPQN: u32 = 500_000;
const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;
/// General MIDI percussion lives on channel 10 (index 9).
const DRUM_CHANNEL: u8 = 9;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Keep notes on the General MIDI percussion channel.
    pub keep_drums: bool,
}

#[derive(Debug, Clone, Copy)]
struct NoteInterval {
    pub midi: u8,
    pub start_tick: u64,
    pub end_tick: u64,
}

#[derive(Debug, Default)]
struct TrackNotes {
    name: Option<String>,
    intervals: Vec<NoteInterval>,
    open_notes: HashMap<(u8, u8), Vec<u64>>,
}

#[derive(Debug, Clone)]
struct Barline {
    start_tick: u64,
    end_tick: u64,
    time_signature: TimeSignature,
}

/// A value that changes over the course of the file, keyed by the tick it takes effect at.
#[derive(Debug)]
struct Timeline<T: Clone> {
    changes: Vec<(u64, T)>,
    initial: T,
}

impl<T: Clone> Timeline<T> {
    fn new(initial: T) -> Self {
        Self {
            changes: Vec::new(),
            initial,
        }
    }

    fn push(&mut self, tick: u64, value: T) {
        self.changes.push((tick, value));
    }

    fn sort(&mut self) {
        self.changes.sort_by_key(|(tick, _)| *tick);
    }

    fn at(&self, tick: u64) -> T {
        self.changes
            .iter()
            .rfind(|(start, _)| *start <= tick)
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| self.initial.clone())
    }

    fn last_tick(&self) -> u64 {
        self.changes.iter().map(|(tick, _)| *tick).max().unwrap_or(0)
    }
}

pub fn import_midi_file<P: AsRef<Path>>(path: P, options: &ImportOptions) -> Result<Score> {
    let bytes = fs::read(path.as_ref()).map_err(|e| {
        anyhow!(
            "Failed to read MIDI file {}: {}",
            path.as_ref().display(),
            e
        )
    })?;

    midi_bytes_to_score(&bytes, path.as_ref(), options)
}

/// Parses a Standard MIDI File into parts of measures, one part per track that holds notes.
pub fn midi_bytes_to_score(
    bytes: &[u8],
    source_path: &Path,
    options: &ImportOptions,
) -> Result<Score> {
    let smf = Smf::parse(bytes).map_err(|e| anyhow!("Failed to parse MIDI: {:?}", e))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(t) => t.as_int() as u64,
        Timing::Timecode(_fps, _subframe) => {
            return Err(anyhow!(
                "SMPTE timecode midi timing is not currently supported..!"
            ));
        }
    };
    if ticks_per_quarter == 0 {
        return Err(anyhow!("MIDI header declares 0 ticks per quarter note..!"));
    }

    debug!("Ticks per quarter note: {}", ticks_per_quarter);
    debug!(
        "MIDI format: {:?}, tracks: {}",
        smf.header.format,
        smf.tracks.len()
    );

    let mut tempos: Timeline<u32> = Timeline::new(DEFAULT_MPQN);
    let mut time_signatures: Timeline<TimeSignature> = Timeline::new(TimeSignature::COMMON_TIME);
    let mut keys: Timeline<String> = Timeline::new(key_name(0, false));
    let mut tracks: Vec<TrackNotes> = Vec::with_capacity(smf.tracks.len());
    let mut dropped_drums = 0usize;

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut notes = TrackNotes::default();
        let mut abs_tick: u64 = 0;

        for event in track.iter() {
            abs_tick = abs_tick.saturating_add(event.delta.as_int() as u64);

            match &event.kind {
                TrackEventKind::Meta(meta) => match meta {
                    MetaMessage::Tempo(micro) => {
                        let mpqn: u32 = micro.as_int();
                        if mpqn == 0 {
                            warn!("Ignoring zero tempo at tick {}..!", abs_tick);
                            continue;
                        }
                        tempos.push(abs_tick, mpqn);
                        debug!(
                            "Tempo change at tick {} -> {} us/qn (track {})",
                            abs_tick, mpqn, track_idx
                        );
                    }
                    MetaMessage::TimeSignature(numerator, denominator_pow, _, _) => {
                        let denominator = 1u8.checked_shl(*denominator_pow as u32).unwrap_or(0);
                        match TimeSignature::new(*numerator, denominator) {
                            Ok(ts) => {
                                debug!("Time signature {} at tick {}", ts, abs_tick);
                                time_signatures.push(abs_tick, ts);
                            }
                            Err(why) => {
                                warn!("Ignoring time signature at tick {}: {}..!", abs_tick, why)
                            }
                        }
                    }
                    MetaMessage::KeySignature(sharps, minor) => {
                        let key = key_name(*sharps, *minor);
                        debug!("Key signature {} at tick {}", key, abs_tick);
                        keys.push(abs_tick, key);
                    }
                    MetaMessage::TrackName(bytes) | MetaMessage::InstrumentName(bytes) => {
                        if notes.name.is_none() {
                            let name = String::from_utf8_lossy(bytes).trim().to_string();
                            if !name.is_empty() {
                                debug!("Track {} name: {}", track_idx, name);
                                notes.name = Some(name);
                            }
                        }
                    }
                    _ => {}
                },
                TrackEventKind::Midi { channel, message } => {
                    let ch: u8 = channel.as_int();

                    match message {
                        MidiMessage::NoteOn { key, vel } => {
                            if ch == DRUM_CHANNEL && !options.keep_drums {
                                dropped_drums += 1;
                                continue;
                            }

                            if vel.as_int() == 0 {
                                close_note(&mut notes, ch, key.as_int(), abs_tick);
                            } else {
                                notes
                                    .open_notes
                                    .entry((ch, key.as_int()))
                                    .or_default()
                                    .push(abs_tick);
                            }
                        }
                        MidiMessage::NoteOff { key, vel: _ } => {
                            if ch == DRUM_CHANNEL && !options.keep_drums {
                                continue;
                            }
                            close_note(&mut notes, ch, key.as_int(), abs_tick);
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        tracks.push(notes);
    }

    if dropped_drums > 0 {
        debug!("Dropped {} percussion note(s)..!", dropped_drums);
    }

    tempos.sort();
    time_signatures.sort();
    keys.sort();

    let last_tick_estimate = tracks
        .iter()
        .flat_map(|track| track.intervals.iter().map(|interval| interval.end_tick))
        .max()
        .unwrap_or(0)
        .max(tempos.last_tick());

    for track in tracks.iter_mut() {
        for ((ch, key), stack) in std::mem::take(&mut track.open_notes).into_iter() {
            for start_tick in stack {
                let end_tick = if last_tick_estimate > start_tick {
                    last_tick_estimate
                } else {
                    start_tick + ticks_per_quarter
                };

                track.intervals.push(NoteInterval {
                    midi: key,
                    start_tick,
                    end_tick,
                });

                warn!(
                    "Unclosed NoteOn for {}, channel: {} at tick: {} auto-closing at: {}..!",
                    key, ch, start_tick, end_tick
                );
            }
        }
    }

    let end_tick = tracks
        .iter()
        .flat_map(|track| track.intervals.iter().map(|interval| interval.end_tick))
        .max()
        .unwrap_or(0);
    let barlines = barlines(end_tick, ticks_per_quarter, &time_signatures);
    debug!("Cutting {} tick(s) into {} measure(s)", end_tick, barlines.len());

    let mut parts: Vec<SourcePart> = Vec::new();
    for (track_idx, track) in tracks.into_iter().enumerate() {
        if track.intervals.is_empty() {
            continue;
        }

        let measures = barlines
            .iter()
            .map(|barline| SourceMeasure {
                key: keys.at(barline.start_tick),
                tempo: bpm(tempos.at(barline.start_tick)),
                time_signature: barline.time_signature,
                elements: measure_elements(&track.intervals, barline, ticks_per_quarter),
            })
            .collect();

        parts.push(SourcePart {
            instrument_name: track
                .name
                .unwrap_or_else(|| format!("Track {}", track_idx)),
            key: keys.at(0),
            tempo: bpm(tempos.at(0)),
            time_signature: time_signatures.at(0),
            measures,
        });
    }

    Ok(Score {
        title: source_path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string()),
        parts,
    })
}

fn bpm(mpqn: u32) -> f64 {
    MICROSECONDS_PER_MINUTE / (mpqn as f64)
}

fn close_note(track: &mut TrackNotes, ch: u8, midi_num: u8, abs_tick: u64) {
    match track
        .open_notes
        .get_mut(&(ch, midi_num))
        .and_then(|stack| stack.pop())
    {
        Some(start_tick) => {
            if abs_tick > start_tick {
                track.intervals.push(NoteInterval {
                    midi: midi_num,
                    start_tick,
                    end_tick: abs_tick,
                });
            } else {
                debug!(
                    "Skipping zero-length note {} ch{} at tick {}..!",
                    midi_num, ch, abs_tick
                );
            }
        }
        None => {
            debug!(
                "Orphaned NoteOff for {} ch{} at tick {}..!",
                midi_num, ch, abs_tick
            );
        }
    }
}

/// Measures covering `[0, end_tick)`, each as long as the time signature at its downbeat says.
fn barlines(
    end_tick: u64,
    ticks_per_quarter: u64,
    time_signatures: &Timeline<TimeSignature>,
) -> Vec<Barline> {
    let mut barlines = Vec::new();
    let mut tick = 0u64;

    while tick < end_tick {
        let time_signature = time_signatures.at(tick);
        let length = (ticks_per_quarter * 4 * time_signature.numerator as u64
            / time_signature.denominator as u64)
            .max(1);

        barlines.push(Barline {
            start_tick: tick,
            end_tick: tick + length,
            time_signature,
        });
        tick += length;
    }

    barlines
}

/// The portion of every interval sounding inside `barline`, with notes that share an onset and
/// length grouped into chords.
fn measure_elements(
    intervals: &[NoteInterval],
    barline: &Barline,
    ticks_per_quarter: u64,
) -> Vec<SourceElement> {
    let to_quarters = |ticks: u64| QuarterLength::new(ticks as i64, ticks_per_quarter as i64);

    let mut pieces: Vec<(u64, u64, u8)> = intervals
        .iter()
        .filter(|interval| {
            interval.start_tick < barline.end_tick && interval.end_tick > barline.start_tick
        })
        .map(|interval| {
            let start = interval.start_tick.max(barline.start_tick);
            let end = interval.end_tick.min(barline.end_tick);
            (start - barline.start_tick, end - start, interval.midi)
        })
        .collect();
    pieces.sort_unstable();
    pieces.dedup();

    let mut elements: Vec<SourceElement> = Vec::new();
    for group in pieces.chunk_by(|a, b| a.0 == b.0 && a.1 == b.1) {
        let offset = to_quarters(group[0].0);
        let duration = to_quarters(group[0].1);

        if group.len() == 1 {
            elements.push(SourceElement::Note {
                pitch: group[0].2,
                offset,
                duration,
            });
        } else {
            elements.push(SourceElement::Chord {
                pitches: group.iter().map(|piece| piece.2).collect(),
                offset,
                duration,
            });
        }
    }

    elements
}
