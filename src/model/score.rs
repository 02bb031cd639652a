use crate::codec::FrameGrid;
use crate::error::CodecError;
use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Durations and offsets in quarter notes, kept exact so frame boundaries never drift.
pub type QuarterLength = Rational64;

/// A single sounding pitch inside one measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteEvent {
    /// Absolute MIDI pitch number.
    pub pitch: u8,
    /// Start time from the measure's downbeat.
    pub offset: QuarterLength,
    pub duration: QuarterLength,
}

impl NoteEvent {
    pub fn new(pitch: u8, offset: QuarterLength, duration: QuarterLength) -> Self {
        Self {
            pitch,
            offset,
            duration,
        }
    }

    pub fn end(&self) -> QuarterLength {
        self.offset + self.duration
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(into = "String", try_from = "String")]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub const COMMON_TIME: TimeSignature = TimeSignature {
        numerator: 4,
        denominator: 4,
    };

    pub fn new(numerator: u8, denominator: u8) -> Result<Self, CodecError> {
        if numerator == 0 || !denominator.is_power_of_two() {
            return Err(CodecError::InvalidTimeSignature {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn is_common_time(&self) -> bool {
        self.numerator == 4 && self.denominator == 4
    }

    /// Nominal measure length.
    pub fn measure_length(&self) -> QuarterLength {
        QuarterLength::new(self.numerator as i64 * 4, self.denominator as i64)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON_TIME
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for TimeSignature {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidTimeSignature {
            numerator: 0,
            denominator: 0,
        };
        let (numerator, denominator) = s.trim().split_once('/').ok_or_else(invalid)?;
        let numerator = numerator.trim().parse::<u8>().map_err(|_| invalid())?;
        let denominator = denominator.trim().parse::<u8>().map_err(|_| invalid())?;
        Self::new(numerator, denominator)
    }
}

impl From<TimeSignature> for String {
    fn from(ts: TimeSignature) -> Self {
        ts.to_string()
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = CodecError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

const MAJOR_TONICS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_TONICS: [&str; 15] = [
    "ab", "eb", "bb", "f", "c", "g", "d", "a", "e", "b", "f#", "c#", "g#", "d#", "a#",
];

/// Tonic name for a key signature, capitalized for major and lowercase for minor.
pub fn key_name(sharps: i8, minor: bool) -> String {
    let slot = (sharps.clamp(-7, 7) + 7) as usize;
    if minor {
        MINOR_TONICS[slot].to_string()
    } else {
        MAJOR_TONICS[slot].to_string()
    }
}

/// Inverse of [`key_name`]: `(sharps, minor)` for a tonic name, if it is one we know.
pub fn key_signature(name: &str) -> Option<(i8, bool)> {
    let name = name.trim();
    let minor = name.chars().next()?.is_lowercase();
    let tonics = if minor { &MINOR_TONICS } else { &MAJOR_TONICS };
    tonics
        .iter()
        .position(|tonic| *tonic == name)
        .map(|slot| (slot as i8 - 7, minor))
}

/// One encoded measure along with the metadata in effect at its downbeat.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MeasureRecord {
    pub key: String,
    pub tempo: f64,
    pub time_signature: TimeSignature,
    pub grid: FrameGrid,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PartRecord {
    pub instrument_name: String,
    pub key: String,
    pub tempo: f64,
    pub time_signature: TimeSignature,
    pub measures: Vec<MeasureRecord>,
}

/// Something sounding in a source measure, as the parser hands it over.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceElement {
    Note {
        pitch: u8,
        offset: QuarterLength,
        duration: QuarterLength,
    },
    Chord {
        pitches: Vec<u8>,
        offset: QuarterLength,
        duration: QuarterLength,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceMeasure {
    pub key: String,
    pub tempo: f64,
    pub time_signature: TimeSignature,
    pub elements: Vec<SourceElement>,
}

impl SourceMeasure {
    /// Single-pitch events in element order, chords expanded in pitch order.
    pub fn flatten(&self) -> Vec<NoteEvent> {
        let mut events = Vec::with_capacity(self.elements.len());
        for element in self.elements.iter() {
            match element {
                SourceElement::Note {
                    pitch,
                    offset,
                    duration,
                } => events.push(NoteEvent::new(*pitch, *offset, *duration)),
                SourceElement::Chord {
                    pitches,
                    offset,
                    duration,
                } => events.extend(
                    pitches
                        .iter()
                        .map(|pitch| NoteEvent::new(*pitch, *offset, *duration)),
                ),
            }
        }
        events
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcePart {
    pub instrument_name: String,
    pub key: String,
    pub tempo: f64,
    pub time_signature: TimeSignature,
    pub measures: Vec<SourceMeasure>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    pub title: Option<String>,
    pub parts: Vec<SourcePart>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn ql(n: i64, d: i64) -> QuarterLength {
        QuarterLength::new(n, d)
    }

    #[test]
    fn time_signature_text() {
        let ts: TimeSignature = "3/8".parse().unwrap();
        assert_eq!(ts, TimeSignature::new(3, 8).unwrap());
        assert_eq!(ts.to_string(), "3/8");
        assert_eq!(ts.measure_length(), ql(3, 2));
        assert!(!ts.is_common_time());

        assert!("4/3".parse::<TimeSignature>().is_err());
        assert!("0/4".parse::<TimeSignature>().is_err());
        assert!("four".parse::<TimeSignature>().is_err());
    }

    #[test]
    fn time_signature_serializes_as_string() {
        let json = serde_json::to_string(&TimeSignature::COMMON_TIME).unwrap();
        assert_eq!(json, "\"4/4\"");

        let back: TimeSignature = serde_json::from_str(&json).unwrap();
        assert!(back.is_common_time());
    }

    #[test]
    fn key_names() {
        assert_eq!(key_name(0, false), "C");
        assert_eq!(key_name(0, true), "a");
        assert_eq!(key_name(-2, false), "Bb");
        assert_eq!(key_name(3, true), "f#");

        assert_eq!(key_signature("C"), Some((0, false)));
        assert_eq!(key_signature("a"), Some((0, true)));
        assert_eq!(key_signature("Eb"), Some((-3, false)));
        assert_eq!(key_signature("H"), None);
        assert_eq!(key_signature(""), None);
    }

    #[test]
    fn flatten_expands_chords() {
        let measure = SourceMeasure {
            key: "C".into(),
            tempo: 120.0,
            time_signature: TimeSignature::COMMON_TIME,
            elements: vec![
                SourceElement::Chord {
                    pitches: vec![60, 64, 67],
                    offset: ql(0, 1),
                    duration: ql(1, 1),
                },
                SourceElement::Note {
                    pitch: 72,
                    offset: ql(1, 1),
                    duration: ql(1, 2),
                },
            ],
        };

        let events = measure.flatten();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], NoteEvent::new(60, ql(0, 1), ql(1, 1)));
        assert_eq!(events[2].pitch, 67);
        assert_eq!(events[3], NoteEvent::new(72, ql(1, 1), ql(1, 2)));
        assert_eq!(events[3].end(), ql(3, 2));
    }
}
