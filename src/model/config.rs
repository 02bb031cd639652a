use crate::error::CodecError;
use crate::model::pitch::PitchIndex;
use crate::util::{parse_frame_overflow, parse_pitch_overflow};
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_FRAMES_PER_MEASURE: usize = 36;
pub const DEFAULT_PITCH_RANGE: usize = 88;
pub const DEFAULT_PITCH_BASE_OFFSET: u8 = 20;

/// What the encoder does when a note's pitch has no column in the grid.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PitchOverflowPolicy {
    /// Drop just the offending note and keep encoding the measure.
    #[default]
    SkipNote,

    /// Stop encoding the measure at the first offending note, keeping what was written so far.
    AbortMeasure,
}

/// What the encoder does when a note's frames run past the end of the grid.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FrameOverflowPolicy {
    /// Cut the note off at the last frame of the measure.
    #[default]
    Clamp,

    /// Fail the measure with an `EncodingRange` error.
    Reject,
}

/// Settings shared by every encode and decode call over the same dataset.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CodecConfig {
    pub frames_per_measure: usize,
    pub pitch_range: usize,
    pub pitch_base_offset: u8,
    pub pitch_overflow: PitchOverflowPolicy,
    pub frame_overflow: FrameOverflowPolicy,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            frames_per_measure: DEFAULT_FRAMES_PER_MEASURE,
            pitch_range: DEFAULT_PITCH_RANGE,
            pitch_base_offset: DEFAULT_PITCH_BASE_OFFSET,
            pitch_overflow: PitchOverflowPolicy::default(),
            frame_overflow: FrameOverflowPolicy::default(),
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.frames_per_measure == 0 {
            return Err(CodecError::InvalidConfig(
                "frames_per_measure must be greater than 0".into(),
            ));
        }
        if self.pitch_range == 0 {
            return Err(CodecError::InvalidConfig(
                "pitch_range must be greater than 0".into(),
            ));
        }
        if self.pitch_base_offset as usize + self.pitch_range > 128 {
            return Err(CodecError::InvalidConfig(format!(
                "pitch_base_offset ({}) + pitch_range ({}) exceeds the 128 MIDI keys",
                self.pitch_base_offset, self.pitch_range
            )));
        }
        Ok(())
    }

    pub fn pitch_index(&self) -> PitchIndex {
        PitchIndex::new(self.pitch_base_offset, self.pitch_range)
    }

    pub fn shape(&self) -> GridShape {
        GridShape {
            frames_per_measure: self.frames_per_measure,
            pitch_range: self.pitch_range,
            pitch_base_offset: self.pitch_base_offset,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow!(
                "Failed to read codec config {}: {}",
                path.as_ref().display(),
                e
            )
        })?;
        serde_json::from_str(&text).map_err(|e| anyhow!("Failed to parse codec config: {}", e))
    }
}

/// The part of the configuration that is baked into a dataset's grids.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub frames_per_measure: usize,
    pub pitch_range: usize,
    pub pitch_base_offset: u8,
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames x {} pitches from MIDI {}",
            self.frames_per_measure, self.pitch_range, self.pitch_base_offset
        )
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "piano_roll",
    about = "Convert MIDI files to piano-roll datasets and back!"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// JSON file with codec settings. Command line flags take precedence over it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Frames per measure.
    #[arg(short, long, global = true)]
    pub frames: Option<usize>,

    /// Number of pitch columns in each grid.
    #[arg(long = "pitch-range", global = true)]
    pub pitch_range: Option<usize>,

    /// MIDI number of the lowest pitch column.
    #[arg(long = "pitch-offset", global = true)]
    pub pitch_offset: Option<u8>,

    /// What to do with notes outside the pitch range: skip|abort.
    #[arg(long = "pitch-overflow", global = true)]
    pub pitch_overflow: Option<String>,

    /// What to do with notes running past the end of a measure: clamp|reject.
    #[arg(long = "frame-overflow", global = true)]
    pub frame_overflow: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a MIDI file into a piano-roll dataset.
    Encode {
        /// Path to the source MIDI file.
        midi: PathBuf,

        /// Where to write the dataset.
        #[arg(short, long, default_value = "dataset.json")]
        output: PathBuf,

        /// Keep notes on the General MIDI percussion channel.
        #[arg(long, default_value_t = false)]
        keep_drums: bool,
    },

    /// Decode a piano-roll dataset back into a MIDI file.
    Decode {
        /// Path to the dataset.
        dataset: PathBuf,

        /// Where to write the MIDI file.
        #[arg(short, long, default_value = "decoded.mid")]
        output: PathBuf,

        /// Only decode the part at this (zero-based) position.
        #[arg(short, long)]
        part: Option<usize>,
    },

    /// Print a summary of a dataset and the first decoded events of each part.
    Inspect {
        /// Path to the dataset.
        dataset: PathBuf,

        /// Maximum events to print per part.
        #[arg(long, default_value_t = 16)]
        max_events: usize,
    },
}

impl Args {
    /// Resolves the codec configuration from defaults, the optional config file and flags.
    pub fn codec_config(&self) -> Result<CodecConfig> {
        let mut config = match &self.config {
            Some(path) => CodecConfig::load(path)?,
            None => CodecConfig::default(),
        };

        if let Some(frames) = self.frames {
            config.frames_per_measure = frames;
        }
        if let Some(range) = self.pitch_range {
            config.pitch_range = range;
        }
        if let Some(offset) = self.pitch_offset {
            config.pitch_base_offset = offset;
        }
        if let Some(policy) = &self.pitch_overflow {
            config.pitch_overflow = parse_pitch_overflow(policy);
        }
        if let Some(policy) = &self.frame_overflow {
            config.frame_overflow = parse_frame_overflow(policy);
        }

        config.validate()?;
        Ok(config)
    }
}
