use thiserror::Error;

/// Failures raised by the grid codec itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid codec configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid time signature {numerator}/{denominator}")]
    InvalidTimeSignature { numerator: u8, denominator: u8 },

    /// The grid handed to the decoder does not have the configured dimensions.
    #[error(
        "Grid shape mismatch: expected {expected_frames}x{expected_pitches}, got {frames}x{pitches}"
    )]
    ShapeMismatch {
        expected_frames: usize,
        expected_pitches: usize,
        frames: usize,
        pitches: usize,
    },

    /// A stored grid holds something other than `0` or `1`.
    #[error("Grid cell [{frame}][{pitch}] holds {value}, expected 0 or 1")]
    InvalidCell { frame: usize, pitch: usize, value: u8 },

    /// A note's frames would land outside the grid and the frame policy is `Reject`.
    #[error("Note {pitch} spans frames {frame_start}..{frame_end} but the grid only has {frames}")]
    EncodingRange {
        pitch: u8,
        frame_start: usize,
        frame_end: usize,
        frames: usize,
    },
}

/// Failures raised while assembling or reconstructing parts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Part '{part}' uses time signature {time_signature}, only 4/4 is supported")]
    UnsupportedTimeSignature { part: String, time_signature: String },

    #[error("Dataset was encoded with {dataset}, but the codec is configured for {codec}")]
    ConfigMismatch { dataset: String, codec: String },

    #[error(transparent)]
    Codec(#[from] CodecError),
}
