use crate::error::CodecError;
use crate::model::score::{QuarterLength, TimeSignature};

mod decoder;
mod encoder;
mod grid;

pub use decoder::decode_measure;
pub use encoder::encode_measure;
pub use grid::FrameGrid;

/// Frames per beat for a grid of `frames_per_measure` rows. Kept as an exact fraction so that
/// encoder and decoder floor the same boundaries when the division is uneven.
pub fn frames_per_beat(
    frames_per_measure: usize,
    time_signature: TimeSignature,
) -> Result<QuarterLength, CodecError> {
    if time_signature.numerator == 0 {
        return Err(CodecError::InvalidTimeSignature {
            numerator: time_signature.numerator,
            denominator: time_signature.denominator,
        });
    }
    Ok(QuarterLength::new(
        frames_per_measure as i64,
        time_signature.numerator as i64,
    ))
}
