use crate::{FrameOverflowPolicy, PitchOverflowPolicy};
use log::info;

pub fn parse_pitch_overflow(s: &str) -> PitchOverflowPolicy {
    match s.to_lowercase().as_str() {
        "s" | "skip" | "skip_note" | "skip-note" => PitchOverflowPolicy::SkipNote,
        "a" | "abort" | "abort_measure" | "abort-measure" => PitchOverflowPolicy::AbortMeasure,
        other => {
            info!("Unknown pitch overflow policy '{}', defaulting to `skip`..!", other);
            PitchOverflowPolicy::SkipNote
        }
    }
}

pub fn parse_frame_overflow(s: &str) -> FrameOverflowPolicy {
    match s.to_lowercase().as_str() {
        "c" | "clamp" => FrameOverflowPolicy::Clamp,
        "r" | "reject" => FrameOverflowPolicy::Reject,
        other => {
            info!("Unknown frame overflow policy '{}', defaulting to `clamp`..!", other);
            FrameOverflowPolicy::Clamp
        }
    }
}
