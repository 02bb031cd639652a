use crate::codec::{FrameGrid, frames_per_beat};
use crate::error::CodecError;
use crate::model::config::{CodecConfig, FrameOverflowPolicy, PitchOverflowPolicy};
use crate::model::score::{NoteEvent, QuarterLength, TimeSignature};
use log::{debug, warn};
use num_traits::CheckedMul;

/// Quantizes one measure of note-events onto a `frames_per_measure` x `pitch_range` grid.
///
/// Events are processed in order. Onsets and lengths are floored to whole frames, so a note
/// shorter than one frame writes nothing. Pitches without a column and notes running past the
/// last frame are handled according to the config's overflow policies.
pub fn encode_measure(
    events: &[NoteEvent],
    time_signature: TimeSignature,
    config: &CodecConfig,
) -> Result<FrameGrid, CodecError> {
    config.validate()?;
    let frames_beat = frames_per_beat(config.frames_per_measure, time_signature)?;
    let pitch_index = config.pitch_index();
    let frames = config.frames_per_measure;

    let mut grid = FrameGrid::new(frames, config.pitch_range);

    for event in events.iter() {
        let Some(index) = pitch_index.to_index(event.pitch) else {
            match config.pitch_overflow {
                PitchOverflowPolicy::SkipNote => {
                    warn!(
                        "Dropping note {} as it is outside the pitch range [{}..{})..!",
                        event.pitch,
                        pitch_index.base_offset(),
                        pitch_index.base_offset() as usize + pitch_index.range()
                    );
                    continue;
                }
                PitchOverflowPolicy::AbortMeasure => {
                    warn!(
                        "Note {} is outside the pitch range, ignoring the rest of the measure..!",
                        event.pitch
                    );
                    break;
                }
            }
        };

        if event.offset < QuarterLength::from_integer(0) {
            debug!(
                "Skipping note {} with a negative offset {}..!",
                event.pitch, event.offset
            );
            continue;
        }

        let start = to_frames(event.offset, frames_beat);
        let span = if event.duration > QuarterLength::from_integer(0) {
            to_frames(event.duration, frames_beat)
        } else {
            Some(0)
        };
        if span.is_some_and(|span| span <= 0) {
            debug!(
                "Skipping note {} shorter than one frame (duration {})..!",
                event.pitch, event.duration
            );
            continue;
        }

        // `None` marks a boundary too large to represent, which is past the grid either way.
        let start = start.and_then(|start| usize::try_from(start).ok());
        let span = span.and_then(|span| usize::try_from(span).ok());
        let frame_end = start
            .zip(span)
            .and_then(|(start, span)| start.checked_add(span));
        let frame_start = start.unwrap_or(usize::MAX);

        let frame_end = match frame_end {
            Some(frame_end) if frame_end <= frames => frame_end,
            _ => match config.frame_overflow {
                FrameOverflowPolicy::Clamp => {
                    debug!(
                        "Clamping note {} starting at frame {} to the {} frame grid",
                        event.pitch, frame_start, frames
                    );
                    frames
                }
                FrameOverflowPolicy::Reject => {
                    return Err(CodecError::EncodingRange {
                        pitch: event.pitch,
                        frame_start,
                        frame_end: frame_end.unwrap_or(usize::MAX),
                        frames,
                    });
                }
            },
        };

        for frame in frame_start..frame_end {
            grid.set(frame, index, true);
        }
    }

    Ok(grid)
}

/// Floors `length * frames_beat` to whole frames, or `None` if the product overflows.
fn to_frames(length: QuarterLength, frames_beat: QuarterLength) -> Option<i64> {
    length
        .checked_mul(&frames_beat)
        .map(|frames| frames.floor().to_integer())
}

#[cfg(test)]
mod test {
    use super::*;

    fn ql(n: i64) -> QuarterLength {
        QuarterLength::from_integer(n)
    }

    fn tiny_config() -> CodecConfig {
        CodecConfig {
            frames_per_measure: 4,
            pitch_range: 4,
            pitch_base_offset: 20,
            ..Default::default()
        }
    }

    #[test]
    fn half_note_fills_two_frames() {
        env_logger::try_init().unwrap_or(());

        let events = [NoteEvent::new(21, ql(0), ql(2))];
        let grid = encode_measure(&events, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();

        assert_eq!(grid.column(1), vec![true, true, false, false]);
        assert_eq!(grid.active_cells(), 2);
    }

    #[test]
    fn sustain_past_barline_is_clamped() {
        env_logger::try_init().unwrap_or(());

        let events = [NoteEvent::new(20, ql(3), ql(2))];
        let grid = encode_measure(&events, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();

        assert_eq!(grid.column(0), vec![false, false, false, true]);
        assert_eq!(grid.active_cells(), 1);
    }

    #[test]
    fn onset_after_barline_writes_nothing() {
        env_logger::try_init().unwrap_or(());

        let events = [NoteEvent::new(20, ql(5), ql(1))];
        let grid = encode_measure(&events, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();

        assert!(grid.is_empty());
    }

    #[test]
    fn reject_policy_reports_range_error() {
        env_logger::try_init().unwrap_or(());

        let config = CodecConfig {
            frame_overflow: FrameOverflowPolicy::Reject,
            ..tiny_config()
        };
        let events = [NoteEvent::new(20, ql(3), ql(2))];

        assert_eq!(
            encode_measure(&events, TimeSignature::COMMON_TIME, &config),
            Err(CodecError::EncodingRange {
                pitch: 20,
                frame_start: 3,
                frame_end: 5,
                frames: 4,
            })
        );
    }

    #[test]
    fn out_of_range_pitch_writes_nothing() {
        env_logger::try_init().unwrap_or(());

        let events = [
            NoteEvent::new(24, ql(0), ql(1)),
            NoteEvent::new(19, ql(0), ql(1)),
            NoteEvent::new(127, ql(0), ql(1)),
        ];
        let grid = encode_measure(&events, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();

        assert!(grid.is_empty());
    }

    #[test]
    fn skip_and_abort_policies() {
        env_logger::try_init().unwrap_or(());

        let events = [
            NoteEvent::new(20, ql(0), ql(1)),
            NoteEvent::new(99, ql(1), ql(1)),
            NoteEvent::new(22, ql(2), ql(1)),
        ];

        let skipped = encode_measure(&events, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();
        assert!(skipped.get(0, 0));
        assert!(skipped.get(2, 2));

        let config = CodecConfig {
            pitch_overflow: PitchOverflowPolicy::AbortMeasure,
            ..tiny_config()
        };
        let aborted = encode_measure(&events, TimeSignature::COMMON_TIME, &config).unwrap();
        assert!(aborted.get(0, 0));
        assert!(!aborted.get(2, 2));
        assert_eq!(aborted.active_cells(), 1);
    }

    #[test]
    fn zero_length_notes_are_ignored() {
        env_logger::try_init().unwrap_or(());

        let events = [
            NoteEvent::new(20, ql(0), ql(0)),
            NoteEvent::new(21, ql(1), QuarterLength::new(1, 2)),
        ];
        let grid = encode_measure(&events, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();

        assert!(grid.is_empty());
    }

    #[test]
    fn default_resolution_uses_nine_frames_per_beat() {
        env_logger::try_init().unwrap_or(());

        // Middle C as a dotted eighth starting on the "and" of beat two.
        let events = [NoteEvent::new(
            60,
            QuarterLength::new(3, 2),
            QuarterLength::new(3, 4),
        )];
        let grid =
            encode_measure(&events, TimeSignature::COMMON_TIME, &CodecConfig::default()).unwrap();

        // frame_start = floor(1.5 * 9) = 13, span = floor(0.75 * 9) = 6
        let column = grid.column(40);
        assert_eq!(grid.active_cells(), 6);
        assert!(column[13..19].iter().all(|&cell| cell));
        assert!(!column[12] && !column[19]);
    }

    #[test]
    fn huge_lengths_fall_under_frame_policy() {
        env_logger::try_init().unwrap_or(());

        let common = TimeSignature::COMMON_TIME;
        let eight_frames = CodecConfig {
            frames_per_measure: 8,
            ..tiny_config()
        };
        // At nine and two frames per beat respectively, both products overflow an i64.
        let late = [NoteEvent::new(60, QuarterLength::from_integer(i64::MAX / 4), ql(1))];
        let endless = [NoteEvent::new(21, ql(2), QuarterLength::from_integer(i64::MAX))];

        let grid = encode_measure(&late, common, &CodecConfig::default()).unwrap();
        assert!(grid.is_empty());

        let grid = encode_measure(&endless, common, &eight_frames).unwrap();
        assert_eq!(
            grid.column(1),
            vec![false, false, false, false, true, true, true, true]
        );

        let reject = CodecConfig {
            frame_overflow: FrameOverflowPolicy::Reject,
            ..Default::default()
        };
        assert_eq!(
            encode_measure(&late, common, &reject),
            Err(CodecError::EncodingRange {
                pitch: 60,
                frame_start: usize::MAX,
                frame_end: usize::MAX,
                frames: 36,
            })
        );

        let reject = CodecConfig {
            frame_overflow: FrameOverflowPolicy::Reject,
            ..eight_frames
        };
        assert_eq!(
            encode_measure(&endless, common, &reject),
            Err(CodecError::EncodingRange {
                pitch: 21,
                frame_start: 4,
                frame_end: usize::MAX,
                frames: 8,
            })
        );

        let backwards = [NoteEvent::new(22, ql(0), QuarterLength::from_integer(i64::MIN / 2))];
        let grid = encode_measure(&backwards, common, &tiny_config()).unwrap();
        assert!(grid.is_empty());
    }

    #[test]
    fn uneven_frames_per_beat_are_floored() {
        env_logger::try_init().unwrap_or(());

        let config = CodecConfig {
            frames_per_measure: 10,
            ..tiny_config()
        };
        // 2.5 frames per beat: onset 1/2 -> frame 1, length 1 -> 2 frames.
        let events = [NoteEvent::new(
            20,
            QuarterLength::new(1, 2),
            QuarterLength::from_integer(1),
        )];
        let grid = encode_measure(&events, TimeSignature::COMMON_TIME, &config).unwrap();

        assert_eq!(
            grid.column(0),
            vec![false, true, true, false, false, false, false, false, false, false]
        );
    }
}
