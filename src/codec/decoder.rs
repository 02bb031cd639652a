use crate::codec::{FrameGrid, frames_per_beat};
use crate::error::CodecError;
use crate::model::config::CodecConfig;
use crate::model::pitch::PitchIndex;
use crate::model::score::{NoteEvent, QuarterLength, TimeSignature};

/// Run-length state for one pitch column, reset at every measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PitchState {
    Idle,
    Sounding { start_frame: usize, run_length: usize },
}

/// Reconstructs the note-events of one measure from its grid.
///
/// Every maximal run of active frames in a column becomes exactly one event. Runs still
/// sounding on the last frame are flushed after the scan with their full length. The result
/// is ordered by offset, then pitch.
pub fn decode_measure(
    grid: &FrameGrid,
    time_signature: TimeSignature,
    config: &CodecConfig,
) -> Result<Vec<NoteEvent>, CodecError> {
    config.validate()?;
    grid.check_shape(config.frames_per_measure, config.pitch_range)?;
    let frames_beat = frames_per_beat(config.frames_per_measure, time_signature)?;
    let pitch_index = config.pitch_index();

    let mut states = vec![PitchState::Idle; config.pitch_range];
    let mut events: Vec<NoteEvent> = Vec::new();

    let rows = (0..grid.frames()).map_while(|frame| grid.row(frame).map(|row| (frame, row)));
    for (frame, row) in rows {
        for (index, &active) in row.iter().enumerate() {
            states[index] = match (states[index], active) {
                (PitchState::Idle, false) => PitchState::Idle,
                (PitchState::Idle, true) => PitchState::Sounding {
                    start_frame: frame,
                    run_length: 1,
                },
                (
                    PitchState::Sounding {
                        start_frame,
                        run_length,
                    },
                    true,
                ) => PitchState::Sounding {
                    start_frame,
                    run_length: run_length + 1,
                },
                (
                    PitchState::Sounding {
                        start_frame,
                        run_length,
                    },
                    false,
                ) => {
                    events.push(run_to_event(
                        &pitch_index,
                        index,
                        start_frame,
                        run_length,
                        frames_beat,
                    ));
                    PitchState::Idle
                }
            };
        }
    }

    // Notes held through the barline never see an off frame.
    for (index, state) in states.into_iter().enumerate() {
        if let PitchState::Sounding {
            start_frame,
            run_length,
        } = state
        {
            events.push(run_to_event(
                &pitch_index,
                index,
                start_frame,
                run_length,
                frames_beat,
            ));
        }
    }

    events.sort_by(|a, b| a.offset.cmp(&b.offset).then_with(|| a.pitch.cmp(&b.pitch)));
    Ok(events)
}

fn run_to_event(
    pitch_index: &PitchIndex,
    index: usize,
    start_frame: usize,
    run_length: usize,
    frames_beat: QuarterLength,
) -> NoteEvent {
    NoteEvent::new(
        pitch_index.to_pitch(index),
        QuarterLength::from_integer(start_frame as i64) / frames_beat,
        QuarterLength::from_integer(run_length as i64) / frames_beat,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::encode_measure;
    use std::collections::HashSet;

    fn ql(n: i64, d: i64) -> QuarterLength {
        QuarterLength::new(n, d)
    }

    fn tiny_config() -> CodecConfig {
        CodecConfig {
            frames_per_measure: 4,
            pitch_range: 4,
            pitch_base_offset: 20,
            ..Default::default()
        }
    }

    fn grid_with_column(column: usize, cells: &[u8]) -> FrameGrid {
        let rows: Vec<Vec<u8>> = cells
            .iter()
            .map(|&cell| {
                let mut row = vec![0; 4];
                row[column] = cell;
                row
            })
            .collect();
        FrameGrid::from_rows(&rows).unwrap()
    }

    #[test]
    fn single_run_decodes_to_one_event() {
        env_logger::try_init().unwrap_or(());

        let grid = grid_with_column(1, &[1, 1, 0, 0]);
        let events = decode_measure(&grid, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();

        assert_eq!(events, vec![NoteEvent::new(21, ql(0, 1), ql(2, 1))]);
    }

    #[test]
    fn run_held_through_last_frame_is_flushed() {
        env_logger::try_init().unwrap_or(());

        let grid = grid_with_column(0, &[0, 0, 0, 1]);
        let events = decode_measure(&grid, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();

        assert_eq!(events, vec![NoteEvent::new(20, ql(3, 1), ql(1, 1))]);
    }

    #[test]
    fn whole_measure_run_keeps_full_length() {
        env_logger::try_init().unwrap_or(());

        let mut grid = grid_with_column(2, &[1, 1, 1, 1]);
        grid.set(2, 3, true);
        let events = decode_measure(&grid, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();

        assert_eq!(
            events,
            vec![
                NoteEvent::new(22, ql(0, 1), ql(4, 1)),
                NoteEvent::new(23, ql(2, 1), ql(1, 1)),
            ]
        );
    }

    #[test]
    fn separated_runs_stay_separate() {
        env_logger::try_init().unwrap_or(());

        let grid = grid_with_column(3, &[1, 0, 1, 1]);
        let events = decode_measure(&grid, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();

        assert_eq!(
            events,
            vec![
                NoteEvent::new(23, ql(0, 1), ql(1, 1)),
                NoteEvent::new(23, ql(2, 1), ql(2, 1)),
            ]
        );
    }

    #[test]
    fn events_are_ordered_by_offset_then_pitch() {
        env_logger::try_init().unwrap_or(());

        let rows = vec![vec![0, 0, 1, 0], vec![1, 0, 1, 1], vec![1, 1, 0, 1], vec![0, 0, 0, 0]];
        let grid = FrameGrid::from_rows(&rows).unwrap();
        let events = decode_measure(&grid, TimeSignature::COMMON_TIME, &tiny_config()).unwrap();

        let order: Vec<(QuarterLength, u8)> = events.iter().map(|e| (e.offset, e.pitch)).collect();
        assert_eq!(
            order,
            vec![
                (ql(0, 1), 22),
                (ql(1, 1), 20),
                (ql(1, 1), 23),
                (ql(2, 1), 21),
            ]
        );
    }

    #[test]
    fn empty_grid_has_no_events() {
        let grid = FrameGrid::new(36, 88);
        let events =
            decode_measure(&grid, TimeSignature::COMMON_TIME, &CodecConfig::default()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn wrong_shape_fails_fast() {
        env_logger::try_init().unwrap_or(());

        let grid = FrameGrid::new(36, 87);
        assert_eq!(
            decode_measure(&grid, TimeSignature::COMMON_TIME, &CodecConfig::default()),
            Err(CodecError::ShapeMismatch {
                expected_frames: 36,
                expected_pitches: 88,
                frames: 36,
                pitches: 87,
            })
        );
    }

    #[test]
    fn three_four_uses_twelve_frames_per_beat() {
        env_logger::try_init().unwrap_or(());

        let ts = TimeSignature::new(3, 4).unwrap();
        let mut grid = FrameGrid::new(36, 88);
        for frame in 6..18 {
            grid.set(frame, 40, true);
        }

        let events = decode_measure(&grid, ts, &CodecConfig::default()).unwrap();
        assert_eq!(events, vec![NoteEvent::new(60, ql(1, 2), ql(1, 1))]);
    }

    #[test]
    fn reencoding_any_small_grid_is_idempotent() {
        env_logger::try_init().unwrap_or(());

        let config = CodecConfig {
            frames_per_measure: 4,
            pitch_range: 2,
            pitch_base_offset: 20,
            ..Default::default()
        };

        for bits in 0u32..256 {
            let mut grid = FrameGrid::new(4, 2);
            for cell in 0..8 {
                if bits & (1 << cell) != 0 {
                    grid.set(cell / 2, cell % 2, true);
                }
            }

            let events = decode_measure(&grid, TimeSignature::COMMON_TIME, &config).unwrap();
            let reencoded = encode_measure(&events, TimeSignature::COMMON_TIME, &config).unwrap();
            assert_eq!(reencoded, grid, "grid bits {:08b}", bits);
        }
    }

    #[test]
    fn quantized_events_survive_a_round_trip() {
        env_logger::try_init().unwrap_or(());

        let config = CodecConfig::default();
        let frames_beat = 9;

        // Deterministic pseudo-random melody lines, one per pitch, never touching themselves.
        let mut seed: u64 = 0x5eed;
        let mut next = |bound: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % bound
        };

        let mut expected: Vec<NoteEvent> = Vec::new();
        for pitch in [21u8, 48, 60, 64, 67, 107] {
            let mut frame = next(4) as i64;
            loop {
                let length = 1 + next(8) as i64;
                if frame + length > 36 {
                    break;
                }
                expected.push(NoteEvent::new(
                    pitch,
                    ql(frame, frames_beat),
                    ql(length, frames_beat),
                ));
                frame += length + 1 + next(3) as i64;
            }
        }
        assert!(!expected.is_empty());

        let grid = encode_measure(&expected, TimeSignature::COMMON_TIME, &config).unwrap();
        let decoded = decode_measure(&grid, TimeSignature::COMMON_TIME, &config).unwrap();

        let expected: HashSet<NoteEvent> = expected.into_iter().collect();
        let decoded: HashSet<NoteEvent> = decoded.into_iter().collect();
        assert_eq!(decoded, expected);
    }
}
