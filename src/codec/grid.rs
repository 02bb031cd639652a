use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// A measure-sized piano roll: `frames` rows by `pitches` columns of on/off cells.
///
/// Serialized as a 2-D array of `0`/`1` indexed `[frame][pitch_index]`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(into = "Vec<Vec<u8>>", try_from = "Vec<Vec<u8>>")]
pub struct FrameGrid {
    frames: usize,
    pitches: usize,
    cells: Vec<bool>,
}

impl FrameGrid {
    /// An all-inactive grid.
    pub fn new(frames: usize, pitches: usize) -> Self {
        Self {
            frames,
            pitches,
            cells: vec![false; frames * pitches],
        }
    }

    /// Builds a grid from `0`/`1` rows; every row must have the same width.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, CodecError> {
        let frames = rows.len();
        let pitches = rows.first().map(|row| row.len()).unwrap_or(0);

        let mut grid = Self::new(frames, pitches);
        for (frame, row) in rows.iter().enumerate() {
            if row.len() != pitches {
                return Err(CodecError::ShapeMismatch {
                    expected_frames: frames,
                    expected_pitches: pitches,
                    frames,
                    pitches: row.len(),
                });
            }
            for (pitch, &cell) in row.iter().enumerate() {
                match cell {
                    0 => {}
                    1 => grid.set(frame, pitch, true),
                    value => return Err(CodecError::InvalidCell { frame, pitch, value }),
                }
            }
        }

        Ok(grid)
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn pitches(&self) -> usize {
        self.pitches
    }

    pub fn get(&self, frame: usize, pitch: usize) -> bool {
        frame < self.frames && pitch < self.pitches && self.cells[frame * self.pitches + pitch]
    }

    /// Writes one cell. Out-of-bounds coordinates are ignored.
    pub fn set(&mut self, frame: usize, pitch: usize, active: bool) {
        if frame < self.frames && pitch < self.pitches {
            self.cells[frame * self.pitches + pitch] = active;
        }
    }

    /// The cells of one frame, or `None` past the last frame.
    pub fn row(&self, frame: usize) -> Option<&[bool]> {
        let start = frame.checked_mul(self.pitches)?;
        self.cells.get(start..start + self.pitches)
    }

    pub fn column(&self, pitch: usize) -> Vec<bool> {
        (0..self.frames).map(|frame| self.get(frame, pitch)).collect()
    }

    pub fn active_cells(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell).count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_cells() == 0
    }

    /// Fails with `ShapeMismatch` unless the grid is exactly `frames` x `pitches`.
    pub fn check_shape(&self, frames: usize, pitches: usize) -> Result<(), CodecError> {
        if self.frames != frames || self.pitches != pitches {
            return Err(CodecError::ShapeMismatch {
                expected_frames: frames,
                expected_pitches: pitches,
                frames: self.frames,
                pitches: self.pitches,
            });
        }
        Ok(())
    }

    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        (0..self.frames)
            .map(|frame| {
                let row = self.row(frame).unwrap_or(&[]);
                row.iter().map(|&cell| cell as u8).collect()
            })
            .collect()
    }
}

impl From<FrameGrid> for Vec<Vec<u8>> {
    fn from(grid: FrameGrid) -> Self {
        grid.to_rows()
    }
}

impl TryFrom<Vec<Vec<u8>>> for FrameGrid {
    type Error = CodecError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        FrameGrid::from_rows(&rows)
    }
}
