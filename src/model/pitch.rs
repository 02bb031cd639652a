/// Maps absolute MIDI pitch numbers onto a compact, zero-based column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchIndex {
    base_offset: u8,
    range: usize,
}

impl PitchIndex {
    pub fn new(base_offset: u8, range: usize) -> Self {
        Self { base_offset, range }
    }

    pub fn base_offset(&self) -> u8 {
        self.base_offset
    }

    pub fn range(&self) -> usize {
        self.range
    }

    /// Column for `pitch`, or `None` when it falls outside `[0, range)`.
    pub fn to_index(&self, pitch: u8) -> Option<usize> {
        let index = pitch.checked_sub(self.base_offset)? as usize;
        (index < self.range).then_some(index)
    }

    pub fn to_pitch(&self, index: usize) -> u8 {
        // Callers only hand back indices that came from a grid column, and the
        // config validation keeps `base_offset + range` inside the MIDI key space.
        (index + self.base_offset as usize).min(u8::MAX as usize) as u8
    }
}
