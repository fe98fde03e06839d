use thiserror::Error;

/// The only failure of the sequence trees: an index or range outside the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IndexOutOfRange {
    #[error("index {index} out of range for sequence of length {len}")]
    Index { index: usize, len: usize },

    #[error("range {start}..{end} out of range for sequence of length {len}")]
    Range { start: usize, end: usize, len: usize },
}
