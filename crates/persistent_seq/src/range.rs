use std::ops::{Bound, RangeBounds};

use tracing::debug;

use crate::error::IndexOutOfRange;

/// Resolve `range` against a sequence of length `len` into a half-open `[start, end)`.
pub(crate) fn normalize_range<R: RangeBounds<usize>>(
    range: R,
    len: usize,
) -> Result<(usize, usize), IndexOutOfRange> {
    let start = match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&end) => end.saturating_add(1),
        Bound::Excluded(&end) => end,
        Bound::Unbounded => len,
    };

    if start > end || end > len {
        debug!(start, end, len, "range out of bounds");
        return Err(IndexOutOfRange::Range { start, end, len });
    }

    Ok((start, end))
}

/// An existing element: `index < len`.
pub(crate) fn check_index(index: usize, len: usize) -> Result<(), IndexOutOfRange> {
    if index >= len {
        debug!(index, len, "index out of bounds");
        return Err(IndexOutOfRange::Index { index, len });
    }
    Ok(())
}

/// A gap between elements: `index <= len`.
pub(crate) fn check_position(index: usize, len: usize) -> Result<(), IndexOutOfRange> {
    if index > len {
        debug!(index, len, "position out of bounds");
        return Err(IndexOutOfRange::Index { index, len });
    }
    Ok(())
}
