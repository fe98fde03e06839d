//! In-place sequence API for the ephemeral trees.

use std::ops::RangeBounds;

use crate::error::IndexOutOfRange;

pub trait SequenceBase {
    type Key;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&mut self, index: usize) -> Option<&Self::Key>;
    fn insert(&mut self, index: usize, key: Self::Key) -> Result<(), IndexOutOfRange>;
    fn remove(&mut self, index: usize) -> Result<Self::Key, IndexOutOfRange>;
    fn set(&mut self, index: usize, key: Self::Key) -> Result<(), IndexOutOfRange>;

    fn extend<I: IntoIterator<Item = Self::Key>>(&mut self, iter: I) {
        for value in iter {
            let index = self.len();
            // `len` is always a valid position
            let _ = self.insert(index, value);
        }
    }
}

pub trait SequenceSplitMerge: SequenceBase + Sized {
    /// Keep `[0, index)` and return `[index, len)`.
    fn split_at(&mut self, index: usize) -> Result<Self, IndexOutOfRange>;
    fn merge(&mut self, right: Self);
}

pub trait SequenceAgg: SequenceBase {
    type Agg;
    fn fold<R: RangeBounds<usize>>(&mut self, range: R) -> Result<Self::Agg, IndexOutOfRange>;
}

pub trait SequenceLazy: SequenceAgg {
    type Act;
    fn update<R: RangeBounds<usize>>(
        &mut self,
        range: R,
        act: Self::Act,
    ) -> Result<(), IndexOutOfRange>;
}
