mod error;
mod policy;
mod range;
mod rng;
mod traits;

pub mod impls;

pub use error::IndexOutOfRange;
pub use impls::{
    persistent::{Iter, PersistentRbst},
    treap::ImplicitTreap,
};
pub use policy::{
    LazyMapMonoid, RangeGcd, RangeMax, RangeMin, RangeMinRangeAdd, RangeSum,
    RangeSumArithmeticAdd, RangeSumRangeAdd,
};
pub use traits::{SequenceAgg, SequenceBase, SequenceLazy, SequenceSplitMerge};

/// Persistent sequence with lazy range acts.
pub type PersistentSequence<P> = PersistentRbst<P>;
