/// Element, aggregate and range-action behaviour of a sequence tree.
///
/// The trees never check these laws; breaking them gives wrong answers, not errors:
/// - `agg_merge` is associative and `agg_unit()` is its identity.
/// - `act_compose` is associative and `act_unit()` is its identity.
/// - Acting on the aggregate of `len` elements equals aggregating the acted elements.
/// - `act_split(act, k)` yields the acts seen by the first `k` elements of a range and
///   by the rest, and distributes over `act_compose`.
///
/// `act_apply_agg` is only called on aggregates of non-empty ranges.
pub trait LazyMapMonoid {
    type Key: Clone;
    type Agg: Clone;
    type Act: Clone;

    fn agg_unit() -> Self::Agg;
    fn agg_from_key(key: &Self::Key) -> Self::Agg;
    fn agg_merge(left: &Self::Agg, key: &Self::Key, right: &Self::Agg) -> Self::Agg;

    fn act_unit() -> Self::Act;

    /// Compose `new` after `old`.
    fn act_compose(new: &Self::Act, old: &Self::Act) -> Self::Act;

    /// Apply the act a range sees at its first position to a single key.
    fn act_apply_key(key: &Self::Key, act: &Self::Act) -> Self::Key;
    fn act_apply_agg(agg: &Self::Agg, act: &Self::Act, len: usize) -> Self::Agg;

    /// Split an act over a range into the acts for its first `left_len` elements and
    /// for the remainder. Uniform acts keep the default.
    fn act_split(act: &Self::Act, left_len: usize) -> (Self::Act, Self::Act) {
        let _ = left_len;
        (act.clone(), act.clone())
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

pub struct RangeSum;

impl LazyMapMonoid for RangeSum {
    type Key = i64;
    type Agg = i64;
    type Act = ();

    fn agg_unit() -> Self::Agg {
        0
    }

    fn agg_from_key(key: &Self::Key) -> Self::Agg {
        *key
    }

    fn agg_merge(left: &Self::Agg, key: &Self::Key, right: &Self::Agg) -> Self::Agg {
        left + key + right
    }

    fn act_unit() -> Self::Act {}

    fn act_compose(_new: &Self::Act, _old: &Self::Act) -> Self::Act {}

    fn act_apply_key(key: &Self::Key, _act: &Self::Act) -> Self::Key {
        *key
    }

    fn act_apply_agg(agg: &Self::Agg, _act: &Self::Act, _len: usize) -> Self::Agg {
        *agg
    }
}

pub struct RangeMin;

impl LazyMapMonoid for RangeMin {
    type Key = i64;
    type Agg = i64;
    type Act = ();

    fn agg_unit() -> Self::Agg {
        i64::MAX
    }

    fn agg_from_key(key: &Self::Key) -> Self::Agg {
        *key
    }

    fn agg_merge(left: &Self::Agg, key: &Self::Key, right: &Self::Agg) -> Self::Agg {
        (*left).min(*key).min(*right)
    }

    fn act_unit() -> Self::Act {}

    fn act_compose(_new: &Self::Act, _old: &Self::Act) -> Self::Act {}

    fn act_apply_key(key: &Self::Key, _act: &Self::Act) -> Self::Key {
        *key
    }

    fn act_apply_agg(agg: &Self::Agg, _act: &Self::Act, _len: usize) -> Self::Agg {
        *agg
    }
}

pub struct RangeMax;

impl LazyMapMonoid for RangeMax {
    type Key = i64;
    type Agg = i64;
    type Act = ();

    fn agg_unit() -> Self::Agg {
        i64::MIN
    }

    fn agg_from_key(key: &Self::Key) -> Self::Agg {
        *key
    }

    fn agg_merge(left: &Self::Agg, key: &Self::Key, right: &Self::Agg) -> Self::Agg {
        (*left).max(*key).max(*right)
    }

    fn act_unit() -> Self::Act {}

    fn act_compose(_new: &Self::Act, _old: &Self::Act) -> Self::Act {}

    fn act_apply_key(key: &Self::Key, _act: &Self::Act) -> Self::Key {
        *key
    }

    fn act_apply_agg(agg: &Self::Agg, _act: &Self::Act, _len: usize) -> Self::Agg {
        *agg
    }
}

/// Range gcd. The aggregate is always non-negative; `gcd(0, x) = |x|`.
pub struct RangeGcd;

impl LazyMapMonoid for RangeGcd {
    type Key = i64;
    type Agg = i64;
    type Act = ();

    fn agg_unit() -> Self::Agg {
        0
    }

    fn agg_from_key(key: &Self::Key) -> Self::Agg {
        key.abs()
    }

    fn agg_merge(left: &Self::Agg, key: &Self::Key, right: &Self::Agg) -> Self::Agg {
        gcd(gcd(*left, *key), *right)
    }

    fn act_unit() -> Self::Act {}

    fn act_compose(_new: &Self::Act, _old: &Self::Act) -> Self::Act {}

    fn act_apply_key(key: &Self::Key, _act: &Self::Act) -> Self::Key {
        *key
    }

    fn act_apply_agg(agg: &Self::Agg, _act: &Self::Act, _len: usize) -> Self::Agg {
        *agg
    }
}

pub struct RangeSumRangeAdd;

impl LazyMapMonoid for RangeSumRangeAdd {
    type Key = i64;
    type Agg = i64;
    type Act = i64;

    fn agg_unit() -> Self::Agg {
        0
    }

    fn agg_from_key(key: &Self::Key) -> Self::Agg {
        *key
    }

    fn agg_merge(left: &Self::Agg, key: &Self::Key, right: &Self::Agg) -> Self::Agg {
        left + key + right
    }

    fn act_unit() -> Self::Act {
        0
    }

    fn act_compose(new: &Self::Act, old: &Self::Act) -> Self::Act {
        new + old
    }

    fn act_apply_key(key: &Self::Key, act: &Self::Act) -> Self::Key {
        key + act
    }

    fn act_apply_agg(agg: &Self::Agg, act: &Self::Act, len: usize) -> Self::Agg {
        *agg + act * len as i64
    }
}

pub struct RangeMinRangeAdd;

impl LazyMapMonoid for RangeMinRangeAdd {
    type Key = i64;
    type Agg = i64;
    type Act = i64;

    fn agg_unit() -> Self::Agg {
        i64::MAX
    }

    fn agg_from_key(key: &Self::Key) -> Self::Agg {
        *key
    }

    fn agg_merge(left: &Self::Agg, key: &Self::Key, right: &Self::Agg) -> Self::Agg {
        (*left).min(*key).min(*right)
    }

    fn act_unit() -> Self::Act {
        0
    }

    fn act_compose(new: &Self::Act, old: &Self::Act) -> Self::Act {
        new + old
    }

    fn act_apply_key(key: &Self::Key, act: &Self::Act) -> Self::Key {
        key + act
    }

    fn act_apply_agg(agg: &Self::Agg, act: &Self::Act, _len: usize) -> Self::Agg {
        agg + act
    }
}

/// Range sum with "add an arithmetic progression" updates.
///
/// The act `(first, step)` adds `first + step * i` to the `i`-th element of the range.
pub struct RangeSumArithmeticAdd;

impl LazyMapMonoid for RangeSumArithmeticAdd {
    type Key = i64;
    type Agg = i64;
    type Act = (i64, i64);

    fn agg_unit() -> Self::Agg {
        0
    }

    fn agg_from_key(key: &Self::Key) -> Self::Agg {
        *key
    }

    fn agg_merge(left: &Self::Agg, key: &Self::Key, right: &Self::Agg) -> Self::Agg {
        left + key + right
    }

    fn act_unit() -> Self::Act {
        (0, 0)
    }

    fn act_compose(new: &Self::Act, old: &Self::Act) -> Self::Act {
        (new.0 + old.0, new.1 + old.1)
    }

    fn act_apply_key(key: &Self::Key, act: &Self::Act) -> Self::Key {
        key + act.0
    }

    fn act_apply_agg(agg: &Self::Agg, act: &Self::Act, len: usize) -> Self::Agg {
        let len = len as i64;
        agg + act.0 * len + act.1 * (len * (len - 1) / 2)
    }

    fn act_split(act: &Self::Act, left_len: usize) -> (Self::Act, Self::Act) {
        let (first, step) = *act;
        ((first, step), (first + step * left_len as i64, step))
    }
}
