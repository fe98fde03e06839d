use std::hint::black_box;
use std::time::{Duration, Instant};

use bench::RuntimeProfile;
use criterion::measurement::Measurement;
use criterion::{BenchmarkGroup, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use persistent_seq::{
    ImplicitTreap, LazyMapMonoid, PersistentRbst, SequenceAgg, SequenceBase, SequenceLazy,
};

const SIZES: [usize; 3] = [1_000, 16_000, 256_000];
const OPS_PER_SIZE: usize = 100;
const VALUE_RANGE: std::ops::RangeInclusive<i64> = -1_000_000_000..=1_000_000_000;
const DELTA_RANGE: std::ops::RangeInclusive<i64> = -1_000..=1_000;
const WORKLOAD_WEIGHTS: &[(OpKind, u32)] = &[
    (OpKind::Get, 20),
    (OpKind::Fold, 20),
    (OpKind::Update, 20),
    (OpKind::Insert, 20),
    (OpKind::Remove, 20),
];

#[derive(Clone, Copy, Debug)]
pub enum FeatureSet {
    Agg,
    AggLazy,
}

#[derive(Clone, Copy)]
enum OpKind {
    Get,
    Fold,
    Update,
    Insert,
    Remove,
}

#[derive(Clone)]
enum Op<K, A> {
    Get { index: usize },
    Fold { start: usize, end: usize },
    Update { start: usize, end: usize, act: A },
    Insert { index: usize, value: K },
    Remove { index: usize },
}

pub trait ActFromDelta: Clone {
    fn from_delta(delta: i64) -> Self;
}

impl ActFromDelta for i64 {
    fn from_delta(delta: i64) -> Self {
        delta
    }
}

impl ActFromDelta for () {
    fn from_delta(_delta: i64) -> Self {}
}

/// Uniform in-place driver over the ephemeral treap and the persistent tree.
trait BenchTree<P: LazyMapMonoid<Key = i64>> {
    fn build(seed: u64, initial: &[i64]) -> Self;
    fn len(&self) -> usize;
    fn get(&mut self, index: usize) -> Option<i64>;
    fn fold(&mut self, start: usize, end: usize) -> Option<P::Agg>;
    fn update(&mut self, start: usize, end: usize, act: P::Act);
    fn insert(&mut self, index: usize, value: i64);
    fn remove(&mut self, index: usize);
}

impl<P: LazyMapMonoid<Key = i64>> BenchTree<P> for ImplicitTreap<P> {
    fn build(seed: u64, initial: &[i64]) -> Self {
        let mut tree = Self::with_seed(seed);
        tree.extend(initial.iter().copied());
        tree
    }

    fn len(&self) -> usize {
        SequenceBase::len(self)
    }

    fn get(&mut self, index: usize) -> Option<i64> {
        SequenceBase::get(self, index).copied()
    }

    fn fold(&mut self, start: usize, end: usize) -> Option<P::Agg> {
        SequenceAgg::fold(self, start..end).ok()
    }

    fn update(&mut self, start: usize, end: usize, act: P::Act) {
        let _ = SequenceLazy::update(self, start..end, act);
    }

    fn insert(&mut self, index: usize, value: i64) {
        let _ = SequenceBase::insert(self, index, value);
    }

    fn remove(&mut self, index: usize) {
        let _ = SequenceBase::remove(self, index);
    }
}

/// The persistent tree, optionally keeping every version alive.
struct Versioned<P: LazyMapMonoid> {
    current: PersistentRbst<P>,
    history: Option<Vec<PersistentRbst<P>>>,
}

impl<P: LazyMapMonoid> Versioned<P> {
    fn advance(&mut self, next: Option<PersistentRbst<P>>) {
        let Some(next) = next else {
            return;
        };
        let previous = std::mem::replace(&mut self.current, next);
        if let Some(history) = self.history.as_mut() {
            history.push(previous);
        }
    }
}

struct Latest<P: LazyMapMonoid>(Versioned<P>);
struct AllVersions<P: LazyMapMonoid>(Versioned<P>);

macro_rules! impl_versioned_bench_tree {
    ($wrapper:ident, $keep_history:expr) => {
        impl<P: LazyMapMonoid<Key = i64>> BenchTree<P> for $wrapper<P> {
            fn build(seed: u64, initial: &[i64]) -> Self {
                let current = PersistentRbst::from_slice_with_seed(initial, seed);
                let history = if $keep_history { Some(Vec::new()) } else { None };
                Self(Versioned { current, history })
            }

            fn len(&self) -> usize {
                self.0.current.len()
            }

            fn get(&mut self, index: usize) -> Option<i64> {
                self.0.current.get(index).ok()
            }

            fn fold(&mut self, start: usize, end: usize) -> Option<P::Agg> {
                self.0.current.fold(start..end).ok()
            }

            fn update(&mut self, start: usize, end: usize, act: P::Act) {
                let next = self.0.current.apply(start..end, act).ok();
                self.0.advance(next);
            }

            fn insert(&mut self, index: usize, value: i64) {
                let next = self.0.current.insert(index, value).ok();
                self.0.advance(next);
            }

            fn remove(&mut self, index: usize) {
                let next = self.0.current.remove(index).ok();
                self.0.advance(next);
            }
        }
    };
}

impl_versioned_bench_tree!(Latest, false);
impl_versioned_bench_tree!(AllVersions, true);

pub fn bench_workload<P>(c: &mut Criterion, feature: FeatureSet)
where
    P: LazyMapMonoid<Key = i64>,
    P::Act: ActFromDelta,
{
    let group_name = format!("persistent_seq/{}", feature_label(feature));
    let mut group = c.benchmark_group(group_name);

    for &size in &SIZES {
        RuntimeProfile::for_size(size).apply(&mut group);
        let base_seed = seed_base(feature, size as u64);
        let mut init_rng = StdRng::seed_from_u64(base_seed);
        let initial = generate_initial(size, &mut init_rng);

        bench_tree::<ImplicitTreap<P>, P, _>(
            &mut group, "treap", size, feature, base_seed, &initial,
        );
        bench_tree::<Latest<P>, P, _>(
            &mut group, "persistent", size, feature, base_seed, &initial,
        );
        bench_tree::<AllVersions<P>, P, _>(
            &mut group,
            "persistent_history",
            size,
            feature,
            base_seed,
            &initial,
        );
    }

    group.finish();
}

fn feature_supports(feature: FeatureSet, kind: OpKind) -> bool {
    match feature {
        FeatureSet::Agg => !matches!(kind, OpKind::Update),
        FeatureSet::AggLazy => true,
    }
}

fn choose_kind<R: Rng + ?Sized>(rng: &mut R, feature: FeatureSet) -> OpKind {
    let total: u32 = WORKLOAD_WEIGHTS
        .iter()
        .filter(|(kind, _)| feature_supports(feature, *kind))
        .map(|(_, weight)| weight)
        .sum();

    let mut roll = rng.random_range(0..total);
    for (kind, weight) in WORKLOAD_WEIGHTS {
        if !feature_supports(feature, *kind) {
            continue;
        }
        if roll < *weight {
            return *kind;
        }
        roll -= *weight;
    }

    OpKind::Insert
}

fn random_range<R: Rng + ?Sized>(rng: &mut R, len: usize) -> (usize, usize) {
    let start = rng.random_range(0..len);
    let end = rng.random_range((start + 1)..=len);
    (start, end)
}

fn generate_initial<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Vec<i64> {
    (0..size).map(|_| rng.random_range(VALUE_RANGE)).collect()
}

fn generate_ops<A>(feature: FeatureSet, size: usize, rng: &mut impl Rng) -> Vec<Op<i64, A>>
where
    A: ActFromDelta,
{
    let mut len = size;
    let mut ops = Vec::with_capacity(OPS_PER_SIZE);

    for step in 0..OPS_PER_SIZE {
        let remaining = OPS_PER_SIZE - step;
        let mut kind = choose_kind(rng, feature);
        // keep the length near `size` across iterations
        let drift = len as isize - size as isize;
        if drift > remaining as isize {
            kind = OpKind::Remove;
        } else if drift < -(remaining as isize) {
            kind = OpKind::Insert;
        }
        if len == 0 {
            kind = OpKind::Insert;
        }

        match kind {
            OpKind::Get => {
                let index = rng.random_range(0..len);
                ops.push(Op::Get { index });
            }
            OpKind::Fold => {
                let (start, end) = random_range(rng, len);
                ops.push(Op::Fold { start, end });
            }
            OpKind::Update => {
                let (start, end) = random_range(rng, len);
                let delta = rng.random_range(DELTA_RANGE);
                ops.push(Op::Update {
                    start,
                    end,
                    act: A::from_delta(delta),
                });
            }
            OpKind::Insert => {
                let index = rng.random_range(0..=len);
                let value = rng.random_range(VALUE_RANGE);
                ops.push(Op::Insert { index, value });
                len += 1;
            }
            OpKind::Remove => {
                let index = rng.random_range(0..len);
                ops.push(Op::Remove { index });
                len -= 1;
            }
        }
    }

    ops
}

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

fn seed_base(feature: FeatureSet, size: u64) -> u64 {
    let seed = 0x5EED_2026 ^ (size.wrapping_mul(SEED_MIX));
    let seed = seed ^ (feature_id(feature).wrapping_mul(SEED_MIX.rotate_left(31)));
    mix_seed(seed)
}

fn seed_for_iter(base: u64, iter: u64) -> u64 {
    mix_seed(base ^ iter.wrapping_mul(SEED_MIX))
}

fn mix_seed(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn feature_id(feature: FeatureSet) -> u64 {
    match feature {
        FeatureSet::Agg => 1,
        FeatureSet::AggLazy => 2,
    }
}

fn bench_tree<T, P, M>(
    group: &mut BenchmarkGroup<'_, M>,
    label: &str,
    size: usize,
    feature: FeatureSet,
    base_seed: u64,
    initial: &[i64],
) where
    M: Measurement<Value = Duration>,
    P: LazyMapMonoid<Key = i64>,
    P::Act: ActFromDelta,
    T: BenchTree<P>,
{
    let mut tree = T::build(base_seed ^ 0x00C0_FFEE, initial);

    group.bench_function(BenchmarkId::new(label, size), |bencher| {
        bencher.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for iter in 0..iters {
                let mut op_rng = StdRng::seed_from_u64(seed_for_iter(base_seed, iter));
                let ops = generate_ops::<P::Act>(feature, tree.len(), &mut op_rng);
                let start = Instant::now();
                run_ops::<T, P>(&mut tree, &ops);
                black_box(tree.len());
                total += start.elapsed();
            }
            total
        })
    });
}

fn run_ops<T, P>(tree: &mut T, ops: &[Op<i64, P::Act>])
where
    T: BenchTree<P>,
    P: LazyMapMonoid<Key = i64>,
{
    for op in ops {
        match op {
            Op::Get { index } => {
                black_box(tree.get(*index));
            }
            Op::Fold { start, end } => {
                black_box(tree.fold(*start, *end));
            }
            Op::Update { start, end, act } => {
                tree.update(*start, *end, act.clone());
            }
            Op::Insert { index, value } => {
                tree.insert(*index, *value);
            }
            Op::Remove { index } => {
                tree.remove(*index);
            }
        }
    }
}

fn feature_label(feature: FeatureSet) -> &'static str {
    match feature {
        FeatureSet::Agg => "agg",
        FeatureSet::AggLazy => "agg_lazy",
    }
}
