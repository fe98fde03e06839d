use std::fmt;
use std::ops::RangeBounds;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::IndexOutOfRange;
use crate::policy::LazyMapMonoid;
use crate::range::{check_index, check_position, normalize_range};
use crate::rng::XorShift64;

const DEFAULT_SEED: u64 = 0x5EED_9E75;

/// Persistent sequence over a randomized binary search tree (RBST) with lazy range acts.
///
/// Every operation takes `&self` and returns a new handle; old handles keep their
/// contents. Nodes are shared between versions through `Arc` and copied on write, so
/// handles can be read and derived from on several threads at once.
pub struct PersistentRbst<P: LazyMapMonoid> {
    root: Link<P>,
    rng: XorShift64,
}

struct Node<P: LazyMapMonoid> {
    key: P::Key,
    agg: P::Agg,
    lazy: P::Act,
    lazy_pending: bool,
    size: usize,
    left: Link<P>,
    right: Link<P>,
}

type Link<P> = Option<Arc<Node<P>>>;

impl<P: LazyMapMonoid> Clone for Node<P> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            agg: self.agg.clone(),
            lazy: self.lazy.clone(),
            lazy_pending: self.lazy_pending,
            size: self.size,
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }
}

impl<P: LazyMapMonoid> Node<P> {
    fn new(key: P::Key) -> Self {
        let agg = P::agg_from_key(&key);
        Self {
            key,
            agg,
            lazy: P::act_unit(),
            lazy_pending: false,
            size: 1,
            left: None,
            right: None,
        }
    }

    fn size(node: &Link<P>) -> usize {
        node.as_ref().map(|n| n.size).unwrap_or(0)
    }

    fn agg(node: &Link<P>) -> P::Agg {
        node.as_ref()
            .map(|n| n.agg.clone())
            .unwrap_or_else(P::agg_unit)
    }

    fn left_size(&self) -> usize {
        Self::size(&self.left)
    }

    fn recalc(&mut self) {
        let left_agg = Self::agg(&self.left);
        let right_agg = Self::agg(&self.right);
        self.size = 1 + Self::size(&self.left) + Self::size(&self.right);
        self.agg = P::agg_merge(&left_agg, &self.key, &right_agg);
    }

    /// Acts for the left and right children of a subtree whose whole range sees `act`.
    fn split_lazy(act: &P::Act, left_size: usize) -> (P::Act, P::Act) {
        let (left, rest) = P::act_split(act, left_size);
        let (_, right) = P::act_split(&rest, 1);
        (left, right)
    }

    /// The act this node hands to its children once `pending` from above is applied.
    fn compose_pending(&self, pending: Option<&P::Act>) -> Option<P::Act> {
        match (pending, self.lazy_pending) {
            (Some(act), true) => Some(P::act_compose(act, &self.lazy)),
            (Some(act), false) => Some(act.clone()),
            (None, true) => Some(self.lazy.clone()),
            (None, false) => None,
        }
    }

    /// The key as seen through `pending`, an act over this subtree not yet applied.
    fn key_through(&self, pending: Option<&P::Act>) -> P::Key {
        match pending {
            Some(act) => {
                let (_, own) = P::act_split(act, self.left_size());
                P::act_apply_key(&self.key, &own)
            }
            None => self.key.clone(),
        }
    }

    fn apply_action(&mut self, act: &P::Act) {
        let (_, own) = P::act_split(act, self.left_size());
        self.key = P::act_apply_key(&self.key, &own);
        self.agg = P::act_apply_agg(&self.agg, act, self.size);
        self.lazy = P::act_compose(act, &self.lazy);
        self.lazy_pending = true;
    }

    /// Hand the pending act to the children, copying them first if they are shared.
    fn push(&mut self) {
        if !self.lazy_pending {
            return;
        }
        if self.left.is_some() || self.right.is_some() {
            let (left_act, right_act) = Self::split_lazy(&self.lazy, self.left_size());
            if let Some(left) = self.left.as_mut() {
                Arc::make_mut(left).apply_action(&left_act);
            }
            if let Some(right) = self.right.as_mut() {
                Arc::make_mut(right).apply_action(&right_act);
            }
        }
        self.lazy = P::act_unit();
        self.lazy_pending = false;
    }
}

impl<P: LazyMapMonoid> PersistentRbst<P> {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            root: None,
            rng: XorShift64::new(seed),
        }
    }

    /// Build a perfectly balanced tree in O(n).
    pub fn from_slice(keys: &[P::Key]) -> Self {
        Self::from_slice_with_seed(keys, DEFAULT_SEED)
    }

    pub fn from_slice_with_seed(keys: &[P::Key], seed: u64) -> Self {
        debug!(len = keys.len(), "building persistent sequence");
        Self {
            root: Self::build(keys),
            rng: XorShift64::new(seed),
        }
    }

    fn from_parts(root: Link<P>, rng: XorShift64) -> Self {
        Self { root, rng }
    }

    pub fn len(&self) -> usize {
        Node::size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The element at `index`, with every pending act resolved.
    pub fn get(&self, index: usize) -> Result<P::Key, IndexOutOfRange> {
        let len = self.len();
        check_index(index, len)?;
        Self::get_node(&self.root, index).ok_or(IndexOutOfRange::Index { index, len })
    }

    /// A new sequence with `key` placed at `index`; later elements shift right.
    pub fn insert(&self, index: usize, key: P::Key) -> Result<Self, IndexOutOfRange> {
        check_position(index, self.len())?;
        let mut rng = self.rng;
        let (left, right) = Self::split(self.root.clone(), index);
        let node = Some(Arc::new(Node::new(key)));
        let merged = Self::merge(left, node, &mut rng);
        let root = Self::merge(merged, right, &mut rng);
        Ok(Self::from_parts(root, rng))
    }

    pub fn remove(&self, index: usize) -> Result<Self, IndexOutOfRange> {
        check_index(index, self.len())?;
        let mut rng = self.rng;
        let (left, rest) = Self::split(self.root.clone(), index);
        let (_, right) = Self::split(rest, 1);
        let root = Self::merge(left, right, &mut rng);
        Ok(Self::from_parts(root, rng))
    }

    /// Replace the element at `index` by copying a single root-to-node path.
    pub fn set(&self, index: usize, key: P::Key) -> Result<Self, IndexOutOfRange> {
        check_index(index, self.len())?;
        let mut root = self.root.clone();
        Self::set_node(&mut root, index, key);
        Ok(Self::from_parts(root, self.rng))
    }

    /// Apply `act` to every element in `range`. An empty range returns an equal handle.
    pub fn apply<R: RangeBounds<usize>>(
        &self,
        range: R,
        act: P::Act,
    ) -> Result<Self, IndexOutOfRange> {
        let (start, end) = normalize_range(range, self.len())?;
        let mut root = self.root.clone();
        Self::update_range(&mut root, start, end, &act);
        Ok(Self::from_parts(root, self.rng))
    }

    /// Fold `range` left to right; `agg_unit()` for an empty range.
    pub fn fold<R: RangeBounds<usize>>(&self, range: R) -> Result<P::Agg, IndexOutOfRange> {
        let (start, end) = normalize_range(range, self.len())?;
        Ok(Self::fold_range(&self.root, start, end, None))
    }

    /// `[0, index)` and `[index, len)` as two independent sequences.
    pub fn split_at(&self, index: usize) -> Result<(Self, Self), IndexOutOfRange> {
        check_position(index, self.len())?;
        let (left, right) = Self::split(self.root.clone(), index);
        let mut rng = self.rng;
        let right_rng = rng.fork();
        trace!(
            left = Node::size(&left),
            right = Node::size(&right),
            "split persistent sequence"
        );
        Ok((
            Self::from_parts(left, rng),
            Self::from_parts(right, right_rng),
        ))
    }

    /// This sequence followed by `other`.
    pub fn concat(&self, other: &Self) -> Self {
        let mut rng = self.rng;
        trace!(left = self.len(), right = other.len(), "concat persistent sequences");
        let root = Self::merge(self.root.clone(), other.root.clone(), &mut rng);
        Self::from_parts(root, rng)
    }

    pub fn iter(&self) -> Iter<'_, P> {
        let mut iter = Iter {
            stack: Vec::new(),
            remaining: self.len(),
        };
        iter.push_left(&self.root, None);
        iter
    }

    pub fn to_vec(&self) -> Vec<P::Key> {
        self.iter().collect()
    }

    fn build(keys: &[P::Key]) -> Link<P> {
        if keys.is_empty() {
            return None;
        }
        let mid = keys.len() / 2;
        let mut node = Node::new(keys[mid].clone());
        node.left = Self::build(&keys[..mid]);
        node.right = Self::build(&keys[mid + 1..]);
        node.recalc();
        Some(Arc::new(node))
    }

    fn get_node(node: &Link<P>, index: usize) -> Option<P::Key> {
        let mut current = node.as_deref()?;
        let mut index = index;
        let mut pending: Option<P::Act> = None;
        loop {
            let left_size = current.left_size();
            if index == left_size {
                return Some(current.key_through(pending.as_ref()));
            }
            let lazy = current.compose_pending(pending.as_ref());
            let (left_act, right_act) = match lazy {
                Some(act) => {
                    let (left, right) = Node::<P>::split_lazy(&act, left_size);
                    (Some(left), Some(right))
                }
                None => (None, None),
            };
            if index < left_size {
                current = current.left.as_deref()?;
                pending = left_act;
            } else {
                index -= left_size + 1;
                current = current.right.as_deref()?;
                pending = right_act;
            }
        }
    }

    fn fold_range(node: &Link<P>, start: usize, end: usize, pending: Option<&P::Act>) -> P::Agg {
        if start >= end {
            return P::agg_unit();
        }
        let Some(node_ref) = node.as_deref() else {
            return P::agg_unit();
        };
        if start == 0 && end == node_ref.size {
            return match pending {
                Some(act) => P::act_apply_agg(&node_ref.agg, act, node_ref.size),
                None => node_ref.agg.clone(),
            };
        }

        let left_size = node_ref.left_size();
        let (left_act, right_act) = match node_ref.compose_pending(pending) {
            Some(act) => {
                let (left, right) = Node::<P>::split_lazy(&act, left_size);
                (Some(left), Some(right))
            }
            None => (None, None),
        };
        if end <= left_size {
            return Self::fold_range(&node_ref.left, start, end, left_act.as_ref());
        }
        if start > left_size {
            return Self::fold_range(
                &node_ref.right,
                start - left_size - 1,
                end - left_size - 1,
                right_act.as_ref(),
            );
        }

        let left_agg = Self::fold_range(&node_ref.left, start, left_size, left_act.as_ref());
        let right_agg =
            Self::fold_range(&node_ref.right, 0, end - left_size - 1, right_act.as_ref());
        let key = node_ref.key_through(pending);

        P::agg_merge(&left_agg, &key, &right_agg)
    }

    fn update_range(node: &mut Link<P>, start: usize, end: usize, act: &P::Act) {
        if start >= end {
            return;
        }
        let Some(node_arc) = node.as_mut() else {
            return;
        };
        let node_ref = Arc::make_mut(node_arc);
        if start == 0 && end == node_ref.size {
            node_ref.apply_action(act);
            return;
        }

        node_ref.push();
        let left_size = node_ref.left_size();
        if start < left_size {
            let left_end = left_size.min(end);
            Self::update_range(&mut node_ref.left, start, left_end, act);
        }
        if start <= left_size && end > left_size {
            let (_, own) = P::act_split(act, left_size - start);
            node_ref.key = P::act_apply_key(&node_ref.key, &own);
        }
        if end > left_size + 1 {
            let right_end = end - left_size - 1;
            if start > left_size {
                Self::update_range(&mut node_ref.right, start - left_size - 1, right_end, act);
            } else {
                let (_, right_act) = P::act_split(act, left_size + 1 - start);
                Self::update_range(&mut node_ref.right, 0, right_end, &right_act);
            }
        }

        node_ref.recalc();
    }

    fn set_node(node: &mut Link<P>, index: usize, key: P::Key) {
        let Some(node_arc) = node.as_mut() else {
            return;
        };
        let node_ref = Arc::make_mut(node_arc);
        node_ref.push();
        let left_size = node_ref.left_size();
        if index < left_size {
            Self::set_node(&mut node_ref.left, index, key);
        } else if index == left_size {
            node_ref.key = key;
        } else {
            Self::set_node(&mut node_ref.right, index - left_size - 1, key);
        }
        node_ref.recalc();
    }

    fn split(root: Link<P>, left_count: usize) -> (Link<P>, Link<P>) {
        let Some(mut node) = root else {
            return (None, None);
        };
        if left_count == 0 {
            return (None, Some(node));
        }
        if left_count >= node.size {
            return (Some(node), None);
        }

        let node_ref = Arc::make_mut(&mut node);
        node_ref.push();
        let left_size = node_ref.left_size();
        if left_count <= left_size {
            let (left, right) = Self::split(node_ref.left.take(), left_count);
            node_ref.left = right;
            node_ref.recalc();
            (left, Some(node))
        } else {
            let (left, right) = Self::split(node_ref.right.take(), left_count - left_size - 1);
            node_ref.right = left;
            node_ref.recalc();
            (Some(node), right)
        }
    }

    fn merge(left: Link<P>, right: Link<P>, rng: &mut XorShift64) -> Link<P> {
        match (left, right) {
            (None, right) => right,
            (left, None) => left,
            (Some(mut left), Some(mut right)) => {
                let left_size = left.size;
                let total = left_size + right.size;
                if rng.below(total) < left_size {
                    let node = Arc::make_mut(&mut left);
                    node.push();
                    node.right = Self::merge(node.right.take(), Some(right), rng);
                    node.recalc();
                    Some(left)
                } else {
                    let node = Arc::make_mut(&mut right);
                    node.push();
                    node.left = Self::merge(Some(left), node.left.take(), rng);
                    node.recalc();
                    Some(right)
                }
            }
        }
    }
}

/// In-order iterator resolving pending acts on the fly; the tree is not touched.
pub struct Iter<'a, P: LazyMapMonoid> {
    stack: Vec<(&'a Node<P>, Option<P::Act>)>,
    remaining: usize,
}

impl<'a, P: LazyMapMonoid> Iter<'a, P> {
    fn push_left(&mut self, mut link: &'a Link<P>, mut pending: Option<P::Act>) {
        while let Some(node) = link.as_deref() {
            let left_act = node
                .compose_pending(pending.as_ref())
                .map(|act| Node::<P>::split_lazy(&act, node.left_size()).0);
            self.stack.push((node, pending));
            link = &node.left;
            pending = left_act;
        }
    }
}

impl<P: LazyMapMonoid> Iterator for Iter<'_, P> {
    type Item = P::Key;

    fn next(&mut self) -> Option<Self::Item> {
        let (node, pending) = self.stack.pop()?;
        let key = node.key_through(pending.as_ref());
        let right_act = node
            .compose_pending(pending.as_ref())
            .map(|act| Node::<P>::split_lazy(&act, node.left_size()).1);
        self.push_left(&node.right, right_act);
        self.remaining -= 1;
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<P: LazyMapMonoid> ExactSizeIterator for Iter<'_, P> {}

impl<P: LazyMapMonoid> Clone for PersistentRbst<P> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            rng: self.rng,
        }
    }
}

impl<P: LazyMapMonoid> Default for PersistentRbst<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: LazyMapMonoid> FromIterator<P::Key> for PersistentRbst<P> {
    fn from_iter<I: IntoIterator<Item = P::Key>>(iter: I) -> Self {
        let keys: Vec<P::Key> = iter.into_iter().collect();
        Self::from_slice(&keys)
    }
}

impl<P> PartialEq for PersistentRbst<P>
where
    P: LazyMapMonoid,
    P::Key: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<P> fmt::Debug for PersistentRbst<P>
where
    P: LazyMapMonoid,
    P::Key: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
