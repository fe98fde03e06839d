use std::ops::RangeBounds;

use tracing::trace;

use crate::error::IndexOutOfRange;
use crate::policy::LazyMapMonoid;
use crate::range::{check_index, check_position, normalize_range};
use crate::rng::XorShift64;
use crate::traits::{SequenceAgg, SequenceBase, SequenceLazy, SequenceSplitMerge};

const DEFAULT_SEED: u64 = 0x5EED_BB57;

/// Mutable lazy treap list. Nodes are exclusively owned; cloning copies the whole tree.
pub struct ImplicitTreap<P: LazyMapMonoid> {
    root: Link<P>,
    rng: XorShift64,
}

struct Node<P: LazyMapMonoid> {
    key: P::Key,
    agg: P::Agg,
    lazy: P::Act,
    lazy_pending: bool,
    size: usize,
    prio: u32,
    left: Link<P>,
    right: Link<P>,
}

type Link<P> = Option<Box<Node<P>>>;

impl<P: LazyMapMonoid> Clone for Node<P> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            agg: self.agg.clone(),
            lazy: self.lazy.clone(),
            lazy_pending: self.lazy_pending,
            size: self.size,
            prio: self.prio,
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }
}

impl<P: LazyMapMonoid> Node<P> {
    fn new(key: P::Key, prio: u32) -> Self {
        let agg = P::agg_from_key(&key);
        Self {
            key,
            agg,
            lazy: P::act_unit(),
            lazy_pending: false,
            size: 1,
            prio,
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

    fn apply_action(&mut self, act: &P::Act) {
        let (_, own) = P::act_split(act, self.left_size());
        self.key = P::act_apply_key(&self.key, &own);
        self.agg = P::act_apply_agg(&self.agg, act, self.size);
        self.lazy = P::act_compose(act, &self.lazy);
        self.lazy_pending = true;
    }

    fn push(&mut self) {
        if !self.lazy_pending {
            return;
        }
        if self.left.is_some() || self.right.is_some() {
            let (left_act, rest) = P::act_split(&self.lazy, self.left_size());
            let (_, right_act) = P::act_split(&rest, 1);
            if let Some(left) = self.left.as_deref_mut() {
                left.apply_action(&left_act);
            }
            if let Some(right) = self.right.as_deref_mut() {
                right.apply_action(&right_act);
            }
        }
        self.lazy = P::act_unit();
        self.lazy_pending = false;
    }
}

impl<P: LazyMapMonoid> ImplicitTreap<P> {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            root: None,
            rng: XorShift64::new(seed),
        }
    }

    /// Elements in order; pending acts are pushed down on the way.
    pub fn to_vec(&mut self) -> Vec<P::Key> {
        let mut out = Vec::with_capacity(self.len());
        Self::collect(&mut self.root, &mut out);
        out
    }

    fn collect(node: &mut Link<P>, out: &mut Vec<P::Key>) {
        let Some(node_ref) = node.as_deref_mut() else {
            return;
        };
        node_ref.push();
        Self::collect(&mut node_ref.left, out);
        out.push(node_ref.key.clone());
        Self::collect(&mut node_ref.right, out);
    }

    fn fold_range(node: &mut Link<P>, start: usize, end: usize) -> P::Agg {
        if start >= end {
            return P::agg_unit();
        }
        let Some(node_ref) = node.as_deref_mut() else {
            return P::agg_unit();
        };
        if start == 0 && end == node_ref.size {
            return node_ref.agg.clone();
        }

        node_ref.push();
        let left_size = node_ref.left_size();
        if end <= left_size {
            return Self::fold_range(&mut node_ref.left, start, end);
        }
        if start > left_size {
            return Self::fold_range(
                &mut node_ref.right,
                start - left_size - 1,
                end - left_size - 1,
            );
        }

        let left_agg = Self::fold_range(&mut node_ref.left, start, left_size);
        let right_agg = Self::fold_range(&mut node_ref.right, 0, end - left_size - 1);

        P::agg_merge(&left_agg, &node_ref.key, &right_agg)
    }

    fn update_range(node: &mut Link<P>, start: usize, end: usize, act: &P::Act) {
        if start >= end {
            return;
        }
        let Some(node_ref) = node.as_deref_mut() else {
            return;
        };
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
        let Some(node_ref) = node.as_deref_mut() else {
            return;
        };
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
        let mut node = match root {
            Some(node) => node,
            None => return (None, None),
        };
        if left_count == 0 {
            return (None, Some(node));
        }
        if left_count >= node.size {
            return (Some(node), None);
        }

        node.push();
        let left_size = node.left_size();
        if left_count <= left_size {
            let (left, right) = Self::split(node.left.take(), left_count);
            node.left = right;
            node.recalc();
            (left, Some(node))
        } else {
            let (left, right) = Self::split(node.right.take(), left_count - left_size - 1);
            node.right = left;
            node.recalc();
            (Some(node), right)
        }
    }

    fn merge(left: Link<P>, right: Link<P>) -> Link<P> {
        match (left, right) {
            (None, right) => right,
            (left, None) => left,
            (Some(mut left), Some(mut right)) => {
                if left.prio > right.prio {
                    left.push();
                    left.right = Self::merge(left.right.take(), Some(right));
                    left.recalc();
                    Some(left)
                } else {
                    right.push();
                    right.left = Self::merge(Some(left), right.left.take());
                    right.recalc();
                    Some(right)
                }
            }
        }
    }

    fn get_node(node: &mut Link<P>, index: usize) -> Option<&P::Key> {
        let node_ref = node.as_deref_mut()?;
        node_ref.push();
        let left_size = node_ref.left_size();
        if index < left_size {
            Self::get_node(&mut node_ref.left, index)
        } else if index == left_size {
            Some(&node_ref.key)
        } else {
            Self::get_node(&mut node_ref.right, index - left_size - 1)
        }
    }
}

impl<P: LazyMapMonoid> Clone for ImplicitTreap<P> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            rng: self.rng,
        }
    }
}

impl<P: LazyMapMonoid> Default for ImplicitTreap<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: LazyMapMonoid> SequenceBase for ImplicitTreap<P> {
    type Key = P::Key;

    fn len(&self) -> usize {
        Node::size(&self.root)
    }

    fn get(&mut self, index: usize) -> Option<&Self::Key> {
        if index >= self.len() {
            return None;
        }
        Self::get_node(&mut self.root, index)
    }

    fn insert(&mut self, index: usize, key: Self::Key) -> Result<(), IndexOutOfRange> {
        check_position(index, self.len())?;
        let prio = self.rng.next_u64() as u32;
        let node = Some(Box::new(Node::new(key, prio)));
        let (left, right) = Self::split(self.root.take(), index);
        self.root = Self::merge(Self::merge(left, node), right);
        Ok(())
    }

    fn remove(&mut self, index: usize) -> Result<Self::Key, IndexOutOfRange> {
        let len = self.len();
        check_index(index, len)?;

        let (left, rest) = Self::split(self.root.take(), index);
        let (target, right) = Self::split(rest, 1);
        self.root = Self::merge(left, right);
        target
            .map(|node| node.key)
            .ok_or(IndexOutOfRange::Index { index, len })
    }

    fn set(&mut self, index: usize, key: Self::Key) -> Result<(), IndexOutOfRange> {
        check_index(index, self.len())?;
        Self::set_node(&mut self.root, index, key);
        Ok(())
    }
}

impl<P: LazyMapMonoid> SequenceSplitMerge for ImplicitTreap<P> {
    fn split_at(&mut self, index: usize) -> Result<Self, IndexOutOfRange> {
        check_position(index, self.len())?;
        let (left, right) = Self::split(self.root.take(), index);
        self.root = left;
        trace!(
            left = self.len(),
            right = Node::size(&right),
            "split treap"
        );
        Ok(Self {
            root: right,
            rng: self.rng.fork(),
        })
    }

    fn merge(&mut self, right: Self) {
        self.root = Self::merge(self.root.take(), right.root);
    }
}

impl<P: LazyMapMonoid> SequenceAgg for ImplicitTreap<P> {
    type Agg = P::Agg;

    fn fold<R: RangeBounds<usize>>(&mut self, range: R) -> Result<Self::Agg, IndexOutOfRange> {
        let (start, end) = normalize_range(range, self.len())?;
        Ok(Self::fold_range(&mut self.root, start, end))
    }
}

impl<P: LazyMapMonoid> SequenceLazy for ImplicitTreap<P> {
    type Act = P::Act;

    fn update<R: RangeBounds<usize>>(
        &mut self,
        range: R,
        act: Self::Act,
    ) -> Result<(), IndexOutOfRange> {
        let (start, end) = normalize_range(range, self.len())?;
        Self::update_range(&mut self.root, start, end, &act);
        Ok(())
    }
}
