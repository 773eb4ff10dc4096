use std::ops::Bound;

use super::*;

/// An iterator over the keys and values of a `BPlusTree`, in ascending
/// key order. Walks the leaf chain and never revisits a branch.
#[derive(Debug, Clone)]
pub struct Iter<'a, const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize> {
    tree: &'a BPlusTree<LEAF_FANOUT, BRANCH_FANOUT>,
    leaf: Option<NodeId>,
    offset: usize,
    hi: Bound<i64>,
}

impl<'a, const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize>
    Iter<'a, LEAF_FANOUT, BRANCH_FANOUT>
{
    pub(crate) fn new(
        tree: &'a BPlusTree<LEAF_FANOUT, BRANCH_FANOUT>,
        leaf: NodeId,
        offset: usize,
        hi: Bound<i64>,
    ) -> Self {
        Iter { tree, leaf: Some(leaf), offset, hi }
    }

    /// Iterate over the keys only.
    pub fn keys(self) -> impl Iterator<Item = i64> + 'a {
        self.map(|(k, _v)| k)
    }

    /// Iterate over the values only.
    pub fn values(self) -> impl Iterator<Item = &'a str> {
        self.map(|(_k, v)| v)
    }

    fn below_hi(&self, key: i64) -> bool {
        match self.hi {
            Bound::Unbounded => true,
            Bound::Included(hi) => key <= hi,
            Bound::Excluded(hi) => key < hi,
        }
    }
}

impl<'a, const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize> Iterator
    for Iter<'a, LEAF_FANOUT, BRANCH_FANOUT>
{
    type Item = (i64, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;

        loop {
            let leaf = tree.leaf(self.leaf?);

            if let Some((key, value)) = leaf.entry(self.offset) {
                if !self.below_hi(key) {
                    self.leaf = None;
                    return None;
                }

                self.offset += 1;
                return Some((key, value));
            }

            self.leaf = leaf.next;
            self.offset = 0;
        }
    }
}

impl<const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize>
    std::iter::FusedIterator for Iter<'_, LEAF_FANOUT, BRANCH_FANOUT>
{
}
