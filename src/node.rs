use std::fmt;

use crate::Leaf;

/// Position of a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The routing key of a branch slot: the largest key that may be found in
/// that slot's subtree.
///
/// `CatchAll` sorts after every real key, and terminates every branch on
/// the right edge of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Separator {
    Key(i64),
    CatchAll,
}

#[derive(Debug, Clone)]
pub(crate) enum Node<const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize> {
    Leaf(Leaf<LEAF_FANOUT>),
    Branch(Branch<BRANCH_FANOUT>),
}

impl<const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize>
    Node<LEAF_FANOUT, BRANCH_FANOUT>
{
    pub(crate) fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => Some(leaf.parent),
            Node::Branch(branch) => branch.parent,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Branch(branch) => branch.parent = Some(parent),
        }
    }
}

/// An interior node. Holds up to `BRANCH_FANOUT` children at rest, plus one
/// staging slot that is only occupied between an insert and the split it
/// triggers.
#[derive(Debug, Clone)]
pub(crate) struct Branch<const BRANCH_FANOUT: usize> {
    children: Vec<(Separator, NodeId)>,
    pub parent: Option<NodeId>,
}

impl<const BRANCH_FANOUT: usize> Branch<BRANCH_FANOUT> {
    /// A branch routing every key to `child`.
    pub(crate) fn catch_all(child: NodeId) -> Branch<BRANCH_FANOUT> {
        let mut children = Vec::with_capacity(BRANCH_FANOUT + 1);
        children.push((Separator::CatchAll, child));
        Branch { children, parent: None }
    }

    /// A new root over the two halves of the previous root.
    pub(crate) fn root(
        lhs: NodeId,
        separator: i64,
        rhs: NodeId,
    ) -> Branch<BRANCH_FANOUT> {
        let mut children = Vec::with_capacity(BRANCH_FANOUT + 1);
        children.push((Separator::Key(separator), lhs));
        children.push((Separator::CatchAll, rhs));
        Branch { children, parent: None }
    }

    pub(crate) fn len(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn children(
        &self,
    ) -> impl Iterator<Item = (Separator, NodeId)> + '_ {
        self.children.iter().copied()
    }

    pub(crate) fn child(&self, index: usize) -> NodeId {
        self.children[index].1
    }

    /// The index of the child whose subtree may contain `key`: the first
    /// slot whose separator is not below it.
    ///
    /// # Panics
    ///
    /// Panics if `key` is above every separator, which means the key was
    /// routed to the wrong branch.
    pub(crate) fn route(&self, key: i64) -> usize {
        let index = self
            .children
            .partition_point(|(separator, _)| *separator < Separator::Key(key));

        assert!(
            index < self.children.len(),
            "key {} is above every separator of a branch whose last separator is {:?}",
            key,
            self.children.last().map(|(separator, _)| separator)
        );

        index
    }

    /// Records the split of the child at `index`: the slot now leads to
    /// `rhs`, which inherits its separator, and `lhs` is slotted in front
    /// of it under `separator`.
    ///
    /// May leave the branch one slot over capacity, see `split_if_overfull`.
    pub(crate) fn split_child(
        &mut self,
        index: usize,
        separator: i64,
        lhs: NodeId,
        rhs: NodeId,
    ) {
        assert!(self.children.len() <= BRANCH_FANOUT);
        assert_eq!(self.children[index].1, lhs);
        assert!(Separator::Key(separator) < self.children[index].0);
        if index > 0 {
            assert!(self.children[index - 1].0 < Separator::Key(separator));
        }

        self.children[index].1 = rhs;
        self.children.insert(index, (Separator::Key(separator), lhs));
    }

    /// Splits an over-full branch, keeping the lower half (including the
    /// median) and returning the median key with the upper half. The
    /// caller has to reparent the children of the returned branch.
    pub(crate) fn split_if_overfull(
        &mut self,
    ) -> Option<(i64, Branch<BRANCH_FANOUT>)> {
        if self.children.len() <= BRANCH_FANOUT {
            return None;
        }

        let split_offset = self.children.len().div_ceil(2);

        let mut moved = Vec::with_capacity(BRANCH_FANOUT + 1);
        moved.extend(self.children.drain(split_offset..));

        let median = match self.children[split_offset - 1].0 {
            Separator::Key(key) => key,
            Separator::CatchAll => {
                panic!("catch-all separator found below the median of a branch")
            }
        };

        let rhs = Branch { children: moved, parent: self.parent };

        Some((median, rhs))
    }
}
