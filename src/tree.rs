use std::ops::{Bound, RangeBounds};

use crate::result::ensure;
use crate::*;

/// Structural counters of a `BPlusTree`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Number of distinct keys.
    pub len: usize,
    /// Number of leaf nodes.
    pub leaves: usize,
    /// Number of branch nodes, including the root.
    pub branches: usize,
    /// Number of levels, counting the root and the leaves.
    pub height: usize,
}

/// An ordered `i64 -> String` index.
///
/// Values live in leaves holding up to `LEAF_FANOUT` entries each, which
/// are chained left to right for ordered scans. Branches route to up to
/// `BRANCH_FANOUT` children. The root is always a branch, so a new tree
/// already has a height of 2. Nodes split when they overflow and are never
/// merged or removed.
///
/// Key `0` is reserved, see [`RESERVED_KEY`].
///
/// # Examples
///
/// ```
/// let mut tree: pagekv::BPlusTree<4, 4> = pagekv::BPlusTree::new();
///
/// for key in (1..=100).rev() {
///     tree.insert(key, key.to_string());
/// }
///
/// assert_eq!(tree.search(57), Some("57"));
/// assert_eq!(tree.insert(57, "fifty seven"), Some("57".to_string()));
///
/// let keys: Vec<i64> = tree.range(10..13).map(|(k, _)| k).collect();
/// assert_eq!(keys, vec![10, 11, 12]);
/// ```
#[derive(Debug, Clone)]
pub struct BPlusTree<const LEAF_FANOUT: usize = 64, const BRANCH_FANOUT: usize = 64>
{
    nodes: Vec<Node<LEAF_FANOUT, BRANCH_FANOUT>>,
    root: NodeId,
    first: NodeId,
    len: usize,
    leaves: usize,
    branches: usize,
    height: usize,
    config: Config,
}

impl<'a, const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize> IntoIterator
    for &'a BPlusTree<LEAF_FANOUT, BRANCH_FANOUT>
{
    type Item = (i64, &'a str);
    type IntoIter = Iter<'a, LEAF_FANOUT, BRANCH_FANOUT>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize> Default
    for BPlusTree<LEAF_FANOUT, BRANCH_FANOUT>
{
    fn default() -> Self {
        BPlusTree::with_config(Config::default())
    }
}

impl<const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize>
    BPlusTree<LEAF_FANOUT, BRANCH_FANOUT>
{
    const FANOUT_CHECK: () = assert!(
        LEAF_FANOUT >= 2 && BRANCH_FANOUT >= 2,
        "leaf and branch fanouts must both be at least 2"
    );

    /// Returns an empty tree with the default `Config`.
    pub fn new() -> Self {
        BPlusTree::default()
    }

    pub(crate) fn with_config(config: Config) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::FANOUT_CHECK;

        let root = NodeId(0);
        let first = NodeId(1);

        BPlusTree {
            nodes: vec![
                Node::Branch(Branch::catch_all(first)),
                Node::Leaf(Leaf::empty(root)),
            ],
            root,
            first,
            len: 0,
            leaves: 1,
            branches: 1,
            height: 2,
            config,
        }
    }

    /// Returns the value stored under `key`.
    pub fn search(&self, key: i64) -> Option<&str> {
        self.leaf(self.find_leaf(key)).get(key)
    }

    /// Inserts `value` under `key`, returning the value it replaced.
    ///
    /// Overwriting an existing key never changes the shape of the tree.
    ///
    /// # Panics
    ///
    /// Panics if `key` is [`RESERVED_KEY`].
    pub fn insert<V: Into<String>>(
        &mut self,
        key: i64,
        value: V,
    ) -> Option<String> {
        assert_ne!(
            key, RESERVED_KEY,
            "key {} is reserved for the catch-all separator",
            RESERVED_KEY
        );

        let (mut path, leaf_id) = self.path_to_leaf(key);

        let rhs_id = NodeId(self.nodes.len());
        let leaf = self.leaf_mut(leaf_id);

        if let Some(old) = leaf.insert(key, value.into()) {
            return Some(old);
        }

        let split = leaf.split_if_overfull(rhs_id);
        self.len += 1;

        if let Some((separator, rhs)) = split {
            self.nodes.push(Node::Leaf(rhs));
            self.leaves += 1;
            self.install_split(&mut path, leaf_id, separator, rhs_id);
        }

        self.verify_if_configured();

        None
    }

    /// Iterates over every entry in ascending key order.
    pub fn iter(&self) -> Iter<'_, LEAF_FANOUT, BRANCH_FANOUT> {
        Iter::new(self, self.first, 0, Bound::Unbounded)
    }

    /// Iterates over the entries whose keys fall within `range`, in
    /// ascending key order.
    pub fn range<R: RangeBounds<i64>>(
        &self,
        range: R,
    ) -> Iter<'_, LEAF_FANOUT, BRANCH_FANOUT> {
        let (leaf, offset) = match range.start_bound() {
            Bound::Unbounded => (self.first, 0),
            Bound::Included(&key) => {
                let id = self.find_leaf(key);
                (id, self.leaf(id).lower_bound(key))
            }
            Bound::Excluded(&key) => {
                let id = self.find_leaf(key);
                (id, self.leaf(id).upper_bound(key))
            }
        };

        Iter::new(self, leaf, offset, range.end_bound().cloned())
    }

    /// The number of distinct keys.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the structural counters of the tree.
    pub fn stats(&self) -> Stats {
        Stats {
            len: self.len,
            leaves: self.leaves,
            branches: self.branches,
            height: self.height,
        }
    }

    pub(crate) fn leaf(&self, id: NodeId) -> &Leaf<LEAF_FANOUT> {
        match &self.nodes[id.0] {
            Node::Leaf(leaf) => leaf,
            Node::Branch(_) => {
                panic!("expected node {} to be a leaf, found a branch", id)
            }
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut Leaf<LEAF_FANOUT> {
        match &mut self.nodes[id.0] {
            Node::Leaf(leaf) => leaf,
            Node::Branch(_) => {
                panic!("expected node {} to be a leaf, found a branch", id)
            }
        }
    }

    fn branch_mut(&mut self, id: NodeId) -> &mut Branch<BRANCH_FANOUT> {
        match &mut self.nodes[id.0] {
            Node::Branch(branch) => branch,
            Node::Leaf(_) => {
                panic!("expected node {} to be a branch, found a leaf", id)
            }
        }
    }

    fn find_leaf(&self, key: i64) -> NodeId {
        let mut cursor = self.root;
        loop {
            match &self.nodes[cursor.0] {
                Node::Leaf(_) => return cursor,
                Node::Branch(branch) => cursor = branch.child(branch.route(key)),
            }
        }
    }

    /// Like `find_leaf`, also returning each branch passed on the way down
    /// along with the index of the slot that was followed.
    fn path_to_leaf(&self, key: i64) -> (Vec<(NodeId, usize)>, NodeId) {
        let mut path = Vec::with_capacity(self.height);
        let mut cursor = self.root;
        loop {
            match &self.nodes[cursor.0] {
                Node::Leaf(_) => return (path, cursor),
                Node::Branch(branch) => {
                    let index = branch.route(key);
                    path.push((cursor, index));
                    cursor = branch.child(index);
                }
            }
        }
    }

    /// Hooks the split of `lhs` into `rhs` into the parent recorded at the
    /// end of `path`, splitting branches upward for as long as they
    /// overflow.
    fn install_split(
        &mut self,
        path: &mut Vec<(NodeId, usize)>,
        mut lhs: NodeId,
        mut separator: i64,
        mut rhs: NodeId,
    ) {
        while let Some((parent_id, index)) = path.pop() {
            let new_id = NodeId(self.nodes.len());
            let parent = self.branch_mut(parent_id);

            parent.split_child(index, separator, lhs, rhs);

            let Some((median, new_branch)) = parent.split_if_overfull() else {
                return;
            };

            log::debug!(
                "split branch {} at separator {} into {} + {} children, new branch {}",
                parent_id,
                median,
                parent.len(),
                new_branch.len(),
                new_id,
            );

            let moved: Vec<NodeId> =
                new_branch.children().map(|(_, child)| child).collect();

            self.nodes.push(Node::Branch(new_branch));
            self.branches += 1;

            for child in moved {
                self.nodes[child.0].set_parent(new_id);
            }

            lhs = parent_id;
            separator = median;
            rhs = new_id;
        }

        self.grow(lhs, separator, rhs);
    }

    /// Puts a new root above the two halves of the old one.
    fn grow(&mut self, lhs: NodeId, separator: i64, rhs: NodeId) {
        assert_eq!(lhs, self.root, "only the root may split without a parent");

        let new_root = NodeId(self.nodes.len());
        self.nodes.push(Node::Branch(Branch::root(lhs, separator, rhs)));
        self.nodes[lhs.0].set_parent(new_root);
        self.nodes[rhs.0].set_parent(new_root);

        self.root = new_root;
        self.branches += 1;
        self.height += 1;

        log::debug!(
            "root split at separator {}, new root {} and height {}",
            separator,
            new_root,
            self.height
        );
    }

    /// Checks every structural invariant: node fill, key order within and
    /// across nodes, separators, parent links, uniform leaf depth, the
    /// leaf chain and the counters.
    pub fn verify(&self) -> Result<()> {
        ensure!(
            self.nodes.len() == self.leaves + self.branches,
            "arena holds {} nodes but counters say {} leaves and {} branches",
            self.nodes.len(),
            self.leaves,
            self.branches
        );
        ensure!(
            matches!(self.nodes[self.root.0], Node::Branch(_)),
            "root {} is not a branch",
            self.root
        );

        let mut in_order = Vec::with_capacity(self.leaves);
        let mut branches = 0;

        self.verify_subtree(
            self.root,
            None,
            None,
            Separator::CatchAll,
            1,
            &mut in_order,
            &mut branches,
        )?;

        ensure!(
            in_order.len() == self.leaves && branches == self.branches,
            "reached {} leaves and {} branches, counters say {} and {}",
            in_order.len(),
            branches,
            self.leaves,
            self.branches
        );

        let mut cursor = Some(self.first);
        let mut visited = 0;
        let mut entries = 0;
        let mut last_key: Option<i64> = None;

        while let Some(id) = cursor {
            ensure!(
                in_order.get(visited) == Some(&id),
                "leaf chain visits {} at position {}, tree order has {:?}",
                id,
                visited,
                in_order.get(visited)
            );

            let leaf = self.leaf(id);
            for key in leaf.keys() {
                if let Some(prev) = last_key {
                    ensure!(
                        prev < key,
                        "leaf chain yields {} after {}",
                        key,
                        prev
                    );
                }
                last_key = Some(key);
                entries += 1;
            }

            visited += 1;
            cursor = leaf.next;
        }

        ensure!(
            visited == in_order.len(),
            "leaf chain visits {} leaves out of {}",
            visited,
            in_order.len()
        );
        ensure!(
            entries == self.len,
            "leaf chain yields {} entries but len is {}",
            entries,
            self.len
        );

        Ok(())
    }

    /// `lower` is an exclusive bound on the keys of the subtree and `upper`
    /// the separator leading to it, which must equal its largest key.
    #[allow(clippy::too_many_arguments)]
    fn verify_subtree(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        lower: Option<i64>,
        upper: Separator,
        depth: usize,
        in_order: &mut Vec<NodeId>,
        branches: &mut usize,
    ) -> Result<()> {
        let node = &self.nodes[id.0];

        ensure!(
            node.parent() == parent,
            "node {} points at parent {:?} but hangs below {:?}",
            id,
            node.parent(),
            parent
        );

        match node {
            Node::Leaf(leaf) => {
                ensure!(
                    depth == self.height,
                    "leaf {} sits at depth {} in a tree of height {}",
                    id,
                    depth,
                    self.height
                );
                ensure!(
                    leaf.len() <= LEAF_FANOUT,
                    "leaf {} holds {} entries, more than {}",
                    id,
                    leaf.len(),
                    LEAF_FANOUT
                );
                if self.leaves > 1 {
                    ensure!(
                        leaf.len() >= LEAF_FANOUT.div_ceil(2),
                        "leaf {} holds {} entries, fewer than {}",
                        id,
                        leaf.len(),
                        LEAF_FANOUT.div_ceil(2)
                    );
                }

                let mut prev = lower;
                for key in leaf.keys() {
                    if let Some(prev) = prev {
                        ensure!(
                            prev < key,
                            "leaf {} holds {} after {}",
                            id,
                            key,
                            prev
                        );
                    }
                    ensure!(
                        Separator::Key(key) <= upper,
                        "leaf {} holds {} above its separator {:?}",
                        id,
                        key,
                        upper
                    );
                    prev = Some(key);
                }

                if let Separator::Key(max) = upper {
                    ensure!(
                        prev == Some(max),
                        "leaf {} is routed up to {} but its largest key is {:?}",
                        id,
                        max,
                        prev
                    );
                }

                in_order.push(id);
            }
            Node::Branch(branch) => {
                *branches += 1;

                let min_children = if parent.is_none() {
                    1
                } else {
                    BRANCH_FANOUT.div_ceil(2)
                };
                ensure!(
                    branch.len() >= min_children
                        && branch.len() <= BRANCH_FANOUT,
                    "branch {} has {} children, outside of {}..={}",
                    id,
                    branch.len(),
                    min_children,
                    BRANCH_FANOUT
                );

                let mut child_lower = lower;
                let mut last = None;
                for (separator, child) in branch.children() {
                    if let Some(prev) = child_lower {
                        ensure!(
                            Separator::Key(prev) < separator,
                            "branch {} has separator {:?} after {}",
                            id,
                            separator,
                            prev
                        );
                    }

                    self.verify_subtree(
                        child,
                        Some(id),
                        child_lower,
                        separator,
                        depth + 1,
                        in_order,
                        branches,
                    )?;

                    last = Some(separator);
                    child_lower = match separator {
                        Separator::Key(key) => Some(key),
                        Separator::CatchAll => None,
                    };
                }

                ensure!(
                    last == Some(upper),
                    "branch {} ends with separator {:?} but is routed by {:?}",
                    id,
                    last,
                    upper
                );
            }
        }

        Ok(())
    }

    fn verify_if_configured(&self) {
        if self.config.verify_invariants {
            if let Err(e) = self.verify() {
                panic!("{}", e);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_tree_shape() {
        let tree: BPlusTree<4, 4> = BPlusTree::new();
        assert_eq!(
            tree.stats(),
            Stats { len: 0, leaves: 1, branches: 1, height: 2 }
        );
        assert_eq!(tree.search(1), None);
        assert!(tree.is_empty());
        tree.verify().unwrap();
    }

    #[test]
    fn first_split_keeps_first_leaf() {
        let mut tree: BPlusTree<2, 3> = BPlusTree::new();
        let first = tree.first;

        tree.insert(5, "5");
        tree.insert(9, "9");
        tree.insert(1, "1");

        assert_eq!(tree.first, first);
        assert_eq!(tree.stats().leaves, 2);
        assert_eq!(tree.leaf(first).keys().collect::<Vec<_>>(), vec![1, 5]);
        tree.verify().unwrap();
    }

    #[test]
    fn root_growth_reparents_both_halves() {
        let mut tree: BPlusTree<2, 2> = BPlusTree::new();
        for key in 1..=20 {
            tree.insert(key, key.to_string());
            tree.verify().unwrap();
        }

        assert!(tree.stats().height > 3);
        assert_eq!(tree.nodes[tree.root.0].parent(), None);
    }

    #[test]
    #[should_panic(expected = "reserved")]
    fn reserved_key_is_rejected() {
        let mut tree: BPlusTree = BPlusTree::new();
        tree.insert(RESERVED_KEY, "nope");
    }

    #[test]
    fn verify_catches_a_broken_chain() {
        let mut tree: BPlusTree<2, 2> = BPlusTree::new();
        for key in 1..=6 {
            tree.insert(key, "v");
        }
        let first = tree.first;
        tree.leaf_mut(first).next = None;

        assert!(matches!(tree.verify(), Err(Error::ReportableBug(_))));
    }
}
