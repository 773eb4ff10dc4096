use crate::NodeId;

/// A leaf of the index. Holds up to `LEAF_FANOUT` entries at rest, plus one
/// staging slot that is only occupied between an insert and the split it
/// triggers.
#[derive(Debug, Clone)]
pub(crate) struct Leaf<const LEAF_FANOUT: usize> {
    entries: Vec<(i64, String)>,
    /// The leaf immediately to the right, if any.
    pub next: Option<NodeId>,
    /// Leaves always have a parent because the root is always a branch.
    pub parent: NodeId,
}

impl<const LEAF_FANOUT: usize> Leaf<LEAF_FANOUT> {
    pub(crate) fn empty(parent: NodeId) -> Leaf<LEAF_FANOUT> {
        Leaf {
            entries: Vec::with_capacity(LEAF_FANOUT + 1),
            next: None,
            parent,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, key: i64) -> Option<&str> {
        let idx = self.entries.binary_search_by_key(&key, |(k, _)| *k).ok()?;
        Some(&self.entries[idx].1)
    }

    pub(crate) fn entry(&self, idx: usize) -> Option<(i64, &str)> {
        self.entries.get(idx).map(|(k, v)| (*k, v.as_str()))
    }

    /// The index of the first entry whose key is not below `key`.
    pub(crate) fn lower_bound(&self, key: i64) -> usize {
        self.entries.partition_point(|(k, _)| *k < key)
    }

    /// The index of the first entry whose key is above `key`.
    pub(crate) fn upper_bound(&self, key: i64) -> usize {
        self.entries.partition_point(|(k, _)| *k <= key)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    /// Inserts or overwrites `key`, returning the previous value.
    ///
    /// A new key may leave the leaf one entry over capacity, see
    /// `split_if_overfull`.
    pub(crate) fn insert(&mut self, key: i64, value: String) -> Option<String> {
        match self.entries.binary_search_by_key(&key, |(k, _)| *k) {
            Ok(idx) => Some(std::mem::replace(&mut self.entries[idx].1, value)),
            Err(idx) => {
                assert!(
                    self.entries.len() <= LEAF_FANOUT,
                    "inserting into a leaf that should have been split"
                );
                self.entries.insert(idx, (key, value));
                None
            }
        }
    }

    /// Splits an over-full leaf. The lower half stays, the upper half moves
    /// into a new leaf that will live at `rhs_id`, right after this one in
    /// the leaf chain. Returns the largest key remaining in this leaf along
    /// with the new leaf.
    pub(crate) fn split_if_overfull(
        &mut self,
        rhs_id: NodeId,
    ) -> Option<(i64, Leaf<LEAF_FANOUT>)> {
        if self.entries.len() <= LEAF_FANOUT {
            return None;
        }

        let original_len = self.entries.len();
        let split_offset = original_len.div_ceil(2);

        let mut data = Vec::with_capacity(LEAF_FANOUT + 1);
        data.extend(self.entries.drain(split_offset..));

        let separator = self.entries[split_offset - 1].0;

        log::trace!(
            "split leaf at separator {} into {} + {} entries, new leaf {}",
            separator,
            self.entries.len(),
            data.len(),
            rhs_id,
        );

        let rhs = Leaf {
            entries: data,
            next: self.next.replace(rhs_id),
            parent: self.parent,
        };

        assert_eq!(rhs.entries.len() + self.entries.len(), original_len);

        Some((separator, rhs))
    }
}
