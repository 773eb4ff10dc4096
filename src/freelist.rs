use std::collections::BTreeMap;

use fnv::FnvHashSet;

use crate::result::ensure;
use crate::*;

/// Registry of reusable pages plus the per-transaction staging area for
/// pages that were freed but may still be visible to open readers.
///
/// Pages freed by transaction `t` sit in `pending` until the transaction
/// manager calls `release(t)` (or a later txid), at which point they are
/// merged into the sorted `ids` list and become eligible for `allocate`.
#[derive(Debug, Clone)]
pub struct Freelist {
    /// Reusable pages, strictly ascending.
    ids: Vec<PageId>,
    /// Pages freed by each transaction, in the order they were freed.
    pending: BTreeMap<TxId, Vec<PageId>>,
    /// Every page in `ids` or in any `pending` list.
    cache: FnvHashSet<PageId>,
    config: Config,
}

impl Default for Freelist {
    fn default() -> Freelist {
        Freelist::with_config(Config::default())
    }
}

impl Freelist {
    /// Returns an empty freelist with the default `Config`.
    pub fn new() -> Freelist {
        Freelist::default()
    }

    pub(crate) fn with_config(config: Config) -> Freelist {
        let mut cache = FnvHashSet::default();
        cache.reserve(config.free_list_capacity);

        Freelist {
            ids: Vec::with_capacity(config.free_list_capacity),
            pending: BTreeMap::new(),
            cache,
            config,
        }
    }

    /// Stages page `start` and its `overflow` continuation pages for reuse
    /// once `txid` is released.
    ///
    /// # Panics
    ///
    /// Freeing a meta page, or a page that is already free or pending, is
    /// a bug in the caller's transaction bookkeeping and panics. The whole
    /// range is checked before anything is staged.
    pub fn free(&mut self, txid: TxId, start: PageId, overflow: u32) {
        let Some(end) = start.checked_add(PageId::from(overflow)) else {
            panic!(
                "page range starting at {} with {} overflow pages exceeds the page id space",
                start, overflow
            );
        };

        if let Err(e) = self.check_free(start, end) {
            panic!("{}", e);
        }

        let staged = self.pending.entry(txid).or_default();
        for id in start..=end {
            staged.push(id);
            self.cache.insert(id);
        }

        log::trace!(
            "txn {} freed pages {}..={}, {} pending",
            txid,
            start,
            end,
            staged.len()
        );

        self.verify_if_configured();
    }

    fn check_free(&self, start: PageId, end: PageId) -> Result<()> {
        if start < META_PAGES {
            return Err(Error::ReservedPage(start));
        }
        if let Some(id) = (start..=end).find(|id| self.cache.contains(id)) {
            return Err(Error::DoubleFree(id));
        }
        Ok(())
    }

    /// Moves the pages of every pending transaction with an id of `txid`
    /// or lower into the reusable list. Releasing a txid with nothing
    /// pending is a no-op.
    pub fn release(&mut self, txid: TxId) {
        let still_pending = match txid.checked_add(1) {
            Some(next) => self.pending.split_off(&next),
            None => BTreeMap::new(),
        };
        let released = std::mem::replace(&mut self.pending, still_pending);

        if released.is_empty() {
            return;
        }

        let txns = released.len();

        // released pages stay in the cache because they are still free
        let mut batch: Vec<PageId> = released.into_values().flatten().collect();
        batch.sort_unstable();

        self.ids = merge_sorted(&self.ids, &batch);

        log::trace!(
            "released {} pages from {} txns up to {}, {} now reusable",
            batch.len(),
            txns,
            txid,
            self.ids.len()
        );

        self.verify_if_configured();
    }

    /// Finds the first run of `n` consecutive reusable pages, removes it
    /// from the free list and returns its first page.
    ///
    /// Returns `None` when no such run exists, in which case the caller is
    /// expected to grow the file instead. `allocate(0)` always returns
    /// `None` without touching anything.
    ///
    /// This is a linear scan: a run of consecutive ids cannot be located
    /// by bisection.
    pub fn allocate(&mut self, n: usize) -> Option<PageId> {
        if n == 0 || self.ids.is_empty() || !self.config.reuse_pages {
            return None;
        }

        let run = n as PageId;
        let mut initial: PageId = 0;
        let mut previd: PageId = 0;
        let mut run_end = None;

        for (i, &id) in self.ids.iter().enumerate() {
            assert!(
                id >= META_PAGES,
                "invalid page allocation: reserved page {} found in the free list",
                id
            );

            if previd == 0 || id - previd != 1 {
                initial = id;
            }

            if id - initial + 1 == run {
                run_end = Some(i);
                break;
            }

            previd = id;
        }

        let end = run_end?;

        for allocated in self.ids.drain(end + 1 - n..=end) {
            self.cache.remove(&allocated);
        }

        log::trace!("allocated {} pages starting at {}", n, initial);

        self.verify_if_configured();

        Some(initial)
    }

    /// The number of reusable pages.
    pub fn free_count(&self) -> usize {
        self.ids.len()
    }

    /// The number of pages staged across all pending transactions.
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// The number of pages that are either reusable or pending. This is
    /// how many ids a persisted freelist page has to hold.
    pub fn count(&self) -> usize {
        self.free_count() + self.pending_count()
    }

    /// The reusable pages, in ascending order.
    pub fn free_page_ids(&self) -> &[PageId] {
        &self.ids
    }

    /// The pages staged by `txid`, in the order they were freed.
    pub fn pending_page_ids(&self, txid: TxId) -> Option<&[PageId]> {
        self.pending.get(&txid).map(Vec::as_slice)
    }

    /// Reusable and pending pages as one sorted list.
    ///
    /// A persisted freelist includes pending pages, because after a crash
    /// the transactions holding them back no longer exist.
    pub fn all_page_ids(&self) -> Vec<PageId> {
        let mut pending: Vec<PageId> =
            self.pending.values().flatten().copied().collect();
        pending.sort_unstable();
        merge_sorted(&self.ids, &pending)
    }

    /// Whether `page` is reusable or pending.
    pub fn is_freed(&self, page: PageId) -> bool {
        self.cache.contains(&page)
    }

    /// Replaces the reusable pages with `ids`, in any order, and rebuilds
    /// the membership cache. Pending pages are kept.
    ///
    /// Unlike `free`, bad input is reported as an error rather than a
    /// panic, because these ids come from storage rather than from the
    /// transaction manager. On error the freelist is left unchanged.
    pub fn read_ids(&mut self, mut ids: Vec<PageId>) -> Result<()> {
        ids.sort_unstable();

        if let Some(&first) = ids.first() {
            if first < META_PAGES {
                return Err(Error::ReservedPage(first));
            }
        }
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::DoubleFree(pair[0]));
        }
        if let Some(&id) = self
            .pending
            .values()
            .flatten()
            .find(|id| ids.binary_search(id).is_ok())
        {
            return Err(Error::DoubleFree(id));
        }

        log::debug!("loaded {} reusable pages", ids.len());

        self.ids = ids;
        self.reindex();

        Ok(())
    }

    /// Rebuilds the membership cache from the reusable and pending pages.
    pub fn reindex(&mut self) {
        self.cache.clear();
        self.cache.extend(self.ids.iter().copied());
        self.cache.extend(self.pending.values().flatten().copied());
    }

    /// Checks every freelist invariant.
    pub fn verify(&self) -> Result<()> {
        for pair in self.ids.windows(2) {
            ensure!(
                pair[0] < pair[1],
                "free list is not strictly ascending: {} then {}",
                pair[0],
                pair[1]
            );
        }

        let mut seen = FnvHashSet::default();
        let pending = self.pending.iter().flat_map(|(txid, ids)| {
            ids.iter().map(move |id| (Some(*txid), *id))
        });
        for (txid, id) in self.ids.iter().map(|id| (None, *id)).chain(pending)
        {
            ensure!(
                id >= META_PAGES,
                "reserved page {} is tracked as free (pending for {:?})",
                id,
                txid
            );
            ensure!(
                seen.insert(id),
                "page {} is tracked twice (second time pending for {:?})",
                id,
                txid
            );
            ensure!(
                self.cache.contains(&id),
                "free page {} is missing from the cache",
                id
            );
        }

        ensure!(
            seen.len() == self.cache.len(),
            "cache holds {} pages but only {} are free or pending",
            self.cache.len(),
            seen.len()
        );

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

/// Merges two ascending lists into one ascending list.
fn merge_sorted(a: &[PageId], b: &[PageId]) -> Vec<PageId> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i] <= b[j] {
            merged.push(a[i]);
            i += 1;
        } else {
            merged.push(b[j]);
            j += 1;
        }
    }

    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}
