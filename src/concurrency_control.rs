use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::*;

/// A cloneable handle that serializes writers and lets readers share
/// access, which is the discipline both `Freelist` and `BPlusTree`
/// expect from their callers.
///
/// # Examples
///
/// ```
/// use pagekv::{BPlusTree, Shared};
///
/// let tree: Shared<BPlusTree> = Shared::new(BPlusTree::new());
/// let reader = tree.clone();
///
/// tree.insert(1, "one");
/// assert_eq!(reader.search(1).as_deref(), Some("one"));
/// ```
#[derive(Debug, Default)]
pub struct Shared<T> {
    rw: Arc<RwLock<T>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Shared<T> {
        Shared { rw: self.rw.clone() }
    }
}

impl<T> Shared<T> {
    /// Wraps `inner` for shared use.
    pub fn new(inner: T) -> Shared<T> {
        Shared { rw: Arc::new(RwLock::new(inner)) }
    }

    /// Blocks until no writer holds the lock. Any number of readers may
    /// hold it at once.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.rw.read()
    }

    /// Blocks until every reader and writer has released the lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.rw.write()
    }
}

impl<const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize>
    Shared<BPlusTree<LEAF_FANOUT, BRANCH_FANOUT>>
{
    /// Returns a copy of the value stored under `key`.
    pub fn search(&self, key: i64) -> Option<String> {
        self.read().search(key).map(str::to_owned)
    }

    /// Inserts `value` under `key` while holding the write lock.
    pub fn insert<V: Into<String>>(&self, key: i64, value: V) -> Option<String> {
        self.write().insert(key, value)
    }
}

impl Shared<Freelist> {
    /// Calls `Freelist::free` while holding the write lock.
    pub fn free(&self, txid: TxId, start: PageId, overflow: u32) {
        self.write().free(txid, start, overflow)
    }

    /// Calls `Freelist::release` while holding the write lock.
    pub fn release(&self, txid: TxId) {
        self.write().release(txid)
    }

    /// Calls `Freelist::allocate` while holding the write lock.
    pub fn allocate(&self, n: usize) -> Option<PageId> {
        self.write().allocate(n)
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;

    #[test]
    fn readers_see_whole_inserts() {
        let tree: Shared<BPlusTree<4, 4>> = Shared::new(BPlusTree::new());

        thread::scope(|s| {
            let writer = tree.clone();
            s.spawn(move || {
                for key in 1..=2_000 {
                    writer.insert(key, key.to_string());
                }
            });

            for _ in 0..4 {
                let reader = tree.clone();
                s.spawn(move || {
                    for key in (1..=2_000).rev() {
                        if let Some(value) = reader.search(key) {
                            assert_eq!(value, key.to_string());
                        }
                    }
                    reader.read().verify().unwrap();
                });
            }
        });

        assert_eq!(tree.read().len(), 2_000);
    }

    #[test]
    fn freelist_handle() {
        let freelist = Shared::new(Freelist::new());
        let other = freelist.clone();

        freelist.free(3, 10, 2);
        other.release(3);
        assert_eq!(freelist.allocate(3), Some(10));
        assert_eq!(other.read().free_count(), 0);
    }
}
