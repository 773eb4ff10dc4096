//! `pagekv` holds the two in-memory primitives at the bottom of a
//! single-writer embedded key-value store:
//!
//! * [`Freelist`], which stages pages freed by a transaction until the
//!   transaction manager declares them unreachable, and then hands out
//!   contiguous runs of them again so the backing file does not have to grow.
//! * [`BPlusTree`], an ordered `i64 -> String` index whose leaves are linked
//!   left to right for ordered scans.
//!
//! Neither structure locks internally. Mutations must be serialized by the
//! caller, and reads may only run concurrently with other reads. [`Shared`]
//! packages that discipline behind a reader/writer lock.
//!
//! # Examples
//!
//! ```
//! use pagekv::{BPlusTree, Freelist};
//!
//! let mut freelist = Freelist::new();
//! freelist.free(7, 12, 1);
//! freelist.release(7);
//! assert_eq!(freelist.allocate(2), Some(12));
//!
//! let mut tree: BPlusTree = BPlusTree::new();
//! tree.insert(42, "forty two");
//! assert_eq!(tree.search(42), Some("forty two"));
//! assert_eq!(tree.search(43), None);
//! ```
#![cfg_attr(
    test,
    deny(
        missing_docs,
        future_incompatible,
        nonstandard_style,
        rust_2018_idioms,
    )
)]

mod concurrency_control;
mod config;
mod freelist;
mod iter;
mod leaf;
mod node;
mod result;
mod tree;

pub use crate::{
    concurrency_control::Shared,
    config::Config,
    freelist::Freelist,
    iter::Iter,
    result::{Error, Result},
    tree::{BPlusTree, Stats},
};

/// Identifies a fixed-size page of the backing file.
pub type PageId = u64;

/// Identifies a transaction. Transaction ids only ever increase.
pub type TxId = u64;

/// Pages `0` and `1` hold the two alternating meta pages and can never be
/// freed or allocated.
pub const META_PAGES: PageId = 2;

/// Keys may not be `0`: a persisted branch encodes its catch-all separator
/// as key `0`.
pub const RESERVED_KEY: i64 = 0;

use crate::{
    leaf::Leaf,
    node::{Branch, Node, NodeId, Separator},
};
