use std::{
    error::Error as StdError,
    fmt::{self, Display},
};

use crate::PageId;

/// The top-level result type for checks performed by the
/// `Freelist` and the `BPlusTree`.
pub type Result<T> = std::result::Result<T, Error>;

/// An Error type describing the ways the freelist or the index may be
/// misused or found to be internally inconsistent.
///
/// `Freelist::free` treats `ReservedPage` and `DoubleFree` as fatal and
/// panics with their `Display` text. They are only returned as values
/// where the input comes from outside the process, as in
/// `Freelist::read_ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// One of the meta pages was handed to the freelist.
    ReservedPage(PageId),
    /// A page was freed while it was already free or pending.
    DoubleFree(PageId),
    /// An internal invariant does not hold. Please open an issue!
    ReportableBug(String),
}

impl StdError for Error {}

impl Display for Error {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> std::result::Result<(), fmt::Error> {
        use self::Error::*;

        match *self {
            ReservedPage(page) => {
                write!(f, "cannot free reserved page {}", page)
            }
            DoubleFree(page) => write!(f, "double free of page {}", page),
            ReportableBug(ref e) => write!(
                f,
                "Unexpected bug has happened: {}. \
                 PLEASE REPORT THIS BUG!",
                e
            ),
        }
    }
}

/// Returns `Err(ReportableBug)` carrying the formatted message when the
/// condition does not hold.
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::Error::ReportableBug(format!($($arg)+)));
        }
    };
}

pub(crate) use ensure;
