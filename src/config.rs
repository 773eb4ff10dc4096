use super::*;

/// Top-level configuration for the freelist and the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// When false, `Freelist::allocate` never hands out freed pages and
    /// callers always grow the file. Defaults to true, unless the
    /// `monotonic-behavior` feature is enabled.
    pub reuse_pages: bool,
    /// Run the full invariant check after every mutation and panic if it
    /// fails. This is expensive. Defaults to false, unless the
    /// `for-internal-testing-only` feature is enabled.
    pub verify_invariants: bool,
    /// Capacity hint for the list of reusable pages.
    pub free_list_capacity: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            reuse_pages: cfg!(not(feature = "monotonic-behavior")),
            verify_invariants: cfg!(feature = "for-internal-testing-only"),
            free_list_capacity: 0,
        }
    }
}

macro_rules! builder {
    ($(($name:ident, $get:ident, $set:ident, $t:ty, $desc:expr)),*) => {
        $(
            #[doc="Get "]
            #[doc=$desc]
            pub fn $get(&self) -> $t {
                self.$name
            }

            #[doc="Set "]
            #[doc=$desc]
            pub fn $set(&mut self, to: $t) {
                self.$name = to;
            }

            #[doc="Builder, set "]
            #[doc=$desc]
            pub fn $name(&self, to: $t) -> Config {
                let mut ret = *self;
                ret.$name = to;
                ret
            }
        )*
    }
}

impl Config {
    /// Returns a default `Config`.
    pub fn new() -> Config {
        Config::default()
    }

    builder!(
        (reuse_pages, get_reuse_pages, set_reuse_pages, bool, "whether freed pages are handed out again"),
        (verify_invariants, get_verify_invariants, set_verify_invariants, bool, "whether every mutation is followed by a full invariant check"),
        (free_list_capacity, get_free_list_capacity, set_free_list_capacity, usize, "capacity hint for the list of reusable pages")
    );

    /// Create an empty `Freelist` based on this configuration.
    pub fn freelist(&self) -> Freelist {
        Freelist::with_config(*self)
    }

    /// Create an empty `BPlusTree` based on this configuration.
    pub fn tree<const LEAF_FANOUT: usize, const BRANCH_FANOUT: usize>(
        &self,
    ) -> BPlusTree<LEAF_FANOUT, BRANCH_FANOUT> {
        BPlusTree::with_config(*self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builder_leaves_original_untouched() {
        let base = Config::new();
        let strict = base.verify_invariants(true).free_list_capacity(64);

        assert!(strict.get_verify_invariants());
        assert_eq!(strict.get_free_list_capacity(), 64);
        assert_eq!(base.get_free_list_capacity(), 0);
        assert_eq!(base.get_reuse_pages(), strict.get_reuse_pages());
    }

    #[test]
    fn setters_mutate_in_place() {
        let mut config = Config::new();
        config.set_reuse_pages(false);
        assert!(!config.reuse_pages);

        let mut freelist = config.freelist();
        freelist.free(1, 2, 0);
        freelist.release(1);
        assert_eq!(freelist.allocate(1), None);
        assert_eq!(freelist.free_page_ids(), &[2]);
    }
}
