use std::{collections::BTreeMap, fmt};

use quickcheck::{Arbitrary, Gen};

use pagekv::{BPlusTree, Config};

#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq)]
pub struct Key(pub i64);

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

fn range(g: &mut Gen, min_inclusive: usize, max_exclusive: usize) -> usize {
    assert!(max_exclusive > min_inclusive);
    let range = max_exclusive - min_inclusive;
    let generated = usize::arbitrary(g) % range;
    min_inclusive + generated
}

impl Arbitrary for Key {
    fn arbitrary(g: &mut Gen) -> Self {
        // a small keyspace produces plenty of overwrites
        let size = g.size().max(2);
        let space = range(g, 1, size) + 1;
        let magnitude = range(g, 1, space) as i64;

        if range(g, 0, 8) == 0 {
            Self(-magnitude)
        } else {
            Self(magnitude)
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        // key 0 is reserved, never shrink onto it
        Box::new(self.0.shrink().filter(|k| *k != 0).map(Key))
    }
}

#[derive(Debug, Clone)]
pub enum Op {
    Set(Key, u8),
    Get(Key),
    Scan(Key, isize),
}

use self::Op::*;

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        match range(g, 0, 5) {
            0 | 1 | 2 => Set(Key::arbitrary(g), u8::arbitrary(g)),
            3 => Get(Key::arbitrary(g)),
            4 => Scan(Key::arbitrary(g), range(g, 0, 80) as isize - 40),
            _ => panic!("impossible choice"),
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match *self {
            Set(ref k, v) => Box::new(k.shrink().map(move |sk| Set(sk, v))),
            Get(ref k) => Box::new(k.shrink().map(Get)),
            Scan(ref k, len) => Box::new(k.shrink().map(move |k| Scan(k, len))),
        }
    }
}

pub fn prop_tree_matches_btreemap(ops: Vec<Op>, small_fanout: bool) -> bool {
    let res = if small_fanout {
        prop_tree_matches_btreemap_inner::<2, 2>(ops)
    } else {
        prop_tree_matches_btreemap_inner::<3, 5>(ops)
    };

    if let Err(e) = res {
        eprintln!("hit error while running quickcheck on tree: {:?}", e);
        false
    } else {
        true
    }
}

fn prop_tree_matches_btreemap_inner<
    const LEAF_FANOUT: usize,
    const BRANCH_FANOUT: usize,
>(
    ops: Vec<Op>,
) -> pagekv::Result<()> {
    super::common::setup_logger();

    let mut tree: BPlusTree<LEAF_FANOUT, BRANCH_FANOUT> =
        Config::new().verify_invariants(true).tree();
    let mut reference: BTreeMap<Key, String> = BTreeMap::new();

    for op in ops {
        match op {
            Set(k, v) => {
                let stats_before = tree.stats();
                let old_actual = tree.insert(k.0, v.to_string());
                let old_reference = reference.insert(k, v.to_string());
                assert_eq!(
                    old_actual, old_reference,
                    "when setting key {:?}, expected old returned value to be {:?}\n{:?}",
                    k, old_reference, tree
                );
                if old_actual.is_some() {
                    assert_eq!(tree.stats(), stats_before);
                }
            }
            Get(k) => {
                let res1 = tree.search(k.0);
                let res2 = reference.get(&k).map(String::as_str);
                assert_eq!(res1, res2);
            }
            Scan(k, len) => {
                let take = len.unsigned_abs();
                let tree_iter = if len >= 0 {
                    tree.range(k.0..).take(take).collect::<Vec<_>>()
                } else {
                    tree.range(..=k.0).take(take).collect::<Vec<_>>()
                };
                let ref_iter = if len >= 0 {
                    reference
                        .range(k..)
                        .take(take)
                        .map(|(rk, rv)| (rk.0, rv.as_str()))
                        .collect::<Vec<_>>()
                } else {
                    reference
                        .range(..=k)
                        .take(take)
                        .map(|(rk, rv)| (rk.0, rv.as_str()))
                        .collect::<Vec<_>>()
                };

                assert_eq!(
                    tree_iter, ref_iter,
                    "expected {:?} while iterating from {:?} on tree: {:?}",
                    ref_iter, k, tree
                );
            }
        }

        tree.verify()?;
    }

    let everything: Vec<(i64, &str)> = tree.iter().collect();
    let expected: Vec<(i64, &str)> =
        reference.iter().map(|(k, v)| (k.0, v.as_str())).collect();
    assert_eq!(everything, expected);
    assert_eq!(tree.len(), reference.len());

    Ok(())
}
