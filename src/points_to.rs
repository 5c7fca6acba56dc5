use std::{
    collections::{hash_map::Entry, BTreeSet},
    fmt,
};

use rustc_hash::FxHashMap;

use crate::{
    node::NodeId,
    pointer::{Offset, Pointer},
};

/// Offsets recorded for one target. A target is either mapped to a non-empty
/// set of concrete offsets or saturated to `Unknown`; the saturation
/// invariant is structural.
#[derive(Clone, PartialEq, Eq)]
enum OffsetSet {
    Unknown,
    Concrete(BTreeSet<u64>),
}

/// A set of pointers. Inserting `(t, Unknown)` collapses every concrete
/// entry for `t`; inserting a concrete offset for a saturated target is a
/// no-op. Every mutation reports whether the denoted set grew, which is what
/// drives the solver's fixpoint detection.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PointsToSet {
    entries: FxHashMap<NodeId, OffsetSet>,
}

impl PointsToSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ptr: Pointer) -> bool {
        match self.entries.entry(ptr.target) {
            Entry::Occupied(mut e) => match (e.get_mut(), ptr.offset) {
                (OffsetSet::Unknown, _) => false,
                (offs, Offset::Unknown) => {
                    *offs = OffsetSet::Unknown;
                    true
                }
                (OffsetSet::Concrete(offs), Offset::Concrete(o)) => offs.insert(o),
            },
            Entry::Vacant(v) => {
                v.insert(match ptr.offset {
                    Offset::Unknown => OffsetSet::Unknown,
                    Offset::Concrete(o) => OffsetSet::Concrete(BTreeSet::from([o])),
                });
                true
            }
        }
    }

    pub fn union(&mut self, other: &PointsToSet) -> bool {
        let mut changed = false;
        for ptr in other.iter() {
            changed |= self.insert(ptr);
        }
        changed
    }

    /// Exact membership: a saturated target subsumes its concrete offsets
    /// but does not contain them.
    pub fn contains(&self, ptr: Pointer) -> bool {
        match (self.entries.get(&ptr.target), ptr.offset) {
            (Some(OffsetSet::Unknown), Offset::Unknown) => true,
            (Some(OffsetSet::Concrete(offs)), Offset::Concrete(o)) => offs.contains(&o),
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Pointer> + '_ {
        self.entries.iter().flat_map(|(&target, offs)| {
            let offs: Box<dyn Iterator<Item = Offset>> = match offs {
                OffsetSet::Unknown => Box::new(std::iter::once(Offset::Unknown)),
                OffsetSet::Concrete(offs) => Box::new(offs.iter().map(|&o| Offset::Concrete(o))),
            };
            offs.map(move |offset| Pointer::new(target, offset))
        })
    }

    pub fn targets(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries
            .values()
            .map(|offs| match offs {
                OffsetSet::Unknown => 1,
                OffsetSet::Concrete(offs) => offs.len(),
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PointsToSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ptrs: Vec<_> = self.iter().collect();
        ptrs.sort();
        f.debug_set().entries(ptrs).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: u32) -> NodeId {
        NodeId::from_raw(i)
    }

    #[test]
    fn insert_reports_change() {
        let mut s = PointsToSet::new();
        assert!(s.insert(Pointer::new(n(2), Offset::Concrete(0))));
        assert!(!s.insert(Pointer::new(n(2), Offset::Concrete(0))));
        assert!(s.insert(Pointer::new(n(2), Offset::Concrete(4))));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn unknown_subsumes_concrete() {
        let mut s = PointsToSet::new();
        s.insert(Pointer::new(n(2), Offset::Concrete(0)));
        s.insert(Pointer::new(n(2), Offset::Concrete(4)));
        assert!(s.insert(Pointer::new(n(2), Offset::Unknown)));
        assert_eq!(s.len(), 1);
        assert!(s.contains(Pointer::new(n(2), Offset::Unknown)));
        assert!(!s.contains(Pointer::new(n(2), Offset::Concrete(0))));
    }

    #[test]
    fn concrete_into_saturated_is_noop() {
        let mut s = PointsToSet::new();
        s.insert(Pointer::new(n(2), Offset::Unknown));
        assert!(!s.insert(Pointer::new(n(2), Offset::Concrete(8))));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn saturation_is_per_target() {
        let mut s = PointsToSet::new();
        s.insert(Pointer::new(n(2), Offset::Unknown));
        assert!(s.insert(Pointer::new(n(3), Offset::Concrete(8))));
        assert!(s.contains(Pointer::new(n(3), Offset::Concrete(8))));
    }

    #[test]
    fn union_reports_change() {
        let mut a = PointsToSet::new();
        a.insert(Pointer::new(n(2), Offset::Concrete(0)));
        let mut b = PointsToSet::new();
        b.insert(Pointer::new(n(2), Offset::Concrete(0)));
        b.insert(Pointer::new(n(3), Offset::Concrete(0)));
        assert!(a.union(&b));
        assert!(!a.union(&b));
        assert_eq!(a.len(), 2);
    }
}
