//! Identifier registries.
//!
//! A registry is a cache over on-disk state: it is filled by scanning the
//! package, mutated incrementally by structural operations, and can always be
//! rebuilt by scanning again. The same pattern serves both identifier
//! families; [`ShapeRegistry`] and [`RelationshipRegistry`] add the
//! family-specific scanning, validation and reuse rules on top of
//! [`IdRegistry`].
//!
//! # Allocation
//!
//! A running counter holds the next candidate ordinal. Registering an id
//! raises the counter past it; allocating takes the counter value and skips
//! any ordinal that is already registered. Allocation is lock-free on the
//! counter, so concurrent callers never receive the same id, and K consecutive
//! allocations return K strictly increasing ids. Once the largest ordinal has
//! been handed out or registered, allocation fails instead of wrapping.

mod relationship;
mod shape;

pub use relationship::{RelationshipInfo, RelationshipRegistry};
pub use shape::{ShapeInfo, ShapeRegistry};

use crate::common::{Error, Result};
use crate::ooxml::pptx::ids::{RelationshipId, ShapeId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// An identifier that can be produced from, and mapped back to, a counter value.
pub trait RegistryKey: Clone + Eq + Hash + Ord {
    /// Name of the identifier family, for messages.
    const FAMILY: &'static str;

    /// Counter value of this id, if it follows the allocatable shape.
    fn ordinal(&self) -> Option<u32>;

    /// Build the id for a counter value.
    fn from_ordinal(ordinal: u32) -> Self;
}

impl RegistryKey for ShapeId {
    const FAMILY: &'static str = "shape id";

    #[inline]
    fn ordinal(&self) -> Option<u32> {
        Some(self.get())
    }

    #[inline]
    fn from_ordinal(ordinal: u32) -> Self {
        // The counter starts at 1 and only grows
        ShapeId::new(ordinal).unwrap_or(ShapeId::MIN)
    }
}

impl RegistryKey for RelationshipId {
    const FAMILY: &'static str = "relationship id";

    #[inline]
    fn ordinal(&self) -> Option<u32> {
        self.number()
    }

    #[inline]
    fn from_ordinal(ordinal: u32) -> Self {
        RelationshipId::from_number(ordinal)
    }
}

/// Metadata that records which scope (slide, source part) owns an id.
pub trait Scoped {
    type Scope: PartialEq;

    fn scope(&self) -> &Self::Scope;
}

/// Thread-safe id → metadata map with a monotonic allocation counter.
#[derive(Debug)]
pub struct IdRegistry<K, M> {
    entries: RwLock<HashMap<K, M>>,
    /// Next candidate ordinal; `u32::MAX + 1` once the space is used up
    next: AtomicU64,
}

impl<K: RegistryKey, M: Clone> IdRegistry<K, M> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next: AtomicU64::new(1),
        }
    }

    /// Register an id, replacing any previous metadata. Returns the previous
    /// metadata.
    pub fn register(&self, id: K, meta: M) -> Option<M> {
        if let Some(ordinal) = id.ordinal() {
            self.next.fetch_max(u64::from(ordinal) + 1, Ordering::SeqCst);
        }
        self.entries.write().insert(id, meta)
    }

    /// Register an id only if it is not present yet. Returns whether it was
    /// inserted.
    pub fn register_new(&self, id: K, meta: M) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return false;
        }
        if let Some(ordinal) = id.ordinal() {
            self.next.fetch_max(u64::from(ordinal) + 1, Ordering::SeqCst);
        }
        entries.insert(id, meta);
        true
    }

    pub fn unregister(&self, id: &K) -> Option<M> {
        self.entries.write().remove(id)
    }

    pub fn lookup(&self, id: &K) -> Option<M> {
        self.entries.read().get(id).cloned()
    }

    pub fn contains(&self, id: &K) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All registered ids, sorted.
    pub fn ids(&self) -> Vec<K> {
        let mut ids: Vec<K> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of all entries, sorted by id.
    pub fn entries(&self) -> Vec<(K, M)> {
        let mut entries: Vec<(K, M)> = self
            .entries
            .read()
            .iter()
            .map(|(k, m)| (k.clone(), m.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Largest registered ordinal, 0 when empty.
    pub fn max_ordinal(&self) -> u32 {
        self.entries
            .read()
            .keys()
            .filter_map(|id| id.ordinal())
            .max()
            .unwrap_or(0)
    }

    /// Next id above the running maximum that is not registered.
    ///
    /// The id is reserved (the counter moves past it) but not registered.
    ///
    /// # Errors
    /// [`Error::Structural`] when no ordinal above the running maximum is left.
    pub fn allocate_unique(&self) -> Result<K> {
        loop {
            let ordinal = self
                .next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                    (next <= u64::from(u32::MAX)).then_some(next + 1)
                })
                .map_err(|_| Error::Structural(format!("{} space is exhausted", K::FAMILY)))?;
            let candidate = K::from_ordinal(ordinal as u32);
            if !self.entries.read().contains_key(&candidate) {
                return Ok(candidate);
            }
        }
    }

    /// Allocate `count` ids; an empty vector for zero.
    pub fn allocate_batch(&self, count: usize) -> Result<Vec<K>> {
        (0..count).map(|_| self.allocate_unique()).collect()
    }

    /// Apply `f` to every entry's metadata.
    pub fn update_all<F>(&self, mut f: F)
    where
        F: FnMut(&K, &mut M),
    {
        for (id, meta) in self.entries.write().iter_mut() {
            f(id, meta);
        }
    }

    /// Drop every entry matching the predicate; returns how many were dropped.
    pub fn remove_where<F>(&self, mut pred: F) -> usize
    where
        F: FnMut(&K, &M) -> bool,
    {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|id, meta| !pred(id, meta));
        before - entries.len()
    }

    /// Forget everything and restart the counter at 1.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.next.store(1, Ordering::SeqCst);
    }
}

impl<K: RegistryKey, M: Clone + Scoped> IdRegistry<K, M> {
    /// Ids owned by one scope, sorted.
    pub fn ids_for_scope(&self, scope: &M::Scope) -> Vec<K> {
        let mut ids: Vec<K> = self
            .entries
            .read()
            .iter()
            .filter(|(_, meta)| meta.scope() == scope)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl<K: RegistryKey, M: Clone> Default for IdRegistry<K, M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn shape(n: u32) -> ShapeId {
        ShapeId::new(n).unwrap()
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Owner(u32);

    impl Scoped for Owner {
        type Scope = u32;
        fn scope(&self) -> &u32 {
            &self.0
        }
    }

    #[test]
    fn allocation_skips_registered_ids() {
        let registry: IdRegistry<ShapeId, Owner> = IdRegistry::new();
        registry.register(shape(3), Owner(1));
        assert_eq!(registry.allocate_unique().unwrap(), shape(4));

        // An id registered above the counter is skipped, not reused
        registry.register(shape(5), Owner(1));
        registry.register(shape(7), Owner(1));
        let next = registry.allocate_unique().unwrap();
        assert_eq!(next, shape(8));
        assert!(registry.allocate_batch(0).unwrap().is_empty());
    }

    #[test]
    fn exhaustion_is_reported() {
        let registry: IdRegistry<ShapeId, Owner> = IdRegistry::new();
        registry.register(shape(u32::MAX - 1), Owner(1));
        assert_eq!(registry.allocate_unique().unwrap(), shape(u32::MAX));
        assert!(matches!(registry.allocate_unique(), Err(Error::Structural(_))));

        let registry: IdRegistry<ShapeId, Owner> = IdRegistry::new();
        registry.register(shape(u32::MAX), Owner(1));
        assert!(registry.allocate_batch(2).is_err());
        // A failed allocation does not move the counter back into used space
        assert!(registry.allocate_unique().is_err());
        assert_eq!(registry.ids(), vec![shape(u32::MAX)]);
    }

    #[test]
    fn register_new_keeps_first() {
        let registry: IdRegistry<ShapeId, Owner> = IdRegistry::new();
        assert!(registry.register_new(shape(2), Owner(1)));
        assert!(!registry.register_new(shape(2), Owner(9)));
        assert_eq!(registry.lookup(&shape(2)), Some(Owner(1)));
    }

    #[test]
    fn scopes_and_removal() {
        let registry: IdRegistry<ShapeId, Owner> = IdRegistry::new();
        registry.register(shape(2), Owner(1));
        registry.register(shape(3), Owner(2));
        registry.register(shape(4), Owner(2));
        assert_eq!(registry.ids_for_scope(&2), vec![shape(3), shape(4)]);

        registry.update_all(|_, owner| owner.0 += 1);
        assert_eq!(registry.ids_for_scope(&3), vec![shape(3), shape(4)]);

        assert_eq!(registry.remove_where(|_, owner| owner.0 == 3), 2);
        assert_eq!(registry.ids(), vec![shape(2)]);
        assert_eq!(registry.max_ordinal(), 2);
    }

    #[test]
    fn relationship_ids_allocate_from_numbers() {
        let registry: IdRegistry<RelationshipId, Owner> = IdRegistry::new();
        registry.register(RelationshipId::new("rId9"), Owner(1));
        registry.register(RelationshipId::new("hlinkX"), Owner(1));
        assert_eq!(registry.allocate_unique().unwrap().as_str(), "rId10");
    }

    #[test]
    fn concurrent_allocation_is_unique() {
        let registry: Arc<IdRegistry<ShapeId, Owner>> = Arc::new(IdRegistry::new());
        registry.register(shape(100), Owner(1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.allocate_batch(250).unwrap())
            })
            .collect();
        let mut all: Vec<ShapeId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
        assert!(all.iter().all(|id| id.get() > 100));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn allocations_strictly_increase_above_scan_max(
                scanned in proptest::collection::btree_set(1u32..5_000, 0..50),
                k in 1usize..64,
            ) {
                let registry: IdRegistry<ShapeId, Owner> = IdRegistry::new();
                for id in &scanned {
                    registry.register(shape(*id), Owner(1));
                }
                let max = scanned.iter().copied().max().unwrap_or(0);
                let ids = registry.allocate_batch(k).unwrap();
                prop_assert_eq!(ids.len(), k);
                prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
                prop_assert!(ids.iter().all(|id| id.get() > max));
            }
        }
    }
}
