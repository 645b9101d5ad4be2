//! # IDs
//! Layers need an identity that survives reordering, regrouping and undo. This is provided by
//! [`ProcessId<T>`], which hands out ids namespaced by the marker type `T`.
//!
//! Ids are unique for the lifetime of the process and are never handed out twice, even after the
//! thing they named is gone. They are *not* stable across runs - never persist one. Persisted
//! records identify layers by their position instead, and get fresh ids when materialized.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::num::NonZeroU64;

// Next free id per namespace. Namespaces are few, so a sorted map behind one lock is plenty.
static NEXT_IDS: parking_lot::Mutex<BTreeMap<TypeId, u64>> =
    parking_lot::const_mutex(BTreeMap::new());

/// Process-unique id within the namespace `T`.
/// Ids from different namespaces may share a numeric value but are different types.
pub struct ProcessId<T: 'static> {
    id: NonZeroU64,
    // fn() -> T keeps the id Send + Sync regardless of T.
    _namespace: PhantomData<fn() -> T>,
}
impl<T: 'static> ProcessId<T> {
    /// Allocate a fresh id.
    ///
    /// # Panics
    /// If the namespace's `u64` space is exhausted.
    #[must_use]
    pub fn next() -> Self {
        let mut counters = NEXT_IDS.lock();
        let next = counters.entry(TypeId::of::<T>()).or_insert(1);
        let id = NonZeroU64::new(*next).expect("id zero is never issued");
        *next = next
            .checked_add(1)
            .unwrap_or_else(|| panic!("{} id space exhausted", std::any::type_name::<T>()));
        Self {
            id,
            _namespace: PhantomData,
        }
    }
    /// Raw numeric value. Only meaningful within this process and namespace.
    #[must_use]
    pub fn get(self) -> u64 {
        self.id.get()
    }
}
impl<T: 'static> Default for ProcessId<T> {
    fn default() -> Self {
        Self::next()
    }
}
impl<T: 'static> Clone for ProcessId<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: 'static> Copy for ProcessId<T> {}
impl<T: 'static> PartialEq for ProcessId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T: 'static> Eq for ProcessId<T> {}
impl<T: 'static> PartialOrd for ProcessId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
/// Ordering follows allocation order.
impl<T: 'static> Ord for ProcessId<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
impl<T: 'static> std::hash::Hash for ProcessId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl<T: 'static> std::fmt::Display for ProcessId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let namespace = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or_default();
        write!(f, "{namespace}#{}", self.id)
    }
}
impl<T: 'static> std::fmt::Debug for ProcessId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
