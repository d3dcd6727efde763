use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use oxgit_types::{Oid, OidPrefix};

use crate::error::{StoreError, StoreResult};
use crate::object::RawObject;
use crate::traits::ObjectStore;

/// In-memory object store.
///
/// Intended for tests and embedding. Objects are held in an ordered map
/// behind a `RwLock`, which keeps prefix scans a simple range query.
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<Oid, RawObject>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    fn map(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<Oid, RawObject>>> {
        self.objects.read().map_err(|_| StoreError::Poisoned)
    }

    fn map_mut(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<Oid, RawObject>>> {
        self.objects.write().map_err(|_| StoreError::Poisoned)
    }

    /// Number of objects currently stored. Counts through a poisoned lock.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes across all stored objects.
    pub fn total_bytes(&self) -> StoreResult<u64> {
        Ok(self.map()?.values().map(RawObject::size).sum())
    }

    /// Remove all objects from the store.
    pub fn clear(&self) -> StoreResult<()> {
        self.map_mut()?.clear();
        Ok(())
    }

    /// All object ids in ascending order.
    pub fn all_ids(&self) -> StoreResult<Vec<Oid>> {
        Ok(self.map()?.keys().copied().collect())
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &Oid) -> StoreResult<Option<RawObject>> {
        let map = self.map()?;
        Ok(map.get(id).cloned())
    }

    fn write(&self, object: &RawObject) -> StoreResult<Oid> {
        let id = object.compute_id();
        let mut map = self.map_mut()?;
        map.entry(id).or_insert_with(|| object.clone());
        Ok(id)
    }

    fn exists(&self, id: &Oid) -> StoreResult<bool> {
        let map = self.map()?;
        Ok(map.contains_key(id))
    }

    fn find_by_prefix(&self, prefix: &OidPrefix) -> StoreResult<Vec<Oid>> {
        let map = self.map()?;
        Ok(map
            .range(prefix.min_oid()..)
            .map(|(id, _)| *id)
            .take_while(|id| prefix.matches(id))
            .collect())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}
