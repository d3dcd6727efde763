use oxgit_types::{Oid, OidPrefix};
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::object::RawObject;
use crate::traits::ObjectStore;

/// Ordered composite over several backends.
///
/// Reads consult backends in registration order and return the first hit
/// (loose objects are registered ahead of packs, so a freshly written loose
/// copy wins). Writes go to the first writable backend. Prefix searches
/// merge every backend's candidates.
#[derive(Default)]
pub struct ObjectDatabase {
    backends: Vec<Box<dyn ObjectStore>>,
}

impl ObjectDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a backend with the lowest priority so far.
    pub fn with_backend(mut self, backend: impl ObjectStore + 'static) -> Self {
        self.push_backend(Box::new(backend));
        self
    }

    pub fn push_backend(&mut self, backend: Box<dyn ObjectStore>) {
        self.backends.push(backend);
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }
}

impl ObjectStore for ObjectDatabase {
    fn read(&self, id: &Oid) -> StoreResult<Option<RawObject>> {
        for (i, backend) in self.backends.iter().enumerate() {
            if let Some(raw) = backend.read(id)? {
                trace!(id = %id, backend = i, "object found");
                return Ok(Some(raw));
            }
        }
        Ok(None)
    }

    fn write(&self, object: &RawObject) -> StoreResult<Oid> {
        let backend = self
            .backends
            .iter()
            .find(|b| b.is_writable())
            .ok_or(StoreError::ReadOnly)?;
        backend.write(object)
    }

    fn exists(&self, id: &Oid) -> StoreResult<bool> {
        for backend in &self.backends {
            if backend.exists(id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn find_by_prefix(&self, prefix: &OidPrefix) -> StoreResult<Vec<Oid>> {
        let mut found = Vec::new();
        for backend in &self.backends {
            found.extend(backend.find_by_prefix(prefix)?);
        }
        found.sort();
        found.dedup();
        Ok(found)
    }

    fn is_writable(&self) -> bool {
        self.backends.iter().any(|b| b.is_writable())
    }

    fn refresh(&self) -> StoreResult<()> {
        self.backends.iter().try_for_each(|b| b.refresh())
    }
}

impl std::fmt::Debug for ObjectDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDatabase")
            .field("backends", &self.backends.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryObjectStore;
    use crate::object::Blob;
    use std::sync::Arc;

    /// Shares one in-memory store between the database and the test.
    struct Shared(Arc<InMemoryObjectStore>, bool);

    impl ObjectStore for Shared {
        fn read(&self, id: &Oid) -> StoreResult<Option<RawObject>> {
            self.0.read(id)
        }
        fn write(&self, object: &RawObject) -> StoreResult<Oid> {
            self.0.write(object)
        }
        fn find_by_prefix(&self, prefix: &OidPrefix) -> StoreResult<Vec<Oid>> {
            self.0.find_by_prefix(prefix)
        }
        fn is_writable(&self) -> bool {
            self.1
        }
    }

    #[test]
    fn reads_fall_through_backends() {
        let first = Arc::new(InMemoryObjectStore::new());
        let second = Arc::new(InMemoryObjectStore::new());
        let id = second.write(&Blob::new(b"deep".to_vec()).to_raw()).unwrap();

        let odb = ObjectDatabase::new()
            .with_backend(Shared(first, true))
            .with_backend(Shared(second, false));
        assert!(odb.exists(&id).unwrap());
        assert_eq!(odb.read(&id).unwrap().unwrap().data, b"deep".to_vec());
    }

    #[test]
    fn writes_go_to_first_writable() {
        let readonly = Arc::new(InMemoryObjectStore::new());
        let writable = Arc::new(InMemoryObjectStore::new());
        let odb = ObjectDatabase::new()
            .with_backend(Shared(readonly.clone(), false))
            .with_backend(Shared(writable.clone(), true));

        odb.write(&Blob::new(b"new".to_vec()).to_raw()).unwrap();
        assert!(readonly.is_empty());
        assert_eq!(writable.len(), 1);
    }

    #[test]
    fn no_writable_backend_is_read_only() {
        let odb = ObjectDatabase::new();
        assert!(!odb.is_writable());
        assert!(matches!(
            odb.write(&Blob::new(vec![]).to_raw()),
            Err(StoreError::ReadOnly)
        ));
    }

    #[test]
    fn prefix_matches_merge_and_dedup() {
        let a = Arc::new(InMemoryObjectStore::new());
        let b = Arc::new(InMemoryObjectStore::new());
        let raw = Blob::new(b"hello".to_vec()).to_raw();
        let id = a.write(&raw).unwrap();
        b.write(&raw).unwrap();

        let odb = ObjectDatabase::new()
            .with_backend(Shared(a, true))
            .with_backend(Shared(b, true));
        let prefix = OidPrefix::parse("b6fc").unwrap();
        assert_eq!(odb.find_by_prefix(&prefix).unwrap(), vec![id]);
        assert_eq!(odb.resolve_prefix(&prefix).unwrap(), id);
    }
}
