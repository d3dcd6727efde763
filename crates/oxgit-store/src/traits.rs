use oxgit_types::{ObjectKind, Oid, OidPrefix};

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, Commit, Object, RawObject, Tag};
use crate::tree::Tree;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same kind and payload always
///   produce the same id.
/// - Writes are idempotent: writing an existing object is a no-op.
/// - Concurrent reads are always safe.
/// - Backends move raw payloads; parsing happens in the provided methods.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by id.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn read(&self, id: &Oid) -> StoreResult<Option<RawObject>>;

    /// Write an object and return its content-addressed id.
    fn write(&self, object: &RawObject) -> StoreResult<Oid>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &Oid) -> StoreResult<bool> {
        Ok(self.read(id)?.is_some())
    }

    /// All stored ids starting with `prefix`, in ascending order.
    fn find_by_prefix(&self, prefix: &OidPrefix) -> StoreResult<Vec<Oid>>;

    /// Whether `write` is supported.
    fn is_writable(&self) -> bool {
        true
    }

    /// Re-scan on-disk state (new packs, for instance). No-op by default.
    fn refresh(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Read multiple objects in a batch.
    fn read_batch(&self, ids: &[Oid]) -> StoreResult<Vec<Option<RawObject>>> {
        ids.iter().map(|id| self.read(id)).collect()
    }

    /// Read and parse an object, optionally insisting on its kind.
    fn lookup(&self, id: &Oid, expected: Option<ObjectKind>) -> StoreResult<Object> {
        let raw = self.read(id)?.ok_or(StoreError::NotFound(*id))?;
        if let Some(kind) = expected {
            if raw.kind != kind {
                return Err(StoreError::TypeMismatch {
                    id: *id,
                    expected: kind,
                    actual: raw.kind,
                });
            }
        }
        Object::from_raw(*id, raw)
    }

    fn lookup_blob(&self, id: &Oid) -> StoreResult<Blob> {
        self.lookup(id, Some(ObjectKind::Blob))?.into_blob()
    }

    fn lookup_tree(&self, id: &Oid) -> StoreResult<Tree> {
        self.lookup(id, Some(ObjectKind::Tree))?.into_tree()
    }

    fn lookup_commit(&self, id: &Oid) -> StoreResult<Commit> {
        self.lookup(id, Some(ObjectKind::Commit))?.into_commit()
    }

    fn lookup_tag(&self, id: &Oid) -> StoreResult<Tag> {
        self.lookup(id, Some(ObjectKind::Tag))?.into_tag()
    }

    /// Resolve an abbreviated id to the unique object it names.
    fn resolve_prefix(&self, prefix: &OidPrefix) -> StoreResult<Oid> {
        if let Some(full) = prefix.to_oid() {
            return if self.exists(&full)? {
                Ok(full)
            } else {
                Err(StoreError::NotFound(full))
            };
        }
        let mut matches = self.find_by_prefix(prefix)?;
        matches.dedup();
        match matches.len() {
            0 => Err(StoreError::PrefixNotFound(prefix.to_hex())),
            1 => Ok(matches[0]),
            _ => Err(StoreError::Ambiguous(prefix.to_hex())),
        }
    }

    /// Follow an object toward `target`.
    ///
    /// Tags are dereferenced repeatedly and a commit peels to its tree.
    /// Anything else that cannot reach `target` is a `TypeMismatch`.
    fn peel(&self, object: Object, target: ObjectKind) -> StoreResult<Object> {
        let mut current = object;
        loop {
            if current.kind() == target {
                return Ok(current);
            }
            current = match current {
                Object::Tag(tag) => self.lookup(&tag.target_id(), None)?,
                Object::Commit(commit) if target == ObjectKind::Tree => {
                    self.lookup(&commit.tree_id(), Some(ObjectKind::Tree))?
                }
                other => {
                    return Err(StoreError::TypeMismatch {
                        id: other.id(),
                        expected: target,
                        actual: other.kind(),
                    })
                }
            };
        }
    }

    /// Dereference tags until a non-tag object is reached.
    fn peel_tags(&self, object: Object) -> StoreResult<Object> {
        let mut current = object;
        while let Object::Tag(tag) = current {
            current = self.lookup(&tag.target_id(), None)?;
        }
        Ok(current)
    }

    /// Store a parsed object.
    fn write_object(&self, object: &Object) -> StoreResult<Oid> {
        self.write(&object.to_raw())
    }
}
