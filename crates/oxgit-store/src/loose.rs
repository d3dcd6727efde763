use std::fs;
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use oxgit_types::{ObjectKind, Oid, OidPrefix, OID_HEX_LEN};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::object::RawObject;
use crate::traits::ObjectStore;

/// Loose object directory: one zlib-deflated file per object at
/// `objects/<first two hex digits>/<remaining 38>`.
///
/// Every read re-hashes the inflated bytes; writes go through a temporary
/// file in the fan-out directory and are renamed into place.
#[derive(Debug, Clone)]
pub struct LooseObjectStore {
    root: PathBuf,
    compression: Compression,
}

impl LooseObjectStore {
    /// Open the loose store rooted at an `objects/` directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compression: Compression::default(),
        }
    }

    /// Use a specific zlib level for writes (git's `core.looseCompression`).
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file that holds (or would hold) `id`.
    pub fn object_path(&self, id: &Oid) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    fn decode(id: &Oid, inflated: Vec<u8>) -> StoreResult<RawObject> {
        let nul = inflated
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| StoreError::corrupt(*id, "missing header terminator"))?;
        let header = &inflated[..nul];
        let space = header
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| StoreError::corrupt(*id, "malformed header"))?;
        let kind = ObjectKind::from_name(&header[..space])
            .ok_or_else(|| StoreError::corrupt(*id, "unknown object type"))?;
        let size: usize = std::str::from_utf8(&header[space + 1..])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| StoreError::corrupt(*id, "malformed size"))?;

        let data = inflated[nul + 1..].to_vec();
        if data.len() != size {
            return Err(StoreError::corrupt(
                *id,
                format!("header says {size} bytes, found {}", data.len()),
            ));
        }
        Ok(RawObject::new(kind, data))
    }

    /// Every loose object id on disk, in ascending order.
    pub fn all_ids(&self) -> StoreResult<Vec<Oid>> {
        let mut ids = Vec::new();
        if !self.root.is_dir() {
            return Ok(ids);
        }
        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| StoreError::CorruptStorage(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(id) = Self::id_from_path(entry.path()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn id_from_path(path: &Path) -> Option<Oid> {
        let file = path.file_name()?.to_str()?;
        let dir = path.parent()?.file_name()?.to_str()?;
        if dir.len() != 2 || file.len() != OID_HEX_LEN - 2 {
            return None;
        }
        Oid::from_hex(&format!("{dir}{file}")).ok()
    }
}

impl ObjectStore for LooseObjectStore {
    fn read(&self, id: &Oid) -> StoreResult<Option<RawObject>> {
        let path = self.object_path(id);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut inflated = Vec::new();
        ZlibDecoder::new(file)
            .read_to_end(&mut inflated)
            .map_err(|e| StoreError::corrupt(*id, format!("inflate failed: {e}")))?;
        let raw = Self::decode(id, inflated)?;

        let computed = raw.compute_id();
        if computed != *id {
            warn!(id = %id, computed = %computed, "loose object hash mismatch");
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(Some(raw))
    }

    fn write(&self, object: &RawObject) -> StoreResult<Oid> {
        let id = object.compute_id();
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::CorruptStorage(format!("bad object path {}", path.display())))?;
        fs::create_dir_all(dir)?;

        let tmp = tempfile::Builder::new()
            .prefix("tmp_obj_")
            .tempfile_in(dir)?;
        let mut encoder = ZlibEncoder::new(tmp, self.compression);
        encoder.write_all(&object.to_loose_bytes())?;
        let tmp = encoder.finish()?;
        tmp.as_file().sync_all()?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {}
            // Another writer got there first with the same content.
            Err(e) if e.error.kind() == IoErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.error.into()),
        }
        debug!(id = %id, kind = %object.kind, size = object.data.len(), "wrote loose object");
        Ok(id)
    }

    fn exists(&self, id: &Oid) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }

    fn find_by_prefix(&self, prefix: &OidPrefix) -> StoreResult<Vec<Oid>> {
        let hex = prefix.to_hex();
        let dir = self.root.join(&hex[..2]);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.len() != OID_HEX_LEN - 2 || !name.starts_with(&hex[2..]) {
                continue;
            }
            if let Ok(id) = Oid::from_hex(&format!("{}{name}", &hex[..2])) {
                if prefix.matches(&id) {
                    found.push(id);
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Blob;
    use oxgit_hash::ObjectHasher;

    fn store() -> (tempfile::TempDir, LooseObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::new(dir.path().join("objects"));
        (dir, store)
    }

    #[test]
    fn write_lays_out_fanout_path() {
        let (_dir, store) = store();
        let id = store.write(&Blob::new(b"hello".to_vec()).to_raw()).unwrap();
        let path = store.object_path(&id);
        assert!(path.ends_with("b6/fc4c620b67d95f953a5c1c1230aaab5db5a1b0"));
        assert!(path.is_file());
    }

    #[test]
    fn file_is_deflated_header_and_payload() {
        let (_dir, store) = store();
        let id = store.write(&Blob::new(b"hello".to_vec()).to_raw()).unwrap();
        let compressed = fs::read(store.object_path(&id)).unwrap();
        let mut inflated = Vec::new();
        ZlibDecoder::new(&compressed[..])
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, b"blob 5\0hello".to_vec());
    }

    #[test]
    fn read_back_and_idempotent_write() {
        let (_dir, store) = store();
        let raw = Blob::new(b"data".to_vec()).to_raw();
        let id = store.write(&raw).unwrap();
        assert_eq!(store.write(&raw).unwrap(), id);
        assert_eq!(store.read(&id).unwrap(), Some(raw));
        assert!(store.exists(&id).unwrap());
        assert!(store.read(&Oid::zero()).unwrap().is_none());
    }

    #[test]
    fn tampered_file_reports_hash_mismatch() {
        let (_dir, store) = store();
        let id = store.write(&Blob::new(b"original".to_vec()).to_raw()).unwrap();

        // Replace the file with a valid encoding of different content.
        let path = store.object_path(&id);
        fs::remove_file(&path).unwrap();
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"blob 8\0tampered").unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();

        match store.read(&id) {
            Err(StoreError::HashMismatch { id: got, computed }) => {
                assert_eq!(got, id);
                assert_eq!(computed, ObjectHasher::BLOB.hash(b"tampered"));
            }
            other => panic!("expected hash mismatch, got {other:?}"),
        }
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let (_dir, store) = store();
        let id = ObjectHasher::BLOB.hash(b"whatever");
        let path = store.object_path(&id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not zlib at all").unwrap();
        assert!(matches!(
            store.read(&id),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn size_mismatch_is_corrupt() {
        let (_dir, store) = store();
        let id = ObjectHasher::BLOB.hash(b"abc");
        let path = store.object_path(&id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"blob 9\0abc").unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();
        assert!(matches!(
            store.read(&id),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn prefix_scan_and_listing() {
        let (_dir, store) = store();
        let a = store.write(&Blob::new(b"hello".to_vec()).to_raw()).unwrap();
        let b = store.write(&Blob::new(b"world".to_vec()).to_raw()).unwrap();

        let found = store.find_by_prefix(&OidPrefix::parse("b6fc4").unwrap()).unwrap();
        assert_eq!(found, vec![a]);
        assert!(store
            .find_by_prefix(&OidPrefix::parse("ffff").unwrap())
            .unwrap()
            .is_empty());

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.all_ids().unwrap(), expected);
    }

    #[test]
    fn missing_root_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.all_ids().unwrap().is_empty());
    }
}
