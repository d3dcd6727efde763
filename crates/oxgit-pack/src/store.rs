use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use oxgit_store::{ObjectStore, RawObject, StoreError, StoreResult};
use oxgit_types::{Oid, OidPrefix};
use tracing::{debug, warn};

use crate::reader::PackReader;

/// Read-only object backend over every pack in `objects/pack/`.
///
/// Packs are discovered by their `.idx` file. [`ObjectStore::refresh`]
/// picks up packs written since the last scan.
pub struct PackStore {
    pack_dir: PathBuf,
    packs: RwLock<Vec<Arc<PackReader>>>,
}

impl PackStore {
    /// Load all packs from a `pack/` directory. A missing directory is an
    /// empty store.
    pub fn open(pack_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let store = Self {
            pack_dir: pack_dir.into(),
            packs: RwLock::new(Vec::new()),
        };
        store.rescan()?;
        Ok(store)
    }

    pub fn pack_dir(&self) -> &Path {
        &self.pack_dir
    }

    fn snapshot(&self) -> StoreResult<Vec<Arc<PackReader>>> {
        let packs = self.packs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(packs.clone())
    }

    fn rescan(&self) -> StoreResult<()> {
        let entries = match std::fs::read_dir(&self.pack_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut packs = self.packs.write().map_err(|_| StoreError::Poisoned)?;
        let known: HashSet<PathBuf> = packs
            .iter()
            .filter_map(|p| p.path().map(Path::to_path_buf))
            .collect();

        let mut found = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "idx") {
                let pack_path = path.with_extension("pack");
                if pack_path.is_file() && !known.contains(&pack_path) {
                    found.push(pack_path);
                }
            }
        }
        found.sort();

        for pack_path in found {
            match PackReader::open(&pack_path) {
                Ok(reader) => packs.push(Arc::new(reader)),
                Err(e) => warn!(path = %pack_path.display(), error = %e, "skipping unreadable pack"),
            }
        }
        debug!(dir = %self.pack_dir.display(), packs = packs.len(), "pack scan complete");
        Ok(())
    }

    pub fn pack_count(&self) -> usize {
        self.packs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Total objects across all packs.
    pub fn total_objects(&self) -> StoreResult<usize> {
        Ok(self.snapshot()?.iter().map(|p| p.object_count()).sum())
    }
}

impl ObjectStore for PackStore {
    fn read(&self, id: &Oid) -> StoreResult<Option<RawObject>> {
        for pack in self.snapshot()? {
            if let Some(raw) = pack.read_object(id)? {
                return Ok(Some(raw));
            }
        }
        Ok(None)
    }

    fn write(&self, _object: &RawObject) -> StoreResult<Oid> {
        Err(StoreError::ReadOnly)
    }

    fn exists(&self, id: &Oid) -> StoreResult<bool> {
        Ok(self.snapshot()?.iter().any(|p| p.contains(id)))
    }

    fn find_by_prefix(&self, prefix: &OidPrefix) -> StoreResult<Vec<Oid>> {
        let mut found: Vec<Oid> = self
            .snapshot()?
            .iter()
            .flat_map(|p| p.find_by_prefix(prefix))
            .collect();
        found.sort();
        found.dedup();
        Ok(found)
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn refresh(&self) -> StoreResult<()> {
        self.rescan()
    }
}

impl std::fmt::Debug for PackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackStore")
            .field("pack_dir", &self.pack_dir)
            .field("packs", &self.pack_count())
            .finish()
    }
}
