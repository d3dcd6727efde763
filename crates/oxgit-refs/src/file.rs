//! File-backed reference store in git's on-disk layout.
//!
//! Loose refs live at `<git_dir>/<name>` and contain either `<hex>\n` or
//! `ref: <target>\n`. References under `refs/` may also live in
//! `<git_dir>/packed-refs`; a loose file shadows a packed entry of the same
//! name.
//!
//! Every write goes through `<path>.lock`, created exclusively. The new
//! contents are written and synced to the lock file, which is then renamed
//! over the ref, so readers never observe a partial value.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use oxgit_types::Oid;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::error::{RefError, RefResult};
use crate::names::{is_valid_ref_name, validate_ref_name, REFS_PREFIX};
use crate::packed::PackedRefs;
use crate::traits::{check_expect, find_conflict, RefStore};
use crate::types::{Expect, RefTarget, Reference};

const PACKED_REFS: &str = "packed-refs";
const LOCK_SUFFIX: &str = ".lock";

/// Reference namespace stored under a git directory.
#[derive(Clone, Debug)]
pub struct FileRefStore {
    git_dir: PathBuf,
}

impl FileRefStore {
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn loose_path(&self, name: &str) -> PathBuf {
        self.git_dir.join(name)
    }

    fn packed_path(&self) -> PathBuf {
        self.git_dir.join(PACKED_REFS)
    }

    fn read_loose(&self, name: &str) -> RefResult<Option<RefTarget>> {
        let path = self.loose_path(name);
        if path.is_dir() {
            return Ok(None);
        }
        match fs::read(&path) {
            Ok(bytes) => parse_loose(name, &bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(_) if self.file_ancestor(name).is_some() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The first proper prefix of `name` stored as a regular file. Under a
    /// loose ref `refs/heads/a`, no `refs/heads/a/b` can exist on disk.
    fn file_ancestor<'n>(&self, name: &'n str) -> Option<&'n str> {
        name.match_indices('/')
            .map(|(i, _)| &name[..i])
            .find(|prefix| self.loose_path(prefix).is_file())
    }

    /// Current `packed-refs` contents; a missing file is empty.
    pub fn read_packed(&self) -> RefResult<PackedRefs> {
        match fs::read(self.packed_path()) {
            Ok(bytes) => PackedRefs::parse(&bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PackedRefs::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Loose references under `refs/` that start with `prefix`.
    fn list_loose(&self, prefix: &str) -> RefResult<Vec<Reference>> {
        let root = self.git_dir.join("refs");
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => RefError::Io(io),
                None => RefError::Io(io::Error::other("filesystem loop under refs/")),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = ref_name_from_path(&self.git_dir, entry.path()) else {
                continue;
            };
            if name.ends_with(LOCK_SUFFIX) || !name.starts_with(prefix) {
                continue;
            }
            match fs::read(entry.path()) {
                Ok(bytes) => match parse_loose(&name, &bytes) {
                    Ok(target) => found.push(Reference::new(name, target)),
                    Err(e) => warn!(name = %name, error = %e, "skipping unreadable loose ref"),
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(found)
    }

    /// Move every direct loose ref under `refs/` into `packed-refs`.
    ///
    /// `peel` maps an object id to the non-tag object it finally refers to,
    /// or `None` if the id is not an annotated tag. Symbolic refs stay
    /// loose. Returns the number of refs packed.
    pub fn pack_refs(&self, peel: &dyn Fn(&Oid) -> Option<Oid>) -> RefResult<usize> {
        let lock = LockFile::acquire(&self.packed_path(), PACKED_REFS)?;
        let mut packed = self.read_packed()?;

        let loose: Vec<Reference> = self
            .list_loose(REFS_PREFIX)?
            .into_iter()
            .filter(|r| r.target_oid().is_some())
            .collect();
        for reference in &loose {
            if let Some(oid) = reference.target_oid() {
                packed.insert(reference.name(), oid, None);
            }
        }
        let names: Vec<String> = packed.iter().map(|(n, _)| n.to_string()).collect();
        for name in names {
            if let Some(entry) = packed.get(&name).copied() {
                packed.insert(name, entry.oid, peel(&entry.oid));
            }
        }
        packed.set_fully_peeled(true);
        lock.commit(&packed.to_bytes())?;

        for reference in &loose {
            match fs::remove_file(self.loose_path(reference.name())) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            self.prune_empty_dirs(reference.name());
        }
        debug!(count = loose.len(), "packed loose references");
        Ok(loose.len())
    }

    /// Remove directories left empty under `refs/<kind>/` after a delete.
    fn prune_empty_dirs(&self, name: &str) {
        let mut dir = Path::new(name).parent();
        while let Some(rel) = dir {
            if rel.components().count() <= 2 {
                break;
            }
            if fs::remove_dir(self.git_dir.join(rel)).is_err() {
                break;
            }
            dir = rel.parent();
        }
    }
}

impl RefStore for FileRefStore {
    fn read(&self, name: &str) -> RefResult<Option<Reference>> {
        if !is_valid_ref_name(name) {
            return Ok(None);
        }
        if let Some(target) = self.read_loose(name)? {
            return Ok(Some(Reference::new(name, target)));
        }
        if !name.starts_with(REFS_PREFIX) {
            return Ok(None);
        }
        Ok(self.read_packed()?.reference(name))
    }

    fn write(&self, reference: &Reference, expect: &Expect) -> RefResult<()> {
        let name = reference.name();
        validate_ref_name(name)?;
        if let Some(target) = reference.symbolic_target() {
            validate_ref_name(target)?;
        }
        if !self.exists(name)? {
            if let Some(conflict) = find_conflict(self, name)? {
                return Err(RefError::AlreadyExists(conflict));
            }
        }

        let lock = LockFile::acquire(&self.loose_path(name), name)?;
        let current = self.read(name)?;
        check_expect(name, current.as_ref().map(Reference::target), expect)?;
        lock.commit(reference.target().to_file_contents().as_bytes())?;
        debug!(name, target = %reference.target(), "reference written");
        Ok(())
    }

    fn delete(&self, name: &str) -> RefResult<bool> {
        validate_ref_name(name)?;
        if self.file_ancestor(name).is_some() {
            return Ok(false);
        }
        let loose_path = self.loose_path(name);
        let lock = LockFile::acquire(&loose_path, name)?;

        let mut existed = false;
        if loose_path.is_file() {
            fs::remove_file(&loose_path)?;
            existed = true;
        }

        if name.starts_with(REFS_PREFIX) && self.read_packed()?.get(name).is_some() {
            let packed_lock = LockFile::acquire(&self.packed_path(), PACKED_REFS)?;
            let mut packed = self.read_packed()?;
            if packed.remove(name).is_some() {
                packed_lock.commit(&packed.to_bytes())?;
                existed = true;
            }
        }

        if existed {
            debug!(name, "reference deleted");
        }
        drop(lock);
        self.prune_empty_dirs(name);
        Ok(existed)
    }

    fn list(&self, prefix: &str) -> RefResult<Vec<Reference>> {
        let packed = self.read_packed()?;
        let mut merged: std::collections::BTreeMap<String, Reference> = packed
            .with_prefix(prefix)
            .filter(|r| r.name().starts_with(REFS_PREFIX))
            .map(|r| (r.name().to_string(), r))
            .collect();
        for reference in self.list_loose(prefix)? {
            merged.insert(reference.name().to_string(), reference);
        }
        Ok(merged.into_values().collect())
    }
}

/// Parse a loose ref file: `ref: <name>` or a 40-hex object id.
fn parse_loose(name: &str, bytes: &[u8]) -> RefResult<RefTarget> {
    let corrupt = |reason: &str| RefError::Corrupt {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let text = std::str::from_utf8(bytes).map_err(|_| corrupt("not valid UTF-8"))?;
    if let Some(rest) = text.strip_prefix("ref:") {
        let target = rest.trim();
        validate_ref_name(target).map_err(|_| corrupt("invalid symbolic target"))?;
        return Ok(RefTarget::Symbolic(target.to_string()));
    }
    let hex = text.get(..40).ok_or_else(|| corrupt("too short"))?;
    if text[40..].chars().next().is_some_and(|c| !c.is_whitespace()) {
        return Err(corrupt("trailing garbage after object id"));
    }
    let id = Oid::from_hex(hex).map_err(|e| corrupt(&e.to_string()))?;
    Ok(RefTarget::Direct(id))
}

fn ref_name_from_path(git_dir: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(git_dir).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

/// An exclusively created `<path>.lock`, removed on drop unless committed.
struct LockFile {
    lock_path: PathBuf,
    target: PathBuf,
    file: Option<File>,
}

impl LockFile {
    fn acquire(target: &Path, name: &str) -> RefResult<Self> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut lock_path = target.as_os_str().to_owned();
        lock_path.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(lock_path);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => RefError::Locked(name.to_string()),
                _ => RefError::Io(e),
            })?;
        trace!(lock = %lock_path.display(), "lock acquired");
        Ok(Self {
            lock_path,
            target: target.to_path_buf(),
            file: Some(file),
        })
    }

    /// Write `contents`, sync, and rename the lock over the target.
    fn commit(mut self, contents: &[u8]) -> RefResult<()> {
        if let Some(mut file) = self.file.take() {
            file.write_all(contents)?;
            file.sync_all()?;
        }
        fs::rename(&self.lock_path, &self.target)?;
        self.lock_path.clear();
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        self.file.take();
        if !self.lock_path.as_os_str().is_empty() {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
