use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use oxgit_hash::ObjectHasher;
use oxgit_types::{FileMode, ObjectKind, Oid, OID_RAW_LEN};
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::object::RawObject;
use crate::traits::ObjectStore;

/// A single entry in a tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub name: String,
    pub mode: FileMode,
    pub id: Oid,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, mode: FileMode, id: Oid) -> Self {
        Self {
            name: name.into(),
            mode,
            id,
        }
    }

    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }

    /// The kind of object this entry points at.
    pub fn kind(&self) -> Option<ObjectKind> {
        self.mode.object_kind()
    }
}

/// Git's entry ordering: byte-wise on names, where a subtree compares as if
/// its name ended in `/`.
pub fn entry_order(a: &str, a_tree: bool, b: &str, b_tree: bool) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let len = a.len().min(b.len());
    match a[..len].cmp(&b[..len]) {
        Ordering::Equal => {}
        other => return other,
    }
    let tail = |name: &[u8], tree: bool| name.get(len).copied().or(tree.then_some(b'/'));
    tail(a, a_tree).cmp(&tail(b, b_tree))
}

fn validate_name(name: &str) -> StoreResult<()> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name == "." || name == ".." {
        "reserved name"
    } else if name.contains('/') {
        "name contains '/'"
    } else if name.contains('\0') {
        "name contains NUL"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidTreeEntry {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// Directory listing: entries in git order, with the id they hash to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tree {
    id: Oid,
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree from entries in any order.
    ///
    /// Names must be valid path components and unique; entries are sorted
    /// into git order before the id is computed.
    pub fn new(mut entries: Vec<TreeEntry>) -> StoreResult<Self> {
        // A file and a directory of the same name need not be adjacent in
        // git order (`a`, `a-b`, `a/`), so duplicates are found by name.
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            validate_name(&entry.name)?;
            if entry.mode == FileMode::New {
                return Err(StoreError::InvalidTreeEntry {
                    name: entry.name.clone(),
                    reason: "mode 0 cannot be stored".into(),
                });
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(StoreError::InvalidTreeEntry {
                    name: entry.name.clone(),
                    reason: "duplicate name".into(),
                });
            }
        }
        entries.sort_by(|a, b| entry_order(&a.name, a.is_tree(), &b.name, b.is_tree()));
        let mut tree = Self {
            id: Oid::zero(),
            entries,
        };
        tree.id = ObjectHasher::TREE.hash(&tree.encode());
        Ok(tree)
    }

    /// The empty tree.
    pub fn empty() -> Self {
        Self {
            id: ObjectHasher::TREE.hash(b""),
            entries: Vec::new(),
        }
    }

    /// Decode a tree payload: repeated `<octal mode> <name>\0<20-byte id>`.
    pub fn parse(id: Oid, data: &[u8]) -> StoreResult<Self> {
        let mut entries = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| StoreError::corrupt(id, "tree entry without mode"))?;
            let mode = FileMode::from_octal_ascii(&rest[..space])
                .map_err(|e| StoreError::corrupt(id, e.to_string()))?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| StoreError::corrupt(id, "unterminated tree entry name"))?;
            let name = std::str::from_utf8(&rest[..nul])
                .map_err(|_| StoreError::corrupt(id, "tree entry name is not UTF-8"))?
                .to_string();
            rest = &rest[nul + 1..];

            if rest.len() < OID_RAW_LEN {
                return Err(StoreError::corrupt(id, "truncated tree entry id"));
            }
            let entry_id = Oid::from_slice(&rest[..OID_RAW_LEN])?;
            rest = &rest[OID_RAW_LEN..];

            entries.push(TreeEntry::new(name, mode, entry_id));
        }
        Ok(Self { id, entries })
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 40);
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.to_tree_ascii().as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.id.as_bytes());
        }
        out
    }

    pub fn id(&self) -> Oid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TreeEntry> {
        self.entries.iter()
    }

    /// Entry at position `index` in git order.
    pub fn get_by_index(&self, index: usize) -> StoreResult<&TreeEntry> {
        self.entries.get(index).ok_or(StoreError::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    /// Entry with the given name, found by binary search.
    ///
    /// The name is probed both as a file and as a directory, since the two
    /// sort differently.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        [false, true].into_iter().find_map(|as_tree| {
            self.entries
                .binary_search_by(|e| entry_order(&e.name, e.is_tree(), name, as_tree))
                .ok()
                .map(|i| &self.entries[i])
        })
    }

    /// First entry pointing at `id`.
    pub fn get_by_id(&self, id: &Oid) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.id == *id)
    }

    /// Resolve a `/`-separated path through nested subtrees.
    pub fn get_by_path<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        path: &str,
    ) -> StoreResult<TreeEntry> {
        let not_found = || StoreError::PathNotFound(path.to_string());
        let mut components = path.split('/').peekable();
        let mut owned: Option<Tree> = None;

        while let Some(component) = components.next() {
            if component.is_empty() {
                return Err(not_found());
            }
            let current = owned.as_ref().unwrap_or(self);
            let entry = current.get(component).ok_or_else(not_found)?.clone();
            if components.peek().is_none() {
                return Ok(entry);
            }
            if !entry.is_tree() {
                return Err(not_found());
            }
            owned = Some(store.lookup(&entry.id, Some(ObjectKind::Tree))?.into_tree()?);
        }
        Err(not_found())
    }

    pub fn to_raw(&self) -> RawObject {
        RawObject::new(ObjectKind::Tree, self.encode())
    }
}

impl<'a> IntoIterator for &'a Tree {
    type Item = &'a TreeEntry;
    type IntoIter = std::slice::Iter<'a, TreeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Mutable staging area for assembling a tree.
#[derive(Clone, Debug, Default)]
pub struct TreeBuilder {
    entries: HashMap<String, TreeEntry>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the entries of an existing tree.
    pub fn from_tree(tree: &Tree) -> Self {
        Self {
            entries: tree
                .iter()
                .map(|e| (e.name.clone(), e.clone()))
                .collect(),
        }
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, name: &str, id: Oid, mode: FileMode) -> StoreResult<&TreeEntry> {
        validate_name(name)?;
        if mode == FileMode::New {
            return Err(StoreError::InvalidTreeEntry {
                name: name.to_string(),
                reason: "mode 0 cannot be stored".into(),
            });
        }
        let entry = TreeEntry::new(name, mode, id);
        self.entries.insert(name.to_string(), entry);
        Ok(&self.entries[name])
    }

    pub fn remove(&mut self, name: &str) -> Option<TreeEntry> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn build(&self) -> StoreResult<Tree> {
        Tree::new(self.entries.values().cloned().collect())
    }

    /// Build the tree and write it to `store`.
    pub fn write<S: ObjectStore + ?Sized>(&self, store: &S) -> StoreResult<Tree> {
        let tree = self.build()?;
        store.write(&tree.to_raw())?;
        Ok(tree)
    }
}
