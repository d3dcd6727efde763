//! The `packed-refs` file.
//!
//! ```text
//! # pack-refs with: peeled fully-peeled sorted
//! 3f8a... refs/heads/main
//! 91c0... refs/tags/v1.0
//! ^5d2e...
//! ```
//!
//! A `^` line records the peeled target of the annotated tag above it.

use std::collections::BTreeMap;

use oxgit_types::Oid;

use crate::error::{RefError, RefResult};
use crate::types::Reference;

const HEADER_PREFIX: &str = "# pack-refs with:";
const FULL_HEADER: &str = "# pack-refs with: peeled fully-peeled sorted \n";
const PARTIAL_HEADER: &str = "# pack-refs with: sorted \n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackedEntry {
    pub oid: Oid,
    pub peeled: Option<Oid>,
}

/// Parsed contents of `packed-refs`, sorted by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedRefs {
    entries: BTreeMap<String, PackedEntry>,
    /// Every entry's peel state is recorded, so a missing `^` line means
    /// the ref does not point at a tag.
    fully_peeled: bool,
}

impl Default for PackedRefs {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            fully_peeled: true,
        }
    }
}

impl PackedRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(data: &[u8]) -> RefResult<Self> {
        let text = std::str::from_utf8(data).map_err(|_| corrupt("not valid UTF-8"))?;
        let mut entries: BTreeMap<String, PackedEntry> = BTreeMap::new();
        let mut fully_peeled = false;
        let mut last: Option<String> = None;

        for (n, line) in text.lines().enumerate() {
            let line_no = n + 1;
            if line.is_empty() {
                continue;
            }
            if let Some(traits) = line.strip_prefix(HEADER_PREFIX) {
                fully_peeled = traits.split_whitespace().any(|t| t == "fully-peeled");
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            if let Some(hex) = line.strip_prefix('^') {
                let name = last
                    .as_ref()
                    .ok_or_else(|| corrupt(format!("line {line_no}: peel line without a ref")))?;
                let peeled = Oid::from_hex(hex.trim_end())
                    .map_err(|e| corrupt(format!("line {line_no}: {e}")))?;
                if let Some(entry) = entries.get_mut(name) {
                    entry.peeled = Some(peeled);
                }
                continue;
            }
            let (hex, name) = line
                .split_once(' ')
                .ok_or_else(|| corrupt(format!("line {line_no}: expected '<oid> <name>'")))?;
            let oid = Oid::from_hex(hex).map_err(|e| corrupt(format!("line {line_no}: {e}")))?;
            let name = name.trim_end().to_string();
            entries.insert(name.clone(), PackedEntry { oid, peeled: None });
            last = Some(name);
        }
        Ok(Self {
            entries,
            fully_peeled,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::from(if self.fully_peeled {
            FULL_HEADER
        } else {
            PARTIAL_HEADER
        });
        for (name, entry) in &self.entries {
            out.push_str(&format!("{} {name}\n", entry.oid));
            if let Some(peeled) = entry.peeled {
                out.push_str(&format!("^{peeled}\n"));
            }
        }
        out.into_bytes()
    }

    pub fn get(&self, name: &str) -> Option<&PackedEntry> {
        self.entries.get(name)
    }

    pub fn reference(&self, name: &str) -> Option<Reference> {
        self.get(name).map(|e| to_reference(name, e))
    }

    pub fn insert(&mut self, name: impl Into<String>, oid: Oid, peeled: Option<Oid>) {
        self.entries.insert(name.into(), PackedEntry { oid, peeled });
    }

    pub fn remove(&mut self, name: &str) -> Option<PackedEntry> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_fully_peeled(&self) -> bool {
        self.fully_peeled
    }

    pub(crate) fn set_fully_peeled(&mut self, value: bool) {
        self.fully_peeled = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackedEntry)> {
        self.entries.iter().map(|(name, e)| (name.as_str(), e))
    }

    /// Entries whose name starts with `prefix`, in order.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = Reference> + 'a {
        self.entries
            .range(prefix.to_string()..)
            .take_while(move |(name, _)| name.starts_with(prefix))
            .map(|(name, e)| to_reference(name, e))
    }
}

fn to_reference(name: &str, entry: &PackedEntry) -> Reference {
    Reference::direct(name, entry.oid).with_peeled(entry.peeled)
}

fn corrupt(reason: impl Into<String>) -> RefError {
    RefError::Corrupt {
        name: "packed-refs".into(),
        reason: reason.into(),
    }
}
