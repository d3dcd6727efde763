use std::borrow::Cow;

use oxgit_hash::{object_header, ObjectHasher};
use oxgit_types::{ObjectKind, Oid, Signature};

use crate::error::{StoreError, StoreResult};
use crate::tree::Tree;

/// An object in its storage form: kind tag plus canonical payload.
///
/// `RawObject` is the unit backends move around. Backends never interpret
/// the payload; parsing into [`Object`] happens above them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawObject {
    /// The type of this object.
    pub kind: ObjectKind,
    /// The canonical serialized payload (without header).
    pub data: Vec<u8>,
}

impl RawObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Payload length in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Compute the content-addressed id: SHA-1 of header plus payload.
    pub fn compute_id(&self) -> Oid {
        ObjectHasher::new(self.kind).hash(&self.data)
    }

    /// The header-prefixed encoding that is deflated into loose files.
    pub fn to_loose_bytes(&self) -> Vec<u8> {
        let mut out = object_header(self.kind, self.data.len());
        out.extend_from_slice(&self.data);
        out
    }
}

// ---------------------------------------------------------------------------
// Header parsing shared by commits and tags
// ---------------------------------------------------------------------------

/// Split a commit or tag payload into `(name, value)` header pairs and the
/// message. Continuation lines (leading space) are folded into the previous
/// value joined by `\n`.
/// Header block and message of a commit or tag payload.
struct Parts {
    headers: Vec<(String, Vec<u8>)>,
    message: Vec<u8>,
    /// Whether a blank line separated the headers from the message.
    separated: bool,
}

fn split_headers(id: Oid, data: &[u8]) -> StoreResult<Parts> {
    let (head, message, separated) = match find_blank_line(data) {
        Some(pos) => (&data[..pos], data[pos + 2..].to_vec(), true),
        None => (data.strip_suffix(b"\n").unwrap_or(data), Vec::new(), false),
    };

    let mut headers: Vec<(String, Vec<u8>)> = Vec::new();
    for line in head.split(|&b| b == b'\n') {
        if let Some(cont) = line.strip_prefix(b" ") {
            let (_, value) = headers
                .last_mut()
                .ok_or_else(|| StoreError::corrupt(id, "continuation line before any header"))?;
            value.push(b'\n');
            value.extend_from_slice(cont);
            continue;
        }
        let space = line
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| StoreError::corrupt(id, "header line without value"))?;
        let name = std::str::from_utf8(&line[..space])
            .map_err(|_| StoreError::corrupt(id, "header name is not UTF-8"))?;
        headers.push((name.to_string(), line[space + 1..].to_vec()));
    }
    Ok(Parts {
        headers,
        message,
        separated,
    })
}

/// Append the message, preceded by the separating blank line if the
/// object had one.
fn write_message(out: &mut Vec<u8>, separated: bool, message: &[u8]) {
    if separated {
        out.push(b'\n');
    }
    out.extend_from_slice(message);
}

fn find_blank_line(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\n\n")
}

fn write_header(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    out.extend_from_slice(name.as_bytes());
    out.push(b' ');
    for &b in value {
        out.push(b);
        if b == b'\n' {
            out.push(b' ');
        }
    }
    out.push(b'\n');
}

fn parse_oid_value(id: Oid, field: &str, value: &[u8]) -> StoreResult<Oid> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| Oid::from_hex(s).ok())
        .ok_or_else(|| StoreError::corrupt(id, format!("malformed {field} id")))
}

fn parse_signature(id: Oid, field: &str, value: &[u8]) -> StoreResult<Signature> {
    Signature::parse(value).map_err(|e| StoreError::corrupt(id, format!("{field}: {e}")))
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Raw content object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    id: Oid,
    data: Vec<u8>,
}

impl Blob {
    /// Create a blob from raw bytes; the id is computed immediately.
    pub fn new(data: Vec<u8>) -> Self {
        let id = ObjectHasher::BLOB.hash(&data);
        Self { id, data }
    }

    pub fn id(&self) -> Oid {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Heuristic used by `git diff`: a NUL in the first 8000 bytes.
    pub fn is_binary(&self) -> bool {
        self.data.iter().take(8000).any(|&b| b == 0)
    }

    pub fn to_raw(&self) -> RawObject {
        RawObject::new(ObjectKind::Blob, self.data.clone())
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// A snapshot of a tree plus ancestry and authorship.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    id: Oid,
    tree: Oid,
    parents: Vec<Oid>,
    author: Signature,
    committer: Signature,
    extra_headers: Vec<(String, Vec<u8>)>,
    message: Vec<u8>,
    separated: bool,
}

impl Commit {
    /// Build a new commit; the id is computed from the canonical encoding.
    pub fn new(
        tree: Oid,
        parents: Vec<Oid>,
        author: Signature,
        committer: Signature,
        message: impl Into<Vec<u8>>,
    ) -> Self {
        let mut commit = Self {
            id: Oid::zero(),
            tree,
            parents,
            author,
            committer,
            extra_headers: Vec::new(),
            message: message.into(),
            separated: true,
        };
        commit.id = ObjectHasher::COMMIT.hash(&commit.encode());
        commit
    }

    /// Decode a commit payload whose id is already known.
    pub fn parse(id: Oid, data: &[u8]) -> StoreResult<Self> {
        let Parts {
            headers,
            message,
            separated,
        } = split_headers(id, data)?;
        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut extra_headers = Vec::new();

        for (name, value) in headers {
            match name.as_str() {
                "tree" if tree.is_none() => tree = Some(parse_oid_value(id, "tree", &value)?),
                "parent" => parents.push(parse_oid_value(id, "parent", &value)?),
                "author" if author.is_none() => {
                    author = Some(parse_signature(id, "author", &value)?)
                }
                "committer" if committer.is_none() => {
                    committer = Some(parse_signature(id, "committer", &value)?)
                }
                _ => extra_headers.push((name, value)),
            }
        }

        Ok(Self {
            id,
            tree: tree.ok_or_else(|| StoreError::corrupt(id, "commit has no tree"))?,
            parents,
            author: author.ok_or_else(|| StoreError::corrupt(id, "commit has no author"))?,
            committer: committer
                .ok_or_else(|| StoreError::corrupt(id, "commit has no committer"))?,
            extra_headers,
            message,
            separated,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.message.len());
        write_header(&mut out, "tree", self.tree.to_hex().as_bytes());
        for parent in &self.parents {
            write_header(&mut out, "parent", parent.to_hex().as_bytes());
        }
        write_header(&mut out, "author", self.author.to_string().as_bytes());
        write_header(&mut out, "committer", self.committer.to_string().as_bytes());
        for (name, value) in &self.extra_headers {
            write_header(&mut out, name, value);
        }
        write_message(&mut out, self.separated, &self.message);
        out
    }

    pub fn id(&self) -> Oid {
        self.id
    }

    pub fn tree_id(&self) -> Oid {
        self.tree
    }

    pub fn parent_ids(&self) -> &[Oid] {
        &self.parents
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// The `n`th parent (zero-based), if present.
    pub fn parent_id(&self, n: usize) -> Option<Oid> {
        self.parents.get(n).copied()
    }

    pub fn author(&self) -> &Signature {
        &self.author
    }

    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    pub fn message(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }

    pub fn message_bytes(&self) -> &[u8] {
        &self.message
    }

    /// First line of the message.
    pub fn summary(&self) -> Cow<'_, str> {
        let end = self
            .message
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(self.message.len());
        String::from_utf8_lossy(&self.message[..end])
    }

    /// Value of a header the commit model does not interpret
    /// (`encoding`, `gpgsig`, `mergetag`, ...).
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.extra_headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn to_raw(&self) -> RawObject {
        RawObject::new(ObjectKind::Commit, self.encode())
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// An annotated tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    id: Oid,
    target: Oid,
    target_kind: ObjectKind,
    name: String,
    tagger: Option<Signature>,
    extra_headers: Vec<(String, Vec<u8>)>,
    message: Vec<u8>,
    separated: bool,
}

impl Tag {
    pub fn new(
        target: Oid,
        target_kind: ObjectKind,
        name: impl Into<String>,
        tagger: Option<Signature>,
        message: impl Into<Vec<u8>>,
    ) -> Self {
        let mut tag = Self {
            id: Oid::zero(),
            target,
            target_kind,
            name: name.into(),
            tagger,
            extra_headers: Vec::new(),
            message: message.into(),
            separated: true,
        };
        tag.id = ObjectHasher::TAG.hash(&tag.encode());
        tag
    }

    /// Decode a tag payload whose id is already known.
    pub fn parse(id: Oid, data: &[u8]) -> StoreResult<Self> {
        let Parts {
            headers,
            message,
            separated,
        } = split_headers(id, data)?;
        let mut target = None;
        let mut target_kind = None;
        let mut name = None;
        let mut tagger = None;
        let mut extra_headers = Vec::new();

        for (field, value) in headers {
            match field.as_str() {
                "object" if target.is_none() => target = Some(parse_oid_value(id, "object", &value)?),
                "type" if target_kind.is_none() => {
                    target_kind = Some(
                        ObjectKind::from_name(&value)
                            .ok_or_else(|| StoreError::corrupt(id, "unknown tag target type"))?,
                    )
                }
                "tag" if name.is_none() => {
                    name = Some(
                        String::from_utf8(value)
                            .map_err(|_| StoreError::corrupt(id, "tag name is not UTF-8"))?,
                    )
                }
                "tagger" if tagger.is_none() => {
                    tagger = Some(parse_signature(id, "tagger", &value)?)
                }
                _ => extra_headers.push((field, value)),
            }
        }

        Ok(Self {
            id,
            target: target.ok_or_else(|| StoreError::corrupt(id, "tag has no object"))?,
            target_kind: target_kind.ok_or_else(|| StoreError::corrupt(id, "tag has no type"))?,
            name: name.ok_or_else(|| StoreError::corrupt(id, "tag has no name"))?,
            tagger,
            extra_headers,
            message,
            separated,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.message.len());
        write_header(&mut out, "object", self.target.to_hex().as_bytes());
        write_header(&mut out, "type", self.target_kind.as_str().as_bytes());
        write_header(&mut out, "tag", self.name.as_bytes());
        if let Some(tagger) = &self.tagger {
            write_header(&mut out, "tagger", tagger.to_string().as_bytes());
        }
        for (field, value) in &self.extra_headers {
            write_header(&mut out, field, value);
        }
        write_message(&mut out, self.separated, &self.message);
        out
    }

    pub fn id(&self) -> Oid {
        self.id
    }

    pub fn target_id(&self) -> Oid {
        self.target
    }

    pub fn target_kind(&self) -> ObjectKind {
        self.target_kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> Option<&Signature> {
        self.tagger.as_ref()
    }

    pub fn message(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }

    /// Value of a header after `tagger`, such as `encoding`.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.extra_headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn to_raw(&self) -> RawObject {
        RawObject::new(ObjectKind::Tag, self.encode())
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

/// A parsed object of any kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Parse a raw object whose id has already been established.
    pub fn from_raw(id: Oid, raw: RawObject) -> StoreResult<Self> {
        Ok(match raw.kind {
            ObjectKind::Blob => Self::Blob(Blob { id, data: raw.data }),
            ObjectKind::Tree => Self::Tree(Tree::parse(id, &raw.data)?),
            ObjectKind::Commit => Self::Commit(Commit::parse(id, &raw.data)?),
            ObjectKind::Tag => Self::Tag(Tag::parse(id, &raw.data)?),
        })
    }

    pub fn id(&self) -> Oid {
        match self {
            Self::Blob(b) => b.id(),
            Self::Tree(t) => t.id(),
            Self::Commit(c) => c.id(),
            Self::Tag(t) => t.id(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    pub fn to_raw(&self) -> RawObject {
        match self {
            Self::Blob(b) => b.to_raw(),
            Self::Tree(t) => t.to_raw(),
            Self::Commit(c) => c.to_raw(),
            Self::Tag(t) => t.to_raw(),
        }
    }

    fn mismatch(&self, expected: ObjectKind) -> StoreError {
        StoreError::TypeMismatch {
            id: self.id(),
            expected,
            actual: self.kind(),
        }
    }

    pub fn into_blob(self) -> StoreResult<Blob> {
        match self {
            Self::Blob(b) => Ok(b),
            other => Err(other.mismatch(ObjectKind::Blob)),
        }
    }

    pub fn into_tree(self) -> StoreResult<Tree> {
        match self {
            Self::Tree(t) => Ok(t),
            other => Err(other.mismatch(ObjectKind::Tree)),
        }
    }

    pub fn into_commit(self) -> StoreResult<Commit> {
        match self {
            Self::Commit(c) => Ok(c),
            other => Err(other.mismatch(ObjectKind::Commit)),
        }
    }

    pub fn into_tag(self) -> StoreResult<Tag> {
        match self {
            Self::Tag(t) => Ok(t),
            other => Err(other.mismatch(ObjectKind::Tag)),
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Self::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }

    /// Fail with `TypeMismatch` unless the object has the expected kind.
    pub fn expect_kind(self, expected: Option<ObjectKind>) -> StoreResult<Self> {
        match expected {
            Some(kind) if kind != self.kind() => Err(self.mismatch(kind)),
            _ => Ok(self),
        }
    }
}

impl From<Blob> for Object {
    fn from(b: Blob) -> Self {
        Self::Blob(b)
    }
}

impl From<Tree> for Object {
    fn from(t: Tree) -> Self {
        Self::Tree(t)
    }
}

impl From<Commit> for Object {
    fn from(c: Commit) -> Self {
        Self::Commit(c)
    }
}

impl From<Tag> for Object {
    fn from(t: Tag) -> Self {
        Self::Tag(t)
    }
}
