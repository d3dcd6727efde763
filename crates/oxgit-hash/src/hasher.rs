use oxgit_types::{ObjectKind, Oid};
use sha1::{Digest, Sha1};

/// Canonical header for an object of `kind` with a payload of `len` bytes.
pub fn object_header(kind: ObjectKind, len: usize) -> Vec<u8> {
    format!("{} {}\0", kind.as_str(), len).into_bytes()
}

/// Kind-tagged SHA-1 object hasher.
///
/// Each hasher carries the object kind whose header is prepended to every
/// hash computation, matching how git computes object ids.
pub struct ObjectHasher {
    kind: ObjectKind,
}

impl ObjectHasher {
    /// Hasher for blob objects.
    pub const BLOB: Self = Self {
        kind: ObjectKind::Blob,
    };
    /// Hasher for tree objects.
    pub const TREE: Self = Self {
        kind: ObjectKind::Tree,
    };
    /// Hasher for commit objects.
    pub const COMMIT: Self = Self {
        kind: ObjectKind::Commit,
    };
    /// Hasher for tag objects.
    pub const TAG: Self = Self {
        kind: ObjectKind::Tag,
    };

    /// Hasher for an arbitrary kind.
    pub const fn new(kind: ObjectKind) -> Self {
        Self { kind }
    }

    /// Hash a payload with its kind header.
    pub fn hash(&self, data: &[u8]) -> Oid {
        let mut hasher = Sha1::new();
        hasher.update(object_header(self.kind, data.len()));
        hasher.update(data);
        Oid::from_raw(hasher.finalize().into())
    }

    /// Verify that a payload produces the expected id.
    pub fn verify(&self, data: &[u8], expected: &Oid) -> bool {
        self.hash(data) == *expected
    }

    /// The kind whose header this hasher prepends.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }
}

/// Incremental SHA-1 over arbitrary bytes, used for pack and index trailers.
#[derive(Clone, Default)]
pub struct Sha1Stream {
    inner: Sha1,
}

impl Sha1Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finish(self) -> [u8; 20] {
        self.inner.finalize().into()
    }

    /// One-shot digest.
    pub fn digest(data: &[u8]) -> [u8; 20] {
        Sha1::digest(data).into()
    }
}
