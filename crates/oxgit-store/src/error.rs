use oxgit_types::{ErrorKind, ObjectKind, Oid, TypeError};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(Oid),

    /// No object matches an abbreviated id.
    #[error("no object matches prefix {0}")]
    PrefixNotFound(String),

    /// More than one object matches an abbreviated id.
    #[error("abbreviated id {0} is ambiguous")]
    Ambiguous(String),

    /// The object exists but is of a different kind than requested.
    #[error("object {id} is a {actual}, not a {expected}")]
    TypeMismatch {
        id: Oid,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {id}: content hashes to {computed}")]
    HashMismatch { id: Oid, computed: Oid },

    /// The object data is malformed or cannot be decoded.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: Oid, reason: String },

    /// A storage container (pack, index, loose file) is unreadable.
    #[error("corrupt storage: {0}")]
    CorruptStorage(String),

    /// A tree entry failed validation.
    #[error("invalid tree entry {name:?}: {reason}")]
    InvalidTreeEntry { name: String, reason: String },

    /// Index outside the entries of a tree.
    #[error("index {index} out of range for tree with {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    /// A path lookup inside a tree failed.
    #[error("path not found in tree: {0}")]
    PathNotFound(String),

    /// A tree walk was stopped by its visitor.
    #[error("tree walk aborted at {0:?}")]
    Aborted(String),

    /// Malformed identifier or value supplied by the caller.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A writer panicked while holding an in-memory backend's lock.
    #[error("object store lock poisoned")]
    Poisoned,

    /// No backend in the database accepts writes.
    #[error("store is read-only")]
    ReadOnly,
}

impl StoreError {
    /// Classify this error within the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::PrefixNotFound(_) | Self::PathNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Ambiguous(_) => ErrorKind::Ambiguous,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::HashMismatch { .. }
            | Self::CorruptObject { .. }
            | Self::CorruptStorage(_)
            | Self::Poisoned => ErrorKind::Corrupt,
            Self::InvalidTreeEntry { .. } | Self::IndexOutOfRange { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::Aborted(_) => ErrorKind::Aborted,
            Self::Type(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
            Self::ReadOnly => ErrorKind::Unsupported,
        }
    }

    pub(crate) fn corrupt(id: Oid, reason: impl Into<String>) -> Self {
        Self::CorruptObject {
            id,
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
