use oxgit_store::StoreError;
use oxgit_types::{ErrorKind, Oid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported pack or index version: {0}")]
    UnsupportedVersion(u32),

    #[error("{0} checksum mismatch")]
    ChecksumMismatch(&'static str),

    #[error("corrupt pack entry at offset {offset}: {reason}")]
    CorruptEntry { offset: u64, reason: String },

    #[error("CRC32 mismatch for entry at offset {offset}")]
    CrcMismatch { offset: u64 },

    #[error("decompression failed at offset {offset}: {reason}")]
    DecompressionFailed { offset: u64, reason: String },

    #[error("packed object {id} hashes to {computed}")]
    HashMismatch { id: Oid, computed: Oid },

    #[error("delta base not found: {0}")]
    DeltaBaseNotFound(Oid),

    #[error("delta chain deeper than {limit} at offset {offset}")]
    DeltaTooDeep { offset: u64, limit: usize },

    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    #[error("index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("pack too large for index v2 ({0} objects)")]
    TooManyObjects(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::UnsupportedVersion(_) => ErrorKind::Unsupported,
            Self::TooManyObjects(_) => ErrorKind::InvalidArgument,
            _ => ErrorKind::Corrupt,
        }
    }
}

pub type PackResult<T> = Result<T, PackError>;

impl From<PackError> for StoreError {
    fn from(err: PackError) -> Self {
        match err {
            PackError::Io(e) => StoreError::Io(e),
            PackError::HashMismatch { id, computed } => StoreError::HashMismatch { id, computed },
            other => StoreError::CorruptStorage(other.to_string()),
        }
    }
}
