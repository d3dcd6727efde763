use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("abbreviated object id too short: {len} hex digits (minimum {min})")]
    PrefixTooShort { len: usize, min: usize },

    #[error("unknown object kind: {0}")]
    UnknownKind(String),

    #[error("invalid file mode: {0:o}")]
    InvalidMode(u32),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

impl TypeError {
    /// Classify this error within the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedSignature(_) | Self::InvalidMode(_) | Self::UnknownKind(_) => {
                ErrorKind::Corrupt
            }
            _ => ErrorKind::InvalidArgument,
        }
    }
}

/// Coarse classification shared by every oxgit error type.
///
/// Each crate keeps its own detailed error enum; `kind()` on any of them
/// maps onto this taxonomy so callers can branch without matching on the
/// layer that produced the failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The object, reference, remote, or repository does not exist.
    NotFound,
    /// Creation would overwrite an existing entry without `force`.
    AlreadyExists,
    /// An abbreviated identifier or name matches more than one candidate.
    Ambiguous,
    /// Stored bytes failed hash verification or are structurally invalid.
    Corrupt,
    /// An object exists but is not of the requested kind.
    TypeMismatch,
    /// A symbolic reference chain is cyclic, too deep, or dangling.
    BrokenRef,
    /// Underlying filesystem or transport failure.
    Io,
    /// The request is well-formed but not supported (e.g. URL scheme).
    Unsupported,
    /// Malformed caller input (bad name, bad syntax, out of range).
    InvalidArgument,
    /// An iteration was stopped by its visitor.
    Aborted,
    /// A lock file is held by another writer.
    Locked,
    /// A compare-and-swap update saw a different current value.
    Modified,
    /// A remote operation was attempted without a live connection.
    NotConnected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::Ambiguous => "ambiguous",
            Self::Corrupt => "corrupt",
            Self::TypeMismatch => "type mismatch",
            Self::BrokenRef => "broken reference",
            Self::Io => "i/o",
            Self::Unsupported => "unsupported",
            Self::InvalidArgument => "invalid argument",
            Self::Aborted => "aborted",
            Self::Locked => "locked",
            Self::Modified => "modified",
            Self::NotConnected => "not connected",
        };
        f.write_str(s)
    }
}
