//! Error types for reference operations.

use oxgit_types::{ErrorKind, TypeError};
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found.
    #[error("reference not found: {0}")]
    NotFound(String),

    /// A reference with this name already exists.
    #[error("reference already exists: {0}")]
    AlreadyExists(String),

    /// The name fails git's reference name rules.
    #[error("invalid reference name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A symbolic chain is cyclic, too deep, or ends at a missing reference.
    #[error("broken reference {name}: {reason}")]
    BrokenRef { name: String, reason: String },

    /// The operation needs a direct reference but found a symbolic one, or
    /// the other way round.
    #[error("reference {name} is not {expected}")]
    WrongKind { name: String, expected: &'static str },

    /// A compare-and-swap update found a different current value.
    #[error("reference {0} changed concurrently")]
    Modified(String),

    /// Another writer holds `<name>.lock`.
    #[error("reference {0} is locked")]
    Locked(String),

    /// The checked-out branch cannot be overwritten or deleted.
    #[error("cannot modify the checked-out branch {0}")]
    CurrentBranch(String),

    /// A loose ref file or `packed-refs` line is unreadable.
    #[error("corrupt reference {name}: {reason}")]
    Corrupt { name: String, reason: String },

    /// A writer panicked while holding an in-memory store's lock.
    #[error("reference store lock poisoned")]
    Poisoned,

    /// Enumeration was stopped by its visitor.
    #[error("reference enumeration aborted at {0}")]
    Aborted(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RefError {
    /// Classify this error within the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::InvalidName { .. } | Self::CurrentBranch(_) => ErrorKind::InvalidArgument,
            Self::BrokenRef { .. } => ErrorKind::BrokenRef,
            Self::WrongKind { .. } => ErrorKind::TypeMismatch,
            Self::Modified(_) => ErrorKind::Modified,
            Self::Locked(_) => ErrorKind::Locked,
            Self::Corrupt { .. } | Self::Poisoned => ErrorKind::Corrupt,
            Self::Aborted(_) => ErrorKind::Aborted,
            Self::Type(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn broken(name: &str, reason: impl Into<String>) -> Self {
        Self::BrokenRef {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for ref operations.
pub type RefResult<T> = std::result::Result<T, RefError>;
