//! Error types for revision parsing, resolution and walking.

use oxgit_refs::RefError;
use oxgit_store::StoreError;
use oxgit_types::{ErrorKind, Oid};

#[derive(Debug, thiserror::Error)]
pub enum RevError {
    /// The expression is not well-formed.
    #[error("invalid revision {expr:?}: {reason}")]
    Syntax { expr: String, reason: String },

    /// The expression uses a form this implementation does not resolve.
    #[error("unsupported revision syntax in {expr:?}: {feature}")]
    Unsupported { expr: String, feature: &'static str },

    /// The base name matches no reference and no object.
    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    /// `^n` or `~n` walked past the available parents.
    #[error("commit {id} has no parent {n}")]
    NoSuchParent { id: Oid, n: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ref(#[from] RefError),
}

impl RevError {
    /// Classify this error within the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax { .. } => ErrorKind::InvalidArgument,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::UnknownRevision(_) | Self::NoSuchParent { .. } => ErrorKind::NotFound,
            Self::Store(e) => e.kind(),
            Self::Ref(e) => e.kind(),
        }
    }

    pub(crate) fn syntax(expr: &str, reason: impl Into<String>) -> Self {
        Self::Syntax {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(expr: &str, feature: &'static str) -> Self {
        Self::Unsupported {
            expr: expr.to_string(),
            feature,
        }
    }
}

pub type RevResult<T> = Result<T, RevError>;
