use std::path::PathBuf;

use oxgit_refs::RefError;
use oxgit_remote::RemoteError;
use oxgit_rev::RevError;
use oxgit_store::StoreError;
use oxgit_types::ErrorKind;
use thiserror::Error;

/// Errors surfaced by [`Repository`](crate::Repository) operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no git repository found at {}", .0.display())]
    RepositoryNotFound(PathBuf),

    #[error("invalid gitfile {}", .0.display())]
    InvalidGitFile(PathBuf),

    #[error("unsupported repository: {0}")]
    Unsupported(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config line {line}: {reason}")]
    Config { line: usize, reason: String },

    #[error("no such remote: {0}")]
    RemoteNotFound(String),

    #[error("remote {0} already exists")]
    RemoteExists(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Rev(#[from] RevError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RepositoryNotFound(_) | Self::RemoteNotFound(_) => ErrorKind::NotFound,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Config { .. } | Self::InvalidGitFile(_) => ErrorKind::Corrupt,
            Self::RemoteExists(_) => ErrorKind::AlreadyExists,
            Self::Store(e) => e.kind(),
            Self::Ref(e) => e.kind(),
            Self::Rev(e) => e.kind(),
            Self::Remote(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
