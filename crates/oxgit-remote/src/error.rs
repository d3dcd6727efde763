use oxgit_refs::RefError;
use oxgit_store::StoreError;
use oxgit_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid remote name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid url: {0:?}")]
    InvalidUrl(String),

    #[error("unsupported url: {0}")]
    UnsupportedUrl(String),

    #[error("invalid refspec {spec:?}: {reason}")]
    InvalidRefspec { spec: String, reason: String },

    #[error("remote {0} is not connected")]
    NotConnected(String),

    #[error("no repository at {0}")]
    RepositoryNotFound(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName { .. } | Self::InvalidUrl(_) | Self::InvalidRefspec { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::UnsupportedUrl(_) => ErrorKind::Unsupported,
            Self::NotConnected(_) => ErrorKind::NotConnected,
            Self::RepositoryNotFound(_) => ErrorKind::NotFound,
            Self::Protocol(_) => ErrorKind::Corrupt,
            Self::Ref(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol(reason.into())
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;
