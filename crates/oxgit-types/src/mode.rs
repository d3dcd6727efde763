use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::kind::ObjectKind;

/// File mode for a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    /// Unreadable or not-yet-written entry (0).
    New,
    /// Subtree / directory (0o040000).
    Tree,
    /// Normal file (0o100644).
    Blob,
    /// Executable file (0o100755).
    BlobExecutable,
    /// Symbolic link (0o120000).
    Link,
    /// Submodule commit, a.k.a. gitlink (0o160000).
    Commit,
}

impl FileMode {
    /// Octal mode value.
    pub fn bits(&self) -> u32 {
        match self {
            Self::New => 0,
            Self::Tree => 0o040000,
            Self::Blob => 0o100644,
            Self::BlobExecutable => 0o100755,
            Self::Link => 0o120000,
            Self::Commit => 0o160000,
        }
    }

    /// Parse from an octal mode value.
    ///
    /// The legacy group-writable mode `100664` written by very old git
    /// versions is read as a regular blob.
    pub fn from_bits(bits: u32) -> Result<Self, TypeError> {
        match bits {
            0 => Ok(Self::New),
            0o040000 => Ok(Self::Tree),
            0o100644 | 0o100664 => Ok(Self::Blob),
            0o100755 => Ok(Self::BlobExecutable),
            0o120000 => Ok(Self::Link),
            0o160000 => Ok(Self::Commit),
            other => Err(TypeError::InvalidMode(other)),
        }
    }

    /// Parse the ASCII octal form used inside tree objects.
    pub fn from_octal_ascii(raw: &[u8]) -> Result<Self, TypeError> {
        if raw.is_empty() || raw.len() > 7 {
            return Err(TypeError::InvalidMode(0));
        }
        let mut bits = 0u32;
        for &b in raw {
            if !(b'0'..=b'7').contains(&b) {
                return Err(TypeError::InvalidMode(bits));
            }
            bits = bits * 8 + u32::from(b - b'0');
        }
        Self::from_bits(bits)
    }

    /// The mode as written in tree objects: no leading zero, so trees
    /// serialize as `40000`.
    pub fn to_tree_ascii(&self) -> String {
        format!("{:o}", self.bits())
    }

    /// Returns `true` for subtrees.
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }

    /// The object kind an entry with this mode points at.
    pub fn object_kind(&self) -> Option<ObjectKind> {
        match self {
            Self::Tree => Some(ObjectKind::Tree),
            Self::Blob | Self::BlobExecutable | Self::Link => Some(ObjectKind::Blob),
            Self::Commit => Some(ObjectKind::Commit),
            Self::New => None,
        }
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.bits())
    }
}
