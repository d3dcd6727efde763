//! Foundation types for oxgit.
//!
//! This crate provides the identity and structural types shared by every
//! other oxgit crate. Nothing here touches the filesystem.
//!
//! # Key Types
//!
//! - [`Oid`]: 20-byte SHA-1 content hash identifying an object
//! - [`OidPrefix`]: abbreviated (partial) object identifier
//! - [`ObjectKind`]: blob, tree, commit, or tag
//! - [`FileMode`]: mode of a tree entry
//! - [`Signature`]: author / committer / tagger identity with a timestamp
//! - [`ErrorKind`]: the error taxonomy every oxgit error maps onto

pub mod error;
pub mod kind;
pub mod mode;
pub mod oid;
pub mod signature;

pub use error::{ErrorKind, TypeError};
pub use kind::ObjectKind;
pub use mode::FileMode;
pub use oid::{Oid, OidPrefix, OID_HEX_LEN, OID_RAW_LEN};
pub use signature::{Signature, Time};
