//! Reference namespace for oxgit.
//!
//! References are the mutable, human-readable entry points into the object
//! graph. A reference is either direct (holds an object id) or symbolic
//! (names another reference, as `HEAD` usually does).
//!
//! # Architecture
//!
//! - **Branches** live under `refs/heads/`, remote-tracking branches under
//!   `refs/remotes/`, tags under `refs/tags/`. These are views derived from
//!   the name, not separate storage kinds.
//! - **HEAD** is attached (symbolic, to an existing branch), orphan
//!   (symbolic, to a branch not yet created) or detached (direct).
//! - Symbolic chains are resolved with cycle detection and a depth limit.
//!
//! # Modules
//!
//! - [`error`]: Error types for ref operations
//! - [`types`]: [`Reference`], [`RefTarget`], [`Branch`], [`HeadState`]
//! - [`traits`]: The [`RefStore`] trait
//! - [`names`]: Reference name validation and shorthand rules
//! - [`memory`]: In-memory [`InMemoryRefStore`]
//! - [`file`]: [`FileRefStore`] over loose refs and `packed-refs`
//! - [`packed`]: The `packed-refs` codec

pub mod error;
pub mod file;
pub mod memory;
pub mod names;
pub mod packed;
pub mod traits;
pub mod types;

pub use error::{RefError, RefResult};
pub use file::FileRefStore;
pub use memory::InMemoryRefStore;
pub use names::{
    glob_match, shorthand, validate_branch_name, validate_ref_name, validate_remote_name,
    validate_tag_name, HEAD, HEADS_PREFIX, REFS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX,
};
pub use packed::{PackedEntry, PackedRefs};
pub use traits::{RefStore, References, MAX_SYMBOLIC_DEPTH};
pub use types::{
    Branch, BranchType, Expect, HeadState, RefClass, RefFilter, RefKind, RefTarget, Reference,
};
