//! Content-addressed object storage for oxgit.
//!
//! This crate implements the object half of a git repository: the four object
//! kinds, their canonical encodings, and the backends that persist them under
//! `.git/objects/`. Every object is identified by the SHA-1 of its canonical
//! serialization, and every object value carries the id it hashes to.
//!
//! # Object Types
//!
//! - [`Blob`] -- raw content (file contents, arbitrary data)
//! - [`Tree`] -- sorted directory listing mapping names to (mode, id)
//! - [`Commit`] -- tree snapshot plus parents, author, committer, message
//! - [`Tag`] -- annotated tag pointing at another object
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`LooseObjectStore`] -- zlib-deflated files under `objects/xx/yyyy...`
//! - [`ObjectDatabase`] -- ordered composite over several backends
//!
//! The pack backend lives in `oxgit-pack` and plugs into [`ObjectDatabase`].
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Bytes read from disk are re-hashed; a mismatch is reported, never repaired.
//! 3. Concurrent reads are always safe (objects are immutable).
//! 4. Writers are serialized by the caller; object writes are atomic renames.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod loose;
pub mod memory;
pub mod object;
pub mod odb;
pub mod traits;
pub mod tree;
pub mod walk;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use loose::LooseObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{Blob, Commit, Object, RawObject, Tag};
pub use odb::ObjectDatabase;
pub use traits::ObjectStore;
pub use tree::{Tree, TreeBuilder, TreeEntry};
pub use walk::{TreeWalker, WalkControl, WalkItem, WalkOrder};
