//! Repository facade for oxgit.
//!
//! [`Repository`] ties the subsystem crates together over one git
//! directory: the object database (loose objects, then packs), the file
//! reference namespace, the revision resolver, and the remotes stored in
//! the `config` file.
//!
//! # Architecture
//!
//! ```text
//! Repository ──┬── ObjectDatabase ── LooseObjectStore, PackStore
//!              ├── FileRefStore ──── loose refs, packed-refs
//!              ├── Resolver / RevWalk
//!              └── Config ────────── remotes, core.*
//! ```
//!
//! # Modules
//!
//! - [`repository`]: open, init, discover, objects, references, HEAD
//! - [`config`]: git's INI dialect, read and written losslessly
//! - [`options`]: construct-time [`RepositoryOptions`]
//! - `tags`, `branches`, `remotes`: further `Repository` operations

pub mod config;
pub mod error;
pub mod options;
pub mod repository;

mod branches;
mod remotes;
mod tags;

pub use config::{parse_bool, Config, ConfigEntry};
pub use error::{Error, Result};
pub use options::{RepositoryOptions, DEFAULT_INITIAL_BRANCH};
pub use repository::Repository;

pub use oxgit_refs::{Branch, BranchType, Expect, HeadState, RefFilter, RefTarget, Reference};
pub use oxgit_remote::{Direction, Refspec, Remote, RemoteHead};
pub use oxgit_store::{Blob, Commit, Object, Tag, Tree, TreeBuilder, TreeEntry};
pub use oxgit_types::{ErrorKind, FileMode, ObjectKind, Oid, Signature, Time};
