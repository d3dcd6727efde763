//! Canonical object hashing for oxgit.
//!
//! An object's id is the SHA-1 of its header (`"<kind> <len>\0"`) followed by
//! its payload. The same bytes hashed as different kinds give different ids,
//! so a blob can never collide with a tree of identical payload.
//!
//! All crypto operations wrap the `sha1` crate; nothing here is hand-rolled.

pub mod hasher;

pub use hasher::{object_header, ObjectHasher, Sha1Stream};
