//! Revision expressions and commit walking for oxgit.
//!
//! - [`parser`] turns `main~2^2:src/lib.rs` into a [`RevSpec`]
//! - [`resolver`] evaluates a [`RevSpec`] against an object store and a
//!   reference namespace, bottoming out in a single object
//! - [`walk`] iterates commit history from pushed and hidden start points

pub mod error;
pub mod parser;
pub mod resolver;
pub mod walk;

pub use error::{RevError, RevResult};
pub use parser::{parse, RevSpec, Suffix};
pub use resolver::Resolver;
pub use walk::{RevWalk, SortOrder};
