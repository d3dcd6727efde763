//! Remotes for oxgit.
//!
//! A [`Remote`] names another repository by URL and carries the refspecs
//! that map its references to local ones. Connecting reads the peer's
//! reference advertisement; [`Remote::list`] turns it into [`RemoteHead`]s
//! annotated with what the local repository already has.
//!
//! # Architecture
//!
//! - A [`Transport`] yields the advertisement as pkt-line bytes, the same
//!   framing git's smart protocol uses; [`pkt`] decodes it.
//! - Only filesystem repositories have a transport ([`LocalTransport`]).
//!   Network URLs are valid but connecting to them is `Unsupported`.
//! - No objects are transferred; fetch and push negotiation live with the
//!   caller.
//!
//! # Modules
//!
//! - [`error`]: Error types for remote operations
//! - [`url`]: URL classification
//! - [`refspec`]: [`Refspec`] parsing and name mapping
//! - [`pkt`]: pkt-line framing and [`Advertisement`]
//! - [`transport`]: The [`Transport`] trait and [`LocalTransport`]
//! - [`head`]: [`RemoteHead`]
//! - [`remote`]: [`Remote`] and its connection lifecycle

pub mod error;
pub mod head;
pub mod pkt;
pub mod refspec;
pub mod remote;
pub mod transport;
pub mod url;

pub use error::{RemoteError, RemoteResult};
pub use head::RemoteHead;
pub use pkt::{AdvertisedRef, Advertisement};
pub use refspec::{Direction, Refspec};
pub use remote::Remote;
pub use transport::{find_git_dir, open_transport, LocalTransport, Transport};
pub use url::{is_supported_url, is_valid_url};
