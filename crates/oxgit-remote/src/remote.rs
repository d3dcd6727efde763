//! The [`Remote`] model and its connection lifecycle.

use oxgit_refs::{validate_remote_name, RefStore, REMOTES_PREFIX};
use oxgit_store::ObjectStore;
use oxgit_types::{ErrorKind, Oid};
use tracing::debug;

use crate::error::{RemoteError, RemoteResult};
use crate::head::RemoteHead;
use crate::pkt::Advertisement;
use crate::refspec::{Direction, Refspec};
use crate::transport::{open_transport, Transport};

struct Connection {
    direction: Direction,
    transport: Box<dyn Transport>,
    advertisement: Advertisement,
}

/// A named or anonymous remote repository.
///
/// A remote holds at most one connection. Connecting is blocking and has
/// no timeout of its own. After [`disconnect`](Self::disconnect), every
/// operation that needs the connection fails with `NotConnected` rather
/// than reconnecting.
pub struct Remote {
    name: Option<String>,
    url: String,
    fetch: Vec<Refspec>,
    push: Vec<Refspec>,
    connection: Option<Connection>,
}

impl Remote {
    /// A named remote with the default fetch refspec
    /// `+refs/heads/*:refs/remotes/<name>/*`.
    pub fn new(name: &str, url: &str) -> RemoteResult<Self> {
        let fetch = Refspec::parse(&format!("+refs/heads/*:{REMOTES_PREFIX}{name}/*"));
        let mut remote = Self::from_parts(Some(name), url, Vec::new(), Vec::new())?;
        remote.fetch.push(fetch?);
        Ok(remote)
    }

    /// A remote with no name, never saved to configuration.
    pub fn anonymous(url: &str, fetch: &[&str]) -> RemoteResult<Self> {
        let fetch = parse_all(fetch)?;
        Self::from_parts(None, url, fetch, Vec::new())
    }

    /// Build a remote from already-parsed parts, as loaded from config.
    pub fn from_parts(
        name: Option<&str>,
        url: &str,
        fetch: Vec<Refspec>,
        push: Vec<Refspec>,
    ) -> RemoteResult<Self> {
        if let Some(name) = name {
            validate_remote_name(name).map_err(|e| RemoteError::InvalidName {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        }
        if url.trim().is_empty() {
            return Err(RemoteError::InvalidUrl(url.to_string()));
        }
        Ok(Self {
            name: name.map(str::to_string),
            url: url.to_string(),
            fetch,
            push,
            connection: None,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fetch_refspecs(&self) -> &[Refspec] {
        &self.fetch
    }

    pub fn push_refspecs(&self) -> &[Refspec] {
        &self.push
    }

    /// Fetch refspecs in their textual form.
    pub fn fetch_specs(&self) -> Vec<String> {
        self.fetch.iter().map(Refspec::to_string).collect()
    }

    pub fn push_specs(&self) -> Vec<String> {
        self.push.iter().map(Refspec::to_string).collect()
    }

    pub fn add_fetch_spec(&mut self, spec: &str) -> RemoteResult<()> {
        self.fetch.push(Refspec::parse(spec)?);
        Ok(())
    }

    /// Replace all fetch refspecs. Nothing changes if any of them is invalid.
    pub fn set_fetch_specs(&mut self, specs: &[&str]) -> RemoteResult<()> {
        self.fetch = parse_all(specs)?;
        Ok(())
    }

    pub fn add_push_spec(&mut self, spec: &str) -> RemoteResult<()> {
        self.push.push(Refspec::parse(spec)?);
        Ok(())
    }

    pub fn set_push_specs(&mut self, specs: &[&str]) -> RemoteResult<()> {
        self.push = parse_all(specs)?;
        Ok(())
    }

    /// The local ref the fetch refspecs store `name` under.
    pub fn tracking_ref(&self, name: &str) -> Option<String> {
        self.fetch.iter().find_map(|spec| spec.transform(name))
    }

    /// Connect through the transport the URL selects.
    pub fn connect(&mut self, direction: Direction) -> RemoteResult<()> {
        let transport = open_transport(&self.url, direction)?;
        self.connect_with(direction, transport)
    }

    /// Connect over a caller-supplied transport. Any existing connection is
    /// closed first.
    pub fn connect_with(
        &mut self,
        direction: Direction,
        mut transport: Box<dyn Transport>,
    ) -> RemoteResult<()> {
        self.disconnect()?;
        let advertisement = Advertisement::decode(&transport.advertisement()?)?;
        debug!(
            remote = %self.label(),
            url = %self.url,
            %direction,
            refs = advertisement.refs.len(),
            "remote connected"
        );
        self.connection = Some(Connection { direction, transport, advertisement });
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Direction of the live connection, if any.
    pub fn direction(&self) -> Option<Direction> {
        self.connection.as_ref().map(|c| c.direction)
    }

    /// Capabilities the peer announced on connect.
    pub fn capabilities(&self) -> RemoteResult<&[String]> {
        Ok(&self.connection()?.advertisement.capabilities)
    }

    /// Close the connection. Disconnecting an unconnected remote is a no-op.
    pub fn disconnect(&mut self) -> RemoteResult<()> {
        if let Some(mut connection) = self.connection.take() {
            connection.transport.close()?;
            debug!(remote = %self.label(), "remote disconnected");
        }
        Ok(())
    }

    /// The heads the peer advertised, in advertisement order.
    ///
    /// `objects` and `refs` are the local repository: they decide
    /// [`RemoteHead::is_local`] and [`RemoteHead::local_oid`].
    pub fn list<O, R>(&self, objects: &O, refs: &R) -> RemoteResult<Vec<RemoteHead>>
    where
        O: ObjectStore + ?Sized,
        R: RefStore + ?Sized,
    {
        let connection = self.connection()?;
        connection
            .advertisement
            .refs
            .iter()
            .map(|advertised| {
                let local_oid = match self.tracking_ref(&advertised.name) {
                    Some(tracking) => match refs.resolve_to_oid(&tracking) {
                        Ok(oid) => oid,
                        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::BrokenRef) => {
                            Oid::zero()
                        }
                        Err(e) => return Err(e.into()),
                    },
                    None => Oid::zero(),
                };
                Ok(RemoteHead {
                    is_local: objects.exists(&advertised.oid)?,
                    oid: advertised.oid,
                    local_oid,
                    name: advertised.name.clone(),
                })
            })
            .collect()
    }

    fn connection(&self) -> RemoteResult<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| RemoteError::NotConnected(self.label()))
    }

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.url.clone())
    }
}

impl Drop for Remote {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            debug!(error = %e, "error closing remote on drop");
        }
    }
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("fetch", &self.fetch_specs())
            .field("push", &self.push_specs())
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn parse_all(specs: &[&str]) -> RemoteResult<Vec<Refspec>> {
    specs.iter().map(|s| Refspec::parse(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkt::AdvertisedRef;
    use oxgit_refs::InMemoryRefStore;
    use oxgit_store::{Blob, InMemoryObjectStore};

    /// Replays a fixed advertisement and counts closes.
    struct Canned {
        bytes: Vec<u8>,
        closed: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl Transport for Canned {
        fn advertisement(&mut self) -> RemoteResult<Vec<u8>> {
            Ok(self.bytes.clone())
        }

        fn close(&mut self) -> RemoteResult<()> {
            self.closed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn canned(refs: Vec<AdvertisedRef>) -> (Box<dyn Transport>, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        let advert = Advertisement { refs, capabilities: vec!["ofs-delta".into()] };
        let closed = std::sync::Arc::default();
        let transport = Canned { bytes: advert.encode().unwrap(), closed: std::sync::Arc::clone(&closed) };
        (Box::new(transport), closed)
    }

    fn hex(n: u8) -> Oid {
        Oid::from_raw([n; 20])
    }

    // -----------------------------------------------------------------------
    // Construction and refspecs
    // -----------------------------------------------------------------------

    #[test]
    fn named_remote_gets_default_fetch_spec() {
        let remote = Remote::new("origin", "https://example.com/r.git").unwrap();
        assert_eq!(remote.name(), Some("origin"));
        assert_eq!(remote.fetch_specs(), ["+refs/heads/*:refs/remotes/origin/*"]);
        assert!(remote.push_specs().is_empty());
        assert_eq!(
            remote.tracking_ref("refs/heads/main").as_deref(),
            Some("refs/remotes/origin/main")
        );
        assert_eq!(remote.tracking_ref("HEAD"), None);
    }

    #[test]
    fn invalid_names_and_urls() {
        assert_eq!(Remote::new("a/b", "x").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(Remote::new("", "x").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(Remote::new("origin", " ").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            Remote::anonymous("x", &["refs/*/*:y/*"]).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn refspec_lists() {
        let mut remote = Remote::anonymous("/srv/repo", &[]).unwrap();
        assert_eq!(remote.name(), None);
        remote.add_fetch_spec("refs/heads/main:refs/remotes/up/main").unwrap();
        remote.add_push_spec("refs/heads/main").unwrap();
        assert_eq!(remote.fetch_specs(), ["refs/heads/main:refs/remotes/up/main"]);
        assert_eq!(remote.push_specs(), ["refs/heads/main"]);

        let before = remote.fetch_specs();
        assert!(remote.set_fetch_specs(&["+refs/tags/*:refs/tags/*", "a:b:c"]).is_err());
        assert_eq!(remote.fetch_specs(), before);

        remote.set_fetch_specs(&["+refs/tags/*:refs/tags/*"]).unwrap();
        remote.set_push_specs(&[]).unwrap();
        assert_eq!(remote.fetch_refspecs().len(), 1);
        assert!(remote.push_refspecs().is_empty());
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn list_requires_connection() {
        let objects = InMemoryObjectStore::new();
        let refs = InMemoryRefStore::new();
        let mut remote = Remote::new("origin", "/nowhere").unwrap();
        assert_eq!(remote.list(&objects, &refs).unwrap_err().kind(), ErrorKind::NotConnected);

        let (transport, closed) = canned(vec![]);
        remote.connect_with(Direction::Fetch, transport).unwrap();
        assert!(remote.is_connected());
        assert_eq!(remote.direction(), Some(Direction::Fetch));
        assert!(remote.list(&objects, &refs).unwrap().is_empty());
        assert_eq!(remote.capabilities().unwrap(), ["ofs-delta"]);

        remote.disconnect().unwrap();
        remote.disconnect().unwrap();
        assert_eq!(closed.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(!remote.is_connected());
        assert_eq!(remote.list(&objects, &refs).unwrap_err().kind(), ErrorKind::NotConnected);
        assert_eq!(remote.capabilities().unwrap_err().kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn reconnect_closes_previous_transport() {
        let mut remote = Remote::new("origin", "/nowhere").unwrap();
        let (first, first_closed) = canned(vec![]);
        let (second, second_closed) = canned(vec![]);
        remote.connect_with(Direction::Fetch, first).unwrap();
        remote.connect_with(Direction::Push, second).unwrap();
        assert_eq!(first_closed.load(std::sync::atomic::Ordering::SeqCst), 1);
        drop(remote);
        assert_eq!(second_closed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn unsupported_url_does_not_connect() {
        let mut remote = Remote::new("origin", "git@example.com:org/repo.git").unwrap();
        assert_eq!(remote.connect(Direction::Fetch).unwrap_err().kind(), ErrorKind::Unsupported);
        assert!(!remote.is_connected());
    }

    // -----------------------------------------------------------------------
    // Head list
    // -----------------------------------------------------------------------

    #[test]
    fn heads_carry_local_state() {
        let objects = InMemoryObjectStore::new();
        let have = objects.write(&Blob::new(b"have".to_vec()).to_raw()).unwrap();
        let refs = InMemoryRefStore::new();
        refs.create_direct("refs/remotes/origin/main", hex(7), false).unwrap();

        let mut remote = Remote::new("origin", "/nowhere").unwrap();
        let (transport, _) = canned(vec![
            AdvertisedRef::new(have, "HEAD"),
            AdvertisedRef::new(have, "refs/heads/main"),
            AdvertisedRef::new(hex(9), "refs/heads/topic"),
            AdvertisedRef::new(hex(9), "refs/tags/v1"),
        ]);
        remote.connect_with(Direction::Fetch, transport).unwrap();

        let heads = remote.list(&objects, &refs).unwrap();
        let names: Vec<_> = heads.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["HEAD", "refs/heads/main", "refs/heads/topic", "refs/tags/v1"]);
        assert!(heads[0].is_local);
        assert_eq!(heads[0].local_oid, Oid::zero());
        assert_eq!(heads[1].local_oid, hex(7));
        assert!(heads[1].needs_update());
        assert!(!heads[2].is_local);
        assert_eq!(heads[2].local_oid, Oid::zero());
        assert_eq!(heads[3].local_oid, Oid::zero());
    }

    #[test]
    fn local_repository_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let git = dir.path();
        std::fs::create_dir_all(git.join("objects")).unwrap();
        std::fs::create_dir_all(git.join("refs/heads")).unwrap();
        std::fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        let blob = oxgit_hash::ObjectHasher::BLOB.hash(b"hello");
        std::fs::write(git.join("refs/heads/main"), format!("{blob}\n")).unwrap();

        let mut remote = Remote::new("origin", git.to_str().unwrap()).unwrap();
        remote.connect(Direction::Fetch).unwrap();
        let heads = remote.list(&InMemoryObjectStore::new(), &InMemoryRefStore::new()).unwrap();
        let names: Vec<_> = heads.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["HEAD", "refs/heads/main"]);
        assert!(heads.iter().all(|h| h.oid == blob && !h.is_local));
    }
}
