//! Transports deliver a remote's reference advertisement.
//!
//! Only repositories reachable through the filesystem have a transport;
//! network URLs are recognised but refused with `Unsupported`.

use std::path::{Path, PathBuf};

use oxgit_pack::PackStore;
use oxgit_refs::{FileRefStore, RefStore, HEAD};
use oxgit_store::{LooseObjectStore, ObjectDatabase, ObjectStore};
use oxgit_types::{ErrorKind, ObjectKind, Oid};
use tracing::{debug, warn};

use crate::error::{RemoteError, RemoteResult};
use crate::pkt::{AdvertisedRef, Advertisement};
use crate::refspec::Direction;
use crate::url::{classify, UrlKind};

const AGENT: &str = concat!("agent=oxgit/", env!("CARGO_PKG_VERSION"));

/// A session with one remote repository.
///
/// A transport is used by a single connection and is never shared between
/// concurrent requests.
pub trait Transport: Send {
    /// The reference advertisement as raw pkt-line bytes.
    fn advertisement(&mut self) -> RemoteResult<Vec<u8>>;

    /// Release the session.
    fn close(&mut self) -> RemoteResult<()> {
        Ok(())
    }
}

/// Open the transport `url` selects.
pub fn open_transport(url: &str, direction: Direction) -> RemoteResult<Box<dyn Transport>> {
    match classify(url) {
        Some(UrlKind::Local(path)) => Ok(Box::new(LocalTransport::open(&path, direction)?)),
        Some(_) => Err(RemoteError::UnsupportedUrl(url.to_string())),
        None => Err(RemoteError::InvalidUrl(url.to_string())),
    }
}

/// Locate the git directory at `path`: `path/.git` for a repository with a
/// working tree, or `path` itself for a bare one.
pub fn find_git_dir(path: &Path) -> Option<PathBuf> {
    [path.join(".git"), path.to_path_buf()]
        .into_iter()
        .find(|dir| dir.join("objects").is_dir() && dir.join("refs").is_dir() && dir.join("HEAD").is_file())
}

/// Serves the advertisement of a repository on the local filesystem, the
/// way `git-upload-pack` (fetch) or `git-receive-pack` (push) would.
pub struct LocalTransport {
    git_dir: PathBuf,
    direction: Direction,
    objects: ObjectDatabase,
    refs: FileRefStore,
}

impl LocalTransport {
    pub fn open(path: &Path, direction: Direction) -> RemoteResult<Self> {
        let git_dir = find_git_dir(path)
            .ok_or_else(|| RemoteError::RepositoryNotFound(path.display().to_string()))?;
        let objects_dir = git_dir.join("objects");
        let objects = ObjectDatabase::new()
            .with_backend(LooseObjectStore::new(&objects_dir))
            .with_backend(PackStore::open(objects_dir.join("pack"))?);
        let refs = FileRefStore::new(&git_dir);
        debug!(git_dir = %git_dir.display(), %direction, "local transport opened");
        Ok(Self { git_dir, direction, objects, refs })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// HEAD (fetch only) then every resolvable ref in name order, each
    /// annotated tag followed by its peeled `^{}` entry (fetch only).
    pub fn build_advertisement(&self) -> RemoteResult<Advertisement> {
        let fetch = self.direction == Direction::Fetch;
        let mut advert = Advertisement::default();

        if fetch {
            match self.refs.resolve_to_oid(HEAD) {
                Ok(oid) => {
                    advert.refs.push(AdvertisedRef::new(oid, HEAD));
                    if let Some(target) = self.refs.head()?.symbolic_target() {
                        advert.capabilities.push(format!("symref={HEAD}:{target}"));
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::BrokenRef | ErrorKind::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        for reference in self.refs.list("refs/")? {
            let name = reference.name();
            let oid = match self.refs.resolve_to_oid(name) {
                Ok(oid) => oid,
                Err(e) if e.kind() == ErrorKind::BrokenRef => {
                    debug!(name, "skipping unresolvable reference");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            advert.refs.push(AdvertisedRef::new(oid, name));
            if fetch {
                if let Some(peeled) = self.peeled(oid, reference.peeled())? {
                    advert.refs.push(AdvertisedRef::new(peeled, format!("{name}^{{}}")));
                }
            }
        }

        advert.capabilities.push(if fetch { "ofs-delta" } else { "report-status" }.to_string());
        if !fetch {
            advert.capabilities.push("delete-refs".to_string());
        }
        advert.capabilities.push(AGENT.to_string());
        Ok(advert)
    }

    /// The object an annotated tag ultimately points at, or `None` for
    /// anything that is not a tag.
    fn peeled(&self, oid: Oid, recorded: Option<Oid>) -> RemoteResult<Option<Oid>> {
        if let Some(peeled) = recorded {
            return Ok((peeled != oid).then_some(peeled));
        }
        let object = match self.objects.lookup(&oid, None) {
            Ok(object) => object,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(oid = %oid, "advertised object is missing");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if object.kind() != ObjectKind::Tag {
            return Ok(None);
        }
        Ok(Some(self.objects.peel_tags(object)?.id()))
    }
}

impl Transport for LocalTransport {
    fn advertisement(&mut self) -> RemoteResult<Vec<u8>> {
        self.objects.refresh()?;
        self.build_advertisement()?.encode()
    }

    fn close(&mut self) -> RemoteResult<()> {
        debug!(git_dir = %self.git_dir.display(), "local transport closed");
        Ok(())
    }
}
