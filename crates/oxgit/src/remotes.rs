//! Remotes persisted in the repository's `config` file.
//!
//! A saved remote is a `[remote "<name>"]` section with one `url` and any
//! number of ordered `fetch` and `push` refspecs.

use oxgit_refs::{RefStore, REMOTES_PREFIX};
use oxgit_remote::{Refspec, Remote};
use tracing::debug;

use crate::error::{Error, Result};
use crate::repository::Repository;

impl Repository {
    /// Configure a new remote with the default fetch refspec.
    pub fn add_remote(&self, name: &str, url: &str) -> Result<Remote> {
        let remote = Remote::new(name, url)?;
        if self.config()?.get(&url_key(name))?.is_some() {
            return Err(Error::RemoteExists(name.to_string()));
        }
        self.save_remote(&remote)?;
        debug!(name, url, "remote added");
        Ok(remote)
    }

    /// Load a configured remote.
    pub fn remote(&self, name: &str) -> Result<Remote> {
        let config = self.config()?;
        let url = config
            .get(&url_key(name))?
            .ok_or_else(|| Error::RemoteNotFound(name.to_string()))?;
        let fetch = parse_specs(&config.get_all(&format!("remote.{name}.fetch"))?)?;
        let push = parse_specs(&config.get_all(&format!("remote.{name}.push"))?)?;
        Ok(Remote::from_parts(Some(name), &url, fetch, push)?)
    }

    /// A remote for `url` that is never written to configuration.
    pub fn remote_anonymous(&self, url: &str) -> Result<Remote> {
        Ok(Remote::anonymous(url, &[])?)
    }

    /// Names of every remote with a `url`, in configuration order.
    pub fn list_remotes(&self) -> Result<Vec<String>> {
        let config = self.config()?;
        let mut names = Vec::new();
        for name in config.subsections("remote") {
            if config.get(&url_key(&name))?.is_some() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Write `remote`'s url and refspecs, replacing what was stored.
    pub fn save_remote(&self, remote: &Remote) -> Result<()> {
        let name = remote
            .name()
            .ok_or_else(|| Error::invalid("anonymous remotes cannot be saved"))?;
        let fetch = remote.fetch_specs();
        let push = remote.push_specs();

        let mut config = self.config()?;
        config.set(&url_key(name), remote.url())?;
        config.set_all(
            &format!("remote.{name}.fetch"),
            &fetch.iter().map(String::as_str).collect::<Vec<_>>(),
        )?;
        config.set_all(
            &format!("remote.{name}.push"),
            &push.iter().map(String::as_str).collect::<Vec<_>>(),
        )?;
        config.save()?;
        debug!(name, fetch = fetch.len(), push = push.len(), "remote saved");
        Ok(())
    }

    /// Remove a remote's configuration and its remote-tracking references.
    pub fn delete_remote(&self, name: &str) -> Result<()> {
        let mut config = self.config()?;
        if !config.remove_section("remote", Some(name)) {
            return Err(Error::RemoteNotFound(name.to_string()));
        }
        config.save()?;

        let prefix = format!("{REMOTES_PREFIX}{name}/");
        let mut removed = 0;
        for reference in self.refs().list(&prefix)? {
            if self.refs().delete(reference.name())? {
                removed += 1;
            }
        }
        debug!(name, removed, "remote deleted");
        Ok(())
    }
}

fn url_key(name: &str) -> String {
    format!("remote.{name}.url")
}

fn parse_specs(specs: &[String]) -> Result<Vec<Refspec>> {
    Ok(specs
        .iter()
        .map(|s| Refspec::parse(s))
        .collect::<std::result::Result<_, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxgit_remote::{Direction, RemoteHead};
    use oxgit_store::TreeBuilder;
    use oxgit_types::{ErrorKind, Oid, Signature, Time};

    fn sig() -> Signature {
        Signature::new("Ada", "ada@example.com", Time::new(1_700_000_000, 0))
    }

    fn init() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path(), false).unwrap();
        (dir, repo)
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    #[test]
    fn add_persists_default_refspec() {
        let (_dir, repo) = init();
        repo.add_remote("origin", "https://example.com/r.git").unwrap();
        let text = std::fs::read_to_string(repo.git_dir().join("config")).unwrap();
        assert!(text.contains("[remote \"origin\"]"));
        assert!(text.contains("fetch = +refs/heads/*:refs/remotes/origin/*"));

        let loaded = repo.remote("origin").unwrap();
        assert_eq!(loaded.name(), Some("origin"));
        assert_eq!(loaded.url(), "https://example.com/r.git");
        assert_eq!(loaded.fetch_specs(), ["+refs/heads/*:refs/remotes/origin/*"]);
        assert!(loaded.push_specs().is_empty());
        assert_eq!(repo.list_remotes().unwrap(), ["origin"]);
    }

    #[test]
    fn add_rejects_duplicates_and_bad_names() {
        let (_dir, repo) = init();
        repo.add_remote("origin", "/tmp/x").unwrap();
        assert_eq!(repo.add_remote("origin", "/tmp/y").unwrap_err().kind(), ErrorKind::AlreadyExists);
        assert_eq!(repo.add_remote("a/b", "/tmp/y").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(repo.add_remote("up", "").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(repo.remote("missing").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn save_replaces_refspecs_in_order() {
        let (_dir, repo) = init();
        let mut remote = repo.add_remote("up", "/srv/up").unwrap();
        remote
            .set_fetch_specs(&["+refs/heads/main:refs/remotes/up/main", "refs/tags/*:refs/tags/*"])
            .unwrap();
        remote.add_push_spec("refs/heads/main:refs/heads/main").unwrap();
        repo.save_remote(&remote).unwrap();

        let loaded = repo.remote("up").unwrap();
        assert_eq!(
            loaded.fetch_specs(),
            ["+refs/heads/main:refs/remotes/up/main", "refs/tags/*:refs/tags/*"]
        );
        assert_eq!(loaded.push_specs(), ["refs/heads/main:refs/heads/main"]);

        let anon = repo.remote_anonymous("/srv/up").unwrap();
        assert_eq!(repo.save_remote(&anon).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn delete_removes_section_and_tracking_refs() {
        let (_dir, repo) = init();
        repo.add_remote("origin", "/srv/a").unwrap();
        repo.add_remote("other", "/srv/b").unwrap();
        let tree = repo.create_tree(&TreeBuilder::new()).unwrap().id();
        let c = repo.create_commit(None, &sig(), &sig(), "c\n", &tree, &[]).unwrap();
        repo.create_reference("refs/remotes/origin/main", c, false).unwrap();
        repo.create_reference("refs/remotes/other/main", c, false).unwrap();

        repo.delete_remote("origin").unwrap();
        assert_eq!(repo.list_remotes().unwrap(), ["other"]);
        assert!(!repo.refs().exists("refs/remotes/origin/main").unwrap());
        assert!(repo.refs().exists("refs/remotes/other/main").unwrap());
        assert_eq!(repo.delete_remote("origin").unwrap_err().kind(), ErrorKind::NotFound);
    }

    // -----------------------------------------------------------------------
    // Listing a local remote
    // -----------------------------------------------------------------------

    #[test]
    fn list_heads_of_local_remote() {
        let upstream_dir = tempfile::tempdir().unwrap();
        let upstream = Repository::init(upstream_dir.path(), true).unwrap();
        let tree = upstream.create_tree(&TreeBuilder::new()).unwrap().id();
        let c = upstream.create_commit(Some("HEAD"), &sig(), &sig(), "up\n", &tree, &[]).unwrap();
        let tag = upstream.create_tag("v1", &c, &sig(), "v1\n", false).unwrap();

        let (_dir, repo) = init();
        let url = upstream_dir.path().to_str().unwrap();
        let mut remote = repo.add_remote("origin", url).unwrap();
        assert_eq!(
            remote.list(repo.objects(), repo.refs()).unwrap_err().kind(),
            ErrorKind::NotConnected
        );

        remote.connect(Direction::Fetch).unwrap();
        let heads = remote.list(repo.objects(), repo.refs()).unwrap();
        let names: Vec<&str> = heads.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["HEAD", "refs/heads/master", "refs/tags/v1", "refs/tags/v1^{}"]);
        assert!(heads.iter().all(|h| !h.is_local));
        assert_eq!(heads[2].oid, tag);
        assert_eq!(heads[3].oid, c);

        // Once the commit exists locally and the tracking ref is set, the
        // head reports both.
        repo.create_tree(&TreeBuilder::new()).unwrap();
        repo.create_commit(None, &sig(), &sig(), "up\n", &tree, &[]).unwrap();
        repo.create_reference("refs/remotes/origin/master", c, false).unwrap();
        let heads: Vec<RemoteHead> = remote.list(repo.objects(), repo.refs()).unwrap();
        let master = heads.iter().find(|h| h.name == "refs/heads/master").unwrap();
        assert!(master.is_local);
        assert_eq!(master.local_oid, c);
        assert_eq!(heads[0].local_oid, Oid::zero());

        remote.disconnect().unwrap();
        assert!(!remote.is_connected());
        assert_eq!(
            remote.list(repo.objects(), repo.refs()).unwrap_err().kind(),
            ErrorKind::NotConnected
        );
    }
}
