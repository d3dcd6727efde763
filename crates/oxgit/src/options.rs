use std::path::{Path, PathBuf};

use oxgit_refs::validate_branch_name;

use crate::error::{Error, Result};

/// Branch HEAD points at in a freshly initialised repository.
pub const DEFAULT_INITIAL_BRANCH: &str = "master";

/// How to open or create a repository.
///
/// Built once, validated by [`validate`](Self::validate), and never
/// changed after the repository is constructed from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryOptions {
    pub path: PathBuf,
    /// Only look at `path` itself; do not walk up to parent directories.
    pub no_search: bool,
    /// Force the repository to be treated as bare (`Some(true)`) or as
    /// having a working tree (`Some(false)`), overriding `core.bare`.
    pub bare: Option<bool>,
    /// Branch HEAD names after `init`.
    pub initial_head: String,
}

impl RepositoryOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            no_search: false,
            bare: None,
            initial_head: DEFAULT_INITIAL_BRANCH.to_string(),
        }
    }

    pub fn no_search(mut self, no_search: bool) -> Self {
        self.no_search = no_search;
        self
    }

    pub fn bare(mut self, bare: bool) -> Self {
        self.bare = Some(bare);
        self
    }

    pub fn initial_head(mut self, branch: impl Into<String>) -> Self {
        self.initial_head = branch.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::invalid("repository path is empty"));
        }
        validate_branch_name(&self.initial_head)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxgit_types::ErrorKind;

    #[test]
    fn builder_defaults() {
        let opts = RepositoryOptions::new("/tmp/r");
        assert_eq!(opts.path(), Path::new("/tmp/r"));
        assert!(!opts.no_search);
        assert_eq!(opts.bare, None);
        assert_eq!(opts.initial_head, "master");
        assert!(opts.validate().is_ok());

        let opts = opts.no_search(true).bare(true).initial_head("main");
        assert!(opts.no_search);
        assert_eq!(opts.bare, Some(true));
        assert_eq!(opts.initial_head, "main");
    }

    #[test]
    fn validation() {
        assert_eq!(RepositoryOptions::new("").validate().unwrap_err().kind(), ErrorKind::InvalidArgument);
        let bad = RepositoryOptions::new("/r").initial_head("a..b");
        assert_eq!(bad.validate().unwrap_err().kind(), ErrorKind::InvalidArgument);
    }
}
