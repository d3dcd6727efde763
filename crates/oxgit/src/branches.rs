//! Branch operations on a [`Repository`].
//!
//! Branches are references under `refs/heads/` (local) or `refs/remotes/`
//! (remote-tracking) viewed through [`Branch`]. Moving or deleting the
//! branch HEAD is attached to is refused.

use oxgit_refs::{validate_branch_name, Branch, BranchType, RefError, RefStore, HEADS_PREFIX};
use oxgit_store::ObjectStore;
use oxgit_types::{ObjectKind, Oid};
use tracing::debug;

use crate::error::Result;
use crate::repository::Repository;

impl Repository {
    /// Create the local branch `name` at `commit`.
    ///
    /// Without `force` an existing branch is an `AlreadyExists` error.
    /// With `force` an existing branch is moved, except the one HEAD is
    /// attached to.
    pub fn create_branch(&self, name: &str, commit: &Oid, force: bool) -> Result<Branch> {
        validate_branch_name(name)?;
        self.objects().lookup(commit, Some(ObjectKind::Commit))?;
        let full = format!("{HEADS_PREFIX}{name}");
        let is_head = self.refs().head_branch_name()?.as_deref() == Some(full.as_str());
        if force && is_head && self.refs().exists(&full)? {
            return Err(RefError::CurrentBranch(full).into());
        }
        let reference = self.refs().create_direct(&full, *commit, force)?;
        debug!(name, target = %commit, force, "branch created");
        Branch::from_reference(reference, is_head)
            .ok_or_else(|| RefError::NotFound(full).into())
    }

    pub fn lookup_branch(&self, name: &str, branch_type: BranchType) -> Result<Branch> {
        Ok(self.refs().lookup_branch(name, branch_type)?)
    }

    /// Branches of `branch_type`, local ones before remote-tracking ones,
    /// each group in name order.
    pub fn branches(&self, branch_type: BranchType) -> Result<impl Iterator<Item = Branch>> {
        Ok(self.refs().branches(branch_type)?.into_iter())
    }

    /// Delete a branch. The branch HEAD is attached to cannot be deleted.
    pub fn delete_branch(&self, name: &str, branch_type: BranchType) -> Result<()> {
        let branch = self.lookup_branch(name, branch_type)?;
        let full = branch.reference().name().to_string();
        if branch.is_head() {
            return Err(RefError::CurrentBranch(full).into());
        }
        self.refs().delete(&full)?;
        debug!(name = %full, "branch deleted");
        Ok(())
    }

    /// Rename a local branch. HEAD follows the branch if attached to it.
    pub fn rename_branch(&self, old: &str, new: &str, force: bool) -> Result<Branch> {
        validate_branch_name(new)?;
        let current = self.lookup_branch(old, BranchType::Local)?;
        let to = format!("{HEADS_PREFIX}{new}");
        let target_is_head = self.refs().head_branch_name()?.as_deref() == Some(to.as_str());
        if force && target_is_head && self.refs().exists(&to)? {
            return Err(RefError::CurrentBranch(to).into());
        }
        let renamed = self.refs().rename(current.reference().name(), &to, force)?;
        debug!(old, new, "branch renamed");
        Branch::from_reference(renamed, current.is_head())
            .ok_or_else(|| RefError::NotFound(to).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxgit_store::TreeBuilder;
    use oxgit_types::{ErrorKind, Signature, Time};

    fn sig() -> Signature {
        Signature::new("Ada", "ada@example.com", Time::new(1_700_000_000, 0))
    }

    fn repo() -> (tempfile::TempDir, Repository, Oid, Oid) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path(), false).unwrap();
        let tree = repo.create_tree(&TreeBuilder::new()).unwrap().id();
        let a = repo.create_commit(Some("HEAD"), &sig(), &sig(), "a\n", &tree, &[]).unwrap();
        let b = repo.create_commit(Some("HEAD"), &sig(), &sig(), "b\n", &tree, &[a]).unwrap();
        (dir, repo, a, b)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    #[test]
    fn create_and_lookup() {
        let (_dir, repo, a, _) = repo();
        let branch = repo.create_branch("feature/x", &a, false).unwrap();
        assert_eq!(branch.name(), "feature/x");
        assert_eq!(branch.target_oid(), Some(a));
        assert!(!branch.is_head());
        assert_eq!(branch.branch_type(), BranchType::Local);

        let master = repo.lookup_branch("master", BranchType::Local).unwrap();
        assert!(master.is_head());
        assert_eq!(
            repo.lookup_branch("feature/x", BranchType::Remote).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn create_requires_commit_and_valid_name() {
        let (_dir, repo, a, _) = repo();
        let tree = repo.objects().lookup_commit(&a).unwrap().tree_id();
        assert_eq!(repo.create_branch("t", &tree, false).unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(repo.create_branch("HEAD", &a, false).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(repo.create_branch("-x", &a, false).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn force_moves_other_branches_but_not_head() {
        let (_dir, repo, a, b) = repo();
        repo.create_branch("side", &a, false).unwrap();
        assert_eq!(repo.create_branch("side", &b, false).unwrap_err().kind(), ErrorKind::AlreadyExists);
        assert_eq!(repo.create_branch("side", &b, true).unwrap().target_oid(), Some(b));

        let err = repo.create_branch("master", &a, true).unwrap_err();
        assert!(matches!(err, crate::Error::Ref(RefError::CurrentBranch(_))));
        assert_eq!(repo.refs().resolve_to_oid("refs/heads/master").unwrap(), b);
    }

    #[test]
    fn orphan_head_branch_can_be_created() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path(), true).unwrap();
        let tree = repo.create_tree(&TreeBuilder::new()).unwrap().id();
        let c = repo.create_commit(None, &sig(), &sig(), "c\n", &tree, &[]).unwrap();
        assert!(repo.is_head_orphan().unwrap());
        let branch = repo.create_branch("master", &c, true).unwrap();
        assert!(branch.is_head());
        assert!(!repo.is_head_orphan().unwrap());
    }

    // -----------------------------------------------------------------------
    // Listing, deletion and renaming
    // -----------------------------------------------------------------------

    #[test]
    fn listing_by_type() {
        let (_dir, repo, a, _) = repo();
        repo.create_branch("zeta", &a, false).unwrap();
        repo.create_reference("refs/remotes/origin/main", a, false).unwrap();
        repo.create_tag_lightweight("not-a-branch", &a, false).unwrap();

        let local: Vec<String> = repo.branches(BranchType::Local).unwrap().map(|b| b.name().to_string()).collect();
        assert_eq!(local, ["master", "zeta"]);
        let remote: Vec<String> = repo.branches(BranchType::Remote).unwrap().map(|b| b.name().to_string()).collect();
        assert_eq!(remote, ["origin/main"]);
        assert_eq!(repo.branches(BranchType::All).unwrap().count(), 3);
        let heads: Vec<bool> = repo.branches(BranchType::Local).unwrap().map(|b| b.is_head()).collect();
        assert_eq!(heads, [true, false]);
    }

    #[test]
    fn delete_refuses_current_branch() {
        let (_dir, repo, a, _) = repo();
        repo.create_branch("gone", &a, false).unwrap();
        repo.delete_branch("gone", BranchType::Local).unwrap();
        assert!(!repo.refs().exists("refs/heads/gone").unwrap());
        assert_eq!(repo.delete_branch("gone", BranchType::Local).unwrap_err().kind(), ErrorKind::NotFound);

        let err = repo.delete_branch("master", BranchType::Local).unwrap_err();
        assert!(matches!(err, crate::Error::Ref(RefError::CurrentBranch(_))));

        repo.create_reference("refs/remotes/origin/old", a, false).unwrap();
        repo.delete_branch("origin/old", BranchType::Remote).unwrap();
    }

    #[test]
    fn rename_carries_head() {
        let (_dir, repo, _, b) = repo();
        let renamed = repo.rename_branch("master", "trunk", false).unwrap();
        assert_eq!(renamed.name(), "trunk");
        assert!(renamed.is_head());
        assert_eq!(repo.head().unwrap().symbolic_target(), Some("refs/heads/trunk"));
        assert_eq!(repo.refs().resolve_to_oid("HEAD").unwrap(), b);
        assert!(!repo.refs().exists("refs/heads/master").unwrap());
    }
}
