//! Resolution of revision expressions to objects.

use oxgit_refs::RefStore;
use oxgit_store::{Commit, Object, ObjectStore, StoreError};
use oxgit_types::oid::MIN_PREFIX_LEN;
use oxgit_types::{ErrorKind, ObjectKind, Oid, OidPrefix, OID_HEX_LEN};
use tracing::trace;

use crate::error::{RevError, RevResult};
use crate::parser::{parse, RevSpec, Suffix};

/// Resolves revision expressions against an object store and a reference
/// namespace.
///
/// Each step (base lookup, parent traversal, peeling, path lookup) can fail
/// on its own; the first failure ends resolution with that failure's kind.
pub struct Resolver<'a, O: ?Sized, R: ?Sized> {
    objects: &'a O,
    refs: &'a R,
}

impl<'a, O, R> Resolver<'a, O, R>
where
    O: ObjectStore + ?Sized,
    R: RefStore + ?Sized,
{
    pub fn new(objects: &'a O, refs: &'a R) -> Self {
        Self { objects, refs }
    }

    /// Resolve `expr` to a single object.
    pub fn resolve(&self, expr: &str) -> RevResult<Object> {
        let spec = parse(expr)?;
        let object = self.resolve_spec(&spec)?;
        trace!(expr, id = %object.id(), kind = %object.kind(), "revision resolved");
        Ok(object)
    }

    /// Resolve `expr` and peel the result to a commit.
    pub fn resolve_commit(&self, expr: &str) -> RevResult<Commit> {
        let object = self.resolve(expr)?;
        Ok(self.objects.peel(object, ObjectKind::Commit)?.into_commit()?)
    }

    pub fn resolve_spec(&self, spec: &RevSpec) -> RevResult<Object> {
        let id = self.resolve_base(&spec.base)?;
        let mut object = self.objects.lookup(&id, None)?;
        for suffix in &spec.suffixes {
            object = self.apply(object, *suffix)?;
        }
        match &spec.path {
            None => Ok(object),
            Some(path) => self.lookup_path(object, path),
        }
    }

    /// Resolve the base of an expression: a full object id, then a
    /// reference shorthand, then an abbreviated object id.
    pub fn resolve_base(&self, base: &str) -> RevResult<Oid> {
        let is_hex = base.bytes().all(|b| b.is_ascii_hexdigit());
        if base.len() == OID_HEX_LEN && is_hex {
            return Ok(Oid::from_hex(base).map_err(StoreError::from)?);
        }

        match self.refs.dwim(base) {
            Ok(reference) => return Ok(self.refs.resolve_to_oid(reference.name())?),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if is_hex && base.len() >= MIN_PREFIX_LEN {
            let prefix = OidPrefix::parse(base).map_err(StoreError::from)?;
            return match self.objects.resolve_prefix(&prefix) {
                Err(StoreError::PrefixNotFound(_)) => {
                    Err(RevError::UnknownRevision(base.to_string()))
                }
                other => Ok(other?),
            };
        }
        Err(RevError::UnknownRevision(base.to_string()))
    }

    fn apply(&self, object: Object, suffix: Suffix) -> RevResult<Object> {
        match suffix {
            Suffix::Parent(0) => Ok(self.objects.peel(object, ObjectKind::Commit)?),
            Suffix::Parent(n) => {
                let commit = self.commit_of(object)?;
                let parent = commit
                    .parent_id(n - 1)
                    .ok_or(RevError::NoSuchParent { id: commit.id(), n })?;
                Ok(self.objects.lookup(&parent, Some(ObjectKind::Commit))?)
            }
            Suffix::Ancestor(n) => {
                let mut commit = self.commit_of(object)?;
                for _ in 0..n {
                    let parent = commit
                        .parent_id(0)
                        .ok_or(RevError::NoSuchParent { id: commit.id(), n: 1 })?;
                    commit = self.objects.lookup_commit(&parent)?;
                }
                Ok(Object::Commit(commit))
            }
            Suffix::Peel(None) => Ok(self.objects.peel_tags(object)?),
            Suffix::Peel(Some(kind)) => Ok(self.objects.peel(object, kind)?),
        }
    }

    fn commit_of(&self, object: Object) -> RevResult<Commit> {
        Ok(self.objects.peel(object, ObjectKind::Commit)?.into_commit()?)
    }

    fn lookup_path(&self, object: Object, path: &str) -> RevResult<Object> {
        let tree = self.objects.peel(object, ObjectKind::Tree)?.into_tree()?;
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Ok(Object::Tree(tree));
        }
        let entry = tree.get_by_path(self.objects, path)?;
        Ok(self.objects.lookup(&entry.id, None)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxgit_refs::InMemoryRefStore;
    use oxgit_store::{Blob, InMemoryObjectStore, Tag, TreeBuilder};
    use oxgit_types::{FileMode, Signature, Time};

    struct Fixture {
        objects: InMemoryObjectStore,
        refs: InMemoryRefStore,
        root: Oid,
        first: Oid,
        second: Oid,
        merge: Oid,
        readme: Oid,
        tag: Oid,
    }

    fn sig(t: i64) -> Signature {
        Signature::new("Ada", "ada@example.com", Time::new(t, 0))
    }

    fn commit(objects: &InMemoryObjectStore, tree: Oid, parents: Vec<Oid>, t: i64) -> Oid {
        let c = Commit::new(tree, parents, sig(t), sig(t), format!("commit at {t}\n"));
        objects.write(&c.to_raw()).unwrap()
    }

    /// root <- first <- merge, root <- second <- merge (second parent)
    fn fixture() -> Fixture {
        let objects = InMemoryObjectStore::new();
        let readme = objects.write(&Blob::new(b"read me\n".to_vec()).to_raw()).unwrap();
        let lib = objects.write(&Blob::new(b"fn main() {}\n".to_vec()).to_raw()).unwrap();

        let mut src = TreeBuilder::new();
        src.insert("lib.rs", lib, FileMode::Blob).unwrap();
        let src = src.write(&objects).unwrap();
        let mut top = TreeBuilder::new();
        top.insert("README", readme, FileMode::Blob).unwrap();
        top.insert("src", src.id(), FileMode::Tree).unwrap();
        let tree = top.write(&objects).unwrap().id();

        let root = commit(&objects, tree, vec![], 100);
        let first = commit(&objects, tree, vec![root], 200);
        let second = commit(&objects, tree, vec![root], 300);
        let merge = commit(&objects, tree, vec![first, second], 400);

        let tag = Tag::new(merge, ObjectKind::Commit, "v1.0", Some(sig(500)), "release\n");
        let tag = objects.write(&tag.to_raw()).unwrap();

        let refs = InMemoryRefStore::new();
        refs.create_direct("refs/heads/main", merge, false).unwrap();
        refs.create_direct("refs/heads/side", second, false).unwrap();
        refs.create_direct("refs/tags/v1.0", tag, false).unwrap();
        refs.create_symbolic("HEAD", "refs/heads/main", false).unwrap();

        Fixture { objects, refs, root, first, second, merge, readme, tag }
    }

    fn id_of(f: &Fixture, expr: &str) -> Oid {
        Resolver::new(&f.objects, &f.refs).resolve(expr).unwrap().id()
    }

    fn err_of(f: &Fixture, expr: &str) -> ErrorKind {
        Resolver::new(&f.objects, &f.refs).resolve(expr).unwrap_err().kind()
    }

    // -----------------------------------------------------------------------
    // Bases
    // -----------------------------------------------------------------------

    #[test]
    fn names_and_ids() {
        let f = fixture();
        assert_eq!(id_of(&f, "HEAD"), f.merge);
        assert_eq!(id_of(&f, "@"), f.merge);
        assert_eq!(id_of(&f, "main"), f.merge);
        assert_eq!(id_of(&f, "refs/heads/side"), f.second);
        assert_eq!(id_of(&f, &f.first.to_hex()), f.first);
        assert_eq!(id_of(&f, &f.root.to_hex()[..10]), f.root);
        assert_eq!(id_of(&f, "v1.0"), f.tag);
    }

    #[test]
    fn unknown_and_missing() {
        let f = fixture();
        assert_eq!(err_of(&f, "nope"), ErrorKind::NotFound);
        assert_eq!(err_of(&f, "0000000000000000000000000000000000000000"), ErrorKind::NotFound);
        assert_eq!(err_of(&f, "deadbeef"), ErrorKind::NotFound);
    }

    #[test]
    fn orphan_head_is_broken_ref() {
        let f = fixture();
        f.refs.create_symbolic("HEAD", "refs/heads/unborn", true).unwrap();
        assert_eq!(err_of(&f, "HEAD"), ErrorKind::BrokenRef);
    }

    // -----------------------------------------------------------------------
    // Suffixes
    // -----------------------------------------------------------------------

    #[test]
    fn parents_of_merge() {
        let f = fixture();
        assert_eq!(id_of(&f, "main^"), f.first);
        assert_eq!(id_of(&f, "main^1"), f.first);
        assert_eq!(id_of(&f, "main^2"), f.second);
        assert_eq!(id_of(&f, "main^0"), f.merge);
        assert_eq!(err_of(&f, "main^3"), ErrorKind::NotFound);
        assert_eq!(err_of(&f, "main~3"), ErrorKind::NotFound);
    }

    #[test]
    fn ancestors() {
        let f = fixture();
        assert_eq!(id_of(&f, "HEAD~"), f.first);
        assert_eq!(id_of(&f, "HEAD~2"), f.root);
        assert_eq!(id_of(&f, "HEAD~0"), f.merge);
        assert_eq!(id_of(&f, "HEAD^2~1"), f.root);
    }

    #[test]
    fn tags_peel_through_suffixes() {
        let f = fixture();
        assert_eq!(id_of(&f, "v1.0^{}"), f.merge);
        assert_eq!(id_of(&f, "v1.0^{commit}"), f.merge);
        assert_eq!(id_of(&f, "v1.0^{tag}"), f.tag);
        assert_eq!(id_of(&f, "v1.0^"), f.first);
        assert_eq!(id_of(&f, "v1.0~2"), f.root);
        let tree = f.objects.lookup_commit(&f.merge).unwrap().tree_id();
        assert_eq!(id_of(&f, "v1.0^{tree}"), tree);
        assert_eq!(err_of(&f, "main^{tag}"), ErrorKind::TypeMismatch);
        assert_eq!(err_of(&f, "main^{blob}"), ErrorKind::TypeMismatch);
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    #[test]
    fn path_lookup() {
        let f = fixture();
        assert_eq!(id_of(&f, "HEAD:README"), f.readme);
        assert_eq!(id_of(&f, "v1.0:README"), f.readme);
        let tree = f.objects.lookup_commit(&f.merge).unwrap().tree_id();
        assert_eq!(id_of(&f, "HEAD:"), tree);
        let r = Resolver::new(&f.objects, &f.refs);
        assert_eq!(r.resolve("HEAD:src").unwrap().kind(), ObjectKind::Tree);
        assert_eq!(r.resolve("HEAD:src/lib.rs").unwrap().kind(), ObjectKind::Blob);
        assert_eq!(err_of(&f, "HEAD:missing"), ErrorKind::NotFound);
        assert_eq!(err_of(&f, "HEAD:README:x"), ErrorKind::NotFound);
    }

    #[test]
    fn blob_cannot_peel_to_commit() {
        let f = fixture();
        assert_eq!(err_of(&f, "HEAD:README^"), ErrorKind::NotFound);
        assert_eq!(err_of(&f, &format!("{}^", f.readme)), ErrorKind::TypeMismatch);
    }

    #[test]
    fn resolve_commit_peels() {
        let f = fixture();
        let r = Resolver::new(&f.objects, &f.refs);
        assert_eq!(r.resolve_commit("v1.0").unwrap().id(), f.merge);
        assert_eq!(
            r.resolve_commit("HEAD:README").unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
    }
}
