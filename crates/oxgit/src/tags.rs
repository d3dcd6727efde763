//! Tag operations on a [`Repository`].

use oxgit_refs::{glob_match, validate_tag_name, RefError, RefStore, TAGS_PREFIX};
use oxgit_store::{ObjectStore, RawObject, Tag};
use oxgit_types::{ObjectKind, Oid, Signature};
use tracing::debug;

use crate::error::Result;
use crate::repository::Repository;

impl Repository {
    /// Create an annotated tag `name` pointing at `target` and the
    /// reference `refs/tags/<name>` for it. Returns the tag object's id.
    ///
    /// An existing tag of the same name is an `AlreadyExists` error unless
    /// `force` is set.
    pub fn create_tag(
        &self,
        name: &str,
        target: &Oid,
        tagger: &Signature,
        message: &str,
        force: bool,
    ) -> Result<Oid> {
        let full = self.new_tag_ref(name, force)?;
        let kind = self.objects().lookup(target, None)?.kind();
        let tag = Tag::new(*target, kind, name, Some(tagger.clone()), message);
        let id = self.objects().write(&tag.to_raw())?;
        self.refs().create_direct(&full, id, force)?;
        debug!(name, oid = %id, target = %target, "annotated tag created");
        Ok(id)
    }

    /// Create an annotated tag from an already encoded tag payload. The
    /// target must exist and be of the kind the payload declares.
    pub fn create_tag_from_buffer(&self, buffer: &[u8], force: bool) -> Result<Oid> {
        let raw = RawObject::new(ObjectKind::Tag, buffer.to_vec());
        let tag = Tag::parse(raw.compute_id(), buffer)?;
        let full = self.new_tag_ref(tag.name(), force)?;
        self.objects().lookup(&tag.target_id(), Some(tag.target_kind()))?;
        let id = self.objects().write(&raw)?;
        self.refs().create_direct(&full, id, force)?;
        debug!(name = tag.name(), oid = %id, "tag created from buffer");
        Ok(id)
    }

    /// Point `refs/tags/<name>` directly at `target`, with no tag object.
    pub fn create_tag_lightweight(&self, name: &str, target: &Oid, force: bool) -> Result<Oid> {
        let full = self.new_tag_ref(name, force)?;
        self.objects().lookup(target, None)?;
        self.refs().create_direct(&full, *target, force)?;
        debug!(name, target = %target, "lightweight tag created");
        Ok(*target)
    }

    /// Short tag names in name order, optionally filtered by a `*`/`?`
    /// glob.
    pub fn list_tags(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .refs()
            .list(TAGS_PREFIX)?
            .iter()
            .filter_map(|r| r.name().strip_prefix(TAGS_PREFIX))
            .filter(|short| pattern.map_or(true, |p| glob_match(p, short)))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn delete_tag(&self, name: &str) -> Result<()> {
        validate_tag_name(name)?;
        let full = format!("{TAGS_PREFIX}{name}");
        if !self.refs().delete(&full)? {
            return Err(RefError::NotFound(full).into());
        }
        debug!(name, "tag deleted");
        Ok(())
    }

    /// Validate `name` and, unless `force`, check nothing occupies it yet.
    fn new_tag_ref(&self, name: &str, force: bool) -> Result<String> {
        validate_tag_name(name)?;
        let full = format!("{TAGS_PREFIX}{name}");
        if !force && self.refs().exists(&full)? {
            return Err(RefError::AlreadyExists(full).into());
        }
        Ok(full)
    }
}
