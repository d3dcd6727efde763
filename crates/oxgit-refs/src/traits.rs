//! The [`RefStore`] trait defining the reference namespace interface.
//!
//! Backends implement four primitives (`read`, `write`, `delete`, `list`);
//! symbolic resolution, shorthand lookup, enumeration and branch views are
//! provided on top of them.

use std::ops::ControlFlow;

use oxgit_types::Oid;
use tracing::debug;

use crate::error::{RefError, RefResult};
use crate::names::{
    dwim_candidates, is_valid_ref_name, validate_ref_name, HEAD, HEADS_PREFIX, REFS_PREFIX,
    REMOTES_PREFIX,
};
use crate::types::{Branch, BranchType, Expect, HeadState, RefFilter, RefTarget, Reference};

/// Symbolic references are followed at most this many hops.
pub const MAX_SYMBOLIC_DEPTH: usize = 5;

/// Storage backend for the reference namespace.
///
/// Implementations must be thread-safe (`Send + Sync`). A write is atomic:
/// concurrent readers see either the old value or the new one. The
/// precondition in [`Expect`] is checked under the same lock as the write.
pub trait RefStore: Send + Sync {
    /// Read a reference by full name. `Ok(None)` if it does not exist.
    fn read(&self, name: &str) -> RefResult<Option<Reference>>;

    /// Create or replace a reference if `expect` holds.
    fn write(&self, reference: &Reference, expect: &Expect) -> RefResult<()>;

    /// Delete a reference. Returns `false` if it did not exist.
    fn delete(&self, name: &str) -> RefResult<bool>;

    /// All references under `refs/` whose name starts with `prefix`,
    /// sorted by name. Top-level names such as `HEAD` are not listed.
    fn list(&self, prefix: &str) -> RefResult<Vec<Reference>>;

    /// Read a reference, failing with `NotFound` if it is absent.
    fn lookup(&self, name: &str) -> RefResult<Reference> {
        self.read(name)?
            .ok_or_else(|| RefError::NotFound(name.to_string()))
    }

    fn exists(&self, name: &str) -> RefResult<bool> {
        Ok(self.read(name)?.is_some())
    }

    /// Create a direct reference. Without `force` an existing name fails
    /// with `AlreadyExists` and is left unchanged.
    fn create_direct(&self, name: &str, id: Oid, force: bool) -> RefResult<Reference> {
        let reference = Reference::direct(name, id);
        self.write(&reference, &Expect::from_force(force))?;
        Ok(reference)
    }

    /// Create a symbolic reference pointing at `target`, which need not exist.
    fn create_symbolic(&self, name: &str, target: &str, force: bool) -> RefResult<Reference> {
        validate_ref_name(target)?;
        let reference = Reference::symbolic(name, target);
        self.write(&reference, &Expect::from_force(force))?;
        Ok(reference)
    }

    /// Repoint an existing direct reference.
    fn set_target(&self, name: &str, id: Oid) -> RefResult<Reference> {
        let current = self.lookup(name)?;
        if current.target_oid().is_none() {
            return Err(RefError::WrongKind {
                name: name.to_string(),
                expected: "a direct reference",
            });
        }
        let updated = Reference::direct(name, id);
        self.write(&updated, &Expect::Value(current.target().clone()))?;
        Ok(updated)
    }

    /// Repoint an existing symbolic reference.
    fn set_symbolic_target(&self, name: &str, target: &str) -> RefResult<Reference> {
        validate_ref_name(target)?;
        let current = self.lookup(name)?;
        if current.symbolic_target().is_none() {
            return Err(RefError::WrongKind {
                name: name.to_string(),
                expected: "a symbolic reference",
            });
        }
        let updated = Reference::symbolic(name, target);
        self.write(&updated, &Expect::Value(current.target().clone()))?;
        Ok(updated)
    }

    /// Follow a symbolic chain to the direct reference at its end.
    ///
    /// A missing `name` is `NotFound`. A cycle, a chain longer than
    /// [`MAX_SYMBOLIC_DEPTH`], or a missing intermediate target is
    /// `BrokenRef`.
    fn resolve(&self, name: &str) -> RefResult<Reference> {
        let mut current = self.lookup(name)?;
        let mut visited = vec![name.to_string()];
        loop {
            let target = match current.target() {
                RefTarget::Direct(_) => return Ok(current),
                RefTarget::Symbolic(target) => target.clone(),
            };
            if visited.contains(&target) {
                return Err(RefError::broken(name, format!("cycle through {target}")));
            }
            if visited.len() > MAX_SYMBOLIC_DEPTH {
                return Err(RefError::broken(
                    name,
                    format!("more than {MAX_SYMBOLIC_DEPTH} symbolic hops"),
                ));
            }
            current = self
                .read(&target)?
                .ok_or_else(|| RefError::broken(name, format!("target {target} does not exist")))?;
            visited.push(target);
        }
    }

    /// Resolve `name` all the way to an object id.
    fn resolve_to_oid(&self, name: &str) -> RefResult<Oid> {
        let reference = self.resolve(name)?;
        reference
            .target_oid()
            .ok_or_else(|| RefError::broken(name, "chain did not end at a direct reference"))
    }

    /// Look up a shorthand the way git does: `<name>`, `refs/<name>`,
    /// `refs/tags/<name>`, `refs/heads/<name>`, `refs/remotes/<name>`,
    /// `refs/remotes/<name>/HEAD`.
    fn dwim(&self, short: &str) -> RefResult<Reference> {
        for candidate in dwim_candidates(short) {
            if !is_valid_ref_name(&candidate) {
                continue;
            }
            if let Some(reference) = self.read(&candidate)? {
                return Ok(reference);
            }
        }
        Err(RefError::NotFound(short.to_string()))
    }

    /// Snapshot iterator over references matching `filter`.
    fn references(&self, filter: RefFilter) -> RefResult<References> {
        Ok(References::new(self.list(REFS_PREFIX)?, filter))
    }

    /// Visit each matching reference. A visitor returning `Break` stops the
    /// enumeration with `Aborted`.
    fn foreach(
        &self,
        filter: RefFilter,
        visitor: &mut dyn FnMut(&Reference) -> ControlFlow<()>,
    ) -> RefResult<()> {
        for reference in self.references(filter)? {
            if visitor(&reference).is_break() {
                return Err(RefError::Aborted(reference.name().to_string()));
            }
        }
        Ok(())
    }

    /// The `HEAD` reference itself, unresolved.
    fn head(&self) -> RefResult<Reference> {
        self.lookup(HEAD)
    }

    /// Whether HEAD is attached to an existing branch, detached, or orphan.
    fn head_state(&self) -> RefResult<HeadState> {
        let head = self.head()?;
        let branch = match head.target() {
            RefTarget::Direct(id) => return Ok(HeadState::Detached { target: *id }),
            RefTarget::Symbolic(branch) => branch.clone(),
        };
        if self.read(&branch)?.is_none() {
            return Ok(HeadState::Orphan { branch });
        }
        let target = self.resolve_to_oid(HEAD)?;
        Ok(HeadState::Attached { branch, target })
    }

    /// Rename a reference, carrying HEAD along if it pointed at `old`.
    fn rename(&self, old: &str, new: &str, force: bool) -> RefResult<Reference> {
        validate_ref_name(new)?;
        let current = self.lookup(old)?;
        if old == new {
            return Ok(current);
        }
        let renamed = Reference::new(new, current.target().clone());
        if is_nested(old, new) {
            // `old` occupies the path `new` needs, so it has to go first.
            self.delete(old)?;
            if let Err(e) = self.write(&renamed, &Expect::from_force(force)) {
                self.write(&current, &Expect::Absent)?;
                return Err(e);
            }
        } else {
            self.write(&renamed, &Expect::from_force(force))?;
            self.delete(old)?;
        }

        if let Some(head) = self.read(HEAD)? {
            if head.symbolic_target() == Some(old) {
                self.write(
                    &Reference::symbolic(HEAD, new),
                    &Expect::Value(head.target().clone()),
                )?;
            }
        }
        debug!(old, new, "reference renamed");
        Ok(renamed)
    }

    /// Full name of the branch HEAD is attached to, if HEAD is symbolic.
    fn head_branch_name(&self) -> RefResult<Option<String>> {
        Ok(self
            .read(HEAD)?
            .and_then(|head| head.symbolic_target().map(str::to_string)))
    }

    /// Branches of the given type, sorted by full name.
    fn branches(&self, branch_type: BranchType) -> RefResult<Vec<Branch>> {
        let current = self.head_branch_name()?;
        let mut found = Vec::new();
        for prefix in [HEADS_PREFIX, REMOTES_PREFIX] {
            for reference in self.list(prefix)? {
                if !branch_type.includes(reference.class()) {
                    continue;
                }
                let is_head = current.as_deref() == Some(reference.name());
                found.extend(Branch::from_reference(reference, is_head));
            }
        }
        Ok(found)
    }

    /// Look up a branch by short name (`main`, `origin/main`).
    fn lookup_branch(&self, name: &str, branch_type: BranchType) -> RefResult<Branch> {
        let prefixes: &[&str] = match branch_type {
            BranchType::Local => &[HEADS_PREFIX],
            BranchType::Remote => &[REMOTES_PREFIX],
            BranchType::All => &[HEADS_PREFIX, REMOTES_PREFIX],
        };
        let current = self.head_branch_name()?;
        for prefix in prefixes {
            let full = format!("{prefix}{name}");
            if let Some(reference) = self.read(&full)? {
                let is_head = current.as_deref() == Some(full.as_str());
                if let Some(branch) = Branch::from_reference(reference, is_head) {
                    return Ok(branch);
                }
            }
        }
        Err(RefError::NotFound(name.to_string()))
    }
}

/// Iterator over a snapshot of the namespace, filtered by kind.
#[derive(Debug)]
pub struct References {
    inner: std::vec::IntoIter<Reference>,
    filter: RefFilter,
}

impl References {
    pub fn new(references: Vec<Reference>, filter: RefFilter) -> Self {
        Self {
            inner: references.into_iter(),
            filter,
        }
    }
}

impl Iterator for References {
    type Item = Reference;

    fn next(&mut self) -> Option<Reference> {
        let filter = self.filter;
        self.inner.by_ref().find(|r| filter.matches(r))
    }
}

/// Check a write precondition against the current value.
pub(crate) fn check_expect(
    name: &str,
    current: Option<&RefTarget>,
    expect: &Expect,
) -> RefResult<()> {
    match (expect, current) {
        (Expect::Any, _) => Ok(()),
        (Expect::Absent, None) => Ok(()),
        (Expect::Absent, Some(_)) => Err(RefError::AlreadyExists(name.to_string())),
        (Expect::Value(want), Some(have)) if want == have => Ok(()),
        (Expect::Value(_), _) => Err(RefError::Modified(name.to_string())),
        (Expect::AbsentOr(_), None) => Ok(()),
        (Expect::AbsentOr(want), Some(have)) if want == have => Ok(()),
        (Expect::AbsentOr(_), Some(_)) => Err(RefError::Modified(name.to_string())),
    }
}

/// Whether one name is a directory-style prefix of the other.
fn is_nested(a: &str, b: &str) -> bool {
    let under = |child: &str, parent: &str| {
        child
            .strip_prefix(parent)
            .is_some_and(|rest| rest.starts_with('/'))
    };
    under(a, b) || under(b, a)
}

/// A name that cannot coexist with `name`: an existing ancestor
/// (`refs/heads/a` blocks `refs/heads/a/b`) or descendant.
pub(crate) fn find_conflict<S: RefStore + ?Sized>(
    store: &S,
    name: &str,
) -> RefResult<Option<String>> {
    let mut end = 0;
    while let Some(slash) = name[end..].find('/') {
        end += slash;
        let ancestor = &name[..end];
        if is_valid_ref_name(ancestor) && store.read(ancestor)?.is_some() {
            return Ok(Some(ancestor.to_string()));
        }
        end += 1;
    }
    Ok(store
        .list(&format!("{name}/"))?
        .into_iter()
        .next()
        .map(|r| r.name().to_string()))
}
