//! In-memory reference store for testing and ephemeral use.
//!
//! [`InMemoryRefStore`] keeps every reference, including `HEAD`, in a
//! `BTreeMap` behind a `RwLock`. Data is lost when the store is dropped.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{RefError, RefResult};
use crate::names::{validate_ref_name, REFS_PREFIX};
use crate::traits::{check_expect, find_conflict, RefStore};
use crate::types::{Expect, Reference};

#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<BTreeMap<String, Reference>>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of references held, `HEAD` included.
    pub fn len(&self) -> usize {
        self.refs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> RefResult<RwLockReadGuard<'_, BTreeMap<String, Reference>>> {
        self.refs.read().map_err(|_| RefError::Poisoned)
    }

    fn map_mut(&self) -> RefResult<RwLockWriteGuard<'_, BTreeMap<String, Reference>>> {
        self.refs.write().map_err(|_| RefError::Poisoned)
    }
}

impl RefStore for InMemoryRefStore {
    fn read(&self, name: &str) -> RefResult<Option<Reference>> {
        Ok(self.map()?.get(name).cloned())
    }

    fn write(&self, reference: &Reference, expect: &Expect) -> RefResult<()> {
        let name = reference.name();
        validate_ref_name(name)?;
        if let Some(target) = reference.symbolic_target() {
            validate_ref_name(target)?;
        }
        if !self.exists(name)? {
            if let Some(conflict) = find_conflict(self, name)? {
                return Err(RefError::AlreadyExists(conflict));
            }
        }

        let mut refs = self.map_mut()?;
        check_expect(name, refs.get(name).map(Reference::target), expect)?;
        refs.insert(name.to_string(), Reference::new(name, reference.target().clone()));
        debug!(name, target = %reference.target(), "reference written");
        Ok(())
    }

    fn delete(&self, name: &str) -> RefResult<bool> {
        let removed = self.map_mut()?.remove(name).is_some();
        if removed {
            debug!(name, "reference deleted");
        }
        Ok(removed)
    }

    fn list(&self, prefix: &str) -> RefResult<Vec<Reference>> {
        let refs = self.map()?;
        Ok(refs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .filter(|(name, _)| name.starts_with(REFS_PREFIX))
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::ops::ControlFlow;

    use super::*;
    use crate::types::{BranchType, HeadState, RefFilter, RefKind, RefTarget};
    use oxgit_types::{ErrorKind, Oid};
    use proptest::prelude::*;

    fn oid(n: u8) -> Oid {
        Oid::from_raw([n; 20])
    }

    fn store_with_main() -> InMemoryRefStore {
        let store = InMemoryRefStore::new();
        store.create_direct("refs/heads/main", oid(1), false).unwrap();
        store.create_symbolic("HEAD", "refs/heads/main", false).unwrap();
        store
    }

    // ---- Create / lookup ----

    #[test]
    fn create_and_lookup_direct() {
        let store = InMemoryRefStore::new();
        let r = store.create_direct("refs/heads/main", oid(1), false).unwrap();
        assert_eq!(r.kind(), RefKind::Direct);
        let read = store.lookup("refs/heads/main").unwrap();
        assert_eq!(read.target_oid(), Some(oid(1)));
        assert!(read.is_branch());
    }

    #[test]
    fn create_without_force_keeps_original() {
        let store = store_with_main();
        let err = store.create_direct("refs/heads/main", oid(2), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(store.resolve_to_oid("refs/heads/main").unwrap(), oid(1));

        store.create_direct("refs/heads/main", oid(2), true).unwrap();
        assert_eq!(store.resolve_to_oid("refs/heads/main").unwrap(), oid(2));
    }

    #[test]
    fn lookup_missing_is_not_found() {
        let store = InMemoryRefStore::new();
        assert_eq!(store.lookup("refs/heads/nope").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.resolve("refs/heads/nope").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn invalid_names_rejected() {
        let store = InMemoryRefStore::new();
        assert!(store.create_direct("main", oid(1), false).is_err());
        assert!(store.create_direct("refs/heads/a..b", oid(1), false).is_err());
        assert!(store.create_symbolic("HEAD", "refs/heads/bad name", false).is_err());
    }

    #[test]
    fn namespace_conflicts() {
        let store = store_with_main();
        let err = store.create_direct("refs/heads/main/sub", oid(2), false).unwrap_err();
        assert!(matches!(err, RefError::AlreadyExists(ref n) if n == "refs/heads/main"));

        store.create_direct("refs/heads/topic/one", oid(2), false).unwrap();
        let err = store.create_direct("refs/heads/topic", oid(2), false).unwrap_err();
        assert!(matches!(err, RefError::AlreadyExists(ref n) if n == "refs/heads/topic/one"));
    }

    // ---- Symbolic resolution ----

    #[test]
    fn orphan_head() {
        let store = InMemoryRefStore::new();
        store.create_symbolic("HEAD", "refs/heads/main", false).unwrap();
        let head = store.lookup("HEAD").unwrap();
        assert_eq!(head.kind(), RefKind::Symbolic);
        assert_eq!(store.resolve_to_oid("HEAD").unwrap_err().kind(), ErrorKind::BrokenRef);
        assert_eq!(
            store.head_state().unwrap(),
            HeadState::Orphan { branch: "refs/heads/main".into() }
        );
    }

    #[test]
    fn attached_and_detached_head() {
        let store = store_with_main();
        assert_eq!(
            store.head_state().unwrap(),
            HeadState::Attached { branch: "refs/heads/main".into(), target: oid(1) }
        );
        store.create_direct("HEAD", oid(9), true).unwrap();
        let state = store.head_state().unwrap();
        assert!(state.is_detached());
        assert_eq!(state.target(), Some(oid(9)));
    }

    #[test]
    fn cycle_is_broken_ref() {
        let store = InMemoryRefStore::new();
        store.create_symbolic("refs/heads/a", "refs/heads/b", false).unwrap();
        store.create_symbolic("refs/heads/b", "refs/heads/a", false).unwrap();
        assert_eq!(store.resolve("refs/heads/a").unwrap_err().kind(), ErrorKind::BrokenRef);
    }

    #[test]
    fn depth_limit() {
        let store = InMemoryRefStore::new();
        store.create_direct("refs/x/0", oid(1), false).unwrap();
        for i in 1..=6 {
            store
                .create_symbolic(&format!("refs/x/{i}"), &format!("refs/x/{}", i - 1), false)
                .unwrap();
        }
        assert_eq!(store.resolve_to_oid("refs/x/5").unwrap(), oid(1));
        assert_eq!(store.resolve("refs/x/6").unwrap_err().kind(), ErrorKind::BrokenRef);
    }

    // ---- Updates ----

    #[test]
    fn set_target_checks_kind() {
        let store = store_with_main();
        store.set_target("refs/heads/main", oid(3)).unwrap();
        assert_eq!(store.resolve_to_oid("HEAD").unwrap(), oid(3));
        assert_eq!(store.set_target("HEAD", oid(4)).unwrap_err().kind(), ErrorKind::TypeMismatch);
        store.create_direct("refs/heads/dev", oid(5), false).unwrap();
        store.set_symbolic_target("HEAD", "refs/heads/dev").unwrap();
        assert_eq!(store.resolve_to_oid("HEAD").unwrap(), oid(5));
    }

    #[test]
    fn compare_and_swap() {
        let store = store_with_main();
        let stale = Expect::Value(RefTarget::Direct(oid(7)));
        let err = store.write(&Reference::direct("refs/heads/main", oid(8)), &stale).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Modified);
        let fresh = Expect::Value(RefTarget::Direct(oid(1)));
        store.write(&Reference::direct("refs/heads/main", oid(8)), &fresh).unwrap();
        assert_eq!(store.resolve_to_oid("refs/heads/main").unwrap(), oid(8));
    }

    #[test]
    fn rename_moves_head() {
        let store = store_with_main();
        store.rename("refs/heads/main", "refs/heads/trunk", false).unwrap();
        assert!(!store.exists("refs/heads/main").unwrap());
        assert_eq!(store.head().unwrap().symbolic_target(), Some("refs/heads/trunk"));
        assert_eq!(store.resolve_to_oid("HEAD").unwrap(), oid(1));
    }

    #[test]
    fn rename_to_a_child_name() {
        let store = store_with_main();
        store.rename("refs/heads/main", "refs/heads/main/next", false).unwrap();
        assert!(!store.exists("refs/heads/main").unwrap());
        assert_eq!(store.head().unwrap().symbolic_target(), Some("refs/heads/main/next"));

        store.create_direct("refs/heads/side", oid(2), false).unwrap();
        let err = store.rename("refs/heads/side", "refs/heads/main", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(store.resolve_to_oid("refs/heads/side").unwrap(), oid(2));
    }

    #[test]
    fn poisoned_lock_is_an_error() {
        let store = std::sync::Arc::new(store_with_main());
        let held = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = held.refs.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert_eq!(store.read("HEAD").unwrap_err().kind(), ErrorKind::Corrupt);
        let err = store.create_direct("refs/heads/x", oid(2), false).unwrap_err();
        assert!(matches!(err, RefError::Poisoned));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn delete_reports_existence() {
        let store = store_with_main();
        assert!(store.delete("refs/heads/main").unwrap());
        assert!(!store.delete("refs/heads/main").unwrap());
    }

    // ---- Enumeration ----

    #[test]
    fn enumerate_with_filters() {
        let store = store_with_main();
        store.create_direct("refs/tags/v1", oid(2), false).unwrap();
        store.create_symbolic("refs/remotes/origin/HEAD", "refs/remotes/origin/main", false).unwrap();

        let all: Vec<String> = store
            .references(RefFilter::All)
            .unwrap()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(all, ["refs/heads/main", "refs/remotes/origin/HEAD", "refs/tags/v1"]);
        assert_eq!(store.references(RefFilter::Symbolic).unwrap().count(), 1);
        assert_eq!(store.references(RefFilter::Direct).unwrap().count(), 2);
    }

    #[test]
    fn foreach_abort_is_error() {
        let store = store_with_main();
        store.create_direct("refs/heads/zz", oid(2), false).unwrap();
        let mut seen = 0;
        let err = store
            .foreach(RefFilter::All, &mut |_| {
                seen += 1;
                ControlFlow::Break(())
            })
            .unwrap_err();
        assert_eq!(seen, 1);
        assert!(matches!(err, RefError::Aborted(ref n) if n == "refs/heads/main"));

        let mut count = 0;
        store
            .foreach(RefFilter::All, &mut |_| {
                count += 1;
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn dwim_lookup_order() {
        let store = store_with_main();
        store.create_direct("refs/tags/main", oid(2), false).unwrap();
        store.create_direct("refs/remotes/origin/main", oid(3), false).unwrap();
        store
            .create_symbolic("refs/remotes/upstream/HEAD", "refs/remotes/origin/main", false)
            .unwrap();

        assert_eq!(store.dwim("main").unwrap().name(), "refs/tags/main");
        assert_eq!(store.dwim("origin/main").unwrap().name(), "refs/remotes/origin/main");
        assert_eq!(store.dwim("upstream").unwrap().name(), "refs/remotes/upstream/HEAD");
        assert_eq!(store.dwim("HEAD").unwrap().name(), "HEAD");
        assert_eq!(store.dwim("nothing").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn branch_views() {
        let store = store_with_main();
        store.create_direct("refs/heads/dev", oid(2), false).unwrap();
        store.create_direct("refs/remotes/origin/main", oid(3), false).unwrap();

        let local = store.branches(BranchType::Local).unwrap();
        assert_eq!(local.len(), 2);
        assert!(local.iter().any(|b| b.name() == "main" && b.is_head()));
        assert!(local.iter().any(|b| b.name() == "dev" && !b.is_head()));
        assert_eq!(store.branches(BranchType::Remote).unwrap().len(), 1);
        assert_eq!(store.branches(BranchType::All).unwrap().len(), 3);

        let b = store.lookup_branch("origin/main", BranchType::Remote).unwrap();
        assert_eq!(b.branch_type(), BranchType::Remote);
        assert!(store.lookup_branch("origin/main", BranchType::Local).is_err());
    }

    // ---- Properties ----

    proptest! {
        /// Any graph of symbolic refs either resolves or fails with
        /// BrokenRef; resolution never loops.
        #[test]
        fn resolution_terminates(edges in proptest::collection::vec(0usize..8, 8), direct in 0usize..9) {
            let store = InMemoryRefStore::new();
            for (i, target) in edges.iter().enumerate() {
                let name = format!("refs/p/{i}");
                if i == direct {
                    store.create_direct(&name, oid(i as u8), true).unwrap();
                } else {
                    store.create_symbolic(&name, &format!("refs/p/{target}"), true).unwrap();
                }
            }
            for i in 0..edges.len() {
                match store.resolve(&format!("refs/p/{i}")) {
                    Ok(r) => prop_assert_eq!(r.target_oid(), Some(oid(direct as u8))),
                    Err(e) => prop_assert_eq!(e.kind(), ErrorKind::BrokenRef),
                }
            }
        }
    }
}
