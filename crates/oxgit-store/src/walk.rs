//! Recursive tree traversal.
//!
//! [`TreeWalker`] is a lazy iterator over every entry reachable from a root
//! tree. Each item carries the root-relative directory the entry lives in
//! (`""` for the top level, `"src/bin/"` further down). Subtrees are loaded
//! from the store only when the walk reaches them; gitlinks are reported but
//! never descended into.

use oxgit_types::{ObjectKind, Oid};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;
use crate::tree::{Tree, TreeEntry};

/// Visiting order for directory entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkOrder {
    /// A directory is visited before its contents.
    #[default]
    Pre,
    /// A directory is visited after its contents.
    Post,
}

/// What a visitor wants the walk to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    /// Do not descend into the subtree just visited (pre-order only).
    Skip,
    /// Stop the walk and report [`StoreError::Aborted`].
    Abort,
}

/// One visited entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WalkItem {
    /// Directory containing the entry, with a trailing `/` unless empty.
    pub root: String,
    pub entry: TreeEntry,
}

impl WalkItem {
    /// Full root-relative path of the entry.
    pub fn path(&self) -> String {
        format!("{}{}", self.root, self.entry.name)
    }
}

struct Frame {
    tree: Tree,
    root: String,
    next: usize,
    /// Directory entry to emit once this frame drains (post-order).
    owner: Option<WalkItem>,
}

/// Lazy depth-first iterator over a tree and its subtrees.
pub struct TreeWalker<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    order: WalkOrder,
    stack: Vec<Frame>,
    pending: Option<(Oid, String)>,
}

impl<'s, S: ObjectStore + ?Sized> TreeWalker<'s, S> {
    pub fn new(store: &'s S, root: Tree, order: WalkOrder) -> Self {
        Self {
            store,
            order,
            stack: vec![Frame {
                tree: root,
                root: String::new(),
                next: 0,
                owner: None,
            }],
            pending: None,
        }
    }

    /// Do not descend into the directory most recently yielded.
    ///
    /// Only meaningful in pre-order; in post-order a directory's contents
    /// have already been visited by the time it is yielded.
    pub fn skip_subtree(&mut self) {
        self.pending = None;
    }

    fn load(&self, id: &Oid) -> StoreResult<Tree> {
        self.store.lookup(id, Some(ObjectKind::Tree))?.into_tree()
    }

    fn fail(&mut self, err: StoreError) -> Option<StoreResult<WalkItem>> {
        self.stack.clear();
        self.pending = None;
        Some(Err(err))
    }
}

impl<S: ObjectStore + ?Sized> Iterator for TreeWalker<'_, S> {
    type Item = StoreResult<WalkItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((id, root)) = self.pending.take() {
            match self.load(&id) {
                Ok(tree) => self.stack.push(Frame {
                    tree,
                    root,
                    next: 0,
                    owner: None,
                }),
                Err(e) => return self.fail(e),
            }
        }

        loop {
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.tree.entries().get(frame.next).cloned() else {
                let done = self.stack.pop()?;
                match done.owner {
                    Some(item) => return Some(Ok(item)),
                    None => continue,
                }
            };
            frame.next += 1;
            let item = WalkItem {
                root: frame.root.clone(),
                entry,
            };
            if !item.entry.is_tree() {
                return Some(Ok(item));
            }

            let child_root = format!("{}/", item.path());
            match self.order {
                WalkOrder::Pre => {
                    self.pending = Some((item.entry.id, child_root));
                    return Some(Ok(item));
                }
                WalkOrder::Post => match self.load(&item.entry.id) {
                    Ok(tree) => self.stack.push(Frame {
                        tree,
                        root: child_root,
                        next: 0,
                        owner: Some(item),
                    }),
                    Err(e) => return self.fail(e),
                },
            }
        }
    }
}

impl Tree {
    /// Lazily iterate every entry reachable from this tree.
    pub fn walker<'s, S: ObjectStore + ?Sized>(
        &self,
        store: &'s S,
        order: WalkOrder,
    ) -> TreeWalker<'s, S> {
        TreeWalker::new(store, self.clone(), order)
    }

    /// Visit every reachable entry with `visitor`.
    ///
    /// The visitor receives the entry's directory (see [`WalkItem::root`])
    /// and the entry itself. Returning [`WalkControl::Abort`] stops the
    /// walk with [`StoreError::Aborted`]; store errors stop it likewise.
    pub fn walk<S, F>(&self, store: &S, order: WalkOrder, mut visitor: F) -> StoreResult<()>
    where
        S: ObjectStore + ?Sized,
        F: FnMut(&str, &TreeEntry) -> WalkControl,
    {
        let mut walker = self.walker(store, order);
        while let Some(item) = walker.next() {
            let item = item?;
            match visitor(&item.root, &item.entry) {
                WalkControl::Continue => {}
                WalkControl::Skip => walker.skip_subtree(),
                WalkControl::Abort => return Err(StoreError::Aborted(item.path())),
            }
        }
        Ok(())
    }
}
