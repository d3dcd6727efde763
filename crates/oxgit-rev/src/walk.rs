//! Commit-graph walking.
//!
//! [`RevWalk`] yields the commits reachable from a set of pushed start
//! points, excluding everything reachable from hidden ones. The default
//! order (newest committer time first) is produced lazily; topological and
//! reversed orders buffer the whole selection first.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use oxgit_refs::RefStore;
use oxgit_store::{Commit, ObjectStore};
use oxgit_types::{ObjectKind, Oid};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RevError, RevResult};
use crate::resolver::Resolver;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest committer time first.
    #[default]
    Time,
    /// Children before parents; ties broken by committer time.
    Topological,
}

/// A commit waiting in the time-ordered queue.
struct Queued {
    time: i64,
    seq: u64,
    commit: Commit,
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

enum State {
    Pending,
    Lazy {
        queue: BinaryHeap<Queued>,
        seen: HashSet<Oid>,
        seq: u64,
    },
    Buffered(std::vec::IntoIter<Oid>),
    Done,
}

pub struct RevWalk<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    order: SortOrder,
    reverse: bool,
    starts: Vec<Oid>,
    hidden: Vec<Oid>,
    state: State,
}

impl<'s, S: ObjectStore + ?Sized> RevWalk<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            order: SortOrder::Time,
            reverse: false,
            starts: Vec::new(),
            hidden: Vec::new(),
            state: State::Pending,
        }
    }

    pub fn sorting(&mut self, order: SortOrder) -> &mut Self {
        self.order = order;
        self
    }

    pub fn reverse(&mut self, reverse: bool) -> &mut Self {
        self.reverse = reverse;
        self
    }

    /// Start from `id`; tags are peeled to the commit they point at.
    pub fn push(&mut self, id: Oid) -> RevResult<()> {
        let commit = self.peel_commit(id)?;
        self.starts.push(commit);
        Ok(())
    }

    /// Exclude `id` and all of its ancestors.
    pub fn hide(&mut self, id: Oid) -> RevResult<()> {
        let commit = self.peel_commit(id)?;
        self.hidden.push(commit);
        Ok(())
    }

    /// Push `b` and hide `a` for a range `a..b`. An empty side means `HEAD`.
    pub fn push_range<O, R>(&mut self, resolver: &Resolver<'_, O, R>, range: &str) -> RevResult<()>
    where
        O: ObjectStore + ?Sized,
        R: RefStore + ?Sized,
    {
        let (from, to) = range.split_once("..").ok_or_else(|| RevError::Syntax {
            expr: range.to_string(),
            reason: "expected '<from>..<to>'".into(),
        })?;
        let side = |s: &str| if s.is_empty() { "HEAD".to_string() } else { s.to_string() };
        let hide = resolver.resolve_commit(&side(from))?.id();
        let push = resolver.resolve_commit(&side(to))?.id();
        self.hide(hide)?;
        self.push(push)
    }

    /// Forget start points, hidden points and progress.
    pub fn reset(&mut self) {
        self.starts.clear();
        self.hidden.clear();
        self.state = State::Pending;
    }

    fn peel_commit(&self, id: Oid) -> RevResult<Oid> {
        let object = self.store.lookup(&id, None)?;
        Ok(self.store.peel(object, ObjectKind::Commit)?.id())
    }

    /// Everything reachable from the hidden points.
    fn hidden_set(&self) -> RevResult<HashSet<Oid>> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<Oid> = self.hidden.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let commit = self.store.lookup_commit(&id)?;
            queue.extend(commit.parent_ids().iter().copied());
        }
        Ok(seen)
    }

    fn start(&mut self) -> RevResult<()> {
        let mut seen = self.hidden_set()?;
        let mut queue = BinaryHeap::new();
        let mut seq = 0;
        for id in self.starts.clone() {
            if seen.insert(id) {
                let commit = self.store.lookup_commit(&id)?;
                queue.push(Queued {
                    time: commit.committer().when.seconds,
                    seq,
                    commit,
                });
                seq += 1;
            }
        }
        debug!(
            starts = self.starts.len(),
            hidden = self.hidden.len(),
            "revision walk started"
        );
        self.state = State::Lazy { queue, seen, seq };

        if self.order == SortOrder::Topological || self.reverse {
            let mut commits = Vec::new();
            while let Some(next) = self.next_by_time()? {
                commits.push(next);
            }
            let mut ids: Vec<Oid> = match self.order {
                SortOrder::Time => commits.into_iter().map(|c| c.id()).collect(),
                SortOrder::Topological => topological(commits),
            };
            if self.reverse {
                ids.reverse();
            }
            self.state = State::Buffered(ids.into_iter());
        }
        Ok(())
    }

    fn next_by_time(&mut self) -> RevResult<Option<Commit>> {
        let State::Lazy { queue, seen, seq } = &mut self.state else {
            return Ok(None);
        };
        let Some(Queued { commit, .. }) = queue.pop() else {
            return Ok(None);
        };
        for parent in commit.parent_ids() {
            if seen.insert(*parent) {
                let parent = self.store.lookup_commit(parent)?;
                queue.push(Queued {
                    time: parent.committer().when.seconds,
                    seq: *seq,
                    commit: parent,
                });
                *seq += 1;
            }
        }
        Ok(Some(commit))
    }

    fn advance(&mut self) -> RevResult<Option<Oid>> {
        if matches!(self.state, State::Pending) {
            self.start()?;
        }
        if let State::Buffered(ids) = &mut self.state {
            return Ok(ids.next());
        }
        Ok(self.next_by_time()?.map(|c| c.id()))
    }
}

impl<S: ObjectStore + ?Sized> Iterator for RevWalk<'_, S> {
    type Item = RevResult<Oid>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(next) => next.map(Ok),
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

/// Order `commits` so every commit precedes its parents, preferring newer
/// commits when several are ready.
fn topological(commits: Vec<Commit>) -> Vec<Oid> {
    let index: HashMap<Oid, usize> = commits
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id(), i))
        .collect();
    let mut children = vec![0usize; commits.len()];
    for commit in &commits {
        for parent in commit.parent_ids() {
            if let Some(&p) = index.get(parent) {
                children[p] += 1;
            }
        }
    }

    let mut ready: BinaryHeap<(i64, std::cmp::Reverse<usize>)> = children
        .iter()
        .enumerate()
        .filter(|(_, &n)| n == 0)
        .map(|(i, _)| (commits[i].committer().when.seconds, std::cmp::Reverse(i)))
        .collect();
    let mut out = Vec::with_capacity(commits.len());
    while let Some((_, std::cmp::Reverse(i))) = ready.pop() {
        out.push(commits[i].id());
        for parent in commits[i].parent_ids() {
            if let Some(&p) = index.get(parent) {
                children[p] -= 1;
                if children[p] == 0 {
                    ready.push((commits[p].committer().when.seconds, std::cmp::Reverse(p)));
                }
            }
        }
    }
    out
}
