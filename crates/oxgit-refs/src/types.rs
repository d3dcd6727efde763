//! Core reference types.
//!
//! A [`Reference`] maps a name either to an object id (direct) or to another
//! reference name (symbolic). Branches, tags and remote-tracking refs are not
//! separate storage kinds; [`RefClass`] derives them from the name.

use std::fmt;

use oxgit_types::Oid;
use serde::{Deserialize, Serialize};

use crate::names::{self, HEADS_PREFIX, NOTES_PREFIX, REMOTES_PREFIX, TAGS_PREFIX};

/// What a reference points at.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefTarget {
    /// An object id.
    Direct(Oid),
    /// The full name of another reference.
    Symbolic(String),
}

impl RefTarget {
    pub fn kind(&self) -> RefKind {
        match self {
            Self::Direct(_) => RefKind::Direct,
            Self::Symbolic(_) => RefKind::Symbolic,
        }
    }

    pub fn oid(&self) -> Option<Oid> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Symbolic(_) => None,
        }
    }

    pub fn symbolic(&self) -> Option<&str> {
        match self {
            Self::Direct(_) => None,
            Self::Symbolic(name) => Some(name),
        }
    }

    /// Loose ref file contents: `<hex>\n` or `ref: <name>\n`.
    pub fn to_file_contents(&self) -> String {
        match self {
            Self::Direct(id) => format!("{id}\n"),
            Self::Symbolic(name) => format!("ref: {name}\n"),
        }
    }
}

impl fmt::Display for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(id) => write!(f, "{id}"),
            Self::Symbolic(name) => write!(f, "ref: {name}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Direct,
    Symbolic,
}

/// Which references an enumeration visits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefFilter {
    #[default]
    All,
    Direct,
    Symbolic,
}

impl RefFilter {
    pub fn matches(&self, reference: &Reference) -> bool {
        match self {
            Self::All => true,
            Self::Direct => reference.kind() == RefKind::Direct,
            Self::Symbolic => reference.kind() == RefKind::Symbolic,
        }
    }
}

/// Classification of a name by its namespace prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefClass {
    Branch,
    RemoteBranch,
    Tag,
    Note,
    Other,
}

impl RefClass {
    pub fn of(name: &str) -> Self {
        if name.starts_with(HEADS_PREFIX) {
            Self::Branch
        } else if name.starts_with(REMOTES_PREFIX) {
            Self::RemoteBranch
        } else if name.starts_with(TAGS_PREFIX) {
            Self::Tag
        } else if name.starts_with(NOTES_PREFIX) {
            Self::Note
        } else {
            Self::Other
        }
    }
}

/// A named reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    name: String,
    target: RefTarget,
    /// Fully peeled object id, when known from `packed-refs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    peeled: Option<Oid>,
}

impl Reference {
    pub fn new(name: impl Into<String>, target: RefTarget) -> Self {
        Self {
            name: name.into(),
            target,
            peeled: None,
        }
    }

    pub fn direct(name: impl Into<String>, id: Oid) -> Self {
        Self::new(name, RefTarget::Direct(id))
    }

    pub fn symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, RefTarget::Symbolic(target.into()))
    }

    pub fn with_peeled(mut self, peeled: Option<Oid>) -> Self {
        self.peeled = peeled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shorthand(&self) -> &str {
        names::shorthand(&self.name)
    }

    pub fn target(&self) -> &RefTarget {
        &self.target
    }

    pub fn kind(&self) -> RefKind {
        self.target.kind()
    }

    /// The object id of a direct reference.
    pub fn target_oid(&self) -> Option<Oid> {
        self.target.oid()
    }

    /// The target name of a symbolic reference.
    pub fn symbolic_target(&self) -> Option<&str> {
        self.target.symbolic()
    }

    pub fn peeled(&self) -> Option<Oid> {
        self.peeled
    }

    pub fn class(&self) -> RefClass {
        RefClass::of(&self.name)
    }

    pub fn is_branch(&self) -> bool {
        self.class() == RefClass::Branch
    }

    pub fn is_remote(&self) -> bool {
        self.class() == RefClass::RemoteBranch
    }

    pub fn is_tag(&self) -> bool {
        self.class() == RefClass::Tag
    }

    pub fn is_note(&self) -> bool {
        self.class() == RefClass::Note
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target, self.name)
    }
}

/// Which branch namespace to search or list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchType {
    #[default]
    Local,
    Remote,
    All,
}

impl BranchType {
    pub fn includes(&self, class: RefClass) -> bool {
        match self {
            Self::Local => class == RefClass::Branch,
            Self::Remote => class == RefClass::RemoteBranch,
            Self::All => matches!(class, RefClass::Branch | RefClass::RemoteBranch),
        }
    }
}

/// A reference viewed as a branch.
///
/// This is a derived view over a [`Reference`] in `refs/heads/` or
/// `refs/remotes/`; nothing distinguishes it in storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Branch {
    reference: Reference,
    is_head: bool,
}

impl Branch {
    /// Wrap `reference` if its name is in a branch namespace.
    pub fn from_reference(reference: Reference, is_head: bool) -> Option<Self> {
        BranchType::All
            .includes(reference.class())
            .then_some(Self { reference, is_head })
    }

    /// Short branch name: `main`, or `origin/main` for remote branches.
    pub fn name(&self) -> &str {
        self.reference.shorthand()
    }

    pub fn branch_type(&self) -> BranchType {
        if self.reference.is_remote() {
            BranchType::Remote
        } else {
            BranchType::Local
        }
    }

    /// Whether HEAD is attached to this branch.
    pub fn is_head(&self) -> bool {
        self.is_head
    }

    pub fn target_oid(&self) -> Option<Oid> {
        self.reference.target_oid()
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn into_reference(self) -> Reference {
        self.reference
    }
}

/// The state of HEAD.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum HeadState {
    /// HEAD names a branch that exists.
    Attached { branch: String, target: Oid },
    /// HEAD holds an object id directly.
    Detached { target: Oid },
    /// HEAD names a branch that does not exist yet.
    Orphan { branch: String },
}

impl HeadState {
    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Detached { .. })
    }

    pub fn is_orphan(&self) -> bool {
        matches!(self, Self::Orphan { .. })
    }

    /// The commit HEAD resolves to, if any.
    pub fn target(&self) -> Option<Oid> {
        match self {
            Self::Attached { target, .. } | Self::Detached { target } => Some(*target),
            Self::Orphan { .. } => None,
        }
    }

    /// The full branch name HEAD points at, attached or orphan.
    pub fn branch(&self) -> Option<&str> {
        match self {
            Self::Attached { branch, .. } | Self::Orphan { branch } => Some(branch),
            Self::Detached { .. } => None,
        }
    }
}

/// Precondition for a reference write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Expect {
    /// Overwrite whatever is there.
    #[default]
    Any,
    /// The reference must not exist.
    Absent,
    /// The reference must currently hold exactly this value.
    Value(RefTarget),
    /// The reference must be absent or hold this value.
    AbsentOr(RefTarget),
}

impl Expect {
    /// `force` semantics: overwrite when set, refuse an existing name otherwise.
    pub fn from_force(force: bool) -> Self {
        if force {
            Self::Any
        } else {
            Self::Absent
        }
    }
}
