use std::fs;
use std::path::{Path, PathBuf};

use oxgit_hash::ObjectHasher;
use oxgit_pack::PackStore;
use oxgit_refs::{
    Expect, FileRefStore, HeadState, RefError, RefFilter, RefStore, RefTarget, Reference,
    References, HEAD, HEADS_PREFIX, MAX_SYMBOLIC_DEPTH, REFS_PREFIX,
};
use oxgit_rev::{Resolver, RevWalk};
use oxgit_store::{
    Blob, Commit, LooseObjectStore, Object, ObjectDatabase, ObjectStore, RawObject, Tree,
    TreeBuilder,
};
use oxgit_types::{FileMode, ObjectKind, Oid, Signature, OID_HEX_LEN};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::options::RepositoryOptions;

const DESCRIPTION: &str = "Unnamed repository; edit this file 'description' to name the repository.\n";

/// A git repository on disk.
///
/// Objects come from the loose store first, then from packs. References
/// are the loose files under `refs/` plus `packed-refs`. Configuration is
/// read from `config` on each call rather than cached, so edits made by
/// other processes are seen.
pub struct Repository {
    git_dir: PathBuf,
    workdir: Option<PathBuf>,
    objects: ObjectDatabase,
    refs: FileRefStore,
}

impl Repository {
    // ---- Opening ----

    /// Open the repository at exactly `path`: a git directory, or a
    /// working directory containing `.git`. No parent is searched.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(&RepositoryOptions::new(path.as_ref()).no_search(true))
    }

    /// Open the repository containing `start`, walking up through parent
    /// directories until one is found.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(&RepositoryOptions::new(start.as_ref()))
    }

    pub fn open_with(options: &RepositoryOptions) -> Result<Self> {
        options.validate()?;
        let (git_dir, workdir) = if options.no_search {
            probe(&options.path)?
        } else {
            search(&options.path)?
        }
        .ok_or_else(|| Error::RepositoryNotFound(options.path.clone()))?;
        Self::load(git_dir, workdir, options.bare)
    }

    /// Create a repository at `path`: `path/.git` with `path` as working
    /// tree, or `path` itself when `bare`.
    pub fn init(path: impl AsRef<Path>, bare: bool) -> Result<Self> {
        Self::init_with(&RepositoryOptions::new(path.as_ref()).bare(bare))
    }

    /// Initialising an existing repository leaves it untouched and opens it.
    pub fn init_with(options: &RepositoryOptions) -> Result<Self> {
        options.validate()?;
        let bare = options.bare.unwrap_or(false);
        let root = options.path.clone();
        let git_dir = if bare { root.clone() } else { root.join(".git") };
        let workdir = (!bare).then_some(root);

        if is_git_dir(&git_dir) {
            debug!(git_dir = %git_dir.display(), "repository already initialized");
            return Self::load(git_dir, workdir, options.bare);
        }

        for dir in ["objects/info", "objects/pack", "refs/heads", "refs/tags"] {
            fs::create_dir_all(git_dir.join(dir))?;
        }
        let description = git_dir.join("description");
        if !description.exists() {
            fs::write(description, DESCRIPTION)?;
        }

        let mut config = Config::open(git_dir.join("config"))?;
        config.set_i64("core.repositoryformatversion", 0)?;
        config.set_bool("core.filemode", true)?;
        config.set_bool("core.bare", bare)?;
        if !bare {
            config.set_bool("core.logallrefupdates", true)?;
        }
        config.save()?;

        let head = format!("{HEADS_PREFIX}{}", options.initial_head);
        FileRefStore::new(&git_dir).create_symbolic(HEAD, &head, true)?;

        info!(git_dir = %git_dir.display(), bare, head = %head, "initialized repository");
        Self::load(git_dir, workdir, Some(bare))
    }

    fn load(git_dir: PathBuf, workdir: Option<PathBuf>, bare_override: Option<bool>) -> Result<Self> {
        let config = Config::open(git_dir.join("config"))?;
        let version = config.get_i64("core.repositoryformatversion")?.unwrap_or(0);
        if !(0..=1).contains(&version) {
            return Err(Error::Unsupported(format!("repositoryformatversion {version}")));
        }

        let bare = match bare_override {
            Some(bare) => bare,
            None => config.get_bool("core.bare")?.unwrap_or(workdir.is_none()),
        };
        let workdir = if bare {
            None
        } else if let Some(worktree) = config.get("core.worktree")? {
            Some(git_dir.join(worktree))
        } else {
            workdir.or_else(|| git_dir.parent().map(Path::to_path_buf))
        };

        let objects_dir = git_dir.join("objects");
        let objects = ObjectDatabase::new()
            .with_backend(LooseObjectStore::new(&objects_dir))
            .with_backend(PackStore::open(objects_dir.join("pack"))?);
        let refs = FileRefStore::new(&git_dir);

        debug!(
            git_dir = %git_dir.display(),
            workdir = ?workdir,
            "opened repository"
        );
        Ok(Self { git_dir, workdir, objects, refs })
    }

    // ---- Layout ----

    /// The git directory (`.git`, or the repository root when bare).
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    pub fn is_bare(&self) -> bool {
        self.workdir.is_none()
    }

    pub fn objects(&self) -> &ObjectDatabase {
        &self.objects
    }

    pub fn refs(&self) -> &FileRefStore {
        &self.refs
    }

    /// A fresh snapshot of the `config` file.
    pub fn config(&self) -> Result<Config> {
        Config::open(self.git_dir.join("config"))
    }

    // ---- Objects ----

    pub fn lookup(&self, id: &Oid, kind: Option<ObjectKind>) -> Result<Object> {
        Ok(self.objects.lookup(id, kind)?)
    }

    /// The id `data` would have as an object of `kind`, without storing it.
    pub fn hash_object(kind: ObjectKind, data: &[u8]) -> Oid {
        ObjectHasher::new(kind).hash(data)
    }

    /// Store `data` as an object of `kind` after checking it decodes as one.
    pub fn write_object(&self, kind: ObjectKind, data: &[u8]) -> Result<Oid> {
        let raw = RawObject::new(kind, data.to_vec());
        Object::from_raw(raw.compute_id(), raw.clone())?;
        Ok(self.objects.write(&raw)?)
    }

    pub fn create_blob(&self, data: &[u8]) -> Result<Oid> {
        let id = self.objects.write(&Blob::new(data.to_vec()).to_raw())?;
        debug!(oid = %id, size = data.len(), "blob created");
        Ok(id)
    }

    /// Write the tree `builder` describes. Every entry except submodule
    /// links must name an object that exists with the kind its mode implies.
    pub fn create_tree(&self, builder: &TreeBuilder) -> Result<Tree> {
        let tree = builder.build()?;
        for entry in tree.iter() {
            if entry.mode == FileMode::Commit {
                continue;
            }
            if let Some(kind) = entry.kind() {
                self.objects.lookup(&entry.id, Some(kind))?;
            }
        }
        self.objects.write(&tree.to_raw())?;
        debug!(oid = %tree.id(), entries = tree.len(), "tree created");
        Ok(tree)
    }

    /// Write a commit and optionally move `update_ref` to it.
    ///
    /// When `update_ref` is given and already points somewhere, its current
    /// value must be the first parent; otherwise the update fails with
    /// `Modified` and the reference is left alone. A symbolic `update_ref`
    /// (such as `HEAD`) moves the branch it points at, creating it if it
    /// does not exist yet.
    pub fn create_commit(
        &self,
        update_ref: Option<&str>,
        author: &Signature,
        committer: &Signature,
        message: &str,
        tree: &Oid,
        parents: &[Oid],
    ) -> Result<Oid> {
        self.objects.lookup(tree, Some(ObjectKind::Tree))?;
        for parent in parents {
            self.objects.lookup(parent, Some(ObjectKind::Commit))?;
        }
        let commit = Commit::new(*tree, parents.to_vec(), author.clone(), committer.clone(), message);
        let id = self.objects.write(&commit.to_raw())?;
        debug!(oid = %id, parents = parents.len(), "commit created");

        if let Some(name) = update_ref {
            let target = self.final_ref_name(name)?;
            let expect = match self.refs.read(&target)?.and_then(|r| r.target_oid()) {
                None => Expect::Absent,
                Some(current) if parents.first() == Some(&current) => {
                    Expect::Value(RefTarget::Direct(current))
                }
                Some(_) => return Err(RefError::Modified(target).into()),
            };
            self.refs.write(&Reference::direct(&target, id), &expect)?;
        }
        Ok(id)
    }

    /// Point the direct reference at the end of `name`'s symbolic chain at
    /// `id`, if its current value satisfies `expect`.
    pub fn update_reference(&self, name: &str, id: Oid, expect: &Expect) -> Result<Reference> {
        let target = self.final_ref_name(name)?;
        let reference = Reference::direct(&target, id);
        self.refs.write(&reference, expect)?;
        debug!(name, target = %target, oid = %id, "reference updated");
        Ok(reference)
    }

    /// Follow symbolic references from `name` to the name of the direct
    /// reference at the end, which may not exist yet.
    fn final_ref_name(&self, name: &str) -> Result<String> {
        let mut current = name.to_string();
        for _ in 0..=MAX_SYMBOLIC_DEPTH {
            match self.refs.read(&current)? {
                Some(reference) => match reference.symbolic_target() {
                    Some(next) => current = next.to_string(),
                    None => return Ok(current),
                },
                None => return Ok(current),
            }
        }
        Err(RefError::BrokenRef {
            name: name.to_string(),
            reason: format!("more than {MAX_SYMBOLIC_DEPTH} symbolic hops"),
        }
        .into())
    }

    // ---- Revisions ----

    pub fn resolver(&self) -> Resolver<'_, ObjectDatabase, FileRefStore> {
        Resolver::new(&self.objects, &self.refs)
    }

    /// Resolve a revision expression such as `HEAD~2:src/lib.rs`.
    pub fn revparse_single(&self, expr: &str) -> Result<Object> {
        Ok(self.resolver().resolve(expr)?)
    }

    pub fn revwalk(&self) -> RevWalk<'_, ObjectDatabase> {
        RevWalk::new(&self.objects)
    }

    // ---- References ----

    pub fn lookup_reference(&self, name: &str) -> Result<Reference> {
        Ok(self.refs.lookup(name)?)
    }

    /// Look up a reference by shorthand (`main`, `v1.0`, `origin/main`).
    pub fn lookup_reference_dwim(&self, short: &str) -> Result<Reference> {
        Ok(self.refs.dwim(short)?)
    }

    pub fn create_reference(&self, name: &str, id: Oid, force: bool) -> Result<Reference> {
        Ok(self.refs.create_direct(name, id, force)?)
    }

    pub fn create_symbolic_reference(&self, name: &str, target: &str, force: bool) -> Result<Reference> {
        Ok(self.refs.create_symbolic(name, target, force)?)
    }

    pub fn references(&self, filter: RefFilter) -> Result<References> {
        Ok(self.refs.references(filter)?)
    }

    /// Fold loose references into `packed-refs`, recording peeled values
    /// for annotated tags.
    pub fn pack_refs(&self) -> Result<usize> {
        let objects = &self.objects;
        let peel = |id: &Oid| match objects.lookup(id, None) {
            Ok(object) if object.kind() == ObjectKind::Tag => {
                objects.peel_tags(object).ok().map(|o| o.id())
            }
            _ => None,
        };
        Ok(self.refs.pack_refs(&peel)?)
    }

    // ---- HEAD ----

    pub fn head(&self) -> Result<Reference> {
        Ok(self.refs.head()?)
    }

    pub fn head_state(&self) -> Result<HeadState> {
        Ok(self.refs.head_state()?)
    }

    pub fn is_head_detached(&self) -> Result<bool> {
        Ok(self.head_state()?.is_detached())
    }

    /// HEAD names a branch that has no commits yet.
    pub fn is_head_orphan(&self) -> Result<bool> {
        Ok(self.head_state()?.is_orphan())
    }

    /// HEAD is orphan and there are no references at all.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.is_head_orphan()? && self.refs.list(REFS_PREFIX)?.is_empty())
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .field("workdir", &self.workdir)
            .finish()
    }
}

/// `objects/` and `refs/` directories and a HEAD that parses.
pub(crate) fn is_git_dir(dir: &Path) -> bool {
    if !(dir.join("objects").is_dir() && dir.join("refs").is_dir()) {
        return false;
    }
    let Ok(head) = fs::read_to_string(dir.join("HEAD")) else {
        return false;
    };
    let head = head.trim_end();
    match head.strip_prefix("ref:") {
        Some(target) => target.trim_start().starts_with(REFS_PREFIX),
        None => head.len() == OID_HEX_LEN && Oid::from_hex(head).is_ok(),
    }
}

type Found = Option<(PathBuf, Option<PathBuf>)>;

/// Look for a repository at exactly `dir`.
fn probe(dir: &Path) -> Result<Found> {
    let dotgit = dir.join(".git");
    if dotgit.is_file() {
        let target = read_gitfile(&dotgit)?;
        return Ok(is_git_dir(&target).then(|| (target, Some(dir.to_path_buf()))));
    }
    if is_git_dir(&dotgit) {
        return Ok(Some((dotgit, Some(dir.to_path_buf()))));
    }
    if is_git_dir(dir) {
        let workdir = match dir.file_name() {
            Some(name) if name == ".git" => dir.parent().map(Path::to_path_buf),
            _ => None,
        };
        return Ok(Some((dir.to_path_buf(), workdir)));
    }
    Ok(None)
}

/// Probe `start` and each of its ancestors in turn.
fn search(start: &Path) -> Result<Found> {
    let start = fs::canonicalize(start).map_err(|_| Error::RepositoryNotFound(start.to_path_buf()))?;
    let start = if start.is_file() {
        start.parent().map(Path::to_path_buf).unwrap_or(start)
    } else {
        start
    };
    for dir in start.ancestors() {
        if let Some(found) = probe(dir)? {
            debug!(start = %start.display(), git_dir = %found.0.display(), "discovered repository");
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Parse a `.git` file of the form `gitdir: <path>`.
fn read_gitfile(path: &Path) -> Result<PathBuf> {
    let contents = fs::read_to_string(path)?;
    let target = contents
        .trim_end()
        .strip_prefix("gitdir:")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::InvalidGitFile(path.to_path_buf()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(base.join(target))
}
