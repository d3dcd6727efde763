use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use colored::Colorize;
use oxgit::{
    BranchType, Direction, Expect, Object, ObjectKind, Oid, RefFilter, RefTarget, Remote,
    Repository, RepositoryOptions, Signature,
};
use oxgit_refs::{glob_match, InMemoryRefStore, RefStore, HEADS_PREFIX, TAGS_PREFIX};
use oxgit_rev::SortOrder;
use oxgit_store::{InMemoryObjectStore, ObjectStore, WalkItem, WalkOrder};
use serde::Serialize;
use serde_json::json;

use crate::cli::*;

struct Session {
    dir: PathBuf,
    format: OutputFormat,
    verbose: bool,
}

impl Session {
    fn repo(&self) -> anyhow::Result<Repository> {
        Repository::discover(&self.dir)
            .with_context(|| format!("not a git repository: {}", self.dir.display()))
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let session = Session {
        dir: cli.dir.unwrap_or_else(|| PathBuf::from(".")),
        format: cli.format,
        verbose: cli.verbose,
    };
    match cli.command {
        Command::Init(args) => cmd_init(&session, args),
        Command::CatFile(args) => cmd_cat_file(&session, args),
        Command::HashObject(args) => cmd_hash_object(&session, args),
        Command::RevParse(args) => cmd_rev_parse(&session, args),
        Command::LsTree(args) => cmd_ls_tree(&session, args),
        Command::ShowRef(args) => cmd_show_ref(&session, args),
        Command::SymbolicRef(args) => cmd_symbolic_ref(&session, args),
        Command::UpdateRef(args) => cmd_update_ref(&session, args),
        Command::Tag(args) => cmd_tag(&session, args),
        Command::Branch(args) => cmd_branch(&session, args),
        Command::LsRemote(args) => cmd_ls_remote(&session, args),
        Command::Remote(args) => cmd_remote(&session, args),
        Command::Config(args) => cmd_config(&session, args),
        Command::RevList(args) => cmd_rev_list(&session, args),
        Command::Log(args) => cmd_log(&session, args),
        Command::PackRefs => cmd_pack_refs(&session),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Author and committer identity from `user.name` / `user.email`.
fn signature(repo: &Repository) -> anyhow::Result<Signature> {
    let config = repo.config()?;
    let name = config
        .get("user.name")?
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "oxgit".to_string());
    let email = config
        .get("user.email")?
        .unwrap_or_else(|| format!("{name}@localhost"));
    Ok(Signature::now(name, email))
}

// ---- Repository ----

fn cmd_init(session: &Session, args: InitArgs) -> anyhow::Result<()> {
    let path = session.dir.join(args.path.unwrap_or_else(|| PathBuf::from(".")));
    let mut options = RepositoryOptions::new(path).bare(args.bare);
    if let Some(branch) = args.initial_branch {
        options = options.initial_head(branch);
    }
    let repo = Repository::init_with(&options)?;
    if session.json() {
        return print_json(&json!({
            "git_dir": repo.git_dir(),
            "workdir": repo.workdir(),
            "bare": repo.is_bare(),
        }));
    }
    let mode = if repo.is_bare() { "bare " } else { "" };
    println!(
        "{} Initialized {}repository in {}",
        "✓".green().bold(),
        mode,
        repo.git_dir().display().to_string().bold()
    );
    Ok(())
}

fn cmd_config(session: &Session, args: ConfigArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    let mut config = repo.config()?;

    if args.list {
        let entries = config.entries();
        if session.json() {
            return print_json(&entries);
        }
        for entry in entries {
            match entry.value {
                Some(value) => println!("{}={}", entry.key, value),
                None => println!("{}", entry.key),
            }
        }
        return Ok(());
    }

    let Some(key) = args.key else {
        bail!("a key is required unless --list is given");
    };
    if args.unset {
        if config.remove(&key)? == 0 {
            bail!("no such key: {key}");
        }
        return Ok(config.save()?);
    }
    if let Some(value) = args.value {
        if args.add {
            config.add(&key, &value)?;
        } else {
            config.set(&key, &value)?;
        }
        return Ok(config.save()?);
    }

    let values = if args.get_all {
        config.get_all(&key)?
    } else {
        config.get(&key)?.into_iter().collect()
    };
    if values.is_empty() {
        bail!("key not found: {key}");
    }
    if session.json() {
        return print_json(&values);
    }
    for value in values {
        println!("{value}");
    }
    Ok(())
}

// ---- Objects ----

fn cmd_cat_file(session: &Session, args: CatFileArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    let object = repo.revparse_single(&args.object)?;
    if args.mode.exists {
        return Ok(());
    }
    let raw = object.to_raw();
    if session.json() {
        return print_json(&json!({
            "oid": object.id(),
            "kind": object.kind(),
            "size": raw.size(),
        }));
    }
    if args.mode.kind {
        println!("{}", object.kind());
    } else if args.mode.size {
        println!("{}", raw.size());
    } else if let Object::Tree(tree) = &object {
        for entry in tree.iter() {
            let kind = entry.kind().map_or("unknown".to_string(), |k| k.to_string());
            println!("{} {} {}\t{}", entry.mode, kind, entry.id, entry.name);
        }
    } else {
        io::stdout().write_all(&raw.data)?;
    }
    Ok(())
}

fn cmd_hash_object(session: &Session, args: HashObjectArgs) -> anyhow::Result<()> {
    let kind: ObjectKind = args.kind.parse()?;
    let data = match (&args.file, args.stdin) {
        (_, true) => {
            let mut data = Vec::new();
            io::stdin().read_to_end(&mut data)?;
            data
        }
        (Some(file), false) => std::fs::read(session.dir.join(file))
            .with_context(|| format!("cannot read {}", file.display()))?,
        (None, false) => bail!("a file or --stdin is required"),
    };
    let id = if args.write {
        session.repo()?.write_object(kind, &data)?
    } else {
        Repository::hash_object(kind, &data)
    };
    println!("{id}");
    Ok(())
}

fn cmd_rev_parse(session: &Session, args: RevParseArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    let mut ids = Vec::with_capacity(args.revs.len());
    for rev in &args.revs {
        ids.push(repo.revparse_single(rev)?.id());
    }
    if session.json() {
        return print_json(&ids);
    }
    for id in ids {
        if args.short {
            println!("{}", id.short_hex());
        } else {
            println!("{id}");
        }
    }
    Ok(())
}

fn cmd_ls_tree(session: &Session, args: LsTreeArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    let object = repo.revparse_single(&args.tree)?;
    let tree = repo.objects().peel(object, ObjectKind::Tree)?.into_tree()?;

    let items: Vec<WalkItem> = if args.recursive {
        tree.walker(repo.objects(), WalkOrder::Pre)
            .filter(|item| match item {
                Ok(item) => args.show_trees || !item.entry.is_tree(),
                Err(_) => true,
            })
            .collect::<Result<_, _>>()?
    } else {
        tree.iter()
            .map(|entry| WalkItem { root: String::new(), entry: entry.clone() })
            .collect()
    };

    if session.json() {
        return print_json(&items);
    }
    for item in items {
        if args.name_only {
            println!("{}", item.path());
            continue;
        }
        let kind = item.entry.kind().map_or("unknown".to_string(), |k| k.to_string());
        println!("{} {} {}\t{}", item.entry.mode, kind, item.entry.id, item.path());
    }
    Ok(())
}

// ---- References ----

#[derive(Serialize)]
struct RefLine {
    name: String,
    oid: Oid,
    #[serde(skip_serializing_if = "Option::is_none")]
    peeled: Option<Oid>,
}

fn cmd_show_ref(session: &Session, args: ShowRefArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    let mut lines = Vec::new();
    for reference in repo.references(RefFilter::All)? {
        let name = reference.name();
        let namespace_ok = (!args.heads && !args.tags)
            || (args.heads && name.starts_with(HEADS_PREFIX))
            || (args.tags && name.starts_with(TAGS_PREFIX));
        let pattern_ok = args.patterns.is_empty()
            || args
                .patterns
                .iter()
                .any(|p| glob_match(p, name) || glob_match(p, reference.shorthand()));
        if !namespace_ok || !pattern_ok {
            continue;
        }
        let Ok(oid) = repo.refs().resolve_to_oid(name) else {
            tracing::warn!(name, "skipping unresolvable reference");
            continue;
        };
        let peeled = if args.dereference {
            let object = repo.lookup(&oid, None)?;
            match object.kind() {
                ObjectKind::Tag => Some(repo.objects().peel_tags(object)?.id()),
                _ => None,
            }
        } else {
            None
        };
        lines.push(RefLine { name: name.to_string(), oid, peeled });
    }

    if session.json() {
        return print_json(&lines);
    }
    for line in lines {
        println!("{} {}", line.oid, line.name);
        if let Some(peeled) = line.peeled {
            println!("{} {}^{{}}", peeled, line.name);
        }
    }
    Ok(())
}

fn cmd_symbolic_ref(session: &Session, args: SymbolicRefArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    if let Some(target) = args.target {
        repo.create_symbolic_reference(&args.name, &target, true)?;
        return Ok(());
    }
    let reference = repo.lookup_reference(&args.name)?;
    let Some(target) = reference.symbolic_target() else {
        bail!("ref {} is not a symbolic ref", args.name);
    };
    if args.short {
        println!("{}", oxgit_refs::shorthand(target));
    } else {
        println!("{target}");
    }
    Ok(())
}

fn parse_expected(repo: &Repository, value: Option<&str>) -> anyhow::Result<Expect> {
    Ok(match value {
        None => Expect::Any,
        Some(v) if v.chars().all(|c| c == '0') && !v.is_empty() => Expect::Absent,
        Some(v) => Expect::Value(RefTarget::Direct(repo.revparse_single(v)?.id())),
    })
}

fn cmd_update_ref(session: &Session, args: UpdateRefArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    if args.delete {
        // `update-ref -d <ref> [<oldvalue>]`
        if let Expect::Value(RefTarget::Direct(old)) = parse_expected(&repo, args.new_value.as_deref())? {
            let current = repo.refs().resolve_to_oid(&args.name)?;
            if current != old {
                bail!("reference {} is at {current}, not {old}", args.name);
            }
        }
        if !repo.refs().delete(&args.name)? {
            bail!("no such reference: {}", args.name);
        }
        return Ok(());
    }

    let Some(new_value) = args.new_value else {
        bail!("a new value is required");
    };
    let id = repo.revparse_single(&new_value)?.id();
    let expect = parse_expected(&repo, args.old_value.as_deref())?;
    repo.update_reference(&args.name, id, &expect)?;
    Ok(())
}

fn cmd_pack_refs(session: &Session) -> anyhow::Result<()> {
    let count = session.repo()?.pack_refs()?;
    if session.json() {
        return print_json(&json!({ "packed": count }));
    }
    println!("{} Packed {} references.", "✓".green(), count);
    Ok(())
}

fn cmd_tag(session: &Session, args: TagArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    if args.delete {
        let Some(name) = args.name else {
            bail!("tag name required");
        };
        repo.delete_tag(&name)?;
        println!("Deleted tag '{}'", name.yellow());
        return Ok(());
    }

    let name = match (args.name, args.list) {
        (Some(name), None) => name,
        (name, pattern) => {
            let pattern = pattern.or(name);
            let tags = repo.list_tags(pattern.as_deref())?;
            if session.json() {
                return print_json(&tags);
            }
            for tag in tags {
                println!("{tag}");
            }
            return Ok(());
        }
    };

    let target = repo.revparse_single(args.target.as_deref().unwrap_or("HEAD"))?.id();
    let id = if args.annotate || args.message.is_some() {
        let Some(message) = args.message else {
            bail!("an annotated tag needs a message (-m)");
        };
        let message = if message.ends_with('\n') { message } else { format!("{message}\n") };
        repo.create_tag(&name, &target, &signature(&repo)?, &message, args.force)?
    } else {
        repo.create_tag_lightweight(&name, &target, args.force)?
    };
    if session.json() {
        return print_json(&json!({ "name": name, "oid": id, "target": target }));
    }
    Ok(())
}

fn cmd_branch(session: &Session, args: BranchArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    let branch_type = if args.all {
        BranchType::All
    } else if args.remotes {
        BranchType::Remote
    } else {
        BranchType::Local
    };

    if args.delete {
        let Some(name) = args.name else {
            bail!("branch name required");
        };
        repo.delete_branch(&name, branch_type)?;
        println!("Deleted branch {}", name.yellow());
        return Ok(());
    }

    if args.rename {
        let (Some(old), Some(new)) = (args.name, args.start) else {
            bail!("usage: branch -m <old> <new>");
        };
        repo.rename_branch(&old, &new, args.force)?;
        return Ok(());
    }

    if let Some(name) = args.name {
        let start = args.start.as_deref().unwrap_or("HEAD");
        let commit = repo.resolver().resolve_commit(start)?.id();
        let branch = repo.create_branch(&name, &commit, args.force)?;
        if session.json() {
            return print_json(&branch);
        }
        return Ok(());
    }

    let branches: Vec<_> = repo.branches(branch_type)?.collect();
    if session.json() {
        return print_json(&branches);
    }
    for branch in branches {
        let line = match branch.branch_type() {
            BranchType::Remote => branch.name().red().to_string(),
            _ if branch.is_head() => branch.name().green().to_string(),
            _ => branch.name().to_string(),
        };
        let marker = if branch.is_head() { "*" } else { " " };
        println!("{marker} {line}");
    }
    Ok(())
}

// ---- Revisions ----

fn cmd_rev_list(session: &Session, args: RevListArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    let resolver = repo.resolver();
    let mut walk = repo.revwalk();
    if args.topo_order {
        walk.sorting(SortOrder::Topological);
    }
    walk.reverse(args.reverse);
    for rev in &args.revs {
        if rev.contains("..") {
            walk.push_range(&resolver, rev)?;
        } else if let Some(hidden) = rev.strip_prefix('^') {
            walk.hide(resolver.resolve_commit(hidden)?.id())?;
        } else {
            walk.push(resolver.resolve_commit(rev)?.id())?;
        }
    }

    let ids: Vec<Oid> = walk
        .take(args.max_count.unwrap_or(usize::MAX))
        .collect::<Result<_, _>>()?;
    if session.json() {
        return print_json(&ids);
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn cmd_log(session: &Session, args: LogArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    let start = repo.resolver().resolve_commit(&args.rev)?.id();
    let mut walk = repo.revwalk();
    walk.push(start)?;

    let mut entries = Vec::new();
    for id in walk.take(args.limit) {
        let commit = repo.objects().lookup_commit(&id?)?;
        if session.json() {
            entries.push(json!({
                "oid": commit.id(),
                "parents": commit.parent_ids(),
                "author": commit.author(),
                "committer": commit.committer(),
                "summary": commit.summary(),
            }));
            continue;
        }
        if args.oneline {
            println!("{} {}", commit.id().short_hex().yellow(), commit.summary());
            continue;
        }
        let author = commit.author();
        println!("{}", format!("commit {}", commit.id()).yellow());
        println!("Author: {} <{}>", author.name, author.email);
        let date = author.when.to_rfc3339().unwrap_or_else(|| author.when.to_string());
        println!("Date:   {date}");
        println!();
        for line in commit.message().lines() {
            println!("    {line}");
        }
        println!();
    }
    if session.json() {
        return print_json(&entries);
    }
    Ok(())
}

// ---- Remotes ----

fn cmd_ls_remote(session: &Session, args: LsRemoteArgs) -> anyhow::Result<()> {
    // Listing works outside a repository, against empty local stores.
    let repo = session.repo().ok();
    let configured = match &repo {
        Some(repo) => repo.list_remotes()?.contains(&args.remote),
        None => false,
    };
    let mut remote = match &repo {
        Some(repo) if configured => repo.remote(&args.remote)?,
        Some(repo) => repo.remote_anonymous(&args.remote)?,
        None => Remote::anonymous(&args.remote, &[])?,
    };
    remote.connect(Direction::Fetch)?;
    let heads = match &repo {
        Some(repo) => remote.list(repo.objects(), repo.refs())?,
        None => remote.list(&InMemoryObjectStore::new(), &InMemoryRefStore::new())?,
    };
    remote.disconnect()?;

    let heads: Vec<_> = heads
        .into_iter()
        .filter(|h| {
            (!args.heads && !args.tags)
                || (args.heads && h.name.starts_with(HEADS_PREFIX))
                || (args.tags && h.name.starts_with(TAGS_PREFIX))
        })
        .collect();
    if session.json() {
        return print_json(&heads);
    }
    for head in heads {
        println!("{}\t{}", head.oid, head.name);
    }
    Ok(())
}

fn cmd_remote(session: &Session, args: RemoteArgs) -> anyhow::Result<()> {
    let repo = session.repo()?;
    match args.action {
        Some(RemoteAction::Add { name, url }) => {
            repo.add_remote(&name, &url)?;
            println!("{} Added remote {} ({})", "✓".green(), name.bold(), url);
        }
        Some(RemoteAction::Remove { name }) => {
            repo.delete_remote(&name)?;
            println!("{} Removed remote {}", "✓".green(), name.bold());
        }
        Some(RemoteAction::Show { name }) => {
            let remote = repo.remote(&name)?;
            if session.json() {
                return print_json(&json!({
                    "name": name,
                    "url": remote.url(),
                    "fetch": remote.fetch_specs(),
                    "push": remote.push_specs(),
                }));
            }
            println!("* remote {}", name.bold());
            println!("  URL: {}", remote.url());
            for spec in remote.fetch_specs() {
                println!("  fetch: {spec}");
            }
            for spec in remote.push_specs() {
                println!("  push:  {spec}");
            }
        }
        None => {
            let names = repo.list_remotes()?;
            if session.json() {
                return print_json(&names);
            }
            for name in names {
                if session.verbose {
                    let remote = repo.remote(&name)?;
                    println!("{}\t{} (fetch)", name.bold(), remote.url());
                    println!("{}\t{} (push)", name.bold(), remote.url());
                } else {
                    println!("{name}");
                }
            }
        }
    }
    Ok(())
}
