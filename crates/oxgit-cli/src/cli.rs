use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "oxgit",
    about = "Plumbing for git repositories: objects, references, revisions, remotes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Run as if started in this directory
    #[arg(short = 'C', global = true, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty repository, or reopen an existing one
    Init(InitArgs),
    /// Show an object's type, size, or contents
    CatFile(CatFileArgs),
    /// Compute an object id, optionally storing the object
    HashObject(HashObjectArgs),
    /// Resolve revision expressions to object ids
    RevParse(RevParseArgs),
    /// List the contents of a tree
    LsTree(LsTreeArgs),
    /// List references
    ShowRef(ShowRefArgs),
    /// Read or set a symbolic reference
    SymbolicRef(SymbolicRefArgs),
    /// Create, move, or delete a reference
    UpdateRef(UpdateRefArgs),
    /// Create, list, or delete tags
    Tag(TagArgs),
    /// Create, list, rename, or delete branches
    Branch(BranchArgs),
    /// List the references a remote advertises
    LsRemote(LsRemoteArgs),
    /// Manage configured remotes
    Remote(RemoteArgs),
    /// Get or set configuration values
    Config(ConfigArgs),
    /// List commits reachable from revisions
    RevList(RevListArgs),
    /// Show commit history
    Log(LogArgs),
    /// Move loose references into packed-refs
    PackRefs,
}

#[derive(Args)]
pub struct InitArgs {
    pub path: Option<PathBuf>,
    #[arg(long)]
    pub bare: bool,
    #[arg(short = 'b', long = "initial-branch")]
    pub initial_branch: Option<String>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct CatFileMode {
    /// Print the object type
    #[arg(short = 't')]
    pub kind: bool,
    /// Print the object size
    #[arg(short = 's')]
    pub size: bool,
    /// Pretty-print the object
    #[arg(short = 'p')]
    pub pretty: bool,
    /// Exit with status 0 if the object exists
    #[arg(short = 'e')]
    pub exists: bool,
}

#[derive(Args)]
pub struct CatFileArgs {
    #[command(flatten)]
    pub mode: CatFileMode,
    pub object: String,
}

#[derive(Args)]
pub struct HashObjectArgs {
    #[arg(short = 't', default_value = "blob")]
    pub kind: String,
    /// Write the object into the object database
    #[arg(short = 'w')]
    pub write: bool,
    /// Read the object from standard input
    #[arg(long)]
    pub stdin: bool,
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct RevParseArgs {
    #[arg(required = true)]
    pub revs: Vec<String>,
    /// Print abbreviated ids
    #[arg(long)]
    pub short: bool,
}

#[derive(Args)]
pub struct LsTreeArgs {
    /// Recurse into subtrees
    #[arg(short = 'r')]
    pub recursive: bool,
    /// Show subtrees while recursing
    #[arg(short = 't')]
    pub show_trees: bool,
    /// Only print names
    #[arg(long)]
    pub name_only: bool,
    pub tree: String,
}

#[derive(Args)]
pub struct ShowRefArgs {
    #[arg(long)]
    pub heads: bool,
    #[arg(long)]
    pub tags: bool,
    /// Also show peeled tag values
    #[arg(short = 'd', long)]
    pub dereference: bool,
    /// Only show references matching these globs
    pub patterns: Vec<String>,
}

#[derive(Args)]
pub struct SymbolicRefArgs {
    pub name: String,
    pub target: Option<String>,
    #[arg(long)]
    pub short: bool,
}

#[derive(Args)]
pub struct UpdateRefArgs {
    /// Delete the reference
    #[arg(short = 'd')]
    pub delete: bool,
    pub name: String,
    pub new_value: Option<String>,
    /// Only update if the reference currently holds this value
    pub old_value: Option<String>,
}

#[derive(Args)]
pub struct TagArgs {
    pub name: Option<String>,
    /// Object to tag (defaults to HEAD)
    pub target: Option<String>,
    /// Create an annotated tag
    #[arg(short = 'a')]
    pub annotate: bool,
    #[arg(short, long)]
    pub message: Option<String>,
    #[arg(short, long)]
    pub force: bool,
    #[arg(short = 'd', long)]
    pub delete: bool,
    /// List tags matching a glob
    #[arg(short = 'l', long, num_args = 0..=1, default_missing_value = "*")]
    pub list: Option<String>,
}

#[derive(Args)]
pub struct BranchArgs {
    pub name: Option<String>,
    /// Start point (defaults to HEAD), or new name with -m
    pub start: Option<String>,
    #[arg(short, long)]
    pub force: bool,
    #[arg(short = 'd', long)]
    pub delete: bool,
    #[arg(short = 'm', long = "move")]
    pub rename: bool,
    /// Act on remote-tracking branches
    #[arg(short = 'r', long)]
    pub remotes: bool,
    /// List both local and remote-tracking branches
    #[arg(short = 'a', long)]
    pub all: bool,
}

#[derive(Args)]
pub struct LsRemoteArgs {
    /// Configured remote name or URL
    pub remote: String,
    #[arg(long)]
    pub heads: bool,
    #[arg(long)]
    pub tags: bool,
}

#[derive(Args)]
pub struct RemoteArgs {
    #[command(subcommand)]
    pub action: Option<RemoteAction>,
}

#[derive(Subcommand)]
pub enum RemoteAction {
    Add { name: String, url: String },
    Remove { name: String },
    /// Show a remote's URL and refspecs
    Show { name: String },
}

#[derive(Args)]
pub struct ConfigArgs {
    pub key: Option<String>,
    pub value: Option<String>,
    #[arg(short, long)]
    pub list: bool,
    #[arg(long)]
    pub unset: bool,
    /// Append a value instead of replacing
    #[arg(long)]
    pub add: bool,
    /// Print every value of a multi-valued key
    #[arg(long)]
    pub get_all: bool,
}

#[derive(Args)]
pub struct RevListArgs {
    /// Revisions to start from; `^rev` excludes, `a..b` is a range
    #[arg(required = true, allow_hyphen_values = true)]
    pub revs: Vec<String>,
    #[arg(long)]
    pub topo_order: bool,
    #[arg(long)]
    pub reverse: bool,
    #[arg(short = 'n', long = "max-count")]
    pub max_count: Option<usize>,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(default_value = "HEAD")]
    pub rev: String,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_plumbing_invocations() {
        let cli = Cli::parse_from(["oxgit", "-C", "/tmp/r", "--format", "json", "cat-file", "-p", "HEAD"]);
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/r")));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::CatFile(args) => {
                assert!(args.mode.pretty);
                assert_eq!(args.object, "HEAD");
            }
            _ => panic!("expected cat-file"),
        }

        let cli = Cli::parse_from(["oxgit", "rev-list", "--reverse", "-n", "3", "main", "^old"]);
        match cli.command {
            Command::RevList(args) => {
                assert_eq!(args.revs, ["main", "^old"]);
                assert_eq!(args.max_count, Some(3));
                assert!(args.reverse);
            }
            _ => panic!("expected rev-list"),
        }
    }

    #[test]
    fn cat_file_needs_exactly_one_mode() {
        assert!(Cli::try_parse_from(["oxgit", "cat-file", "HEAD"]).is_err());
        assert!(Cli::try_parse_from(["oxgit", "cat-file", "-t", "-s", "HEAD"]).is_err());
    }

    #[test]
    fn tag_list_pattern_is_optional() {
        let cli = Cli::parse_from(["oxgit", "tag", "-l"]);
        match cli.command {
            Command::Tag(args) => assert_eq!(args.list.as_deref(), Some("*")),
            _ => panic!("expected tag"),
        }
        let cli = Cli::parse_from(["oxgit", "remote", "-v"]);
        assert!(cli.verbose);
    }
}
