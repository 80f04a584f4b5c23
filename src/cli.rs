use std::path::PathBuf;

use chrono::NaiveDate;
use clap::error::ErrorKind;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::core::error::{RankError, exit_code_for};
use crate::core::tier::{Category, Tier};

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext
{
    pub quiet: bool,           // global --quiet
    pub no_color: bool,        // global --no-color
    pub dry_run: bool,         // global --dry-run
    pub store: Option<PathBuf>, // global --store
    pub user: Option<String>,  // global --user
}

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Rank the books you finish, one pairwise question at a time")]
#[command(version, long_about = None)]
pub struct Cli
{
    #[command(subcommand)]
    pub command: Commands,

    /// Rankings document to use instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Act on this user's rankings
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Compute and show the result without writing it
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli
{
    pub fn context(&self) -> AppContext
    {
        AppContext {
            quiet: self.quiet,
            no_color: self.no_color,
            dry_run: self.dry_run,
            store: self
                .store
                .clone(),
            user: self
                .user
                .clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands
{
    /// Rank a newly finished book
    Add(AddArgs),

    /// Move an existing entry to a (possibly different) tier and re-place it
    Rerank(RerankArgs),

    /// Remove an entry and close its slot
    Remove(RemoveArgs),

    /// Bulk import pre-ranked books from a JSON file
    Import(ImportArgs),

    /// Show a ranking
    List(ListArgs),

    /// Verify ranking invariants, optionally repairing them
    Check(CheckArgs),

    /// Initialize a shelfrank.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Generate a man page
    Man(ManArgs),
}

/// Exit code for a rejected command line.
///
/// Values our own parsers reject (tier, category, dates) are invalid input and
/// share the validation code; every other clap error keeps clap's code.
pub fn parse_error_exit_code(err: &clap::Error) -> i32
{
    match err.kind()
    {
        ErrorKind::ValueValidation => exit_code_for(&RankError::validation(err.to_string())),
        _ => err.exit_code(),
    }
}

pub fn parse_tier(s: &str) -> Result<Tier, RankError>
{
    s.parse()
}

pub fn parse_category(s: &str) -> Result<Category, RankError>
{
    s.parse()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat
{
    #[default]
    Text,
    Table,
    Json,
}

/// How comparisons are answered
#[derive(Debug, Clone, Args)]
pub struct JudgeArgs
{
    /// Pre-supplied answers instead of prompting: n (new is better),
    /// e (existing is better), s (too tough, skip), comma separated
    #[arg(long, value_name = "ANSWERS")]
    pub answers: Option<String>,
}

#[derive(Debug, Parser)]
pub struct AddArgs
{
    /// Catalog key of the book (e.g., an Open Library work id)
    pub key: String,

    /// Book title
    #[arg(long)]
    pub title: String,

    /// Book author
    #[arg(long)]
    pub author: String,

    /// Cover image reference
    #[arg(long)]
    pub cover: Option<String>,

    /// Ranking category
    #[arg(short, long, default_value = "fiction", value_parser = parse_category)]
    pub category: Category,

    /// Verdict: liked, fine, or disliked
    #[arg(short, long, value_parser = parse_tier)]
    pub tier: Tier,

    /// Free-text note
    #[arg(long)]
    pub note: Option<String>,

    /// Date you finished the book (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub finished: Option<NaiveDate>,

    #[command(flatten)]
    pub judge: JudgeArgs,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct RerankArgs
{
    /// Entry id (see `shelf list`)
    pub id: String,

    /// New verdict: liked, fine, or disliked
    #[arg(short, long, value_parser = parse_tier)]
    pub tier: Tier,

    #[command(flatten)]
    pub judge: JudgeArgs,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct RemoveArgs
{
    /// Entry id (see `shelf list`)
    pub id: String,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct ImportArgs
{
    /// JSON array of { category, tier, position, key, title, author, ... }
    pub file: PathBuf,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct ListArgs
{
    /// Only this category (default: all)
    #[arg(short, long, value_parser = parse_category)]
    pub category: Option<Category>,

    /// Only this tier
    #[arg(short, long, value_parser = parse_tier)]
    pub tier: Option<Tier>,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct CheckArgs
{
    /// Only this category (default: all)
    #[arg(short, long, value_parser = parse_category)]
    pub category: Option<Category>,

    /// Recompute categories that fail the check
    #[arg(long)]
    pub repair: bool,
}

#[derive(Debug, Parser)]
pub struct InitArgs
{
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell
{
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs
{
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}

#[derive(Debug, Parser)]
pub struct ManArgs
{
    /// Write shelf.1 into this directory instead of stdout
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}
