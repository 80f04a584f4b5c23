//! CLI command handlers for ranking, listing and repairing shelves.
//!
//! Interactive prompts go to stderr so `--format json` output on stdout stays
//! machine-readable.

use std::collections::BTreeMap;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use owo_colors::OwoColorize;
use serde::Deserialize;
use serde_json::json;
use tabled::{Table, Tabled, settings::Style};
use tracing::{debug, instrument};

use crate::cli::{
    AddArgs, AppContext, CheckArgs, ImportArgs, JudgeArgs, ListArgs, OutputFormat, RemoveArgs,
    RerankArgs,
};
use crate::core::comparator::{Judge, ScriptedJudge, TerminalJudge};
use crate::core::engine::{ImportItem, InsertOutcome, RankingEngine};
use crate::core::error::RankError;
use crate::core::model::{BookRef, RankedEntry, Scope};
use crate::core::store::{JsonStore, RankedListStore, ReadOnly};
use crate::core::tier::{Category, Tier};
use crate::infra::config::load_config;

/// Engine wired to the configured store, plus the acting user
pub struct Workspace
{
    pub engine: RankingEngine<Box<dyn RankedListStore>>,
    pub user: String,
    pub store_path: PathBuf,
}

impl Workspace
{
    /// Resolve config, flags and store for one command invocation
    pub fn open(ctx: &AppContext) -> Result<Self>
    {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let cfg = load_config(&cwd)?;
        let store_path = match &ctx.store
        {
            Some(p) => p.clone(),
            None => cfg.resolved_store_path()?,
        };
        let user = ctx
            .user
            .clone()
            .unwrap_or_else(|| {
                cfg.user
                    .clone()
            });
        if user
            .trim()
            .is_empty()
        {
            bail!(RankError::validation("user name must not be empty"));
        }

        let json = JsonStore::open(&store_path);
        let store: Box<dyn RankedListStore> = if ctx.dry_run
        {
            Box::new(ReadOnly(json))
        }
        else
        {
            Box::new(json)
        };
        debug!(store = %store_path.display(), %user, dry_run = ctx.dry_run, "workspace opened");

        Ok(Self { engine: RankingEngine::new(store, cfg.formula()?), user, store_path })
    }

    pub fn scope(
        &self,
        category: Category,
    ) -> Scope
    {
        Scope::new(self.user.clone(), category)
    }

    /// Scope of an existing entry, or `NotFound`
    fn locate(
        &self,
        id: &str,
    ) -> Result<Scope>
    {
        let entry = self
            .engine
            .store()
            .find(&self.user, id)?
            .ok_or_else(|| RankError::NotFound(id.to_string()))?;
        Ok(entry.scope())
    }
}

/// Build the judge: scripted when `--answers` is given, else prompt on stdin
fn make_judge(args: &JudgeArgs) -> Result<Box<dyn Judge>>
{
    match &args.answers
    {
        Some(script) => Ok(Box::new(ScriptedJudge::parse(script)?)),
        None =>
        {
            let stdin = io::stdin();
            if stdin.is_terminal()
            {
                eprintln!("Answer 1 or 2 for the book you enjoyed more.");
            }
            Ok(Box::new(TerminalJudge::new(stdin.lock(), io::stderr())))
        }
    }
}

#[instrument(skip_all, fields(key = %args.key))]
pub fn add(
    args: AddArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut ws = Workspace::open(ctx)?;
    let scope = ws.scope(args.category);

    let mut book = BookRef::new(args.key, args.title, args.author);
    book.cover = args.cover;
    let mut draft = RankedEntry::draft(&scope, book, args.tier);
    draft.note = args.note;
    draft.finished_on = args.finished;

    let mut judge = make_judge(&args.judge)?;
    let outcome = ws
        .engine
        .insert(draft, args.tier, judge.as_mut())?;
    print_outcome(&outcome, args.format, ctx)
}

#[instrument(skip_all, fields(id = %args.id))]
pub fn rerank(
    args: RerankArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut ws = Workspace::open(ctx)?;
    let scope = ws.locate(&args.id)?;
    let mut judge = make_judge(&args.judge)?;
    let outcome = ws
        .engine
        .rerank(&scope, &args.id, args.tier, judge.as_mut())?;
    print_outcome(&outcome, args.format, ctx)
}

pub fn remove(
    args: RemoveArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut ws = Workspace::open(ctx)?;
    let scope = ws.locate(&args.id)?;
    let list = ws
        .engine
        .remove(&scope, &args.id)?;

    if !ctx.quiet && args.format == OutputFormat::Text
    {
        println!("Removed {} from {scope}", args.id);
    }
    print_list(&list, args.format, ctx)
}

/// One line of an import file
#[derive(Debug, Deserialize)]
pub struct ImportRecord
{
    pub category: Category,
    #[serde(flatten)]
    pub item: ImportItem,
}

pub fn parse_import(text: &str) -> Result<BTreeMap<Category, Vec<ImportItem>>>
{
    let records: Vec<ImportRecord> =
        serde_json::from_str(text).map_err(|e| RankError::validation(format!("import file: {e}")))?;
    let mut grouped: BTreeMap<Category, Vec<ImportItem>> = BTreeMap::new();
    for r in records
    {
        grouped
            .entry(r.category)
            .or_default()
            .push(r.item);
    }
    Ok(grouped)
}

#[instrument(skip_all, fields(file = %args.file.display()))]
pub fn import(
    args: ImportArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read import file {}", args.file.display()))?;
    let grouped = parse_import(&text)?;
    let mut ws = Workspace::open(ctx)?;

    let mut all = Vec::new();
    for (category, items) in grouped
    {
        let scope = ws.scope(category);
        let count = items.len();
        let list = ws
            .engine
            .import(&scope, items)?;
        if !ctx.quiet && args.format == OutputFormat::Text
        {
            println!("Imported {count} into {scope} ({} total)", list.len());
        }
        all.extend(list);
    }
    print_list(&all, args.format, ctx)
}

pub fn list(
    args: ListArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let ws = Workspace::open(ctx)?;
    let categories: Vec<Category> = match args.category
    {
        Some(c) => vec![c],
        None => Category::ALL.to_vec(),
    };

    let mut all = Vec::new();
    for category in categories
    {
        let entries = ws
            .engine
            .ordered_list(&ws.scope(category))?;
        all.extend(
            entries
                .into_iter()
                .filter(|e| args.tier.is_none_or(|t| e.tier == t)),
        );
    }
    print_list(&all, args.format, ctx)
}

pub fn check(
    args: CheckArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut ws = Workspace::open(ctx)?;
    let categories: Vec<Category> = match args.category
    {
        Some(c) => vec![c],
        None => Category::ALL.to_vec(),
    };

    let mut outstanding = 0;
    for category in categories
    {
        let scope = ws.scope(category);
        let violations = ws
            .engine
            .check(&scope)?;
        if violations.is_empty()
        {
            if !ctx.quiet
            {
                println!("{scope}: ok");
            }
            continue;
        }

        for v in &violations
        {
            println!("{scope}: {v}");
        }
        if args.repair
        {
            let list = ws
                .engine
                .repair(&scope)?;
            println!("{scope}: repaired ({} entries)", list.len());
        }
        else
        {
            outstanding += violations.len();
        }
    }

    if outstanding > 0
    {
        bail!("{outstanding} violation(s) found; rerun with --repair");
    }
    Ok(())
}

fn print_outcome(
    outcome: &InsertOutcome,
    format: OutputFormat,
    ctx: &AppContext,
) -> Result<()>
{
    match format
    {
        OutputFormat::Json =>
        {
            let v = json!({
                "entry": outcome.entry,
                "comparisons": outcome.comparisons,
                "skipped": outcome.skipped,
                "replaced": outcome.replaced.as_ref().map(|r| &r.id),
                "list": outcome.list,
            });
            println!("{}", serde_json::to_string_pretty(&v)?);
            Ok(())
        }
        _ =>
        {
            if !ctx.quiet
            {
                let e = &outcome.entry;
                let verb = if outcome.replaced.is_some() { "Re-ranked" } else { "Ranked" };
                println!(
                    "{verb} {} at #{} with {:.1} ({} comparison{}{})",
                    e.book.title,
                    e.rank_position,
                    e.score,
                    outcome.comparisons,
                    if outcome.comparisons == 1 { "" } else { "s" },
                    if outcome.skipped { ", skipped" } else { "" }
                );
            }
            print_list(&outcome.list, format, ctx)
        }
    }
}

fn print_list(
    entries: &[RankedEntry],
    format: OutputFormat,
    ctx: &AppContext,
) -> Result<()>
{
    match format
    {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Table => println!("{}", render_table(entries, !ctx.no_color)),
        OutputFormat::Text =>
        {
            if !ctx.quiet
            {
                print!("{}", render_text(entries, !ctx.no_color));
            }
        }
    }
    Ok(())
}

fn paint_tier(
    tier: Tier,
    color: bool,
) -> String
{
    if !color
    {
        return tier
            .as_str()
            .to_string();
    }
    match tier
    {
        Tier::Liked => tier
            .as_str()
            .green()
            .to_string(),
        Tier::Fine => tier
            .as_str()
            .yellow()
            .to_string(),
        Tier::Disliked => tier
            .as_str()
            .red()
            .to_string(),
    }
}

/// Plain listing grouped by category and tier
pub fn render_text(
    entries: &[RankedEntry],
    color: bool,
) -> String
{
    let mut out = String::new();
    for ((category, tier), group) in &entries
        .iter()
        .chunk_by(|e| (e.category, e.tier))
    {
        let group: Vec<_> = group.collect();
        out.push_str(&format!("{category} / {} ({})\n", paint_tier(tier, color), group.len()));
        for e in group
        {
            out.push_str(&format!(
                "{:>4}. {:>4.1}  {} by {}  [{}]\n",
                e.rank_position, e.score, e.book.title, e.book.author, e.id
            ));
        }
    }
    out
}

#[derive(Tabled)]
struct Row
{
    #[tabled(rename = "#")]
    rank: u32,
    category: String,
    tier: String,
    score: String,
    title: String,
    author: String,
    id: String,
}

/// Table listing
pub fn render_table(
    entries: &[RankedEntry],
    color: bool,
) -> String
{
    let rows = entries
        .iter()
        .map(|e| Row {
            rank: e.rank_position,
            category: e
                .category
                .to_string(),
            tier: paint_tier(e.tier, color),
            score: format!("{:.1}", e.score),
            title: e
                .book
                .title
                .clone(),
            author: e
                .book
                .author
                .clone(),
            id: e
                .id
                .clone(),
        });
    Table::new(rows)
        .with(Style::rounded())
        .to_string()
}
