//! Ranking pipeline: comparator session, rank allocation, score
//! recalculation, and a single atomic commit per structural change.
//!
//! Per operation the engine walks
//! `Start -> Comparing -> PositionResolved -> PersistingInsertAndShift ->
//! RecalculatingScores -> Done`. Until the commit, all work happens on an
//! in-memory copy of the category, so aborting before it leaves the store
//! untouched.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::core::allocator::{self, Violation};
use crate::core::comparator::{self, ComparatorSession, Judge, Resolution, Step};
use crate::core::error::RankError;
use crate::core::model::{BookRef, RankedEntry, Scope};
use crate::core::scoring::{self, ScoreFormula};
use crate::core::store::RankedListStore;
use crate::core::tier::Tier;

/// Lifecycle of one ranking operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase
{
    Start,
    Comparing,
    PositionResolved,
    PersistingInsertAndShift,
    RecalculatingScores,
    Done,
}

/// An insertion whose position is not decided yet.
///
/// Holds the working copy of the category with any entry being replaced or
/// re-ranked already taken out, so that entry is never compared against,
/// shifted, or counted in a tier population.
#[derive(Debug, Clone)]
pub struct PendingInsert
{
    scope: Scope,
    working: Vec<RankedEntry>,
    entry: RankedEntry,
    replaced: Option<RankedEntry>,
}

impl PendingInsert
{
    /// Comparator session over the entry's tier-mates, best first
    pub fn session(&self) -> Step
    {
        ComparatorSession::start(allocator::tier_mates(&self.working, self.entry.tier))
    }

    pub fn entry(&self) -> &RankedEntry
    {
        &self.entry
    }

    pub fn scope(&self) -> &Scope
    {
        &self.scope
    }

    /// Previous version of the entry, if this insert overwrites one
    pub fn replaced(&self) -> Option<&RankedEntry>
    {
        self.replaced
            .as_ref()
    }

    /// Category as it stands without the entry being placed
    pub fn working(&self) -> &[RankedEntry]
    {
        &self.working
    }
}

/// Result of a completed insert or re-rank
#[derive(Debug, Clone)]
pub struct InsertOutcome
{
    /// The placed entry with its final rank and score
    pub entry: RankedEntry,
    /// The whole category after the change
    pub list: Vec<RankedEntry>,
    pub replaced: Option<RankedEntry>,
    pub comparisons: usize,
    pub skipped: bool,
}

/// One pre-ranked book from a bulk import
#[derive(Debug, Clone, Deserialize)]
pub struct ImportItem
{
    pub tier: Tier,
    /// 1-based position among the tier-mates after import
    pub position: usize,
    #[serde(flatten)]
    pub book: BookRef,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub finished_on: Option<NaiveDate>,
}

/// The ranking engine over a store
pub struct RankingEngine<S>
{
    store: S,
    formula: ScoreFormula,
}

impl<S: RankedListStore> RankingEngine<S>
{
    pub fn new(
        store: S,
        formula: ScoreFormula,
    ) -> Self
    {
        Self { store, formula }
    }

    pub fn store(&self) -> &S
    {
        &self.store
    }

    pub fn into_store(self) -> S
    {
        self.store
    }

    pub fn formula(&self) -> ScoreFormula
    {
        self.formula
    }

    /// Ordered, tier-grouped entries of a category
    pub fn ordered_list(
        &self,
        scope: &Scope,
    ) -> Result<Vec<RankedEntry>, RankError>
    {
        self.store
            .load(scope)
    }

    /// Prepare to place `draft` in `tier`.
    ///
    /// An existing entry with the same catalog key is taken out of the working
    /// copy first (upsert); it keeps its id and creation time.
    pub fn begin_insert(
        &self,
        mut draft: RankedEntry,
        tier: Tier,
    ) -> Result<PendingInsert, RankError>
    {
        let scope = draft.scope();
        let mut working = self
            .store
            .load(&scope)?;
        trace_phase(&scope, Phase::Start);

        draft.tier = tier;
        let existing = working
            .iter()
            .find(|e| e.book.key == draft.book.key)
            .map(|e| e.id.clone());
        let replaced = match existing
        {
            Some(id) => allocator::remove(&mut working, &id),
            None => None,
        };
        if let Some(old) = &replaced
        {
            info!(scope = %scope, key = %old.book.key, "catalog key already ranked, overwriting");
            draft.id = old
                .id
                .clone();
            draft.created_at = old.created_at;
            if draft.note.is_none()
            {
                draft.note = old
                    .note
                    .clone();
            }
            if draft.finished_on.is_none()
            {
                draft.finished_on = old.finished_on;
            }
        }

        Ok(PendingInsert { scope, working, entry: draft, replaced })
    }

    /// Prepare to move an existing entry into `tier`.
    ///
    /// The entry is removed before the tier-mate snapshot is taken.
    pub fn begin_rerank(
        &self,
        scope: &Scope,
        entry_id: &str,
        tier: Tier,
    ) -> Result<PendingInsert, RankError>
    {
        let mut working = self
            .store
            .load(scope)?;
        trace_phase(scope, Phase::Start);

        let old = allocator::remove(&mut working, entry_id)
            .ok_or_else(|| RankError::NotFound(entry_id.to_string()))?;
        let mut entry = old.clone();
        entry.tier = tier;
        entry.updated_at = Utc::now();

        Ok(PendingInsert { scope: scope.clone(), working, entry, replaced: Some(old) })
    }

    /// Place a pending entry at the resolved intra-tier index and persist the
    /// whole category in one commit.
    pub fn commit(
        &mut self,
        pending: PendingInsert,
        resolution: Resolution,
    ) -> Result<InsertOutcome, RankError>
    {
        let PendingInsert { scope, mut working, mut entry, replaced } = pending;
        trace_phase(&scope, Phase::PositionResolved);

        let position = allocator::absolute_position(&working, entry.tier, resolution.index);
        entry.updated_at = Utc::now();
        let id = entry
            .id
            .clone();

        trace_phase(&scope, Phase::PersistingInsertAndShift);
        allocator::insert_at(&mut working, entry, position);

        trace_phase(&scope, Phase::RecalculatingScores);
        scoring::recalculate(&mut working, self.formula);
        self.persist(&scope, &working)?;
        trace_phase(&scope, Phase::Done);

        let entry = working
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| RankError::persistence("placed entry missing after commit"))?;
        info!(
            scope = %scope,
            id = %entry.id,
            rank = entry.rank_position,
            score = entry.score,
            comparisons = resolution.comparisons,
            skipped = resolution.skipped,
            "entry ranked"
        );

        Ok(InsertOutcome {
            entry,
            list: working,
            replaced,
            comparisons: resolution.comparisons,
            skipped: resolution.skipped,
        })
    }

    /// Insert a new book, asking `judge` for comparisons against tier-mates
    #[instrument(level = "debug", skip_all, fields(key = %draft.book.key, tier = %tier))]
    pub fn insert<J: Judge + ?Sized>(
        &mut self,
        draft: RankedEntry,
        tier: Tier,
        judge: &mut J,
    ) -> Result<InsertOutcome, RankError>
    {
        let pending = self.begin_insert(draft, tier)?;
        let resolution = self.resolve(&pending, judge)?;
        self.commit(pending, resolution)
    }

    /// Move an entry to `tier`, re-running the comparator among its new tier-mates
    #[instrument(level = "debug", skip(self, scope, judge), fields(scope = %scope))]
    pub fn rerank<J: Judge + ?Sized>(
        &mut self,
        scope: &Scope,
        entry_id: &str,
        tier: Tier,
        judge: &mut J,
    ) -> Result<InsertOutcome, RankError>
    {
        let pending = self.begin_rerank(scope, entry_id, tier)?;
        let resolution = self.resolve(&pending, judge)?;
        self.commit(pending, resolution)
    }

    fn resolve<J: Judge + ?Sized>(
        &self,
        pending: &PendingInsert,
        judge: &mut J,
    ) -> Result<Resolution, RankError>
    {
        let step = pending.session();
        if matches!(step, Step::Compare(_))
        {
            trace_phase(&pending.scope, Phase::Comparing);
        }
        comparator::drive(step, &pending.entry.book, judge).inspect_err(|e| {
            if *e == RankError::SessionAborted
            {
                debug!(scope = %pending.scope, "session aborted, nothing written");
            }
        })
    }

    /// Remove an entry and close its slot
    #[instrument(level = "debug", skip(self, scope), fields(scope = %scope))]
    pub fn remove(
        &mut self,
        scope: &Scope,
        entry_id: &str,
    ) -> Result<Vec<RankedEntry>, RankError>
    {
        let mut working = self
            .store
            .load(scope)?;
        let removed = allocator::remove(&mut working, entry_id)
            .ok_or_else(|| RankError::NotFound(entry_id.to_string()))?;

        trace_phase(scope, Phase::RecalculatingScores);
        scoring::recalculate(&mut working, self.formula);
        self.persist(scope, &working)?;
        trace_phase(scope, Phase::Done);

        info!(scope = %scope, id = %removed.id, key = %removed.book.key, "entry removed");
        Ok(working)
    }

    /// Bulk path: place pre-ranked items without comparisons.
    ///
    /// Later items win over earlier ones with the same catalog key, and both
    /// win over rows already stored. Items are placed in (tier, position)
    /// order, then the category is rescored and committed once.
    #[instrument(level = "debug", skip(self, scope, items), fields(scope = %scope, items = items.len()))]
    pub fn import(
        &mut self,
        scope: &Scope,
        items: Vec<ImportItem>,
    ) -> Result<Vec<RankedEntry>, RankError>
    {
        if let Some(bad) = items
            .iter()
            .find(|i| i.position == 0)
        {
            return Err(RankError::validation(format!(
                "import position for '{}' must be 1 or greater",
                bad.book.key
            )));
        }

        let mut last_by_key: HashMap<String, usize> = HashMap::new();
        for (i, item) in items
            .iter()
            .enumerate()
        {
            last_by_key.insert(item.book.key.clone(), i);
        }
        let mut batch: Vec<(usize, ImportItem)> = items
            .into_iter()
            .enumerate()
            .filter(|(i, item)| last_by_key.get(&item.book.key) == Some(i))
            .collect();
        batch.sort_by_key(|(i, item)| (item.tier, item.position, *i));

        let mut working = self
            .store
            .load(scope)?;
        trace_phase(scope, Phase::PersistingInsertAndShift);
        for (_, item) in batch
        {
            let existing = working
                .iter()
                .find(|e| e.book.key == item.book.key)
                .map(|e| (e.id.clone(), e.created_at));
            let mut entry = RankedEntry::draft(scope, item.book, item.tier);
            if let Some((id, created_at)) = existing
            {
                allocator::remove(&mut working, &id);
                entry.id = id;
                entry.created_at = created_at;
            }
            entry.note = item.note;
            entry.finished_on = item.finished_on;

            let position = allocator::absolute_position(&working, item.tier, item.position - 1);
            allocator::insert_at(&mut working, entry, position);
        }

        trace_phase(scope, Phase::RecalculatingScores);
        scoring::recalculate(&mut working, self.formula);
        self.persist(scope, &working)?;
        trace_phase(scope, Phase::Done);

        info!(scope = %scope, total = working.len(), "import committed");
        Ok(working)
    }

    /// Structural violations currently persisted for a category
    pub fn check(
        &self,
        scope: &Scope,
    ) -> Result<Vec<Violation>, RankError>
    {
        let entries = self
            .store
            .load(scope)?;
        Ok(allocator::check(&entries, self.formula))
    }

    /// Full deterministic recompute from a fresh read: regroup by tier,
    /// renumber `1..N`, drop duplicate keys, rescore, commit.
    /// Idempotent, so always safe to retry.
    #[instrument(level = "debug", skip(self, scope), fields(scope = %scope))]
    pub fn repair(
        &mut self,
        scope: &Scope,
    ) -> Result<Vec<RankedEntry>, RankError>
    {
        let mut entries = self
            .store
            .load(scope)?;
        allocator::normalize(&mut entries);
        for dropped in allocator::dedupe_keys(&mut entries)
        {
            warn!(scope = %scope, id = %dropped.id, key = %dropped.book.key, "dropping duplicate entry");
        }
        scoring::recalculate(&mut entries, self.formula);
        self.store
            .commit(scope, &entries)?;
        info!(scope = %scope, total = entries.len(), "category recomputed");
        Ok(entries)
    }

    /// Commit, and on a failed write fall back to a full recompute from disk
    fn persist(
        &mut self,
        scope: &Scope,
        entries: &[RankedEntry],
    ) -> Result<(), RankError>
    {
        match self
            .store
            .commit(scope, entries)
        {
            Err(RankError::Persistence(msg)) =>
            {
                warn!(scope = %scope, error = %msg, "commit failed, recomputing category from store");
                if let Err(e) = self.repair(scope)
                {
                    warn!(scope = %scope, error = %e, "recompute after failed commit also failed");
                }
                Err(RankError::Persistence(msg))
            }
            other => other,
        }
    }
}

fn trace_phase(
    scope: &Scope,
    phase: Phase,
)
{
    debug!(scope = %scope, ?phase, "phase");
}
