//! Rank allocation: absolute positions, shifting, and consistency repair.
//!
//! All functions work on a category's entries held in memory, ordered by
//! `rank_position`. Callers persist the result in one commit, so a shifted but
//! unscored category is never observable.

use std::collections::HashSet;
use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::core::model::RankedEntry;
use crate::core::scoring::{ScoreFormula, score_for};
use crate::core::tier::Tier;

/// Ordered snapshot of the entries sharing `tier`
pub fn tier_mates(
    entries: &[RankedEntry],
    tier: Tier,
) -> Vec<RankedEntry>
{
    entries
        .iter()
        .filter(|e| e.tier == tier)
        .cloned()
        .collect()
}

/// `better-tier count + intra_index + 1`, with the index clamped to the tier size
pub fn absolute_position(
    entries: &[RankedEntry],
    tier: Tier,
    intra_index: usize,
) -> u32
{
    let better = entries
        .iter()
        .filter(|e| e
            .tier
            .better_than(tier))
        .count();
    let population = entries
        .iter()
        .filter(|e| e.tier == tier)
        .count();
    (better + intra_index.min(population) + 1) as u32
}

/// Shift every entry at or after `position` down by one and place `entry` there
pub fn insert_at(
    entries: &mut Vec<RankedEntry>,
    mut entry: RankedEntry,
    position: u32,
)
{
    for e in entries.iter_mut()
    {
        if e.rank_position >= position
        {
            e.rank_position += 1;
        }
    }
    entry.rank_position = position;
    let at = entries
        .iter()
        .position(|e| e.rank_position > position)
        .unwrap_or(entries.len());
    entries.insert(at, entry);
}

/// Take `id` out and close its slot. Returns the removed entry.
pub fn remove(
    entries: &mut Vec<RankedEntry>,
    id: &str,
) -> Option<RankedEntry>
{
    let idx = entries
        .iter()
        .position(|e| e.id == id)?;
    let removed = entries.remove(idx);
    for e in entries.iter_mut()
    {
        if e.rank_position > removed.rank_position
        {
            e.rank_position -= 1;
        }
    }
    Some(removed)
}

/// Deterministic repair: stable sort by (tier, current rank), then renumber `1..N`
pub fn normalize(entries: &mut [RankedEntry])
{
    entries.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then(
                a.rank_position
                    .cmp(&b.rank_position),
            )
    });
    for (i, e) in entries
        .iter_mut()
        .enumerate()
    {
        e.rank_position = i as u32 + 1;
    }
}

/// Drop later duplicates of a catalog key (the best-ranked copy survives) and
/// close the gaps they leave. Returns what was dropped.
pub fn dedupe_keys(entries: &mut Vec<RankedEntry>) -> Vec<RankedEntry>
{
    let mut seen = HashSet::new();
    let mut dropped = Vec::new();
    entries.retain(|e| {
        if seen.insert(
            e.book
                .key
                .clone(),
        )
        {
            true
        }
        else
        {
            dropped.push(e.clone());
            false
        }
    });
    for (i, e) in entries
        .iter_mut()
        .enumerate()
    {
        e.rank_position = i as u32 + 1;
    }
    dropped
}

/// A broken structural invariant found by [`check`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation
{
    /// Positions are not an exact permutation of `1..N`
    NonContiguous
    {
        expected: u32,
        found: u32,
    },
    /// A worse-tier entry sits above a better-tier entry
    TierOrder
    {
        above: String,
        below: String,
    },
    ScoreOutOfBand
    {
        id: String,
        score: f64,
    },
    /// Score differs from what recalculation would assign
    StaleScore
    {
        id: String,
        score: f64,
        expected: f64,
    },
    DuplicateKey
    {
        key: String,
    },
}

impl fmt::Display for Violation
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            Violation::NonContiguous { expected, found } =>
            {
                write!(f, "rank gap: expected position {expected}, found {found}")
            }
            Violation::TierOrder { above, below } =>
            {
                write!(f, "tier order: {above} ranks above better-tier {below}")
            }
            Violation::ScoreOutOfBand { id, score } =>
            {
                write!(f, "score {score} of {id} is outside its tier band")
            }
            Violation::StaleScore { id, score, expected } =>
            {
                write!(f, "score {score} of {id} should be {expected}")
            }
            Violation::DuplicateKey { key } => write!(f, "catalog key {key} appears twice"),
        }
    }
}

/// Check all structural invariants of one category.
///
/// Also catches non-increasing score violations, since scores are compared
/// against the canonical recalculation for the current order.
pub fn check(
    entries: &[RankedEntry],
    formula: ScoreFormula,
) -> Vec<Violation>
{
    let mut out = Vec::new();
    let ordered: Vec<&RankedEntry> = entries
        .iter()
        .sorted_by_key(|e| e.rank_position)
        .collect();

    for (i, e) in ordered
        .iter()
        .enumerate()
    {
        let expected = i as u32 + 1;
        if e.rank_position != expected
        {
            out.push(Violation::NonContiguous { expected, found: e.rank_position });
            break;
        }
    }

    for (a, b) in ordered
        .iter()
        .tuple_windows()
    {
        if b.tier
            .better_than(a.tier)
        {
            out.push(Violation::TierOrder { above: a.id.clone(), below: b.id.clone() });
        }
    }

    let mut keys = HashSet::new();
    for e in &ordered
    {
        if !keys.insert(
            e.book
                .key
                .as_str(),
        )
        {
            out.push(Violation::DuplicateKey { key: e.book.key.clone() });
        }
    }

    for e in &ordered
    {
        if !e
            .tier
            .band()
            .contains(e.score)
        {
            out.push(Violation::ScoreOutOfBand { id: e.id.clone(), score: e.score });
        }
    }

    for tier in Tier::ALL
    {
        let group: Vec<&RankedEntry> = ordered
            .iter()
            .copied()
            .filter(|e| e.tier == tier)
            .collect();
        let population = group.len();
        for (i, e) in group
            .iter()
            .enumerate()
        {
            let expected = score_for(tier, i + 1, population, formula);
            if (e.score - expected).abs() > 1e-9
            {
                out.push(Violation::StaleScore { id: e.id.clone(), score: e.score, expected });
            }
        }
    }

    out
}
