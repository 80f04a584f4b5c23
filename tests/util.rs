//! Shared test utilities for integration tests
//!
//! Builds engines over in-memory stores and seeds categories through the
//! public API so every fixture goes through the real pipeline.

#![allow(dead_code)]

use shelfrank::core::allocator;
use shelfrank::core::comparator::{Answer, ScriptedJudge};
use shelfrank::core::engine::InsertOutcome;
use shelfrank::core::store::MemoryStore;
use shelfrank::{BookRef, Category, RankedEntry, RankingEngine, Scope, ScoreFormula, Tier};

/// The scope every fixture ranks into
pub fn scope() -> Scope
{
    Scope::new("ada", Category::Fiction)
}

pub fn engine() -> RankingEngine<MemoryStore>
{
    RankingEngine::new(MemoryStore::new(), ScoreFormula::Linear)
}

pub fn draft(key: &str) -> RankedEntry
{
    // Title mirrors the key so assertions can read either
    RankedEntry::draft(&scope(), BookRef::new(key, key, "Anon"), Tier::Liked)
}

/// Insert `key` at the bottom of `tier` (always prefer the existing book)
pub fn append(
    eng: &mut RankingEngine<MemoryStore>,
    key: &str,
    tier: Tier,
) -> InsertOutcome
{
    let mut judge = ScriptedJudge::new([Answer::PreferExisting; 16]);
    eng.insert(draft(key), tier, &mut judge)
        .expect("append")
}

/// Keys of the category in rank order
pub fn keys(entries: &[RankedEntry]) -> Vec<&str>
{
    entries
        .iter()
        .map(|e| e.book.key.as_str())
        .collect()
}

pub fn scores(entries: &[RankedEntry]) -> Vec<f64>
{
    entries
        .iter()
        .map(|e| e.score)
        .collect()
}

/// Assert invariants 1-4 plus key uniqueness
pub fn assert_consistent(entries: &[RankedEntry])
{
    let violations = allocator::check(entries, ScoreFormula::Linear);
    assert!(violations.is_empty(), "violations: {violations:?}");

    let mut positions: Vec<u32> = entries
        .iter()
        .map(|e| e.rank_position)
        .collect();
    positions.sort_unstable();
    let expected: Vec<u32> = (1..=entries.len() as u32).collect();
    assert_eq!(positions, expected);

    for pair in entries.windows(2)
    {
        assert!(pair[0].score >= pair[1].score, "scores must not increase down the list");
    }
}
