//! Score recalculation over a whole category.
//!
//! Every structural change reruns [`recalculate`] over every entry, because
//! tier populations and intra-tier ranks of untouched entries can shift.
//! This is O(N) per operation, which holds up for personal rankings of a few
//! hundred books.

use serde::{Deserialize, Serialize};

use crate::core::error::RankError;
use crate::core::model::RankedEntry;
use crate::core::tier::Tier;

/// How scores are spread across a tier's band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "formula", rename_all = "lowercase")]
pub enum ScoreFormula
{
    /// Best in tier at band max, worst at band min, evenly spaced between
    Linear,
    /// Best in tier at band max; worst at `max - factor * width`, so with
    /// `factor < 1` the floor of the band is never reached
    Spread
    {
        factor: f64,
    },
}

impl Default for ScoreFormula
{
    fn default() -> Self
    {
        ScoreFormula::Linear
    }
}

impl ScoreFormula
{
    /// Reject spread factors outside `(0, 1]`
    pub fn validate(self) -> Result<Self, RankError>
    {
        match self
        {
            ScoreFormula::Spread { factor } if !(factor > 0.0 && factor <= 1.0) =>
            {
                Err(RankError::validation(format!("spread factor {factor} outside (0, 1]")))
            }
            other => Ok(other),
        }
    }
}

/// Round half away from zero to one decimal place
pub fn round1(x: f64) -> f64
{
    (x * 10.0).round() / 10.0
}

/// Score for the entry at 1-based `position_in_tier` among `population` tier-mates
pub fn score_for(
    tier: Tier,
    position_in_tier: usize,
    population: usize,
    formula: ScoreFormula,
) -> f64
{
    let band = tier.band();
    if population <= 1
    {
        return round1(band.midpoint());
    }

    let pos = position_in_tier.clamp(1, population);
    // 1.0 for the best in tier, 0.0 for the worst
    let fraction = (population - pos) as f64 / (population - 1) as f64;
    let raw = match formula
    {
        ScoreFormula::Linear => band.min + fraction * band.width(),
        ScoreFormula::Spread { factor } => band.max - (1.0 - fraction) * factor * band.width(),
    };
    band.clamp(round1(raw))
}

/// Recompute every score in an ordered category.
///
/// `entries` must already be sorted by `rank_position` and tier-grouped.
pub fn recalculate(
    entries: &mut [RankedEntry],
    formula: ScoreFormula,
)
{
    let mut populations = [0usize; 3];
    for e in entries.iter()
    {
        populations[tier_slot(e.tier)] += 1;
    }

    let mut seen = [0usize; 3];
    for e in entries.iter_mut()
    {
        let slot = tier_slot(e.tier);
        seen[slot] += 1;
        e.score = score_for(e.tier, seen[slot], populations[slot], formula);
    }
}

fn tier_slot(tier: Tier) -> usize
{
    match tier
    {
        Tier::Liked => 0,
        Tier::Fine => 1,
        Tier::Disliked => 2,
    }
}
