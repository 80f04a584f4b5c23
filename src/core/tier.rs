//! Tier classification and fixed score bands.
//!
//! A verdict maps to exactly one [`Tier`]; each tier owns a closed, disjoint
//! [`TierBand`]. Bands are compile-time constants and never change at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::RankError;

/// Closed numeric interval `[min, max]` a tier's scores must stay within
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierBand
{
    pub min: f64,
    pub max: f64,
}

impl TierBand
{
    pub const fn new(
        min: f64,
        max: f64,
    ) -> Self
    {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f64
    {
        (self.min + self.max) / 2.0
    }

    pub fn width(&self) -> f64
    {
        self.max - self.min
    }

    pub fn contains(
        &self,
        score: f64,
    ) -> bool
    {
        score >= self.min && score <= self.max
    }

    pub fn clamp(
        &self,
        score: f64,
    ) -> f64
    {
        score.clamp(self.min, self.max)
    }
}

const LIKED_BAND: TierBand = TierBand::new(7.0, 10.0);
const FINE_BAND: TierBand = TierBand::new(3.5, 6.5);
const DISLIKED_BAND: TierBand = TierBand::new(0.0, 3.0);

/// Qualitative verdict, ordered best to worst.
///
/// The derived `Ord` follows declaration order, so `Liked < Fine < Disliked`
/// sorts entries best tier first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier
{
    Liked,
    Fine,
    Disliked,
}

impl Tier
{
    /// All tiers, best first
    pub const ALL: [Tier; 3] = [Tier::Liked, Tier::Fine, Tier::Disliked];

    pub fn band(self) -> TierBand
    {
        match self
        {
            Tier::Liked => LIKED_BAND,
            Tier::Fine => FINE_BAND,
            Tier::Disliked => DISLIKED_BAND,
        }
    }

    /// True when `self` ranks strictly above `other`
    pub fn better_than(
        self,
        other: Tier,
    ) -> bool
    {
        self < other
    }

    pub fn as_str(self) -> &'static str
    {
        match self
        {
            Tier::Liked => "liked",
            Tier::Fine => "fine",
            Tier::Disliked => "disliked",
        }
    }
}

impl fmt::Display for Tier
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier
{
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        classify(s)
    }
}

/// Map a verdict string to its tier. Unknown verdicts are rejected.
pub fn classify(verdict: &str) -> Result<Tier, RankError>
{
    match verdict
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "liked" | "like" | "l" | "good" => Ok(Tier::Liked),
        "fine" | "f" | "ok" | "okay" => Ok(Tier::Fine),
        "disliked" | "dislike" | "d" | "bad" => Ok(Tier::Disliked),
        other => Err(RankError::validation(format!("unknown tier '{other}'"))),
    }
}

/// Ranking scope partition; rankings never mix categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category
{
    Fiction,
    Nonfiction,
}

impl Category
{
    pub const ALL: [Category; 2] = [Category::Fiction, Category::Nonfiction];

    pub fn as_str(self) -> &'static str
    {
        match self
        {
            Category::Fiction => "fiction",
            Category::Nonfiction => "nonfiction",
        }
    }
}

impl fmt::Display for Category
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category
{
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "fiction" => Ok(Category::Fiction),
            "nonfiction" | "non-fiction" => Ok(Category::Nonfiction),
            other => Err(RankError::validation(format!("unknown category '{other}'"))),
        }
    }
}
