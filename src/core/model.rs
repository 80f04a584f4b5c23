//! Ranked entry data model shared by the engine and the store.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::tier::{Category, Tier};

/// Ranking partition key: one ordered list per (user, category)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope
{
    pub user: String,
    pub category: Category,
}

impl Scope
{
    pub fn new(
        user: impl Into<String>,
        category: Category,
    ) -> Self
    {
        Self { user: user.into(), category }
    }
}

impl fmt::Display for Scope
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        write!(f, "{}/{}", self.user, self.category)
    }
}

/// Book reference handed over by catalog lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRef
{
    /// Catalog key; unique per (user, category)
    pub key: String,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

impl BookRef
{
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self
    {
        Self { key: key.into(), title: title.into(), author: author.into(), cover: None }
    }
}

/// One persisted row of a user's ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry
{
    pub id: String,
    pub user: String,
    pub category: Category,
    pub tier: Tier,
    /// 1-based absolute position, contiguous across tiers
    pub rank_position: u32,
    pub score: f64,
    pub book: BookRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RankedEntry
{
    /// Fresh, unplaced entry; rank and score are assigned on commit
    pub fn draft(
        scope: &Scope,
        book: BookRef,
        tier: Tier,
    ) -> Self
    {
        let now = Utc::now();
        Self {
            id: generate_entry_id(),
            user: scope
                .user
                .clone(),
            category: scope.category,
            tier,
            rank_position: 0,
            score: tier
                .band()
                .midpoint(),
            book,
            note: None,
            finished_on: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn scope(&self) -> Scope
    {
        Scope::new(self.user.clone(), self.category)
    }
}

/// Generate a sortable, filesystem-safe entry ID.
pub fn generate_entry_id() -> String
{
    let ts = Utc::now()
        .format("%Y%m%d")
        .to_string();
    let alphabet = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let suffix: String = (0..8)
        .map(|_| {
            let idx = rng.random_range(0..alphabet.len());
            alphabet[idx] as char
        })
        .collect();
    format!("{ts}-{suffix}")
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn entry_ids_are_unique_and_dated()
    {
        let a = generate_entry_id();
        let b = generate_entry_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 17);
        assert!(a[..8].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn draft_starts_unplaced_inside_its_band()
    {
        let scope = Scope::new("ada", Category::Fiction);
        let e = RankedEntry::draft(&scope, BookRef::new("OL1W", "Dune", "Herbert"), Tier::Fine);
        assert_eq!(e.rank_position, 0);
        assert!(Tier::Fine.band().contains(e.score));
        assert_eq!(e.scope(), scope);
    }
}
