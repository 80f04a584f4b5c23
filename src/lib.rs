//! **shelfrank** - Personal book rankings built from pairwise judgments
//!
//! A newly finished book gets a tier verdict, is placed among its tier-mates by
//! binary insertion over live "which did you like more?" answers, and every
//! book in the category is then rescored inside its tier's fixed band.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion and man page generation
pub mod completion;

/// Ranking engine - tiers, comparator sessions, rank allocation and scoring
pub mod core {
    /// Error taxonomy and exit-code mapping
    pub mod error;
    pub use error::{RankError, exit_code_for};

    /// Tier classifier with fixed, disjoint score bands
    pub mod tier;
    pub use tier::{Category, Tier, TierBand, classify};

    /// Ranked entries, book references and ranking scopes
    pub mod model;
    pub use model::{BookRef, RankedEntry, Scope};

    /// Binary insertion driven by pairwise judgments
    pub mod comparator;
    pub use comparator::{Answer, ComparatorSession, Judge, Resolution, ScriptedJudge, Step};

    /// Absolute positions, shifting and consistency repair
    pub mod allocator;
    pub use allocator::Violation;

    /// Category-wide score recalculation
    pub mod scoring;
    pub use scoring::ScoreFormula;

    /// Ranked List Store contract (memory, JSON file, dry run)
    pub mod store;
    pub use store::{JsonStore, MemoryStore, RankedListStore, ReadOnly};

    /// Insert / re-rank / remove / import pipeline
    pub mod engine;
    pub use engine::{ImportItem, InsertOutcome, PendingInsert, Phase, RankingEngine};
}

/// CLI command handlers
pub mod cli_ext {
    /// add, rerank, remove, import, list and check
    pub mod rank_cmd;
}

/// Infrastructure - Configuration, logging and durable I/O
pub mod infra {
    /// Layered configuration with TOML support
    pub mod config;
    pub use self::config::{Config, init as config_init, load_config};

    /// tracing-subscriber setup
    pub mod logging;

    /// Atomic writes and advisory file locks
    pub mod io;
}

// Strategic re-exports for clean CLI interface
pub use crate::cli::{AppContext, Cli, Commands};
pub use crate::infra::{Config, load_config};

// Core types for external consumers
pub use crate::core::{
    BookRef, Category, RankError, RankedEntry, RankedListStore, RankingEngine, Scope,
    ScoreFormula, Tier,
};
