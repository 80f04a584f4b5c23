//! Error taxonomy for the ranking engine.
//!
//! Library code returns [`RankError`]; the binary maps it to exit codes with
//! [`exit_code_for`] and renders it through miette.

use miette::Diagnostic;

/// Domain-specific error taxonomy for the ranking pipeline
#[derive(thiserror::Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum RankError
{
    /// Unknown tier, unknown category, or malformed comparison answer.
    /// Always raised before any state change.
    #[error("invalid input: {0}")]
    #[diagnostic(
        code(shelfrank::validation),
        help("tiers: liked, fine, disliked; categories: fiction, nonfiction; answers: n, e, s")
    )]
    Validation(String),

    /// The (user, category, catalog key) uniqueness constraint would be broken
    #[error("entry for '{key}' already exists in {scope}")]
    #[diagnostic(code(shelfrank::conflict))]
    Conflict
    {
        scope: String,
        key: String,
    },

    /// A write failed while shifting or rescoring a category
    #[error("persistence failure: {0}")]
    #[diagnostic(
        code(shelfrank::persistence),
        help("run `shelf check --repair` to recompute the category from disk")
    )]
    Persistence(String),

    /// The caller cancelled a comparator session; nothing was written
    #[error("ranking session aborted")]
    #[diagnostic(code(shelfrank::aborted))]
    SessionAborted,

    /// Referenced entry does not exist for this user
    #[error("no entry with id '{0}'")]
    #[diagnostic(code(shelfrank::not_found), help("use `shelf list` to see entry ids"))]
    NotFound(String),
}

impl RankError
{
    pub fn validation(msg: impl Into<String>) -> Self
    {
        RankError::Validation(msg.into())
    }

    pub fn persistence(msg: impl std::fmt::Display) -> Self
    {
        RankError::Persistence(msg.to_string())
    }
}

impl From<std::io::Error> for RankError
{
    fn from(e: std::io::Error) -> Self
    {
        RankError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for RankError
{
    fn from(e: serde_json::Error) -> Self
    {
        RankError::Persistence(format!("store document: {e}"))
    }
}

/// Converts errors to CLI exit codes
/// 0=success, 2=conflict, 3=invalid, 4=persistence, 130=aborted
pub fn exit_code_for(e: &RankError) -> i32
{
    match e
    {
        RankError::Conflict { .. } => 2,
        RankError::Validation(_) | RankError::NotFound(_) => 3,
        RankError::Persistence(_) => 4,
        RankError::SessionAborted => 130,
    }
}
