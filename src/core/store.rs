//! Ranked List Store contract and implementations.
//!
//! A store persists, per (user, category), the ordered entry set. `commit`
//! replaces a whole category in one atomic unit; partial category states are
//! never written.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::error::RankError;
use crate::core::model::{RankedEntry, Scope};
use crate::core::tier::Category;
use crate::infra::io::{with_exclusive_lock, with_shared_lock, write_atomic};

/// Current on-disk document version
pub const STORE_VERSION: u32 = 1;

/// Persistence seam for the ranking engine
pub trait RankedListStore
{
    /// Entries of one category, ordered by `rank_position`
    fn load(
        &self,
        scope: &Scope,
    ) -> Result<Vec<RankedEntry>, RankError>;

    /// Atomically replace every entry of `scope` with `entries`
    fn commit(
        &mut self,
        scope: &Scope,
        entries: &[RankedEntry],
    ) -> Result<(), RankError>;

    /// Locate an entry by id across all of the user's categories
    fn find(
        &self,
        user: &str,
        id: &str,
    ) -> Result<Option<RankedEntry>, RankError>
    {
        for category in Category::ALL
        {
            let scope = Scope::new(user, category);
            if let Some(e) = self
                .load(&scope)?
                .into_iter()
                .find(|e| e.id == id)
            {
                return Ok(Some(e));
            }
        }
        Ok(None)
    }
}

impl<S: RankedListStore + ?Sized> RankedListStore for Box<S>
{
    fn load(
        &self,
        scope: &Scope,
    ) -> Result<Vec<RankedEntry>, RankError>
    {
        (**self).load(scope)
    }

    fn commit(
        &mut self,
        scope: &Scope,
        entries: &[RankedEntry],
    ) -> Result<(), RankError>
    {
        (**self).commit(scope, entries)
    }
}

/// Enforce the row contract before anything is written: every entry belongs
/// to `scope` and catalog keys are unique within it.
pub fn validate_rows(
    scope: &Scope,
    entries: &[RankedEntry],
) -> Result<(), RankError>
{
    let mut keys = HashSet::with_capacity(entries.len());
    for e in entries
    {
        if e.user != scope.user || e.category != scope.category
        {
            return Err(RankError::validation(format!(
                "entry {} belongs to {}, not {scope}",
                e.id,
                e.scope()
            )));
        }
        if !keys.insert(
            e.book
                .key
                .as_str(),
        )
        {
            return Err(RankError::Conflict {
                scope: scope.to_string(),
                key: e
                    .book
                    .key
                    .clone(),
            });
        }
    }
    Ok(())
}

fn sorted(mut entries: Vec<RankedEntry>) -> Vec<RankedEntry>
{
    entries.sort_by_key(|e| e.rank_position);
    entries
}

/// In-process store, used by tests and as a scratch copy
#[derive(Debug, Clone, Default)]
pub struct MemoryStore
{
    categories: BTreeMap<Scope, Vec<RankedEntry>>,
}

impl MemoryStore
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Seed a category verbatim, bypassing validation (for repair tests)
    pub fn seed(
        &mut self,
        scope: Scope,
        entries: Vec<RankedEntry>,
    )
    {
        self.categories
            .insert(scope, entries);
    }
}

impl RankedListStore for MemoryStore
{
    fn load(
        &self,
        scope: &Scope,
    ) -> Result<Vec<RankedEntry>, RankError>
    {
        Ok(sorted(
            self.categories
                .get(scope)
                .cloned()
                .unwrap_or_default(),
        ))
    }

    fn commit(
        &mut self,
        scope: &Scope,
        entries: &[RankedEntry],
    ) -> Result<(), RankError>
    {
        validate_rows(scope, entries)?;
        self.categories
            .insert(scope.clone(), entries.to_vec());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument
{
    version: u32,
    entries: Vec<RankedEntry>,
}

impl Default for StoreDocument
{
    fn default() -> Self
    {
        Self { version: STORE_VERSION, entries: Vec::new() }
    }
}

/// Single JSON document holding every user's rankings.
///
/// Reads take a shared lock, commits take an exclusive lock around the whole
/// read-modify-write and replace the file atomically.
#[derive(Debug, Clone)]
pub struct JsonStore
{
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonStore
{
    pub fn open(path: impl Into<PathBuf>) -> Self
    {
        let path = path.into();
        let mut lock_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "rankings".into());
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    fn read_document(&self) -> Result<StoreDocument, RankError>
    {
        let text = match fs::read_to_string(&self.path)
        {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound =>
            {
                return Ok(StoreDocument::default());
            }
            Err(e) =>
            {
                return Err(RankError::persistence(format!(
                    "read {}: {e}",
                    self.path
                        .display()
                )));
            }
        };
        let doc: StoreDocument = serde_json::from_str(&text)?;
        if doc.version != STORE_VERSION
        {
            return Err(RankError::persistence(format!(
                "unsupported store version {} in {}",
                doc.version,
                self.path
                    .display()
            )));
        }
        Ok(doc)
    }
}

impl RankedListStore for JsonStore
{
    #[instrument(level = "debug", skip(self, scope), fields(scope = %scope))]
    fn load(
        &self,
        scope: &Scope,
    ) -> Result<Vec<RankedEntry>, RankError>
    {
        let doc = with_shared_lock(&self.lock_path, || self.read_document())?;
        let entries: Vec<RankedEntry> = doc
            .entries
            .into_iter()
            .filter(|e| e.user == scope.user && e.category == scope.category)
            .collect();
        debug!(count = entries.len(), "loaded category");
        Ok(sorted(entries))
    }

    #[instrument(level = "debug", skip(self, scope, entries), fields(scope = %scope, count = entries.len()))]
    fn commit(
        &mut self,
        scope: &Scope,
        entries: &[RankedEntry],
    ) -> Result<(), RankError>
    {
        validate_rows(scope, entries)?;
        with_exclusive_lock(&self.lock_path, || {
            let mut doc = self.read_document()?;
            doc.entries
                .retain(|e| !(e.user == scope.user && e.category == scope.category));
            doc.entries
                .extend(entries.iter().cloned());
            doc.entries
                .sort_by(|a, b| {
                    (&a.user, a.category, a.rank_position).cmp(&(&b.user, b.category, b.rank_position))
                });

            let text = serde_json::to_string_pretty(&doc)?;
            write_atomic(&self.path, text.as_bytes()).map_err(|e| {
                RankError::persistence(format!(
                    "write {}: {e}",
                    self.path
                        .display()
                ))
            })?;
            info!(path = %self.path.display(), "committed category");
            Ok(())
        })
    }
}

/// Dry-run wrapper: reads pass through, commits are discarded
#[derive(Debug, Clone)]
pub struct ReadOnly<S>(pub S);

impl<S: RankedListStore> RankedListStore for ReadOnly<S>
{
    fn load(
        &self,
        scope: &Scope,
    ) -> Result<Vec<RankedEntry>, RankError>
    {
        self.0
            .load(scope)
    }

    fn commit(
        &mut self,
        scope: &Scope,
        entries: &[RankedEntry],
    ) -> Result<(), RankError>
    {
        validate_rows(scope, entries)?;
        info!(scope = %scope, count = entries.len(), "dry run, commit discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::model::BookRef;
    use crate::core::tier::Tier;

    fn row(
        scope: &Scope,
        key: &str,
        rank: u32,
    ) -> RankedEntry
    {
        let mut e = RankedEntry::draft(scope, BookRef::new(key, key, "Anon"), Tier::Fine);
        e.rank_position = rank;
        e
    }

    #[test]
    fn duplicate_keys_are_a_conflict()
    {
        let scope = Scope::new("ada", Category::Fiction);
        let rows = vec![row(&scope, "k1", 1), row(&scope, "k1", 2)];
        let err = MemoryStore::new()
            .commit(&scope, &rows)
            .unwrap_err();
        assert!(matches!(err, RankError::Conflict { key, .. } if key == "k1"));
    }

    #[test]
    fn rows_from_another_scope_are_rejected()
    {
        let scope = Scope::new("ada", Category::Fiction);
        let other = Scope::new("ada", Category::Nonfiction);
        let err = MemoryStore::new()
            .commit(&scope, &[row(&other, "k1", 1)])
            .unwrap_err();
        assert!(matches!(err, RankError::Validation(_)));
    }

    #[test]
    fn read_only_never_writes()
    {
        let scope = Scope::new("ada", Category::Fiction);
        let mut store = ReadOnly(MemoryStore::new());
        store
            .commit(&scope, &[row(&scope, "k1", 1)])
            .unwrap();
        assert!(store.load(&scope).unwrap().is_empty());
    }

    #[test]
    fn json_store_keeps_categories_apart()
    {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(dir.path().join("rankings.json"));
        let fiction = Scope::new("ada", Category::Fiction);
        let nonfiction = Scope::new("ada", Category::Nonfiction);

        store
            .commit(&fiction, &[row(&fiction, "f1", 1), row(&fiction, "f2", 2)])
            .unwrap();
        store
            .commit(&nonfiction, &[row(&nonfiction, "n1", 1)])
            .unwrap();
        store
            .commit(&fiction, &[row(&fiction, "f2", 1)])
            .unwrap();

        let reopened = JsonStore::open(dir.path().join("rankings.json"));
        assert_eq!(reopened.load(&fiction).unwrap().len(), 1);
        assert_eq!(reopened.load(&nonfiction).unwrap().len(), 1);
        assert!(dir.path().join("rankings.json.lock").exists());
    }

    #[test]
    fn json_store_rejects_unknown_versions()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rankings.json");
        fs::write(&path, r#"{"version": 99, "entries": []}"#).unwrap();
        let err = JsonStore::open(&path)
            .load(&Scope::new("ada", Category::Fiction))
            .unwrap_err();
        assert!(matches!(err, RankError::Persistence(m) if m.contains("version 99")));
    }
}
