//! Failed commits, repair of inconsistent categories, and the on-disk store

mod util;

use std::cell::Cell;

use shelfrank::core::comparator::{Answer, ScriptedJudge};
use shelfrank::core::store::{JsonStore, MemoryStore, RankedListStore, ReadOnly};
use shelfrank::core::Violation;
use shelfrank::{BookRef, Category, RankError, RankedEntry, RankingEngine, Scope, ScoreFormula, Tier};
use tempfile::TempDir;

use util::{append, assert_consistent, draft, keys, scope, scores};

/// Memory store whose next N commits fail
#[derive(Default)]
struct Flaky
{
    inner: MemoryStore,
    fail_next: Cell<usize>,
}

impl RankedListStore for Flaky
{
    fn load(
        &self,
        scope: &Scope,
    ) -> Result<Vec<RankedEntry>, RankError>
    {
        self.inner
            .load(scope)
    }

    fn commit(
        &mut self,
        scope: &Scope,
        entries: &[RankedEntry],
    ) -> Result<(), RankError>
    {
        let left = self
            .fail_next
            .get();
        if left > 0
        {
            self.fail_next
                .set(left - 1);
            return Err(RankError::persistence("disk full"));
        }
        self.inner
            .commit(scope, entries)
    }
}

fn flaky_with(books: &[(&str, Tier)]) -> RankingEngine<Flaky>
{
    let mut eng = util::engine();
    for (k, t) in books
    {
        append(&mut eng, k, *t);
    }
    RankingEngine::new(Flaky { inner: eng.into_store(), fail_next: Cell::new(0) }, ScoreFormula::Linear)
}

#[test]
fn failed_commit_surfaces_persistence_and_keeps_previous_state()
{
    let mut eng = flaky_with(&[("a", Tier::Liked), ("b", Tier::Liked), ("f", Tier::Fine)]);
    let before = eng.ordered_list(&scope()).unwrap();

    eng.store()
        .fail_next
        .set(1);
    let err = eng
        .insert(draft("n"), Tier::Liked, &mut ScriptedJudge::new([Answer::PreferNew; 4]))
        .unwrap_err();

    assert!(matches!(err, RankError::Persistence(_)), "got {err:?}");
    let after = eng.ordered_list(&scope()).unwrap();
    assert_eq!(keys(&after), keys(&before));
    assert_eq!(scores(&after), scores(&before));
    assert_consistent(&after);
}

#[test]
fn failed_commit_and_failed_recompute_still_report_the_original_error()
{
    let mut eng = flaky_with(&[("a", Tier::Fine)]);
    let before = eng.ordered_list(&scope()).unwrap();
    let id = before[0]
        .id
        .clone();

    eng.store()
        .fail_next
        .set(2);
    let err = eng
        .remove(&scope(), &id)
        .unwrap_err();
    assert_eq!(err, RankError::persistence("disk full"));
    assert_eq!(eng.ordered_list(&scope()).unwrap(), before);
}

fn broken(
    key: &str,
    tier: Tier,
    rank: u32,
    score: f64,
) -> RankedEntry
{
    let mut e = RankedEntry::draft(&scope(), BookRef::new(key, key, "Anon"), tier);
    e.rank_position = rank;
    e.score = score;
    e
}

#[test]
fn repair_rebuilds_a_corrupted_category()
{
    let mut store = MemoryStore::new();
    store.seed(
        scope(),
        vec![
            broken("f", Tier::Fine, 1, 9.9),
            broken("a", Tier::Liked, 4, 7.0),
            broken("b", Tier::Liked, 7, 1.0),
            broken("a", Tier::Disliked, 9, 0.5),
        ],
    );
    let mut eng = RankingEngine::new(store, ScoreFormula::Linear);

    let violations = eng.check(&scope()).unwrap();
    assert!(violations.contains(&Violation::DuplicateKey { key: "a".into() }));
    assert!(
        violations
            .iter()
            .any(|v| matches!(v, Violation::TierOrder { .. }))
    );

    let repaired = eng.repair(&scope()).unwrap();
    assert_eq!(keys(&repaired), vec!["a", "b", "f"]);
    assert_eq!(scores(&repaired), vec![10.0, 7.0, 5.0]);
    assert_consistent(&repaired);
    assert!(eng.check(&scope()).unwrap().is_empty());

    // a second pass changes nothing
    let again = eng.repair(&scope()).unwrap();
    assert_eq!(again, repaired);
}

#[test]
fn duplicate_catalog_key_is_rejected_as_conflict()
{
    let mut store = MemoryStore::new();
    let rows = vec![broken("a", Tier::Liked, 1, 10.0), broken("a", Tier::Fine, 2, 5.0)];
    let err = store
        .commit(&scope(), &rows)
        .unwrap_err();
    assert_eq!(err, RankError::Conflict { scope: "ada/fiction".into(), key: "a".into() });
    assert!(store.load(&scope()).unwrap().is_empty());
}

#[test]
fn dry_run_store_computes_but_never_writes()
{
    let mut eng = util::engine();
    append(&mut eng, "a", Tier::Liked);
    let before = eng.ordered_list(&scope()).unwrap();

    let mut dry = RankingEngine::new(ReadOnly(eng.into_store()), ScoreFormula::Linear);
    let out = dry
        .insert(draft("n"), Tier::Liked, &mut ScriptedJudge::new([Answer::PreferNew]))
        .unwrap();
    assert_eq!(keys(&out.list), vec!["n", "a"]);
    assert_eq!(dry.ordered_list(&scope()).unwrap(), before);
}

#[test]
fn json_store_round_trips_through_disk()
{
    let tmp = TempDir::new().unwrap();
    let path = tmp
        .path()
        .join("nested/rankings.json");

    {
        let mut eng = RankingEngine::new(JsonStore::open(&path), ScoreFormula::Linear);
        let mut judge = ScriptedJudge::new([Answer::PreferExisting; 8]);
        for (k, t) in [("a", Tier::Liked), ("b", Tier::Fine), ("c", Tier::Liked)]
        {
            eng.insert(draft(k), t, &mut judge)
                .unwrap();
        }
        let other = Scope::new("ada", Category::Nonfiction);
        let essay = RankedEntry::draft(&other, BookRef::new("e", "Essays", "Montaigne"), Tier::Fine);
        eng.insert(essay, Tier::Fine, &mut judge)
            .unwrap();
    }
    assert!(path.exists());

    // a fresh handle sees the committed state
    let eng = RankingEngine::new(JsonStore::open(&path), ScoreFormula::Linear);
    let fiction = eng.ordered_list(&scope()).unwrap();
    assert_eq!(keys(&fiction), vec!["a", "c", "b"]);
    assert_eq!(scores(&fiction), vec![10.0, 7.0, 5.0]);
    assert_consistent(&fiction);

    let nonfiction = eng
        .ordered_list(&Scope::new("ada", Category::Nonfiction))
        .unwrap();
    assert_eq!(keys(&nonfiction), vec!["e"]);

    let found = eng
        .store()
        .find("ada", &nonfiction[0].id)
        .unwrap();
    assert_eq!(found.map(|e| e.category), Some(Category::Nonfiction));
}

#[test]
fn json_store_missing_file_reads_as_empty()
{
    let tmp = TempDir::new().unwrap();
    let store = JsonStore::open(
        tmp.path()
            .join("absent.json"),
    );
    assert!(store.load(&scope()).unwrap().is_empty());
}

#[test]
fn json_store_rejects_garbage_as_persistence_error()
{
    let tmp = TempDir::new().unwrap();
    let path = tmp
        .path()
        .join("rankings.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = JsonStore::open(&path)
        .load(&scope())
        .unwrap_err();
    assert!(matches!(err, RankError::Persistence(_)));
}
