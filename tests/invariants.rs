//! Property tests: any sequence of inserts, re-ranks, removals and aborted
//! sessions leaves every category structurally consistent.

mod util;

use proptest::prelude::*;
use shelfrank::core::comparator::{Answer, ScriptedJudge, max_comparisons};
use shelfrank::{RankError, Tier};

use util::{assert_consistent, draft, engine, scope};

#[derive(Debug, Clone)]
enum Op
{
    Insert
    {
        key: u8,
        tier: Tier,
        answers: Vec<Answer>,
    },
    Rerank
    {
        pick: usize,
        tier: Tier,
        answers: Vec<Answer>,
    },
    Remove
    {
        pick: usize,
    },
}

fn tier() -> impl Strategy<Value = Tier>
{
    prop_oneof![Just(Tier::Liked), Just(Tier::Fine), Just(Tier::Disliked)]
}

fn answer() -> impl Strategy<Value = Answer>
{
    prop_oneof![
        4 => Just(Answer::PreferNew),
        4 => Just(Answer::PreferExisting),
        1 => Just(Answer::Skip),
    ]
}

fn op() -> impl Strategy<Value = Op>
{
    // short answer scripts run dry on purpose, exercising aborts
    let answers = || prop::collection::vec(answer(), 0..6);
    prop_oneof![
        3 => (0u8..24, tier(), answers()).prop_map(|(key, tier, answers)| Op::Insert { key, tier, answers }),
        2 => (any::<usize>(), tier(), answers()).prop_map(|(pick, tier, answers)| Op::Rerank { pick, tier, answers }),
        1 => any::<usize>().prop_map(|pick| Op::Remove { pick }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn categories_stay_consistent(ops in prop::collection::vec(op(), 1..40))
    {
        let mut eng = engine();
        for op in ops
        {
            let before = eng.ordered_list(&scope()).unwrap();
            let result = match op
            {
                Op::Insert { key, tier, answers } =>
                {
                    let mates = before.iter().filter(|e| e.tier == tier && e.book.key != format!("b{key}")).count();
                    let out = eng.insert(draft(&format!("b{key}")), tier, &mut ScriptedJudge::new(answers));
                    if let Ok(out) = &out
                    {
                        prop_assert!(out.comparisons <= max_comparisons(mates));
                    }
                    out.map(|_| ())
                }
                Op::Rerank { pick, tier, answers } if !before.is_empty() =>
                {
                    let id = before[pick % before.len()].id.clone();
                    eng.rerank(&scope(), &id, tier, &mut ScriptedJudge::new(answers)).map(|_| ())
                }
                Op::Remove { pick } if !before.is_empty() =>
                {
                    let id = before[pick % before.len()].id.clone();
                    eng.remove(&scope(), &id).map(|_| ())
                }
                _ => Ok(()),
            };

            let after = eng.ordered_list(&scope()).unwrap();
            match result
            {
                Ok(()) => {}
                Err(RankError::SessionAborted) => prop_assert_eq!(&after, &before),
                Err(e) => prop_assert!(false, "unexpected error {e:?}"),
            }
            assert_consistent(&after);
        }
    }

    #[test]
    fn intra_tier_order_is_preserved_by_unrelated_inserts(
        seed in prop::collection::vec((tier(), prop::collection::vec(answer(), 6)), 2..12),
        extra in (tier(), prop::collection::vec(answer(), 6)),
    )
    {
        let mut eng = engine();
        for (i, (tier, answers)) in seed.into_iter().enumerate()
        {
            eng.insert(draft(&format!("s{i}")), tier, &mut ScriptedJudge::new(answers)).unwrap();
        }
        let before = eng.ordered_list(&scope()).unwrap();

        let (tier, answers) = extra;
        let out = eng.insert(draft("x"), tier, &mut ScriptedJudge::new(answers)).unwrap();

        // relative order of the books already present never changes
        let kept: Vec<&str> = out.list.iter().filter(|e| e.book.key != "x").map(|e| e.book.key.as_str()).collect();
        let prior: Vec<&str> = before.iter().map(|e| e.book.key.as_str()).collect();
        prop_assert_eq!(kept, prior);
    }
}
