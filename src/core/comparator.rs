//! Interactive binary insertion over tier-mates.
//!
//! A [`ComparatorSession`] is a plain value: every answer consumes it and
//! yields the next [`Step`]. Nothing is written until the caller commits the
//! final [`Resolution`], so dropping a session at any point is a no-op.
//!
//! Skip policy: "too tough to decide" resolves to `floor((low + high) / 2)` of
//! the current window, the midpoint of the remaining uncertainty. It is
//! deterministic; identical answer prefixes always skip to the same index.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::str::FromStr;

use tracing::{debug, trace, warn};

use crate::core::error::RankError;
use crate::core::model::{BookRef, RankedEntry};

/// A single pairwise judgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer
{
    /// The new book is better than the one shown
    PreferNew,
    /// The existing book is better
    PreferExisting,
    /// Stop comparing and take the midpoint of what is left
    Skip,
}

impl FromStr for Answer
{
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "n" | "new" | "1" => Ok(Answer::PreferNew),
            "e" | "existing" | "old" | "2" => Ok(Answer::PreferExisting),
            "s" | "skip" => Ok(Answer::Skip),
            other => Err(RankError::validation(format!("unrecognized answer '{other}'"))),
        }
    }
}

/// Final intra-tier index chosen by a session (or supplied by import)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution
{
    /// 0-based index among tier-mates, best first
    pub index: usize,
    /// Judgments actually answered
    pub comparisons: usize,
    pub skipped: bool,
}

impl Resolution
{
    /// Index known up front; no comparisons were made
    pub fn direct(index: usize) -> Self
    {
        Self { index, comparisons: 0, skipped: false }
    }
}

/// Binary-search window `[low, high)` over a snapshot of tier-mates
#[derive(Debug, Clone)]
pub struct ComparatorSession
{
    low: usize,
    high: usize,
    mates: Vec<RankedEntry>,
    comparisons: usize,
}

/// Outcome of a transition
#[derive(Debug, Clone)]
pub enum Step
{
    Compare(ComparatorSession),
    Resolved(Resolution),
}

impl ComparatorSession
{
    /// Open a session over `mates` (ordered best to worst).
    /// With no tier-mates the index is 0 immediately.
    pub fn start(mates: Vec<RankedEntry>) -> Step
    {
        let high = mates.len();
        Self { low: 0, high, mates, comparisons: 0 }.settle()
    }

    fn settle(self) -> Step
    {
        if self.low >= self.high
        {
            Step::Resolved(Resolution {
                index: self.low,
                comparisons: self.comparisons,
                skipped: false,
            })
        }
        else
        {
            Step::Compare(self)
        }
    }

    fn mid(&self) -> usize
    {
        (self.low + self.high) / 2
    }

    /// Tier-mate the new book is weighed against next
    pub fn opponent(&self) -> &RankedEntry
    {
        &self.mates[self.mid()]
    }

    pub fn window(&self) -> (usize, usize)
    {
        (self.low, self.high)
    }

    pub fn comparisons(&self) -> usize
    {
        self.comparisons
    }

    /// Upper bound on the judgments still needed
    pub fn remaining(&self) -> usize
    {
        max_comparisons(self.high - self.low)
    }

    /// Apply one judgment
    pub fn answer(
        self,
        answer: Answer,
    ) -> Step
    {
        let mid = self.mid();
        trace!(low = self.low, high = self.high, mid, ?answer, "comparator step");
        match answer
        {
            Answer::PreferNew => Self { high: mid, comparisons: self.comparisons + 1, ..self }.settle(),
            Answer::PreferExisting =>
            {
                Self { low: mid + 1, comparisons: self.comparisons + 1, ..self }.settle()
            }
            Answer::Skip => Step::Resolved(Resolution {
                index: mid,
                comparisons: self.comparisons,
                skipped: true,
            }),
        }
    }
}

/// `ceil(log2(m + 1))`: worst-case judgments for `m` tier-mates
pub fn max_comparisons(m: usize) -> usize
{
    (usize::BITS - m.leading_zeros()) as usize
}

/// Source of live pairwise judgments
pub trait Judge
{
    /// Return the preferred side, or `SessionAborted` to cancel
    fn judge(
        &mut self,
        candidate: &BookRef,
        existing: &RankedEntry,
    ) -> Result<Answer, RankError>;
}

/// Run a session to completion against a judge
pub fn drive<J: Judge + ?Sized>(
    mut step: Step,
    candidate: &BookRef,
    judge: &mut J,
) -> Result<Resolution, RankError>
{
    loop
    {
        match step
        {
            Step::Resolved(resolution) => return Ok(resolution),
            Step::Compare(session) =>
            {
                let (low, high) = session.window();
                debug!(low, high, remaining = session.remaining(), "awaiting judgment");
                let answer = judge.judge(candidate, session.opponent())?;
                step = session.answer(answer);
            }
        }
    }
}

/// Pre-recorded answers; running out aborts the session
#[derive(Debug, Clone, Default)]
pub struct ScriptedJudge
{
    answers: VecDeque<Answer>,
}

impl ScriptedJudge
{
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self
    {
        Self { answers: answers.into_iter().collect() }
    }

    /// Parse `"n,e,s"` (commas or whitespace). Rejects malformed tokens.
    pub fn parse(script: &str) -> Result<Self, RankError>
    {
        let answers = script
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(Answer::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(answers))
    }

    pub fn remaining(&self) -> usize
    {
        self.answers.len()
    }
}

impl Judge for ScriptedJudge
{
    fn judge(
        &mut self,
        _candidate: &BookRef,
        _existing: &RankedEntry,
    ) -> Result<Answer, RankError>
    {
        self.answers
            .pop_front()
            .ok_or(RankError::SessionAborted)
    }
}

/// Line-oriented prompt; `q` or end of input aborts
pub struct TerminalJudge<R, W>
{
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalJudge<R, W>
{
    pub fn new(
        input: R,
        output: W,
    ) -> Self
    {
        Self { input, output }
    }

    fn ask(
        &mut self,
        candidate: &BookRef,
        existing: &RankedEntry,
    ) -> std::io::Result<Option<String>>
    {
        writeln!(self.output, "Which did you enjoy more?")?;
        writeln!(self.output, "  [1] {} by {} (new)", candidate.title, candidate.author)?;
        writeln!(
            self.output,
            "  [2] {} by {} (#{})",
            existing
                .book
                .title,
            existing
                .book
                .author,
            existing.rank_position
        )?;
        write!(self.output, "  [s] too tough to decide  [q] quit\n> ")?;
        self.output
            .flush()?;

        let mut line = String::new();
        if self
            .input
            .read_line(&mut line)?
            == 0
        {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl<R: BufRead, W: Write> Judge for TerminalJudge<R, W>
{
    fn judge(
        &mut self,
        candidate: &BookRef,
        existing: &RankedEntry,
    ) -> Result<Answer, RankError>
    {
        loop
        {
            let line = self
                .ask(candidate, existing)
                .map_err(|e| {
                    warn!(error = %e, "terminal unreadable, aborting session");
                    RankError::SessionAborted
                })?;
            let Some(line) = line
            else
            {
                return Err(RankError::SessionAborted);
            };
            let token = line.trim();
            if token.eq_ignore_ascii_case("q") || token.eq_ignore_ascii_case("quit")
            {
                return Err(RankError::SessionAborted);
            }
            match token.parse::<Answer>()
            {
                Ok(answer) => return Ok(answer),
                // Malformed input never advances the session
                Err(e) =>
                {
                    let _ = writeln!(self.output, "  {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::model::Scope;
    use crate::core::tier::{Category, Tier};

    fn mates(n: usize) -> Vec<RankedEntry>
    {
        let scope = Scope::new("ada", Category::Fiction);
        (0..n)
            .map(|i| {
                let mut e = RankedEntry::draft(
                    &scope,
                    BookRef::new(format!("k{i}"), format!("Book {i}"), "Anon"),
                    Tier::Liked,
                );
                e.rank_position = i as u32 + 1;
                e
            })
            .collect()
    }

    fn resolve(
        n: usize,
        answers: &[Answer],
    ) -> Resolution
    {
        let candidate = BookRef::new("new", "New", "Anon");
        let mut judge = ScriptedJudge::new(answers.iter().copied());
        drive(ComparatorSession::start(mates(n)), &candidate, &mut judge).unwrap()
    }

    #[test]
    fn empty_tier_resolves_without_questions()
    {
        let r = resolve(0, &[]);
        assert_eq!(r, Resolution { index: 0, comparisons: 0, skipped: false });
    }

    #[test]
    fn always_preferring_new_lands_at_top()
    {
        let r = resolve(7, &[Answer::PreferNew; 3]);
        assert_eq!(r.index, 0);
        assert_eq!(r.comparisons, 3);
    }

    #[test]
    fn always_preferring_existing_lands_at_bottom()
    {
        let r = resolve(5, &[Answer::PreferExisting; 3]);
        assert_eq!(r.index, 5);
        assert!(r.comparisons <= max_comparisons(5));
    }

    #[test]
    fn skip_takes_current_midpoint()
    {
        // [0,6) -> existing at 3 -> [4,6) -> skip picks 5
        let r = resolve(6, &[Answer::PreferExisting, Answer::Skip]);
        assert_eq!(r, Resolution { index: 5, comparisons: 1, skipped: true });

        // skipping immediately picks the middle of the whole tier
        let r = resolve(6, &[Answer::Skip]);
        assert_eq!(r.index, 3);
    }

    #[test]
    fn max_comparisons_matches_ceil_log2()
    {
        let expect = |m: usize| ((m + 1) as f64).log2().ceil() as usize;
        for m in 0..200
        {
            assert_eq!(max_comparisons(m), expect(m), "m={m}");
        }
    }

    #[test]
    fn scripted_judge_rejects_malformed_tokens()
    {
        assert!(ScriptedJudge::parse("n, e,s").is_ok());
        assert!(matches!(ScriptedJudge::parse("n,maybe"), Err(RankError::Validation(_))));
    }

    #[test]
    fn running_out_of_script_aborts()
    {
        let candidate = BookRef::new("new", "New", "Anon");
        let mut judge = ScriptedJudge::new([Answer::PreferNew]);
        let err = drive(ComparatorSession::start(mates(4)), &candidate, &mut judge).unwrap_err();
        assert_eq!(err, RankError::SessionAborted);
    }

    #[test]
    fn window_narrows_and_remaining_shrinks()
    {
        let Step::Compare(session) = ComparatorSession::start(mates(7))
        else
        {
            panic!("seven tier-mates need a comparison");
        };
        assert_eq!(session.window(), (0, 7));
        assert_eq!(session.remaining(), 3);
        assert_eq!(session.opponent().book.key, "k3");

        let Step::Compare(session) = session.answer(Answer::PreferExisting)
        else
        {
            panic!("window [4,7) is still open");
        };
        assert_eq!(session.window(), (4, 7));
        assert_eq!(session.remaining(), 2);
        assert_eq!(session.comparisons(), 1);
    }

    struct Broken;

    impl std::io::Read for Broken
    {
        fn read(
            &mut self,
            _buf: &mut [u8],
        ) -> std::io::Result<usize>
        {
            Err(std::io::Error::other("terminal gone"))
        }
    }

    #[test]
    fn unreadable_terminal_aborts_instead_of_rejecting_input()
    {
        let candidate = BookRef::new("new", "New", "Anon");
        let mut judge = TerminalJudge::new(std::io::BufReader::new(Broken), Vec::new());
        let err = drive(ComparatorSession::start(mates(2)), &candidate, &mut judge).unwrap_err();
        assert_eq!(err, RankError::SessionAborted);
    }

    #[test]
    fn terminal_judge_reprompts_on_garbage_then_quits()
    {
        let input = std::io::Cursor::new("what\n2\nq\n");
        let mut out = Vec::new();
        let candidate = BookRef::new("new", "New", "Anon");
        let err = {
            let mut judge = TerminalJudge::new(input, &mut out);
            drive(ComparatorSession::start(mates(3)), &candidate, &mut judge).unwrap_err()
        };
        assert_eq!(err, RankError::SessionAborted);
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("unrecognized answer 'what'"));
        assert_eq!(shown.matches("Which did you enjoy more?").count(), 3);
    }
}
