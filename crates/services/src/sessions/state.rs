use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;

use quiz_core::model::{AnswerMap, Question, QuestionId, SessionStreak};
use quiz_core::scoring::{ScoreReport, score_answers};

use super::progress::Progress;
use crate::error::{SessionError, TransitionError};

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a session; `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    InProgress,
    Completed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::InProgress => "in progress",
            SessionPhase::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Where a session picks up after a resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredState {
    pub questions: Vec<Question>,
    pub answers: AnswerMap,
    pub index: usize,
    pub revision: u64,
    pub started_at: DateTime<Utc>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state machine for one quiz run.
///
/// Every mutating call bumps `revision`; remote stores use it to discard
/// out-of-order writes.
#[derive(Debug, Clone)]
pub struct QuizSession {
    phase: SessionPhase,
    questions: Vec<Question>,
    index: usize,
    answers: AnswerMap,
    started_at: Option<DateTime<Utc>>,
    revision: u64,
    pass_threshold: u32,
    streak: SessionStreak,
    streak_counted: HashSet<QuestionId>,
    report: Option<ScoreReport>,
}

impl QuizSession {
    #[must_use]
    pub fn new(pass_threshold: u32) -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            questions: Vec::new(),
            index: 0,
            answers: AnswerMap::new(),
            started_at: None,
            revision: 0,
            pass_threshold,
            streak: SessionStreak::default(),
            streak_counted: HashSet::new(),
            report: None,
        }
    }

    /// Rebuild an in-progress session from a snapshot or a remote attempt.
    ///
    /// The index is clamped to the last question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if `state` has no questions.
    pub fn restore(state: RestoredState, pass_threshold: u32) -> Result<Self, SessionError> {
        if state.questions.is_empty() {
            return Err(SessionError::Empty);
        }
        let last = state.questions.len() - 1;
        Ok(Self {
            phase: SessionPhase::InProgress,
            index: state.index.min(last),
            questions: state.questions,
            answers: state.answers,
            started_at: Some(state.started_at),
            revision: state.revision,
            pass_threshold,
            streak: SessionStreak::default(),
            streak_counted: HashSet::new(),
            report: None,
        })
    }

    fn require(&self, op: &'static str, allowed: SessionPhase) -> Result<(), TransitionError> {
        if self.phase == allowed {
            Ok(())
        } else {
            Err(TransitionError {
                op,
                phase: self.phase,
            })
        }
    }

    fn bump(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }

    /// Begin the session with `questions`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Transition` unless the session is uninitialized,
    /// or `SessionError::Empty` for an empty question list.
    pub fn start(
        &mut self,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.require("start", SessionPhase::Uninitialized)?;
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        self.questions = questions;
        self.index = 0;
        self.answers = AnswerMap::new();
        self.report = None;
        self.started_at = Some(started_at);
        self.phase = SessionPhase::InProgress;
        self.bump();
        Ok(())
    }

    fn question(&self, id: &QuestionId) -> Result<&Question, SessionError> {
        self.questions
            .iter()
            .find(|q| q.id() == id)
            .ok_or_else(|| SessionError::UnknownQuestion(id.clone()))
    }

    fn check_options(question: &Question, selections: &[String]) -> Result<(), SessionError> {
        match selections.iter().find(|s| !question.has_option(s)) {
            Some(bad) => Err(SessionError::UnknownOption {
                question: question.id().clone(),
                option: bad.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Record a user's pick for a question without moving.
    ///
    /// Multi-select questions toggle each supplied option; single-select
    /// questions replace the selection.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Transition` outside `InProgress`,
    /// `SessionError::UnknownQuestion` or `SessionError::UnknownOption` for
    /// ids and options that are not part of the session.
    pub fn record_answer(
        &mut self,
        question_id: &QuestionId,
        selections: &[String],
    ) -> Result<(), SessionError> {
        self.require("record an answer", SessionPhase::InProgress)?;
        let question = self.question(question_id)?;
        Self::check_options(question, selections)?;
        let multi_select = question.is_multi_select();

        if multi_select {
            for option in selections {
                self.answers.toggle(question_id.clone(), option);
            }
            if selections.is_empty() && !self.answers.contains(question_id) {
                self.answers.set(question_id.clone(), Vec::new());
            }
        } else {
            self.answers.set(question_id.clone(), selections.to_vec());
        }
        self.count_streak(question_id);
        self.bump();
        Ok(())
    }

    /// Replace the whole selection for a question.
    ///
    /// # Errors
    ///
    /// Same as [`QuizSession::record_answer`].
    pub fn set_selections(
        &mut self,
        question_id: &QuestionId,
        selections: Vec<String>,
    ) -> Result<(), SessionError> {
        self.require("set selections", SessionPhase::InProgress)?;
        let question = self.question(question_id)?;
        Self::check_options(question, &selections)?;
        self.answers.set(question_id.clone(), selections);
        self.count_streak(question_id);
        self.bump();
        Ok(())
    }

    /// Feed a question's answer into the session streak, once per question.
    ///
    /// A single-select question counts on its first pick. A multi-select
    /// question counts once its selection is complete and correct, or as soon
    /// as it contains a wrong option.
    fn count_streak(&mut self, question_id: &QuestionId) {
        if self.streak_counted.contains(question_id) {
            return;
        }
        let Some(question) = self.questions.iter().find(|q| q.id() == question_id) else {
            return;
        };
        let selections = self.answers.get(question_id).unwrap_or_default();
        let verdict = if question.is_answered_correctly(selections) {
            Some(true)
        } else if question.is_multi_select() {
            selections
                .iter()
                .any(|s| !question.correct_answers().contains(s))
                .then_some(false)
        } else {
            (!selections.is_empty()).then_some(false)
        };
        if let Some(correct) = verdict {
            self.streak_counted.insert(question_id.clone());
            self.streak.record(correct);
        }
    }

    /// Move to the next question, completing the session past the last one.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` outside `InProgress`.
    pub fn advance(&mut self) -> Result<SessionPhase, TransitionError> {
        self.require("advance", SessionPhase::InProgress)?;
        if self.index + 1 >= self.questions.len() {
            self.finish();
        } else {
            self.index += 1;
        }
        self.bump();
        Ok(self.phase)
    }

    /// Step back one question; stays at the first question.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` before the session has started.
    pub fn retreat(&mut self) -> Result<(), TransitionError> {
        if self.phase == SessionPhase::Uninitialized {
            return Err(TransitionError {
                op: "go back",
                phase: self.phase,
            });
        }
        self.index = self.index.saturating_sub(1);
        self.bump();
        Ok(())
    }

    /// Complete the session now and compute its score.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` outside `InProgress`.
    pub fn complete(&mut self) -> Result<&ScoreReport, TransitionError> {
        self.require("complete", SessionPhase::InProgress)?;
        self.bump();
        Ok(self.finish())
    }

    fn finish(&mut self) -> &ScoreReport {
        self.phase = SessionPhase::Completed;
        let report = score_answers(&self.questions, &self.answers, self.pass_threshold);
        self.report.insert(report)
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn streak(&self) -> SessionStreak {
        self.streak
    }

    #[must_use]
    pub fn report(&self) -> Option<&ScoreReport> {
        self.report.as_ref()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            SessionPhase::Uninitialized => None,
            _ => self.questions.get(self.index),
        }
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::at(self.index, self.questions.len())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionDraft, TopicTag};
    use quiz_core::time::fixed_now;

    fn question(id: &str, correct: &[&str]) -> Question {
        QuestionDraft {
            id: id.into(),
            topic: TopicTag::Route,
            category: Default::default(),
            prompt: "P".into(),
            options: vec!["X".into(), "Y".into(), "Z".into()],
            correct_answers: correct.iter().map(|s| (*s).to_string()).collect(),
            explanation: None,
            image: None,
            difficulty: Default::default(),
        }
        .validate()
        .unwrap()
    }

    fn qid(s: &str) -> QuestionId {
        QuestionId::new(s).unwrap()
    }

    fn picks(opts: &[&str]) -> Vec<String> {
        opts.iter().map(|s| (*s).to_string()).collect()
    }

    fn started(questions: Vec<Question>) -> QuizSession {
        let mut s = QuizSession::new(1);
        s.start(questions, fixed_now()).unwrap();
        s
    }

    #[test]
    fn operations_before_start_are_transition_errors() {
        let mut s = QuizSession::new(1);
        assert!(matches!(
            s.record_answer(&qid("a"), &picks(&["X"])),
            Err(SessionError::Transition(_))
        ));
        assert_eq!(
            s.advance().unwrap_err(),
            TransitionError {
                op: "advance",
                phase: SessionPhase::Uninitialized
            }
        );
        assert!(s.retreat().is_err());
        assert!(s.complete().is_err());
        assert!(s.current_question().is_none());
    }

    #[test]
    fn empty_start_is_rejected() {
        let mut s = QuizSession::new(1);
        assert!(matches!(s.start(Vec::new(), fixed_now()), Err(SessionError::Empty)));
        assert_eq!(s.phase(), SessionPhase::Uninitialized);
    }

    #[test]
    fn advance_past_last_completes_and_keeps_index() {
        let mut s = started(vec![question("a", &["X"]), question("b", &["Y"])]);
        assert_eq!(s.advance().unwrap(), SessionPhase::InProgress);
        assert_eq!(s.index(), 1);
        assert_eq!(s.advance().unwrap(), SessionPhase::Completed);
        assert_eq!(s.index(), 1);
        assert!(s.report().is_some());
        assert!(s.advance().is_err());
        assert!(s.start(Vec::new(), fixed_now()).is_err());
    }

    #[test]
    fn retreat_floors_at_zero_and_keeps_completion() {
        let mut s = started(vec![question("a", &["X"])]);
        s.retreat().unwrap();
        assert_eq!(s.index(), 0);
        s.advance().unwrap();
        s.retreat().unwrap();
        assert!(s.is_complete());
    }

    #[test]
    fn multi_select_toggles_and_single_select_replaces() {
        let mut s = started(vec![question("m", &["X", "Y"]), question("s", &["X"])]);

        s.record_answer(&qid("m"), &picks(&["X"])).unwrap();
        s.record_answer(&qid("m"), &picks(&["Y", "Z"])).unwrap();
        s.record_answer(&qid("m"), &picks(&["Z"])).unwrap();
        assert_eq!(s.answers().get(&qid("m")).unwrap(), ["X", "Y"]);

        s.record_answer(&qid("s"), &picks(&["Y"])).unwrap();
        s.record_answer(&qid("s"), &picks(&["X"])).unwrap();
        assert_eq!(s.answers().get(&qid("s")).unwrap(), ["X"]);

        s.set_selections(&qid("m"), picks(&["Z"])).unwrap();
        assert_eq!(s.answers().get(&qid("m")).unwrap(), ["Z"]);
    }

    #[test]
    fn unknown_ids_and_options_are_rejected() {
        let mut s = started(vec![question("a", &["X"])]);
        assert!(matches!(
            s.record_answer(&qid("nope"), &picks(&["X"])),
            Err(SessionError::UnknownQuestion(_))
        ));
        assert!(matches!(
            s.record_answer(&qid("a"), &picks(&["W"])),
            Err(SessionError::UnknownOption { .. })
        ));
        assert!(s.answers().is_empty());
    }

    #[test]
    fn every_mutation_bumps_revision() {
        let mut s = started(vec![question("a", &["X"]), question("b", &["X"])]);
        let r0 = s.revision();
        s.record_answer(&qid("a"), &picks(&["X"])).unwrap();
        s.advance().unwrap();
        s.retreat().unwrap();
        assert_eq!(s.revision(), r0 + 3);
    }

    #[test]
    fn progress_counts_from_one() {
        let s = started(vec![question("a", &["X"]), question("b", &["X"])]);
        let p = s.progress();
        assert_eq!((p.current, p.total, p.percentage), (1, 2, 50));
    }

    #[test]
    fn session_streak_moves_on_each_answer() {
        let mut s = started(vec![
            question("a", &["X"]),
            question("b", &["X"]),
            question("c", &["X"]),
        ]);
        s.record_answer(&qid("a"), &picks(&["X"])).unwrap();
        assert_eq!(s.streak().current(), 1);
        s.advance().unwrap();
        s.record_answer(&qid("b"), &picks(&["X"])).unwrap();
        assert_eq!(s.streak().current(), 2);

        s.record_answer(&qid("c"), &picks(&["Y"])).unwrap();
        assert_eq!(s.streak().current(), 0);
        assert_eq!(s.streak().best(), 2);
    }

    #[test]
    fn session_streak_counts_each_question_once() {
        let mut s = started(vec![question("a", &["X"]), question("b", &["X"])]);
        s.record_answer(&qid("a"), &picks(&["X"])).unwrap();
        s.record_answer(&qid("a"), &picks(&["Y"])).unwrap();
        s.record_answer(&qid("a"), &picks(&["X"])).unwrap();
        assert_eq!(s.streak().current(), 1);

        // Skipping a question leaves the streak alone.
        s.advance().unwrap();
        s.advance().unwrap();
        assert_eq!(s.streak().current(), 1);
    }

    #[test]
    fn multi_select_streak_waits_for_a_verdict() {
        let mut s = started(vec![question("m", &["X", "Y"]), question("n", &["X", "Y"])]);
        s.record_answer(&qid("m"), &picks(&["X"])).unwrap();
        assert_eq!(s.streak().current(), 0);
        s.record_answer(&qid("m"), &picks(&["Y"])).unwrap();
        assert_eq!(s.streak().current(), 1);

        s.set_selections(&qid("n"), picks(&["Z"])).unwrap();
        assert_eq!(s.streak().current(), 0);
        s.set_selections(&qid("n"), picks(&["X", "Y"])).unwrap();
        assert_eq!((s.streak().current(), s.streak().best()), (0, 1));
    }

    #[test]
    fn complete_scores_current_answers() {
        let mut s = started(vec![question("a", &["X"]), question("b", &["Y"])]);
        s.record_answer(&qid("a"), &picks(&["X"])).unwrap();
        let report = s.complete().unwrap().clone();
        assert_eq!(report.score, 1);
        assert!(report.passing);
        assert!(s.complete().is_err());
    }

    #[test]
    fn restore_clamps_index() {
        let s = QuizSession::restore(
            RestoredState {
                questions: vec![question("a", &["X"])],
                answers: AnswerMap::new(),
                index: 9,
                revision: 12,
                started_at: fixed_now(),
            },
            1,
        )
        .unwrap();
        assert_eq!(s.index(), 0);
        assert_eq!(s.revision(), 12);
        assert_eq!(s.phase(), SessionPhase::InProgress);
    }
}
