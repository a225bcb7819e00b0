use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use quiz_core::Clock;
use quiz_core::model::{
    AttemptDraft, AttemptRecord, AttemptUpdate, Question, QuestionId, QuizId, QuizSettings,
    SessionKind, SessionSnapshot, SessionStreak, SlotKey, StreakState, UserId,
};
use quiz_core::scoring::ScoreReport;
use storage::repository::{QuestionRepository, Storage};

use super::progress::Progress;
use super::reconcile::{Resolution, ResumeOffer, ResumeReconciler};
use super::selector::DistributionSelector;
use super::state::{QuizSession, RestoredState, SessionPhase};
use crate::error::{SessionError, TransitionError};
use crate::ledger::FinalizationLedger;
use crate::persistence::{AttemptSlot, AttemptSync, PersistenceHandle, PersistenceWorker};

//
// ─── REQUESTS & RESULTS ────────────────────────────────────────────────────────
//

/// What to start: a kind, an optional quiz id and optionally the questions.
///
/// Without questions the engine draws them from the bank using the
/// configured distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub quiz_id: Option<QuizId>,
    pub kind: SessionKind,
    pub questions: Option<Vec<Question>>,
}

impl StartRequest {
    /// The official mock exam drawn from the bank.
    #[must_use]
    pub fn exam() -> Self {
        Self {
            quiz_id: Some(QuizId::exam()),
            kind: SessionKind::Exam,
            questions: None,
        }
    }

    /// A session over caller-supplied questions, e.g. a generated quiz.
    #[must_use]
    pub fn with_questions(kind: SessionKind, questions: Vec<Question>) -> Self {
        Self {
            quiz_id: None,
            kind,
            questions: Some(questions),
        }
    }

    #[must_use]
    pub fn quiz_id(mut self, quiz_id: QuizId) -> Self {
        self.quiz_id = Some(quiz_id);
        self
    }
}

/// Final outcome of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalReport {
    pub quiz_id: QuizId,
    pub kind: SessionKind,
    pub report: ScoreReport,
    pub best_session_streak: u32,
    /// Calendar streak after this completion.
    pub calendar_streak: u32,
}

/// Result of entering a quiz context.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A remote attempt was adopted and is now the active session.
    Resumed(Progress),
    /// A remote attempt turned out to be fully answered and was finalized.
    Finalized(FinalReport),
    /// A cached session awaits `accept_resume` or `discard_resume`.
    ResumeOffered(ResumeOffer),
    /// Nothing to resume.
    Fresh,
}

/// Result of moving forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Moved(Progress),
    /// The last question was passed; call `finalize`.
    Completed,
}

//
// ─── ACTIVE SESSION ────────────────────────────────────────────────────────────
//

struct ActiveSession {
    quiz_id: QuizId,
    kind: SessionKind,
    session: QuizSession,
    attempt: Arc<AttemptSlot>,
    finalized: Option<FinalReport>,
}

impl ActiveSession {
    fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            quiz_id: self.quiz_id.clone(),
            kind: self.kind,
            questions: self.session.questions().to_vec(),
            started_at: self.session.started_at().unwrap_or(now),
            current_index: self.session.index(),
            answers: self.session.answers().clone(),
            remote_attempt_id: self.attempt.get(),
            revision: self.session.revision(),
        }
    }

    fn attempt_sync(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
        final_score: Option<u32>,
    ) -> AttemptSync {
        let questions = self.session.questions().to_vec();
        AttemptSync {
            draft: AttemptDraft {
                user_id: user.clone(),
                quiz_id: self.quiz_id.clone(),
                kind: self.kind,
                max_score: u32::try_from(questions.len()).unwrap_or(u32::MAX),
                questions,
                created_at: self.session.started_at().unwrap_or(now),
            },
            update: AttemptUpdate {
                answers: self.session.answers().clone(),
                revision: self.session.revision(),
                final_score,
                updated_at: now,
            },
        }
    }

    /// Push the current state: cache always, remote only when answers changed.
    fn persist(
        &self,
        persistence: &PersistenceHandle,
        user: &UserId,
        now: DateTime<Utc>,
        sync_remote: bool,
    ) {
        let attempt = sync_remote.then(|| self.attempt_sync(user, now, None));
        persistence.event(self.attempt.clone(), attempt, Some(self.snapshot(now)));
    }

    /// Queue the final score. The worker clears the cache once it lands and
    /// otherwise keeps this snapshot so the result is not lost.
    fn submit_final(
        &self,
        persistence: &PersistenceHandle,
        user: &UserId,
        now: DateTime<Utc>,
        score: u32,
    ) {
        let sync = self.attempt_sync(user, now, Some(score));
        persistence.event(self.attempt.clone(), Some(sync), Some(self.snapshot(now)));
    }

    fn final_report(&self, report: ScoreReport, calendar_streak: u32) -> FinalReport {
        FinalReport {
            quiz_id: self.quiz_id.clone(),
            kind: self.kind,
            report,
            best_session_streak: self.session.streak().best(),
            calendar_streak,
        }
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Orchestrates one user's quiz sessions on this device.
///
/// Mutating calls are synchronous; persistence happens in the background
/// through a `PersistenceWorker`.
pub struct QuizEngine {
    clock: Clock,
    settings: QuizSettings,
    user: UserId,
    questions: Arc<dyn QuestionRepository>,
    reconciler: ResumeReconciler,
    persistence: PersistenceHandle,
    ledger: FinalizationLedger,
    calendar: StreakState,
    active: Option<ActiveSession>,
    pending_offer: Option<SessionSnapshot>,
}

impl QuizEngine {
    /// Load the user's streak and spawn the persistence worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the streak cannot be loaded.
    pub async fn open(
        storage: &Storage,
        user: UserId,
        settings: QuizSettings,
        clock: Clock,
        ledger: FinalizationLedger,
    ) -> Result<Self, SessionError> {
        let slot = SlotKey::in_progress_for(&user);
        let calendar = storage.streaks.load_streak(&user).await?;
        let (persistence, _worker) = PersistenceWorker::spawn(
            storage.attempts.clone(),
            storage.snapshots.clone(),
            storage.streaks.clone(),
            slot.clone(),
            ledger.clone(),
        );
        let reconciler = ResumeReconciler::new(
            storage.attempts.clone(),
            storage.snapshots.clone(),
            user.clone(),
            slot,
        );

        Ok(Self {
            clock,
            settings,
            user,
            questions: storage.questions.clone(),
            reconciler,
            persistence,
            ledger,
            calendar,
            active: None,
            pending_offer: None,
        })
    }

    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    /// Start a new session, replacing any active one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are available, or
    /// `SessionError::Storage` if the bank cannot be read.
    pub async fn start_session(&mut self, request: StartRequest) -> Result<Progress, SessionError> {
        let questions = match request.questions {
            Some(questions) => questions,
            None => {
                let bank = self.questions.list_questions().await?;
                let target = usize::try_from(self.settings.target_count()).unwrap_or(usize::MAX);
                let selection = DistributionSelector::new(&bank, self.settings.distribution())
                    .with_target(target)
                    .build();
                tracing::info!(
                    bank = bank.len(),
                    selected = selection.total(),
                    backfilled = selection.backfilled,
                    "selected session questions"
                );
                selection.questions
            }
        };

        let quiz_id = request.quiz_id.unwrap_or_else(|| match request.kind {
            SessionKind::Exam => QuizId::exam(),
            SessionKind::Generated | SessionKind::ImageRecognition => QuizId::generated(),
        });

        let now = self.clock.now();
        let mut session = QuizSession::new(self.settings.pass_threshold());
        session.start(questions, now)?;

        let active = ActiveSession {
            quiz_id,
            kind: request.kind,
            session,
            attempt: Arc::new(AttemptSlot::default()),
            finalized: None,
        };
        active.persist(&self.persistence, &self.user, now, false);
        tracing::info!(
            quiz = %active.quiz_id,
            kind = %active.kind,
            questions = active.session.questions().len(),
            "session started"
        );

        let progress = active.session.progress();
        self.pending_offer = None;
        self.active = Some(active);
        Ok(progress)
    }

    /// Record selections for a question of the active session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSession` without an active session, or the
    /// session's validation and transition errors.
    pub fn answer(
        &mut self,
        question_id: &QuestionId,
        selections: &[String],
    ) -> Result<(), SessionError> {
        let now = self.clock.now();
        let active = self.active.as_mut().ok_or(SessionError::NoSession)?;
        active.session.record_answer(question_id, selections)?;
        active.persist(&self.persistence, &self.user, now, true);
        Ok(())
    }

    /// Replace the whole selection for a question of the active session.
    ///
    /// # Errors
    ///
    /// Same as [`QuizEngine::answer`].
    pub fn set_selections(
        &mut self,
        question_id: &QuestionId,
        selections: Vec<String>,
    ) -> Result<(), SessionError> {
        let now = self.clock.now();
        let active = self.active.as_mut().ok_or(SessionError::NoSession)?;
        active.session.set_selections(question_id, selections)?;
        active.persist(&self.persistence, &self.user, now, true);
        Ok(())
    }

    /// Move to the next question; passing the last one completes the session.
    ///
    /// Callers enforcing the per-question time limit call this on expiry.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSession` or `SessionError::Transition`.
    pub fn next(&mut self) -> Result<Step, SessionError> {
        let now = self.clock.now();
        let active = self.active.as_mut().ok_or(SessionError::NoSession)?;
        let phase = active.session.advance()?;
        active.persist(&self.persistence, &self.user, now, false);
        Ok(match phase {
            SessionPhase::Completed => Step::Completed,
            _ => Step::Moved(active.session.progress()),
        })
    }

    /// Step back one question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSession` or `SessionError::Transition`.
    pub fn previous(&mut self) -> Result<Progress, SessionError> {
        let now = self.clock.now();
        let active = self.active.as_mut().ok_or(SessionError::NoSession)?;
        active.session.retreat()?;
        if !active.session.is_complete() {
            active.persist(&self.persistence, &self.user, now, false);
        }
        Ok(active.session.progress())
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.active.as_ref()?.session.current_question()
    }

    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        self.active.as_ref().map(|a| a.session.progress())
    }

    #[must_use]
    pub fn session(&self) -> Option<&QuizSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    /// Complete the active session, submit its score and credit the streak.
    ///
    /// Calling it again returns the same report. The score is queued again
    /// only while no final submission for the attempt has been recorded,
    /// which retries one that failed while the store was unreachable.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSession` or `SessionError::Transition`.
    pub fn finalize(&mut self) -> Result<FinalReport, SessionError> {
        let now = self.clock.now();
        let today = self.clock.today();
        let active = self.active.as_mut().ok_or(SessionError::NoSession)?;
        if let Some(done) = &active.finalized {
            let submitted = active.attempt.get().is_some_and(|id| self.ledger.contains(id));
            if !submitted {
                tracing::info!(quiz = %done.quiz_id, "resubmitting final score");
                active.submit_final(&self.persistence, &self.user, now, done.report.score);
            }
            return Ok(done.clone());
        }

        if active.session.phase() == SessionPhase::InProgress {
            active.session.complete()?;
        }
        let report = active.session.report().cloned().ok_or(TransitionError {
            op: "finalize",
            phase: active.session.phase(),
        })?;

        if self.calendar.record_completion(today) {
            self.persistence.save_streak(self.user.clone(), self.calendar);
        }

        active.submit_final(&self.persistence, &self.user, now, report.score);

        let final_report = active.final_report(report, self.calendar.current_on(today));
        tracing::info!(
            quiz = %final_report.quiz_id,
            score = final_report.report.score,
            max_score = final_report.report.max_score,
            passing = final_report.report.passing,
            "session finalized"
        );
        active.finalized = Some(final_report.clone());
        Ok(final_report)
    }

    //
    // ─── RESUME ────────────────────────────────────────────────────────────────
    //

    /// Reconcile remote and cached state for `quiz` (or any quiz).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if an adopted attempt has no questions.
    pub async fn enter(&mut self, quiz: Option<&QuizId>) -> Result<Entry, SessionError> {
        self.pending_offer = None;
        let now = self.clock.now();

        match self.reconciler.reconcile(quiz).await {
            Resolution::Adopt {
                attempt,
                next_index,
            } => {
                let active = self.adopt(attempt, next_index)?;
                active.persist(&self.persistence, &self.user, now, false);
                let progress = active.session.progress();
                self.active = Some(active);
                Ok(Entry::Resumed(progress))
            }
            Resolution::Finalize { attempt } => {
                let last = attempt.questions.len().saturating_sub(1);
                let mut active = self.adopt(attempt, last)?;
                let report = active.session.complete()?.clone();

                // Streak credit happened when the session was first completed.
                active.submit_final(&self.persistence, &self.user, now, report.score);

                let final_report =
                    active.final_report(report, self.calendar.current_on(self.clock.today()));
                tracing::info!(
                    quiz = %final_report.quiz_id,
                    score = final_report.report.score,
                    "finalized fully answered remote attempt"
                );
                active.finalized = Some(final_report.clone());
                self.active = Some(active);
                Ok(Entry::Finalized(final_report))
            }
            Resolution::Offer(snapshot) => {
                let offer = ResumeOffer::from_snapshot(&snapshot);
                self.pending_offer = Some(snapshot);
                Ok(Entry::ResumeOffered(offer))
            }
            Resolution::Fresh => Ok(Entry::Fresh),
        }
    }

    fn adopt(&self, attempt: AttemptRecord, index: usize) -> Result<ActiveSession, SessionError> {
        let session = QuizSession::restore(
            RestoredState {
                questions: attempt.questions,
                answers: attempt.answers,
                index,
                revision: attempt.revision,
                started_at: attempt.created_at,
            },
            self.settings.pass_threshold(),
        )?;
        Ok(ActiveSession {
            quiz_id: attempt.quiz_id,
            kind: attempt.kind,
            session,
            attempt: Arc::new(AttemptSlot::new(Some(attempt.id))),
            finalized: None,
        })
    }

    #[must_use]
    pub fn offer_resume(&self) -> Option<ResumeOffer> {
        self.pending_offer.as_ref().map(ResumeOffer::from_snapshot)
    }

    /// Adopt the cached session offered by `enter`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoResumeOffer` if nothing is pending, or
    /// `SessionError::Empty` for a snapshot without questions.
    pub fn accept_resume(&mut self) -> Result<Progress, SessionError> {
        let snapshot = self.pending_offer.take().ok_or(SessionError::NoResumeOffer)?;
        let session = QuizSession::restore(
            RestoredState {
                questions: snapshot.questions,
                answers: snapshot.answers,
                index: snapshot.current_index,
                revision: snapshot.revision,
                started_at: snapshot.started_at,
            },
            self.settings.pass_threshold(),
        )?;
        let active = ActiveSession {
            quiz_id: snapshot.quiz_id,
            kind: snapshot.kind,
            session,
            attempt: Arc::new(AttemptSlot::new(snapshot.remote_attempt_id)),
            finalized: None,
        };
        tracing::info!(quiz = %active.quiz_id, index = active.session.index(), "resumed cached session");
        let progress = active.session.progress();
        self.active = Some(active);
        Ok(progress)
    }

    /// Drop the cached session offered by `enter`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoResumeOffer` if nothing is pending.
    pub fn discard_resume(&mut self) -> Result<(), SessionError> {
        let snapshot = self.pending_offer.take().ok_or(SessionError::NoResumeOffer)?;
        tracing::info!(quiz = %snapshot.quiz_id, "discarded cached session");
        self.persistence.clear_snapshot();
        Ok(())
    }

    //
    // ─── STREAKS & LIMITS ──────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn session_streak(&self) -> Option<SessionStreak> {
        self.active.as_ref().map(|a| a.session.streak())
    }

    /// Calendar streak as of today; a streak older than yesterday reads 0.
    #[must_use]
    pub fn calendar_streak(&self) -> u32 {
        self.calendar.current_on(self.clock.today())
    }

    #[must_use]
    pub fn question_time_limit(&self) -> Duration {
        self.settings.question_time_limit()
    }

    /// Wait for all queued persistence to land.
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }
}
