use std::sync::Arc;

use serde::Serialize;

use quiz_core::model::{
    AnswerMap, AttemptRecord, Question, QuizId, SessionKind, SessionSnapshot, SlotKey, UserId,
};
use storage::repository::{AttemptRepository, SnapshotCache};

/// Index of the first question without a recorded answer, if any.
#[must_use]
pub fn next_unanswered_index(questions: &[Question], answers: &AnswerMap) -> Option<usize> {
    questions.iter().position(|q| !answers.contains(q.id()))
}

/// Summary of a cached session the user may pick up again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeOffer {
    pub quiz_id: QuizId,
    pub kind: SessionKind,
    pub current_index: usize,
    pub total: usize,
    pub answered: usize,
}

impl ResumeOffer {
    #[must_use]
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            quiz_id: snapshot.quiz_id.clone(),
            kind: snapshot.kind,
            current_index: snapshot.current_index,
            total: snapshot.questions.len(),
            answered: snapshot.answers.len(),
        }
    }
}

/// Outcome of reconciling remote and local state on entering a quiz.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Continue a remote attempt at `next_index`.
    Adopt {
        attempt: AttemptRecord,
        next_index: usize,
    },
    /// A remote attempt has every question answered but no final score.
    Finalize { attempt: AttemptRecord },
    /// Only the local cache knows about this session; ask the user.
    Offer(SessionSnapshot),
    Fresh,
}

impl Resolution {
    fn from_remote(attempt: AttemptRecord) -> Self {
        match next_unanswered_index(&attempt.questions, &attempt.answers) {
            Some(next_index) => Resolution::Adopt {
                attempt,
                next_index,
            },
            None => Resolution::Finalize { attempt },
        }
    }
}

/// Decides which of remote attempt, cached snapshot or a fresh start wins.
///
/// Remote state always wins over the cache. Unreachable stores degrade to the
/// next source instead of failing.
#[derive(Clone)]
pub struct ResumeReconciler {
    attempts: Arc<dyn AttemptRepository>,
    snapshots: Arc<dyn SnapshotCache>,
    user: UserId,
    slot: SlotKey,
}

impl ResumeReconciler {
    #[must_use]
    pub fn new(
        attempts: Arc<dyn AttemptRepository>,
        snapshots: Arc<dyn SnapshotCache>,
        user: UserId,
        slot: SlotKey,
    ) -> Self {
        Self {
            attempts,
            snapshots,
            user,
            slot,
        }
    }

    pub async fn reconcile(&self, quiz: Option<&QuizId>) -> Resolution {
        if let Some(quiz) = quiz {
            match self.attempts.latest_attempt_for_quiz(&self.user, quiz).await {
                Ok(Some(attempt)) if !attempt.is_finalized() => {
                    tracing::info!(attempt = %attempt.id, quiz = %quiz, "resuming remote attempt");
                    return Resolution::from_remote(attempt);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(quiz = %quiz, error = %e, "attempt lookup failed; checking local cache");
                }
            }
        }

        let snapshot = match self.snapshots.read_snapshot(&self.slot).await {
            Ok(Some(snapshot)) if snapshot.matches(quiz) => snapshot,
            Ok(_) => return Resolution::Fresh,
            Err(e) => {
                tracing::warn!(slot = %self.slot, error = %e, "unreadable snapshot ignored");
                return Resolution::Fresh;
            }
        };

        let Some(remote_id) = snapshot.remote_attempt_id else {
            return Resolution::Offer(snapshot);
        };

        match self.attempts.get_attempt(remote_id).await {
            Ok(attempt) if attempt.is_finalized() => {
                tracing::info!(attempt = %remote_id, "cached snapshot points at a finalized attempt; discarding");
                if let Err(e) = self.snapshots.clear_snapshot(&self.slot).await {
                    tracing::warn!(slot = %self.slot, error = %e, "failed to clear stale snapshot");
                }
                Resolution::Fresh
            }
            Ok(attempt) => {
                if attempt.answers != snapshot.answers {
                    tracing::info!(attempt = %remote_id, "remote answers differ from cache; remote wins");
                }
                Resolution::from_remote(attempt)
            }
            Err(e) => {
                tracing::warn!(attempt = %remote_id, error = %e, "remote attempt unavailable; offering cached session");
                Resolution::Offer(snapshot)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{
        AttemptDraft, AttemptId, AttemptUpdate, QuestionDraft, QuestionId, TopicTag,
    };
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn question(id: &str) -> Question {
        QuestionDraft {
            id: id.into(),
            topic: TopicTag::Route,
            category: Default::default(),
            prompt: "P".into(),
            options: vec!["A".into(), "B".into()],
            correct_answers: vec!["A".into()],
            explanation: None,
            image: None,
            difficulty: Default::default(),
        }
        .validate()
        .unwrap()
    }

    fn questions(n: usize) -> Vec<Question> {
        (0..n).map(|i| question(&format!("q{i}"))).collect()
    }

    fn answered(questions: &[Question], upto: usize) -> AnswerMap {
        questions
            .iter()
            .take(upto)
            .map(|q| (q.id().clone(), vec!["A".to_string()]))
            .collect()
    }

    fn user() -> UserId {
        UserId::new("u").unwrap()
    }

    fn quiz() -> QuizId {
        QuizId::new("examen_blanc").unwrap()
    }

    fn slot() -> SlotKey {
        SlotKey::in_progress_for(&user())
    }

    fn reconciler(repo: &InMemoryRepository) -> ResumeReconciler {
        ResumeReconciler::new(Arc::new(repo.clone()), Arc::new(repo.clone()), user(), slot())
    }

    async fn remote_attempt(repo: &InMemoryRepository, answered_count: usize) -> AttemptId {
        let qs = questions(6);
        let id = repo
            .create_attempt(&AttemptDraft {
                user_id: user(),
                quiz_id: quiz(),
                kind: SessionKind::Exam,
                questions: qs.clone(),
                max_score: 6,
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        if answered_count > 0 {
            repo.update_attempt(
                id,
                &AttemptUpdate {
                    answers: answered(&qs, answered_count),
                    revision: 5,
                    final_score: None,
                    updated_at: fixed_now(),
                },
            )
            .await
            .unwrap();
        }
        id
    }

    fn snapshot(remote: Option<AttemptId>) -> SessionSnapshot {
        let qs = questions(6);
        SessionSnapshot {
            quiz_id: quiz(),
            kind: SessionKind::Exam,
            answers: answered(&qs, 2),
            questions: qs,
            started_at: fixed_now(),
            current_index: 2,
            remote_attempt_id: remote,
            revision: 3,
        }
    }

    #[test]
    fn next_index_skips_answered_prefix() {
        let qs = questions(6);
        assert_eq!(next_unanswered_index(&qs, &answered(&qs, 5)), Some(5));
        assert_eq!(next_unanswered_index(&qs, &answered(&qs, 6)), None);
        assert_eq!(next_unanswered_index(&qs, &AnswerMap::new()), Some(0));

        let gap: AnswerMap = [(QuestionId::new("q1").unwrap(), vec!["A".to_string()])]
            .into_iter()
            .collect();
        assert_eq!(next_unanswered_index(&qs, &gap), Some(0));
    }

    #[tokio::test]
    async fn remote_attempt_wins_for_requested_quiz() {
        let repo = InMemoryRepository::new();
        remote_attempt(&repo, 5).await;
        repo.write_snapshot(&slot(), &snapshot(None)).await.unwrap();

        match reconciler(&repo).reconcile(Some(&quiz())).await {
            Resolution::Adopt { next_index, attempt } => {
                assert_eq!(next_index, 5);
                assert_eq!(attempt.answers.len(), 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn fully_answered_remote_goes_to_finalize() {
        let repo = InMemoryRepository::new();
        remote_attempt(&repo, 6).await;
        assert!(matches!(
            reconciler(&repo).reconcile(Some(&quiz())).await,
            Resolution::Finalize { .. }
        ));
    }

    #[tokio::test]
    async fn snapshot_pointer_is_followed_without_requested_quiz() {
        let repo = InMemoryRepository::new();
        let id = remote_attempt(&repo, 4).await;
        repo.write_snapshot(&slot(), &snapshot(Some(id))).await.unwrap();

        match reconciler(&repo).reconcile(None).await {
            Resolution::Adopt { next_index, .. } => assert_eq!(next_index, 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_remote_offers_snapshot() {
        let repo = InMemoryRepository::new();
        let id = remote_attempt(&repo, 4).await;
        repo.write_snapshot(&slot(), &snapshot(Some(id))).await.unwrap();
        repo.set_attempts_offline(true);

        match reconciler(&repo).reconcile(Some(&quiz())).await {
            Resolution::Offer(s) => {
                let offer = ResumeOffer::from_snapshot(&s);
                assert_eq!((offer.current_index, offer.total, offer.answered), (2, 6, 2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_remote_falls_back_to_offer() {
        let repo = InMemoryRepository::new();
        let id = remote_attempt(&repo, 1).await;
        repo.write_snapshot(&slot(), &snapshot(Some(id))).await.unwrap();
        repo.forget_attempt(id);

        assert!(matches!(
            reconciler(&repo).reconcile(None).await,
            Resolution::Offer(_)
        ));
    }

    #[tokio::test]
    async fn finalized_remote_clears_stale_snapshot() {
        let repo = InMemoryRepository::new();
        let id = remote_attempt(&repo, 6).await;
        repo.update_attempt(
            id,
            &AttemptUpdate {
                answers: answered(&questions(6), 6),
                revision: 9,
                final_score: Some(6),
                updated_at: fixed_now(),
            },
        )
        .await
        .unwrap();
        repo.write_snapshot(&slot(), &snapshot(Some(id))).await.unwrap();

        assert_eq!(reconciler(&repo).reconcile(Some(&quiz())).await, Resolution::Fresh);
        assert!(repo.read_snapshot(&slot()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_for_other_quiz_is_left_alone() {
        let repo = InMemoryRepository::new();
        repo.write_snapshot(&slot(), &snapshot(None)).await.unwrap();

        let other = QuizId::new("gen-123").unwrap();
        assert_eq!(reconciler(&repo).reconcile(Some(&other)).await, Resolution::Fresh);
        assert!(repo.read_snapshot(&slot()).await.unwrap().is_some());
        assert!(matches!(
            reconciler(&repo).reconcile(None).await,
            Resolution::Offer(_)
        ));
    }

    #[tokio::test]
    async fn nothing_stored_means_fresh() {
        let repo = InMemoryRepository::new();
        assert_eq!(reconciler(&repo).reconcile(Some(&quiz())).await, Resolution::Fresh);
    }
}
