use std::sync::Arc;

use quiz_core::model::{AttemptRecord, SessionKind, UserId};
use quiz_core::statistics::UserStatistics;
use storage::repository::{AttemptRepository, InMemoryRepository};

use crate::error::SessionError;

/// Read-only facade over a user's past attempts.
#[derive(Clone)]
pub struct AttemptHistoryService {
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptHistoryService {
    #[must_use]
    pub fn new(attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { attempts }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRepository::new()))
    }

    /// Finalized attempts, newest first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn recent_attempts(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, SessionError> {
        Ok(self.attempts.list_finalized_attempts(user, None, limit).await?)
    }

    /// Finalized attempts of one session kind, newest first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn attempts_by_kind(
        &self,
        user: &UserId,
        kind: SessionKind,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, SessionError> {
        Ok(self
            .attempts
            .list_finalized_attempts(user, Some(kind), limit)
            .await?)
    }

    /// Aggregate statistics over the newest `limit` attempts.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn statistics(
        &self,
        user: &UserId,
        pass_threshold: u32,
        limit: u32,
    ) -> Result<UserStatistics, SessionError> {
        let mut attempts = self.recent_attempts(user, limit).await?;
        attempts.reverse();
        Ok(UserStatistics::from_attempts(&attempts, pass_threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{AnswerMap, AttemptDraft, AttemptUpdate, QuestionDraft, QuizId, TopicTag};
    use quiz_core::time::fixed_now;

    async fn attempt(repo: &InMemoryRepository, minutes: i64, score: Option<u32>) {
        kind_attempt(repo, SessionKind::Exam, minutes, score).await;
    }

    async fn kind_attempt(
        repo: &InMemoryRepository,
        kind: SessionKind,
        minutes: i64,
        score: Option<u32>,
    ) {
        let question = QuestionDraft {
            id: "q".into(),
            topic: TopicTag::Route,
            category: Default::default(),
            prompt: "P".into(),
            options: vec!["a".into(), "b".into()],
            correct_answers: vec!["a".into()],
            explanation: None,
            image: None,
            difficulty: Default::default(),
        }
        .validate()
        .unwrap();
        let id = repo
            .create_attempt(&AttemptDraft {
                user_id: UserId::new("u").unwrap(),
                quiz_id: QuizId::exam(),
                kind,
                questions: vec![question],
                max_score: 40,
                created_at: fixed_now() + Duration::minutes(minutes),
            })
            .await
            .unwrap();
        if score.is_some() {
            repo.update_attempt(
                id,
                &AttemptUpdate {
                    answers: AnswerMap::new(),
                    revision: 1,
                    final_score: score,
                    updated_at: fixed_now(),
                },
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn recent_attempts_skip_unfinished_ones() {
        let repo = InMemoryRepository::new();
        attempt(&repo, 0, Some(30)).await;
        attempt(&repo, 1, None).await;
        attempt(&repo, 2, Some(36)).await;

        let svc = AttemptHistoryService::new(Arc::new(repo));
        let recent = svc
            .recent_attempts(&UserId::new("u").unwrap(), 10)
            .await
            .unwrap();
        let scores: Vec<_> = recent.iter().map(|a| a.final_score).collect();
        assert_eq!(scores, vec![Some(36), Some(30)]);
    }

    #[tokio::test]
    async fn open_attempts_do_not_crowd_out_finished_ones() {
        let repo = InMemoryRepository::new();
        attempt(&repo, 0, Some(33)).await;
        for minutes in 1..=5 {
            attempt(&repo, minutes, None).await;
        }

        let svc = AttemptHistoryService::new(Arc::new(repo));
        let user = UserId::new("u").unwrap();
        let recent = svc.recent_attempts(&user, 2).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].final_score, Some(33));

        let stats = svc.statistics(&user, 35, 2).await.unwrap();
        assert_eq!(stats.total_attempts, 1);
        assert_eq!(stats.best_score, 33);
    }

    #[tokio::test]
    async fn attempts_by_kind_keeps_one_mode() {
        let repo = InMemoryRepository::new();
        attempt(&repo, 0, Some(36)).await;
        kind_attempt(&repo, SessionKind::ImageRecognition, 1, Some(9)).await;
        kind_attempt(&repo, SessionKind::ImageRecognition, 2, None).await;
        kind_attempt(&repo, SessionKind::Generated, 3, Some(4)).await;

        let svc = AttemptHistoryService::new(Arc::new(repo));
        let images = svc
            .attempts_by_kind(&UserId::new("u").unwrap(), SessionKind::ImageRecognition, 10)
            .await
            .unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].final_score, Some(9));
    }

    #[tokio::test]
    async fn statistics_count_passing_streak_from_newest() {
        let repo = InMemoryRepository::new();
        attempt(&repo, 0, Some(36)).await;
        attempt(&repo, 1, Some(20)).await;
        attempt(&repo, 2, Some(35)).await;
        attempt(&repo, 3, Some(38)).await;

        let svc = AttemptHistoryService::new(Arc::new(repo));
        let stats = svc
            .statistics(&UserId::new("u").unwrap(), 35, 50)
            .await
            .unwrap();
        assert_eq!(stats.total_attempts, 4);
        assert_eq!(stats.best_score, 38);
        assert_eq!(stats.passing_streak, 2);
        assert!((stats.average_score - 32.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_history_has_default_statistics() {
        let svc = AttemptHistoryService::in_memory();
        let stats = svc
            .statistics(&UserId::new("u").unwrap(), 35, 50)
            .await
            .unwrap();
        assert_eq!(stats, UserStatistics::default());
    }
}
