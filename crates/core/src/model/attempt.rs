use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::answers::AnswerMap;
use crate::model::ids::{AttemptId, QuizId, UserId};
use crate::model::question::Question;
use crate::model::session::SessionKind;

/// Metadata sent to the attempt store when a session first persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptDraft {
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub kind: SessionKind,
    pub questions: Vec<Question>,
    pub max_score: u32,
    pub created_at: DateTime<Utc>,
}

/// Full-state update for an attempt.
///
/// Always carries the whole answer map, never a diff. `revision` is the
/// session's monotonic event counter; stores reject non-increasing revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptUpdate {
    pub answers: AnswerMap,
    pub revision: u64,
    pub final_score: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

/// Remote-authoritative record of one user's run through a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub kind: SessionKind,
    pub questions: Vec<Question>,
    pub answers: AnswerMap,
    pub revision: u64,
    pub final_score: Option<u32>,
    pub max_score: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// Materialize a freshly created record.
    #[must_use]
    pub fn from_draft(id: AttemptId, draft: AttemptDraft) -> Self {
        Self {
            id,
            user_id: draft.user_id,
            quiz_id: draft.quiz_id,
            kind: draft.kind,
            questions: draft.questions,
            answers: AnswerMap::new(),
            revision: 0,
            final_score: None,
            max_score: draft.max_score,
            created_at: draft.created_at,
            updated_at: draft.created_at,
            finalized_at: None,
        }
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.final_score.is_some()
    }

    /// Returns true if `update` is newer than what this record already holds.
    #[must_use]
    pub fn accepts(&self, update: &AttemptUpdate) -> bool {
        update.revision > self.revision
    }

    /// Apply an update that `accepts` has already approved.
    ///
    /// A final score is only recorded once; later updates keep the first one.
    pub fn apply(&mut self, update: AttemptUpdate) {
        self.answers = update.answers;
        self.revision = update.revision;
        self.updated_at = update.updated_at;
        if self.final_score.is_none() {
            if let Some(score) = update.final_score {
                self.final_score = Some(score);
                self.finalized_at = Some(update.updated_at);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn record() -> AttemptRecord {
        AttemptRecord::from_draft(
            AttemptId::new(1),
            AttemptDraft {
                user_id: UserId::new("u").unwrap(),
                quiz_id: QuizId::new("examen_blanc").unwrap(),
                kind: SessionKind::Exam,
                questions: Vec::new(),
                max_score: 40,
                created_at: fixed_now(),
            },
        )
    }

    fn update(revision: u64, final_score: Option<u32>) -> AttemptUpdate {
        AttemptUpdate {
            answers: AnswerMap::new(),
            revision,
            final_score,
            updated_at: fixed_now(),
        }
    }

    #[test]
    fn stale_revisions_are_not_accepted() {
        let mut r = record();
        assert!(r.accepts(&update(1, None)));
        r.apply(update(3, None));
        assert!(!r.accepts(&update(2, None)));
        assert!(!r.accepts(&update(3, None)));
        assert!(r.accepts(&update(4, None)));
    }

    #[test]
    fn final_score_is_recorded_once() {
        let mut r = record();
        r.apply(update(1, Some(30)));
        r.apply(update(2, Some(12)));
        assert_eq!(r.final_score, Some(30));
        assert!(r.is_finalized());
    }
}
