use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::answers::AnswerMap;
use crate::model::ids::{AttemptId, QuizId};
use crate::model::question::Question;
use crate::model::session::SessionKind;

/// Local durable cache entry for the in-progress session.
///
/// At most one snapshot exists per slot; it is overwritten on every
/// mutating event and cleared on completion or discard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub quiz_id: QuizId,
    pub kind: SessionKind,
    pub questions: Vec<Question>,
    pub started_at: DateTime<Utc>,
    pub current_index: usize,
    pub answers: AnswerMap,
    #[serde(default)]
    pub remote_attempt_id: Option<AttemptId>,
    #[serde(default)]
    pub revision: u64,
}

impl SessionSnapshot {
    /// Serialize to the JSON payload stored in the cache slot.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a cached JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` for malformed or invalid payloads.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns true when this snapshot belongs to `quiz` (or any quiz when `None`).
    #[must_use]
    pub fn matches(&self, quiz: Option<&QuizId>) -> bool {
        quiz.is_none_or(|q| *q == self.quiz_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuestionId;
    use crate::model::question::QuestionDraft;
    use crate::model::topic::TopicTag;
    use crate::time::fixed_now;

    fn question(id: &str) -> Question {
        QuestionDraft {
            id: id.into(),
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
        .unwrap()
    }

    #[test]
    fn json_round_trip_preserves_answers_and_index() {
        let mut answers = AnswerMap::new();
        answers.set(QuestionId::new("q1").unwrap(), vec!["a".into()]);
        let snapshot = SessionSnapshot {
            quiz_id: QuizId::new("examen_blanc").unwrap(),
            kind: SessionKind::Exam,
            questions: vec![question("q1"), question("q2")],
            started_at: fixed_now(),
            current_index: 1,
            answers,
            remote_attempt_id: Some(AttemptId::new(9)),
            revision: 4,
        };

        let back = SessionSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn matches_requested_quiz() {
        let snapshot = SessionSnapshot {
            quiz_id: QuizId::new("a").unwrap(),
            kind: SessionKind::Generated,
            questions: Vec::new(),
            started_at: fixed_now(),
            current_index: 0,
            answers: AnswerMap::new(),
            remote_attempt_id: None,
            revision: 0,
        };
        assert!(snapshot.matches(None));
        assert!(snapshot.matches(Some(&QuizId::new("a").unwrap())));
        assert!(!snapshot.matches(Some(&QuizId::new("b").unwrap())));
    }
}
