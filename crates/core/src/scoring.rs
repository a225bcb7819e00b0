//! Scoring and thematic aggregation of a finished answer set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{AnswerMap, Question, QuestionId, Selections, TopicTag};

/// Correct/total counters for one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicScore {
    pub correct: u32,
    pub total: u32,
}

impl TopicScore {
    /// Accuracy in percent, 0 when the topic has no questions.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.total) * 100.0
        }
    }
}

/// Per-topic breakdown; the totals sum to the session length.
pub type ThematicBreakdown = BTreeMap<TopicTag, TopicScore>;

/// Outcome for one question of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionReview {
    pub question_id: QuestionId,
    pub topic: TopicTag,
    pub selections: Selections,
    pub correct: bool,
}

/// Final, deterministic result of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub score: u32,
    pub max_score: u32,
    pub thematic_breakdown: ThematicBreakdown,
    pub passing: bool,
    pub reviews: Vec<QuestionReview>,
}

/// Score `answers` against `questions`.
///
/// Unanswered questions count toward their topic total and are incorrect.
/// `pass_threshold` is configuration; nothing here assumes a value.
#[must_use]
pub fn score_answers(questions: &[Question], answers: &AnswerMap, pass_threshold: u32) -> ScoreReport {
    let mut score = 0_u32;
    let mut breakdown = ThematicBreakdown::new();
    let mut reviews = Vec::with_capacity(questions.len());

    for question in questions {
        let selections = answers.get(question.id()).unwrap_or_default();
        let correct = question.is_answered_correctly(selections);

        let topic = breakdown.entry(question.topic()).or_default();
        topic.total = topic.total.saturating_add(1);
        if correct {
            topic.correct = topic.correct.saturating_add(1);
            score = score.saturating_add(1);
        }

        reviews.push(QuestionReview {
            question_id: question.id().clone(),
            topic: question.topic(),
            selections: selections.to_vec(),
            correct,
        });
    }

    ScoreReport {
        score,
        max_score: u32::try_from(questions.len()).unwrap_or(u32::MAX),
        thematic_breakdown: breakdown,
        passing: score >= pass_threshold,
        reviews,
    }
}
