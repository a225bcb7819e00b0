use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::model::question::{Question, QuestionDraft, QuestionError};
use crate::model::topic::TopicTag;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankError {
    #[error("duplicate question id in bank: {0}")]
    DuplicateId(String),

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error("malformed bank document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Accepted on-disk shapes: `{"questions": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum BankDocument {
    Wrapped { questions: Vec<QuestionDraft> },
    Bare(Vec<QuestionDraft>),
}

/// Immutable, ordered collection of questions with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Build a bank from already validated questions.
    ///
    /// # Errors
    ///
    /// Returns `BankError::DuplicateId` if two questions share an id.
    pub fn new(questions: Vec<Question>) -> Result<Self, BankError> {
        let mut ids = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !ids.insert(q.id().clone()) {
                return Err(BankError::DuplicateId(q.id().to_string()));
            }
        }
        Ok(Self { questions })
    }

    /// Parse and validate a JSON bank document.
    ///
    /// # Errors
    ///
    /// Returns `BankError` for malformed JSON, invalid questions or duplicate ids.
    pub fn from_json(json: &str) -> Result<Self, BankError> {
        let drafts = match serde_json::from_str::<BankDocument>(json)? {
            BankDocument::Wrapped { questions } | BankDocument::Bare(questions) => questions,
        };
        let questions = drafts
            .into_iter()
            .map(QuestionDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(questions)
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Questions grouped by topic, preserving bank order within each group.
    #[must_use]
    pub fn by_topic(&self) -> BTreeMap<TopicTag, Vec<&Question>> {
        let mut grouped: BTreeMap<TopicTag, Vec<&Question>> = BTreeMap::new();
        for q in &self.questions {
            grouped.entry(q.topic()).or_default().push(q);
        }
        grouped
    }

    /// Number of questions available per topic.
    #[must_use]
    pub fn inventory(&self) -> BTreeMap<TopicTag, usize> {
        self.by_topic()
            .into_iter()
            .map(|(topic, qs)| (topic, qs.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{"questions": [
        {"id": "a1", "theme": "route", "question": "Q1", "options": ["x", "y"], "correctAnswers": ["x"]},
        {"id": "a2", "theme": "route", "question": "Q2", "options": ["x", "y"], "correctAnswers": ["y"]},
        {"id": "b1", "theme": "conducteur", "question": "Q3", "options": ["x", "y"], "correctAnswers": ["x", "y"]}
    ]}"#;

    #[test]
    fn parses_wrapped_document_and_groups_by_topic() {
        let bank = QuestionBank::from_json(DOC).unwrap();
        assert_eq!(bank.len(), 3);
        let inventory = bank.inventory();
        assert_eq!(inventory[&TopicTag::Route], 2);
        assert_eq!(inventory[&TopicTag::Conducteur], 1);
    }

    #[test]
    fn parses_bare_array() {
        let json = r#"[{"id": "a1", "topic": "route", "prompt": "Q1", "options": ["x", "y"], "correct_answers": ["x"]}]"#;
        let bank = QuestionBank::from_json(json).unwrap();
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"[
            {"id": "a1", "topic": "route", "prompt": "Q1", "options": ["x", "y"], "correct_answers": ["x"]},
            {"id": "a1", "topic": "route", "prompt": "Q2", "options": ["x", "y"], "correct_answers": ["y"]}
        ]"#;
        assert!(matches!(
            QuestionBank::from_json(json).unwrap_err(),
            BankError::DuplicateId(id) if id == "a1"
        ));
    }
}
