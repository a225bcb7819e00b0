use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::model::ids::{ParseIdError, QuestionId};
use crate::model::topic::TopicTag;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error(transparent)]
    InvalidId(#[from] ParseIdError),

    #[error("question {0}: prompt cannot be empty")]
    EmptyPrompt(String),

    #[error("question {0}: at least two options are required")]
    TooFewOptions(String),

    #[error("question {id}: duplicate option {option:?}")]
    DuplicateOption { id: String, option: String },

    #[error("question {0}: at least one correct answer is required")]
    NoCorrectAnswer(String),

    #[error("question {id}: correct answer {answer:?} is not one of the options")]
    CorrectAnswerNotAnOption { id: String, answer: String },

    #[error("question {id}: duplicate correct answer {answer:?}")]
    DuplicateCorrectAnswer { id: String, answer: String },

    #[error("question {0}: image reference cannot be empty")]
    EmptyImageRef(String),
}

//
// ─── SMALL ENUMS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    #[default]
    OfficialCode,
    GeneralKnowledge,
}

/// Reference to an illustration: an absolute URL or a bundled asset path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Url(Url),
    Asset(PathBuf),
}

impl ImageRef {
    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match Url::parse(trimmed) {
            Ok(url) => Some(ImageRef::Url(url)),
            Err(_) => Some(ImageRef::Asset(PathBuf::from(trimmed))),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRef::Url(url) => write!(f, "{url}"),
            ImageRef::Asset(path) => write!(f, "{}", path.display()),
        }
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated question as found in bank files and persisted payloads.
///
/// Field aliases accept the camelCase names used by exported question banks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub id: String,
    #[serde(alias = "theme")]
    pub topic: TopicTag,
    #[serde(default)]
    pub category: QuestionCategory,
    #[serde(alias = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(alias = "correctAnswers")]
    pub correct_answers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, alias = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl QuestionDraft {
    /// Validate the draft into an immutable `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the id, prompt, options or answers are inconsistent.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let id = QuestionId::new(self.id)?;
        let key = id.as_str().to_owned();

        let prompt = self.prompt.trim().to_owned();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt(key));
        }

        if self.options.len() < 2 {
            return Err(QuestionError::TooFewOptions(key));
        }
        let mut seen = HashSet::new();
        for option in &self.options {
            if !seen.insert(option.as_str()) {
                return Err(QuestionError::DuplicateOption {
                    id: key,
                    option: option.clone(),
                });
            }
        }

        if self.correct_answers.is_empty() {
            return Err(QuestionError::NoCorrectAnswer(key));
        }
        let mut correct_seen = HashSet::new();
        for answer in &self.correct_answers {
            if !seen.contains(answer.as_str()) {
                return Err(QuestionError::CorrectAnswerNotAnOption {
                    id: key,
                    answer: answer.clone(),
                });
            }
            if !correct_seen.insert(answer.as_str()) {
                return Err(QuestionError::DuplicateCorrectAnswer {
                    id: key,
                    answer: answer.clone(),
                });
            }
        }

        let image = match self.image {
            Some(raw) => Some(ImageRef::parse(&raw).ok_or(QuestionError::EmptyImageRef(key))?),
            None => None,
        };

        let explanation = self
            .explanation
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());

        Ok(Question {
            id,
            topic: self.topic,
            category: self.category,
            prompt,
            options: self.options,
            correct_answers: self.correct_answers,
            explanation,
            image,
            difficulty: self.difficulty,
        })
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// An immutable multiple-choice question.
///
/// More than one correct answer makes the question multi-select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionDraft", into = "QuestionDraft")]
pub struct Question {
    id: QuestionId,
    topic: TopicTag,
    category: QuestionCategory,
    prompt: String,
    options: Vec<String>,
    correct_answers: Vec<String>,
    explanation: Option<String>,
    image: Option<ImageRef>,
    difficulty: Difficulty,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn topic(&self) -> TopicTag {
        self.topic
    }

    #[must_use]
    pub fn category(&self) -> QuestionCategory {
        self.category
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answers(&self) -> &[String] {
        &self.correct_answers
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn is_multi_select(&self) -> bool {
        self.correct_answers.len() > 1
    }

    #[must_use]
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// Returns true when `selections` exactly matches the correct answers.
    ///
    /// Multi-select questions compare as sets, so selection order is irrelevant.
    /// Single-answer questions require exactly the one correct option.
    #[must_use]
    pub fn is_answered_correctly(&self, selections: &[String]) -> bool {
        if selections.len() != self.correct_answers.len() {
            return false;
        }
        if self.is_multi_select() {
            let expected: HashSet<&str> = self.correct_answers.iter().map(String::as_str).collect();
            let given: HashSet<&str> = selections.iter().map(String::as_str).collect();
            given.len() == selections.len() && given == expected
        } else {
            selections == self.correct_answers.as_slice()
        }
    }
}

impl TryFrom<QuestionDraft> for Question {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<Question> for QuestionDraft {
    fn from(q: Question) -> Self {
        QuestionDraft {
            id: q.id.into(),
            topic: q.topic,
            category: q.category,
            prompt: q.prompt,
            options: q.options,
            correct_answers: q.correct_answers,
            explanation: q.explanation,
            image: q.image.map(|image| image.to_string()),
            difficulty: q.difficulty,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(correct: &[&str]) -> QuestionDraft {
        QuestionDraft {
            id: "q1".into(),
            topic: TopicTag::Route,
            category: QuestionCategory::OfficialCode,
            prompt: "Which signs apply?".into(),
            options: vec!["X".into(), "Y".into(), "Z".into()],
            correct_answers: correct.iter().map(|s| (*s).to_string()).collect(),
            explanation: None,
            image: None,
            difficulty: Difficulty::Easy,
        }
    }

    fn sel(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn multi_select_is_order_insensitive() {
        let q = draft(&["X", "Y"]).validate().unwrap();
        assert!(q.is_multi_select());
        assert!(q.is_answered_correctly(&sel(&["Y", "X"])));
        assert!(q.is_answered_correctly(&sel(&["X", "Y"])));
    }

    #[test]
    fn multi_select_gives_no_partial_credit() {
        let q = draft(&["X", "Y"]).validate().unwrap();
        assert!(!q.is_answered_correctly(&sel(&["X"])));
        assert!(!q.is_answered_correctly(&sel(&["X", "Y", "Z"])));
        assert!(!q.is_answered_correctly(&sel(&["X", "X"])));
    }

    #[test]
    fn single_answer_requires_exact_match() {
        let q = draft(&["Z"]).validate().unwrap();
        assert!(q.is_answered_correctly(&sel(&["Z"])));
        assert!(!q.is_answered_correctly(&sel(&["X"])));
        assert!(!q.is_answered_correctly(&[]));
    }

    #[test]
    fn correct_answer_must_be_an_option() {
        let err = draft(&["W"]).validate().unwrap_err();
        assert!(matches!(err, QuestionError::CorrectAnswerNotAnOption { .. }));
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let mut d = draft(&["X"]);
        d.prompt = "  ".into();
        assert!(matches!(
            d.validate().unwrap_err(),
            QuestionError::EmptyPrompt(_)
        ));
    }

    #[test]
    fn duplicate_options_are_rejected() {
        let mut d = draft(&["X"]);
        d.options.push("X".into());
        assert!(matches!(
            d.validate().unwrap_err(),
            QuestionError::DuplicateOption { .. }
        ));
    }

    #[test]
    fn deserializes_camel_case_bank_entries() {
        let json = r#"{
            "id": "etg-12",
            "category": "official_code",
            "theme": "conducteur",
            "question": "Alcohol limit?",
            "options": ["0.2", "0.5"],
            "correctAnswers": ["0.5"],
            "imageUrl": "https://example.org/a.png",
            "difficulty": "hard"
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.id().as_str(), "etg-12");
        assert_eq!(q.topic(), TopicTag::Conducteur);
        assert!(matches!(q.image(), Some(ImageRef::Url(_))));
        assert_eq!(q.difficulty(), Difficulty::Hard);
    }

    #[test]
    fn invalid_payload_fails_deserialization() {
        let json = r#"{"id":"a","topic":"route","prompt":"p","options":["x"],"correct_answers":["x"]}"#;
        assert!(serde_json::from_str::<Question>(json).is_err());
    }
}
