use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ids::QuestionId;

/// Option strings selected for one question, in selection order.
pub type Selections = Vec<String>;

/// Recorded answers keyed by question id.
///
/// Keys are unique; insertion order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<QuestionId, Selections>);

impl AnswerMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&[String]> {
        self.0.get(id).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.0.contains_key(id)
    }

    /// Replace the whole selection for a question.
    pub fn set(&mut self, id: QuestionId, selections: Selections) {
        self.0.insert(id, selections);
    }

    /// Add `option` if absent, remove it if present.
    ///
    /// The entry stays in the map even when its selection becomes empty,
    /// so the question still counts as visited.
    pub fn toggle(&mut self, id: QuestionId, option: &str) {
        let entry = self.0.entry(id).or_default();
        if let Some(pos) = entry.iter().position(|o| o == option) {
            entry.remove(pos);
        } else {
            entry.push(option.to_owned());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &Selections)> {
        self.0.iter()
    }
}

impl FromIterator<(QuestionId, Selections)> for AnswerMap {
    fn from_iter<T: IntoIterator<Item = (QuestionId, Selections)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qid(s: &str) -> QuestionId {
        QuestionId::new(s).unwrap()
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut answers = AnswerMap::new();
        answers.toggle(qid("q1"), "X");
        answers.toggle(qid("q1"), "Y");
        assert_eq!(answers.get(&qid("q1")).unwrap(), ["X", "Y"]);

        answers.toggle(qid("q1"), "X");
        assert_eq!(answers.get(&qid("q1")).unwrap(), ["Y"]);
    }

    #[test]
    fn set_replaces_selection() {
        let mut answers = AnswerMap::new();
        answers.set(qid("q1"), vec!["A".into()]);
        answers.set(qid("q1"), vec!["B".into()]);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers.get(&qid("q1")).unwrap(), ["B"]);
    }

    #[test]
    fn serializes_as_plain_object() {
        let answers: AnswerMap = [(qid("q1"), vec!["A".to_string()])].into_iter().collect();
        let json = serde_json::to_string(&answers).unwrap();
        assert_eq!(json, r#"{"q1":["A"]}"#);
        let back: AnswerMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, answers);
    }
}
