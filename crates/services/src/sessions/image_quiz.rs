//! Image recognition quizzes built from labelled pictures (e.g. brand logos).

use rand::seq::SliceRandom;
use rand::{Rng, rng};
use std::collections::HashSet;
use thiserror::Error;

use quiz_core::model::{
    Difficulty, ImageRef, Question, QuestionCategory, QuestionDraft, QuestionError, TopicTag,
};

pub const DEFAULT_IMAGE_QUESTION_COUNT: usize = 20;
pub const DEFAULT_IMAGE_PROMPT: &str = "Quelle est cette marque automobile ?";

const DISTRACTORS: usize = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImageQuizError {
    #[error("entry {0} has an empty label")]
    EmptyLabel(usize),

    #[error("image quiz needs at least {needed} distinct labels, got {got}")]
    TooFewLabels { needed: usize, got: usize },

    #[error(transparent)]
    Question(#[from] QuestionError),
}

/// Builds `ImageRecognition` questions: one picture, its label and three
/// labels taken from other entries.
pub struct ImageQuizBuilder<'a> {
    entries: &'a [(String, ImageRef)],
    count: usize,
    prompt: String,
}

impl<'a> ImageQuizBuilder<'a> {
    #[must_use]
    pub fn new(entries: &'a [(String, ImageRef)]) -> Self {
        Self {
            entries,
            count: DEFAULT_IMAGE_QUESTION_COUNT,
            prompt: DEFAULT_IMAGE_PROMPT.to_owned(),
        }
    }

    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Pick up to `count` entries at random and turn each into a question.
    ///
    /// # Errors
    ///
    /// Returns `ImageQuizError::EmptyLabel` for a blank label and
    /// `ImageQuizError::TooFewLabels` when fewer than four distinct labels exist.
    pub fn build(self) -> Result<Vec<Question>, ImageQuizError> {
        self.build_with_rng(&mut rng())
    }

    pub(crate) fn build_with_rng<R: Rng + ?Sized>(
        self,
        rng: &mut R,
    ) -> Result<Vec<Question>, ImageQuizError> {
        let mut seen = HashSet::new();
        let mut labels: Vec<&str> = Vec::new();
        for (i, (label, _)) in self.entries.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(ImageQuizError::EmptyLabel(i));
            }
            if seen.insert(label.as_str()) {
                labels.push(label);
            }
        }
        if labels.len() <= DISTRACTORS {
            return Err(ImageQuizError::TooFewLabels {
                needed: DISTRACTORS + 1,
                got: labels.len(),
            });
        }

        let mut picked: Vec<&(String, ImageRef)> = self.entries.iter().collect();
        picked.as_mut_slice().shuffle(rng);
        picked.truncate(self.count);

        let mut questions = Vec::with_capacity(picked.len());
        for (i, (label, image)) in picked.into_iter().enumerate() {
            let mut others: Vec<&str> = labels
                .iter()
                .copied()
                .filter(|l| *l != label.as_str())
                .collect();
            others.as_mut_slice().shuffle(rng);

            let mut options: Vec<String> = others
                .into_iter()
                .take(DISTRACTORS)
                .map(str::to_owned)
                .collect();
            options.push(label.clone());
            options.as_mut_slice().shuffle(rng);

            let question = QuestionDraft {
                id: format!("img-{}", i + 1),
                topic: TopicTag::AutresUsagers,
                category: QuestionCategory::GeneralKnowledge,
                prompt: self.prompt.clone(),
                options,
                correct_answers: vec![label.clone()],
                explanation: None,
                image: Some(image.to_string()),
                difficulty: Difficulty::Medium,
            }
            .validate()?;
            questions.push(question);
        }

        tracing::debug!(
            pool = self.entries.len(),
            labels = labels.len(),
            questions = questions.len(),
            "built image quiz"
        );
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::PathBuf;

    fn logos(n: usize) -> Vec<(String, ImageRef)> {
        (0..n)
            .map(|i| {
                let path = PathBuf::from(format!("logos/{i}.png"));
                (format!("Brand {i}"), ImageRef::Asset(path))
            })
            .collect()
    }

    #[test]
    fn takes_at_most_the_pool() {
        let pool = logos(6);
        let all = ImageQuizBuilder::new(&pool)
            .build_with_rng(&mut StdRng::seed_from_u64(2))
            .unwrap();
        assert_eq!(all.len(), 6);

        let some = ImageQuizBuilder::new(&pool)
            .with_count(4)
            .build_with_rng(&mut StdRng::seed_from_u64(2))
            .unwrap();
        assert_eq!(some.len(), 4);
        let labels: HashSet<&str> = some
            .iter()
            .map(|q| q.correct_answers()[0].as_str())
            .collect();
        assert_eq!(labels.len(), 4);
    }

    #[test]
    fn each_question_has_four_distinct_options_with_the_answer() {
        let pool = logos(25);
        let questions = ImageQuizBuilder::new(&pool)
            .build_with_rng(&mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(questions.len(), DEFAULT_IMAGE_QUESTION_COUNT);

        for (i, q) in questions.iter().enumerate() {
            assert_eq!(q.id().as_str(), format!("img-{}", i + 1));
            assert_eq!(q.options().len(), 4);
            let unique: HashSet<&String> = q.options().iter().collect();
            assert_eq!(unique.len(), 4);
            assert!(!q.is_multi_select());
            let answer = &q.correct_answers()[0];
            assert!(q.has_option(answer));

            let (_, image) = pool.iter().find(|(label, _)| label == answer).unwrap();
            assert_eq!(q.image(), Some(image));
            assert_eq!(q.prompt(), DEFAULT_IMAGE_PROMPT);
        }
    }

    #[test]
    fn repeated_labels_are_not_offered_twice() {
        let mut pool = logos(4);
        pool.push(pool[0].clone());
        let questions = ImageQuizBuilder::new(&pool)
            .build_with_rng(&mut StdRng::seed_from_u64(4))
            .unwrap();
        for q in &questions {
            let unique: HashSet<&String> = q.options().iter().collect();
            assert_eq!(unique.len(), 4);
        }
    }

    #[test]
    fn too_few_labels_is_rejected() {
        let mut pool = logos(3);
        pool.push(pool[1].clone());
        let err = ImageQuizBuilder::new(&pool).build().unwrap_err();
        assert_eq!(err, ImageQuizError::TooFewLabels { needed: 4, got: 3 });

        let mut blank = logos(5);
        blank[2].0 = "  ".into();
        assert_eq!(
            ImageQuizBuilder::new(&blank).build().unwrap_err(),
            ImageQuizError::EmptyLabel(2)
        );
    }
}
