use thiserror::Error;

use crate::model::distribution::ExamDistribution;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("target question count must be > 0")]
    InvalidTargetCount,

    #[error("question time limit must be between 5 and 600 seconds")]
    InvalidTimeLimit,

    #[error("pass threshold ({threshold}) cannot exceed target question count ({target})")]
    ThresholdAboveTarget { threshold: u32, target: u32 },
}

/// Caller-supplied quiz configuration.
///
/// Nothing in the engine hard-codes these values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSettings {
    distribution: ExamDistribution,
    pass_threshold: u32,
    question_time_limit_secs: u32,
    target_count: u32,
}

impl QuizSettings {
    /// Official exam defaults: 40 questions, pass at 35, 20 seconds per question.
    #[must_use]
    pub fn exam_defaults() -> Self {
        Self {
            distribution: ExamDistribution::official(),
            pass_threshold: 35,
            question_time_limit_secs: 20,
            target_count: 40,
        }
    }

    /// Creates custom quiz settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if a value is out of range.
    pub fn new(
        distribution: ExamDistribution,
        pass_threshold: u32,
        question_time_limit_secs: u32,
        target_count: u32,
    ) -> Result<Self, SettingsError> {
        if target_count == 0 {
            return Err(SettingsError::InvalidTargetCount);
        }
        if !(5..=600).contains(&question_time_limit_secs) {
            return Err(SettingsError::InvalidTimeLimit);
        }
        if pass_threshold > target_count {
            return Err(SettingsError::ThresholdAboveTarget {
                threshold: pass_threshold,
                target: target_count,
            });
        }
        Ok(Self {
            distribution,
            pass_threshold,
            question_time_limit_secs,
            target_count,
        })
    }

    #[must_use]
    pub fn distribution(&self) -> &ExamDistribution {
        &self.distribution
    }

    #[must_use]
    pub fn pass_threshold(&self) -> u32 {
        self.pass_threshold
    }

    #[must_use]
    pub fn question_time_limit_secs(&self) -> u32 {
        self.question_time_limit_secs
    }

    #[must_use]
    pub fn question_time_limit(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.question_time_limit_secs))
    }

    #[must_use]
    pub fn target_count(&self) -> u32 {
        self.target_count
    }
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self::exam_defaults()
    }
}
