//! Aggregate statistics over a user's finalized attempts.

use crate::model::{AttemptRecord, TopicTag};
use crate::scoring::{ThematicBreakdown, TopicScore, score_answers};

const THEMES_REPORTED: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStatistics {
    pub total_attempts: u32,
    /// Mean final score, rounded to one decimal.
    pub average_score: f64,
    pub best_score: u32,
    /// Consecutive passing attempts counted back from the newest one.
    pub passing_streak: u32,
    pub weakest_topics: Vec<TopicTag>,
    pub strongest_topics: Vec<TopicTag>,
    pub breakdown: ThematicBreakdown,
}

impl UserStatistics {
    /// Compute statistics from attempts ordered oldest first.
    ///
    /// Attempts without a final score are ignored.
    #[must_use]
    pub fn from_attempts(attempts: &[AttemptRecord], pass_threshold: u32) -> Self {
        let finalized: Vec<(&AttemptRecord, u32)> = attempts
            .iter()
            .filter_map(|a| a.final_score.map(|s| (a, s)))
            .collect();
        if finalized.is_empty() {
            return Self::default();
        }

        let total_attempts = u32::try_from(finalized.len()).unwrap_or(u32::MAX);
        let sum: u64 = finalized.iter().map(|(_, s)| u64::from(*s)).sum();
        #[allow(clippy::cast_precision_loss)]
        let average = sum as f64 / finalized.len() as f64;
        let average_score = (average * 10.0).round() / 10.0;
        let best_score = finalized.iter().map(|(_, s)| *s).max().unwrap_or(0);

        let passing_streak = finalized
            .iter()
            .rev()
            .take_while(|(_, s)| *s >= pass_threshold)
            .count();

        let mut breakdown = ThematicBreakdown::new();
        for (attempt, _) in &finalized {
            let report = score_answers(&attempt.questions, &attempt.answers, pass_threshold);
            for (topic, score) in report.thematic_breakdown {
                let entry: &mut TopicScore = breakdown.entry(topic).or_default();
                entry.correct = entry.correct.saturating_add(score.correct);
                entry.total = entry.total.saturating_add(score.total);
            }
        }

        let mut ranked: Vec<(TopicTag, f64)> = breakdown
            .iter()
            .map(|(topic, score)| (*topic, score.percentage()))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let weakest_topics = ranked.iter().take(THEMES_REPORTED).map(|(t, _)| *t).collect();
        let strongest_topics = ranked
            .iter()
            .rev()
            .take(THEMES_REPORTED)
            .map(|(t, _)| *t)
            .collect();

        Self {
            total_attempts,
            average_score,
            best_score,
            passing_streak: u32::try_from(passing_streak).unwrap_or(u32::MAX),
            weakest_topics,
            strongest_topics,
            breakdown,
        }
    }
}
