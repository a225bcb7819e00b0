use rand::seq::SliceRandom;
use rand::{Rng, rng};
use std::collections::{BTreeMap, HashSet};

use quiz_core::model::{ExamDistribution, Question, QuestionId, TopicTag};

/// Questions picked for a session, with the counts used to build it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub questions: Vec<Question>,
    /// Questions taken per topic during the quota pass.
    pub per_topic: BTreeMap<TopicTag, usize>,
    /// Questions drawn from the rest of the bank to cover topic shortfalls.
    pub backfilled: usize,
}

impl Selection {
    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Picks a session's questions from a bank according to topic quotas.
pub struct DistributionSelector<'a> {
    bank: &'a [Question],
    distribution: &'a ExamDistribution,
    target: usize,
}

impl<'a> DistributionSelector<'a> {
    /// Target length defaults to the distribution total.
    #[must_use]
    pub fn new(bank: &'a [Question], distribution: &'a ExamDistribution) -> Self {
        Self {
            bank,
            distribution,
            target: usize::try_from(distribution.total()).unwrap_or(usize::MAX),
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: usize) -> Self {
        self.target = target;
        self
    }

    /// Build a shuffled selection.
    ///
    /// - each topic contributes up to its quota, shuffled within the topic
    /// - a topic with too few questions contributes what it has
    /// - the shortfall is drawn uniformly from the unselected remainder of the bank
    /// - a bank smaller than the target yields fewer questions
    /// - a target below the quota total keeps a random subset of the quota pass
    #[must_use]
    pub fn build(self) -> Selection {
        self.build_with_rng(&mut rng())
    }

    pub(crate) fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Selection {
        let mut by_topic: BTreeMap<TopicTag, Vec<&Question>> = BTreeMap::new();
        for q in self.bank {
            by_topic.entry(q.topic()).or_default().push(q);
        }

        let mut selected: Vec<Question> = Vec::with_capacity(self.target);
        let mut per_topic = BTreeMap::new();

        for (topic, quota) in self.distribution.iter() {
            let quota = usize::try_from(quota).unwrap_or(usize::MAX);
            let Some(pool) = by_topic.get_mut(&topic) else {
                tracing::debug!(topic = %topic, quota, "no questions for topic");
                per_topic.insert(topic, 0);
                continue;
            };
            pool.as_mut_slice().shuffle(rng);
            let taken: Vec<Question> = pool.iter().take(quota).map(|q| (*q).clone()).collect();
            if taken.len() < quota {
                tracing::debug!(topic = %topic, quota, available = taken.len(), "topic shortfall");
            }
            per_topic.insert(topic, taken.len());
            selected.extend(taken);
        }

        let mut backfilled = 0;
        if selected.len() < self.target {
            let chosen: HashSet<&QuestionId> = selected.iter().map(Question::id).collect();
            let mut rest: Vec<&Question> = self
                .bank
                .iter()
                .filter(|q| !chosen.contains(q.id()))
                .collect();
            rest.as_mut_slice().shuffle(rng);
            let fill: Vec<Question> = rest
                .into_iter()
                .take(self.target - selected.len())
                .cloned()
                .collect();
            backfilled = fill.len();
            selected.extend(fill);
        }

        // Cut after shuffling; quota order must not decide what survives.
        selected.as_mut_slice().shuffle(rng);
        selected.truncate(self.target);

        if selected.len() < self.target {
            tracing::debug!(
                target_len = self.target,
                selected = selected.len(),
                "bank smaller than target"
            );
        }

        Selection {
            questions: selected,
            per_topic,
            backfilled,
        }
    }
}
