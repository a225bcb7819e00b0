use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::topic::TopicTag;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DistributionError {
    #[error("distribution must require at least one question")]
    Empty,
}

/// Per-topic question quota for a structured exam.
///
/// The sum of all counts is the nominal session length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<TopicTag, u32>", into = "BTreeMap<TopicTag, u32>")]
pub struct ExamDistribution {
    quotas: BTreeMap<TopicTag, u32>,
}

impl ExamDistribution {
    /// Build a distribution, dropping zero quotas.
    ///
    /// # Errors
    ///
    /// Returns `DistributionError::Empty` if no topic requires any question.
    pub fn new(quotas: impl IntoIterator<Item = (TopicTag, u32)>) -> Result<Self, DistributionError> {
        let quotas: BTreeMap<TopicTag, u32> = quotas.into_iter().filter(|(_, n)| *n > 0).collect();
        if quotas.is_empty() {
            return Err(DistributionError::Empty);
        }
        Ok(Self { quotas })
    }

    /// The official 40-question exam layout.
    #[must_use]
    pub fn official() -> Self {
        Self {
            quotas: BTreeMap::from([
                (TopicTag::CirculationRoutiere, 8),
                (TopicTag::Conducteur, 6),
                (TopicTag::Route, 5),
                (TopicTag::AutresUsagers, 4),
                (TopicTag::ReglementationGenerale, 4),
                (TopicTag::PrecautionsDiverses, 3),
                (TopicTag::ElementsMecaniquesSecurite, 3),
                (TopicTag::EquipementsSecurite, 3),
                (TopicTag::RegleCirculation, 2),
                (TopicTag::Environnement, 2),
            ]),
        }
    }

    /// Required count for a topic (0 when absent).
    #[must_use]
    pub fn quota(&self, topic: TopicTag) -> u32 {
        self.quotas.get(&topic).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TopicTag, u32)> + '_ {
        self.quotas.iter().map(|(t, n)| (*t, *n))
    }

    /// Nominal session length.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.quotas.values().fold(0_u32, |acc, n| acc.saturating_add(*n))
    }
}

impl Default for ExamDistribution {
    fn default() -> Self {
        Self::official()
    }
}

impl TryFrom<BTreeMap<TopicTag, u32>> for ExamDistribution {
    type Error = DistributionError;

    fn try_from(value: BTreeMap<TopicTag, u32>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExamDistribution> for BTreeMap<TopicTag, u32> {
    fn from(value: ExamDistribution) -> Self {
        value.quotas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn official_distribution_totals_forty() {
        let d = ExamDistribution::official();
        assert_eq!(d.total(), 40);
        assert_eq!(d.quota(TopicTag::CirculationRoutiere), 8);
        assert_eq!(d.quota(TopicTag::Environnement), 2);
    }

    #[test]
    fn zero_quotas_are_dropped_and_empty_is_rejected() {
        let d = ExamDistribution::new([(TopicTag::Route, 3), (TopicTag::Conducteur, 0)]).unwrap();
        assert_eq!(d.iter().count(), 1);
        assert_eq!(
            ExamDistribution::new([(TopicTag::Route, 0)]).unwrap_err(),
            DistributionError::Empty
        );
    }

    #[test]
    fn deserializes_from_topic_map() {
        let d: ExamDistribution = serde_json::from_str(r#"{"route": 2, "conducteur": 1}"#).unwrap();
        assert_eq!(d.total(), 3);
    }
}
