use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("unknown topic tag: {0}")]
    Unknown(String),
}

/// Closed set of topics a question can belong to.
///
/// Drives distribution quotas and the thematic breakdown of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicTag {
    CirculationRoutiere,
    Conducteur,
    Route,
    AutresUsagers,
    ReglementationGenerale,
    PrecautionsDiverses,
    ElementsMecaniquesSecurite,
    EquipementsSecurite,
    RegleCirculation,
    Environnement,
}

impl TopicTag {
    /// Every topic, in declaration order.
    pub const ALL: [TopicTag; 10] = [
        TopicTag::CirculationRoutiere,
        TopicTag::Conducteur,
        TopicTag::Route,
        TopicTag::AutresUsagers,
        TopicTag::ReglementationGenerale,
        TopicTag::PrecautionsDiverses,
        TopicTag::ElementsMecaniquesSecurite,
        TopicTag::EquipementsSecurite,
        TopicTag::RegleCirculation,
        TopicTag::Environnement,
    ];

    /// Stable wire/storage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TopicTag::CirculationRoutiere => "circulation_routiere",
            TopicTag::Conducteur => "conducteur",
            TopicTag::Route => "route",
            TopicTag::AutresUsagers => "autres_usagers",
            TopicTag::ReglementationGenerale => "reglementation_generale",
            TopicTag::PrecautionsDiverses => "precautions_diverses",
            TopicTag::ElementsMecaniquesSecurite => "elements_mecaniques_securite",
            TopicTag::EquipementsSecurite => "equipements_securite",
            TopicTag::RegleCirculation => "regle_circulation",
            TopicTag::Environnement => "environnement",
        }
    }

    /// Human readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TopicTag::CirculationRoutiere => "Circulation Routière",
            TopicTag::Conducteur => "Conducteur",
            TopicTag::Route => "Route",
            TopicTag::AutresUsagers => "Autres Usagers",
            TopicTag::ReglementationGenerale => "Réglementation Générale",
            TopicTag::PrecautionsDiverses => "Précautions Diverses",
            TopicTag::ElementsMecaniquesSecurite => "Éléments Mécaniques & Sécurité",
            TopicTag::EquipementsSecurite => "Équipements de Sécurité",
            TopicTag::RegleCirculation => "Règle de Circulation",
            TopicTag::Environnement => "Environnement",
        }
    }
}

impl fmt::Display for TopicTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicTag {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopicTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s.trim())
            .ok_or_else(|| TopicError::Unknown(s.to_owned()))
    }
}
