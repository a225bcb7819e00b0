use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionKindError {
    #[error("unknown session kind: {0}")]
    Unknown(String),
}

/// Flavour of a quiz session.
///
/// All kinds share the same progression, scoring and resume contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Fixed-distribution exam built from the question bank.
    Exam,
    /// Ad-hoc quiz from a caller-supplied question list.
    Generated,
    /// Picture-based quiz (logos, road signs) from a caller-supplied list.
    ImageRecognition,
}

impl SessionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Exam => "exam",
            SessionKind::Generated => "generated",
            SessionKind::ImageRecognition => "image_recognition",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = SessionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exam" => Ok(SessionKind::Exam),
            "generated" => Ok(SessionKind::Generated),
            "image_recognition" => Ok(SessionKind::ImageRecognition),
            other => Err(SessionKindError::Unknown(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in [
            SessionKind::Exam,
            SessionKind::Generated,
            SessionKind::ImageRecognition,
        ] {
            assert_eq!(kind.as_str().parse::<SessionKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
