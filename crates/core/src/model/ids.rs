use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for an attempt, assigned by the attempt store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(u64);

impl AttemptId {
    /// Creates a new `AttemptId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttemptId({})", self.0)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── String Identifiers ────────────────────────────────────────────────────────

/// Error type for parsing an ID from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for AttemptId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(AttemptId::new)
            .map_err(|_| ParseIdError { kind: "AttemptId" })
    }
}

/// Declares a validated, non-blank string identifier.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, trimming surrounding whitespace.
            ///
            /// # Errors
            ///
            /// Returns `ParseIdError` if the value is blank.
            pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
                let id = id.into();
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err(ParseIdError {
                        kind: stringify!($name),
                    });
                }
                Ok(Self(trimmed.to_owned()))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

string_id!(
    /// Unique identifier for a question in the bank.
    QuestionId
);

string_id!(
    /// Identifier of the quiz being played: an exam template key or a generated quiz id.
    QuizId
);

string_id!(
    /// Owning user of attempts and streaks.
    UserId
);

string_id!(
    /// Name of the single well-known local cache slot.
    SlotKey
);

impl QuizId {
    /// The official mock exam.
    #[must_use]
    pub fn exam() -> Self {
        Self("examen_blanc".to_owned())
    }

    /// Returns a fresh id for an ad-hoc generated quiz.
    #[must_use]
    pub fn generated() -> Self {
        Self(format!("gen-{}", uuid::Uuid::new_v4().simple()))
    }
}

impl SlotKey {
    /// The slot used for the in-progress quiz of a user on this device.
    #[must_use]
    pub fn in_progress_for(user: &UserId) -> Self {
        Self(format!("in_progress_quiz:{user}"))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_id_display_and_parse() {
        let id = AttemptId::new(42);
        assert_eq!(id.to_string(), "42");
        let parsed: AttemptId = "42".parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn attempt_id_from_str_invalid() {
        assert!("not-a-number".parse::<AttemptId>().is_err());
    }

    #[test]
    fn question_id_trims_and_rejects_blank() {
        let id = QuestionId::new("  q-1 ").unwrap();
        assert_eq!(id.as_str(), "q-1");
        assert!(QuestionId::new("   ").is_err());
    }

    #[test]
    fn string_ids_deserialize_with_validation() {
        let id: QuizId = serde_json::from_str("\"examen_blanc\"").unwrap();
        assert_eq!(id.as_str(), "examen_blanc");
        assert!(serde_json::from_str::<QuizId>("\"  \"").is_err());
    }

    #[test]
    fn generated_quiz_ids_are_unique() {
        assert_ne!(QuizId::generated(), QuizId::generated());
    }

    #[test]
    fn slot_key_is_scoped_to_user() {
        let user = UserId::new("alice").unwrap();
        assert_eq!(
            SlotKey::in_progress_for(&user).as_str(),
            "in_progress_quiz:alice"
        );
    }
}
