//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::QuestionId;
use storage::repository::StorageError;

use crate::sessions::SessionPhase;

/// An operation was invoked in a phase that does not allow it.
///
/// This is a caller bug, not a recoverable condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {op} while the session is {phase}")]
pub struct TransitionError {
    pub op: &'static str,
    pub phase: SessionPhase,
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("no questions available for session")]
    Empty,
    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),
    #[error("option {option:?} does not belong to question {question}")]
    UnknownOption { question: QuestionId, option: String },
    #[error("no active session")]
    NoSession,
    #[error("no resume offer pending")]
    NoResumeOffer,
    #[error(transparent)]
    Storage(#[from] StorageError),
}
