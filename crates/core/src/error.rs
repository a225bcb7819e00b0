use thiserror::Error;

use crate::model::{
    BankError, DistributionError, QuestionError, SessionKindError, SettingsError, TopicError,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    SessionKind(#[from] SessionKindError),
}
