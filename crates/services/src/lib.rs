#![forbid(unsafe_code)]

pub mod error;
pub mod ledger;
pub mod persistence;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use error::{SessionError, TransitionError};
pub use ledger::FinalizationLedger;
pub use persistence::{AttemptSlot, PersistenceHandle, PersistenceWorker};

pub use sessions::{
    AttemptHistoryService, Entry, FinalReport, ImageQuizBuilder, ImageQuizError, Progress,
    QuizEngine, QuizSession, ResumeOffer, StartRequest, Step,
};
