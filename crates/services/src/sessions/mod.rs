mod engine;
mod history;
mod image_quiz;
mod progress;
mod reconcile;
mod selector;
mod state;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use engine::{Entry, FinalReport, QuizEngine, StartRequest, Step};
pub use history::AttemptHistoryService;
pub use image_quiz::{
    DEFAULT_IMAGE_PROMPT, DEFAULT_IMAGE_QUESTION_COUNT, ImageQuizBuilder, ImageQuizError,
};
pub use progress::Progress;
pub use reconcile::{Resolution, ResumeOffer, ResumeReconciler, next_unanswered_index};
pub use selector::{DistributionSelector, Selection};
pub use state::{QuizSession, RestoredState, SessionPhase};
