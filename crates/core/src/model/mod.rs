mod answers;
mod attempt;
mod bank;
mod distribution;
mod ids;
mod question;
mod session;
mod settings;
mod snapshot;
mod streak;
mod topic;

pub use answers::{AnswerMap, Selections};
pub use attempt::{AttemptDraft, AttemptRecord, AttemptUpdate};
pub use bank::{BankError, QuestionBank};
pub use distribution::{DistributionError, ExamDistribution};
pub use ids::{AttemptId, ParseIdError, QuestionId, QuizId, SlotKey, UserId};
pub use question::{
    Difficulty, ImageRef, Question, QuestionCategory, QuestionDraft, QuestionError,
};
pub use session::{SessionKind, SessionKindError};
pub use settings::{QuizSettings, SettingsError};
pub use snapshot::SessionSnapshot;
pub use streak::{SessionStreak, StreakState};
pub use topic::{TopicError, TopicTag};
