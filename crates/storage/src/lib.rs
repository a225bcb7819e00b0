#![forbid(unsafe_code)]

pub mod bank;
pub mod repository;
pub mod sqlite;

pub use bank::{BankLoadError, load_bank_file};
pub use repository::{
    AttemptRepository, InMemoryRepository, QuestionRepository, SnapshotCache, Storage,
    StorageError, StreakRepository,
};
