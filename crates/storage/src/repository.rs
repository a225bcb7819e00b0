use async_trait::async_trait;
use quiz_core::model::{
    AttemptDraft, AttemptId, AttemptRecord, AttemptUpdate, Question, QuizId, SessionKind,
    SessionSnapshot, SlotKey, StreakState, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Remote-authoritative store of quiz attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Create an attempt with no answers and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn create_attempt(&self, draft: &AttemptDraft) -> Result<AttemptId, StorageError>;

    /// Replace the answer map (and optionally set the final score) of an attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the attempt does not exist.
    /// Returns `StorageError::Conflict` if `update.revision` is not newer than the
    /// stored revision or the attempt is already finalized.
    async fn update_attempt(&self, id: AttemptId, update: &AttemptUpdate)
    -> Result<(), StorageError>;

    /// Fetch an attempt by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_attempt(&self, id: AttemptId) -> Result<AttemptRecord, StorageError>;

    /// Most recently created attempt of `user` for `quiz`, finalized or not.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn latest_attempt_for_quiz(
        &self,
        user: &UserId,
        quiz: &QuizId,
    ) -> Result<Option<AttemptRecord>, StorageError>;

    /// Attempts of `user`, newest first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_attempts(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError>;

    /// Finalized attempts of `user`, newest first, at most `limit`.
    ///
    /// `kind` narrows the list to one session kind. The limit applies after
    /// filtering, so open attempts never crowd out finished ones.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_finalized_attempts(
        &self,
        user: &UserId,
        kind: Option<SessionKind>,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError>;
}

/// Durable local cache holding at most one snapshot per slot.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be read or decoded.
    async fn read_snapshot(&self, slot: &SlotKey) -> Result<Option<SessionSnapshot>, StorageError>;

    /// Overwrite the slot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn write_snapshot(
        &self,
        slot: &SlotKey,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError>;

    /// Remove the slot content; clearing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_snapshot(&self, slot: &SlotKey) -> Result<(), StorageError>;
}

/// Persistence for the calendar-day completion streak.
#[async_trait]
pub trait StreakRepository: Send + Sync {
    /// Stored streak, or the default (no credit yet) when absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn load_streak(&self, user: &UserId) -> Result<StreakState, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn save_streak(&self, user: &UserId, streak: &StreakState) -> Result<(), StorageError>;
}

/// Read-mostly question bank store.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert or replace questions, keeping the given order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a question cannot be stored.
    async fn upsert_questions(&self, questions: &[Question]) -> Result<(), StorageError>;

    /// All questions in bank order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures or undecodable rows.
    async fn list_questions(&self) -> Result<Vec<Question>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// `set_attempts_offline(true)` makes every attempt operation fail with
/// `StorageError::Connection`, simulating an unreachable remote store.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    attempts: Arc<Mutex<HashMap<AttemptId, AttemptRecord>>>,
    next_attempt_id: Arc<AtomicU64>,
    attempts_offline: Arc<AtomicBool>,
    snapshots: Arc<Mutex<HashMap<SlotKey, SessionSnapshot>>>,
    streaks: Arc<Mutex<HashMap<UserId, StreakState>>>,
    questions: Arc<Mutex<Vec<Question>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attempts_offline(&self, offline: bool) {
        self.attempts_offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StorageError> {
        if self.attempts_offline.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("attempt store unreachable".into()));
        }
        Ok(())
    }

    /// Remove an attempt, as an expiring remote store would.
    pub fn forget_attempt(&self, id: AttemptId) {
        if let Ok(mut guard) = self.attempts.lock() {
            guard.remove(&id);
        }
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn create_attempt(&self, draft: &AttemptDraft) -> Result<AttemptId, StorageError> {
        self.ensure_online()?;
        let id = AttemptId::new(self.next_attempt_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        guard.insert(id, AttemptRecord::from_draft(id, draft.clone()));
        Ok(id)
    }

    async fn update_attempt(
        &self,
        id: AttemptId,
        update: &AttemptUpdate,
    ) -> Result<(), StorageError> {
        self.ensure_online()?;
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        let record = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        if record.is_finalized() || !record.accepts(update) {
            return Err(StorageError::Conflict);
        }
        record.apply(update.clone());
        Ok(())
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<AttemptRecord, StorageError> {
        self.ensure_online()?;
        let guard = self.attempts.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn latest_attempt_for_quiz(
        &self,
        user: &UserId,
        quiz: &QuizId,
    ) -> Result<Option<AttemptRecord>, StorageError> {
        self.ensure_online()?;
        let guard = self.attempts.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .filter(|a| a.user_id == *user && a.quiz_id == *quiz)
            .max_by_key(|a| (a.created_at, a.id))
            .cloned())
    }

    async fn list_attempts(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        self.ensure_online()?;
        let guard = self.attempts.lock().map_err(poisoned)?;
        Ok(newest_first(
            guard.values().filter(|a| a.user_id == *user),
            limit,
        ))
    }

    async fn list_finalized_attempts(
        &self,
        user: &UserId,
        kind: Option<SessionKind>,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        self.ensure_online()?;
        let guard = self.attempts.lock().map_err(poisoned)?;
        Ok(newest_first(
            guard.values().filter(|a| {
                a.user_id == *user && a.is_finalized() && kind.is_none_or(|k| a.kind == k)
            }),
            limit,
        ))
    }
}

fn newest_first<'a>(
    attempts: impl Iterator<Item = &'a AttemptRecord>,
    limit: u32,
) -> Vec<AttemptRecord> {
    let mut found: Vec<AttemptRecord> = attempts.cloned().collect();
    found.sort_by_key(|a| std::cmp::Reverse((a.created_at, a.id)));
    found.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    found
}

#[async_trait]
impl SnapshotCache for InMemoryRepository {
    async fn read_snapshot(&self, slot: &SlotKey) -> Result<Option<SessionSnapshot>, StorageError> {
        let guard = self.snapshots.lock().map_err(poisoned)?;
        Ok(guard.get(slot).cloned())
    }

    async fn write_snapshot(
        &self,
        slot: &SlotKey,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let mut guard = self.snapshots.lock().map_err(poisoned)?;
        guard.insert(slot.clone(), snapshot.clone());
        Ok(())
    }

    async fn clear_snapshot(&self, slot: &SlotKey) -> Result<(), StorageError> {
        let mut guard = self.snapshots.lock().map_err(poisoned)?;
        guard.remove(slot);
        Ok(())
    }
}

#[async_trait]
impl StreakRepository for InMemoryRepository {
    async fn load_streak(&self, user: &UserId) -> Result<StreakState, StorageError> {
        let guard = self.streaks.lock().map_err(poisoned)?;
        Ok(guard.get(user).copied().unwrap_or_default())
    }

    async fn save_streak(&self, user: &UserId, streak: &StreakState) -> Result<(), StorageError> {
        let mut guard = self.streaks.lock().map_err(poisoned)?;
        guard.insert(user.clone(), *streak);
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        for q in questions {
            match guard.iter_mut().find(|existing| existing.id() == q.id()) {
                Some(existing) => *existing = q.clone(),
                None => guard.push(q.clone()),
            }
        }
        Ok(())
    }

    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub attempts: Arc<dyn AttemptRepository>,
    pub snapshots: Arc<dyn SnapshotCache>,
    pub streaks: Arc<dyn StreakRepository>,
    pub questions: Arc<dyn QuestionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(&InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository so callers keep a handle to it.
    #[must_use]
    pub fn from_in_memory(repo: &InMemoryRepository) -> Self {
        Self {
            attempts: Arc::new(repo.clone()),
            snapshots: Arc::new(repo.clone()),
            streaks: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
        }
    }
}
