//! Fire-and-forget persistence of session events.
//!
//! The engine enqueues commands on an unbounded channel; a single worker task
//! drains them in order, so writes for one session never overlap.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use quiz_core::model::{
    AttemptDraft, AttemptId, AttemptUpdate, SessionSnapshot, SlotKey, StreakState, UserId,
};
use storage::repository::{AttemptRepository, SnapshotCache, StorageError, StreakRepository};

use crate::ledger::FinalizationLedger;

/// Remote attempt id of a session, assigned lazily by the worker.
#[derive(Debug, Default)]
pub struct AttemptSlot {
    id: Mutex<Option<AttemptId>>,
}

impl AttemptSlot {
    #[must_use]
    pub fn new(id: Option<AttemptId>) -> Self {
        Self { id: Mutex::new(id) }
    }

    #[must_use]
    pub fn get(&self) -> Option<AttemptId> {
        *self.id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, id: AttemptId) {
        *self.id.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
    }
}

/// Full attempt state pushed to the remote store.
#[derive(Debug, Clone)]
pub struct AttemptSync {
    /// Used to create the attempt when the slot is still empty.
    pub draft: AttemptDraft,
    pub update: AttemptUpdate,
}

#[derive(Debug)]
pub enum PersistCommand {
    /// Sync the remote attempt (if any) and then overwrite the cache slot.
    ///
    /// Once a final score lands remotely the slot is cleared instead.
    Event {
        slot: Arc<AttemptSlot>,
        attempt: Option<AttemptSync>,
        snapshot: Option<SessionSnapshot>,
    },
    ClearSnapshot,
    SaveStreak {
        user: UserId,
        streak: StreakState,
    },
    Flush(oneshot::Sender<()>),
}

/// Cheap, clonable sender side of the worker.
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistenceHandle {
    fn send(&self, command: PersistCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("persistence worker stopped; dropping command");
        }
    }

    pub fn event(
        &self,
        slot: Arc<AttemptSlot>,
        attempt: Option<AttemptSync>,
        snapshot: Option<SessionSnapshot>,
    ) {
        self.send(PersistCommand::Event {
            slot,
            attempt,
            snapshot,
        });
    }

    pub fn clear_snapshot(&self) {
        self.send(PersistCommand::ClearSnapshot);
    }

    pub fn save_streak(&self, user: UserId, streak: StreakState) {
        self.send(PersistCommand::SaveStreak { user, streak });
    }

    /// Wait until every command sent before this call has been processed.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.send(PersistCommand::Flush(done));
        // A closed worker has nothing left to flush.
        let _ = wait.await;
    }
}

/// Single consumer applying persistence commands in order.
pub struct PersistenceWorker {
    rx: mpsc::UnboundedReceiver<PersistCommand>,
    attempts: Arc<dyn AttemptRepository>,
    snapshots: Arc<dyn SnapshotCache>,
    streaks: Arc<dyn StreakRepository>,
    slot_key: SlotKey,
    ledger: FinalizationLedger,
}

impl PersistenceWorker {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// The worker stops once every `PersistenceHandle` is dropped.
    #[must_use]
    pub fn spawn(
        attempts: Arc<dyn AttemptRepository>,
        snapshots: Arc<dyn SnapshotCache>,
        streaks: Arc<dyn StreakRepository>,
        slot_key: SlotKey,
        ledger: FinalizationLedger,
    ) -> (PersistenceHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            rx,
            attempts,
            snapshots,
            streaks,
            slot_key,
            ledger,
        };
        (PersistenceHandle { tx }, tokio::spawn(worker.run()))
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                PersistCommand::Event {
                    slot,
                    attempt,
                    snapshot,
                } => {
                    let mut finalized = false;
                    if let Some(sync) = attempt {
                        let finalizing = sync.update.final_score.is_some();
                        finalized = self.sync_attempt(&slot, sync).await && finalizing;
                    }
                    if finalized {
                        self.clear_snapshot().await;
                    } else if let Some(mut snapshot) = snapshot {
                        snapshot.remote_attempt_id = snapshot.remote_attempt_id.or(slot.get());
                        self.write_snapshot(&snapshot).await;
                    }
                }
                PersistCommand::ClearSnapshot => self.clear_snapshot().await,
                PersistCommand::SaveStreak { user, streak } => {
                    if let Err(e) = self.streaks.save_streak(&user, &streak).await {
                        tracing::warn!(user = %user, error = %e, "failed to save streak");
                    }
                }
                PersistCommand::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        tracing::debug!(slot = %self.slot_key, "persistence worker stopped");
    }

    async fn clear_snapshot(&self) {
        if let Err(e) = self.snapshots.clear_snapshot(&self.slot_key).await {
            tracing::warn!(slot = %self.slot_key, error = %e, "failed to clear snapshot");
        }
    }

    async fn write_snapshot(&self, snapshot: &SessionSnapshot) {
        if let Err(e) = self.snapshots.write_snapshot(&self.slot_key, snapshot).await {
            tracing::warn!(slot = %self.slot_key, error = %e, "failed to write snapshot");
        }
    }

    /// Returns true when the remote store holds this state (or a newer one).
    async fn sync_attempt(&self, slot: &AttemptSlot, sync: AttemptSync) -> bool {
        let id = match slot.get() {
            Some(id) => id,
            None => match self.attempts.create_attempt(&sync.draft).await {
                Ok(id) => {
                    tracing::info!(attempt = %id, quiz = %sync.draft.quiz_id, "created remote attempt");
                    slot.set(id);
                    id
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to create remote attempt; will retry on next event");
                    return false;
                }
            },
        };

        let finalizing = sync.update.final_score.is_some();
        if finalizing && !self.ledger.claim(id) {
            tracing::debug!(attempt = %id, "attempt already finalized; skipping");
            return true;
        }

        match self.attempts.update_attempt(id, &sync.update).await {
            Ok(()) => {
                if finalizing {
                    tracing::info!(attempt = %id, score = ?sync.update.final_score, "attempt finalized");
                }
                true
            }
            Err(StorageError::Conflict) => {
                tracing::debug!(
                    attempt = %id,
                    revision = sync.update.revision,
                    "stale attempt update ignored"
                );
                true
            }
            Err(e) => {
                if finalizing {
                    self.ledger.release(id);
                }
                tracing::warn!(attempt = %id, error = %e, "failed to update remote attempt");
                false
            }
        }
    }
}
