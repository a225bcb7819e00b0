use chrono::Utc;
use quiz_core::model::{SessionSnapshot, SlotKey};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{SnapshotCache, StorageError};

#[async_trait::async_trait]
impl SnapshotCache for SqliteRepository {
    async fn read_snapshot(&self, slot: &SlotKey) -> Result<Option<SessionSnapshot>, StorageError> {
        let row = sqlx::query("SELECT payload FROM session_snapshots WHERE slot = ?1")
            .bind(slot.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.try_get("payload").map_err(ser)?;
        SessionSnapshot::from_json(&payload).map(Some).map_err(ser)
    }

    async fn write_snapshot(
        &self,
        slot: &SlotKey,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let payload = snapshot.to_json().map_err(ser)?;
        sqlx::query(
            r"
                INSERT INTO session_snapshots (slot, payload, written_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(slot) DO UPDATE SET
                    payload = excluded.payload,
                    written_at = excluded.written_at
            ",
        )
        .bind(slot.as_str())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn clear_snapshot(&self, slot: &SlotKey) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM session_snapshots WHERE slot = ?1")
            .bind(slot.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
