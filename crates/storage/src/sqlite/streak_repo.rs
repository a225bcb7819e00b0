use quiz_core::model::{StreakState, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser, u32_from_i64};
use crate::repository::{StorageError, StreakRepository};

#[async_trait::async_trait]
impl StreakRepository for SqliteRepository {
    async fn load_streak(&self, user: &UserId) -> Result<StreakState, StorageError> {
        let row = sqlx::query("SELECT count, last_completion_day FROM streaks WHERE user_id = ?1")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(StreakState::default());
        };
        Ok(StreakState::new(
            u32_from_i64("count", row.try_get::<i64, _>("count").map_err(ser)?)?,
            row.try_get("last_completion_day").map_err(ser)?,
        ))
    }

    async fn save_streak(&self, user: &UserId, streak: &StreakState) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO streaks (user_id, count, last_completion_day)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id) DO UPDATE SET
                    count = excluded.count,
                    last_completion_day = excluded.last_completion_day
            ",
        )
        .bind(user.as_str())
        .bind(i64::from(streak.count))
        .bind(streak.last_completion_day)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
