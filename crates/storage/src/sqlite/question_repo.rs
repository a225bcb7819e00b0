use quiz_core::model::Question;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let start: i64 = sqlx::query("SELECT COALESCE(MAX(position), -1) + 1 AS next FROM questions")
            .fetch_one(&mut *tx)
            .await
            .map_err(conn)?
            .try_get("next")
            .map_err(ser)?;

        for (offset, question) in questions.iter().enumerate() {
            let payload = serde_json::to_string(question).map_err(ser)?;
            let position = start + i64::try_from(offset).map_err(ser)?;
            // Existing ids keep their original position.
            sqlx::query(
                r"
                    INSERT INTO questions (id, topic, position, payload)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(id) DO UPDATE SET
                        topic = excluded.topic,
                        payload = excluded.payload
                ",
            )
            .bind(question.id().as_str())
            .bind(question.topic().as_str())
            .bind(position)
            .bind(payload)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        tracing::debug!(count = questions.len(), "upserted questions");
        Ok(())
    }

    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query("SELECT payload FROM questions ORDER BY position, id")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter()
            .map(|row| {
                let payload: String = row.try_get("payload").map_err(ser)?;
                serde_json::from_str(&payload).map_err(ser)
            })
            .collect()
    }
}
