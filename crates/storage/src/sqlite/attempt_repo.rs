use quiz_core::model::{
    AttemptDraft, AttemptId, AttemptRecord, AttemptUpdate, QuizId, SessionKind, UserId,
};

use super::SqliteRepository;
use super::mapping::{
    attempt_id_from_i64, attempt_id_to_i64, conn, map_attempt_row, ser, u64_to_i64,
};
use crate::repository::{AttemptRepository, StorageError};

const ATTEMPT_COLUMNS: &str = r"
    id, user_id, quiz_id, kind, questions, answers, revision,
    final_score, max_score, created_at, updated_at, finalized_at
";

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn create_attempt(&self, draft: &AttemptDraft) -> Result<AttemptId, StorageError> {
        let questions = serde_json::to_string(&draft.questions).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO attempts (
                    user_id, quiz_id, kind, questions, answers, revision,
                    final_score, max_score, created_at, updated_at, finalized_at
                )
                VALUES (?1, ?2, ?3, ?4, '{}', 0, NULL, ?5, ?6, ?6, NULL)
            ",
        )
        .bind(draft.user_id.as_str())
        .bind(draft.quiz_id.as_str())
        .bind(draft.kind.as_str())
        .bind(questions)
        .bind(i64::from(draft.max_score))
        .bind(draft.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        attempt_id_from_i64(res.last_insert_rowid())
    }

    async fn update_attempt(
        &self,
        id: AttemptId,
        update: &AttemptUpdate,
    ) -> Result<(), StorageError> {
        let id_i64 = attempt_id_to_i64(id)?;
        let revision = u64_to_i64("revision", update.revision)?;
        let answers = serde_json::to_string(&update.answers).map_err(ser)?;

        // Only a strictly newer revision of an open attempt may land.
        let res = sqlx::query(
            r"
                UPDATE attempts
                SET answers = ?2,
                    revision = ?3,
                    updated_at = ?4,
                    final_score = ?5,
                    finalized_at = CASE WHEN ?5 IS NULL THEN NULL ELSE ?4 END
                WHERE id = ?1 AND revision < ?3 AND final_score IS NULL
            ",
        )
        .bind(id_i64)
        .bind(answers)
        .bind(revision)
        .bind(update.updated_at)
        .bind(update.final_score.map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() > 0 {
            return Ok(());
        }

        let exists = sqlx::query("SELECT 1 FROM attempts WHERE id = ?1")
            .bind(id_i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .is_some();
        if exists {
            Err(StorageError::Conflict)
        } else {
            Err(StorageError::NotFound)
        }
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<AttemptRecord, StorageError> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(attempt_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        map_attempt_row(&row)
    }

    async fn latest_attempt_for_quiz(
        &self,
        user: &UserId,
        quiz: &QuizId,
    ) -> Result<Option<AttemptRecord>, StorageError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts
             WHERE user_id = ?1 AND quiz_id = ?2
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(quiz.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_attempt_row).transpose()
    }

    async fn list_attempts(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_attempt_row).collect()
    }

    async fn list_finalized_attempts(
        &self,
        user: &UserId,
        kind: Option<SessionKind>,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts
             WHERE user_id = ?1 AND final_score IS NOT NULL
               AND (?2 IS NULL OR kind = ?2)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(kind.map(SessionKind::as_str))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_attempt_row).collect()
    }
}
