use quiz_core::model::{AnswerMap, AttemptId, AttemptRecord, Question, QuizId, SessionKind, UserId};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn attempt_id_from_i64(v: i64) -> Result<AttemptId, StorageError> {
    Ok(AttemptId::new(i64_to_u64("attempt_id", v)?))
}

pub(crate) fn attempt_id_to_i64(id: AttemptId) -> Result<i64, StorageError> {
    u64_to_i64("attempt_id", id.value())
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<AttemptRecord, StorageError> {
    let questions: Vec<Question> =
        serde_json::from_str(&row.try_get::<String, _>("questions").map_err(ser)?).map_err(ser)?;
    let answers: AnswerMap =
        serde_json::from_str(&row.try_get::<String, _>("answers").map_err(ser)?).map_err(ser)?;
    let kind = row
        .try_get::<String, _>("kind")
        .map_err(ser)?
        .parse::<SessionKind>()
        .map_err(ser)?;

    Ok(AttemptRecord {
        id: attempt_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
        quiz_id: QuizId::new(row.try_get::<String, _>("quiz_id").map_err(ser)?).map_err(ser)?,
        kind,
        questions,
        answers,
        revision: i64_to_u64("revision", row.try_get::<i64, _>("revision").map_err(ser)?)?,
        final_score: row
            .try_get::<Option<i64>, _>("final_score")
            .map_err(ser)?
            .map(|v| u32_from_i64("final_score", v))
            .transpose()?,
        max_score: u32_from_i64("max_score", row.try_get::<i64, _>("max_score").map_err(ser)?)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
        finalized_at: row.try_get("finalized_at").map_err(ser)?,
    })
}
