//! Loading question banks from JSON files on disk.

use std::path::Path;

use quiz_core::model::{BankError, QuestionBank};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankLoadError {
    #[error("cannot read bank file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bank(#[from] BankError),
}

/// Read and validate a question bank file.
///
/// Accepts either `{"questions": [...]}` or a bare array of questions.
///
/// # Errors
///
/// Returns `BankLoadError::Io` if the file cannot be read, or
/// `BankLoadError::Bank` if the document or any question is invalid.
pub async fn load_bank_file(path: impl AsRef<Path>) -> Result<QuestionBank, BankLoadError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await?;
    let bank = QuestionBank::from_json(&raw)?;
    tracing::info!(path = %path.display(), questions = bank.len(), "loaded question bank");
    Ok(bank)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.json", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn loads_wrapped_bank() {
        let path = temp_file(
            "bank-wrapped",
            r#"{"questions":[{"id":"q1","theme":"route","question":"Vitesse ?","options":["50","90"],"correctAnswers":["50"]}]}"#,
        );
        let bank = load_bank_file(&path).await.unwrap();
        assert_eq!(bank.len(), 1);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn invalid_question_is_reported() {
        let path = temp_file(
            "bank-invalid",
            r#"[{"id":"q1","theme":"route","question":"?","options":["a","b"],"correctAnswers":["c"]}]"#,
        );
        let err = load_bank_file(&path).await.unwrap_err();
        assert!(matches!(err, BankLoadError::Bank(_)));
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = load_bank_file("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, BankLoadError::Io(_)));
    }
}
