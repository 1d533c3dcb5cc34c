//! Error types for the diary core
//!
//! All errors use thiserror for structured error handling.
//! They serialize to their display string, which is the message shown to the user.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Diary not found: {0}")]
    DiaryNotFound(i64),

    #[error("Image not found: {0}")]
    ImageNotFound(i64),

    #[error("Tag not found: {0}")]
    TagNotFound(i64),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Generic(String),
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Generic(format!("Background task failed: {}", err))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
