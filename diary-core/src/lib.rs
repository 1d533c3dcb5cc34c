//! Diary core library
//!
//! Data-access layer of a personal diary: entries with mood and weather,
//! photos with thumbnails, tags, full-text search, live queries and
//! user preferences.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;

pub use app::AppState;
pub use error::{AppError, Result};
