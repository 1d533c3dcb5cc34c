//! Repository layer for database operations
//!
//! Typed CRUD and query operations for entries, images and tags.
//! Writes publish the tables they touched on the change bus after commit,
//! which keeps live queries current.

mod diaries;
mod images;
mod tags;

pub use diaries::fts_match_expression;

use super::changes::{ChangeBus, Subscription, Table};
use crate::error::Result;
use sqlx::SqlitePool;
use std::future::Future;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    changes: ChangeBus,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            changes: ChangeBus::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn changes(&self) -> &ChangeBus {
        &self.changes
    }

    /// Run `query` now and again after every write to one of `tables`.
    pub async fn watch<T, F, Fut>(&self, tables: &'static [Table], query: F) -> Result<Subscription<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Repository) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let repo = self.clone();
        self.changes.watch(tables, move || query(repo.clone())).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Repository;
    use crate::database::{create_memory_pool, DiaryEntry, DiaryFields, Mood};
    use chrono::{DateTime, TimeZone, Utc};

    pub async fn create_test_repo() -> Repository {
        Repository::new(create_memory_pool().await.unwrap())
    }

    pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    pub async fn insert(repo: &Repository, title: &str, content: &str, created_at: DateTime<Utc>) -> DiaryEntry {
        repo.insert_diary(&DiaryFields::new(title, content, Mood::Happy), created_at)
            .await
            .unwrap()
    }
}
