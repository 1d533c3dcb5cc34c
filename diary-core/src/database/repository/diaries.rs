//! Diary entry queries
//!
//! Every listing here filters out soft-deleted entries and returns
//! newest first. Only `get_diary_by_id` sees deleted rows.

use super::Repository;
use crate::database::changes::Table;
use crate::database::models::*;
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::BTreeSet;

const DIARIES: &[Table] = &[Table::Diaries];

/// A permanent delete cascades into images and tag links
const DIARY_CASCADE: &[Table] = &[Table::Diaries, Table::Images, Table::DiaryTags];

impl Repository {
    /// Insert a new entry, letting SQLite assign the id
    pub async fn insert_diary(&self, fields: &DiaryFields, created_at: DateTime<Utc>) -> Result<DiaryEntry> {
        let entry = sqlx::query_as::<_, DiaryEntry>(
            r#"
            INSERT INTO diary_entries
                (title, content, mood, weather, location, created_at, updated_at, is_favorite, is_deleted)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0)
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.content)
        .bind(fields.mood)
        .bind(fields.weather)
        .bind(&fields.location)
        .bind(created_at)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        self.changes.notify(DIARIES);
        tracing::debug!("Inserted diary: {}", entry.id);
        Ok(entry)
    }

    /// Insert a full row, replacing any existing row with the same id
    pub async fn upsert_diary(&self, entry: &DiaryEntry) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO diary_entries
                (id, title, content, mood, weather, location, created_at, updated_at, is_favorite, is_deleted)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                mood = excluded.mood,
                weather = excluded.weather,
                location = excluded.location,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                is_favorite = excluded.is_favorite,
                is_deleted = excluded.is_deleted
            RETURNING id
            "#,
        )
        .bind(entry.id)
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(entry.mood)
        .bind(entry.weather)
        .bind(&entry.location)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .bind(entry.is_favorite)
        .bind(entry.is_deleted)
        .fetch_one(&self.pool)
        .await?;

        self.changes.notify(DIARIES);
        tracing::debug!("Upserted diary: {}", id);
        Ok(id)
    }

    /// Replace every column of an existing row
    pub async fn update_diary(&self, entry: &DiaryEntry) -> Result<()> {
        let rows = sqlx::query(
            r#"
            UPDATE diary_entries SET
                title = ?, content = ?, mood = ?, weather = ?, location = ?,
                created_at = ?, updated_at = ?, is_favorite = ?, is_deleted = ?
            WHERE id = ?
            "#,
        )
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(entry.mood)
        .bind(entry.weather)
        .bind(&entry.location)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .bind(entry.is_favorite)
        .bind(entry.is_deleted)
        .bind(entry.id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::DiaryNotFound(entry.id));
        }

        self.changes.notify(DIARIES);
        tracing::debug!("Updated diary: {}", entry.id);
        Ok(())
    }

    /// Hide an entry from listings without removing it
    pub async fn soft_delete_diary(&self, id: i64, updated_at: DateTime<Utc>) -> Result<()> {
        let rows = sqlx::query("UPDATE diary_entries SET is_deleted = 1, updated_at = ? WHERE id = ?")
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::DiaryNotFound(id));
        }

        self.changes.notify(DIARIES);
        tracing::debug!("Soft deleted diary: {}", id);
        Ok(())
    }

    /// Remove the row; images and tag links go with it via foreign keys
    pub async fn delete_diary_permanently(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM diary_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::DiaryNotFound(id));
        }

        self.changes.notify(DIARY_CASCADE);
        tracing::debug!("Hard deleted diary: {}", id);
        Ok(())
    }

    /// Direct lookup, including soft-deleted rows
    pub async fn get_diary_by_id(&self, id: i64) -> Result<Option<DiaryEntry>> {
        let entry = sqlx::query_as::<_, DiaryEntry>("SELECT * FROM diary_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Lookup restricted to entries that have not been deleted
    pub async fn get_active_diary(&self, id: i64) -> Result<Option<DiaryEntry>> {
        let entry = sqlx::query_as::<_, DiaryEntry>(
            "SELECT * FROM diary_entries WHERE id = ? AND is_deleted = 0",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    pub async fn get_diary_with_details(&self, id: i64) -> Result<Option<DiaryWithDetails>> {
        let Some(diary) = self.get_active_diary(id).await? else {
            return Ok(None);
        };

        let images = self.list_images_for_diary(id).await?;
        let tags = self.list_tags_for_diary(id).await?;

        Ok(Some(DiaryWithDetails { diary, images, tags }))
    }

    pub async fn list_diaries(&self) -> Result<Vec<DiaryEntry>> {
        let entries = sqlx::query_as::<_, DiaryEntry>(
            r#"
            SELECT * FROM diary_entries
            WHERE is_deleted = 0
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn list_diaries_with_details(&self) -> Result<Vec<DiaryWithDetails>> {
        let entries = self.list_diaries().await?;
        self.attach_details(entries).await
    }

    pub async fn list_diaries_paged(&self, limit: i64, offset: i64) -> Result<Vec<DiaryWithDetails>> {
        let entries = sqlx::query_as::<_, DiaryEntry>(
            r#"
            SELECT * FROM diary_entries
            WHERE is_deleted = 0
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        self.attach_details(entries).await
    }

    /// Entries created within `[start, end]`, inclusive
    pub async fn list_diaries_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DiaryWithDetails>> {
        let entries = sqlx::query_as::<_, DiaryEntry>(
            r#"
            SELECT * FROM diary_entries
            WHERE is_deleted = 0 AND created_at BETWEEN ? AND ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        self.attach_details(entries).await
    }

    /// Entries written on a calendar day in the local timezone
    pub async fn list_diaries_on_date(&self, date: NaiveDate) -> Result<Vec<DiaryEntry>> {
        let start = local_midnight(date);
        let end = date.succ_opt().map(local_midnight).unwrap_or(start);

        let entries = sqlx::query_as::<_, DiaryEntry>(
            r#"
            SELECT * FROM diary_entries
            WHERE is_deleted = 0 AND created_at >= ? AND created_at < ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn list_favorite_diaries(&self) -> Result<Vec<DiaryEntry>> {
        let entries = sqlx::query_as::<_, DiaryEntry>(
            r#"
            SELECT * FROM diary_entries
            WHERE is_deleted = 0 AND is_favorite = 1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn set_favorite(&self, id: i64, is_favorite: bool, updated_at: DateTime<Utc>) -> Result<()> {
        let rows = sqlx::query("UPDATE diary_entries SET is_favorite = ?, updated_at = ? WHERE id = ?")
            .bind(is_favorite)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::DiaryNotFound(id));
        }

        self.changes.notify(DIARIES);
        tracing::debug!("Set favorite for diary {}: {}", id, is_favorite);
        Ok(())
    }

    /// Full-text search over title and content.
    ///
    /// Every whitespace-separated token must match as a prefix.
    pub async fn search_diaries(&self, query: &str) -> Result<Vec<DiaryEntry>> {
        let Some(expression) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };

        let entries = sqlx::query_as::<_, DiaryEntry>(
            r#"
            SELECT diary_entries.* FROM diary_entries
            JOIN diary_entries_fts ON diary_entries.id = diary_entries_fts.rowid
            WHERE diary_entries_fts MATCH ? AND diary_entries.is_deleted = 0
            ORDER BY diary_entries.created_at DESC, diary_entries.id DESC
            "#,
        )
        .bind(&expression)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("Search {:?} matched {} diaries", expression, entries.len());
        Ok(entries)
    }

    /// Distinct local calendar days that have at least one visible entry, ascending
    pub async fn list_dates_with_entries(&self) -> Result<Vec<NaiveDate>> {
        let timestamps: Vec<DateTime<Utc>> =
            sqlx::query_scalar("SELECT created_at FROM diary_entries WHERE is_deleted = 0")
                .fetch_all(&self.pool)
                .await?;

        let dates: BTreeSet<NaiveDate> = timestamps
            .into_iter()
            .map(|ts| ts.with_timezone(&Local).date_naive())
            .collect();

        Ok(dates.into_iter().collect())
    }

    pub async fn count_diaries(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM diary_entries WHERE is_deleted = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn attach_details(&self, entries: Vec<DiaryEntry>) -> Result<Vec<DiaryWithDetails>> {
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        let mut images = self.images_for_diaries(&ids).await?;
        let mut tags = self.tags_for_diaries(&ids).await?;

        Ok(entries
            .into_iter()
            .map(|diary| DiaryWithDetails {
                images: images.remove(&diary.id).unwrap_or_default(),
                tags: tags.remove(&diary.id).unwrap_or_default(),
                diary,
            })
            .collect())
    }
}

/// Turn user input into an FTS5 query: each whitespace token becomes a
/// quoted prefix term, and terms are implicitly AND-ed.
///
/// Returns `None` for blank input.
pub fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|token| format!("\"{}\"*", token.replace('"', "\"\"")))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Start of a local calendar day as a UTC instant
fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);

    Local
        .from_local_datetime(&midnight)
        .earliest()
        // Midnight skipped by a DST jump
        .or_else(|| Local.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
