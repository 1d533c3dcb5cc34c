//! Image row queries
//!
//! `sort_order` stays dense from 0 within an entry: deleting renumbers
//! the remaining images and reordering must name every image exactly once.

use super::Repository;
use crate::database::changes::Table;
use crate::database::models::{DiaryImage, NewDiaryImage};
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::{HashMap, HashSet};

const IMAGES: &[Table] = &[Table::Images];

impl Repository {
    pub async fn insert_image(&self, image: &NewDiaryImage) -> Result<DiaryImage> {
        let inserted = sqlx::query_as::<_, DiaryImage>(
            r#"
            INSERT INTO diary_images (diary_id, image_path, thumbnail_path, sort_order, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(image.diary_id)
        .bind(&image.image_path)
        .bind(&image.thumbnail_path)
        .bind(image.sort_order)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        self.changes.notify(IMAGES);
        tracing::debug!("Created image: {} for diary: {}", inserted.id, inserted.diary_id);
        Ok(inserted)
    }

    pub async fn update_image(&self, image: &DiaryImage) -> Result<()> {
        let rows = sqlx::query(
            r#"
            UPDATE diary_images
            SET diary_id = ?, image_path = ?, thumbnail_path = ?, sort_order = ?, created_at = ?
            WHERE id = ?
            "#,
        )
        .bind(image.diary_id)
        .bind(&image.image_path)
        .bind(&image.thumbnail_path)
        .bind(image.sort_order)
        .bind(image.created_at)
        .bind(image.id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::ImageNotFound(image.id));
        }

        self.changes.notify(IMAGES);
        Ok(())
    }

    pub async fn get_image(&self, id: i64) -> Result<Option<DiaryImage>> {
        let image = sqlx::query_as::<_, DiaryImage>("SELECT * FROM diary_images WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(image)
    }

    /// Images of one entry in display order
    pub async fn list_images_for_diary(&self, diary_id: i64) -> Result<Vec<DiaryImage>> {
        let images = sqlx::query_as::<_, DiaryImage>(
            "SELECT * FROM diary_images WHERE diary_id = ? ORDER BY sort_order ASC, id ASC",
        )
        .bind(diary_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    pub async fn count_images_for_diary(&self, diary_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM diary_images WHERE diary_id = ?")
            .bind(diary_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Delete one image row and close the gap it leaves in the ordering.
    ///
    /// Returns the deleted row so the caller can remove its files.
    pub async fn delete_image(&self, id: i64) -> Result<DiaryImage> {
        let mut tx = self.pool.begin().await?;

        let image = sqlx::query_as::<_, DiaryImage>("SELECT * FROM diary_images WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::ImageNotFound(id))?;

        sqlx::query("DELETE FROM diary_images WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        renumber_images(&mut tx, image.diary_id).await?;

        tx.commit().await?;

        self.changes.notify(IMAGES);
        tracing::debug!("Deleted image: {}", id);
        Ok(image)
    }

    pub async fn delete_images_for_diary(&self, diary_id: i64) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM diary_images WHERE diary_id = ?")
            .bind(diary_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        self.changes.notify(IMAGES);
        tracing::debug!("Deleted {} images for diary: {}", rows, diary_id);
        Ok(rows)
    }

    /// Assign positions 0..n following `ordered_ids`, which must list every
    /// image of the entry exactly once.
    pub async fn reorder_images(&self, diary_id: i64, ordered_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current: HashSet<i64> = sqlx::query_scalar("SELECT id FROM diary_images WHERE diary_id = ?")
            .bind(diary_id)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .collect();

        let requested: HashSet<i64> = ordered_ids.iter().copied().collect();
        if requested.len() != ordered_ids.len() || requested != current {
            return Err(AppError::InvalidInput(format!(
                "Image order for diary {} must list each of its {} images exactly once",
                diary_id,
                current.len()
            )));
        }

        for (position, id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE diary_images SET sort_order = ? WHERE id = ?")
                .bind(position as i64)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.changes.notify(IMAGES);
        tracing::debug!("Reordered {} images for diary: {}", ordered_ids.len(), diary_id);
        Ok(())
    }

    /// Images of several entries at once, grouped by entry
    pub(crate) async fn images_for_diaries(&self, diary_ids: &[i64]) -> Result<HashMap<i64, Vec<DiaryImage>>> {
        let mut grouped: HashMap<i64, Vec<DiaryImage>> = HashMap::new();
        if diary_ids.is_empty() {
            return Ok(grouped);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM diary_images WHERE diary_id IN (");
        let mut separated = builder.separated(", ");
        for id in diary_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY diary_id, sort_order ASC, id ASC");

        let images = builder
            .build_query_as::<DiaryImage>()
            .fetch_all(&self.pool)
            .await?;

        for image in images {
            grouped.entry(image.diary_id).or_default().push(image);
        }

        Ok(grouped)
    }
}

/// Rewrite `sort_order` of an entry's images as 0..n, keeping their relative order
async fn renumber_images(conn: &mut SqliteConnection, diary_id: i64) -> Result<()> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM diary_images WHERE diary_id = ? ORDER BY sort_order ASC, id ASC",
    )
    .bind(diary_id)
    .fetch_all(&mut *conn)
    .await?;

    for (position, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE diary_images SET sort_order = ? WHERE id = ?")
            .bind(position as i64)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}
