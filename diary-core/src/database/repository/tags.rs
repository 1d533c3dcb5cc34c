//! Tag and entry/tag link queries

use super::Repository;
use crate::database::changes::Table;
use crate::database::models::{DiaryTagCrossRef, Tag};
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::HashMap;

const TAGS: &[Table] = &[Table::Tags];
const DIARY_TAGS: &[Table] = &[Table::DiaryTags];

/// Deleting a tag also drops its links
const TAG_CASCADE: &[Table] = &[Table::Tags, Table::DiaryTags];

#[derive(FromRow)]
struct LinkedTag {
    diary_id: i64,
    #[sqlx(flatten)]
    tag: Tag,
}

impl Repository {
    /// Insert a tag; names are unique, so a duplicate name is a database error
    pub async fn insert_tag(&self, name: &str, color: i64) -> Result<Tag> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (name, color, created_at)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(color)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        self.changes.notify(TAGS);
        tracing::debug!("Created tag: {} ({})", tag.id, tag.name);
        Ok(tag)
    }

    pub async fn update_tag(&self, tag: &Tag) -> Result<()> {
        let rows = sqlx::query("UPDATE tags SET name = ?, color = ?, created_at = ? WHERE id = ?")
            .bind(&tag.name)
            .bind(tag.color)
            .bind(tag.created_at)
            .bind(tag.id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::TagNotFound(tag.id));
        }

        self.changes.notify(TAGS);
        tracing::debug!("Updated tag: {}", tag.id);
        Ok(())
    }

    pub async fn delete_tag(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::TagNotFound(id));
        }

        self.changes.notify(TAG_CASCADE);
        tracing::debug!("Deleted tag: {}", id);
        Ok(())
    }

    pub async fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tag)
    }

    pub async fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tag)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(tags)
    }

    /// Link a tag to an entry; linking twice is a no-op
    pub async fn add_tag_to_diary(&self, diary_id: i64, tag_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO diary_tag_cross_ref (diary_id, tag_id) VALUES (?, ?)")
            .bind(diary_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;

        self.changes.notify(DIARY_TAGS);
        Ok(())
    }

    pub async fn remove_tag_from_diary(&self, diary_id: i64, tag_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM diary_tag_cross_ref WHERE diary_id = ? AND tag_id = ?")
            .bind(diary_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;

        self.changes.notify(DIARY_TAGS);
        Ok(())
    }

    /// Replace the entry's whole tag set in one transaction
    pub async fn set_tags_for_diary(&self, diary_id: i64, tag_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM diary_tag_cross_ref WHERE diary_id = ?")
            .bind(diary_id)
            .execute(&mut *tx)
            .await?;

        for tag_id in tag_ids {
            sqlx::query("INSERT OR IGNORE INTO diary_tag_cross_ref (diary_id, tag_id) VALUES (?, ?)")
                .bind(diary_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.changes.notify(DIARY_TAGS);
        tracing::debug!("Set {} tags for diary: {}", tag_ids.len(), diary_id);
        Ok(())
    }

    pub async fn list_tags_for_diary(&self, diary_id: i64) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT tags.* FROM tags
            INNER JOIN diary_tag_cross_ref ON tags.id = diary_tag_cross_ref.tag_id
            WHERE diary_tag_cross_ref.diary_id = ?
            ORDER BY tags.name ASC
            "#,
        )
        .bind(diary_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }

    /// Raw junction rows of one entry
    pub async fn list_tag_links_for_diary(&self, diary_id: i64) -> Result<Vec<DiaryTagCrossRef>> {
        let links = sqlx::query_as::<_, DiaryTagCrossRef>(
            "SELECT diary_id, tag_id FROM diary_tag_cross_ref WHERE diary_id = ? ORDER BY tag_id ASC",
        )
        .bind(diary_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }

    /// Number of visible entries carrying the tag
    pub async fn count_diaries_for_tag(&self, tag_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM diary_tag_cross_ref
            INNER JOIN diary_entries ON diary_entries.id = diary_tag_cross_ref.diary_id
            WHERE diary_tag_cross_ref.tag_id = ? AND diary_entries.is_deleted = 0
            "#,
        )
        .bind(tag_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Tags of several entries at once, grouped by entry
    pub(crate) async fn tags_for_diaries(&self, diary_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
        let mut grouped: HashMap<i64, Vec<Tag>> = HashMap::new();
        if diary_ids.is_empty() {
            return Ok(grouped);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT diary_tag_cross_ref.diary_id, tags.* FROM tags
            INNER JOIN diary_tag_cross_ref ON tags.id = diary_tag_cross_ref.tag_id
            WHERE diary_tag_cross_ref.diary_id IN (
            "#,
        );
        let mut separated = builder.separated(", ");
        for id in diary_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY tags.name ASC");

        let rows = builder
            .build_query_as::<LinkedTag>()
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            grouped.entry(row.diary_id).or_default().push(row.tag);
        }

        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{at, create_test_repo, insert};
    use super::*;
    use crate::config::DEFAULT_TAG_COLOR;

    #[tokio::test]
    async fn test_tags_sorted_by_name() {
        let repo = create_test_repo().await;
        repo.insert_tag("Work", DEFAULT_TAG_COLOR).await.unwrap();
        repo.insert_tag("Family", 0xFF00_FF00).await.unwrap();

        let names: Vec<String> = repo.list_tags().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Family", "Work"]);

        let family = repo.get_tag_by_name("Family").await.unwrap().unwrap();
        assert_eq!(family.color, 0xFF00_FF00);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let repo = create_test_repo().await;
        repo.insert_tag("Travel", DEFAULT_TAG_COLOR).await.unwrap();

        let result = repo.insert_tag("Travel", DEFAULT_TAG_COLOR).await;
        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(repo.list_tags().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_tags_is_idempotent() {
        let repo = create_test_repo().await;
        let diary = insert(&repo, "Trip", "", at(2024, 5, 1, 10)).await;
        let travel = repo.insert_tag("Travel", DEFAULT_TAG_COLOR).await.unwrap();
        let beach = repo.insert_tag("Beach", DEFAULT_TAG_COLOR).await.unwrap();

        repo.set_tags_for_diary(diary.id, &[travel.id, beach.id]).await.unwrap();
        repo.set_tags_for_diary(diary.id, &[travel.id, beach.id, travel.id]).await.unwrap();

        let tags = repo.list_tags_for_diary(diary.id).await.unwrap();
        assert_eq!(tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(), vec!["Beach", "Travel"]);

        let links = repo.list_tag_links_for_diary(diary.id).await.unwrap();
        assert_eq!(
            links,
            vec![
                DiaryTagCrossRef { diary_id: diary.id, tag_id: travel.id },
                DiaryTagCrossRef { diary_id: diary.id, tag_id: beach.id },
            ]
        );

        repo.set_tags_for_diary(diary.id, &[beach.id]).await.unwrap();
        let tags = repo.list_tags_for_diary(diary.id).await.unwrap();
        assert_eq!(tags, vec![beach]);
    }

    #[tokio::test]
    async fn test_add_and_remove_link() {
        let repo = create_test_repo().await;
        let diary = insert(&repo, "Trip", "", at(2024, 5, 1, 10)).await;
        let travel = repo.insert_tag("Travel", DEFAULT_TAG_COLOR).await.unwrap();

        repo.add_tag_to_diary(diary.id, travel.id).await.unwrap();
        repo.add_tag_to_diary(diary.id, travel.id).await.unwrap();
        assert_eq!(repo.count_diaries_for_tag(travel.id).await.unwrap(), 1);

        repo.remove_tag_from_diary(diary.id, travel.id).await.unwrap();
        assert_eq!(repo.count_diaries_for_tag(travel.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_skips_soft_deleted() {
        let repo = create_test_repo().await;
        let kept = insert(&repo, "Kept", "", at(2024, 5, 1, 10)).await;
        let gone = insert(&repo, "Gone", "", at(2024, 5, 2, 10)).await;
        let travel = repo.insert_tag("Travel", DEFAULT_TAG_COLOR).await.unwrap();

        repo.add_tag_to_diary(kept.id, travel.id).await.unwrap();
        repo.add_tag_to_diary(gone.id, travel.id).await.unwrap();
        repo.soft_delete_diary(gone.id, Utc::now()).await.unwrap();

        assert_eq!(repo.count_diaries_for_tag(travel.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_tag_drops_links() {
        let repo = create_test_repo().await;
        let diary = insert(&repo, "Trip", "", at(2024, 5, 1, 10)).await;
        let travel = repo.insert_tag("Travel", DEFAULT_TAG_COLOR).await.unwrap();
        repo.add_tag_to_diary(diary.id, travel.id).await.unwrap();

        repo.delete_tag(travel.id).await.unwrap();

        assert!(repo.list_tags_for_diary(diary.id).await.unwrap().is_empty());
        assert!(repo.get_tag(travel.id).await.unwrap().is_none());
        assert!(matches!(repo.delete_tag(travel.id).await, Err(AppError::TagNotFound(_))));
    }

    #[tokio::test]
    async fn test_details_join() {
        let repo = create_test_repo().await;
        let tagged = insert(&repo, "Tagged", "", at(2024, 5, 2, 10)).await;
        let plain = insert(&repo, "Plain", "", at(2024, 5, 1, 10)).await;
        let travel = repo.insert_tag("Travel", DEFAULT_TAG_COLOR).await.unwrap();
        let family = repo.insert_tag("Family", DEFAULT_TAG_COLOR).await.unwrap();
        repo.set_tags_for_diary(tagged.id, &[travel.id, family.id]).await.unwrap();

        let details = repo.list_diaries_with_details().await.unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].diary.id, tagged.id);
        assert_eq!(
            details[0].tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            vec!["Family", "Travel"]
        );
        assert_eq!(details[1].diary.id, plain.id);
        assert!(details[1].tags.is_empty());

        let single = repo.get_diary_with_details(tagged.id).await.unwrap().unwrap();
        assert_eq!(single.tags.len(), 2);
        assert!(single.images.is_empty());
    }
}
