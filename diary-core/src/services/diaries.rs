//! Diary service
//!
//! Use-case operations over the repository and the image store:
//! saving an entry with its photos and tags, soft and permanent deletion,
//! favorites, photo management, tags, search and live queries.
//!
//! Database writes and file writes are not one atomic unit. A failure
//! between them can leave an orphaned file or a row pointing at a missing one.

use crate::database::{
    DiaryDraft, DiaryEntry, DiaryImage, DiaryWithDetails, ImageInput, NewDiaryImage, Repository,
    Subscription, Table, Tag,
};
use crate::error::{AppError, Result};
use crate::storage::ImageStore;
use chrono::{DateTime, NaiveDate, Utc};

/// Service for managing diary entries
#[derive(Clone)]
pub struct DiaryService {
    repo: Repository,
    images: ImageStore,
}

impl DiaryService {
    pub fn new(repo: Repository, images: ImageStore) -> Self {
        Self { repo, images }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Create or update an entry, store new photos after the existing ones,
    /// and replace the entry's tag set with `tag_ids`.
    ///
    /// Photos that cannot be decoded are skipped. Returns the entry id.
    pub async fn save_diary(&self, draft: DiaryDraft, images: &[ImageInput], tag_ids: &[i64]) -> Result<i64> {
        let fields = draft.fields();
        if fields.title.trim().is_empty() && fields.content.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Please enter a title or content".to_string(),
            ));
        }

        let diary_id = match draft {
            DiaryDraft::New(fields) => {
                tracing::info!("Creating new diary: {}", fields.title);
                self.repo.insert_diary(&fields, Utc::now()).await?.id
            }
            DiaryDraft::Existing(id, fields) => {
                tracing::debug!("Updating diary: {}", id);
                // Soft-deleted rows stay editable and keep their flag
                let current = self
                    .repo
                    .get_diary_by_id(id)
                    .await?
                    .ok_or(AppError::DiaryNotFound(id))?;

                let updated = DiaryEntry {
                    title: fields.title,
                    content: fields.content,
                    mood: fields.mood,
                    weather: fields.weather,
                    location: fields.location,
                    updated_at: Utc::now(),
                    ..current
                };
                self.repo.update_diary(&updated).await?;
                id
            }
        };

        if !images.is_empty() {
            let mut next_order = self.repo.count_images_for_diary(diary_id).await?;
            for input in images {
                if self.store_image(diary_id, input, next_order).await?.is_some() {
                    next_order += 1;
                }
            }
        }

        self.repo.set_tags_for_diary(diary_id, tag_ids).await?;

        tracing::info!("Diary saved successfully: {}", diary_id);
        Ok(diary_id)
    }

    /// Soft delete hides the entry; permanent delete also removes its photo files
    pub async fn delete_diary(&self, id: i64, permanent: bool) -> Result<()> {
        tracing::info!("Deleting diary: {} (permanent: {})", id, permanent);

        if permanent {
            let images = self.repo.list_images_for_diary(id).await?;
            for image in &images {
                self.images.delete_image_files(image).await;
            }
            self.repo.delete_diary_permanently(id).await?;
        } else {
            self.repo.soft_delete_diary(id, Utc::now()).await?;
        }

        tracing::info!("Diary deleted successfully: {}", id);
        Ok(())
    }

    pub async fn toggle_favorite(&self, id: i64, is_favorite: bool) -> Result<()> {
        self.repo.set_favorite(id, is_favorite, Utc::now()).await
    }

    /// Direct lookup that also returns soft-deleted entries
    pub async fn get_diary_by_id(&self, id: i64) -> Result<Option<DiaryEntry>> {
        self.repo.get_diary_by_id(id).await
    }

    pub async fn get_diary_with_details(&self, id: i64) -> Result<Option<DiaryWithDetails>> {
        self.repo.get_diary_with_details(id).await
    }

    pub async fn get_all_diaries(&self) -> Result<Vec<DiaryEntry>> {
        self.repo.list_diaries().await
    }

    pub async fn get_all_diaries_with_details(&self) -> Result<Vec<DiaryWithDetails>> {
        self.repo.list_diaries_with_details().await
    }

    pub async fn get_diaries_paged(&self, limit: i64, offset: i64) -> Result<Vec<DiaryWithDetails>> {
        self.repo.list_diaries_paged(limit, offset).await
    }

    pub async fn get_diaries_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DiaryWithDetails>> {
        self.repo.list_diaries_between(start, end).await
    }

    pub async fn get_diaries_on_date(&self, date: NaiveDate) -> Result<Vec<DiaryEntry>> {
        self.repo.list_diaries_on_date(date).await
    }

    pub async fn get_favorite_diaries(&self) -> Result<Vec<DiaryEntry>> {
        self.repo.list_favorite_diaries().await
    }

    pub async fn search_diaries(&self, query: &str) -> Result<Vec<DiaryEntry>> {
        self.repo.search_diaries(query).await
    }

    pub async fn get_dates_with_entries(&self) -> Result<Vec<NaiveDate>> {
        self.repo.list_dates_with_entries().await
    }

    pub async fn get_diary_count(&self) -> Result<i64> {
        self.repo.count_diaries().await
    }

    // ===== Images =====

    pub async fn get_images_for_diary(&self, diary_id: i64) -> Result<Vec<DiaryImage>> {
        self.repo.list_images_for_diary(diary_id).await
    }

    /// Append one photo to an entry. `Ok(None)` if the input could not be stored.
    pub async fn add_image_to_diary(&self, diary_id: i64, input: &ImageInput) -> Result<Option<DiaryImage>> {
        let next_order = self.repo.count_images_for_diary(diary_id).await?;
        self.store_image(diary_id, input, next_order).await
    }

    /// Remove an image row and its files
    pub async fn delete_image(&self, image_id: i64) -> Result<()> {
        tracing::info!("Deleting image: {}", image_id);

        let image = self.repo.delete_image(image_id).await?;
        self.images.delete_image_files(&image).await;

        Ok(())
    }

    pub async fn reorder_images(&self, diary_id: i64, ordered_ids: &[i64]) -> Result<()> {
        self.repo.reorder_images(diary_id, ordered_ids).await
    }

    // ===== Tags =====

    pub async fn get_all_tags(&self) -> Result<Vec<Tag>> {
        self.repo.list_tags().await
    }

    /// Return the tag with this name, creating it if it does not exist yet
    pub async fn create_tag(&self, name: &str, color: i64) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Tag name cannot be empty".to_string()));
        }

        if let Some(existing) = self.repo.get_tag_by_name(name).await? {
            tracing::debug!("Tag already exists: {}", name);
            return Ok(existing);
        }

        tracing::info!("Creating tag: {}", name);
        self.repo.insert_tag(name, color).await
    }

    pub async fn update_tag(&self, tag: &Tag) -> Result<()> {
        self.repo.update_tag(tag).await
    }

    pub async fn delete_tag(&self, tag_id: i64) -> Result<()> {
        tracing::info!("Deleting tag: {}", tag_id);
        self.repo.delete_tag(tag_id).await
    }

    pub async fn get_tags_for_diary(&self, diary_id: i64) -> Result<Vec<Tag>> {
        self.repo.list_tags_for_diary(diary_id).await
    }

    pub async fn set_tags_for_diary(&self, diary_id: i64, tag_ids: &[i64]) -> Result<()> {
        self.repo.set_tags_for_diary(diary_id, tag_ids).await
    }

    pub async fn get_diary_count_for_tag(&self, tag_id: i64) -> Result<i64> {
        self.repo.count_diaries_for_tag(tag_id).await
    }

    // ===== Live queries =====

    pub async fn watch_diaries(&self) -> Result<Subscription<Vec<DiaryWithDetails>>> {
        self.repo
            .watch(&[Table::Diaries, Table::Images, Table::Tags, Table::DiaryTags], |repo| async move {
                repo.list_diaries_with_details().await
            })
            .await
    }

    pub async fn watch_favorites(&self) -> Result<Subscription<Vec<DiaryEntry>>> {
        self.repo
            .watch(&[Table::Diaries], |repo| async move { repo.list_favorite_diaries().await })
            .await
    }

    pub async fn watch_diary_count(&self) -> Result<Subscription<i64>> {
        self.repo
            .watch(&[Table::Diaries], |repo| async move { repo.count_diaries().await })
            .await
    }

    pub async fn watch_dates_with_entries(&self) -> Result<Subscription<Vec<NaiveDate>>> {
        self.repo
            .watch(&[Table::Diaries], |repo| async move { repo.list_dates_with_entries().await })
            .await
    }

    pub async fn watch_search(&self, query: impl Into<String>) -> Result<Subscription<Vec<DiaryEntry>>> {
        let query = query.into();
        self.repo
            .watch(&[Table::Diaries], move |repo| {
                let query = query.clone();
                async move { repo.search_diaries(&query).await }
            })
            .await
    }

    pub async fn watch_tags(&self) -> Result<Subscription<Vec<Tag>>> {
        self.repo
            .watch(&[Table::Tags], |repo| async move { repo.list_tags().await })
            .await
    }

    pub async fn watch_tags_for_diary(&self, diary_id: i64) -> Result<Subscription<Vec<Tag>>> {
        self.repo
            .watch(&[Table::Tags, Table::DiaryTags], move |repo| async move {
                repo.list_tags_for_diary(diary_id).await
            })
            .await
    }

    pub async fn watch_images_for_diary(&self, diary_id: i64) -> Result<Subscription<Vec<DiaryImage>>> {
        self.repo
            .watch(&[Table::Images], move |repo| async move {
                repo.list_images_for_diary(diary_id).await
            })
            .await
    }

    pub async fn watch_diary_count_for_tag(&self, tag_id: i64) -> Result<Subscription<i64>> {
        self.repo
            .watch(&[Table::Diaries, Table::DiaryTags], move |repo| async move {
                repo.count_diaries_for_tag(tag_id).await
            })
            .await
    }

    /// Save the photo and its thumbnail, then record it at `sort_order`
    async fn store_image(&self, diary_id: i64, input: &ImageInput, sort_order: i64) -> Result<Option<DiaryImage>> {
        let Some(saved) = self.images.save_image(input).await else {
            return Ok(None);
        };
        let thumbnail = self.images.create_thumbnail(&saved).await;

        let image = self
            .repo
            .insert_image(&NewDiaryImage {
                diary_id,
                image_path: saved.to_string_lossy().into_owned(),
                thumbnail_path: thumbnail.map(|p| p.to_string_lossy().into_owned()),
                sort_order,
            })
            .await?;

        tracing::debug!("Attached image {} to diary {} at {}", image.id, diary_id, sort_order);
        Ok(Some(image))
    }
}
