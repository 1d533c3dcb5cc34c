//! Database models
//!
//! Rust structs representing database entities.
//! All models use serde so callers can hand them to a presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::PathBuf;

/// How the writer felt, persisted by upper-snake name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mood {
    VeryHappy,
    Happy,
    #[default]
    Neutral,
    Sad,
    VerySad,
    Angry,
    Anxious,
    Tired,
    Excited,
    Peaceful,
}

impl Mood {
    pub const ALL: [Mood; 10] = [
        Mood::VeryHappy,
        Mood::Happy,
        Mood::Neutral,
        Mood::Sad,
        Mood::VerySad,
        Mood::Angry,
        Mood::Anxious,
        Mood::Tired,
        Mood::Excited,
        Mood::Peaceful,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            Mood::VeryHappy => "\u{1F604}",
            Mood::Happy => "\u{1F60A}",
            Mood::Neutral => "\u{1F610}",
            Mood::Sad => "\u{1F61E}",
            Mood::VerySad => "\u{1F62D}",
            Mood::Angry => "\u{1F620}",
            Mood::Anxious => "\u{1F630}",
            Mood::Tired => "\u{1F62B}",
            Mood::Excited => "\u{1F929}",
            Mood::Peaceful => "\u{1F60C}",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mood::VeryHappy => "Very Happy",
            Mood::Happy => "Happy",
            Mood::Neutral => "Neutral",
            Mood::Sad => "Sad",
            Mood::VerySad => "Very Sad",
            Mood::Angry => "Angry",
            Mood::Anxious => "Anxious",
            Mood::Tired => "Tired",
            Mood::Excited => "Excited",
            Mood::Peaceful => "Peaceful",
        }
    }
}

/// Weather on the day of the entry, persisted by upper-snake name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weather {
    Sunny,
    Cloudy,
    Rainy,
    Snowy,
    Windy,
    Stormy,
    Foggy,
}

impl Weather {
    pub fn icon(self) -> &'static str {
        match self {
            Weather::Sunny => "\u{2600}\u{FE0F}",
            Weather::Cloudy => "\u{2601}\u{FE0F}",
            Weather::Rainy => "\u{1F327}\u{FE0F}",
            Weather::Snowy => "\u{2744}\u{FE0F}",
            Weather::Windy => "\u{1F32C}\u{FE0F}",
            Weather::Stormy => "\u{26C8}\u{FE0F}",
            Weather::Foggy => "\u{1F32B}\u{FE0F}",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Weather::Sunny => "Sunny",
            Weather::Cloudy => "Cloudy",
            Weather::Rainy => "Rainy",
            Weather::Snowy => "Snowy",
            Weather::Windy => "Windy",
            Weather::Stormy => "Stormy",
            Weather::Foggy => "Foggy",
        }
    }
}

/// A diary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DiaryEntry {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub mood: Mood,
    pub weather: Option<Weather>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_favorite: bool,
    /// Soft-delete flag; flagged rows are hidden from every listing
    pub is_deleted: bool,
}

/// The user-editable part of an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiaryFields {
    pub title: String,
    pub content: String,
    pub mood: Mood,
    pub weather: Option<Weather>,
    pub location: Option<String>,
}

impl DiaryFields {
    pub fn new(title: impl Into<String>, content: impl Into<String>, mood: Mood) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            mood,
            weather: None,
            location: None,
        }
    }

    pub fn with_weather(mut self, weather: Weather) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Save request: either a brand new entry or an edit of an existing one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiaryDraft {
    New(DiaryFields),
    Existing(i64, DiaryFields),
}

impl DiaryDraft {
    pub fn fields(&self) -> &DiaryFields {
        match self {
            DiaryDraft::New(fields) | DiaryDraft::Existing(_, fields) => fields,
        }
    }
}

/// A photo attached to an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DiaryImage {
    pub id: i64,
    pub diary_id: i64,
    pub image_path: String,
    pub thumbnail_path: Option<String>,
    /// Dense display position within the entry, starting at 0
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// Insert request for an image row
#[derive(Debug, Clone)]
pub struct NewDiaryImage {
    pub diary_id: i64,
    pub image_path: String,
    pub thumbnail_path: Option<String>,
    pub sort_order: i64,
}

/// Where a new photo comes from
#[derive(Debug, Clone)]
pub enum ImageInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A user-defined label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    /// Packed ARGB color
    pub color: i64,
    pub created_at: DateTime<Utc>,
}

/// Junction row linking an entry and a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DiaryTagCrossRef {
    pub diary_id: i64,
    pub tag_id: i64,
}

/// An entry joined with its images and tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryWithDetails {
    pub diary: DiaryEntry,
    /// Ordered by `sort_order`
    pub images: Vec<DiaryImage>,
    /// Ordered by name
    pub tags: Vec<Tag>,
}
