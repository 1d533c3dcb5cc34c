//! Application configuration constants
//!
//! Central location for storage layout names, codec parameters
//! and timing values used throughout the crate.

use std::time::Duration;

// ===== Storage Layout =====

/// SQLite database file name inside the app data directory
pub const DATABASE_FILE_NAME: &str = "diary.db";

/// Directory holding full-size diary photos
pub const IMAGES_DIR_NAME: &str = "diary_images";

/// Directory holding generated thumbnails
pub const THUMBNAILS_DIR_NAME: &str = "diary_thumbnails";

/// Preference file name inside the app data directory
pub const SETTINGS_FILE_NAME: &str = "diary_settings.json";

// ===== Database =====

/// Connections in the application pool
pub const DB_MAX_CONNECTIONS: u32 = 5;

/// How long a connection waits on a locked database before failing
pub const DB_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ===== Images =====

/// JPEG quality for stored photo copies
pub const IMAGE_JPEG_QUALITY: u8 = 85;

/// JPEG quality for thumbnails
pub const THUMBNAIL_JPEG_QUALITY: u8 = 70;

/// Width thumbnails are scaled toward, in pixels
pub const THUMBNAIL_TARGET_WIDTH: u32 = 300;

// ===== Tags =====

/// Packed ARGB color given to tags created without one
pub const DEFAULT_TAG_COLOR: i64 = 0xFF62_00EE;

// ===== Search =====

/// Quiet period after the last keystroke before a search runs
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Capacity of the table change broadcast channel.
/// Slow subscribers that fall further behind simply recompute once.
pub const CHANGE_BUS_CAPACITY: usize = 64;
