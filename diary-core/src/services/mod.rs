//! Services module
//!
//! Use-case services that coordinate between callers, the repository and
//! the file system.

pub mod diaries;
pub mod search;
pub mod settings;

pub use diaries::DiaryService;
pub use search::{SearchController, SearchFilters, SearchState};
pub use settings::{DarkMode, DiarySettings, FontSize, SettingWatch, SettingsService};
