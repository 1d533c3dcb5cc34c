//! Settings service
//!
//! Preferences live in a small JSON file next to the database. A missing or
//! unreadable file means defaults, never an error. Every setter persists the
//! whole file and then publishes the new value to subscribers.

use crate::config::SETTINGS_FILE_NAME;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex};

/// Theme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DarkMode {
    Light,
    Dark,
    #[default]
    System,
}

/// Text size preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

impl FontSize {
    /// Multiplier applied to the base text size
    pub fn scale_factor(self) -> f32 {
        match self {
            FontSize::Small => 0.85,
            FontSize::Medium => 1.0,
            FontSize::Large => 1.15,
            FontSize::ExtraLarge => 1.3,
        }
    }
}

/// Persisted preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiarySettings {
    pub app_lock_enabled: bool,
    pub use_biometric: bool,
    /// Stored as entered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_code: Option<String>,
    pub dark_mode: DarkMode,
    pub first_launch: bool,
    pub auto_save: bool,
    pub font_size: FontSize,
}

impl Default for DiarySettings {
    fn default() -> Self {
        Self {
            app_lock_enabled: false,
            use_biometric: false,
            pin_code: None,
            dark_mode: DarkMode::System,
            first_launch: true,
            auto_save: true,
            font_size: FontSize::Medium,
        }
    }
}

/// Single-setting view over the settings channel.
///
/// Yields only values that differ from the last one seen.
pub struct SettingWatch<T> {
    rx: watch::Receiver<DiarySettings>,
    select: fn(&DiarySettings) -> T,
    last: T,
}

impl<T: Clone + PartialEq> SettingWatch<T> {
    fn new(mut rx: watch::Receiver<DiarySettings>, select: fn(&DiarySettings) -> T) -> Self {
        let last = select(&rx.borrow_and_update());
        Self { rx, select, last }
    }

    pub fn current(&self) -> T {
        self.last.clone()
    }

    /// Wait for the next distinct value. `None` once the service is gone.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            self.rx.changed().await.ok()?;
            let next = (self.select)(&self.rx.borrow_and_update());
            if next != self.last {
                self.last = next.clone();
                return Some(next);
            }
        }
    }
}

/// Service for managing diary preferences
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
    state: Arc<watch::Sender<DiarySettings>>,
    write_lock: Arc<Mutex<()>>,
}

impl SettingsService {
    /// Load preferences from the app data directory, falling back to defaults
    pub async fn load(app_data_dir: &Path) -> Self {
        let settings_path = app_data_dir.join(SETTINGS_FILE_NAME);
        let settings = read_settings(&settings_path).await;
        let (tx, _) = watch::channel(settings);

        Self {
            settings_path,
            state: Arc::new(tx),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Snapshot of all preferences
    pub fn get(&self) -> DiarySettings {
        self.state.borrow().clone()
    }

    pub fn app_lock_enabled(&self) -> bool {
        self.state.borrow().app_lock_enabled
    }

    pub fn use_biometric(&self) -> bool {
        self.state.borrow().use_biometric
    }

    pub fn pin_code(&self) -> Option<String> {
        self.state.borrow().pin_code.clone()
    }

    pub fn dark_mode(&self) -> DarkMode {
        self.state.borrow().dark_mode
    }

    pub fn first_launch(&self) -> bool {
        self.state.borrow().first_launch
    }

    pub fn auto_save(&self) -> bool {
        self.state.borrow().auto_save
    }

    pub fn font_size(&self) -> FontSize {
        self.state.borrow().font_size
    }

    /// Exact comparison against the stored PIN. False when no PIN is set.
    pub fn verify_pin(&self, input: &str) -> bool {
        self.state.borrow().pin_code.as_deref() == Some(input)
    }

    pub async fn set_app_lock_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.app_lock_enabled = enabled).await
    }

    pub async fn set_use_biometric(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.use_biometric = enabled).await
    }

    /// `None` removes the PIN
    pub async fn set_pin_code(&self, pin: Option<String>) -> Result<()> {
        self.update(|s| s.pin_code = pin).await
    }

    pub async fn set_dark_mode(&self, mode: DarkMode) -> Result<()> {
        self.update(|s| s.dark_mode = mode).await
    }

    pub async fn set_first_launch_complete(&self) -> Result<()> {
        self.update(|s| s.first_launch = false).await
    }

    pub async fn set_auto_save(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.auto_save = enabled).await
    }

    pub async fn set_font_size(&self, size: FontSize) -> Result<()> {
        self.update(|s| s.font_size = size).await
    }

    pub fn watch_app_lock_enabled(&self) -> SettingWatch<bool> {
        SettingWatch::new(self.state.subscribe(), |s| s.app_lock_enabled)
    }

    pub fn watch_use_biometric(&self) -> SettingWatch<bool> {
        SettingWatch::new(self.state.subscribe(), |s| s.use_biometric)
    }

    pub fn watch_pin_code(&self) -> SettingWatch<Option<String>> {
        SettingWatch::new(self.state.subscribe(), |s| s.pin_code.clone())
    }

    pub fn watch_dark_mode(&self) -> SettingWatch<DarkMode> {
        SettingWatch::new(self.state.subscribe(), |s| s.dark_mode)
    }

    pub fn watch_first_launch(&self) -> SettingWatch<bool> {
        SettingWatch::new(self.state.subscribe(), |s| s.first_launch)
    }

    pub fn watch_auto_save(&self) -> SettingWatch<bool> {
        SettingWatch::new(self.state.subscribe(), |s| s.auto_save)
    }

    pub fn watch_font_size(&self) -> SettingWatch<FontSize> {
        SettingWatch::new(self.state.subscribe(), |s| s.font_size)
    }

    /// Apply a change, write the file, then publish
    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut DiarySettings),
    {
        let _guard = self.write_lock.lock().await;

        let mut next = self.get();
        change(&mut next);
        if next == *self.state.borrow() {
            return Ok(());
        }

        save_settings(&self.settings_path, &next).await?;
        self.state.send_replace(next);

        tracing::info!("Settings saved to {:?}", self.settings_path);
        Ok(())
    }
}

async fn read_settings(path: &Path) -> DiarySettings {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("Settings file not found, using defaults");
            return DiarySettings::default();
        }
        Err(e) => {
            tracing::warn!("Failed to read settings {:?}, using defaults: {}", path, e);
            return DiarySettings::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to parse settings {:?}, using defaults: {}", path, e);
            DiarySettings::default()
        }
    }
}

async fn save_settings(path: &Path, settings: &DiarySettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)?;

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;

    fs::rename(&temp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn create_test_service() -> (SettingsService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let service = SettingsService::load(temp_dir.path()).await;
        (service, temp_dir)
    }

    #[tokio::test]
    async fn test_defaults_without_file() {
        let (service, temp) = create_test_service().await;

        assert_eq!(service.get(), DiarySettings::default());
        assert!(!service.app_lock_enabled());
        assert!(!service.use_biometric());
        assert_eq!(service.pin_code(), None);
        assert_eq!(service.dark_mode(), DarkMode::System);
        assert!(service.first_launch());
        assert!(service.auto_save());
        assert_eq!(service.font_size(), FontSize::Medium);

        // Reading alone does not create the file
        assert!(!temp.path().join(SETTINGS_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(SETTINGS_FILE_NAME), "{ not json").unwrap();

        let service = SettingsService::load(temp_dir.path()).await;

        assert_eq!(service.get(), DiarySettings::default());
    }

    #[tokio::test]
    async fn test_partial_file_fills_missing_keys() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(SETTINGS_FILE_NAME),
            r#"{"dark_mode":"DARK","font_size":"EXTRA_LARGE"}"#,
        )
        .unwrap();

        let service = SettingsService::load(temp_dir.path()).await;

        assert_eq!(service.dark_mode(), DarkMode::Dark);
        assert_eq!(service.font_size(), FontSize::ExtraLarge);
        assert!(service.auto_save());
        assert!(service.first_launch());
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let service = SettingsService::load(temp_dir.path()).await;
            service.set_dark_mode(DarkMode::Light).await.unwrap();
            service.set_font_size(FontSize::Large).await.unwrap();
            service.set_app_lock_enabled(true).await.unwrap();
            service.set_first_launch_complete().await.unwrap();
        }

        let service = SettingsService::load(temp_dir.path()).await;
        assert_eq!(service.dark_mode(), DarkMode::Light);
        assert_eq!(service.font_size(), FontSize::Large);
        assert!(service.app_lock_enabled());
        assert!(!service.first_launch());
        assert!(!temp_dir.path().join("diary_settings.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_pin_code() {
        let (service, temp) = create_test_service().await;
        assert!(!service.verify_pin(""));

        service.set_pin_code(Some("1234".to_string())).await.unwrap();
        assert!(service.verify_pin("1234"));
        assert!(!service.verify_pin("12345"));

        let written = std::fs::read_to_string(temp.path().join(SETTINGS_FILE_NAME)).unwrap();
        assert!(written.contains("\"pin_code\": \"1234\""));

        service.set_pin_code(None).await.unwrap();
        assert!(!service.verify_pin("1234"));
        let written = std::fs::read_to_string(temp.path().join(SETTINGS_FILE_NAME)).unwrap();
        assert!(!written.contains("pin_code"));
    }

    #[tokio::test]
    async fn test_enum_wire_names() {
        let json = serde_json::to_string(&DiarySettings::default()).unwrap();
        assert!(json.contains("\"dark_mode\":\"SYSTEM\""));
        assert!(json.contains("\"font_size\":\"MEDIUM\""));
    }

    #[test]
    fn test_font_scale_factors() {
        assert_eq!(FontSize::Small.scale_factor(), 0.85);
        assert_eq!(FontSize::Medium.scale_factor(), 1.0);
        assert_eq!(FontSize::Large.scale_factor(), 1.15);
        assert_eq!(FontSize::ExtraLarge.scale_factor(), 1.3);
    }

    #[tokio::test]
    async fn test_watch_yields_distinct_values() {
        let (service, _temp) = create_test_service().await;
        let mut dark_mode = service.watch_dark_mode();
        assert_eq!(dark_mode.current(), DarkMode::System);

        // Unrelated and repeated writes are not reported
        service.set_auto_save(false).await.unwrap();
        service.set_dark_mode(DarkMode::System).await.unwrap();
        service.set_dark_mode(DarkMode::Dark).await.unwrap();

        let next = tokio::time::timeout(Duration::from_secs(1), dark_mode.changed())
            .await
            .unwrap();
        assert_eq!(next, Some(DarkMode::Dark));

        let idle = tokio::time::timeout(Duration::from_millis(50), dark_mode.changed()).await;
        assert!(idle.is_err());
    }
}
