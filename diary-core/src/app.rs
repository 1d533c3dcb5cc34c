//! Application state and initialization
//!
//! This module builds the central application state once at start-up.
//! All services are created here and handed to callers through AppState.

use crate::config::DATABASE_FILE_NAME;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{DiaryService, SearchController, SettingsService};
use crate::storage::ImageStore;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub repo: Repository,
    pub diaries: DiaryService,
    pub settings: SettingsService,
}

impl AppState {
    /// Create directories, open and migrate the database, and wire up services
    pub async fn initialize(app_data_dir: PathBuf) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("App data directory: {:?}", app_data_dir);

        tokio::fs::create_dir_all(&app_data_dir).await?;

        let images = ImageStore::new(&app_data_dir);
        images.initialize().await?;

        let pool = create_pool(&app_data_dir.join(DATABASE_FILE_NAME)).await?;
        let repo = Repository::new(pool);

        let diaries = DiaryService::new(repo.clone(), images);
        let settings = SettingsService::load(&app_data_dir).await;

        tracing::info!("Application initialized successfully");

        Ok(Self {
            app_data_dir,
            repo,
            diaries,
            settings,
        })
    }

    /// A search controller bound to this state's repository
    pub fn search_controller(&self) -> SearchController {
        SearchController::new(self.repo.clone())
    }
}

/// Install the global log subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this twice is harmless.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diary_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_err() {
        tracing::debug!("Log subscriber already installed");
    }
}
