pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod display;
pub mod github;
pub mod markdown;
pub mod notifications;
pub mod payloads;
pub mod threads;
pub mod utils;

pub use db::DbPool;

use anyhow::Result;
use config::{Config, StorageBackend};
use std::sync::Arc;

use crate::github::GitHubClient;
use crate::markdown::MarkdownRenderer;
use crate::notifications::{Composer, NotificationService, SmtpMailer};
use crate::threads::{MemoryThreadStore, SqliteThreadStore, ThreadStore};

pub struct AppState {
    pub config: Config,
    pub notifications: NotificationService,
}

impl AppState {
    pub fn new(config: Config, notifications: NotificationService) -> Self {
        Self {
            config,
            notifications,
        }
    }
}

/// Open the configured thread store.
pub async fn open_thread_store(config: &Config) -> Result<Arc<dyn ThreadStore>> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            utils::ensure_dir(&config.server.data_dir)?;
            let db = db::init(&config.server.data_dir).await?;
            Ok(Arc::new(SqliteThreadStore::new(db)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory thread store, threads are lost on restart");
            Ok(Arc::new(MemoryThreadStore::new()))
        }
    }
}

/// Wire the notification pipeline from configuration: styles, the GitHub
/// markdown renderer, the thread store and SMTP delivery.
pub async fn build_notification_service(config: &Config) -> Result<NotificationService> {
    let styles = Arc::new(config.styles.load()?);
    let tz = config.display.tz()?;
    let store = open_thread_store(config).await?;

    let github = Arc::new(GitHubClient::new(&config.github));
    let renderer = MarkdownRenderer::new(github.clone(), styles.clone());
    let composer =
        Composer::new(renderer, styles, store.clone(), tz).with_commit_source(github);

    let mailer = SmtpMailer::new(config.mail.clone());
    if !mailer.is_enabled() {
        tracing::warn!("No mail recipient configured, deliveries will fail");
    }

    Ok(NotificationService::new(composer, Arc::new(mailer), store))
}
