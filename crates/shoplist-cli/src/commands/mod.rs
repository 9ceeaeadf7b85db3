//! CLI subcommands and the wiring they share

pub mod config;
pub mod fetch;
pub mod items;
pub mod lists;
pub mod sync;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use shoplist_core::config::Config;
use shoplist_core::domain::{Email, User, UserId};
use shoplist_net::{Cache, Delivery, HttpTransport, QueueOptions, RequestQueue};
use shoplist_store::{DatabasePool, SqliteListStore};
use shoplist_sync::ListReconciler;
use tracing::info;

/// Load the configuration, falling back to defaults when the file is missing
pub fn load_config(path: &Path) -> Config {
    let config = Config::load_or_default(path);
    info!(config_path = %path.display(), "Loaded configuration");
    config
}

/// The signed-in user from the `sync` section
pub fn configured_user(config: &Config) -> Result<User> {
    let (Some(id), Some(email)) = (config.sync.user_id, config.sync.email.as_deref()) else {
        bail!("No user configured. Set sync.user_id and sync.email in the configuration file.");
    };
    let email: Email = email.parse().context("Invalid sync.email")?;
    Ok(User::new(UserId::new(id), email))
}

/// Open the local database and wrap it in a reconciler
pub async fn open_reconciler(config: &Config) -> Result<Arc<ListReconciler>> {
    let db_path = &config.storage.database;
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let pool = DatabasePool::new(db_path)
        .await
        .context("Failed to open database")?;
    let store = SqliteListStore::new(pool.pool().clone());
    Ok(Arc::new(ListReconciler::new(Arc::new(store))))
}

/// Queue settings taken from the `api` and `network` sections
pub fn queue_options(config: &Config) -> QueueOptions {
    QueueOptions {
        workers: config.network.workers,
        base_url: Some(config.api.base_url.clone()),
        timeout: config.request_timeout(),
    }
}

/// Build and start a request queue; callbacks are delivered on a background task
pub fn start_queue(config: &Config) -> Result<Arc<RequestQueue>> {
    let transport = HttpTransport::new(&config.api.user_agent)?;
    let (delivery, context) = Delivery::channel();
    let queue = RequestQueue::new(
        Arc::new(transport),
        Arc::new(Cache::new(config.cache_ttl())),
        delivery,
        queue_options(config),
    );
    tokio::spawn(context.run());
    queue.start();
    Ok(queue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_user_requires_identity() {
        let mut config = Config::default();
        assert!(configured_user(&config).is_err());

        config.sync.user_id = Some(7);
        config.sync.email = Some("me@example.com".into());
        let user = configured_user(&config).unwrap();
        assert_eq!(user.id, UserId::new(7));
        assert_eq!(user.email.as_str(), "me@example.com");
    }

    #[test]
    fn test_queue_options_follow_config() {
        let config = shoplist_core::config::ConfigBuilder::new()
            .api_base_url("https://api.example.com")
            .api_timeout_secs(7)
            .network_workers(3)
            .build();
        let options = queue_options(&config);
        assert_eq!(options.workers, 3);
        assert_eq!(options.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(options.timeout, std::time::Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_open_reconciler_creates_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.database = dir.path().join("nested").join("shoplist.db");

        let reconciler = open_reconciler(&config).await.unwrap();
        assert!(reconciler.is_open());
        assert!(dir.path().join("nested").exists());
    }
}
