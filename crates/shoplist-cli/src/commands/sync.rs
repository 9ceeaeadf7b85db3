//! Sync command - Synchronize lists with the remote service
//!
//! Provides the `shoplist sync` CLI command which:
//! 1. Loads configuration and opens the database
//! 2. Starts the request queue against the configured API
//! 3. Runs the SyncEngine once and displays the results

use std::path::Path;

use anyhow::Result;
use clap::Args;
use shoplist_sync::SyncEngine;

use super::{configured_user, load_config, open_reconciler, start_queue};
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Only send local changes, do not pull
    #[arg(long)]
    pub push_only: bool,
}

impl SyncCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path);
        let user = configured_user(&config)?;
        let reconciler = open_reconciler(&config).await?;
        let queue = start_queue(&config)?;

        formatter.info("Starting synchronization...");
        let engine = SyncEngine::new(queue.clone(), reconciler);
        let outcome = if self.push_only {
            engine.push_pending(&user).await
        } else {
            engine.sync(&user).await
        };
        queue.shutdown().await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                formatter.error(&e.to_string());
                return Ok(());
            }
        };

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "pushed": result.pushed,
                "deleted": result.deleted,
                "pulled": result.pulled,
                "removed": result.removed,
                "errors": result.errors,
                "duration_ms": result.duration_ms,
            }));
            return Ok(());
        }

        let total = result.pushed + result.deleted + result.pulled + result.removed;
        if total == 0 && result.is_clean() {
            formatter.success("Already up to date");
        } else {
            formatter.success(&format!("Sync completed in {}ms", result.duration_ms));
        }
        for (count, label) in [
            (result.pushed, "Pushed:  "),
            (result.deleted, "Deleted: "),
            (result.pulled, "Pulled:  "),
            (result.removed, "Removed: "),
        ] {
            if count > 0 {
                formatter.info(&format!("{label} {}", plural(count as usize, "change")));
            }
        }
        if !result.errors.is_empty() {
            formatter.error(&format!(
                "{} occurred:",
                plural(result.errors.len(), "error")
            ));
            for err in &result.errors {
                formatter.info(&format!("  - {err}"));
            }
        }
        Ok(())
    }
}
