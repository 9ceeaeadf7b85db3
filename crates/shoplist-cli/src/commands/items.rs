//! Items command - Show the items of one shopping list

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use shoplist_core::domain::ListId;
use shoplist_sync::wire::WireItem;

use super::{configured_user, load_config, open_reconciler};
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct ItemsCommand {
    /// Id of the list
    pub list_id: String,

    /// Include items deleted locally but not yet removed remotely
    #[arg(long)]
    pub deleted: bool,
}

impl ItemsCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path);
        let user = configured_user(&config)?;
        let list_id: ListId = self.list_id.parse().context("Invalid list id")?;
        let reconciler = open_reconciler(&config).await?;

        let Some(list) = reconciler.get_list(list_id, &user).await? else {
            formatter.error(&format!("List {list_id} not found"));
            return Ok(());
        };
        let items = reconciler.get_items(list_id, &user, self.deleted).await?;

        if matches!(format, OutputFormat::Json) {
            let wire: Vec<WireItem> = items.iter().map(WireItem::from).collect();
            formatter.print_json(&serde_json::to_value(wire)?);
            return Ok(());
        }

        formatter.success(&format!("{} ({})", list.name(), plural(items.len(), "item")));
        for item in &items {
            formatter.info(&format!(
                "[{}] {:>3} x {} ({})",
                if item.tick() { "x" } else { " " },
                item.count(),
                item.description(),
                item.state()
            ));
        }
        Ok(())
    }
}
