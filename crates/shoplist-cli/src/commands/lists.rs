//! Lists command - Show the shopping lists stored locally

use std::path::Path;

use anyhow::Result;
use clap::Args;
use shoplist_sync::wire::WireList;

use super::{configured_user, load_config, open_reconciler};
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct ListsCommand {
    /// Include lists deleted locally but not yet removed remotely
    #[arg(long)]
    pub deleted: bool,
}

impl ListsCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path);
        let user = configured_user(&config)?;
        let reconciler = open_reconciler(&config).await?;

        let lists = reconciler.get_lists(&user, self.deleted).await?;

        if matches!(format, OutputFormat::Json) {
            let wire: Vec<WireList> = lists.iter().map(WireList::from).collect();
            formatter.print_json(&serde_json::to_value(wire)?);
            return Ok(());
        }

        if lists.is_empty() {
            formatter.success("No lists");
            return Ok(());
        }
        formatter.success(&plural(lists.len(), "list"));
        for list in &lists {
            let access = list
                .share(&user.email)
                .map(|s| s.access().as_str())
                .unwrap_or("-");
            formatter.info(&format!(
                "{}  {:<24} {:<6} {} [{}]",
                list.id(),
                list.name(),
                access,
                plural(list.shares().len(), "share"),
                list.state()
            ));
        }
        Ok(())
    }
}
