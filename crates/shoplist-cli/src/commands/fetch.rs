//! Fetch command - Run a GET request through the request queue
//!
//! Provides the `shoplist fetch` CLI command which resolves a path against
//! the configured API, runs it with the requested priority and prints the
//! JSON result together with the request's event log.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, ValueEnum};
use shoplist_net::{JsonArrayRequest, JsonObjectRequest, Priority, Request, RequestHandle};

use super::{load_config, start_queue};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
        }
    }
}

/// Parse a `key=value` query parameter
fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

#[derive(Debug, Args)]
pub struct FetchCommand {
    /// Path relative to the API base URL, or an absolute URL
    pub path: String,

    /// Query parameter (repeatable)
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Scheduling priority
    #[arg(long, value_enum, default_value = "medium")]
    pub priority: PriorityArg,

    /// Skip the cache lookup
    #[arg(long)]
    pub no_cache: bool,

    /// Treat the response as a JSON array
    #[arg(long)]
    pub array: bool,

    /// Cache lifetime for the response, in seconds
    #[arg(long)]
    pub ttl: Option<u64>,
}

impl FetchCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path);
        let queue = start_queue(&config)?;

        let (handle, value) = if self.array {
            let request = self.configure(Request::get(JsonArrayRequest, self.path.as_str()));
            let (handle, rx) = queue.add_awaitable(request);
            let outcome = rx.await.map_err(|_| anyhow!("request canceled"))?;
            (handle, outcome.into_result().map(serde_json::Value::Array))
        } else {
            let request = self.configure(Request::get(JsonObjectRequest, self.path.as_str()));
            let (handle, rx) = queue.add_awaitable(request);
            let outcome = rx.await.map_err(|_| anyhow!("request canceled"))?;
            (handle, outcome.into_result())
        };
        let stats = queue.stats();
        queue.shutdown().await;

        match value {
            Ok(value) => {
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "cache_hit": handle.is_cache_hit(),
                        "bytes_in": stats.bytes_in,
                        "bytes_out": stats.bytes_out,
                        "result": value,
                    }));
                } else {
                    formatter.success(&format!(
                        "{} ({})",
                        self.path,
                        if handle.is_cache_hit() { "cache" } else { "network" }
                    ));
                    print_events(&handle, formatter.as_ref());
                    formatter.print_json(&value);
                }
            }
            Err(fault) => {
                formatter.error(&fault.to_string());
                print_events(&handle, formatter.as_ref());
            }
        }
        Ok(())
    }

    fn configure<K: shoplist_net::RequestKind>(&self, mut request: Request<K>) -> Request<K> {
        request = request
            .params(self.params.iter().cloned())
            .priority(self.priority.into())
            .ignore_cache(self.no_cache);
        if let Some(ttl) = self.ttl {
            request = request.cache_ttl(Duration::from_secs(ttl));
        }
        request
    }
}

fn print_events(handle: &RequestHandle, formatter: &dyn crate::output::OutputFormatter) {
    for event in handle.events() {
        formatter.info(&format!("{:>6}ms  {}", event.elapsed.as_millis(), event.name));
    }
}
