//! Subcommand implementations and the runtime wiring they share.

pub mod chat;
pub mod clear;
pub mod history;
pub mod onboard;
pub mod report;
pub mod taxonomy;

use scaffold_config::AppConfig;
use scaffold_core::log::ConversationLog;
use scaffold_engine::ChatCycle;
use scaffold_store::{InMemoryLog, SqliteLog};
use std::sync::Arc;
use tracing::debug;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the configured conversation log.
pub async fn open_log(config: &AppConfig) -> Result<Arc<dyn ConversationLog>, Box<dyn std::error::Error>> {
    let log: Arc<dyn ConversationLog> = match config.store.backend.as_str() {
        "memory" => Arc::new(InMemoryLog::new()),
        _ => Arc::new(SqliteLog::open(&config.database_path()).await?),
    };
    debug!(backend = log.name(), "Conversation log ready");
    Ok(log)
}

/// Build a chat cycle from configuration: taxonomy, default provider, log.
pub async fn build_cycle(config: &AppConfig) -> Result<ChatCycle, Box<dyn std::error::Error>> {
    let taxonomy = config.load_taxonomy()?;
    let router = scaffold_providers::router::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;
    let log = open_log(config).await?;
    Ok(ChatCycle::from_config(config, taxonomy, provider, log))
}
