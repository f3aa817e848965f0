// Lectern study-assistant engine
// Main entry point for the lectern binary

use clap::Parser;
use lectern_engine::cli::{Cli, Command, LimitsAction};
use lectern_engine::config::Config;
use lectern_engine::db::Database;
use lectern_engine::gateway::Gateway;
use lectern_engine::handlers::{
    handle_chat, handle_digest, handle_history, handle_ingest, handle_limits_reset,
    handle_limits_show, handle_raw, OutputFormat,
};
use lectern_engine::llm::generator_from_config;
use lectern_engine::telemetry::{init_telemetry, init_telemetry_with_level};
use sdk::access::LocalUser;
use sdk::types::DigestMode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Re-initialize telemetry with CLI or config-driven log level
    // (only takes effect if RUST_LOG env var is not set)
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let database = Database::new(&config.db_path()).await?;
    let generator = generator_from_config(&config.llm)?;
    let gateway = Gateway::new(
        &database,
        &config,
        generator,
        Arc::new(LocalUser::default()),
    );

    let result = match cli.command {
        Command::Ingest { file } => handle_ingest(&gateway, &file, format).await,
        Command::Chat {
            lecture_key,
            message,
        } => handle_chat(&gateway, &lecture_key, message, format).await,
        Command::Summarize { lecture_key } => {
            handle_digest(&gateway, &lecture_key, DigestMode::Summarize, format).await
        }
        Command::Extract { lecture_key } => {
            handle_digest(&gateway, &lecture_key, DigestMode::Extract, format).await
        }
        Command::Raw { lecture_key } => handle_raw(&gateway, &lecture_key, format).await,
        Command::History { lecture_key } => handle_history(&gateway, &lecture_key, format).await,
        Command::Limits { action } => match action {
            LimitsAction::Show {
                identifier,
                endpoint,
            } => handle_limits_show(&gateway, &identifier, &endpoint, format).await,
            LimitsAction::Reset {
                identifier,
                endpoint,
            } => handle_limits_reset(&gateway, &identifier, endpoint.as_deref(), format).await,
        },
    };

    // Flush pending writes before reporting the command outcome
    database.close().await?;

    result
}
