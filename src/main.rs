//! # kiosko — Telegram news republisher
//!
//! Watches a source channel for article links, rewrites each article
//! through an LLM, and republishes on a slot-based schedule to a target
//! channel. Urgent articles (keyword match) skip the schedule.
//!
//! Usage:
//!   kiosko                         # Run the bot
//!   kiosko --config ./kiosko.toml  # Explicit config file
//!   kiosko --init                  # Write a default config and exit

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use kiosko_agent::{CommandExecutor, IngestPipeline, IngestionCoordinator};
use kiosko_channels::{InboundEvent, TelegramApi, TelegramListener, TelegramSink};
use kiosko_core::clock::Clock;
use kiosko_core::config::KioskoConfig;
use kiosko_fetch::HttpArticleSource;
use kiosko_rewrite::ChatRewriter;
use kiosko_scheduler::{Publisher, spawn_retention_loop};
use kiosko_store::{NewsStore, SettingsManager};

#[derive(Parser)]
#[command(name = "kiosko", version, about = "📰 kiosko — Telegram news republisher")]
struct Cli {
    /// Config file (default: ~/.kiosko/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Write a default config file and exit
    #[arg(long)]
    init: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "kiosko=debug" } else { "kiosko=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    if cli.init {
        let config = KioskoConfig::default();
        config.save().context("write default config")?;
        println!("✅ Wrote {}", KioskoConfig::default_path().display());
        println!("   Fill in telegram.bot_token, channels and rewrite.api_key.");
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => {
            let mut c = KioskoConfig::load_from(Path::new(&shellexpand::tilde(path).to_string()))?;
            c.apply_env();
            c
        }
        None => KioskoConfig::load()?,
    };
    config.validate().context("invalid configuration")?;

    let clock = Clock::from_name(&config.timezone)?;
    let db_path = shellexpand::tilde(&config.store.path).to_string();
    let store = NewsStore::open(Path::new(&db_path), config.store.max_connections)?;
    let settings = SettingsManager::load(store.clone(), config.defaults.clone(), clock.now())?;

    let api = TelegramApi::new(&config.telegram.bot_token);
    match api.get_me().await {
        Ok(me) => tracing::info!(
            "🤖 bot @{} connected",
            me.username.as_deref().unwrap_or(&me.first_name)
        ),
        Err(e) => tracing::warn!("getMe failed (check bot token): {e}"),
    }

    let sink = Arc::new(TelegramSink::new(api.clone(), &config.telegram.target_channel));
    let publisher = Arc::new(Publisher::new(store.clone(), sink, clock));
    let rewriter = Arc::new(ChatRewriter::new(&config.rewrite)?);
    let source = Arc::new(HttpArticleSource::new(config.rewrite.timeout_secs)?);

    let pipeline = Arc::new(IngestPipeline {
        store: store.clone(),
        source,
        rewriter: rewriter.clone(),
        publisher: publisher.clone(),
        settings: settings.shared(),
        clock,
    });
    let coordinator = IngestionCoordinator::start(pipeline);

    let executor = CommandExecutor::new(
        store.clone(),
        publisher.clone(),
        rewriter,
        settings.clone(),
        clock,
        config.telegram.admin_user_id,
        api.clone(),
    );

    let _publication = publisher.clone().spawn_publication_loop(settings.shared());
    let _retention = spawn_retention_loop(store, clock, config.store.retention_days);

    tracing::info!(
        "📰 kiosko v{} started — {} → {}, schedule {}",
        env!("CARGO_PKG_VERSION"),
        config.telegram.source_channel,
        config.telegram.target_channel,
        settings
            .snapshot()
            .publish_hours
            .iter()
            .map(|h| format!("{h:02}:00"))
            .collect::<Vec<_>>()
            .join(", "),
    );

    let listener = TelegramListener::new(api, config.telegram.clone());
    let mut events = listener.start_polling();
    while let Some(event) = events.next().await {
        match event {
            InboundEvent::SourcePost { text } => {
                let max = settings.snapshot().max_articles_per_run;
                let accepted = coordinator.submit_post(&text, max).await;
                if accepted > 0 {
                    tracing::info!("📨 source post: {accepted} link(s) queued for ingest");
                }
            }
            InboundEvent::Command { chat_id, sender_id, command } => {
                executor.handle(chat_id, sender_id, command).await;
            }
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
