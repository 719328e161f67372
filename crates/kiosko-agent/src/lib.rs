//! # kiosko-agent
//!
//! Glue between the Telegram transport and the queueing engine: the
//! ingestion pipeline for source-channel posts and the executor for
//! operator commands.

pub mod commands;
pub mod ingest;

pub use commands::CommandExecutor;
pub use ingest::{IngestPipeline, IngestionCoordinator, extract_urls, is_urgent};
