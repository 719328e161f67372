//! # kiosko-scheduler
//!
//! The queueing engine: slot allocation over the configured publication
//! hours and the dispatch loop that delivers due articles to the target
//! channel.

pub mod dispatcher;
pub mod slots;

pub use dispatcher::{POST_MAX_CHARS, Publisher, format_post, spawn_retention_loop};
pub use slots::{HORIZON_DAYS, SlotPlanner};
