//! # kiosko-core
//!
//! Shared foundation for the kiosko workspace: configuration, the error
//! type, domain types, collaborator traits, and the civil-time clock.

pub mod clock;
pub mod config;
pub mod error;
pub mod settings;
pub mod traits;
pub mod types;

pub use clock::Clock;
pub use config::KioskoConfig;
pub use error::{KioskoError, Result};
pub use settings::{Settings, SharedSettings};
pub use types::{ArticleRecord, ArticleStatus, EnqueueOutcome, Style, TextLength};
