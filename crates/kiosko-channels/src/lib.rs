//! # kiosko-channels
//!
//! Telegram Bot API transport: long polling for source-channel posts
//! and operator commands, plus the delivery sink for the target
//! channel.

pub mod commands;
pub mod telegram;

pub use commands::{Command, HELP_TEXT};
pub use telegram::{InboundEvent, InboundStream, TelegramApi, TelegramListener, TelegramSink};
