//! Telegram Bot API transport — long polling + message sending.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;

use kiosko_core::config::TelegramConfig;
use kiosko_core::error::{KioskoError, Result};
use kiosko_core::traits::ChannelSink;

use crate::commands::Command;

/// An update already classified for the rest of the pipeline.
#[derive(Debug)]
pub enum InboundEvent {
    /// New post in the watched source channel.
    SourcePost { text: String },
    /// Operator command from a chat. `command` is `Err` when the
    /// command was recognized but its arguments did not parse.
    Command {
        chat_id: i64,
        sender_id: i64,
        command: Result<Command>,
    },
}

/// Thin Bot API client shared by the sink and the listener.
#[derive(Clone)]
pub struct TelegramApi {
    client: reqwest::Client,
    bot_token: String,
}

impl TelegramApi {
    pub fn new(bot_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token: bot_token.to_string(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// Send a Markdown message. `chat` is a numeric id or an
    /// `@username` channel reference.
    pub async fn send_message(&self, chat: &str, text: &str) -> Result<()> {
        let body = json!({
            "chat_id": chat_target(chat),
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": false,
        });
        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| KioskoError::Channel(format!("sendMessage failed: {e}")))?;
        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| KioskoError::Channel(format!("invalid send response: {e}")))?;
        if !result.ok {
            return Err(KioskoError::Channel(format!(
                "send failed: {}",
                result.description.unwrap_or_default()
            )));
        }
        Ok(())
    }

    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| KioskoError::Channel(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| KioskoError::Channel(format!("invalid getMe response: {e}")))?;
        body.result
            .ok_or_else(|| KioskoError::Channel("no bot info".into()))
    }
}

/// Bot API accepts numeric chat ids as numbers and channel usernames
/// as strings.
fn chat_target(chat: &str) -> serde_json::Value {
    match chat.parse::<i64>() {
        Ok(id) => json!(id),
        Err(_) => json!(chat),
    }
}

/// [`ChannelSink`] that posts to the configured target channel.
pub struct TelegramSink {
    api: TelegramApi,
    target: String,
}

impl TelegramSink {
    pub fn new(api: TelegramApi, target: &str) -> Self {
        Self { api, target: target.to_string() }
    }
}

#[async_trait]
impl ChannelSink for TelegramSink {
    async fn deliver(&self, text: &str) -> Result<()> {
        self.api.send_message(&self.target, text).await
    }
}

/// Long-polling listener. Consumed by [`TelegramListener::start_polling`].
pub struct TelegramListener {
    api: TelegramApi,
    config: TelegramConfig,
    last_update_id: i64,
    /// Unix timestamp of listener start; older updates are replays
    /// from before a restart and must not be re-processed.
    started_at: i64,
}

impl TelegramListener {
    pub fn new(api: TelegramApi, config: TelegramConfig) -> Self {
        Self {
            api,
            config,
            last_update_id: 0,
            started_at: chrono::Utc::now().timestamp(),
        }
    }

    pub async fn get_updates(&mut self) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .api
            .client
            .get(self.api.api_url("getUpdates"))
            .query(&[
                ("offset", (self.last_update_id + 1).to_string()),
                ("timeout", "30".into()),
                ("allowed_updates", "[\"message\",\"channel_post\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| KioskoError::Channel(format!("getUpdates failed: {e}")))?;
        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| KioskoError::Channel(format!("invalid updates response: {e}")))?;
        if !body.ok {
            return Err(KioskoError::Channel(format!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            )));
        }
        let updates = body.result.unwrap_or_default();
        if let Some(last) = updates.last() {
            self.last_update_id = last.update_id;
        }
        Ok(updates)
    }

    /// Classify one update. `None` for anything the bot ignores.
    fn classify(&self, update: &TelegramUpdate) -> Option<InboundEvent> {
        if let Some(post) = &update.channel_post {
            if post.date < self.started_at {
                return None;
            }
            if !chat_matches(&post.chat, &self.config.source_channel) {
                return None;
            }
            let text = post.text.as_deref().or(post.caption.as_deref())?;
            return Some(InboundEvent::SourcePost { text: text.to_string() });
        }

        let msg = update.message.as_ref()?;
        if msg.date < self.started_at {
            return None;
        }
        let from = msg.from.as_ref()?;
        if from.is_bot {
            return None;
        }
        let text = msg.text.as_deref()?;
        let command = Command::parse(text)?;
        Some(InboundEvent::Command {
            chat_id: msg.chat.id,
            sender_id: from.id,
            command,
        })
    }

    /// Spawn the polling task and return the event stream.
    pub fn start_polling(self) -> InboundStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut listener = self;
            tracing::info!("📡 Telegram polling loop started");
            loop {
                match listener.get_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            if let Some(event) = listener.classify(&update)
                                && tx.send(event).is_err()
                            {
                                tracing::info!("polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telegram polling error: {e}");
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                    }
                }
                tokio::time::sleep(tokio::time::Duration::from_secs(
                    listener.config.poll_interval_secs,
                ))
                .await;
            }
        });
        InboundStream { rx }
    }
}

/// Matches a chat against a configured reference: numeric id or
/// `@username` (case-insensitive, `@` optional).
fn chat_matches(chat: &TelegramChat, reference: &str) -> bool {
    let reference = reference.trim();
    if chat.id.to_string() == reference {
        return true;
    }
    let wanted = reference.trim_start_matches('@');
    chat.username
        .as_deref()
        .is_some_and(|u| u.eq_ignore_ascii_case(wanted))
}

/// Stream of classified inbound events from polling.
pub struct InboundStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<InboundEvent>,
}

impl Stream for InboundStream {
    type Item = InboundEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Unpin for InboundStream {}

// --- Telegram API types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub channel_post: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> TelegramListener {
        let config = TelegramConfig {
            bot_token: "token".into(),
            source_channel: "@source_news".into(),
            target_channel: "@target_news".into(),
            admin_user_id: Some(1),
            poll_interval_secs: 1,
        };
        let mut l = TelegramListener::new(TelegramApi::new("token"), config);
        l.started_at = 1000;
        l
    }

    fn channel_chat(username: &str) -> TelegramChat {
        TelegramChat {
            id: -100123,
            chat_type: "channel".into(),
            title: Some("News".into()),
            username: Some(username.into()),
        }
    }

    fn post(chat: TelegramChat, text: &str, date: i64) -> TelegramUpdate {
        TelegramUpdate {
            update_id: 1,
            message: None,
            channel_post: Some(TelegramMessage {
                message_id: 1,
                from: None,
                chat,
                text: Some(text.into()),
                caption: None,
                date,
            }),
        }
    }

    fn user_message(text: &str, date: i64, is_bot: bool) -> TelegramUpdate {
        TelegramUpdate {
            update_id: 2,
            message: Some(TelegramMessage {
                message_id: 2,
                from: Some(TelegramUser {
                    id: 7,
                    is_bot,
                    first_name: "Op".into(),
                    last_name: None,
                    username: None,
                }),
                chat: TelegramChat {
                    id: 7,
                    chat_type: "private".into(),
                    title: None,
                    username: None,
                },
                text: Some(text.into()),
                caption: None,
                date,
            }),
            channel_post: None,
        }
    }

    #[test]
    fn source_channel_posts_are_classified() {
        let l = listener();
        let event = l.classify(&post(channel_chat("Source_News"), "https://e.com/a", 2000));
        assert!(matches!(
            event,
            Some(InboundEvent::SourcePost { text }) if text == "https://e.com/a"
        ));
    }

    #[test]
    fn foreign_channels_and_old_posts_are_ignored() {
        let l = listener();
        assert!(l.classify(&post(channel_chat("other"), "x", 2000)).is_none());
        // Posted before the listener started
        assert!(
            l.classify(&post(channel_chat("source_news"), "x", 500))
                .is_none()
        );
    }

    #[test]
    fn commands_are_decoded_and_noise_dropped() {
        let l = listener();
        match l.classify(&user_message("/status", 2000, false)) {
            Some(InboundEvent::Command { chat_id: 7, sender_id: 7, command }) => {
                assert_eq!(command.unwrap(), Command::Status);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(l.classify(&user_message("just chatting", 2000, false)).is_none());
        assert!(l.classify(&user_message("/status", 2000, true)).is_none());
    }

    #[test]
    fn chat_reference_matching() {
        let chat = channel_chat("Source_News");
        assert!(chat_matches(&chat, "@source_news"));
        assert!(chat_matches(&chat, "source_news"));
        assert!(chat_matches(&chat, "-100123"));
        assert!(!chat_matches(&chat, "@elsewhere"));
    }
}
