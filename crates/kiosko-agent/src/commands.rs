//! Operator command execution.
//!
//! [`CommandExecutor::execute`] turns a decoded command into a reply
//! string; the thin [`CommandExecutor::handle`] wrapper applies the
//! admin gate and ships the reply back over Telegram.

use std::sync::Arc;

use tracing::{info, warn};

use kiosko_channels::{Command, HELP_TEXT, TelegramApi};
use kiosko_core::clock::Clock;
use kiosko_core::error::Result;
use kiosko_core::error::KioskoError;
use kiosko_core::settings::KEY_ARTICLE_STYLE;
use kiosko_core::traits::Rewriter;
use kiosko_core::types::{ArticleRecord, QueueSummary, Style};
use kiosko_scheduler::{Publisher, SlotPlanner};
use kiosko_store::{NewsStore, SettingsManager};

pub struct CommandExecutor {
    store: NewsStore,
    publisher: Arc<Publisher>,
    rewriter: Arc<dyn Rewriter>,
    settings: SettingsManager,
    clock: Clock,
    admin_user_id: Option<i64>,
    api: TelegramApi,
}

impl CommandExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: NewsStore,
        publisher: Arc<Publisher>,
        rewriter: Arc<dyn Rewriter>,
        settings: SettingsManager,
        clock: Clock,
        admin_user_id: Option<i64>,
        api: TelegramApi,
    ) -> Self {
        Self {
            store,
            publisher,
            rewriter,
            settings,
            clock,
            admin_user_id,
            api,
        }
    }

    /// Whether `sender_id` may run privileged commands. With no admin
    /// configured the bot is open, matching single-operator setups.
    fn is_admin(&self, sender_id: i64) -> bool {
        self.admin_user_id.is_none_or(|admin| admin == sender_id)
    }

    /// Gate, execute, reply. Never propagates: a failed reply is only
    /// logged, the polling loop must keep running.
    pub async fn handle(&self, chat_id: i64, sender_id: i64, command: Result<Command>) {
        let reply = match command {
            Err(e) => format!("❌ {e}"),
            Ok(cmd) => {
                let privileged = !matches!(cmd, Command::Start | Command::Help);
                if privileged && !self.is_admin(sender_id) {
                    warn!(sender_id, "⛔ command from non-admin ignored");
                    "⛔ Команда доступна только администратору".to_string()
                } else {
                    match self.execute(cmd).await {
                        Ok(text) => text,
                        Err(e) => format!("❌ {e}"),
                    }
                }
            }
        };
        if let Err(e) = self.api.send_message(&chat_id.to_string(), &reply).await {
            warn!(chat_id, "reply failed: {e}");
        }
    }

    /// Run one command and produce the reply text.
    pub async fn execute(&self, command: Command) -> Result<String> {
        match command {
            Command::Start | Command::Help => Ok(HELP_TEXT.to_string()),

            Command::Status => {
                let summary = self.store.status_summary(5)?;
                let planner = SlotPlanner::new(&self.settings.snapshot().publish_hours);
                Ok(format_status(&summary, &planner))
            }

            Command::Queue => {
                let pending = self.store.list_pending(10)?;
                Ok(format_queue(&pending))
            }

            Command::PublishNow(id) => {
                self.publisher.publish_by_id(id).await?;
                info!(id, "manual publish");
                Ok(format!("✅ Статья {id} опубликована"))
            }

            Command::Delete(id) => {
                if self.store.delete(id)? {
                    Ok(format!("✅ Статья {id} удалена из очереди"))
                } else {
                    Ok(format!("❌ Статья {id} не найдена"))
                }
            }

            Command::ClearQueue => {
                let removed = self.store.clear_pending()?;
                info!(removed, "queue cleared");
                Ok(format!("✅ Очередь очищена: удалено {removed}"))
            }

            Command::Rewrite { id, style, length } => {
                let record = self
                    .store
                    .get(id)?
                    .ok_or_else(|| KioskoError::NotFound(format!("article {id}")))?;
                let snapshot = self.settings.snapshot();
                let style = style.unwrap_or(snapshot.style);
                let length = length.unwrap_or(snapshot.text_length);
                let rewritten = self
                    .rewriter
                    .rewrite(&record.title, &record.original_text, style, length)
                    .await?;
                self.store.update_processed_text(id, &rewritten)?;
                Ok(format!(
                    "✅ Статья {id} переписана ({}, {})",
                    style.as_str(),
                    length.as_str()
                ))
            }

            Command::Style(None) => {
                let current = self.settings.snapshot().style;
                let all = Style::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(format!("Текущий стиль: *{}*\nДоступные: {all}", current.as_str()))
            }

            Command::Style(Some(style)) => {
                self.settings
                    .set(KEY_ARTICLE_STYLE, style.as_str(), self.clock.now())?;
                Ok(format!("✅ Стиль изменён на *{}*", style.as_str()))
            }

            Command::GetCfg(key) => {
                let value = self.settings.snapshot().get_kv(&key)?;
                Ok(format!("`{key}` = `{value}`"))
            }

            Command::SetCfg(key, value) => {
                self.settings.set(&key, &value, self.clock.now())?;
                let effective = self.settings.snapshot().get_kv(&key)?;
                Ok(format!("✅ `{key}` = `{effective}`"))
            }

            Command::Reload => {
                self.settings.reload()?;
                let pairs = self
                    .settings
                    .snapshot()
                    .kv_pairs()
                    .into_iter()
                    .map(|(k, v)| format!("`{k}` = `{v}`"))
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(format!("✅ Настройки перечитаны:\n{pairs}"))
            }
        }
    }
}

fn format_status(summary: &QueueSummary, planner: &SlotPlanner) -> String {
    let mut out = format!(
        "📊 *Состояние очереди*\n\
         Всего: {}\n\
         В очереди: {}\n\
         Опубликовано: {}\n\
         Ошибок: {}\n\
         Срочных: {}\n\
         Расписание: {}",
        summary.total,
        summary.pending,
        summary.published,
        summary.failed,
        summary.urgent,
        planner.format_schedule(),
    );
    if !summary.next.is_empty() {
        out.push_str("\n\n*Ближайшие публикации:*");
        for p in &summary.next {
            let flag = if p.is_urgent { " 🚨" } else { "" };
            out.push_str(&format!(
                "\n{} — #{} {}{flag}",
                p.scheduled_time.format("%d.%m %H:%M"),
                p.id,
                p.title,
            ));
        }
    }
    out
}

fn format_queue(pending: &[ArticleRecord]) -> String {
    if pending.is_empty() {
        return "📭 Очередь пуста".to_string();
    }
    let mut out = String::from("📬 *Очередь публикаций:*");
    for r in pending {
        let flag = if r.is_urgent { " 🚨" } else { "" };
        out.push_str(&format!(
            "\n{} — #{} {}{flag}",
            r.scheduled_time.format("%d.%m %H:%M"),
            r.id,
            r.title,
        ));
    }
    out
}
