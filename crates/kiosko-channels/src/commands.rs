//! Operator command parsing.
//!
//! Commands are decoded at the transport boundary so everything past
//! the polling loop works with a typed [`Command`], not raw text.

use kiosko_core::error::{KioskoError, Result};
use kiosko_core::types::{Style, TextLength};

/// One operator command, already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Status,
    Queue,
    PublishNow(i64),
    Delete(i64),
    ClearQueue,
    Rewrite {
        id: i64,
        style: Option<Style>,
        length: Option<TextLength>,
    },
    Style(Option<Style>),
    GetCfg(String),
    SetCfg(String, String),
    Reload,
}

impl Command {
    /// Parse a message text. `None` for anything that is not a command;
    /// `Some(Err)` for a known command with bad arguments, so the bot
    /// can answer with usage instead of staying silent.
    pub fn parse(text: &str) -> Option<Result<Command>> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }
        let mut parts = text.split_whitespace();
        let head = parts.next()?;
        // Strip the bot mention suffix Telegram appends in groups.
        let name = head[1..].split('@').next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        let parsed = match name {
            "start" => Ok(Command::Start),
            "help" => Ok(Command::Help),
            "status" => Ok(Command::Status),
            "queue" => Ok(Command::Queue),
            "clear_queue" => Ok(Command::ClearQueue),
            "reload" => Ok(Command::Reload),
            "publish_now" => parse_id(&args, "/publish_now <id>").map(Command::PublishNow),
            "delete" => parse_id(&args, "/delete <id>").map(Command::Delete),
            "rewrite" => parse_rewrite(&args),
            "style" => match args.first() {
                None => Ok(Command::Style(None)),
                Some(s) => Style::parse(s).map(|s| Command::Style(Some(s))),
            },
            "get" => match args.first() {
                Some(key) => Ok(Command::GetCfg((*key).to_string())),
                None => Err(usage("/get <key>")),
            },
            "set" => match (args.first(), args.get(1)) {
                (Some(key), Some(_)) => {
                    Ok(Command::SetCfg((*key).to_string(), args[1..].join(" ")))
                }
                _ => Err(usage("/set <key> <value>")),
            },
            _ => return None,
        };
        Some(parsed)
    }
}

fn usage(u: &str) -> KioskoError {
    KioskoError::Config(format!("usage: {u}"))
}

fn parse_id(args: &[&str], u: &str) -> Result<i64> {
    args.first()
        .and_then(|a| a.parse::<i64>().ok())
        .ok_or_else(|| usage(u))
}

fn parse_rewrite(args: &[&str]) -> Result<Command> {
    let id = parse_id(args, "/rewrite <id> [style] [length]")?;
    let mut style = None;
    let mut length = None;
    for arg in &args[1..] {
        if let Ok(s) = Style::parse(arg) {
            style = Some(s);
        } else if let Ok(l) = TextLength::parse(arg) {
            length = Some(l);
        } else {
            return Err(usage("/rewrite <id> [style] [length]"));
        }
    }
    Ok(Command::Rewrite { id, style, length })
}

/// Text for `/help` and `/start`.
pub const HELP_TEXT: &str = "\
📰 *kiosko* — новостной бот

/status — состояние очереди
/queue — ближайшие публикации
/publish\\_now <id> — опубликовать немедленно
/rewrite <id> [стиль] [длина] — переписать статью
/delete <id> — удалить из очереди
/clear\\_queue — очистить очередь
/style [стиль] — показать или сменить стиль
/get <ключ> — показать настройку
/set <ключ> <значение> — изменить настройку
/reload — перечитать настройки
/help — эта справка";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(Command::parse("hello").is_none());
        assert!(Command::parse("").is_none());
        assert!(Command::parse("/unknown_cmd").is_none());
    }

    #[test]
    fn bare_commands_parse() {
        assert_eq!(Command::parse("/status").unwrap().unwrap(), Command::Status);
        assert_eq!(
            Command::parse("  /clear_queue  ").unwrap().unwrap(),
            Command::ClearQueue
        );
        // Group-chat mention form
        assert_eq!(
            Command::parse("/queue@kiosko_bot").unwrap().unwrap(),
            Command::Queue
        );
    }

    #[test]
    fn id_commands_validate_their_argument() {
        assert_eq!(
            Command::parse("/publish_now 42").unwrap().unwrap(),
            Command::PublishNow(42)
        );
        assert!(Command::parse("/publish_now").unwrap().is_err());
        assert!(Command::parse("/delete abc").unwrap().is_err());
    }

    #[test]
    fn rewrite_accepts_optional_style_and_length() {
        assert_eq!(
            Command::parse("/rewrite 7").unwrap().unwrap(),
            Command::Rewrite { id: 7, style: None, length: None }
        );
        assert_eq!(
            Command::parse("/rewrite 7 ironic short").unwrap().unwrap(),
            Command::Rewrite {
                id: 7,
                style: Some(Style::Ironic),
                length: Some(TextLength::Short)
            }
        );
        assert!(Command::parse("/rewrite 7 bogus").unwrap().is_err());
    }

    #[test]
    fn set_joins_multi_word_values() {
        assert_eq!(
            Command::parse("/set urgent_keywords молния, срочно").unwrap().unwrap(),
            Command::SetCfg("urgent_keywords".into(), "молния, срочно".into())
        );
        assert!(Command::parse("/set urgent_keywords").unwrap().is_err());
    }
}
