use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{domain::ChatId, errors::Error, Result};

/// Event details shown by `/start`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDetails {
    pub organizer: String,
    pub ticket_price: String,
    pub starts_at: String,
}

impl Default for EventDetails {
    fn default() -> Self {
        Self {
            organizer: "ARES_Group".to_string(),
            ticket_price: "Starting from LKR 2500".to_string(),
            starts_at: "December 10, 2024, at 7:00 PM".to_string(),
        }
    }
}

/// Typed configuration, read from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    /// Group the user is admitted to after registering. Admission is skipped when unset.
    pub event_group_chat_id: Option<ChatId>,
    pub database_path: PathBuf,

    pub event: EventDetails,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in `load`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        // Optional, but must be well-formed when present.
        let event_group_chat_id = match get("EVENT_GROUP_CHAT_ID") {
            Some(raw) => Some(ChatId(raw.trim().parse::<i64>().map_err(|_| {
                Error::Config(format!("EVENT_GROUP_CHAT_ID must be an integer, got {raw:?}"))
            })?)),
            None => None,
        };

        let database_path =
            PathBuf::from(get("DATABASE_PATH").unwrap_or_else(|| "tickets.db".to_string()));

        let defaults = EventDetails::default();
        let event = EventDetails {
            organizer: get("EVENT_ORGANIZER").unwrap_or(defaults.organizer),
            ticket_price: get("EVENT_TICKET_PRICE").unwrap_or(defaults.ticket_price),
            starts_at: get("EVENT_DATE").unwrap_or(defaults.starts_at),
        };

        // Audit logging
        let audit_log_path = PathBuf::from(
            get("AUDIT_LOG_PATH").unwrap_or_else(|| "/tmp/event-ticket-bot-audit.log".to_string()),
        );
        let audit_log_json = get("AUDIT_LOG_JSON").map(|s| parse_bool(&s)).unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            event_group_chat_id,
            database_path,
            event,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn token_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("TELEGRAM_BOT_TOKEN")));

        let err = Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "   ")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let cfg = Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "123:abc")])).unwrap();
        assert_eq!(cfg.telegram_bot_token, "123:abc");
        assert_eq!(cfg.event_group_chat_id, None);
        assert_eq!(cfg.database_path, PathBuf::from("tickets.db"));
        assert_eq!(cfg.event, EventDetails::default());
        assert!(!cfg.audit_log_json);
    }

    #[test]
    fn group_chat_id_must_be_numeric() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("EVENT_GROUP_CHAT_ID", "-1001890846699"),
        ]))
        .unwrap();
        assert_eq!(cfg.event_group_chat_id, Some(ChatId(-1001890846699)));

        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("EVENT_GROUP_CHAT_ID", "@my_group"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("EVENT_GROUP_CHAT_ID")));
    }

    #[test]
    fn event_details_and_flags_can_be_overridden() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("EVENT_ORGANIZER", "Rust Meetup"),
            ("DATABASE_PATH", "/var/lib/etb/tickets.db"),
            ("AUDIT_LOG_JSON", "yes"),
        ]))
        .unwrap();
        assert_eq!(cfg.event.organizer, "Rust Meetup");
        assert_eq!(cfg.event.ticket_price, EventDetails::default().ticket_price);
        assert_eq!(cfg.database_path, PathBuf::from("/var/lib/etb/tickets.db"));
        assert!(cfg.audit_log_json);
    }

    #[test]
    fn unquote_strips_matching_quotes_only() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"abc'"), "\"abc'");
        assert_eq!(unquote("abc"), "abc");
    }
}
