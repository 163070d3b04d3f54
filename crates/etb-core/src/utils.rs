use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, registration::Registration, Result};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickets: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_chat_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admitted: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, user_id: i64, username: Option<&str>) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: Some(user_id),
            username: username.map(|s| s.to_string()),
            ticket_id: None,
            tickets: None,
            row_id: None,
            group_chat_id: None,
            admitted: None,
            error: None,
            context: None,
        }
    }

    pub fn registration(reg: &Registration) -> Self {
        let rec = &reg.record;
        Self {
            ticket_id: Some(rec.ticket_id.to_string()),
            tickets: Some(rec.tickets.get()),
            row_id: Some(reg.id),
            ..Self::base("registration", rec.user_id.0, rec.username.as_deref())
        }
    }

    pub fn cancellation(user_id: i64, username: Option<&str>) -> Self {
        Self::base("cancellation", user_id, username)
    }

    pub fn group_admission(
        user_id: i64,
        username: Option<&str>,
        group_chat_id: i64,
        error: Option<&str>,
    ) -> Self {
        Self {
            group_chat_id: Some(group_chat_id),
            admitted: Some(error.is_none()),
            error: error.map(|s| s.to_string()),
            ..Self::base("group_admission", user_id, username)
        }
    }

    pub fn error(user_id: i64, username: Option<&str>, error: &str, context: Option<&str>) -> Self {
        Self {
            error: Some(error.to_string()),
            context: context.map(|s| s.to_string()),
            ..Self::base("error", user_id, username)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }
        if let Some(s) = &event.context {
            event.context = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::UserId,
        registration::{NewRegistration, TicketCount, TicketId},
    };

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("{prefix}-{pid}-{ts}.log"))
    }

    fn sample_registration() -> Registration {
        let tickets = TicketCount::parse("2").unwrap();
        Registration {
            id: 7,
            record: NewRegistration {
                user_id: UserId(99),
                username: Some("alex".to_string()),
                full_name: "Alex Doe".to_string(),
                email: "alex@example.com".to_string(),
                tickets,
                ticket_id: TicketId::derive(UserId(99), tickets),
            },
        }
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), AUDIT_MAX_TEXT + 3);
    }

    #[test]
    fn registration_event_serializes_ticket_fields_only() {
        let ev = AuditEvent::registration(&sample_registration());
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "registration");
        assert_eq!(v["ticket_id"], "TICKET-99-2");
        assert_eq!(v["tickets"], 2);
        assert_eq!(v["row_id"], 7);
        assert!(v.get("error").is_none());
        assert!(v.get("group_chat_id").is_none());
    }

    #[test]
    fn json_audit_appends_one_line_per_event() {
        let log = AuditLogger::new(tmp_file("etb-audit-json"), true);
        log.write(AuditEvent::cancellation(1, None)).unwrap();
        log.write(AuditEvent::group_admission(1, Some("u"), -100, Some("forbidden")))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["admitted"], false);
        assert_eq!(second["error"], "forbidden");
    }

    #[test]
    fn text_audit_truncates_long_errors() {
        let log = AuditLogger::new(tmp_file("etb-audit-text"), false);
        let long = "x".repeat(AUDIT_MAX_TEXT + 50);
        log.write(AuditEvent::error(1, Some("u"), &long, Some("insert")))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("event: error"));
        assert!(written.contains("context: insert"));
        assert!(written.contains("..."));
        assert!(!written.contains(&long));
    }
}
