//! SQLite storage gateway (rusqlite).
//!
//! Implements the `etb-core` RegistrationStore over a single `tickets` table.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tracing::debug;

use etb_core::{
    errors::Error, registration::NewRegistration, storage::RegistrationStore, Result,
};

const CREATE_TICKETS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS tickets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER,
        username TEXT,
        full_name TEXT,
        email TEXT,
        tickets INTEGER,
        ticket_id TEXT
    )
";

const INSERT_TICKET: &str = "
    INSERT INTO tickets (user_id, username, full_name, email, tickets, ticket_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
";

#[derive(Clone)]
pub struct SqliteRegistrationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistrationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(storage_err)?;
        debug!(path = %path.display(), "opened registration database");
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `op` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::Storage("connection lock poisoned".to_string()))?;
            op(&*guard).map_err(storage_err)
        })
        .await
        .map_err(|e| Error::Storage(format!("storage task failed: {e}")))?
    }
}

#[async_trait]
impl RegistrationStore for SqliteRegistrationStore {
    async fn ensure_schema(&self) -> Result<()> {
        self.with_conn(|conn| conn.execute_batch(CREATE_TICKETS_TABLE))
            .await
    }

    async fn insert_registration(&self, record: &NewRegistration) -> Result<i64> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                INSERT_TICKET,
                params![
                    record.user_id.0,
                    record.username,
                    record.full_name,
                    record.email,
                    record.tickets.get(),
                    record.ticket_id.as_str(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }
}

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use etb_core::{
        domain::{ChatId, MessageId, MessageRef, UserId},
        flow::{RegistrationFlow, SessionKey, StepOutcome},
        messaging::{
            port::MessagingPort,
            types::{GroupAdmission, TextMessage},
        },
        registration::{TicketCount, TicketId},
    };

    #[derive(Debug, PartialEq, Eq)]
    struct Row {
        id: i64,
        user_id: i64,
        username: Option<String>,
        full_name: String,
        email: String,
        tickets: i64,
        ticket_id: String,
    }

    async fn rows(store: &SqliteRegistrationStore) -> Vec<Row> {
        store
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, username, full_name, email, tickets, ticket_id
                     FROM tickets ORDER BY id",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(Row {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        username: row.get(2)?,
                        full_name: row.get(3)?,
                        email: row.get(4)?,
                        tickets: row.get(5)?,
                        ticket_id: row.get(6)?,
                    })
                })?;
                rows.collect()
            })
            .await
            .unwrap()
    }

    fn record(user: i64, username: Option<&str>, count: &str) -> NewRegistration {
        let tickets = TicketCount::parse(count).unwrap();
        NewRegistration {
            user_id: UserId(user),
            username: username.map(|s| s.to_string()),
            full_name: "Alex Doe".to_string(),
            email: "alex@example.com".to_string(),
            tickets,
            ticket_id: TicketId::derive(UserId(user), tickets),
        }
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let store = SqliteRegistrationStore::in_memory().unwrap();
        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();

        let (tables, columns) = store
            .with_conn(|conn| {
                let tables: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'tickets'",
                    [],
                    |row| row.get(0),
                )?;
                let columns: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM pragma_table_info('tickets')",
                    [],
                    |row| row.get(0),
                )?;
                Ok((tables, columns))
            })
            .await
            .unwrap();
        assert_eq!(tables, 1);
        assert_eq!(columns, 7);
    }

    #[tokio::test]
    async fn insert_without_schema_fails() {
        let store = SqliteRegistrationStore::in_memory().unwrap();
        let err = store
            .insert_registration(&record(1, None, "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn insert_appends_rows_and_allows_duplicate_ticket_ids() {
        let store = SqliteRegistrationStore::in_memory().unwrap();
        store.ensure_schema().await.unwrap();

        let first = store
            .insert_registration(&record(42, Some("alex"), "2"))
            .await
            .unwrap();
        let second = store
            .insert_registration(&record(42, None, "2"))
            .await
            .unwrap();
        assert!(second > first);

        let rows = rows(&store).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticket_id, "TICKET-42-2");
        assert_eq!(rows[0].ticket_id, rows[1].ticket_id);
        assert_eq!(rows[0].username.as_deref(), Some("alex"));
        assert_eq!(rows[1].username, None);
    }

    #[tokio::test]
    async fn file_backed_store_keeps_rows_across_reopen() {
        let path = std::env::temp_dir().join(format!(
            "etb-sqlite-{}-{}.db",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));

        {
            let store = SqliteRegistrationStore::open(&path).unwrap();
            store.ensure_schema().await.unwrap();
            store
                .insert_registration(&record(7, Some("sam"), "5"))
                .await
                .unwrap();
        }

        let reopened = SqliteRegistrationStore::open(&path).unwrap();
        reopened.ensure_schema().await.unwrap();
        let rows = rows(&reopened).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tickets, 5);

        let _ = std::fs::remove_file(&path);
    }

    #[derive(Default)]
    struct SilentMessenger {
        sent: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessagingPort for SilentMessenger {
        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.sent.lock().unwrap().push(html.to_string());
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(0),
            })
        }

        async fn admit_to_group(&self, _group: ChatId, _user: UserId) -> Result<GroupAdmission> {
            Ok(GroupAdmission::Added)
        }
    }

    #[tokio::test]
    async fn flow_writes_completed_registration_row() {
        let store = Arc::new(SqliteRegistrationStore::in_memory().unwrap());
        store.ensure_schema().await.unwrap();
        let messenger = Arc::new(SilentMessenger::default());
        let flow = RegistrationFlow::new(store.clone(), messenger.clone(), Some(ChatId(-1)));

        let user_id = 123_456;
        let say = |text: &str| TextMessage {
            chat_id: ChatId(user_id),
            user_id: UserId(user_id),
            username: Some("Alex".to_string()),
            text: text.to_string(),
        };

        flow.begin(SessionKey::new(ChatId(user_id), UserId(user_id)))
            .await
            .unwrap();
        flow.handle_text(&say("Alex Doe")).await.unwrap();
        flow.handle_text(&say("alex@example.com")).await.unwrap();
        let outcome = flow.handle_text(&say("3")).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Completed(_)));

        let rows = rows(&store).await;
        assert_eq!(
            rows,
            vec![Row {
                id: 1,
                user_id,
                username: Some("Alex".to_string()),
                full_name: "Alex Doe".to_string(),
                email: "alex@example.com".to_string(),
                tickets: 3,
                ticket_id: format!("TICKET-{user_id}-3"),
            }]
        );

        let sent = messenger.sent.lock().unwrap();
        assert!(sent
            .iter()
            .any(|t| t.contains(&format!("TICKET-{user_id}-3"))));
    }
}
