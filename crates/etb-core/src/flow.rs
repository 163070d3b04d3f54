//! Registration conversation: name -> email -> ticket count -> done.
//!
//! Each inbound text resumes the session for its `(chat, user)` key. Form
//! state lives only in memory and is dropped on completion or cancellation.

use std::{collections::HashMap, fmt, sync::Arc};

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    domain::{ChatId, UserId},
    formatting::escape_html,
    messaging::{
        port::MessagingPort,
        types::{GroupAdmission, TextMessage},
    },
    registration::{NewRegistration, Registration, TicketCount, TicketId, MAX_TICKETS},
    storage::RegistrationStore,
    utils::{AuditEvent, AuditLogger},
    validation::is_valid_email,
    Result,
};

pub const PROMPT_NAME: &str = "Please enter your full name:";
pub const PROMPT_EMAIL: &str = "Please enter your email address:";
pub const INVALID_EMAIL: &str = "Invalid email address. Please enter a valid email address:";
pub const INVALID_TICKETS: &str = "Please enter a valid number between 1 and 5.";
pub const CANCELLED: &str = "Registration canceled.";
pub const NOTHING_TO_CANCEL: &str = "No registration in progress.";
pub const STORAGE_FAILED: &str = "Sorry, we could not save your registration. \
Please send the number of tickets again, or /cancel.";
pub const ADMISSION_FAILED: &str = "You are registered, but we could not add you to the event \
group automatically. Please contact the organizer.";

fn prompt_tickets() -> String {
    format!("How many tickets do you need? (Max: {MAX_TICKETS})")
}

/// Identity of one conversation: a user in a chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub chat_id: ChatId,
    pub user_id: UserId,
}

impl SessionKey {
    pub fn new(chat_id: ChatId, user_id: UserId) -> Self {
        Self { chat_id, user_id }
    }
}

/// Non-terminal steps of the flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowStep {
    AwaitingName,
    AwaitingEmail,
    AwaitingTicketCount,
}

impl FlowStep {
    fn prompt(self) -> String {
        match self {
            FlowStep::AwaitingName => PROMPT_NAME.to_string(),
            FlowStep::AwaitingEmail => PROMPT_EMAIL.to_string(),
            FlowStep::AwaitingTicketCount => prompt_tickets(),
        }
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowStep::AwaitingName => "awaiting_name",
            FlowStep::AwaitingEmail => "awaiting_email",
            FlowStep::AwaitingTicketCount => "awaiting_ticket_count",
        };
        f.write_str(s)
    }
}

/// Fields collected so far. The current step is derived from which are set,
/// so they can only be filled in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormState {
    pub full_name: Option<String>,
    pub email: Option<String>,
    /// Stays `None` in a live session: an accepted count ends the session.
    pub tickets: Option<TicketCount>,
}

impl FormState {
    pub fn step(&self) -> FlowStep {
        match (&self.full_name, &self.email) {
            (None, _) => FlowStep::AwaitingName,
            (Some(_), None) => FlowStep::AwaitingEmail,
            (Some(_), Some(_)) => FlowStep::AwaitingTicketCount,
        }
    }
}

/// What a single inbound event did to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// No session for this key; the event was not consumed.
    Idle,
    /// Input accepted; the session moved on to this step.
    Advanced(FlowStep),
    /// Input rejected; the session stays at this step.
    Rejected(FlowStep),
    /// A register trigger arrived mid-flow; the current prompt was repeated.
    Reprompted(FlowStep),
    /// The registration was stored and the session ended.
    Completed(Registration),
    /// The session was discarded on request.
    Cancelled,
    /// The store refused the write; the session stays at the ticket count step.
    StorageFailed,
}

/// Conversation flow controller and owner of the per-session form store.
pub struct RegistrationFlow {
    store: Arc<dyn RegistrationStore>,
    messenger: Arc<dyn MessagingPort>,
    group_chat_id: Option<ChatId>,
    audit: Option<Arc<AuditLogger>>,
    sessions: Mutex<HashMap<SessionKey, FormState>>,
}

impl RegistrationFlow {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        messenger: Arc<dyn MessagingPort>,
        group_chat_id: Option<ChatId>,
    ) -> Self {
        Self {
            store,
            messenger,
            group_chat_id,
            audit: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub async fn is_active(&self, key: SessionKey) -> bool {
        self.sessions.lock().await.contains_key(&key)
    }

    /// Snapshot of the form for `key`, if a session is active.
    pub async fn form(&self, key: SessionKey) -> Option<FormState> {
        self.sessions.lock().await.get(&key).cloned()
    }

    /// Entry point: start a fresh session and ask for the full name.
    pub async fn begin(&self, key: SessionKey) -> Result<StepOutcome> {
        let existing = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get(&key) {
                Some(form) => Some(form.step()),
                None => {
                    sessions.insert(key, FormState::default());
                    None
                }
            }
        };

        if let Some(step) = existing {
            self.reply(key, &step.prompt()).await?;
            return Ok(StepOutcome::Reprompted(step));
        }

        info!(chat_id = key.chat_id.0, user_id = key.user_id.0, "registration started");
        self.reply(key, PROMPT_NAME).await?;
        Ok(StepOutcome::Advanced(FlowStep::AwaitingName))
    }

    pub async fn cancel(&self, key: SessionKey, username: Option<&str>) -> Result<StepOutcome> {
        let removed = self.sessions.lock().await.remove(&key);
        let Some(form) = removed else {
            self.reply(key, NOTHING_TO_CANCEL).await?;
            return Ok(StepOutcome::Idle);
        };

        info!(
            chat_id = key.chat_id.0,
            user_id = key.user_id.0,
            step = %form.step(),
            "registration cancelled"
        );
        self.audit(AuditEvent::cancellation(key.user_id.0, username));
        self.reply(key, CANCELLED).await?;
        Ok(StepOutcome::Cancelled)
    }

    /// Feed one non-command text message into the session it belongs to.
    pub async fn handle_text(&self, msg: &TextMessage) -> Result<StepOutcome> {
        let key = SessionKey::new(msg.chat_id, msg.user_id);

        let mut sessions = self.sessions.lock().await;
        let Some(form) = sessions.get_mut(&key) else {
            return Ok(StepOutcome::Idle);
        };

        match (form.full_name.clone(), form.email.clone()) {
            (None, _) => {
                form.full_name = Some(msg.text.clone());
                drop(sessions);
                self.reply(key, PROMPT_EMAIL).await?;
                Ok(StepOutcome::Advanced(FlowStep::AwaitingEmail))
            }
            (Some(_), None) => {
                let email = msg.text.trim();
                if !is_valid_email(email) {
                    drop(sessions);
                    self.reply(key, INVALID_EMAIL).await?;
                    return Ok(StepOutcome::Rejected(FlowStep::AwaitingEmail));
                }
                form.email = Some(email.to_string());
                drop(sessions);
                self.reply(key, &prompt_tickets()).await?;
                Ok(StepOutcome::Advanced(FlowStep::AwaitingTicketCount))
            }
            (Some(full_name), Some(email)) => {
                let tickets = match TicketCount::parse(&msg.text) {
                    Ok(count) => count,
                    Err(e) => {
                        drop(sessions);
                        info!(user_id = key.user_id.0, reason = %e, "ticket count rejected");
                        self.reply(key, INVALID_TICKETS).await?;
                        return Ok(StepOutcome::Rejected(FlowStep::AwaitingTicketCount));
                    }
                };
                sessions.remove(&key);
                drop(sessions);

                let record = NewRegistration {
                    user_id: key.user_id,
                    username: msg.username.clone(),
                    full_name,
                    email,
                    tickets,
                    ticket_id: TicketId::derive(key.user_id, tickets),
                };
                self.complete(key, record).await
            }
        }
    }

    /// Store a finished form. Once the row exists nothing here returns `Err`:
    /// send failures are logged and audited so the caller never suggests
    /// registering again.
    async fn complete(&self, key: SessionKey, record: NewRegistration) -> Result<StepOutcome> {
        let id = match self.store.insert_registration(&record).await {
            Ok(id) => id,
            Err(e) => {
                error!(user_id = key.user_id.0, error = %e, "failed to store registration");
                self.audit(AuditEvent::error(
                    key.user_id.0,
                    record.username.as_deref(),
                    &e.to_string(),
                    Some("insert_registration"),
                ));
                let form = FormState {
                    full_name: Some(record.full_name),
                    email: Some(record.email),
                    tickets: None,
                };
                self.sessions.lock().await.insert(key, form);
                self.reply(key, STORAGE_FAILED).await?;
                return Ok(StepOutcome::StorageFailed);
            }
        };

        let registration = Registration { id, record };
        info!(
            user_id = key.user_id.0,
            ticket_id = %registration.record.ticket_id,
            tickets = registration.record.tickets.get(),
            row_id = id,
            "registration stored"
        );
        self.audit(AuditEvent::registration(&registration));

        let username = registration.record.username.as_deref();
        self.notify(
            key,
            username,
            &confirmation_html(&registration, self.group_chat_id.is_some()),
            "send_confirmation",
        )
        .await;

        if let Some(group) = self.group_chat_id {
            self.admit(key, group, username).await;
        }

        Ok(StepOutcome::Completed(registration))
    }

    /// Best effort: the registration is already stored, so failures only
    /// change what the user is told.
    async fn admit(&self, key: SessionKey, group: ChatId, username: Option<&str>) {
        match self.messenger.admit_to_group(group, key.user_id).await {
            Ok(GroupAdmission::Added) => {
                info!(user_id = key.user_id.0, group = group.0, "added to event group");
                self.audit(AuditEvent::group_admission(key.user_id.0, username, group.0, None));
                self.notify(
                    key,
                    username,
                    "You have been added to the event group.",
                    "send_group_added",
                )
                .await;
            }
            Ok(GroupAdmission::InviteLink(link)) => {
                info!(user_id = key.user_id.0, group = group.0, "sent event group invite");
                self.audit(AuditEvent::group_admission(key.user_id.0, username, group.0, None));
                let html = format!(
                    "Join the event group here: {}\n(The link works once.)",
                    escape_html(&link)
                );
                self.notify(key, username, &html, "send_group_invite").await;
            }
            Err(e) => {
                warn!(user_id = key.user_id.0, group = group.0, error = %e, "group admission failed");
                self.audit(AuditEvent::group_admission(
                    key.user_id.0,
                    username,
                    group.0,
                    Some(&e.to_string()),
                ));
                self.notify(key, username, ADMISSION_FAILED, "send_admission_failed")
                    .await;
            }
        }
    }

    async fn reply(&self, key: SessionKey, html: &str) -> Result<()> {
        self.messenger.send_html(key.chat_id, html).await?;
        Ok(())
    }

    /// Send after the row is stored; a failure is logged and audited only.
    async fn notify(&self, key: SessionKey, username: Option<&str>, html: &str, context: &str) {
        if let Err(e) = self.reply(key, html).await {
            warn!(user_id = key.user_id.0, error = %e, context, "reply after registration failed");
            self.audit(AuditEvent::error(
                key.user_id.0,
                username,
                &e.to_string(),
                Some(context),
            ));
        }
    }

    fn audit(&self, event: AuditEvent) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.write(event) {
            warn!(error = %e, path = %audit.path().display(), "audit write failed");
        }
    }
}

fn confirmation_html(reg: &Registration, joining_group: bool) -> String {
    let rec = &reg.record;
    let mut out = format!(
        "Thank you, {}! 🎟\n\n\
You have successfully registered for {} ticket(s). Your ticket ID is <code>{}</code>.",
        escape_html(&rec.full_name),
        rec.tickets,
        escape_html(rec.ticket_id.as_str()),
    );
    if joining_group {
        out.push_str("\n\nYou will now be added to the event group.");
    }
    out
}
