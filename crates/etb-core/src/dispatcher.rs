//! Top-level command routing.

use std::sync::Arc;

use tracing::debug;

use crate::{
    config::EventDetails,
    formatting::escape_html,
    flow::{RegistrationFlow, SessionKey, StepOutcome},
    messaging::{
        port::MessagingPort,
        types::{Command, IncomingUpdate},
    },
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Register,
    Cancel,
}

impl BotCommand {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "register" => Some(Self::Register),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A fixed reply was sent.
    Replied,
    /// The update was handed to the registration flow.
    Flow(StepOutcome),
    /// Unknown command or text outside a flow; nothing was sent.
    Ignored,
}

pub struct CommandDispatcher {
    flow: Arc<RegistrationFlow>,
    messenger: Arc<dyn MessagingPort>,
    event: EventDetails,
}

impl CommandDispatcher {
    pub fn new(
        flow: Arc<RegistrationFlow>,
        messenger: Arc<dyn MessagingPort>,
        event: EventDetails,
    ) -> Self {
        Self {
            flow,
            messenger,
            event,
        }
    }

    pub async fn dispatch(&self, update: IncomingUpdate) -> Result<DispatchOutcome> {
        match update {
            IncomingUpdate::Command(cmd) => self.handle_command(cmd).await,
            IncomingUpdate::Text(msg) => match self.flow.handle_text(&msg).await? {
                StepOutcome::Idle => Ok(DispatchOutcome::Ignored),
                outcome => Ok(DispatchOutcome::Flow(outcome)),
            },
        }
    }

    async fn handle_command(&self, cmd: Command) -> Result<DispatchOutcome> {
        let Some(command) = BotCommand::parse(&cmd.name) else {
            debug!(command = %cmd.name, user_id = cmd.user_id.0, "ignoring unknown command");
            return Ok(DispatchOutcome::Ignored);
        };
        let key = SessionKey::new(cmd.chat_id, cmd.user_id);

        match command {
            BotCommand::Start => {
                self.messenger
                    .send_html(cmd.chat_id, &welcome_html(&self.event))
                    .await?;
                Ok(DispatchOutcome::Replied)
            }
            BotCommand::Help => {
                self.messenger.send_html(cmd.chat_id, HELP_HTML).await?;
                Ok(DispatchOutcome::Replied)
            }
            BotCommand::Register => Ok(DispatchOutcome::Flow(self.flow.begin(key).await?)),
            BotCommand::Cancel => Ok(DispatchOutcome::Flow(
                self.flow.cancel(key, cmd.username.as_deref()).await?,
            )),
        }
    }
}

const HELP_HTML: &str = "<b>Commands:</b>\n\
/start - Start the bot and get event details\n\
/register - Register for the event\n\
/cancel - Cancel a registration in progress\n\
/help - Get help and instructions";

fn welcome_html(event: &EventDetails) -> String {
    format!(
        "Welcome to the Event Ticketing Bot! 🎉\n\n\
<b>Event Details</b>\n\
Organizer: {}\n\
Ticket Price: {}\n\
Event Date and Time: {}\n\n\
Use /register to get your ticket.\n\
For help, use /help.",
        escape_html(&event.organizer),
        escape_html(&event.ticket_price),
        escape_html(&event.starts_at),
    )
}
