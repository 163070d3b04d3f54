//! Telegram adapter (teloxide).
//!
//! This crate implements the `etb-core` MessagingPort over the Telegram Bot API
//! and routes incoming updates into the core dispatcher.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode};

pub mod handlers;
pub mod router;

use etb_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{port::MessagingPort, types::GroupAdmission},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .bot
            .send_message(Self::tg_chat(chat_id), html.to_string())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    /// Bots cannot add members to a group directly; issue a single-use invite
    /// link instead. Requires the bot to be a group admin with invite rights.
    async fn admit_to_group(&self, group: ChatId, user: UserId) -> Result<GroupAdmission> {
        let link = self
            .bot
            .create_chat_invite_link(Self::tg_chat(group))
            .name(format!("ticket-{}", user.0))
            .member_limit(1)
            .await
            .map_err(Self::map_err)?;

        Ok(GroupAdmission::InviteLink(link.invite_link))
    }
}
