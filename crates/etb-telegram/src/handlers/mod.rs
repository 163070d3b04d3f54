//! Telegram update handlers.
//!
//! Thin adapter: turn a teloxide `Message` into an `IncomingUpdate` and hand
//! it to the core dispatcher.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::{debug, error};

use etb_core::{
    dispatcher::DispatchOutcome,
    domain::{ChatId, UserId},
    messaging::types::IncomingUpdate,
};

use crate::router::AppState;

const GENERIC_FAILURE: &str = "Something went wrong. Please try again later.";

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // The bot sits in the event group as admin; ignore chatter there.
    if state.cfg.event_group_chat_id == Some(ChatId(msg.chat.id.0)) {
        return Ok(());
    }

    // Photos, stickers, etc. are not part of the flow.
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user) = msg.from() else {
        return Ok(());
    };

    let update = IncomingUpdate::from_text(
        ChatId(msg.chat.id.0),
        UserId(user.id.0 as i64),
        user.username.clone(),
        text,
    );

    match state.dispatcher.dispatch(update).await {
        Ok(DispatchOutcome::Ignored) => {
            debug!(chat_id = msg.chat.id.0, "update ignored");
        }
        Ok(outcome) => {
            debug!(chat_id = msg.chat.id.0, ?outcome, "update handled");
        }
        Err(e) => {
            error!(chat_id = msg.chat.id.0, error = %e, "failed to handle update");
            let _ = bot.send_message(msg.chat.id, GENERIC_FAILURE).await;
        }
    }

    Ok(())
}
