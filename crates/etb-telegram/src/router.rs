use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use etb_core::{
    config::Config,
    dispatcher::CommandDispatcher,
    flow::RegistrationFlow,
    messaging::port::MessagingPort,
    storage::RegistrationStore,
    utils::AuditLogger,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub dispatcher: Arc<CommandDispatcher>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    store: Arc<dyn RegistrationStore>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "event ticket bot started"),
        Err(e) => warn!(error = %e, "could not fetch bot identity"),
    }
    match cfg.event_group_chat_id {
        Some(group) => info!(group = group.0, "registered users will be invited to the event group"),
        None => info!("EVENT_GROUP_CHAT_ID not set; group admission disabled"),
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let audit = Arc::new(AuditLogger::new(
        cfg.audit_log_path.clone(),
        cfg.audit_log_json,
    ));
    let flow = Arc::new(
        RegistrationFlow::new(store, messenger.clone(), cfg.event_group_chat_id).with_audit(audit),
    );
    let dispatcher = Arc::new(CommandDispatcher::new(
        flow,
        messenger,
        cfg.event.clone(),
    ));

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        dispatcher,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("event ticket bot stopped");
    Ok(())
}
