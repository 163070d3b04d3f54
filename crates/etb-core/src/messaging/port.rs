use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::types::GroupAdmission,
    Result,
};

/// Outbound messenger port.
///
/// Telegram is the only implementation; the flow and dispatcher depend on this
/// trait so they can be driven by fakes in tests.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Make `user` a member of the `group` chat, or hand back an invite the
    /// caller must deliver.
    async fn admit_to_group(&self, group: ChatId, user: UserId) -> Result<GroupAdmission>;
}
