use crate::domain::{ChatId, UserId};

/// Messenger-agnostic incoming update model.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncomingUpdate {
    Command(Command),
    Text(TextMessage),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

impl IncomingUpdate {
    /// Classify raw message text: leading `/` means a command.
    pub fn from_text(
        chat_id: ChatId,
        user_id: UserId,
        username: Option<String>,
        text: &str,
    ) -> Self {
        if text.starts_with('/') {
            let (name, _args) = parse_command(text);
            return Self::Command(Command {
                chat_id,
                user_id,
                username,
                name,
            });
        }
        Self::Text(TextMessage {
            chat_id,
            user_id,
            username,
            text: text.to_string(),
        })
    }
}

/// Split `/cmd@botname arg1 ...` into a lowercase command name and the rest.
pub fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Result of asking the messenger to add a user to the event group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupAdmission {
    /// The user is now a member. The Telegram adapter never returns this;
    /// bots there can only hand out invite links.
    Added,
    /// The platform only allows joining through a link; send it to the user.
    InviteLink(String),
}
