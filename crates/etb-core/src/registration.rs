use std::fmt;

use crate::domain::UserId;

pub const MIN_TICKETS: u8 = 1;
pub const MAX_TICKETS: u8 = 5;

/// Number of tickets requested in one registration (always within
/// `MIN_TICKETS..=MAX_TICKETS`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TicketCount(u8);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TicketCountError {
    #[error("not a whole number: {0:?}")]
    NotANumber(String),

    #[error("{0} is outside the allowed range")]
    OutOfRange(i64),
}

impl TicketCount {
    /// Parse a ticket count typed by the user. Surrounding whitespace is ignored.
    pub fn parse(text: &str) -> std::result::Result<Self, TicketCountError> {
        let trimmed = text.trim();
        let n = trimmed
            .parse::<i64>()
            .map_err(|_| TicketCountError::NotANumber(trimmed.to_string()))?;
        Self::try_from(n)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for TicketCount {
    type Error = TicketCountError;

    fn try_from(n: i64) -> std::result::Result<Self, Self::Error> {
        if n < i64::from(MIN_TICKETS) || n > i64::from(MAX_TICKETS) {
            return Err(TicketCountError::OutOfRange(n));
        }
        Ok(Self(n as u8))
    }
}

impl fmt::Display for TicketCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket identifier handed to the user.
///
/// Derived from the user id and the requested count only, so two
/// registrations by the same user for the same count share an identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TicketId(String);

impl TicketId {
    pub fn derive(user_id: UserId, count: TicketCount) -> Self {
        Self(format!("TICKET-{}-{}", user_id.0, count.get()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A completed form, ready to be written by the storage gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRegistration {
    pub user_id: UserId,
    pub username: Option<String>,
    pub full_name: String,
    pub email: String,
    pub tickets: TicketCount,
    pub ticket_id: TicketId,
}

/// A registration as persisted, with its row id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub id: i64,
    pub record: NewRegistration,
}
