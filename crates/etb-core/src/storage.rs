use async_trait::async_trait;

use crate::{registration::NewRegistration, Result};

/// Storage gateway port for completed registrations.
///
/// Append-only: there is no update, delete, or lookup.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Create the registration table if it does not exist. Safe to call on every start.
    async fn ensure_schema(&self) -> Result<()>;

    /// Append one row and return its row id. Duplicate ticket ids are accepted.
    async fn insert_registration(&self, record: &NewRegistration) -> Result<i64>;
}
