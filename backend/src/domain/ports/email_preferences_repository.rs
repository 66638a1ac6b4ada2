//! Driven port for reminder opt-outs. Read-only for the workflow.
use async_trait::async_trait;

use crate::domain::{EmailPreferences, UserId};

use super::define_port_error;

define_port_error! {
    pub enum EmailPreferencesRepositoryError {
        Connection { message: String } => "email preferences connection failed: {message}",
        Query { message: String } => "email preferences query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailPreferencesRepository: Send + Sync {
    /// Preferences for `user_id`; `None` means defaults (reminders on).
    async fn find(
        &self,
        user_id: UserId,
    ) -> Result<Option<EmailPreferences>, EmailPreferencesRepositoryError>;
}
