//! Driven port for song briefs and their tweak amendments.

use async_trait::async_trait;

use crate::domain::{Customization, CustomizationBrief, CustomizationId, UserId};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by customization repository adapters.
    pub enum CustomizationRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "customization repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "customization repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomizationRepository: Send + Sync {
    /// Store a new brief for `user_id`.
    async fn create(
        &self,
        user_id: UserId,
        brief: &CustomizationBrief,
    ) -> Result<Customization, CustomizationRepositoryError>;

    /// Load a brief with its latest amendment, regardless of owner.
    async fn find(
        &self,
        id: CustomizationId,
    ) -> Result<Option<Customization>, CustomizationRepositoryError>;

    /// Load a brief only when `user_id` owns it.
    async fn find_owned(
        &self,
        id: CustomizationId,
        user_id: UserId,
    ) -> Result<Option<Customization>, CustomizationRepositoryError>;
}
