//! Driving port for creating song briefs.

use async_trait::async_trait;

use crate::domain::{Customization, CustomizationDraft, Error, User};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomizationCommand: Send + Sync {
    /// Validate `draft` and store it for `user`.
    async fn create_customization(
        &self,
        user: &User,
        draft: CustomizationDraft,
    ) -> Result<Customization, Error>;
}
