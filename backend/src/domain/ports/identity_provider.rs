//! Driven port resolving request credentials to a user.

use async_trait::async_trait;

use crate::domain::User;

use super::define_port_error;

define_port_error! {
    pub enum IdentityProviderError {
        Transport { message: String } => "identity provider transport failed: {message}",
        Decode { message: String } => "identity provider response was malformed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer access token. Unknown or expired tokens yield
    /// `Ok(None)`.
    async fn authenticate(&self, access_token: &str) -> Result<Option<User>, IdentityProviderError>;
}
