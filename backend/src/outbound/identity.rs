//! Bearer-token resolution against the hosted auth service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::http_support::{client_with_timeout, join_path, status_message};
use crate::domain::ports::{IdentityProvider, IdentityProviderError};
use crate::domain::{User, UserId};

const USER_PATH: &str = "auth/v1/user";

/// Endpoint and project key of the identity provider.
#[derive(Clone)]
pub struct IdentityProviderConfig {
    pub api_base: Url,
    pub api_key: Zeroizing<String>,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct AuthUserDto {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

/// [`IdentityProvider`] asking the auth service who owns a token.
pub struct HttpIdentityProvider {
    client: Client,
    endpoint: Url,
    api_key: Zeroizing<String>,
}

impl HttpIdentityProvider {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built or the endpoint
    /// URL is invalid.
    pub fn new(config: IdentityProviderConfig) -> Result<Self, IdentityProviderError> {
        let client = client_with_timeout(config.timeout)
            .map_err(|error| IdentityProviderError::transport(error.to_string()))?;
        let endpoint = join_path(&config.api_base, USER_PATH).map_err(|error| {
            IdentityProviderError::transport(format!("invalid api base: {error}"))
        })?;
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
        })
    }
}

fn decode_user(body: &[u8]) -> Result<Option<User>, IdentityProviderError> {
    let dto: AuthUserDto = serde_json::from_slice(body)
        .map_err(|error| IdentityProviderError::decode(error.to_string()))?;
    let Some(email) = dto.email else {
        // Anonymous and phone-only accounts cannot receive songs.
        debug!(user_id = %dto.id, "authenticated user has no e-mail");
        return Ok(None);
    };
    User::new(UserId::from_uuid(dto.id), email)
        .map(Some)
        .map_err(|error| IdentityProviderError::decode(error.to_string()))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn authenticate(&self, access_token: &str) -> Result<Option<User>, IdentityProviderError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(access_token)
            .header("apikey", self.api_key.as_str())
            .send()
            .await
            .map_err(|error| IdentityProviderError::transport(error.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| IdentityProviderError::transport(error.to_string()))?;
        match status {
            _ if status.is_success() => decode_user(body.as_ref()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            _ => Err(IdentityProviderError::transport(status_message(status, body.as_ref()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_users_with_email() {
        let user = decode_user(
            br#"{"id":"3fa85f64-5717-4562-b3fc-2c963f66afa6","email":"Sam@Example.com","aud":"authenticated"}"#,
        )
        .expect("decodes")
        .expect("has user");
        assert_eq!(user.id().to_string(), "3fa85f64-5717-4562-b3fc-2c963f66afa6");
        assert_eq!(user.email(), "sam@example.com");
    }

    #[test]
    fn users_without_email_are_not_authenticated() {
        let user = decode_user(br#"{"id":"3fa85f64-5717-4562-b3fc-2c963f66afa6"}"#)
            .expect("decodes");
        assert!(user.is_none());
    }

    #[test]
    fn malformed_bodies_are_decode_errors() {
        let error = decode_user(br#"{"id":"nope"}"#).expect_err("bad id");
        assert!(matches!(error, IdentityProviderError::Decode { .. }));
    }
}
