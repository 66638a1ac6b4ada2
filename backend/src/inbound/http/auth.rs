//! Request authentication for HTTP handlers.
//!
//! Handlers declare what kind of caller they accept by taking one of the
//! extractors below as an argument:
//! - [`AuthenticatedUser`]: a bearer token accepted by the identity provider.
//! - [`AdminUser`]: an authenticated user on the admin allow-list.
//! - [`InternalCaller`]: a request carrying the shared internal secret.
//!
//! Keep credential parsing here so handler modules stay focused on request
//! and response mapping.

use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{debug, warn};

use crate::domain::ports::{INTERNAL_SECRET_HEADER, IdentityProviderError, UserPersistenceError};
use crate::domain::{Error, ErrorCode, User};

use super::state::HttpState;

const BEARER_PREFIX: &str = "Bearer ";

fn state_of(req: &HttpRequest) -> Result<web::Data<HttpState>, Error> {
    req.app_data::<web::Data<HttpState>>()
        .cloned()
        .ok_or_else(|| Error::internal("HTTP state is not configured"))
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

fn map_identity_error(error: IdentityProviderError) -> Error {
    warn!(%error, "identity provider lookup failed");
    match error {
        IdentityProviderError::Transport { .. } => {
            Error::service_unavailable("identity provider unavailable")
        }
        IdentityProviderError::Decode { .. } => Error::internal("identity provider error"),
    }
}

fn map_user_error(error: UserPersistenceError) -> Error {
    match error {
        UserPersistenceError::Connection { message } => {
            Error::service_unavailable(format!("user store unavailable: {message}"))
        }
        UserPersistenceError::Query { message } => {
            Error::internal(format!("user store error: {message}"))
        }
    }
}

async fn authenticate(state: &HttpState, token: Option<String>) -> Result<User, Error> {
    let token = token.ok_or_else(|| Error::unauthorized("login required"))?;
    let user = state
        .identity
        .authenticate(&token)
        .await
        .map_err(map_identity_error)?
        .ok_or_else(|| Error::unauthorized("invalid or expired access token"))?;
    state.users.ensure(&user).await.map_err(map_user_error)?;
    debug!(user_id = %user.id(), "authenticated request");
    Ok(user)
}

/// The caller resolved from `Authorization: Bearer <token>`.
///
/// The user is mirrored into the local user table on every request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    pub fn user(&self) -> &User {
        &self.0
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = state_of(req);
        let token = bearer_token(req);
        Box::pin(async move {
            let state = state?;
            authenticate(&state, token).await.map(Self)
        })
    }
}

/// An authenticated caller whose e-mail is on the admin allow-list.
///
/// Everyone else receives `404`, so the admin surface is not discoverable.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = state_of(req);
        let token = bearer_token(req);
        Box::pin(async move {
            let state = state?;
            let user = authenticate(&state, token).await.map_err(|error| {
                if error.code() == ErrorCode::Unauthorized {
                    Error::not_found("not found")
                } else {
                    error
                }
            })?;
            if !state.access.is_admin(user.email()) {
                warn!(user_id = %user.id(), "non-admin reached an admin route");
                return Err(Error::not_found("not found"));
            }
            Ok(Self(user))
        })
    }
}

/// A request authenticated by the shared internal secret header.
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

impl FromRequest for InternalCaller {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = state_of(req).and_then(|state| {
            let presented = req
                .headers()
                .get(INTERNAL_SECRET_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            if state.access.internal_secret_matches(presented) {
                Ok(Self)
            } else {
                Err(Error::unauthorized("invalid internal secret"))
            }
        });
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use rstest::rstest;

    #[rstest]
    #[case(Some("Bearer abc"), Some("abc"))]
    #[case(Some("Bearer   abc  "), Some("abc"))]
    #[case(Some("Bearer "), None)]
    #[case(Some("Basic abc"), None)]
    #[case(None, None)]
    fn bearer_token_parsing(#[case] header: Option<&str>, #[case] expected: Option<&str>) {
        let mut request = TestRequest::default();
        if let Some(value) = header {
            request = request.insert_header((AUTHORIZATION, value));
        }
        let req = request.to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), expected);
    }

    #[rstest]
    fn missing_state_is_an_internal_error() {
        let req = TestRequest::default().to_http_request();
        let Err(error) = state_of(&req) else {
            panic!("no state was registered");
        };
        assert_eq!(error.code(), ErrorCode::InternalError);
    }

    #[actix_web::test]
    async fn a_known_token_resolves_to_its_user() {
        let workflow = crate::test_support::Workflow::new();
        let signed_in = workflow.sign_in("token-1");
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer token-1"))
            .app_data(web::Data::new(workflow.http_state()))
            .to_http_request();

        let AuthenticatedUser(user) = AuthenticatedUser::extract(&req)
            .await
            .expect("token resolves");
        assert_eq!(user.id(), signed_in.id());
    }

    #[actix_web::test]
    async fn an_unknown_token_is_unauthorised() {
        let workflow = crate::test_support::Workflow::new();
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer nobody"))
            .app_data(web::Data::new(workflow.http_state()))
            .to_http_request();

        let error = AuthenticatedUser::extract(&req)
            .await
            .expect_err("token unknown");
        assert_eq!(error.code(), ErrorCode::Unauthorized);
    }
}
