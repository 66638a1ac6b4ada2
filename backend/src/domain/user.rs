//! Authenticated user handle supplied by the identity provider.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::UserId;

/// Validation errors returned by [`User::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    EmptyEmail,
    MalformedEmail,
}

impl fmt::Display for UserValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyEmail => f.write_str("user email must not be empty"),
            Self::MalformedEmail => f.write_str("user email must contain a single '@'"),
        }
    }
}

impl std::error::Error for UserValidationError {}

/// A user known to the identity provider.
///
/// The e-mail is normalised to lowercase so it can be compared against the
/// admin allow-list and used as the checkout customer address.
///
/// # Examples
/// ```
/// use songsmith::domain::{User, UserId};
///
/// let user = User::new(UserId::random(), " Ada@Example.com ").expect("valid email");
/// assert_eq!(user.email(), "ada@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    email: String,
}

impl User {
    /// Validate and construct a user.
    pub fn new(id: UserId, email: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let email = email.as_ref().trim().to_lowercase();
        if email.is_empty() {
            return Err(UserValidationError::EmptyEmail);
        }
        let mut parts = email.split('@');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty()
        );
        if !well_formed {
            return Err(UserValidationError::MalformedEmail);
        }
        Ok(Self { id, email })
    }

    /// Stable identifier.
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Normalised e-mail address.
    pub fn email(&self) -> &str {
        &self.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", UserValidationError::EmptyEmail)]
    #[case("no-at-sign", UserValidationError::MalformedEmail)]
    #[case("a@b@c", UserValidationError::MalformedEmail)]
    #[case("@example.com", UserValidationError::MalformedEmail)]
    fn rejects_malformed_emails(#[case] email: &str, #[case] expected: UserValidationError) {
        assert_eq!(User::new(UserId::random(), email), Err(expected));
    }
}
