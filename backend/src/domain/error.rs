//! The error every driving port returns.
//!
//! Services speak in [`ErrorCode`]s, never in status codes. Client faults
//! (bad input, no session, not the owner, a precondition such as a locked
//! tweak) keep their message so the customer can act on it. Server faults
//! are logged in full by the HTTP adapter and replaced with a generic
//! message before leaving the process.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TraceId;

/// Failure category, serialised in snake_case as the `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    /// No session, an expired token, or a wrong internal secret.
    Unauthorized,
    Forbidden,
    /// Missing, or owned by somebody else. The two are never told apart.
    NotFound,
    /// A state precondition failed: variant limit reached, tweak still
    /// locked, bundle credits exhausted.
    Conflict,
    /// A database or provider could not be reached.
    ServiceUnavailable,
    InternalError,
}

impl ErrorCode {
    /// Whether the message may describe server internals and must be
    /// withheld from clients.
    ///
    /// ```
    /// use songsmith::domain::ErrorCode;
    ///
    /// assert!(ErrorCode::ServiceUnavailable.is_server_fault());
    /// assert!(!ErrorCode::Conflict.is_server_fault());
    /// ```
    #[must_use]
    pub fn is_server_fault(self) -> bool {
        matches!(self, Self::ServiceUnavailable | Self::InternalError)
    }
}

/// Error body returned by driving ports and rendered as the JSON envelope
/// `{code, message, traceId?, details?}`.
///
/// The [`TraceId`] in scope when the error is built is captured, so a
/// service deep inside a request still produces a correlatable error.
///
/// # Examples
/// ```
/// use songsmith::domain::{Error, ErrorCode};
///
/// let err = Error::conflict("tweak is not unlocked yet");
/// assert_eq!(err.code(), ErrorCode::Conflict);
/// assert_eq!(err.message(), "tweak is not unlocked yet");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            trace_id: TraceId::current().map(|id| id.to_string()),
            details: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Structured context, such as the offending field of a brief.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    #[must_use]
    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    /// ```
    /// use songsmith::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::invalid_request("too many moods").with_details(json!({ "field": "moods" }));
    /// assert_eq!(err.details().and_then(|d| d.get("field")), Some(&json!("moods")));
    /// ```
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The same error as a client may see it: server faults lose their
    /// message and details but keep the code and trace identifier.
    #[must_use]
    pub fn redacted(&self) -> Self {
        if !self.code.is_server_fault() {
            return self.clone();
        }
        let message = match self.code {
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            _ => "Internal server error",
        };
        Self {
            code: self.code,
            message: message.to_owned(),
            trace_id: self.trace_id.clone(),
            details: None,
        }
    }
}

macro_rules! code_constructors {
    ($($name:ident => $code:ident),* $(,)?) => {
        impl Error {
            $(
                #[doc = concat!("An [`ErrorCode::", stringify!($code), "`] error.")]
                pub fn $name(message: impl Into<String>) -> Self {
                    Self::new(ErrorCode::$code, message)
                }
            )*
        }
    };
}

code_constructors! {
    invalid_request => InvalidRequest,
    unauthorized => Unauthorized,
    forbidden => Forbidden,
    not_found => NotFound,
    conflict => Conflict,
    service_unavailable => ServiceUnavailable,
    internal => InternalError,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests;
