//! Shared validation helpers for inbound HTTP adapters.
//!
//! Every failure is an `invalid_request` error whose details name the
//! offending field so clients can highlight it.

use std::str::FromStr;

use serde_json::json;

use crate::domain::{CustomizationValidationError, Error, TweakAmendment};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    MissingField,
    InvalidUuid,
    InvalidValue,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingField => "missing_field",
            ErrorCode::InvalidUuid => "invalid_uuid",
            ErrorCode::InvalidValue => "invalid_value",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(&self) -> &'static str {
        self.0
    }
}

/// Builder for validation errors with field context.
struct ValidationError {
    field: &'static str,
    message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    fn with_code(self, code: ErrorCode) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "code": code.as_str(),
        }))
    }

    fn with_value(self, code: ErrorCode, value: impl Into<String>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }
}

pub(crate) fn missing_field_error(field: FieldName) -> Error {
    let field = field.as_str();
    ValidationError::new(field, format!("missing required field: {field}"))
        .with_code(ErrorCode::MissingField)
}

pub(crate) fn invalid_uuid_error(field: FieldName, value: &str) -> Error {
    let field = field.as_str();
    ValidationError::new(field, format!("{field} must be a valid UUID"))
        .with_value(ErrorCode::InvalidUuid, value)
}

/// Parse a typed identifier from a path segment or body field.
pub(crate) fn parse_id<T>(value: &str, field: FieldName) -> Result<T, Error>
where
    T: FromStr<Err = uuid::Error>,
{
    value.parse().map_err(|_| invalid_uuid_error(field, value))
}

/// Parse an identifier that the request may omit.
pub(crate) fn require_id<T>(value: Option<&str>, field: FieldName) -> Result<T, Error>
where
    T: FromStr<Err = uuid::Error>,
{
    match value.map(str::trim) {
        None | Some("") => Err(missing_field_error(field)),
        Some(raw) => parse_id(raw, field),
    }
}

/// Translate a brief or amendment validation failure.
pub(crate) fn customization_error(error: CustomizationValidationError) -> Error {
    let field = error.field();
    ValidationError::new(field, error.to_string()).with_code(ErrorCode::InvalidValue)
}

/// Validate the free-text fields of a tweak request.
pub(crate) fn parse_amendment(
    special_memories: Option<String>,
    things_to_avoid: Option<String>,
    pronunciation: Option<String>,
) -> Result<TweakAmendment, Error> {
    TweakAmendment::new(special_memories, things_to_avoid, pronunciation)
        .map_err(customization_error)
}
