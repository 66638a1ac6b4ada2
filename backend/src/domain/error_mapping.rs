//! Translation of driven-port failures into domain errors.
//!
//! Connection and transport failures become `service_unavailable`; query
//! failures become `internal`. The detailed port message is logged by the
//! caller and never shown to clients.

use super::{Error, PurchaseRejection};
use super::ports::{
    AudioStorageError, BundleRepositoryError, CustomizationRepositoryError,
    FailedJobRepositoryError, OrderRepositoryError, PaymentGatewayError, UserPersistenceError,
};

pub(crate) fn map_order_error(error: OrderRepositoryError) -> Error {
    match error {
        OrderRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("order store unavailable: {message}"))
        }
        OrderRepositoryError::Query { message } => {
            Error::internal(format!("order store error: {message}"))
        }
    }
}

pub(crate) fn map_customization_error(error: CustomizationRepositoryError) -> Error {
    match error {
        CustomizationRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("customization store unavailable: {message}"))
        }
        CustomizationRepositoryError::Query { message } => {
            Error::internal(format!("customization store error: {message}"))
        }
    }
}

pub(crate) fn map_bundle_error(error: BundleRepositoryError) -> Error {
    match error {
        BundleRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("bundle store unavailable: {message}"))
        }
        BundleRepositoryError::Query { message } => {
            Error::internal(format!("bundle store error: {message}"))
        }
    }
}

pub(crate) fn map_failed_job_error(error: FailedJobRepositoryError) -> Error {
    match error {
        FailedJobRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("failed job store unavailable: {message}"))
        }
        FailedJobRepositoryError::Query { message } => {
            Error::internal(format!("failed job store error: {message}"))
        }
    }
}

pub(crate) fn map_user_error(error: UserPersistenceError) -> Error {
    match error {
        UserPersistenceError::Connection { message } => {
            Error::service_unavailable(format!("user store unavailable: {message}"))
        }
        UserPersistenceError::Query { message } => {
            Error::internal(format!("user store error: {message}"))
        }
    }
}

pub(crate) fn map_storage_error(error: AudioStorageError) -> Error {
    match error {
        AudioStorageError::NotFound { .. } => Error::not_found("audio not found"),
        AudioStorageError::Transport { message } => {
            Error::service_unavailable(format!("audio storage unavailable: {message}"))
        }
        AudioStorageError::Rejected { status, message } => {
            Error::internal(format!("audio storage rejected request ({status}): {message}"))
        }
    }
}

pub(crate) fn map_gateway_error(error: PaymentGatewayError) -> Error {
    match error {
        PaymentGatewayError::InvalidSignature { .. } => {
            Error::invalid_request("invalid webhook signature")
        }
        PaymentGatewayError::Transport { message } => {
            Error::service_unavailable(format!("payment processor unavailable: {message}"))
        }
        other => Error::internal(other.to_string()),
    }
}

/// Ownership and existence failures read as not-found; everything else is a
/// precondition conflict.
pub(crate) fn map_purchase_rejection(rejection: PurchaseRejection) -> Error {
    match rejection {
        PurchaseRejection::CustomizationNotFound | PurchaseRejection::OriginalOrderNotFound => {
            Error::not_found(rejection.message())
        }
        PurchaseRejection::TweakUnavailable | PurchaseRejection::VariantLimitReached => {
            Error::conflict(rejection.message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(OrderRepositoryError::connection("refused"), ErrorCode::ServiceUnavailable)]
    #[case(OrderRepositoryError::query("syntax"), ErrorCode::InternalError)]
    fn order_errors(#[case] error: OrderRepositoryError, #[case] code: ErrorCode) {
        assert_eq!(map_order_error(error).code(), code);
    }

    #[rstest]
    fn signature_failures_are_client_errors() {
        let error = map_gateway_error(PaymentGatewayError::invalid_signature("stale"));
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
        assert_eq!(error.message(), "invalid webhook signature");
    }

    #[rstest]
    #[case(PurchaseRejection::CustomizationNotFound, ErrorCode::NotFound)]
    #[case(PurchaseRejection::OriginalOrderNotFound, ErrorCode::NotFound)]
    #[case(PurchaseRejection::TweakUnavailable, ErrorCode::Conflict)]
    #[case(PurchaseRejection::VariantLimitReached, ErrorCode::Conflict)]
    fn rejections(#[case] rejection: PurchaseRejection, #[case] code: ErrorCode) {
        assert_eq!(map_purchase_rejection(rejection).code(), code);
    }

    #[rstest]
    fn missing_objects_are_not_found() {
        let error = map_storage_error(AudioStorageError::not_found("a/b.mp3"));
        assert_eq!(error.code(), ErrorCode::NotFound);
    }
}
