//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::{SagaError, SagaFailure};
use serde::Serialize;

use crate::aggregator::AdapterError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Unknown or expired session token.
    Unauthorized(String),
    /// A saga failed; the originating step error decides the response.
    Saga(SagaFailure),
    /// A collaborator call outside a saga failed.
    Service(SagaError),
    /// An aggregator adapter failed.
    Adapter(AdapterError),
    /// Internal server error.
    Internal(String),
}

/// Error body of every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "ERR_BAD_REQUEST", msg.clone()),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "ERR_INVALID_TOKEN", msg.clone())
            }
            ApiError::Saga(failure) => {
                let (status, code) = saga_error_parts(&failure.error);
                (status, code, failure.error.to_string())
            }
            ApiError::Service(err) => {
                let (status, code) = saga_error_parts(err);
                (status, code, err.to_string())
            }
            ApiError::Adapter(err) => {
                let (status, code) = match err {
                    AdapterError::UnknownAggregator(_) => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND"),
                    AdapterError::InvalidGrant(_) => (StatusCode::BAD_REQUEST, "ERR_BAD_REQUEST"),
                    AdapterError::Upstream(_) => (StatusCode::BAD_GATEWAY, "ERR_AGGREGATOR"),
                };
                (status, code, err.to_string())
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ERR_INTERNAL", msg.clone())
            }
        }
    }
}

fn saga_error_parts(err: &SagaError) -> (StatusCode, &'static str) {
    match err {
        SagaError::NotFound { .. } => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND"),
        SagaError::Validation(_) => (StatusCode::BAD_REQUEST, "ERR_VALIDATION"),
        SagaError::InsufficientBalance { .. } => {
            (StatusCode::PAYMENT_REQUIRED, "ERR_INSUFFICIENT_FUNDS")
        }
        SagaError::BetLimitExceeded { .. } => (StatusCode::FORBIDDEN, "ERR_BET_LIMIT"),
        SagaError::IllegalState(_) => (StatusCode::CONFLICT, "ERR_ILLEGAL_STATE"),
        SagaError::DuplicateEntity(_) => (StatusCode::CONFLICT, "ERR_DUPLICATE"),
        SagaError::ExternalService(_) => (StatusCode::SERVICE_UNAVAILABLE, "ERR_UNAVAILABLE"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Saga(failure) if failure.requires_reconciliation() => {
                tracing::error!(
                    saga = failure.saga,
                    step = failure.step,
                    error = %failure.error,
                    "saga requires manual reconciliation"
                );
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
            }
            _ => {}
        }

        let (status, code, message) = self.parts();
        let body = ErrorBody {
            status: status.as_u16(),
            code,
            message,
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<SagaFailure> for ApiError {
    fn from(failure: SagaFailure) -> Self {
        ApiError::Saga(failure)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Service(err)
    }
}

impl From<AdapterError> for ApiError {
    fn from(err: AdapterError) -> Self {
        ApiError::Adapter(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;
    use saga::SagaState;

    fn failure(error: SagaError) -> ApiError {
        ApiError::Saga(SagaFailure {
            saga: "place_spin",
            step: "validate_balance",
            error,
            state: SagaState::Compensated,
            compensation_failures: Vec::new(),
        })
    }

    #[test]
    fn test_insufficient_funds_mapping() {
        let (status, code, _) = failure(SagaError::InsufficientBalance {
            requested: Money::from_minor(500),
            available: Money::from_minor(100),
        })
        .parts();
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(code, "ERR_INSUFFICIENT_FUNDS");
    }

    #[test]
    fn test_transient_failure_maps_to_unavailable() {
        let (status, code, message) =
            failure(SagaError::ExternalService("wallet down".into())).parts();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "ERR_UNAVAILABLE");
        assert!(message.contains("wallet down"));
    }

    #[test]
    fn test_not_found_mapping() {
        let (status, code, _) = ApiError::from(SagaError::not_found("round", "r1")).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "ERR_NOT_FOUND");
    }
}
