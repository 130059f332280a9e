// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::vendor::VendorError;
use sim_auth::{FailureReason, IssuanceFailure};

/// JSON body of every failed API call.
#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: None,
            reason: None,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, body: ErrorBody) -> Self {
        Self { status, body }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorBody::new(message))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorBody::new(message))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(message))
    }

    /// Relay a non-2xx vendor answer with its status and raw body.
    pub fn vendor(status: u16, body: impl Into<String>) -> Self {
        Self::relay(status, format!("API returned status {}", status), body)
    }

    /// Like [`ApiError::vendor`] with a custom message.
    pub fn relay(status: u16, message: impl Into<String>, body: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
        Self::new(
            status,
            ErrorBody {
                details: Some(body.into()),
                ..ErrorBody::new(message)
            },
        )
    }

    pub fn no_access_token() -> Self {
        Self::bad_request("No access token available. Please generate access token first.")
    }

    pub fn no_conversation() -> Self {
        Self::bad_request("No conversation available. Please create a conversation first.")
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl From<VendorError> for ApiError {
    fn from(err: VendorError) -> Self {
        error!(error = %err, "vendor call failed");
        Self::internal(err.to_string())
    }
}

impl From<IssuanceFailure> for ApiError {
    fn from(failure: IssuanceFailure) -> Self {
        let mut err = match (failure.reason, failure.status) {
            (FailureReason::VendorExchangeFailure, Some(status)) => {
                Self::vendor(status, failure.body.clone().unwrap_or_default())
            }
            _ => Self::internal(failure.message.clone()).with_details(
                failure
                    .body
                    .clone()
                    .unwrap_or_else(|| failure.message.clone()),
            ),
        };
        err.body.reason = Some(failure.reason);
        err
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_precondition_errors() {
        let err = ApiError::no_access_token();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(err.body()).unwrap(),
            json!({
                "success": false,
                "error": "No access token available. Please generate access token first."
            })
        );
    }

    #[test]
    fn test_vendor_status_relayed() {
        let err = ApiError::vendor(404, "{\"message\":\"not found\"}");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.body().error, "API returned status 404");
        assert_eq!(
            err.body().details.as_deref(),
            Some("{\"message\":\"not found\"}")
        );

        // not a valid HTTP status
        let err = ApiError::vendor(1000, "");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_issuance_failures() {
        let failure = IssuanceFailure {
            reason: FailureReason::VendorExchangeFailure,
            status: Some(401),
            body: Some("{\"error\":\"invalid\"}".to_string()),
            message: "token endpoint returned 401".to_string(),
        };
        let err = ApiError::from(failure);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            serde_json::to_value(err.body()).unwrap(),
            json!({
                "success": false,
                "error": "API returned status 401",
                "details": "{\"error\":\"invalid\"}",
                "reason": "vendor_exchange_failure"
            })
        );

        let failure = IssuanceFailure {
            reason: FailureReason::KeyNotFound,
            status: None,
            body: None,
            message: "key not found".to_string(),
        };
        let err = ApiError::from(failure);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body().reason, Some(FailureReason::KeyNotFound));
        assert_eq!(err.body().details.as_deref(), Some("key not found"));
    }
}
