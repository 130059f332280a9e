// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Bearer tokens and the outcome of an issuance attempt.

use std::fmt;

use serde::Serialize;

use crate::errors::AuthError;

/// Opaque access token returned by a token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    access_token: String,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub instance_url: Option<String>,
    pub expires_in: Option<u64>,
    pub last_event_id: Option<String>,
}

impl BearerToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: None,
            scope: None,
            instance_url: None,
            expires_in: None,
            last_event_id: None,
        }
    }

    /// The raw token value.
    pub fn secret(&self) -> &str {
        &self.access_token
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("instance_url", &self.instance_url)
            .field("expires_in", &self.expires_in)
            .field("last_event_id", &self.last_event_id)
            .finish()
    }
}

/// Stable reason codes reported for failed issuances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    KeyNotFound,
    KeyParseError,
    AssertionSigningError,
    VendorExchangeFailure,
    NetworkError,
    MalformedResponse,
    ConfigurationError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::KeyNotFound => "key_not_found",
            FailureReason::KeyParseError => "key_parse_error",
            FailureReason::AssertionSigningError => "assertion_signing_error",
            FailureReason::VendorExchangeFailure => "vendor_exchange_failure",
            FailureReason::NetworkError => "network_error",
            FailureReason::MalformedResponse => "malformed_response",
            FailureReason::ConfigurationError => "configuration_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&AuthError> for FailureReason {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::ConfigError(_) | AuthError::InvalidEndpoint { .. } => {
                FailureReason::ConfigurationError
            }
            AuthError::KeyNotFound { .. } => FailureReason::KeyNotFound,
            AuthError::KeyParse { .. } => FailureReason::KeyParseError,
            AuthError::AssertionSigning(_) => FailureReason::AssertionSigningError,
            AuthError::VendorExchangeFailure { .. } => FailureReason::VendorExchangeFailure,
            AuthError::MalformedResponse { .. } => FailureReason::MalformedResponse,
            AuthError::Network(_) => FailureReason::NetworkError,
        }
    }
}

/// Why an issuance did not produce a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceFailure {
    pub reason: FailureReason,
    /// HTTP status of the token endpoint, when it answered
    pub status: Option<u16>,
    /// Raw response body, verbatim
    pub body: Option<String>,
    /// Human readable description
    pub message: String,
}

impl From<AuthError> for IssuanceFailure {
    fn from(err: AuthError) -> Self {
        IssuanceFailure {
            reason: FailureReason::from(&err),
            status: err.status(),
            body: err.body().map(str::to_string),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for IssuanceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Outcome of an issuance attempt. Failures are values, never panics.
#[derive(Debug, Clone)]
pub enum IssuanceResult {
    Success {
        token: BearerToken,
        /// Full JSON document returned by the token endpoint
        raw_response: serde_json::Value,
        /// Signed assertion that was exchanged, for the assertion flow
        assertion: Option<String>,
    },
    Failure(IssuanceFailure),
}

impl IssuanceResult {
    pub fn is_success(&self) -> bool {
        matches!(self, IssuanceResult::Success { .. })
    }

    pub fn token(&self) -> Option<&BearerToken> {
        match self {
            IssuanceResult::Success { token, .. } => Some(token),
            IssuanceResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&IssuanceFailure> {
        match self {
            IssuanceResult::Success { .. } => None,
            IssuanceResult::Failure(failure) => Some(failure),
        }
    }

    /// Attach the exchanged assertion to a successful result.
    pub fn with_assertion(self, signed: String) -> Self {
        match self {
            IssuanceResult::Success {
                token,
                raw_response,
                ..
            } => IssuanceResult::Success {
                token,
                raw_response,
                assertion: Some(signed),
            },
            failure => failure,
        }
    }
}

impl From<AuthError> for IssuanceResult {
    fn from(err: AuthError) -> Self {
        IssuanceResult::Failure(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        let cases = [
            (
                AuthError::ConfigError("missing".to_string()),
                "configuration_error",
            ),
            (
                AuthError::KeyNotFound {
                    path: "k".to_string(),
                    details: "gone".to_string(),
                },
                "key_not_found",
            ),
            (
                AuthError::KeyParse {
                    path: "k".to_string(),
                    reason: "bad".to_string(),
                },
                "key_parse_error",
            ),
            (
                AuthError::VendorExchangeFailure {
                    status: 401,
                    body: "{}".to_string(),
                },
                "vendor_exchange_failure",
            ),
            (
                AuthError::MalformedResponse {
                    status: 200,
                    body: "{}".to_string(),
                    details: "no token".to_string(),
                },
                "malformed_response",
            ),
        ];

        for (err, code) in cases {
            assert_eq!(FailureReason::from(&err).as_str(), code);
        }
    }

    #[test]
    fn test_failure_keeps_vendor_body_verbatim() {
        let failure = IssuanceFailure::from(AuthError::VendorExchangeFailure {
            status: 401,
            body: r#"{"error":"invalid"}"#.to_string(),
        });

        assert_eq!(failure.reason, FailureReason::VendorExchangeFailure);
        assert_eq!(failure.status, Some(401));
        assert_eq!(failure.body.as_deref(), Some(r#"{"error":"invalid"}"#));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = BearerToken::new("super-secret");
        let out = format!("{:?}", token);
        assert!(!out.contains("super-secret"));
        assert_eq!(token.authorization_header(), "Bearer super-secret");
    }

    #[test]
    fn test_with_assertion_only_touches_success() {
        let success = IssuanceResult::Success {
            token: BearerToken::new("abc"),
            raw_response: serde_json::json!({"accessToken": "abc"}),
            assertion: None,
        }
        .with_assertion("signed".to_string());

        match success {
            IssuanceResult::Success { assertion, .. } => {
                assert_eq!(assertion.as_deref(), Some("signed"))
            }
            other => panic!("Unexpected result: {:?}", other),
        }

        let failure = IssuanceResult::from(AuthError::ConfigError("x".to_string()))
            .with_assertion("signed".to_string());
        assert!(!failure.is_success());
        assert_eq!(
            failure.failure().map(|f| f.reason),
            Some(FailureReason::ConfigurationError)
        );
    }
}
