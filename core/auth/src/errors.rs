// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    // Configuration / generic
    #[error("config error: {0}")]
    ConfigError(String),
    #[error("invalid endpoint URL {url}: {source}")]
    InvalidEndpoint {
        url: String,
        source: url::ParseError,
    },

    // Key material
    #[error("key file not found at {path}: {details}")]
    KeyNotFound { path: String, details: String },
    #[error("failed to parse key file {path}: {reason}")]
    KeyParse { path: String, reason: String },

    // Signing
    #[error("assertion signing error: {0}")]
    AssertionSigning(#[from] jsonwebtoken_aws_lc::errors::Error),

    // Token endpoint
    #[error("token endpoint error: status {status}, body: {body}")]
    VendorExchangeFailure { status: u16, body: String },
    #[error("token endpoint returned status {status} without a usable access token: {details}")]
    MalformedResponse {
        status: u16,
        body: String,
        details: String,
    },

    // HTTP / networking
    #[error("HTTP request error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    /// HTTP status reported by the token endpoint, if the error came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::VendorExchangeFailure { status, .. }
            | AuthError::MalformedResponse { status, .. } => Some(*status),
            AuthError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Raw response body returned by the token endpoint, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            AuthError::VendorExchangeFailure { body, .. }
            | AuthError::MalformedResponse { body, .. } => Some(body),
            _ => None,
        }
    }
}
