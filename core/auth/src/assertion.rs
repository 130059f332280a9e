// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Customer identity assertion construction.
//!
//! The assertion is a short lived RS256 JWT presented to the messaging
//! authorization endpoint. `iat` and `nbf` are backdated by a configurable
//! clock-skew buffer because the audience rejects tokens that look issued in
//! its future. `exp` is anchored to the backdated `iat`, so `exp - iat` is
//! always the validity window.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AuthError;
use crate::traits::Signer;

pub const DEFAULT_SUBJECT: &str = "user123";
pub const DEFAULT_DISPLAY_NAME: &str = "Test User";
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(300);

/// Claim set of a customer identity assertion.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AssertionClaims {
    /// Subject (end user identifier)
    pub sub: String,

    /// Audience (messaging base URL, not the organization id)
    pub aud: String,

    /// Issuer (the key identifier registered with the vendor)
    pub iss: String,

    /// Issued at, backdated by the clock-skew buffer
    pub iat: u64,

    /// Not before, always equal to `iat`
    pub nbf: u64,

    /// Expiration, `iat` plus the validity window
    pub exp: u64,

    /// Display name of the end user
    pub name: String,
}

/// Builds and signs customer identity assertions.
#[derive(Debug, Clone)]
pub struct AssertionBuilder {
    audience: String,
    key_id: String,
    subject: String,
    display_name: String,
    clock_skew: Duration,
    validity: Duration,
}

impl AssertionBuilder {
    /// Create a builder for the given audience and key identifier with the
    /// default subject, display name, skew buffer and validity.
    pub fn new(audience: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            key_id: key_id.into(),
            subject: DEFAULT_SUBJECT.to_string(),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            clock_skew: DEFAULT_CLOCK_SKEW,
            validity: DEFAULT_VALIDITY,
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    pub fn validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Claim set for an assertion signed at `now`.
    pub fn claims_at(&self, now: SystemTime) -> AssertionClaims {
        let now = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_secs();

        let issued_at = now.saturating_sub(self.clock_skew.as_secs());

        AssertionClaims {
            sub: self.subject.clone(),
            aud: self.audience.clone(),
            iss: self.key_id.clone(),
            iat: issued_at,
            nbf: issued_at,
            exp: issued_at + self.validity.as_secs(),
            name: self.display_name.clone(),
        }
    }

    /// Sign an assertion as of `now` and return the compact token.
    pub fn sign_at<S: Signer>(&self, signer: &S, now: SystemTime) -> Result<String, AuthError> {
        let claims = self.claims_at(now);
        debug!(
            sub = %claims.sub,
            aud = %claims.aud,
            iss = %claims.iss,
            iat = claims.iat,
            exp = claims.exp,
            "signing customer identity assertion"
        );

        signer.sign(&self.key_id, &claims)
    }

    /// Sign an assertion as of the current wall clock.
    pub fn sign<S: Signer>(&self, signer: &S) -> Result<String, AuthError> {
        self.sign_at(signer, SystemTime::now())
    }
}
