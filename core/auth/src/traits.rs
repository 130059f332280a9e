// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Common traits for assertion signing.

use jsonwebtoken_aws_lc::Algorithm;
use serde::Serialize;

use crate::errors::AuthError;

/// Trait for signing claim sets into compact JWS strings.
pub trait Signer {
    /// Algorithm placed in the token header.
    fn algorithm(&self) -> Algorithm;

    /// Signs the claims and returns the compact token.
    ///
    /// `key_id` is written to the `kid` header so the verifier can select
    /// the matching public key.
    fn sign<Claims>(&self, key_id: &str, claims: &Claims) -> Result<String, AuthError>
    where
        Claims: Serialize;
}
