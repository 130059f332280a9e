// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod assertion;
pub mod errors;
pub mod exchange;
pub mod issuer;
pub mod key;
pub mod token;
pub mod traits;

pub use errors::AuthError;
pub use issuer::{AssertionConfig, IssuerConfig, TokenIssuer};
pub use token::{BearerToken, FailureReason, IssuanceFailure, IssuanceResult};
