// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Token issuance boundary.
//!
//! [`TokenIssuer`] ties together key loading, assertion signing and the
//! token exchange. Its `issue_*` methods never return errors: every
//! internal failure is reported as an [`IssuanceResult::Failure`] carrying
//! a stable reason code.

use std::time::{Duration, SystemTime};

use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assertion::{
    AssertionBuilder, DEFAULT_CLOCK_SKEW, DEFAULT_DISPLAY_NAME, DEFAULT_SUBJECT, DEFAULT_VALIDITY,
};
use crate::errors::AuthError;
use crate::exchange::{ChannelConfig, ClientCredentialsConfig, TokenExchanger};
use crate::key::KeySource;
use crate::token::IssuanceResult;

/// Settings of the customer identity assertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AssertionConfig {
    /// Key identifier, used as `kid` header and `iss` claim
    pub key_id: String,

    /// Private key used for signing
    pub key: KeySource,

    /// Subject used when the caller does not supply one
    #[serde(default = "default_subject")]
    pub subject: String,

    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Backdating applied to `iat` and `nbf`
    #[serde(
        default = "default_clock_skew",
        deserialize_with = "deserialize_duration"
    )]
    pub clock_skew: Duration,

    /// Lifetime of the assertion, counted from `iat`
    #[serde(
        default = "default_validity",
        deserialize_with = "deserialize_duration"
    )]
    pub validity: Duration,
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}

fn default_clock_skew() -> Duration {
    DEFAULT_CLOCK_SKEW
}

fn default_validity() -> Duration {
    DEFAULT_VALIDITY
}

impl AssertionConfig {
    pub fn new(key_id: impl Into<String>, key: KeySource) -> Self {
        Self {
            key_id: key_id.into(),
            key,
            subject: default_subject(),
            display_name: default_display_name(),
            clock_skew: default_clock_skew(),
            validity: default_validity(),
        }
    }
}

/// Everything needed to issue tokens for one messaging deployment.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Messaging base URL; the assertion audience is this URL without a
    /// trailing slash
    pub scrt_url: String,
    pub channel: ChannelConfig,
    pub assertion: AssertionConfig,
    pub oauth: Option<ClientCredentialsConfig>,
    /// HTTP timeout for token requests
    pub timeout: Option<Duration>,
}

pub struct TokenIssuer {
    config: IssuerConfig,
    exchanger: TokenExchanger,
}

impl TokenIssuer {
    pub fn new(config: IssuerConfig) -> Result<Self, AuthError> {
        let exchanger = TokenExchanger::new(&config.scrt_url, config.timeout)?;

        if let Some(oauth) = &config.oauth {
            url::Url::parse(&oauth.token_url).map_err(|source| AuthError::InvalidEndpoint {
                url: oauth.token_url.clone(),
                source,
            })?;
        }

        Ok(Self { config, exchanger })
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    pub fn has_client_credentials(&self) -> bool {
        self.config.oauth.is_some()
    }

    fn assertion_builder(&self, subject: Option<&str>) -> AssertionBuilder {
        let settings = &self.config.assertion;
        AssertionBuilder::new(self.exchanger.base_url(), &settings.key_id)
            .subject(subject.unwrap_or(settings.subject.as_str()))
            .display_name(&settings.display_name)
            .clock_skew(settings.clock_skew)
            .validity(settings.validity)
    }

    /// Load the signing key and sign an assertion as of `now`.
    pub async fn build_assertion(
        &self,
        subject: Option<&str>,
        now: SystemTime,
    ) -> Result<String, AuthError> {
        let key = self.config.assertion.key.load_blocking().await?;
        self.assertion_builder(subject).sign_at(&key, now)
    }

    /// Sign a fresh assertion and exchange it for an access token.
    pub async fn issue_authenticated(&self, subject: Option<&str>) -> IssuanceResult {
        let assertion = match self.build_assertion(subject, SystemTime::now()).await {
            Ok(assertion) => assertion,
            Err(e) => {
                warn!(error = %e, "could not build customer identity assertion");
                return e.into();
            }
        };

        debug!("customer identity assertion signed");
        self.exchanger
            .exchange_assertion(&self.config.channel, &assertion)
            .await
            .with_assertion(assertion)
    }

    pub async fn issue_unauthenticated(&self) -> IssuanceResult {
        self.exchanger
            .exchange_unauthenticated(&self.config.channel)
            .await
    }

    pub async fn issue_client_credentials(&self) -> IssuanceResult {
        match &self.config.oauth {
            Some(oauth) => self.exchanger.exchange_client_credentials(oauth).await,
            None => AuthError::ConfigError(
                "OAuth client credentials are not configured".to_string(),
            )
            .into(),
        }
    }
}
