// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Exchange of assertions and client credentials for bearer tokens.
//!
//! Every exchange is a single HTTP call, never retried. Results are
//! classified into [`IssuanceResult`]:
//!
//! - 2xx with an access token: success
//! - 2xx without a usable access token: `malformed_response`
//! - any other status: `vendor_exchange_failure`, with the body verbatim
//! - transport errors: `network_error`

use std::fmt;
use std::time::Duration;

use reqwest::{Client as ReqwestClient, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::AuthError;
use crate::token::{BearerToken, IssuanceResult};

pub const AUTHENTICATED_TOKEN_PATH: &str =
    "/iamessage/api/v2/authorization/authenticated/access-token";
pub const UNAUTHENTICATED_TOKEN_PATH: &str =
    "/iamessage/api/v2/authorization/unauthenticated/access-token";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client application described to the messaging channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientContext {
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default = "default_client_version")]
    pub client_version: String,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            client_version: default_client_version(),
        }
    }
}

fn default_app_name() -> String {
    "EnhancedChatSimulator".to_string()
}

fn default_client_version() -> String {
    "1.0".to_string()
}

/// Messaging channel the tokens are requested for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Organization id
    pub org_id: String,

    /// Developer name of the embedded service deployment
    pub es_developer_name: String,

    #[serde(default = "default_capabilities_version")]
    pub capabilities_version: String,

    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(default)]
    pub context: ClientContext,
}

fn default_capabilities_version() -> String {
    "1".to_string()
}

fn default_platform() -> String {
    "Web".to_string()
}

impl ChannelConfig {
    pub fn new(org_id: impl Into<String>, es_developer_name: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            es_developer_name: es_developer_name.into(),
            capabilities_version: default_capabilities_version(),
            platform: default_platform(),
            context: ClientContext::default(),
        }
    }
}

/// OAuth2 client credentials grant settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientCredentialsConfig {
    /// Token endpoint URL
    pub token_url: String,

    pub client_id: String,

    pub client_secret: String,
}

impl fmt::Debug for ClientCredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireContext<'a> {
    app_name: &'a str,
    client_version: &'a str,
}

/// Body of both messaging access-token requests.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenRequest<'a> {
    org_id: &'a str,
    es_developer_name: &'a str,
    capabilities_version: &'a str,
    platform: &'a str,
    context: WireContext<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_identity_token: Option<&'a str>,
}

impl<'a> AccessTokenRequest<'a> {
    fn new(channel: &'a ChannelConfig) -> Self {
        Self {
            org_id: &channel.org_id,
            es_developer_name: &channel.es_developer_name,
            capabilities_version: &channel.capabilities_version,
            platform: &channel.platform,
            context: WireContext {
                app_name: &channel.context.app_name,
                client_version: &channel.context.client_version,
            },
            authorization_type: None,
            customer_identity_token: None,
        }
    }

    fn with_assertion(mut self, assertion: &'a str) -> Self {
        self.authorization_type = Some("JWT");
        self.customer_identity_token = Some(assertion);
        self
    }
}

/// Performs token exchanges against the messaging base URL and, optionally,
/// an OAuth2 token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    base_url: String,
    client: ReqwestClient,
}

impl TokenExchanger {
    /// Create an exchanger for the given messaging base URL.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, AuthError> {
        validate_url(base_url)?;

        let client = ReqwestClient::builder()
            .user_agent("Enhanced Chat Simulator")
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange a signed customer identity assertion for an access token.
    pub async fn exchange_assertion(
        &self,
        channel: &ChannelConfig,
        assertion: &str,
    ) -> IssuanceResult {
        let request = AccessTokenRequest::new(channel).with_assertion(assertion);
        let url = format!("{}{}", self.base_url, AUTHENTICATED_TOKEN_PATH);

        into_result(self.post_json(&url, &request).await)
    }

    /// Request an access token for an anonymous end user.
    pub async fn exchange_unauthenticated(&self, channel: &ChannelConfig) -> IssuanceResult {
        let request = AccessTokenRequest::new(channel);
        let url = format!("{}{}", self.base_url, UNAUTHENTICATED_TOKEN_PATH);

        into_result(self.post_json(&url, &request).await)
    }

    /// Run the OAuth2 client credentials grant.
    pub async fn exchange_client_credentials(
        &self,
        config: &ClientCredentialsConfig,
    ) -> IssuanceResult {
        into_result(self.fetch_client_credentials(config).await)
    }

    async fn post_json(
        &self,
        url: &str,
        request: &AccessTokenRequest<'_>,
    ) -> Result<(BearerToken, Value), AuthError> {
        debug!(%url, org_id = %request.org_id, "requesting messaging access token");

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| log_transport_error(url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| log_transport_error(url, e))?;

        let (token, raw) = classify(status, body, messaging_token)?;
        info!(%url, status = status.as_u16(), "messaging access token issued");
        Ok((token, raw))
    }

    async fn fetch_client_credentials(
        &self,
        config: &ClientCredentialsConfig,
    ) -> Result<(BearerToken, Value), AuthError> {
        validate_url(&config.token_url)?;

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        debug!(url = %config.token_url, client_id = %config.client_id, "requesting OAuth2 token");

        let response = self
            .client
            .post(&config.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&form)
            .send()
            .await
            .map_err(|e| log_transport_error(&config.token_url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| log_transport_error(&config.token_url, e))?;

        let (token, raw) = classify(status, body, oauth_token)?;
        info!(url = %config.token_url, status = status.as_u16(), "OAuth2 token issued");
        Ok((token, raw))
    }
}

fn validate_url(url: &str) -> Result<(), AuthError> {
    Url::parse(url).map_err(|source| AuthError::InvalidEndpoint {
        url: url.to_string(),
        source,
    })?;
    Ok(())
}

fn into_result(result: Result<(BearerToken, Value), AuthError>) -> IssuanceResult {
    match result {
        Ok((token, raw_response)) => IssuanceResult::Success {
            token,
            raw_response,
            assertion: None,
        },
        Err(e) => {
            warn!(error = %e, "token exchange failed");
            e.into()
        }
    }
}

fn log_transport_error(url: &str, e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        warn!(%url, "token endpoint timed out");
    } else if e.is_connect() {
        warn!(%url, "token endpoint unreachable");
    }
    AuthError::Network(e)
}

fn classify(
    status: StatusCode,
    body: String,
    extract: fn(&Value) -> Option<BearerToken>,
) -> Result<(BearerToken, Value), AuthError> {
    if !status.is_success() {
        return Err(AuthError::VendorExchangeFailure {
            status: status.as_u16(),
            body,
        });
    }

    let raw: Value = match serde_json::from_str(&body) {
        Ok(raw) => raw,
        Err(e) => {
            return Err(AuthError::MalformedResponse {
                status: status.as_u16(),
                details: format!("response is not JSON: {}", e),
                body,
            });
        }
    };

    match extract(&raw) {
        Some(token) => Ok((token, raw)),
        None => Err(AuthError::MalformedResponse {
            status: status.as_u16(),
            details: "access token missing from response".to_string(),
            body,
        }),
    }
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Access token of the messaging endpoints, either at the top level or
/// nested under `data`.
fn messaging_token(raw: &Value) -> Option<BearerToken> {
    let holder = if raw.get("accessToken").is_some() {
        raw
    } else {
        raw.get("data")?
    };

    let mut token = BearerToken::new(non_empty_str(holder, "accessToken")?);
    token.last_event_id = match holder.get("lastEventId") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };
    Some(token)
}

fn oauth_token(raw: &Value) -> Option<BearerToken> {
    let mut token = BearerToken::new(non_empty_str(raw, "access_token")?);
    token.token_type = Some(non_empty_str(raw, "token_type").unwrap_or_else(|| "Bearer".to_string()));
    token.scope = non_empty_str(raw, "scope");
    token.instance_url = non_empty_str(raw, "instance_url");
    token.expires_in = raw.get("expires_in").and_then(Value::as_u64);
    Some(token)
}
