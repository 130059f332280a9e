// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use tracing::debug;

use crate::config::{ConfigError, ConfigLoader, ServerConfiguration, VendorConfiguration};
use crate::session::Session;
use crate::vendor::VendorClient;
use sim_auth::TokenIssuer;

/// Values the handlers echo back to the browser.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub scrt_url: String,
    pub org_id: String,
    pub channel_platform_key: String,
    pub dummy_conversation: PathBuf,
}

impl ApiSettings {
    pub fn new(vendor: &VendorConfiguration, server: &ServerConfiguration) -> Self {
        Self {
            scrt_url: vendor.scrt_url.trim_end_matches('/').to_string(),
            org_id: vendor.channel.org_id.clone(),
            channel_platform_key: vendor.channel_platform_key.clone(),
            dummy_conversation: PathBuf::from(server.dummy_conversation()),
        }
    }
}

/// Shared state of the HTTP handlers.
pub struct AppState {
    pub session: Session,
    pub issuer: TokenIssuer,
    pub vendor: VendorClient,
    pub settings: ApiSettings,
}

impl AppState {
    pub fn new(issuer: TokenIssuer, vendor: VendorClient, settings: ApiSettings) -> Self {
        Self {
            session: Session::new(),
            issuer,
            vendor,
            settings,
        }
    }

    /// Build the issuer and the vendor client from the loaded configuration.
    pub fn from_config(loader: &mut ConfigLoader) -> Result<Self, ConfigError> {
        let issuer = TokenIssuer::new(loader.issuer_config()?)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let server = loader.server()?.clone();
        let vendor_config = loader.vendor()?;
        let vendor =
            VendorClient::new(vendor_config).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let settings = ApiSettings::new(vendor_config, &server);

        debug!(
            scrt_url = %settings.scrt_url,
            oauth = issuer.has_client_credentials(),
            "application state ready"
        );
        Ok(Self::new(issuer, vendor, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/config.yaml");
        let mut loader = ConfigLoader::new(path).unwrap();

        let state = AppState::from_config(&mut loader).unwrap();
        assert_eq!(
            state.settings.scrt_url,
            "https://example.my.salesforce-scrt.com"
        );
        assert_eq!(state.settings.org_id, "00D000000000001");
        assert_eq!(state.settings.channel_platform_key, "web-simulator");
        assert_eq!(
            state.settings.dummy_conversation,
            PathBuf::from("testdata/dummy_conversation.json")
        );
        assert!(state.issuer.has_client_credentials());
        assert!(!state.session.status().has_access_token);
    }
}
