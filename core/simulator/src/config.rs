// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0
//
// ConfigLoader reads the configuration file once, resolves `${env:VAR}`
// references, and exposes lazy, cached accessors per section. Tracing and
// runtime fall back to defaults; vendor and assertion are required and
// validated when first requested.

use std::collections::HashSet;
use std::time::Duration;

use duration_str::deserialize_duration;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Value, from_str};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::runtime::RuntimeConfiguration;
use sim_auth::exchange::{ChannelConfig, ClientCredentialsConfig};
use sim_auth::{AssertionConfig, IssuerConfig};
use sim_tracing::TracingConfiguration;

#[derive(Error, Debug)]
pub enum ConfigError {
    // File / I/O
    #[error("not found: {0}")]
    NotFound(String),

    // Parsing / structural validity
    #[error("invalid configuration - impossible to parse yaml")]
    InvalidYaml,
    #[error("invalid configuration - key {0} not valid")]
    InvalidKey(String),
    #[error("invalid configuration - section {0} is missing")]
    MissingSection(String),
    #[error("invalid configuration - section {section}: {details}")]
    InvalidSection { section: String, details: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),

    // Environment substitution
    #[error("invalid configuration - environment variable {0} is not set")]
    MissingEnv(String),
}

lazy_static! {
    static ref CONFIG_KEYS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("tracing");
        s.insert("runtime");
        s.insert("server");
        s.insert("vendor");
        s.insert("assertion");
        s.insert("oauth");
        s
    };
    static ref ENV_REFERENCE: Regex =
        Regex::new(r"\$\{env:([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env reference pattern");
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfiguration {
    /// Address the HTTP API listens on
    #[serde(default = "default_bind_address")]
    bind_address: String,

    /// JSON file served by the dummy conversation endpoint
    #[serde(default = "default_dummy_conversation")]
    dummy_conversation: String,
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            dummy_conversation: default_dummy_conversation(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:5001".to_string()
}

fn default_dummy_conversation() -> String {
    "dummy_im3_network_conversation.json".to_string()
}

impl ServerConfiguration {
    pub fn with_bind_address(self, bind_address: &str) -> Self {
        Self {
            bind_address: bind_address.to_string(),
            ..self
        }
    }

    pub fn with_dummy_conversation(self, dummy_conversation: &str) -> Self {
        Self {
            dummy_conversation: dummy_conversation.to_string(),
            ..self
        }
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn dummy_conversation(&self) -> &str {
        &self.dummy_conversation
    }
}

/// Messaging deployment the simulator talks to.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct VendorConfiguration {
    /// Messaging base URL
    pub scrt_url: String,

    #[serde(flatten)]
    pub channel: ChannelConfig,

    /// `AuthorizationContext` header of the interaction service calls
    #[serde(default = "default_authorization_context")]
    pub authorization_context: String,

    /// Platform key advertised in the SSE configuration
    #[serde(default = "default_channel_platform_key")]
    pub channel_platform_key: String,

    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
}

fn default_authorization_context() -> String {
    "Infobip_Chatbot".to_string()
}

fn default_channel_platform_key() -> String {
    "web-simulator".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl VendorConfiguration {
    pub fn new(scrt_url: &str, channel: ChannelConfig) -> Self {
        Self {
            scrt_url: scrt_url.to_string(),
            channel,
            authorization_context: default_authorization_context(),
            channel_platform_key: default_channel_platform_key(),
            request_timeout: default_request_timeout(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        Url::parse(&self.scrt_url).map_err(|e| format!("scrt_url {}: {}", self.scrt_url, e))?;
        if self.channel.org_id.is_empty() {
            return Err("org_id must not be empty".to_string());
        }
        if self.channel.es_developer_name.is_empty() {
            return Err("es_developer_name must not be empty".to_string());
        }
        Ok(())
    }
}

/// Replace every `${env:VAR}` reference in string scalars using `lookup`.
pub fn resolve_env<F>(value: &mut Value, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(s) => {
            if !ENV_REFERENCE.is_match(s) {
                return Ok(());
            }

            let mut missing = None;
            let resolved = ENV_REFERENCE.replace_all(s, |caps: &regex::Captures| {
                let name = &caps[1];
                lookup(name).unwrap_or_else(|| {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                })
            });

            if let Some(name) = missing {
                return Err(ConfigError::MissingEnv(name));
            }
            *s = resolved.into_owned();
        }
        Value::Sequence(items) => {
            for item in items {
                resolve_env(item, lookup)?;
            }
        }
        Value::Mapping(mapping) => {
            for (_, item) in mapping.iter_mut() {
                resolve_env(item, lookup)?;
            }
        }
        Value::Tagged(tagged) => resolve_env(&mut tagged.value, lookup)?,
        _ => {}
    }
    Ok(())
}

pub struct ConfigLoader {
    root: Value,
    tracing: Option<TracingConfiguration>,
    runtime: Option<RuntimeConfiguration>,
    server: Option<ServerConfiguration>,
    vendor: Option<VendorConfiguration>,
    assertion: Option<AssertionConfig>,
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let root_keys = self
            .root
            .as_mapping()
            .map(|m| {
                m.keys()
                    .filter_map(|k| k.as_str())
                    .map(|s| s.to_string())
                    .collect::<Vec<String>>()
            })
            .unwrap_or_default();

        f.debug_struct("ConfigLoader")
            .field("root_keys", &root_keys)
            .field("vendor_loaded", &self.vendor.is_some())
            .field("assertion_loaded", &self.assertion.is_some())
            .finish()
    }
}

impl ConfigLoader {
    pub fn new(file_path: &str) -> Result<Self, ConfigError> {
        let config_str =
            std::fs::read_to_string(file_path).map_err(|e| ConfigError::NotFound(e.to_string()))?;
        Self::from_yaml(&config_str, |name| std::env::var(name).ok())
    }

    /// Parse a configuration document, resolving env references with `lookup`.
    pub fn from_yaml<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut root: Value = from_str(content).map_err(|_| ConfigError::InvalidYaml)?;

        // an empty document is an empty configuration
        if root.is_null() {
            root = Value::Mapping(Default::default());
        }

        let mapping = root.as_mapping().ok_or(ConfigError::InvalidYaml)?;
        for key in mapping.keys() {
            let k = key.as_str().ok_or(ConfigError::InvalidYaml)?;
            if !CONFIG_KEYS.contains(k) {
                return Err(ConfigError::InvalidKey(k.to_string()));
            }
        }

        resolve_env(&mut root, &lookup)?;

        Ok(Self {
            root,
            tracing: None,
            runtime: None,
            server: None,
            vendor: None,
            assertion: None,
        })
    }

    fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.root.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_yaml::from_value(v.clone()).map(Some).map_err(|e| {
                ConfigError::InvalidSection {
                    section: key.to_string(),
                    details: e.to_string(),
                }
            }),
        }
    }

    fn section_or_default<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.section(key)
            .unwrap_or_else(|e| {
                warn!(error = %e, "invalid {} config, falling back to default", key);
                None
            })
            .unwrap_or_default()
    }

    pub fn tracing(&mut self) -> &TracingConfiguration {
        let cfg = match self.tracing.take() {
            Some(cfg) => cfg,
            None => {
                let cfg: TracingConfiguration = self.section_or_default("tracing");
                debug!(?cfg, "Tracing configuration loaded");
                cfg
            }
        };
        self.tracing.insert(cfg)
    }

    pub fn runtime(&mut self) -> &RuntimeConfiguration {
        let cfg = match self.runtime.take() {
            Some(cfg) => cfg,
            None => {
                let cfg: RuntimeConfiguration = self.section_or_default("runtime");
                debug!(?cfg, "Runtime configuration loaded");
                cfg
            }
        };
        self.runtime.insert(cfg)
    }

    pub fn server(&mut self) -> Result<&ServerConfiguration, ConfigError> {
        let cfg = match self.server.take() {
            Some(cfg) => cfg,
            None => self.section("server")?.unwrap_or_default(),
        };
        Ok(self.server.insert(cfg))
    }

    pub fn vendor(&mut self) -> Result<&VendorConfiguration, ConfigError> {
        let cfg = match self.vendor.take() {
            Some(cfg) => cfg,
            None => {
                let cfg: VendorConfiguration = self
                    .section("vendor")?
                    .ok_or_else(|| ConfigError::MissingSection("vendor".to_string()))?;
                cfg.validate().map_err(|details| ConfigError::InvalidSection {
                    section: "vendor".to_string(),
                    details,
                })?;
                debug!(scrt_url = %cfg.scrt_url, org_id = %cfg.channel.org_id, "Vendor configuration loaded");
                cfg
            }
        };
        Ok(self.vendor.insert(cfg))
    }

    pub fn assertion(&mut self) -> Result<&AssertionConfig, ConfigError> {
        let cfg = match self.assertion.take() {
            Some(cfg) => cfg,
            None => {
                let cfg: AssertionConfig = self
                    .section("assertion")?
                    .ok_or_else(|| ConfigError::MissingSection("assertion".to_string()))?;
                if cfg.key_id.is_empty() {
                    return Err(ConfigError::InvalidSection {
                        section: "assertion".to_string(),
                        details: "key_id must not be empty".to_string(),
                    });
                }
                debug!(key_id = %cfg.key_id, key_path = %cfg.key.path, "Assertion configuration loaded");
                cfg
            }
        };
        Ok(self.assertion.insert(cfg))
    }

    /// OAuth client credentials, absent when the section is not configured.
    pub fn oauth(&self) -> Result<Option<ClientCredentialsConfig>, ConfigError> {
        self.section("oauth")
    }

    /// Everything the token issuer needs, assembled from the vendor,
    /// assertion and oauth sections.
    pub fn issuer_config(&mut self) -> Result<IssuerConfig, ConfigError> {
        let oauth = self.oauth()?;
        let assertion = self.assertion()?.clone();
        let vendor = self.vendor()?;

        Ok(IssuerConfig {
            scrt_url: vendor.scrt_url.clone(),
            channel: vendor.channel.clone(),
            assertion,
            oauth,
            timeout: Some(vendor.request_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_auth::key::KeyFormat;
    use std::collections::HashMap;
    use tracing_test::traced_test;

    fn testdata_path() -> String {
        concat!(env!("CARGO_MANIFEST_DIR"), "/testdata").to_string()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    #[traced_test]
    fn test_full_config() {
        let path = format!("{}/config.yaml", testdata_path());
        let mut loader = ConfigLoader::new(&path).expect("loader init should succeed");

        assert_eq!(loader.tracing().log_level(), "debug");
        assert_eq!(loader.runtime().drain_timeout(), Duration::from_secs(5));
        assert_eq!(loader.server().unwrap().bind_address(), "127.0.0.1:5001");

        let vendor = loader.vendor().unwrap();
        assert_eq!(vendor.scrt_url, "https://example.my.salesforce-scrt.com");
        assert_eq!(vendor.channel.org_id, "00D000000000001");
        assert_eq!(vendor.channel.es_developer_name, "Simulator_Deployment");
        assert_eq!(vendor.channel.platform, "Web");
        assert_eq!(vendor.authorization_context, "Infobip_Chatbot");
        assert_eq!(vendor.request_timeout, Duration::from_secs(10));

        let assertion = loader.assertion().unwrap();
        assert_eq!(assertion.key_id, "kid123");
        assert_eq!(assertion.key.format, KeyFormat::Pem);
        assert_eq!(assertion.clock_skew, Duration::from_secs(60));

        let issuer = loader.issuer_config().unwrap();
        assert_eq!(issuer.scrt_url, "https://example.my.salesforce-scrt.com");
        assert_eq!(issuer.timeout, Some(Duration::from_secs(10)));
        let oauth = issuer.oauth.expect("oauth configured");
        assert_eq!(oauth.client_id, "simulator-client");
    }

    #[test]
    fn test_minimal_config_defaults() {
        let yaml = r#"
vendor:
  scrt_url: https://scrt.example.test
  org_id: org
  es_developer_name: dep
assertion:
  key_id: kid123
  key:
    path: keys/private.json
"#;
        let mut loader = ConfigLoader::from_yaml(yaml, no_env).unwrap();

        assert_eq!(loader.tracing().log_level(), "info");
        assert_eq!(loader.server().unwrap(), &ServerConfiguration::default());
        assert_eq!(loader.vendor().unwrap().channel_platform_key, "web-simulator");
        assert!(loader.oauth().unwrap().is_none());
        assert!(loader.issuer_config().unwrap().oauth.is_none());
    }

    #[test]
    fn test_unknown_top_level_key() {
        let err = ConfigLoader::from_yaml("services: {}", no_env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKey(k) if k == "services"));
    }

    #[test]
    fn test_invalid_yaml() {
        let path = format!("{}/config-invalid-yaml.yaml", testdata_path());
        let err = ConfigLoader::new(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidYaml));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new("/nonexistent/simulator.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_missing_required_sections() {
        let mut loader = ConfigLoader::from_yaml("", no_env).unwrap();
        assert!(matches!(
            loader.vendor(),
            Err(ConfigError::MissingSection(s)) if s == "vendor"
        ));
        assert!(matches!(
            loader.assertion(),
            Err(ConfigError::MissingSection(s)) if s == "assertion"
        ));
    }

    #[test]
    fn test_invalid_vendor_url() {
        let yaml = "vendor: {scrt_url: not-a-url, org_id: org, es_developer_name: dep}";
        let mut loader = ConfigLoader::from_yaml(yaml, no_env).unwrap();
        assert!(matches!(
            loader.vendor(),
            Err(ConfigError::InvalidSection { section, .. }) if section == "vendor"
        ));
    }

    #[test]
    #[traced_test]
    fn test_invalid_tracing_falls_back_to_default() {
        let mut loader = ConfigLoader::from_yaml("tracing: {log_level: [1, 2]}", no_env).unwrap();
        assert_eq!(loader.tracing(), &TracingConfiguration::default());
        assert!(logs_contain("falling back to default"));
    }

    #[test]
    fn test_env_substitution() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SCRT_URL", "https://env.example.test"),
            ("OAUTH_SECRET", "s3cr3t"),
        ]);
        let yaml = r#"
vendor:
  scrt_url: ${env:SCRT_URL}
  org_id: org
  es_developer_name: dep
oauth:
  token_url: ${env:SCRT_URL}/services/oauth2/token
  client_id: client
  client_secret: ${env:OAUTH_SECRET}
"#;
        let mut loader =
            ConfigLoader::from_yaml(yaml, |name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(loader.vendor().unwrap().scrt_url, "https://env.example.test");
        let oauth = loader.oauth().unwrap().unwrap();
        assert_eq!(oauth.token_url, "https://env.example.test/services/oauth2/token");
        assert_eq!(oauth.client_secret, "s3cr3t");
    }

    #[test]
    fn test_env_substitution_missing_variable() {
        let err = ConfigLoader::from_yaml("oauth: {client_secret: '${env:NOT_SET}'}", no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(name) if name == "NOT_SET"));
    }

    #[test]
    fn test_resolve_env_leaves_plain_values() {
        let mut value: Value = from_str("a: [1, plain, '$notenv']").unwrap();
        let before = value.clone();
        resolve_env(&mut value, &no_env).unwrap();
        assert_eq!(value, before);
    }
}
