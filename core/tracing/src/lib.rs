// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Error, Debug)]
pub enum TracingError {
    #[error("invalid log filter {filter}: {details}")]
    InvalidFilter { filter: String, details: String },
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TracingConfiguration {
    #[serde(default = "default_log_level")]
    log_level: String,

    #[serde(default = "default_display_thread_names")]
    display_thread_names: bool,

    #[serde(default = "default_display_thread_ids")]
    display_thread_ids: bool,

    /// Extra per-target directives, e.g. `sim_auth=debug,hyper=warn`
    #[serde(default = "default_filter")]
    filter: String,
}

impl Default for TracingConfiguration {
    fn default() -> Self {
        TracingConfiguration {
            log_level: default_log_level(),
            display_thread_names: default_display_thread_names(),
            display_thread_ids: default_display_thread_ids(),
            filter: default_filter(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_display_thread_names() -> bool {
    true
}

fn default_display_thread_ids() -> bool {
    false
}

fn default_filter() -> String {
    String::new()
}

// unknown levels fall back to info
fn resolve_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

impl TracingConfiguration {
    pub fn with_log_level(self, log_level: String) -> Self {
        TracingConfiguration { log_level, ..self }
    }

    pub fn with_display_thread_names(self, display_thread_names: bool) -> Self {
        TracingConfiguration {
            display_thread_names,
            ..self
        }
    }

    pub fn with_display_thread_ids(self, display_thread_ids: bool) -> Self {
        TracingConfiguration {
            display_thread_ids,
            ..self
        }
    }

    pub fn with_filter(self, filter: String) -> Self {
        TracingConfiguration { filter, ..self }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn display_thread_names(&self) -> bool {
        self.display_thread_names
    }

    pub fn display_thread_ids(&self) -> bool {
        self.display_thread_ids
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Filter built from the log level plus the extra directives.
    pub fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        let level = LevelFilter::from_level(resolve_level(&self.log_level));

        EnvFilter::builder()
            .with_default_directive(level.into())
            .parse(&self.filter)
            .map_err(|e| TracingError::InvalidFilter {
                filter: self.filter.clone(),
                details: e.to_string(),
            })
    }

    /// Set up a subscriber that logs to stdout
    pub fn setup_tracing_subscriber(&self) -> Result<(), TracingError> {
        let filter = self.env_filter()?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(self.display_thread_names)
            .with_thread_ids(self.display_thread_ids)
            .try_init()
            .map_err(|e| TracingError::Init(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tracing_configuration() {
        let config = TracingConfiguration::default();
        assert_eq!(config.log_level(), "info");
        assert!(config.display_thread_names());
        assert!(!config.display_thread_ids());
        assert_eq!(config.filter(), "");
    }

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level("trace"), Level::TRACE);
        assert_eq!(resolve_level("DEBUG"), Level::DEBUG);
        assert_eq!(resolve_level("info"), Level::INFO);
        assert_eq!(resolve_level("warn"), Level::WARN);
        assert_eq!(resolve_level("error"), Level::ERROR);
        assert_eq!(resolve_level("invalid"), Level::INFO);
    }

    #[test]
    fn test_env_filter() {
        let config = TracingConfiguration::default()
            .with_log_level("warn".to_string())
            .with_filter("sim_auth=debug,hyper=error".to_string());
        let filter = config.env_filter().unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let broken = TracingConfiguration::default().with_filter("sim_auth=loud".to_string());
        assert!(matches!(
            broken.env_filter(),
            Err(TracingError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_deserialize_partial_configuration() {
        let config: TracingConfiguration =
            serde_yaml::from_str("log_level: debug\ndisplay_thread_ids: true").unwrap();
        assert_eq!(config.log_level(), "debug");
        assert!(config.display_thread_ids());
        assert!(config.display_thread_names());

        assert!(serde_yaml::from_str::<TracingConfiguration>("colour: true").is_err());
    }
}
