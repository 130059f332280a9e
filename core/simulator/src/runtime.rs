// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The `runtime:` section: sizing of the Tokio runtime the HTTP server runs
//! on, and how long shutdown waits for in-flight requests.

use std::time::Duration;

use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};
use tokio::runtime::{Builder, Runtime};
use tracing::{info, warn};

use crate::config::ConfigError;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfiguration {
    /// Worker threads; 0 uses every available core
    #[serde(default)]
    worker_threads: usize,

    #[serde(default = "default_thread_name")]
    thread_name: String,

    /// Upper bound for in-flight requests to finish after a shutdown signal
    #[serde(
        default = "default_drain_timeout",
        deserialize_with = "deserialize_duration"
    )]
    drain_timeout: Duration,
}

impl Default for RuntimeConfiguration {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            thread_name: default_thread_name(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

fn default_thread_name() -> String {
    "simulator".to_string()
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(10)
}

impl RuntimeConfiguration {
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Worker threads to start given `available` cores. Requests above the
    /// core count are capped.
    fn resolve_workers(&self, available: usize) -> usize {
        match self.worker_threads {
            0 => available,
            n if n > available => {
                warn!(
                    requested = n,
                    available, "not enough cores, using all available cores"
                );
                available
            }
            n => n,
        }
    }

    /// Build the runtime: current-thread for a single worker, multi-thread
    /// otherwise.
    pub fn build_runtime(&self) -> Result<Runtime, ConfigError> {
        let workers = self.resolve_workers(num_cpus::get());

        let mut builder = if workers == 1 {
            Builder::new_current_thread()
        } else {
            let mut builder = Builder::new_multi_thread();
            builder.worker_threads(workers);
            builder
        };

        let runtime = builder
            .enable_all()
            .thread_name(self.thread_name.as_str())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build runtime: {}", e)))?;

        info!(workers, thread_name = %self.thread_name, "runtime ready");
        Ok(runtime)
    }
}
