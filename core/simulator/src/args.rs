// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Enhanced Chat simulator", long_about = None)]
pub struct Args {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", env = "CONFIG")]
    config: String,
}

impl Args {
    pub fn config(&self) -> &str {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_argument() {
        let args = Args::try_parse_from(["enhanced-chat-sim", "--config", "simulator.yaml"]).unwrap();
        assert_eq!(args.config(), "simulator.yaml");

        let args = Args::try_parse_from(["enhanced-chat-sim", "-c", "other.yaml"]).unwrap();
        assert_eq!(args.config(), "other.yaml");
    }
}
