// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;

use simulator::args;
use simulator::runner;

fn main() -> anyhow::Result<()> {
    let args = args::Args::parse();

    runner::run(args.config())
}
