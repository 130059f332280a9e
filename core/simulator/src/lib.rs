// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod args;
pub mod config;
pub mod error;
pub mod history;
pub mod routes;
pub mod runner;
pub mod runtime;
pub mod session;
pub mod signal;
pub mod state;
pub mod vendor;
