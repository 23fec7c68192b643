// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "chorus", version, about = "Agentic messaging substrate broker")]
pub struct Cli {
    /// Path to the broker config file (YAML). Defaults to
    /// `~/.config/chorus/config.yaml`.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug-level logging on stderr (repeat for trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the broker: WebSocket + native listeners, session store, and
    /// the agent supervisor.
    Serve {
        /// Override `transport.listen_addr` from the config file.
        #[arg(long)]
        listen: Option<String>,
    },
    /// Print the fully-resolved configuration (defaults filled in) and exit.
    ShowConfig,
}
