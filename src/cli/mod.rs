//! CLI module - Command-line interface for jobhound
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// jobhound - job posting ingestion and search API
#[derive(Parser)]
#[command(name = "jobhound")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    #[command(alias = "daemon")]
    Serve,

    /// Create an administrator account, e.g. for a scraping agent
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Falls back to the `JOBHOUND_ADMIN_PASSWORD` environment variable
        #[arg(long, env = "JOBHOUND_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Validate the effective configuration and print it
    #[command(alias = "check")]
    CheckConfig,
}

pub use commands::*;
