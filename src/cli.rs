//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Authentication front-end: delegated sign-in, session cookies, rate limiting
#[derive(Parser, Debug)]
#[command(name = "authgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML, keys in lower case)
    #[arg(short, long, env = "AUTHGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Load environment variables from this file before reading configuration
    #[arg(long, env = "AUTHGATE_ENV_FILE", global = true)]
    pub env_file: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides `LOG_LEVEL`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json); overrides `LOG_FORMAT`
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the server (default)
    Serve,

    /// Validate configuration and provider connectivity, then exit
    Check,
}
