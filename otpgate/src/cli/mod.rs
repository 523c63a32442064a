//! CLI module for otpgate
//!
//! サーバー起動とシークレット発行のサブコマンドを提供する。

pub mod genkey;
pub mod serve;

use clap::{Parser, Subcommand};

/// otpgate - OTP-gated HTTP relay
#[derive(Parser, Debug)]
#[command(name = "otpgate")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    OTPGATE_HOST                           Bind address (default: 0.0.0.0)
    OTPGATE_PORT / PORT                    Listen port (default: 7000)
    OTPGATE_LOG_FILE / LOG_FILE            Activity log path (default: proxy.log)
    OTPGATE_SNAPSHOT_DIR                   Directory for log snapshots (default: log file's directory)
    OTPGATE_TOTP_SECRET / TOTP_SECRET      Base32 shared secret (required)
    OTPGATE_TOTP_SKEW                      Accepted time steps on each side (default: 1)
    OTPGATE_UPSTREAM_CONNECT_TIMEOUT_SECS  Upstream connect timeout (default: 10)
    OTPGATE_UPSTREAM_TIMEOUT_SECS          Upstream total timeout, 0 disables (default: 600)
    OTPGATE_BODY_LIMIT_BYTES               Request body limit (default: 65536)
    OTPGATE_LOG_LEVEL                      Diagnostic log level (default: info)
    OTPGATE_DIAG_LOG_DIR                   Write diagnostic logs to daily files here
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the relay server
    Serve(serve::ServeArgs),
    /// Generate a new TOTP secret and enrollment QR code
    Genkey(genkey::GenkeyArgs),
}
