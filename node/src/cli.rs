//! # CLI Interface
//!
//! Command-line arguments for `obligation-node`, parsed with `clap` derive.
//! Every `run` flag falls back to an `OBLIGATION_*` environment variable.

use clap::{Args, Parser, Subcommand};
use obligation_protocol::config::{
    FlowConfig, DEFAULT_API_PORT, DEFAULT_COMMIT_TIMEOUT, DEFAULT_IDENTITY_EXCHANGE_TIMEOUT,
    DEFAULT_METRICS_PORT, DEFAULT_SESSION_TIMEOUT, DEFAULT_TIME_WINDOW,
};
use std::time::Duration;

use crate::logging::LogFormat;

/// Obligation ledger node.
///
/// Hosts a notary and a set of parties in one process and exposes an HTTP
/// API per party to issue, transfer and settle obligations.
#[derive(Parser, Debug)]
#[command(
    name = "obligation-node",
    about = "Obligation ledger node",
    version,
    propagate_version = true
)]
pub struct ObligationNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the network and serve the API.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Port for the HTTP API.
    #[arg(long, env = "OBLIGATION_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "OBLIGATION_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Names of the parties to start, comma separated.
    #[arg(
        long,
        env = "OBLIGATION_PARTIES",
        value_delimiter = ',',
        default_value = "PartyA,PartyB,PartyC"
    )]
    pub parties: Vec<String>,

    /// Name of the notary.
    #[arg(long, env = "OBLIGATION_NOTARY", default_value = "Notary")]
    pub notary: String,

    /// Bound on every single counterparty receive, in milliseconds.
    #[arg(long, env = "OBLIGATION_SESSION_TIMEOUT_MS", default_value_t = millis(DEFAULT_SESSION_TIMEOUT))]
    pub session_timeout_ms: u64,

    /// Bound on a whole confidential identity exchange, in milliseconds.
    #[arg(
        long,
        env = "OBLIGATION_IDENTITY_EXCHANGE_TIMEOUT_MS",
        default_value_t = millis(DEFAULT_IDENTITY_EXCHANGE_TIMEOUT)
    )]
    pub identity_exchange_timeout_ms: u64,

    /// How long a responder waits for the finalized transaction, in milliseconds.
    #[arg(long, env = "OBLIGATION_COMMIT_TIMEOUT_MS", default_value_t = millis(DEFAULT_COMMIT_TIMEOUT))]
    pub commit_timeout_ms: u64,

    /// Length of the notarisation window on issued obligations, in milliseconds.
    #[arg(long, env = "OBLIGATION_TIME_WINDOW_MS", default_value_t = millis(DEFAULT_TIME_WINDOW))]
    pub time_window_ms: u64,

    /// Log output format.
    #[arg(long, env = "OBLIGATION_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

impl RunArgs {
    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            session_timeout: Duration::from_millis(self.session_timeout_ms),
            identity_exchange_timeout: Duration::from_millis(self.identity_exchange_timeout_ms),
            commit_timeout: Duration::from_millis(self.commit_timeout_ms),
            time_window: Duration::from_millis(self.time_window_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        ObligationNodeCli::command().debug_assert();
    }

    #[test]
    fn defaults_match_flow_config() {
        let cli = ObligationNodeCli::parse_from(["obligation-node", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.flow_config(), FlowConfig::default());
        assert_eq!(args.parties, vec!["PartyA", "PartyB", "PartyC"]);
        assert_eq!(args.port, DEFAULT_API_PORT);
    }

    #[test]
    fn parties_split_on_commas() {
        let cli = ObligationNodeCli::parse_from([
            "obligation-node",
            "run",
            "--parties",
            "Alice,Bob",
            "--log-format",
            "json",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.parties, vec!["Alice", "Bob"]);
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
