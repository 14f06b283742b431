use crate::config::LedgerConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Replay banking operations against the ledger core
#[derive(Parser, Debug)]
#[command(name = "banking-ledger")]
#[command(about = "Replay banking operations against the ledger core", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing operation records
    #[arg(value_name = "INPUT", help = "Path to the operations CSV file")]
    pub input_file: PathBuf,

    /// Where to write the transaction log
    #[arg(
        long = "transactions",
        value_name = "PATH",
        help = "Also write every recorded transaction as CSV to PATH"
    )]
    pub transactions_file: Option<PathBuf>,

    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value = "info",
        help = "Log filter (overridden by RUST_LOG)"
    )]
    pub log_level: String,

    #[arg(
        long = "pin-ttl-secs",
        value_name = "SECS",
        help = "Lifetime of a PIN session code (default: 300)"
    )]
    pub pin_ttl_secs: Option<u64>,

    #[arg(
        long = "reaper-interval-ms",
        value_name = "MILLIS",
        help = "Period of the expired PIN sweep (default: 1000)"
    )]
    pub reaper_interval_ms: Option<u64>,
}

impl CliArgs {
    /// Create a LedgerConfig from CLI arguments
    ///
    /// Options left out keep their defaults. Zero values fall back to the
    /// defaults with a warning (see [`LedgerConfig::new`]).
    pub fn to_ledger_config(&self) -> LedgerConfig {
        if self.pin_ttl_secs.is_none() && self.reaper_interval_ms.is_none() {
            return LedgerConfig::default();
        }

        let default = LedgerConfig::default();
        LedgerConfig::new(
            self.pin_ttl_secs
                .map_or(default.pin_ttl, Duration::from_secs),
            default.pin_grace,
            self.reaper_interval_ms
                .map_or(default.reaper_interval, Duration::from_millis),
            default.default_page_size,
        )
    }
}
