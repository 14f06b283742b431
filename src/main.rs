//! Banking ledger replay CLI
//!
//! Replays banking operations from a CSV file against the ledger core and
//! prints the resulting account states.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > accounts.csv
//! cargo run -- --transactions transactions.csv operations.csv > accounts.csv
//! RUST_LOG=debug cargo run -- operations.csv > accounts.csv
//! ```
//!
//! Logs are written to stderr; stdout carries only the accounts CSV.
//!
//! # Exit Codes
//!
//! - 0: Success (individual rejected rows do not change the exit code)
//! - 1: Error (file not found, file not readable, output not writable)

use banking_ledger::types::LedgerError;
use banking_ledger::{cli, logging, replay};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;
use tracing::error;

fn main() {
    let args = cli::parse_args();
    logging::init_logging(&args.log_level);

    if let Err(e) = run(&args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &cli::CliArgs) -> Result<(), LedgerError> {
    let config = args.to_ledger_config();
    let mut output = std::io::stdout().lock();

    match &args.transactions_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| LedgerError::IoError {
                message: format!("Failed to create file '{}': {}", path.display(), e),
            })?;
            let mut transactions = BufWriter::new(file);
            replay::replay_file(
                &args.input_file,
                &mut output,
                Some(&mut transactions as &mut dyn Write),
                config,
            )?;
            transactions.flush()?;
        }
        None => {
            replay::replay_file(&args.input_file, &mut output, None, config)?;
        }
    }

    Ok(())
}
