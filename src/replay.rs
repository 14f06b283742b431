//! Operation replay
//!
//! Drives the ledger core from a CSV of operations. The replay tool wires the
//! pieces together:
//! - CSV parsing through `OperationReader` (iterator interface)
//! - Business logic through `BankingEngine`
//! - Output through `csv_format::write_accounts_csv` and
//!   `csv_format::write_transactions_csv`
//!
//! Individual rows that fail are logged and skipped; only fatal I/O errors
//! stop the run.
//!
//! [`replay_file`] runs the expired PIN sweep on a single-worker tokio runtime
//! for the duration of the replay, so `wait` rows let sessions expire and be
//! reaped the way they would in a long-running service.

use crate::config::LedgerConfig;
use crate::core::{BankingEngine, InMemoryDirectory};
use crate::io::csv_format::{write_accounts_csv, write_transactions_csv, Operation};
use crate::io::reader::OperationReader;
use crate::types::{LedgerError, UserProfile};
use dashmap::DashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Outcome counts of a replay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Rows that ran to completion
    pub applied: usize,
    /// Rows that failed to parse or were refused by the core
    pub rejected: usize,
    /// PIN session entries still held, including expired ones not yet reaped
    pub pin_sessions: usize,
}

/// A banking engine backed by an in-memory directory, fed one operation at a time
pub struct Replayer {
    directory: Arc<InMemoryDirectory>,
    engine: BankingEngine,
    summary: ReplaySummary,

    /// Last code generated or revealed per PIN session
    pin_codes: DashMap<String, String>,
}

impl Replayer {
    pub fn new(config: LedgerConfig) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let engine = BankingEngine::new(directory.clone(), directory.clone(), config);

        Self {
            directory,
            engine,
            summary: ReplaySummary::default(),
            pin_codes: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &BankingEngine {
        &self.engine
    }

    pub fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            pin_sessions: self.engine.pin_sessions().len(),
            ..self.summary
        }
    }

    /// Apply a single operation to the engine
    pub fn apply(&self, operation: Operation) -> Result<(), LedgerError> {
        let engine = &self.engine;

        match operation {
            Operation::RegisterUser { user, phone } => {
                self.directory.register_user(UserProfile::new(user, phone))?;
            }
            Operation::SetTransferPin { user, pin } => {
                engine.set_transfer_pin(user, &pin)?;
            }
            Operation::OpenAccount {
                user,
                account_type,
                account,
                opening_balance,
            } => {
                match account {
                    Some(number) => engine.open_account_with_number(
                        &number,
                        user,
                        account_type,
                        opening_balance,
                    )?,
                    None => engine.open_account(user, account_type, opening_balance)?,
                };
            }
            Operation::Deposit {
                account,
                amount,
                description,
            } => {
                engine.deposit(&account, amount, description.as_deref())?;
            }
            Operation::Withdraw {
                account,
                amount,
                description,
            } => {
                engine.withdraw(&account, amount, description.as_deref())?;
            }
            Operation::Transfer {
                from,
                to,
                amount,
                description,
                is_phone,
            } => {
                engine.transfer(&from, &to, amount, description.as_deref(), is_phone)?;
            }
            Operation::TransferByPhone {
                from,
                phone,
                amount,
                description,
                user,
                pin,
            } => {
                engine.transfer_by_phone(
                    &from,
                    &phone,
                    amount,
                    description.as_deref(),
                    user,
                    &pin,
                )?;
            }
            Operation::TransferByAccount {
                from,
                to,
                amount,
                description,
                user,
                pin,
            } => {
                engine.transfer_by_account(
                    &from,
                    &to,
                    amount,
                    description.as_deref(),
                    user,
                    &pin,
                )?;
            }
            Operation::SetStatus { account, status } => {
                engine.set_account_status(&account, status)?;
            }
            Operation::Close { account } => {
                engine.close_account(&account)?;
            }
            Operation::RequestAccount {
                user,
                account_type,
                initial_deposit,
            } => {
                engine.request_account(user, account_type, initial_deposit)?;
            }
            Operation::ApproveRequest { request, account } => {
                engine.approve_account_request(request, account.as_deref())?;
            }
            Operation::RejectRequest { request } => {
                engine.reject_account_request(request)?;
            }
            Operation::GeneratePin { session } => {
                let code = engine.generate_pin(&session);
                self.pin_codes.insert(session, code);
            }
            Operation::ViewPin { session } => {
                let code = engine
                    .view_pin(&session)
                    .ok_or_else(|| LedgerError::PinUnavailable {
                        session: session.clone(),
                    })?;
                self.pin_codes.insert(session, code);
            }
            Operation::VerifyPin { session, code } => {
                let code = code
                    .or_else(|| self.pin_codes.get(&session).map(|c| c.value().clone()))
                    .unwrap_or_default();
                if !engine.verify_pin(&session, &code) {
                    return Err(LedgerError::PinRejected { session });
                }
            }
            Operation::InvalidatePin { session } => {
                engine.invalidate_pin(&session);
                self.pin_codes.remove(&session);
            }
            Operation::Wait { duration } => {
                debug!(?duration, "Pausing replay");
                thread::sleep(duration);
            }
        }

        Ok(())
    }

    /// Apply every operation from a reader, logging and counting row failures
    pub fn run<R: Read>(&mut self, reader: OperationReader<R>) {
        for result in reader {
            let outcome = result.and_then(|operation| self.apply(operation));

            match outcome {
                Ok(()) => self.summary.applied += 1,
                Err(e) => {
                    self.summary.rejected += 1;
                    match e.failed_transaction_id() {
                        Some(transaction_id) => {
                            warn!(%transaction_id, kind = ?e.kind(), "Operation failed: {}", e)
                        }
                        None => warn!(kind = ?e.kind(), "Operation rejected: {}", e),
                    }
                }
            }
        }
    }

    /// Write the final account states, sorted by account number
    pub fn write_accounts(&self, output: &mut dyn Write) -> Result<(), LedgerError> {
        write_accounts_csv(&self.engine.all_accounts(), output)
    }

    /// Write every recorded transaction in recording order
    pub fn write_transactions(&self, output: &mut dyn Write) -> Result<(), LedgerError> {
        write_transactions_csv(&self.engine.all_transactions(), output)
    }
}

/// Replay the operations in `input` and write the resulting account states
///
/// # Arguments
///
/// * `input` - Path to the operations CSV
/// * `output` - Destination for the accounts CSV
/// * `transactions` - Optional destination for the transaction log CSV
/// * `config` - Ledger tunables
///
/// # Errors
///
/// Only fatal errors are returned (input cannot be opened, output cannot be
/// written). Row-level failures are logged and counted in the summary.
pub fn replay_file(
    input: &Path,
    output: &mut dyn Write,
    transactions: Option<&mut dyn Write>,
    config: LedgerConfig,
) -> Result<ReplaySummary, LedgerError> {
    let reader = OperationReader::open(input)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()
        .map_err(|e| LedgerError::storage(format!("Failed to create tokio runtime: {}", e)))?;
    let mut replayer = Replayer::new(config);

    let reaper = {
        let _guard = runtime.enter();
        replayer.engine().start_pin_reaper()
    };
    replayer.run(reader);
    let summary = replayer.summary();
    runtime.block_on(reaper.shutdown());

    replayer.write_accounts(output)?;
    if let Some(out) = transactions {
        replayer.write_transactions(out)?;
    }

    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        pin_sessions = summary.pin_sessions,
        "Replay finished"
    );
    Ok(summary)
}
