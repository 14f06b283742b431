//! Money movements recorded in the transaction log
//!
//! This module provides the `TransferOrchestrator`, which turns a transfer,
//! deposit or withdrawal request into exactly one [`Transaction`] record and
//! the matching ledger mutation.
//!
//! # Flow
//!
//! 1. Validate everything that can be checked without touching money:
//!    source and destination accounts, self-transfer, amount, transfer PIN.
//!    A failure here returns an error and leaves no record behind.
//! 2. Record the attempt as PENDING.
//! 3. Run the ledger stage.
//! 4. Mark the record COMPLETED, or FAILED with the reason appended. A failed
//!    ledger stage is reported as [`LedgerError::TransactionFailed`], which
//!    carries the external id of the FAILED record.

use crate::core::ledger::Ledger;
use crate::core::transaction_log::TransactionLog;
use crate::core::transfer_pin::TransferPins;
use crate::types::{
    validate_amount, Account, AccountRef, LedgerError, Recipient, Transaction, TransactionDraft,
    TransactionType, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const DEFAULT_TRANSFER_DESCRIPTION: &str = "Money transfer";
pub const DEFAULT_PHONE_TRANSFER_DESCRIPTION: &str = "Money transfer via phone number";
pub const DEFAULT_ACCOUNT_TRANSFER_DESCRIPTION: &str = "Money transfer via account number";
pub const DEFAULT_DEPOSIT_DESCRIPTION: &str = "Cash deposit";
pub const DEFAULT_WITHDRAWAL_DESCRIPTION: &str = "Cash withdrawal";

/// Transfer PIN presented by the user initiating a transfer
#[derive(Clone, PartialEq, Eq)]
pub struct PinAuthorization {
    pub user: UserId,
    pub pin: String,
}

impl std::fmt::Debug for PinAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinAuthorization")
            .field("user", &self.user)
            .field("pin", &"******")
            .finish()
    }
}

/// A request to move money between two accounts
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    /// Account number of the source account
    pub from_account: String,

    /// How the destination is addressed
    pub to: Recipient,

    pub amount: Decimal,

    /// Free text; blank falls back to "Money transfer"
    pub description: Option<String>,

    /// Required for user-initiated transfers, absent for internal ones
    pub authorization: Option<PinAuthorization>,
}

/// Executes transfers, deposits and withdrawals
pub struct TransferOrchestrator {
    ledger: Arc<Ledger>,
    log: Arc<TransactionLog>,
    pins: Arc<TransferPins>,
}

impl TransferOrchestrator {
    pub fn new(ledger: Arc<Ledger>, log: Arc<TransactionLog>, pins: Arc<TransferPins>) -> Self {
        Self { ledger, log, pins }
    }

    /// Execute a transfer request
    ///
    /// # Returns
    ///
    /// * `Ok(Transaction)` - The COMPLETED record
    /// * `Err(SourceNotFound | SourceNotActive)` - Bad source account, no record
    /// * `Err(DestinationNotFound | DestinationNotActive | NoActiveAccountForPhone)` -
    ///   Bad destination, no record
    /// * `Err(SelfTransfer | InvalidAmount | InvalidTransferPin)` - Rejected
    ///   before any mutation, no record
    /// * `Err(TransactionFailed)` - The ledger stage failed; a FAILED record exists
    pub fn execute(&self, request: TransferRequest) -> Result<Transaction, LedgerError> {
        let source = self.resolve_source(&request.from_account)?;
        let destination = self.resolve_destination(&request.to)?;

        if source.id == destination.id {
            warn!(account = %source.account_number, "Transfer to the same account rejected");
            return Err(LedgerError::SelfTransfer {
                account: source.account_number,
            });
        }

        let amount = validate_amount(request.amount)?;

        if let Some(auth) = &request.authorization {
            self.pins.authorize(auth.user, &auth.pin)?;
        }

        let draft = TransactionDraft {
            tx_type: TransactionType::Transfer,
            amount,
            description: describe(request.description.as_deref(), DEFAULT_TRANSFER_DESCRIPTION),
            from_account: Some(AccountRef::from(&source)),
            to_account: Some(AccountRef::from(&destination)),
            recipient: Some(request.to),
        };

        self.run(draft, || {
            self.ledger
                .transfer_funds(source.id, destination.id, amount)
                .map(|_| ())
        })
    }

    /// Internal transfer without PIN confirmation
    ///
    /// # Arguments
    ///
    /// * `from_account` - Source account number
    /// * `to_identifier` - Destination account number, or phone number when `is_phone`
    /// * `amount` - Amount to move
    /// * `description` - Optional free text
    /// * `is_phone` - Whether `to_identifier` is a phone number
    pub fn transfer(
        &self,
        from_account: &str,
        to_identifier: &str,
        amount: Decimal,
        description: Option<&str>,
        is_phone: bool,
    ) -> Result<Transaction, LedgerError> {
        let to = if is_phone {
            Recipient::Phone(to_identifier.to_string())
        } else {
            Recipient::AccountNumber(to_identifier.to_string())
        };

        self.execute(TransferRequest {
            from_account: from_account.to_string(),
            to,
            amount,
            description: description.map(str::to_string),
            authorization: None,
        })
    }

    /// User-initiated transfer to the oldest active account behind a phone number
    pub fn transfer_by_phone(
        &self,
        from_account: &str,
        phone_number: &str,
        amount: Decimal,
        description: Option<&str>,
        user: UserId,
        pin: &str,
    ) -> Result<Transaction, LedgerError> {
        self.execute(TransferRequest {
            from_account: from_account.to_string(),
            to: Recipient::Phone(phone_number.to_string()),
            amount,
            description: Some(describe(description, DEFAULT_PHONE_TRANSFER_DESCRIPTION)),
            authorization: Some(PinAuthorization {
                user,
                pin: pin.to_string(),
            }),
        })
    }

    /// User-initiated transfer to an account number
    pub fn transfer_by_account(
        &self,
        from_account: &str,
        to_account: &str,
        amount: Decimal,
        description: Option<&str>,
        user: UserId,
        pin: &str,
    ) -> Result<Transaction, LedgerError> {
        self.execute(TransferRequest {
            from_account: from_account.to_string(),
            to: Recipient::AccountNumber(to_account.to_string()),
            amount,
            description: Some(describe(description, DEFAULT_ACCOUNT_TRANSFER_DESCRIPTION)),
            authorization: Some(PinAuthorization {
                user,
                pin: pin.to_string(),
            }),
        })
    }

    /// Credit an account and record the deposit
    ///
    /// An unknown account or an invalid amount is rejected without a record.
    /// An account that cannot be credited yields a FAILED record.
    pub fn deposit(
        &self,
        account_number: &str,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        let account = self.ledger.account_by_number(account_number)?;
        let amount = validate_amount(amount)?;

        let draft = TransactionDraft {
            tx_type: TransactionType::Deposit,
            amount,
            description: describe(description, DEFAULT_DEPOSIT_DESCRIPTION),
            from_account: None,
            to_account: Some(AccountRef::from(&account)),
            recipient: None,
        };

        self.run(draft, || {
            self.ledger.credit(&account.account_number, amount).map(|_| ())
        })
    }

    /// Debit an account and record the withdrawal
    ///
    /// Insufficient funds or an inactive account yield a FAILED record.
    pub fn withdraw(
        &self,
        account_number: &str,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        let account = self.ledger.account_by_number(account_number)?;
        let amount = validate_amount(amount)?;

        let draft = TransactionDraft {
            tx_type: TransactionType::Withdrawal,
            amount,
            description: describe(description, DEFAULT_WITHDRAWAL_DESCRIPTION),
            from_account: Some(AccountRef::from(&account)),
            to_account: None,
            recipient: None,
        };

        self.run(draft, || {
            self.ledger.debit(&account.account_number, amount).map(|_| ())
        })
    }

    fn resolve_source(&self, account_number: &str) -> Result<Account, LedgerError> {
        let source = self
            .ledger
            .resolve_by_account_number(account_number)
            .map_err(|_| LedgerError::SourceNotFound {
                account: account_number.to_string(),
            })?;

        if !source.is_active() {
            return Err(LedgerError::SourceNotActive {
                account: source.account_number,
                status: source.status,
            });
        }
        Ok(source)
    }

    fn resolve_destination(&self, to: &Recipient) -> Result<Account, LedgerError> {
        let destination = match to {
            Recipient::Phone(phone) => self.ledger.resolve_by_phone(phone)?,
            Recipient::AccountNumber(number) => self
                .ledger
                .resolve_by_account_number(number)
                .map_err(|_| LedgerError::DestinationNotFound {
                    identifier: number.clone(),
                })?,
        };

        if !destination.is_active() {
            return Err(LedgerError::DestinationNotActive {
                account: destination.account_number,
                status: destination.status,
            });
        }
        Ok(destination)
    }

    /// Record the draft as PENDING, run the ledger stage, and finish the record
    fn run<F>(&self, draft: TransactionDraft, ledger_stage: F) -> Result<Transaction, LedgerError>
    where
        F: FnOnce() -> Result<(), LedgerError>,
    {
        let pending = self.log.record(draft)?;

        match ledger_stage() {
            Ok(()) => {
                let completed = self.log.complete(pending.id)?;
                info!(
                    transaction = %completed.transaction_id,
                    tx_type = %completed.tx_type,
                    amount = %completed.amount,
                    "Transaction completed"
                );
                Ok(completed)
            }
            Err(e) => {
                if let Err(log_error) = self.log.fail(pending.id, &e.to_string()) {
                    error!(
                        transaction = %pending.transaction_id,
                        error = %log_error,
                        "Could not mark transaction as failed"
                    );
                }
                warn!(
                    transaction = %pending.transaction_id,
                    tx_type = %pending.tx_type,
                    error = %e,
                    "Transaction failed"
                );
                Err(LedgerError::transaction_failed(pending.transaction_id, e))
            }
        }
    }
}

fn describe(description: Option<&str>, default: &str) -> String {
    match description.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => default.to_string(),
    }
}
