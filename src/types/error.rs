//! Error types for the banking ledger
//!
//! This module defines every error the ledger core can report. Each variant
//! carries the context needed to explain the failure, and [`LedgerError::kind`]
//! maps it onto a small closed taxonomy so callers can branch on the kind of
//! failure rather than on message text.
//!
//! # Error Categories
//!
//! - **Not found**: unknown accounts, users, transactions, phone recipients
//! - **Invalid state**: inactive or closed accounts, finalized transactions
//! - **Insufficient funds**: a debit larger than the balance
//! - **Invalid amount**: zero, negative or over-precise amounts
//! - **Unauthorized**: transfer PIN mismatch or absence
//! - **Conflict**: duplicate identifiers, transfer PIN already set
//! - **Internal**: arithmetic overflow, storage and I/O failures

use super::account::AccountStatus;
use super::account_request::{RequestId, RequestStatus};
use super::transaction::TransactionStatus;
use super::user::UserId;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Closed classification of every [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InsufficientFunds,
    InvalidAmount,
    InvalidInput,
    Unauthorized,
    Conflict,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::InsufficientFunds => "insufficient funds",
            ErrorKind::InvalidAmount => "invalid amount",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Main error type for the ledger core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// No account with the given number or id
    #[error("Account not found: {account}")]
    AccountNotFound { account: String },

    /// No user with the given id
    #[error("User not found with id: {user}")]
    UserNotFound { user: UserId },

    /// Source account of a transfer does not exist
    #[error("Source account not found: {account}")]
    SourceNotFound { account: String },

    /// Destination account of a transfer does not exist
    #[error("Destination account not found: {identifier}")]
    DestinationNotFound { identifier: String },

    /// The phone number has no ACTIVE account to receive funds
    #[error("No active account found for phone number: {phone}")]
    NoActiveAccountForPhone { phone: String },

    /// No transaction with the given id
    #[error("Transaction not found: {transaction}")]
    TransactionNotFound { transaction: String },

    #[error("Account request not found with id: {request}")]
    AccountRequestNotFound { request: RequestId },

    /// No PIN code is available for the session
    #[error("No PIN available for session {session}")]
    PinUnavailable { session: String },

    /// The account cannot be debited or credited in its current status
    #[error("Account {account} is not active (status {status})")]
    AccountNotActive {
        account: String,
        status: AccountStatus,
    },

    #[error("Source account {account} is not active (status {status})")]
    SourceNotActive {
        account: String,
        status: AccountStatus,
    },

    #[error("Destination account {account} is not active (status {status})")]
    DestinationNotActive {
        account: String,
        status: AccountStatus,
    },

    /// A closed account accepts no further status change
    #[error("Account {account} is closed")]
    AccountClosed { account: String },

    /// Only a zero-balance account may be closed
    #[error("Cannot close account {account} with non-zero balance {balance}")]
    NonZeroBalance { account: String, balance: Decimal },

    /// The transaction already reached a terminal status
    #[error("Transaction {transaction} is already {status}")]
    TransactionAlreadyFinal {
        transaction: String,
        status: TransactionStatus,
    },

    /// Only pending requests can be approved or rejected
    #[error("Account request {request} is already {status}")]
    RequestNotPending {
        request: String,
        status: RequestStatus,
    },

    #[error("User {user} has too many pending account requests ({pending})")]
    TooManyPendingRequests { user: UserId, pending: usize },

    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: String,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Decimal, reason: String },

    /// Source and resolved destination are the same account
    #[error("Cannot transfer money to the same account {account}")]
    SelfTransfer { account: String },

    /// Transfer PIN missing or not matching for the user
    #[error("Invalid transfer PIN for user {user}")]
    InvalidTransferPin { user: UserId },

    /// The candidate code did not verify for the PIN session
    #[error("PIN verification failed for session {session}")]
    PinRejected { session: String },

    #[error("PIN must be exactly 6 digits")]
    InvalidPinFormat,

    #[error("Transfer PIN already exists for user {user}; it can only be created once")]
    TransferPinAlreadySet { user: UserId },

    #[error("User {user} already exists")]
    DuplicateUser { user: String },

    #[error("Account number {account} already exists")]
    DuplicateAccountNumber { account: String },

    #[error("Transaction id {transaction} already exists")]
    DuplicateTransactionId { transaction: String },

    #[error("Account request id {request} already exists")]
    DuplicateRequestId { request: String },

    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow { operation: String, account: String },

    /// The backing store rejected a write
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// A money movement failed after its transaction record was created
    ///
    /// The record identified by `transaction_id` has been persisted as FAILED.
    #[error("Transaction {transaction_id} failed: {reason}")]
    TransactionFailed {
        transaction_id: String,
        #[source]
        reason: Box<LedgerError>,
    },

    #[error("I/O error: {message}")]
    IoError { message: String },

    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },
}

impl LedgerError {
    /// Classify this error
    ///
    /// A [`LedgerError::TransactionFailed`] reports the kind of the failure
    /// that caused it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AccountNotFound { .. }
            | LedgerError::UserNotFound { .. }
            | LedgerError::SourceNotFound { .. }
            | LedgerError::DestinationNotFound { .. }
            | LedgerError::NoActiveAccountForPhone { .. }
            | LedgerError::TransactionNotFound { .. }
            | LedgerError::AccountRequestNotFound { .. }
            | LedgerError::PinUnavailable { .. } => ErrorKind::NotFound,
            LedgerError::AccountNotActive { .. }
            | LedgerError::SourceNotActive { .. }
            | LedgerError::DestinationNotActive { .. }
            | LedgerError::AccountClosed { .. }
            | LedgerError::NonZeroBalance { .. }
            | LedgerError::TransactionAlreadyFinal { .. }
            | LedgerError::RequestNotPending { .. }
            | LedgerError::TooManyPendingRequests { .. } => ErrorKind::InvalidState,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            LedgerError::SelfTransfer { .. }
            | LedgerError::InvalidPinFormat
            | LedgerError::ParseError { .. } => ErrorKind::InvalidInput,
            LedgerError::InvalidTransferPin { .. } | LedgerError::PinRejected { .. } => {
                ErrorKind::Unauthorized
            }
            LedgerError::TransferPinAlreadySet { .. }
            | LedgerError::DuplicateUser { .. }
            | LedgerError::DuplicateAccountNumber { .. }
            | LedgerError::DuplicateTransactionId { .. }
            | LedgerError::DuplicateRequestId { .. } => ErrorKind::Conflict,
            LedgerError::ArithmeticOverflow { .. }
            | LedgerError::Storage { .. }
            | LedgerError::IoError { .. } => ErrorKind::Internal,
            LedgerError::TransactionFailed { reason, .. } => reason.kind(),
        }
    }

    /// The innermost error, looking through [`LedgerError::TransactionFailed`]
    pub fn root_cause(&self) -> &LedgerError {
        match self {
            LedgerError::TransactionFailed { reason, .. } => reason.root_cause(),
            other => other,
        }
    }

    /// External id of the FAILED record left behind, if any
    pub fn failed_transaction_id(&self) -> Option<&str> {
        match self {
            LedgerError::TransactionFailed { transaction_id, .. } => Some(transaction_id),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn account_not_found(account: impl Into<String>) -> Self {
        LedgerError::AccountNotFound {
            account: account.into(),
        }
    }

    pub fn account_not_active(account: impl Into<String>, status: AccountStatus) -> Self {
        LedgerError::AccountNotActive {
            account: account.into(),
            status,
        }
    }

    pub fn insufficient_funds(
        account: impl Into<String>,
        balance: Decimal,
        requested: Decimal,
    ) -> Self {
        LedgerError::InsufficientFunds {
            account: account.into(),
            balance,
            requested,
        }
    }

    pub fn invalid_amount(amount: Decimal, reason: &str) -> Self {
        LedgerError::InvalidAmount {
            amount,
            reason: reason.to_string(),
        }
    }

    pub fn arithmetic_overflow(operation: &str, account: impl Into<String>) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account: account.into(),
        }
    }

    pub fn transaction_not_found(transaction: impl Into<String>) -> Self {
        LedgerError::TransactionNotFound {
            transaction: transaction.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    pub fn transaction_failed(transaction_id: impl Into<String>, reason: LedgerError) -> Self {
        LedgerError::TransactionFailed {
            transaction_id: transaction_id.into(),
            reason: Box::new(reason),
        }
    }
}
