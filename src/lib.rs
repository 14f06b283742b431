//! Banking Ledger Library
//! # Overview
//!
//! The ledger and transfer core of a retail banking backend: account
//! balances, money movement between accounts, short-lived PIN sessions and
//! an append-only transaction log.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, Transaction, UserProfile, errors)
//! - [`core`] - Business logic components:
//!   - [`core::ledger`] - Balances and account status with per-account locking
//!   - [`core::transfer`] - Transfer, deposit and withdrawal orchestration
//!   - [`core::pin_session`] - View-once, use-once confirmation codes
//!   - [`core::transfer_pin`] - Long-lived transfer PIN checks
//!   - [`core::transaction_log`] - Transaction records and history queries
//!   - [`core::account_request`] - Approval workflow for new accounts
//!   - [`core::engine`] - Facade over all of the above
//! - [`config`] - PIN lifetimes and paging defaults
//! - [`io`] - CSV input and output for the replay tool
//! - [`replay`] - Applies a CSV of operations to an engine
//! - [`cli`] / [`logging`] - Binary plumbing
//!
//! # Money movement
//!
//! Every transfer, deposit and withdrawal is recorded as PENDING before any
//! balance changes and ends in exactly one of COMPLETED or FAILED:
//!
//! - **Transfer**: source and destination change together or not at all
//! - **Deposit**: credits an ACTIVE account
//! - **Withdrawal**: debits an ACTIVE account with sufficient balance
//!
//! Amounts are fixed-point decimals with two places; balances never go
//! negative.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod replay;
pub mod types;

pub use config::LedgerConfig;
pub use core::{
    AccountDirectory, AccountRequests, BankingEngine, InMemoryDirectory, Ledger, PinSessions,
    ProfileStore, TransactionLog, TransferOrchestrator, TransferPins, TransferRequest,
};
pub use io::write_accounts_csv;
pub use replay::{replay_file, ReplaySummary, Replayer};
pub use types::{
    Account, AccountRequest, AccountStatus, AccountType, ErrorKind, LedgerError, Recipient,
    RequestStatus, Transaction, TransactionStatus, TransactionType, UserId, UserProfile,
};
