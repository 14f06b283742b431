//! Core business logic module
//!
//! This module contains the ledger and transfer core:
//! - `traits` - Collaborator seams for account and profile storage
//! - `directory` - In-memory implementation of those collaborators
//! - `ledger` - Account balances and status with per-account locking
//! - `transaction_log` - Append-only record of money-movement attempts
//! - `pin_session` - Short-lived, view-once, use-once confirmation codes
//! - `transfer_pin` - Long-lived transfer PIN checks
//! - `transfer` - Transfer, deposit and withdrawal orchestration
//! - `account_request` - Approval workflow for new accounts
//! - `engine` - The facade exposing every public operation

pub mod account_request;
pub mod directory;
pub mod engine;
pub mod ledger;
pub mod pin_session;
pub mod traits;
pub mod transaction_log;
pub mod transfer;
pub mod transfer_pin;

pub use account_request::AccountRequests;
pub use directory::InMemoryDirectory;
pub use engine::BankingEngine;
pub use ledger::Ledger;
pub use pin_session::{PinReaper, PinSessions, PinStatus};
pub use traits::{AccountDirectory, ProfileStore};
pub use transaction_log::TransactionLog;
pub use transfer::{PinAuthorization, TransferOrchestrator, TransferRequest};
pub use transfer_pin::TransferPins;
