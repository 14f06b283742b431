//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account, its type and status
//! - `account_request`: Account-opening requests and their review state
//! - `transaction`: Transaction records, drafts and paging
//! - `user`: The user profile slice consumed by the ledger
//! - `money`: Fixed-point amount validation
//! - `error`: Error types and their classification

pub mod account;
pub mod account_request;
pub mod error;
pub mod money;
pub mod transaction;
pub mod user;

pub use account::{Account, AccountDraft, AccountId, AccountStatus, AccountType};
pub use account_request::{AccountRequest, RequestId, RequestStatus};
pub use error::{ErrorKind, LedgerError};
pub use money::{validate_amount, validate_opening_balance, MONEY_SCALE};
pub use transaction::{
    AccountRef, Page, Recipient, Transaction, TransactionDraft, TransactionId, TransactionStatus,
    TransactionType,
};
pub use user::{UserId, UserProfile};
