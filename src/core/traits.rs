//! Collaborator traits consumed by the ledger core
//!
//! The core never stores accounts or user profiles itself. It reaches them
//! through these traits, which are the seam to whatever durable store backs
//! the bank. [`InMemoryDirectory`](crate::core::InMemoryDirectory) is the
//! in-process implementation used by the replay tool and the tests.

use crate::types::{Account, AccountDraft, AccountId, LedgerError, UserId, UserProfile};
use chrono::{DateTime, Utc};

/// Account rows and the lookups the ledger needs over them
///
/// Implementations must be safe to call from many worker threads at once.
/// They provide storage, not mutual exclusion: serializing updates to the
/// same account is the [`Ledger`](crate::core::Ledger)'s job.
pub trait AccountDirectory: Send + Sync {
    /// Look up an account by its human-facing number
    fn find_account_by_number(&self, account_number: &str) -> Option<Account>;

    /// Look up an account by its internal id
    fn find_account_by_id(&self, id: AccountId) -> Option<Account>;

    /// All ACTIVE accounts of the user registered with this phone number,
    /// oldest first
    fn find_active_accounts_by_phone(&self, phone_number: &str) -> Vec<Account>;

    /// Every account of the user registered with this phone number, in any status
    fn find_accounts_by_phone(&self, phone_number: &str) -> Vec<Account>;

    fn find_accounts_by_owner(&self, owner: UserId) -> Vec<Account>;

    fn all_accounts(&self) -> Vec<Account>;

    fn account_exists(&self, account_number: &str) -> bool;

    fn user_exists(&self, user: UserId) -> bool;

    /// Store a new account, assigning its id and timestamps
    ///
    /// # Errors
    ///
    /// Returns `DuplicateAccountNumber` if the number is already taken.
    fn insert_account(&self, draft: AccountDraft) -> Result<Account, LedgerError>;

    /// Persist the current state of an existing account
    fn save_account(&self, account: &Account) -> Result<(), LedgerError>;
}

/// User profile storage, limited to what transfer authorization needs
pub trait ProfileStore: Send + Sync {
    fn find_user(&self, user: UserId) -> Option<UserProfile>;

    fn find_user_by_phone(&self, phone_number: &str) -> Option<UserProfile>;

    /// Set the user's transfer PIN if, and only if, none is set yet
    ///
    /// The check and the write happen atomically so two concurrent calls
    /// cannot both succeed.
    ///
    /// # Errors
    ///
    /// * `UserNotFound` - unknown user
    /// * `TransferPinAlreadySet` - the user already has a transfer PIN
    fn store_transfer_pin(
        &self,
        user: UserId,
        pin: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), LedgerError>;
}
