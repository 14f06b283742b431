//! In-memory account directory and profile store
//!
//! `InMemoryDirectory` implements both collaborator traits on top of
//! `DashMap`, standing in for the bank's durable store. It keeps secondary
//! indexes for account numbers and phone numbers so lookups do not scan.
//!
//! # Thread Safety
//!
//! All operations are thread-safe. No map reference is held across a call
//! into another map, so shard locks are never nested.

use crate::core::traits::{AccountDirectory, ProfileStore};
use crate::types::{Account, AccountDraft, AccountId, LedgerError, UserId, UserProfile};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe in-memory store for accounts and user profiles
#[derive(Debug)]
pub struct InMemoryDirectory {
    accounts: DashMap<AccountId, Account>,

    /// account number -> account id
    numbers: DashMap<String, AccountId>,

    users: DashMap<UserId, UserProfile>,

    /// phone number -> user id
    phones: DashMap<String, UserId>,

    next_account_id: AtomicU64,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            numbers: DashMap::new(),
            users: DashMap::new(),
            phones: DashMap::new(),
            next_account_id: AtomicU64::new(1),
        }
    }

    /// Register a user profile
    ///
    /// # Errors
    ///
    /// Returns `DuplicateUser` if the id or the phone number is already registered.
    pub fn register_user(&self, profile: UserProfile) -> Result<(), LedgerError> {
        let mut phone_claimed = false;
        self.phones
            .entry(profile.phone_number.clone())
            .or_insert_with(|| {
                phone_claimed = true;
                profile.id
            });
        if !phone_claimed {
            return Err(LedgerError::DuplicateUser {
                user: profile.phone_number,
            });
        }

        let mut user_created = false;
        let phone = profile.phone_number.clone();
        let id = profile.id;
        self.users.entry(id).or_insert_with(|| {
            user_created = true;
            profile
        });
        if !user_created {
            self.phones.remove(&phone);
            return Err(LedgerError::DuplicateUser {
                user: id.to_string(),
            });
        }

        Ok(())
    }

    fn user_id_for_phone(&self, phone_number: &str) -> Option<UserId> {
        self.phones.get(phone_number).map(|entry| *entry.value())
    }

    fn accounts_matching<F>(&self, predicate: F) -> Vec<Account>
    where
        F: Fn(&Account) -> bool,
    {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        accounts
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountDirectory for InMemoryDirectory {
    fn find_account_by_number(&self, account_number: &str) -> Option<Account> {
        let id = self.numbers.get(account_number).map(|entry| *entry.value())?;
        self.find_account_by_id(id)
    }

    fn find_account_by_id(&self, id: AccountId) -> Option<Account> {
        self.accounts.get(&id).map(|entry| entry.value().clone())
    }

    fn find_active_accounts_by_phone(&self, phone_number: &str) -> Vec<Account> {
        match self.user_id_for_phone(phone_number) {
            Some(owner) => self.accounts_matching(|a| a.owner == owner && a.is_active()),
            None => Vec::new(),
        }
    }

    fn find_accounts_by_phone(&self, phone_number: &str) -> Vec<Account> {
        match self.user_id_for_phone(phone_number) {
            Some(owner) => self.find_accounts_by_owner(owner),
            None => Vec::new(),
        }
    }

    fn find_accounts_by_owner(&self, owner: UserId) -> Vec<Account> {
        self.accounts_matching(|a| a.owner == owner)
    }

    fn all_accounts(&self) -> Vec<Account> {
        self.accounts_matching(|_| true)
    }

    fn account_exists(&self, account_number: &str) -> bool {
        self.numbers.contains_key(account_number)
    }

    fn user_exists(&self, user: UserId) -> bool {
        self.users.contains_key(&user)
    }

    fn insert_account(&self, draft: AccountDraft) -> Result<Account, LedgerError> {
        let id = self.next_account_id.fetch_add(1, Ordering::SeqCst);

        let mut claimed = false;
        self.numbers
            .entry(draft.account_number.clone())
            .or_insert_with(|| {
                claimed = true;
                id
            });
        if !claimed {
            return Err(LedgerError::DuplicateAccountNumber {
                account: draft.account_number,
            });
        }

        let account = Account::new(
            id,
            draft.account_number,
            draft.account_type,
            draft.opening_balance,
            draft.owner,
        );
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    fn save_account(&self, account: &Account) -> Result<(), LedgerError> {
        match self.accounts.get_mut(&account.id) {
            Some(mut entry) => {
                *entry.value_mut() = account.clone();
                Ok(())
            }
            None => Err(LedgerError::account_not_found(account.account_number.clone())),
        }
    }
}

impl ProfileStore for InMemoryDirectory {
    fn find_user(&self, user: UserId) -> Option<UserProfile> {
        self.users.get(&user).map(|entry| entry.value().clone())
    }

    fn find_user_by_phone(&self, phone_number: &str) -> Option<UserProfile> {
        let id = self.user_id_for_phone(phone_number)?;
        self.find_user(id)
    }

    fn store_transfer_pin(
        &self,
        user: UserId,
        pin: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        match self.users.get_mut(&user) {
            Some(mut entry) => {
                let profile = entry.value_mut();
                if profile.transfer_pin.is_some() {
                    return Err(LedgerError::TransferPinAlreadySet { user });
                }
                profile.transfer_pin = Some(pin.to_string());
                profile.pin_created_at = Some(created_at);
                Ok(())
            }
            None => Err(LedgerError::UserNotFound { user }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountStatus, AccountType};
    use rust_decimal::Decimal;

    fn draft(number: &str, owner: UserId) -> AccountDraft {
        AccountDraft {
            account_number: number.to_string(),
            account_type: AccountType::Savings,
            opening_balance: Decimal::ZERO,
            owner,
        }
    }

    #[test]
    fn test_insert_assigns_ascending_ids() {
        let directory = InMemoryDirectory::new();

        let first = directory.insert_account(draft("1000000001", 1)).unwrap();
        let second = directory.insert_account(draft("1000000002", 1)).unwrap();

        assert!(first.id < second.id);
        assert_eq!(
            directory.find_account_by_number("1000000002").unwrap().id,
            second.id
        );
    }

    #[test]
    fn test_insert_rejects_duplicate_number() {
        let directory = InMemoryDirectory::new();
        directory.insert_account(draft("1000000001", 1)).unwrap();

        let result = directory.insert_account(draft("1000000001", 2));

        assert!(matches!(
            result,
            Err(LedgerError::DuplicateAccountNumber { .. })
        ));
        assert_eq!(directory.all_accounts().len(), 1);
    }

    #[test]
    fn test_register_user_rejects_duplicate_phone() {
        let directory = InMemoryDirectory::new();
        directory
            .register_user(UserProfile::new(1, "+15550001"))
            .unwrap();

        let result = directory.register_user(UserProfile::new(2, "+15550001"));

        assert!(matches!(result, Err(LedgerError::DuplicateUser { .. })));
        assert!(!directory.user_exists(2));
    }

    #[test]
    fn test_register_user_rejects_duplicate_id_and_releases_phone() {
        let directory = InMemoryDirectory::new();
        directory
            .register_user(UserProfile::new(1, "+15550001"))
            .unwrap();

        let result = directory.register_user(UserProfile::new(1, "+15550002"));

        assert!(result.is_err());
        assert!(directory.find_user_by_phone("+15550002").is_none());
    }

    #[test]
    fn test_active_accounts_by_phone_are_oldest_first() {
        let directory = InMemoryDirectory::new();
        directory
            .register_user(UserProfile::new(1, "+15550001"))
            .unwrap();
        let first = directory.insert_account(draft("1000000001", 1)).unwrap();
        let mut second = directory.insert_account(draft("1000000002", 1)).unwrap();
        let third = directory.insert_account(draft("1000000003", 1)).unwrap();

        second.status = AccountStatus::Blocked;
        directory.save_account(&second).unwrap();

        let active: Vec<AccountId> = directory
            .find_active_accounts_by_phone("+15550001")
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(active, vec![first.id, third.id]);
        assert_eq!(directory.find_accounts_by_phone("+15550001").len(), 3);
        assert!(directory.find_active_accounts_by_phone("+19999999").is_empty());
    }

    #[test]
    fn test_store_transfer_pin_only_once() {
        let directory = InMemoryDirectory::new();
        directory
            .register_user(UserProfile::new(1, "+15550001"))
            .unwrap();

        directory.store_transfer_pin(1, "123456", Utc::now()).unwrap();
        let second = directory.store_transfer_pin(1, "654321", Utc::now());

        assert_eq!(second, Err(LedgerError::TransferPinAlreadySet { user: 1 }));
        assert_eq!(
            directory.find_user(1).unwrap().transfer_pin.as_deref(),
            Some("123456")
        );
    }

    #[test]
    fn test_store_transfer_pin_unknown_user() {
        let directory = InMemoryDirectory::new();

        let result = directory.store_transfer_pin(9, "123456", Utc::now());

        assert_eq!(result, Err(LedgerError::UserNotFound { user: 9 }));
    }

    #[test]
    fn test_save_unknown_account_fails() {
        let directory = InMemoryDirectory::new();
        let account = Account::new(
            42,
            "1000000042".to_string(),
            AccountType::Current,
            Decimal::ZERO,
            1,
        );

        assert!(directory.save_account(&account).is_err());
    }
}
