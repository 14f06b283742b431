//! Authoritative account balances and status
//!
//! This module provides the `Ledger`, the only component allowed to change
//! an account's balance or status. Accounts live in an [`AccountDirectory`];
//! the ledger adds the invariant checks and the mutual exclusion around them.
//!
//! # Design
//!
//! Every mutation takes an exclusive per-account lock, then reloads the
//! account from the directory, checks it, and writes it back before the lock
//! is released. Two debits of the same account can therefore never both pass
//! the sufficient-funds check against the same balance.
//!
//! Transfers between two accounts go through [`Ledger::transfer_funds`], which
//! holds both locks for the whole unit of work. Locks are always acquired in
//! ascending account id order, so opposite-direction transfers cannot deadlock.

use crate::core::traits::AccountDirectory;
use crate::types::{
    validate_amount, validate_opening_balance, Account, AccountDraft, AccountId, AccountStatus,
    AccountType, LedgerError, UserId,
};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Generated account numbers have exactly this many digits
const ACCOUNT_NUMBER_DIGITS: u32 = 10;

/// Attempts at drawing an unused account number before giving up
const MAX_NUMBER_ATTEMPTS: usize = 16;

/// Balance and status owner for every account
pub struct Ledger {
    directory: Arc<dyn AccountDirectory>,

    /// One exclusive lock per account id, created on first use
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl Ledger {
    /// Create a ledger over the given account directory
    pub fn new(directory: Arc<dyn AccountDirectory>) -> Self {
        Self {
            directory,
            locks: DashMap::new(),
        }
    }

    /// Open a new ACTIVE account with a generated account number
    ///
    /// # Arguments
    ///
    /// * `owner` - The user owning the account, who must exist
    /// * `account_type` - Product type of the account
    /// * `opening_balance` - Initial balance, zero or positive
    ///
    /// # Returns
    ///
    /// * `Ok(Account)` - The stored account
    /// * `Err(LedgerError::UserNotFound)` - If the owner is unknown
    /// * `Err(LedgerError::InvalidAmount)` - If the opening balance is negative
    ///   or has more than two decimal places
    pub fn open_account(
        &self,
        owner: UserId,
        account_type: AccountType,
        opening_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        let opening_balance = self.check_new_account(owner, opening_balance)?;

        let mut rng = rand::thread_rng();
        let low = 10u64.pow(ACCOUNT_NUMBER_DIGITS - 1);
        let high = 10u64.pow(ACCOUNT_NUMBER_DIGITS);

        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let account_number = rng.gen_range(low..high).to_string();
            if self.directory.account_exists(&account_number) {
                continue;
            }

            let draft = AccountDraft {
                account_number,
                account_type,
                opening_balance,
                owner,
            };
            match self.directory.insert_account(draft) {
                Ok(account) => {
                    info!(
                        account = %account.account_number,
                        owner,
                        account_type = %account_type,
                        balance = %account.balance,
                        "Account opened"
                    );
                    return Ok(account);
                }
                // Lost a race for the number; draw another one.
                Err(LedgerError::DuplicateAccountNumber { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(LedgerError::storage(
            "could not allocate a unique account number",
        ))
    }

    /// Open a new ACTIVE account under a caller-chosen account number
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::open_account`], plus `DuplicateAccountNumber` if the
    /// number is already in use.
    pub fn open_account_with_number(
        &self,
        account_number: &str,
        owner: UserId,
        account_type: AccountType,
        opening_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        let opening_balance = self.check_new_account(owner, opening_balance)?;

        let account = self.directory.insert_account(AccountDraft {
            account_number: account_number.to_string(),
            account_type,
            opening_balance,
            owner,
        })?;

        info!(
            account = %account.account_number,
            owner,
            account_type = %account_type,
            balance = %account.balance,
            "Account opened"
        );
        Ok(account)
    }

    fn check_new_account(
        &self,
        owner: UserId,
        opening_balance: Decimal,
    ) -> Result<Decimal, LedgerError> {
        if !self.directory.user_exists(owner) {
            return Err(LedgerError::UserNotFound { user: owner });
        }
        validate_opening_balance(opening_balance)
    }

    /// Look up an account by its number
    pub fn account_by_number(&self, account_number: &str) -> Result<Account, LedgerError> {
        self.directory
            .find_account_by_number(account_number)
            .ok_or_else(|| LedgerError::account_not_found(account_number))
    }

    pub fn account_by_id(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.directory
            .find_account_by_id(id)
            .ok_or_else(|| LedgerError::account_not_found(id.to_string()))
    }

    /// Resolve a recipient given by account number, in any status
    pub fn resolve_by_account_number(&self, account_number: &str) -> Result<Account, LedgerError> {
        self.account_by_number(account_number)
    }

    /// Resolve a recipient given by phone number
    ///
    /// When the user behind the phone number holds several ACTIVE accounts,
    /// the oldest one is chosen.
    ///
    /// # Returns
    ///
    /// * `Ok(Account)` - The oldest ACTIVE account of the phone's owner
    /// * `Err(LedgerError::NoActiveAccountForPhone)` - If there is none
    pub fn resolve_by_phone(&self, phone_number: &str) -> Result<Account, LedgerError> {
        self.directory
            .find_active_accounts_by_phone(phone_number)
            .into_iter()
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .ok_or_else(|| LedgerError::NoActiveAccountForPhone {
                phone: phone_number.to_string(),
            })
    }

    pub fn balance(&self, account_number: &str) -> Result<Decimal, LedgerError> {
        Ok(self.account_by_number(account_number)?.balance)
    }

    pub fn accounts_for_owner(&self, owner: UserId) -> Vec<Account> {
        self.directory.find_accounts_by_owner(owner)
    }

    pub fn accounts_by_status(&self, status: AccountStatus) -> Vec<Account> {
        self.all_accounts()
            .into_iter()
            .filter(|a| a.status == status)
            .collect()
    }

    pub fn accounts_by_type(&self, account_type: AccountType) -> Vec<Account> {
        self.all_accounts()
            .into_iter()
            .filter(|a| a.account_type == account_type)
            .collect()
    }

    /// All accounts, sorted by account number
    pub fn all_accounts(&self) -> Vec<Account> {
        let mut accounts = self.directory.all_accounts();
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        accounts
    }

    /// Take money out of an account
    ///
    /// # Arguments
    ///
    /// * `account_number` - The account to debit
    /// * `amount` - Strictly positive amount with at most two decimal places
    ///
    /// # Returns
    ///
    /// * `Ok(Decimal)` - The balance after the debit
    /// * `Err(LedgerError::AccountNotFound)` - Unknown account
    /// * `Err(LedgerError::AccountNotActive)` - Account status is not ACTIVE
    /// * `Err(LedgerError::InsufficientFunds)` - Balance is below `amount`
    pub fn debit(&self, account_number: &str, amount: Decimal) -> Result<Decimal, LedgerError> {
        let amount = validate_amount(amount)?;
        let id = self.account_by_number(account_number)?.id;

        let balance = self.with_account(id, |account| {
            ensure_active(account)?;
            account.balance = debited(account, amount)?;
            Ok(account.balance)
        })?;

        info!(account = %account_number, %amount, %balance, "Account debited");
        Ok(balance)
    }

    /// Put money into an account
    ///
    /// # Returns
    ///
    /// * `Ok(Decimal)` - The balance after the credit
    /// * `Err(LedgerError::AccountNotFound)` - Unknown account
    /// * `Err(LedgerError::AccountNotActive)` - Account status is not ACTIVE
    pub fn credit(&self, account_number: &str, amount: Decimal) -> Result<Decimal, LedgerError> {
        let amount = validate_amount(amount)?;
        let id = self.account_by_number(account_number)?.id;

        let balance = self.with_account(id, |account| {
            ensure_active(account)?;
            account.balance = credited(account, amount)?;
            Ok(account.balance)
        })?;

        info!(account = %account_number, %amount, %balance, "Account credited");
        Ok(balance)
    }

    /// Move money between two accounts as one unit of work
    ///
    /// Both accounts are locked (lower id first), both are checked, and only
    /// then are both written. If storage rejects the second write, the first
    /// is restored before the error is returned, so no caller can ever observe
    /// a debit without its credit.
    ///
    /// # Returns
    ///
    /// * `Ok((source, destination))` - Snapshots after the move
    /// * `Err(LedgerError::SelfTransfer)` - Source and destination are the same
    /// * `Err(LedgerError::AccountNotActive)` - Either side is not ACTIVE
    /// * `Err(LedgerError::InsufficientFunds)` - Source balance below `amount`
    pub fn transfer_funds(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
    ) -> Result<(Account, Account), LedgerError> {
        let amount = validate_amount(amount)?;

        let (first, second) = if source < destination {
            (source, destination)
        } else if source > destination {
            (destination, source)
        } else {
            let account = self.account_by_id(source)?;
            return Err(LedgerError::SelfTransfer {
                account: account.account_number,
            });
        };

        let first_lock = self.lock_for(first);
        let second_lock = self.lock_for(second);
        let _first_guard = first_lock.lock();
        let _second_guard = second_lock.lock();

        let original_source = self.account_by_id(source)?;
        let original_destination = self.account_by_id(destination)?;
        ensure_active(&original_source)?;
        ensure_active(&original_destination)?;

        let now = Utc::now();
        let mut updated_source = original_source.clone();
        updated_source.balance = debited(&original_source, amount)?;
        updated_source.updated_at = now;

        let mut updated_destination = original_destination.clone();
        updated_destination.balance = credited(&original_destination, amount)?;
        updated_destination.updated_at = now;

        self.directory.save_account(&updated_source)?;
        if let Err(e) = self.directory.save_account(&updated_destination) {
            if let Err(restore) = self.directory.save_account(&original_source) {
                error!(
                    account = %original_source.account_number,
                    error = %restore,
                    "Failed to restore source balance after rejected credit"
                );
                return Err(LedgerError::storage(format!(
                    "credit of {} failed ({}) and debit of {} could not be restored ({})",
                    original_destination.account_number,
                    e,
                    original_source.account_number,
                    restore
                )));
            }
            warn!(
                source = %original_source.account_number,
                destination = %original_destination.account_number,
                error = %e,
                "Transfer rolled back"
            );
            return Err(e);
        }

        info!(
            source = %updated_source.account_number,
            destination = %updated_destination.account_number,
            %amount,
            "Funds transferred"
        );
        Ok((updated_source, updated_destination))
    }

    /// Close an account
    ///
    /// Closing is a soft delete: the account stays in the directory with
    /// status CLOSED and accepts no further changes.
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` - Unknown account
    /// * `AccountClosed` - Already closed
    /// * `NonZeroBalance` - The balance is not exactly zero
    pub fn close(&self, id: AccountId) -> Result<Account, LedgerError> {
        let account = self.with_account(id, |account| {
            close_in_place(account)?;
            Ok(account.clone())
        })?;

        info!(account = %account.account_number, "Account closed");
        Ok(account)
    }

    /// Administrative status change
    ///
    /// Moving to CLOSED applies the same checks as [`Ledger::close`]. A closed
    /// account accepts no further status change.
    pub fn set_status(&self, id: AccountId, status: AccountStatus) -> Result<Account, LedgerError> {
        let account = self.with_account(id, |account| {
            if account.status.is_terminal() {
                return Err(LedgerError::AccountClosed {
                    account: account.account_number.clone(),
                });
            }
            if status.is_terminal() {
                close_in_place(account)?;
            } else {
                account.status = status;
            }
            Ok(account.clone())
        })?;

        info!(account = %account.account_number, status = %status, "Account status changed");
        Ok(account)
    }

    fn lock_for(&self, id: AccountId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().value().clone()
    }

    /// Run `f` on a fresh copy of the account while holding its lock, then
    /// persist the copy if `f` succeeded
    fn with_account<T, F>(&self, id: AccountId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Account) -> Result<T, LedgerError>,
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock();

        let mut account = self.account_by_id(id)?;
        let result = f(&mut account)?;
        account.updated_at = Utc::now();
        self.directory.save_account(&account)?;
        Ok(result)
    }
}

fn ensure_active(account: &Account) -> Result<(), LedgerError> {
    match account.status {
        AccountStatus::Active => Ok(()),
        AccountStatus::Inactive | AccountStatus::Blocked | AccountStatus::Closed => Err(
            LedgerError::account_not_active(account.account_number.clone(), account.status),
        ),
    }
}

fn debited(account: &Account, amount: Decimal) -> Result<Decimal, LedgerError> {
    if account.balance < amount {
        return Err(LedgerError::insufficient_funds(
            account.account_number.clone(),
            account.balance,
            amount,
        ));
    }
    account
        .balance
        .checked_sub(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("debit", account.account_number.clone()))
}

fn credited(account: &Account, amount: Decimal) -> Result<Decimal, LedgerError> {
    account
        .balance
        .checked_add(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("credit", account.account_number.clone()))
}

fn close_in_place(account: &mut Account) -> Result<(), LedgerError> {
    if account.status.is_terminal() {
        return Err(LedgerError::AccountClosed {
            account: account.account_number.clone(),
        });
    }
    if !account.balance.is_zero() {
        return Err(LedgerError::NonZeroBalance {
            account: account.account_number.clone(),
            balance: account.balance,
        });
    }
    account.status = AccountStatus::Closed;
    Ok(())
}
