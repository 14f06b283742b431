//! Account-related types for the banking ledger
//!
//! This module defines the Account structure together with its closed
//! type and status enumerations.

use super::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Internal account identifier
///
/// Assigned sequentially by the account directory, so ascending ids also
/// reflect creation order. Used as the global lock order for transfers.
pub type AccountId = u64;

/// Kind of product an account represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountType {
    Savings,
    Current,
    FixedDeposit,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "SAVINGS",
            AccountType::Current => "CURRENT",
            AccountType::FixedDeposit => "FIXED_DEPOSIT",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SAVINGS" => Ok(AccountType::Savings),
            "CURRENT" => Ok(AccountType::Current),
            "FIXED_DEPOSIT" => Ok(AccountType::FixedDeposit),
            other => Err(format!("Unknown account type '{}'", other)),
        }
    }
}

/// Lifecycle status of an account
///
/// Only `Active` accounts accept debits and credits. `Closed` is terminal:
/// once an account is closed no further status change is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountStatus {
    Active,
    Inactive,
    Blocked,
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
            AccountStatus::Blocked => "BLOCKED",
            AccountStatus::Closed => "CLOSED",
        }
    }

    /// Whether no further transition is possible from this status
    pub fn is_terminal(&self) -> bool {
        match self {
            AccountStatus::Closed => true,
            AccountStatus::Active | AccountStatus::Inactive | AccountStatus::Blocked => false,
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(AccountStatus::Active),
            "INACTIVE" => Ok(AccountStatus::Inactive),
            "BLOCKED" => Ok(AccountStatus::Blocked),
            "CLOSED" => Ok(AccountStatus::Closed),
            other => Err(format!("Unknown account status '{}'", other)),
        }
    }
}

/// A customer account as held by the ledger
///
/// The balance field is only ever written by the [`Ledger`](crate::core::Ledger);
/// every other component works on snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Internal identifier (creation ordered)
    pub id: AccountId,

    /// Human-facing account number, globally unique
    pub account_number: String,

    pub account_type: AccountType,

    /// Current balance, fixed-point with two decimal places, never negative
    pub balance: Decimal,

    pub status: AccountStatus,

    /// The user owning this account
    pub owner: UserId,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new ACTIVE account with the given opening balance
    ///
    /// # Arguments
    ///
    /// * `id` - Internal identifier assigned by the directory
    /// * `account_number` - Unique human-facing account number
    /// * `account_type` - Product type of the account
    /// * `opening_balance` - Initial balance (caller validated, non-negative)
    /// * `owner` - The owning user
    pub fn new(
        id: AccountId,
        account_number: String,
        account_type: AccountType,
        opening_balance: Decimal,
        owner: UserId,
    ) -> Self {
        let now = Utc::now();
        Account {
            id,
            account_number,
            account_type,
            balance: opening_balance,
            status: AccountStatus::Active,
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Fields supplied when opening an account
///
/// The directory assigns the id and the timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDraft {
    pub account_number: String,
    pub account_type: AccountType,
    pub opening_balance: Decimal,
    pub owner: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("savings", AccountType::Savings)]
    #[case("CURRENT", AccountType::Current)]
    #[case(" fixed_deposit ", AccountType::FixedDeposit)]
    fn test_account_type_parsing(#[case] input: &str, #[case] expected: AccountType) {
        assert_eq!(input.parse::<AccountType>().unwrap(), expected);
    }

    #[rstest]
    #[case("active", AccountStatus::Active)]
    #[case("Inactive", AccountStatus::Inactive)]
    #[case("BLOCKED", AccountStatus::Blocked)]
    #[case("closed", AccountStatus::Closed)]
    fn test_account_status_parsing(#[case] input: &str, #[case] expected: AccountStatus) {
        assert_eq!(input.parse::<AccountStatus>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("frozen".parse::<AccountStatus>().is_err());
        assert!("checking".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_only_closed_is_terminal() {
        assert!(AccountStatus::Closed.is_terminal());
        assert!(!AccountStatus::Active.is_terminal());
        assert!(!AccountStatus::Inactive.is_terminal());
        assert!(!AccountStatus::Blocked.is_terminal());
    }

    #[test]
    fn test_new_account_is_active() {
        let account = Account::new(
            1,
            "1000000001".to_string(),
            AccountType::Savings,
            Decimal::new(10000, 2),
            7,
        );

        assert!(account.is_active());
        assert_eq!(account.balance, Decimal::new(10000, 2));
        assert_eq!(account.owner, 7);
        assert_eq!(account.created_at, account.updated_at);
    }
}
