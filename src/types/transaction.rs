//! Transaction-related types for the banking ledger
//!
//! This module defines the transaction record kept by the transaction log,
//! its closed type and status enumerations, and the draft used to create one.

use super::account::{Account, AccountId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Internal transaction identifier assigned by the log
pub type TransactionId = u64;

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    /// Credit-only movement into one account
    Deposit,

    /// Debit-only movement out of one account
    Withdrawal,

    /// Debit of a source account and credit of a distinct destination account
    Transfer,

    /// Outgoing payment to a party outside the bank
    Payment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Payment => "PAYMENT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "TRANSFER" => Ok(TransactionType::Transfer),
            "PAYMENT" => Ok(TransactionType::Payment),
            other => Err(format!("Unknown transaction type '{}'", other)),
        }
    }
}

/// Status of a transaction record
///
/// Records are created `Pending` and move exactly once to one of the
/// terminal statuses, after which they are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            TransactionStatus::Pending => false,
            TransactionStatus::Completed
            | TransactionStatus::Failed
            | TransactionStatus::Cancelled => true,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            other => Err(format!("Unknown transaction status '{}'", other)),
        }
    }
}

/// How the caller addressed the recipient of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Phone(String),
    AccountNumber(String),
}

impl Recipient {
    pub fn as_str(&self) -> &str {
        match self {
            Recipient::Phone(phone) => phone,
            Recipient::AccountNumber(number) => number,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Phone(phone) => write!(f, "phone {}", phone),
            Recipient::AccountNumber(number) => write!(f, "account {}", number),
        }
    }
}

/// Reference from a transaction to one of the accounts it touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub id: AccountId,
    pub account_number: String,
}

impl From<&Account> for AccountRef {
    fn from(account: &Account) -> Self {
        AccountRef {
            id: account.id,
            account_number: account.account_number.clone(),
        }
    }
}

/// Everything needed to record a new transaction
///
/// The log fills in the identifiers, the timestamp and the `Pending` status.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub from_account: Option<AccountRef>,
    pub to_account: Option<AccountRef>,
    pub recipient: Option<Recipient>,
}

/// A recorded money-movement attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Internal identifier
    pub id: TransactionId,

    /// Unique human-facing identifier (`TXN` followed by a ULID)
    pub transaction_id: String,

    pub tx_type: TransactionType,

    /// Strictly positive amount with two decimal places
    pub amount: Decimal,

    /// Free text, with the failure reason appended when the record failed
    pub description: String,

    pub status: TransactionStatus,

    /// When the record was created
    pub timestamp: DateTime<Utc>,

    pub from_account: Option<AccountRef>,
    pub to_account: Option<AccountRef>,

    /// Recipient descriptor used for resolution, for transfers only
    pub recipient: Option<Recipient>,
}

impl Transaction {
    /// Whether this record has the given account as source or destination
    pub fn touches(&self, account: AccountId) -> bool {
        self.from_account.as_ref().is_some_and(|r| r.id == account)
            || self.to_account.as_ref().is_some_and(|r| r.id == account)
    }
}

/// One window of a paged history query
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Zero-based page index
    pub page: usize,

    /// Requested page size
    pub size: usize,

    pub total_elements: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.page + 1 >= self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(from: Option<AccountId>, to: Option<AccountId>) -> Transaction {
        let reference = |id: AccountId| AccountRef {
            id,
            account_number: format!("{:010}", id),
        };
        Transaction {
            id: 1,
            transaction_id: "TXN01".to_string(),
            tx_type: TransactionType::Transfer,
            amount: Decimal::new(100, 2),
            description: "test".to_string(),
            status: TransactionStatus::Pending,
            timestamp: Utc::now(),
            from_account: from.map(reference),
            to_account: to.map(reference),
            recipient: None,
        }
    }

    #[rstest]
    #[case::source(Some(1), Some(2), 1, true)]
    #[case::destination(Some(1), Some(2), 2, true)]
    #[case::unrelated(Some(1), Some(2), 3, false)]
    #[case::deposit_only(None, Some(2), 2, true)]
    #[case::withdrawal_only(Some(1), None, 2, false)]
    fn test_touches(
        #[case] from: Option<AccountId>,
        #[case] to: Option<AccountId>,
        #[case] account: AccountId,
        #[case] expected: bool,
    ) {
        assert_eq!(record(from, to).touches(account), expected);
    }

    #[rstest]
    #[case(TransactionStatus::Pending, false)]
    #[case(TransactionStatus::Completed, true)]
    #[case(TransactionStatus::Failed, true)]
    #[case(TransactionStatus::Cancelled, true)]
    fn test_terminal_statuses(#[case] status: TransactionStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn test_type_parsing_is_case_insensitive() {
        assert_eq!(
            "transfer".parse::<TransactionType>().unwrap(),
            TransactionType::Transfer
        );
        assert_eq!(
            "Completed".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Completed
        );
        assert!("refund".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_page_is_last() {
        let page = Page::<u32> {
            items: vec![],
            page: 1,
            size: 10,
            total_elements: 20,
            total_pages: 2,
        };
        assert!(page.is_last());
    }
}
