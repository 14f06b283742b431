//! Append-only log of money-movement attempts
//!
//! This module provides the `TransactionLog`, which stores every deposit,
//! withdrawal and transfer attempt together with its outcome, and answers the
//! history queries over them.
//!
//! # Lifecycle
//!
//! A record is created `PENDING` by [`TransactionLog::record`] and moves
//! exactly once to `COMPLETED`, `FAILED` or `CANCELLED`. A second transition
//! is rejected and leaves the record as it was. Records are never removed.
//!
//! # Identifiers
//!
//! Besides its internal sequence number every record gets an external id,
//! `TXN` followed by a ULID. The log refuses to store two records with the
//! same external id.

use crate::types::{
    validate_amount, AccountId, LedgerError, Page, Transaction, TransactionDraft, TransactionId,
    TransactionStatus, TransactionType,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use ulid::Ulid;

/// Prefix of every external transaction id
pub const TRANSACTION_ID_PREFIX: &str = "TXN";

/// Thread-safe transaction history
#[derive(Debug)]
pub struct TransactionLog {
    records: DashMap<TransactionId, Transaction>,

    /// external id -> internal id
    external_ids: DashMap<String, TransactionId>,

    next_id: AtomicU64,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            external_ids: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a new PENDING record under a freshly generated external id
    ///
    /// # Arguments
    ///
    /// * `draft` - Type, amount, description and account references
    ///
    /// # Returns
    ///
    /// * `Ok(Transaction)` - The stored record, with ids and timestamp filled in
    /// * `Err(LedgerError::InvalidAmount)` - If the amount is not strictly positive
    /// * `Err(LedgerError::DuplicateTransactionId)` - If the generated id clashes
    pub fn record(&self, draft: TransactionDraft) -> Result<Transaction, LedgerError> {
        self.record_with_transaction_id(draft, generate_transaction_id())
    }

    /// Store a new PENDING record under a caller-supplied external id
    ///
    /// Used when importing records that already carry an id.
    pub fn record_with_transaction_id(
        &self,
        draft: TransactionDraft,
        transaction_id: String,
    ) -> Result<Transaction, LedgerError> {
        let amount = validate_amount(draft.amount)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut claimed = false;
        self.external_ids
            .entry(transaction_id.clone())
            .or_insert_with(|| {
                claimed = true;
                id
            });
        if !claimed {
            return Err(LedgerError::DuplicateTransactionId {
                transaction: transaction_id,
            });
        }

        let transaction = Transaction {
            id,
            transaction_id,
            tx_type: draft.tx_type,
            amount,
            description: draft.description,
            status: TransactionStatus::Pending,
            timestamp: Utc::now(),
            from_account: draft.from_account,
            to_account: draft.to_account,
            recipient: draft.recipient,
        };
        self.records.insert(id, transaction.clone());

        debug!(
            transaction = %transaction.transaction_id,
            tx_type = %transaction.tx_type,
            amount = %transaction.amount,
            "Transaction recorded"
        );
        Ok(transaction)
    }

    /// Mark a PENDING record as COMPLETED
    pub fn complete(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.finish(id, TransactionStatus::Completed, None)
    }

    /// Mark a PENDING record as FAILED, appending the reason to its description
    pub fn fail(&self, id: TransactionId, reason: &str) -> Result<Transaction, LedgerError> {
        self.finish(id, TransactionStatus::Failed, Some(reason))
    }

    /// Mark a PENDING record as CANCELLED, appending the reason to its description
    pub fn cancel(&self, id: TransactionId, reason: &str) -> Result<Transaction, LedgerError> {
        self.finish(id, TransactionStatus::Cancelled, Some(reason))
    }

    fn finish(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        reason: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or_else(|| LedgerError::transaction_not_found(id.to_string()))?;
        let record = entry.value_mut();

        if record.status.is_terminal() {
            return Err(LedgerError::TransactionAlreadyFinal {
                transaction: record.transaction_id.clone(),
                status: record.status,
            });
        }

        if let Some(reason) = reason {
            let label = match status {
                TransactionStatus::Cancelled => "Cancelled",
                TransactionStatus::Pending
                | TransactionStatus::Completed
                | TransactionStatus::Failed => "Failed",
            };
            record.description = format!("{} - {}: {}", record.description, label, reason);
        }
        record.status = status;

        debug!(transaction = %record.transaction_id, status = %status, "Transaction finished");
        Ok(record.clone())
    }

    pub fn find_by_id(&self, id: TransactionId) -> Option<Transaction> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// Look up a record by its external id
    pub fn find_by_transaction_id(&self, transaction_id: &str) -> Option<Transaction> {
        let id = self
            .external_ids
            .get(transaction_id)
            .map(|entry| *entry.value())?;
        self.find_by_id(id)
    }

    /// Every record, in the order they were recorded
    pub fn all(&self) -> Vec<Transaction> {
        let mut records = self.collect(|_| true);
        records.sort_by_key(|t| t.id);
        records
    }

    /// Records with the given status, newest first
    pub fn by_status(&self, status: TransactionStatus) -> Vec<Transaction> {
        newest_first(self.collect(|t| t.status == status))
    }

    /// Records of the given type, newest first
    pub fn by_type(&self, tx_type: TransactionType) -> Vec<Transaction> {
        newest_first(self.collect(|t| t.tx_type == tx_type))
    }

    /// Every record with the account as source or destination, newest first
    pub fn history_for_account(&self, account: AccountId) -> Vec<Transaction> {
        newest_first(self.collect(|t| t.touches(account)))
    }

    /// Records touching any of the given accounts, newest first
    ///
    /// A transfer between two of the accounts appears once.
    pub fn history_for_accounts(&self, accounts: &[AccountId]) -> Vec<Transaction> {
        newest_first(self.collect(|t| accounts.iter().any(|a| t.touches(*a))))
    }

    /// One page of an account's history, newest first
    ///
    /// # Arguments
    ///
    /// * `account` - Account whose history is requested
    /// * `page` - Zero-based page index
    /// * `size` - Page size; zero or negative returns the whole history as one page
    pub fn history_page(&self, account: AccountId, page: usize, size: i64) -> Page<Transaction> {
        paginate(self.history_for_account(account), page, size)
    }

    /// Records touching the account with a timestamp in `[from, to]`, newest first
    pub fn by_account_and_date_range(
        &self,
        account: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Transaction> {
        newest_first(
            self.collect(|t| t.touches(account) && t.timestamp >= from && t.timestamp <= to),
        )
    }

    /// COMPLETED records with a timestamp in `[from, to]`, newest first
    pub fn completed_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Transaction> {
        newest_first(self.collect(|t| {
            t.status == TransactionStatus::Completed && t.timestamp >= from && t.timestamp <= to
        }))
    }

    /// Number of records with the account as source or destination
    pub fn count_for_account(&self, account: AccountId) -> usize {
        self.records
            .iter()
            .filter(|entry| entry.value().touches(account))
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn collect<F>(&self, predicate: F) -> Vec<Transaction>
    where
        F: Fn(&Transaction) -> bool,
    {
        self.records
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a fresh external transaction id
pub fn generate_transaction_id() -> String {
    format!("{}{}", TRANSACTION_ID_PREFIX, Ulid::new())
}

fn newest_first(mut records: Vec<Transaction>) -> Vec<Transaction> {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    records
}

fn paginate(records: Vec<Transaction>, page: usize, size: i64) -> Page<Transaction> {
    let total_elements = records.len();

    if size <= 0 {
        return Page {
            items: records,
            page: 0,
            size: total_elements,
            total_elements,
            total_pages: usize::from(total_elements > 0),
        };
    }

    let size = usize::try_from(size).unwrap_or(usize::MAX);
    let total_pages = total_elements.div_ceil(size);
    let items = records
        .into_iter()
        .skip(page.saturating_mul(size))
        .take(size)
        .collect();

    Page {
        items,
        page,
        size,
        total_elements,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountRef, ErrorKind, Recipient};
    use chrono::Duration;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn account(id: AccountId) -> AccountRef {
        AccountRef {
            id,
            account_number: format!("{:010}", id),
        }
    }

    fn transfer(from: AccountId, to: AccountId, amount: Decimal) -> TransactionDraft {
        TransactionDraft {
            tx_type: TransactionType::Transfer,
            amount,
            description: "Money transfer".to_string(),
            from_account: Some(account(from)),
            to_account: Some(account(to)),
            recipient: Some(Recipient::AccountNumber(format!("{:010}", to))),
        }
    }

    fn deposit(to: AccountId, amount: Decimal) -> TransactionDraft {
        TransactionDraft {
            tx_type: TransactionType::Deposit,
            amount,
            description: "Cash deposit".to_string(),
            from_account: None,
            to_account: Some(account(to)),
            recipient: None,
        }
    }

    #[test]
    fn test_record_creates_pending_with_external_id() {
        let log = TransactionLog::new();

        let tx = log.record(deposit(1, dec!(500))).unwrap();

        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.amount.to_string(), "500.00");
        assert!(tx.transaction_id.starts_with(TRANSACTION_ID_PREFIX));
        assert_eq!(tx.transaction_id.len(), TRANSACTION_ID_PREFIX.len() + 26);
        assert_eq!(log.find_by_transaction_id(&tx.transaction_id), Some(tx));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let log = TransactionLog::new();

        for _ in 0..1000 {
            log.record(deposit(1, dec!(1))).unwrap();
        }

        assert_eq!(log.len(), 1000);
    }

    #[test]
    fn test_duplicate_external_id_is_conflict() {
        let log = TransactionLog::new();
        log.record_with_transaction_id(deposit(1, dec!(1)), "TXN1".to_string())
            .unwrap();

        let result = log.record_with_transaction_id(deposit(2, dec!(2)), "TXN1".to_string());

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict);
        assert_eq!(log.len(), 1);
        assert_eq!(log.find_by_transaction_id("TXN1").unwrap().amount, dec!(1.00));
    }

    #[rstest]
    #[case::zero(dec!(0))]
    #[case::negative(dec!(-5))]
    fn test_record_rejects_non_positive_amount(#[case] amount: Decimal) {
        let log = TransactionLog::new();

        let result = log.record(deposit(1, amount));

        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidAmount);
        assert!(log.is_empty());
    }

    #[test]
    fn test_fail_appends_reason() {
        let log = TransactionLog::new();
        let tx = log.record(transfer(1, 2, dec!(150))).unwrap();

        let failed = log.fail(tx.id, "Insufficient funds").unwrap();

        assert_eq!(failed.status, TransactionStatus::Failed);
        assert_eq!(failed.description, "Money transfer - Failed: Insufficient funds");
    }

    #[test]
    fn test_cancel_appends_reason() {
        let log = TransactionLog::new();
        let tx = log.record(transfer(1, 2, dec!(1))).unwrap();

        let cancelled = log.cancel(tx.id, "customer request").unwrap();

        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert_eq!(cancelled.description, "Money transfer - Cancelled: customer request");
    }

    #[test]
    fn test_terminal_transition_happens_once() {
        let log = TransactionLog::new();
        let tx = log.record(deposit(1, dec!(10))).unwrap();
        log.complete(tx.id).unwrap();

        let again = log.fail(tx.id, "late failure");

        assert!(matches!(
            again,
            Err(LedgerError::TransactionAlreadyFinal {
                status: TransactionStatus::Completed,
                ..
            })
        ));
        let stored = log.find_by_id(tx.id).unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
        assert_eq!(stored.description, "Cash deposit");
    }

    #[test]
    fn test_finish_unknown_record() {
        let log = TransactionLog::new();

        assert_eq!(log.complete(42).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_history_merges_both_roles_newest_first() {
        let log = TransactionLog::new();
        let first = log.record(deposit(1, dec!(100))).unwrap();
        let second = log.record(transfer(1, 2, dec!(10))).unwrap();
        let third = log.record(transfer(2, 1, dec!(5))).unwrap();
        log.record(deposit(3, dec!(1))).unwrap();

        let ids: Vec<TransactionId> = log.history_for_account(1).iter().map(|t| t.id).collect();

        assert_eq!(ids, vec![third.id, second.id, first.id]);
        assert_eq!(log.count_for_account(1), 3);
        assert_eq!(log.count_for_account(2), 2);
        assert_eq!(log.history_for_accounts(&[1, 2]).len(), 3);
    }

    #[test]
    fn test_status_and_type_queries() {
        let log = TransactionLog::new();
        let a = log.record(deposit(1, dec!(1))).unwrap();
        let b = log.record(transfer(1, 2, dec!(1))).unwrap();
        log.complete(a.id).unwrap();
        log.fail(b.id, "x").unwrap();

        assert_eq!(log.by_status(TransactionStatus::Completed)[0].id, a.id);
        assert_eq!(log.by_status(TransactionStatus::Failed)[0].id, b.id);
        assert!(log.by_status(TransactionStatus::Pending).is_empty());
        assert_eq!(log.by_type(TransactionType::Transfer).len(), 1);
        assert_eq!(log.all().iter().map(|t| t.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }

    #[rstest]
    #[case::first_page(0, 2, 2, 3)]
    #[case::last_partial_page(2, 2, 1, 3)]
    #[case::past_the_end(5, 2, 0, 3)]
    #[case::unpaged_zero(0, 0, 5, 1)]
    #[case::unpaged_negative(3, -1, 5, 1)]
    fn test_history_page(
        #[case] page: usize,
        #[case] size: i64,
        #[case] expected_items: usize,
        #[case] expected_pages: usize,
    ) {
        let log = TransactionLog::new();
        for _ in 0..5 {
            log.record(deposit(1, dec!(1))).unwrap();
        }

        let result = log.history_page(1, page, size);

        assert_eq!(result.items.len(), expected_items);
        assert_eq!(result.total_elements, 5);
        assert_eq!(result.total_pages, expected_pages);
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let log = TransactionLog::new();
        let tx = log.record(deposit(1, dec!(1))).unwrap();
        log.complete(tx.id).unwrap();

        let exact = log.by_account_and_date_range(1, tx.timestamp, tx.timestamp);
        let earlier = log.by_account_and_date_range(
            1,
            tx.timestamp - Duration::hours(2),
            tx.timestamp - Duration::hours(1),
        );

        assert_eq!(exact.len(), 1);
        assert!(earlier.is_empty());
        assert_eq!(
            log.completed_between(tx.timestamp, tx.timestamp + Duration::seconds(1))
                .len(),
            1
        );
    }
}
