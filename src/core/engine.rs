//! Banking engine
//!
//! This module provides the `BankingEngine`, the single entry point to the
//! ledger core. It wires the [`Ledger`], the [`TransactionLog`], the
//! [`PinSessions`], the [`AccountRequests`] workflow and the
//! [`TransferOrchestrator`] to the collaborator stores and exposes every
//! public operation.
//!
//! The engine is `Send + Sync`; share it behind an `Arc` between worker
//! threads. Every operation runs to completion on the calling thread.

use crate::config::LedgerConfig;
use crate::core::account_request::AccountRequests;
use crate::core::ledger::Ledger;
use crate::core::pin_session::{PinReaper, PinSessions, PinStatus};
use crate::core::traits::{AccountDirectory, ProfileStore};
use crate::core::transaction_log::TransactionLog;
use crate::core::transfer::{TransferOrchestrator, TransferRequest};
use crate::core::transfer_pin::TransferPins;
use crate::types::{
    Account, AccountRequest, AccountStatus, AccountType, LedgerError, Page, RequestId,
    RequestStatus, Transaction, TransactionId, TransactionStatus, TransactionType, UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Entry point to the ledger and transfer core
pub struct BankingEngine {
    directory: Arc<dyn AccountDirectory>,
    ledger: Arc<Ledger>,
    log: Arc<TransactionLog>,
    transfer_pins: Arc<TransferPins>,
    pin_sessions: Arc<PinSessions>,
    requests: AccountRequests,
    orchestrator: TransferOrchestrator,
    config: LedgerConfig,
}

impl BankingEngine {
    /// Create an engine over the given stores
    ///
    /// # Arguments
    ///
    /// * `directory` - Account storage and lookups
    /// * `profiles` - User profiles holding transfer PINs
    /// * `config` - PIN lifetimes and paging defaults
    pub fn new(
        directory: Arc<dyn AccountDirectory>,
        profiles: Arc<dyn ProfileStore>,
        config: LedgerConfig,
    ) -> Self {
        let ledger = Arc::new(Ledger::new(Arc::clone(&directory)));
        let log = Arc::new(TransactionLog::new());
        let transfer_pins = Arc::new(TransferPins::new(profiles));
        let pin_sessions = Arc::new(PinSessions::from_config(&config));
        let requests = AccountRequests::new(Arc::clone(&directory), Arc::clone(&ledger));
        let orchestrator = TransferOrchestrator::new(
            Arc::clone(&ledger),
            Arc::clone(&log),
            Arc::clone(&transfer_pins),
        );

        Self {
            directory,
            ledger,
            log,
            transfer_pins,
            pin_sessions,
            requests,
            orchestrator,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn transaction_log(&self) -> &Arc<TransactionLog> {
        &self.log
    }

    pub fn pin_sessions(&self) -> &Arc<PinSessions> {
        &self.pin_sessions
    }

    pub fn account_requests(&self) -> &AccountRequests {
        &self.requests
    }

    // ---- Accounts ----

    pub fn open_account(
        &self,
        owner: UserId,
        account_type: AccountType,
        opening_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        self.ledger.open_account(owner, account_type, opening_balance)
    }

    pub fn open_account_with_number(
        &self,
        account_number: &str,
        owner: UserId,
        account_type: AccountType,
        opening_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        self.ledger
            .open_account_with_number(account_number, owner, account_type, opening_balance)
    }

    pub fn account(&self, account_number: &str) -> Result<Account, LedgerError> {
        self.ledger.account_by_number(account_number)
    }

    pub fn balance(&self, account_number: &str) -> Result<Decimal, LedgerError> {
        self.ledger.balance(account_number)
    }

    pub fn accounts_for_owner(&self, owner: UserId) -> Vec<Account> {
        self.ledger.accounts_for_owner(owner)
    }

    /// Every account of the user registered with this phone number
    pub fn accounts_for_phone(&self, phone_number: &str) -> Vec<Account> {
        self.directory.find_accounts_by_phone(phone_number)
    }

    pub fn accounts_by_status(&self, status: AccountStatus) -> Vec<Account> {
        self.ledger.accounts_by_status(status)
    }

    pub fn accounts_by_type(&self, account_type: AccountType) -> Vec<Account> {
        self.ledger.accounts_by_type(account_type)
    }

    /// All accounts, sorted by account number
    pub fn all_accounts(&self) -> Vec<Account> {
        self.ledger.all_accounts()
    }

    pub fn close_account(&self, account_number: &str) -> Result<Account, LedgerError> {
        let id = self.ledger.account_by_number(account_number)?.id;
        self.ledger.close(id)
    }

    pub fn set_account_status(
        &self,
        account_number: &str,
        status: AccountStatus,
    ) -> Result<Account, LedgerError> {
        let id = self.ledger.account_by_number(account_number)?.id;
        self.ledger.set_status(id, status)
    }

    // ---- Account requests ----

    /// File a request for a new account, to be approved or rejected later
    pub fn request_account(
        &self,
        owner: UserId,
        account_type: AccountType,
        initial_deposit: Decimal,
    ) -> Result<AccountRequest, LedgerError> {
        self.requests.create(owner, account_type, initial_deposit)
    }

    /// Approve a pending request; `account_number` picks the new account's
    /// number instead of generating one
    pub fn approve_account_request(
        &self,
        id: RequestId,
        account_number: Option<&str>,
    ) -> Result<AccountRequest, LedgerError> {
        match account_number {
            Some(number) => self.requests.approve_with_number(id, number),
            None => self.requests.approve(id),
        }
    }

    pub fn reject_account_request(&self, id: RequestId) -> Result<AccountRequest, LedgerError> {
        self.requests.reject(id)
    }

    pub fn account_request(&self, id: RequestId) -> Option<AccountRequest> {
        self.requests.find_by_id(id)
    }

    pub fn pending_account_requests(&self) -> Vec<AccountRequest> {
        self.requests.pending()
    }

    pub fn account_requests_by_status(&self, status: RequestStatus) -> Vec<AccountRequest> {
        self.requests.by_status(status)
    }

    pub fn account_requests_for_user(&self, owner: UserId) -> Vec<AccountRequest> {
        self.requests.for_user(owner)
    }

    // ---- Money movement ----

    pub fn execute(&self, request: TransferRequest) -> Result<Transaction, LedgerError> {
        self.orchestrator.execute(request)
    }

    pub fn transfer(
        &self,
        from_account: &str,
        to_identifier: &str,
        amount: Decimal,
        description: Option<&str>,
        is_phone: bool,
    ) -> Result<Transaction, LedgerError> {
        self.orchestrator
            .transfer(from_account, to_identifier, amount, description, is_phone)
    }

    pub fn transfer_by_phone(
        &self,
        from_account: &str,
        phone_number: &str,
        amount: Decimal,
        description: Option<&str>,
        user: UserId,
        pin: &str,
    ) -> Result<Transaction, LedgerError> {
        self.orchestrator
            .transfer_by_phone(from_account, phone_number, amount, description, user, pin)
    }

    pub fn transfer_by_account(
        &self,
        from_account: &str,
        to_account: &str,
        amount: Decimal,
        description: Option<&str>,
        user: UserId,
        pin: &str,
    ) -> Result<Transaction, LedgerError> {
        self.orchestrator
            .transfer_by_account(from_account, to_account, amount, description, user, pin)
    }

    pub fn deposit(
        &self,
        account_number: &str,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        self.orchestrator.deposit(account_number, amount, description)
    }

    pub fn withdraw(
        &self,
        account_number: &str,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        self.orchestrator.withdraw(account_number, amount, description)
    }

    // ---- Transfer PIN ----

    pub fn set_transfer_pin(&self, user: UserId, pin: &str) -> Result<(), LedgerError> {
        self.transfer_pins.set(user, pin)
    }

    pub fn has_transfer_pin(&self, user: UserId) -> bool {
        self.transfer_pins.has(user)
    }

    pub fn verify_transfer_pin(&self, user: UserId, pin: &str) -> bool {
        self.transfer_pins.verify(user, pin)
    }

    // ---- PIN sessions ----

    pub fn generate_pin(&self, session_id: &str) -> String {
        self.pin_sessions.generate(session_id)
    }

    pub fn view_pin(&self, session_id: &str) -> Option<String> {
        self.pin_sessions.view(session_id)
    }

    pub fn verify_pin(&self, session_id: &str, code: &str) -> bool {
        self.pin_sessions.verify(session_id, code)
    }

    pub fn pin_status(&self, session_id: &str) -> PinStatus {
        self.pin_sessions.status(session_id)
    }

    pub fn invalidate_pin(&self, session_id: &str) -> bool {
        self.pin_sessions.invalidate(session_id)
    }

    /// Start sweeping expired PIN sessions at the configured interval
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_pin_reaper(&self) -> PinReaper {
        self.pin_sessions.spawn_reaper(self.config.reaper_interval)
    }

    // ---- History ----

    pub fn transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.log.find_by_id(id)
    }

    pub fn transaction_by_external_id(&self, transaction_id: &str) -> Option<Transaction> {
        self.log.find_by_transaction_id(transaction_id)
    }

    /// Every record of the account, in either role, newest first
    pub fn transaction_history(
        &self,
        account_number: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let id = self.ledger.account_by_number(account_number)?.id;
        Ok(self.log.history_for_account(id))
    }

    /// One page of the account's history
    ///
    /// A missing `size` uses the configured default page size; a size of zero
    /// or less returns the full history as one page.
    pub fn transaction_history_page(
        &self,
        account_number: &str,
        page: usize,
        size: Option<i64>,
    ) -> Result<Page<Transaction>, LedgerError> {
        let id = self.ledger.account_by_number(account_number)?.id;
        let size = size.unwrap_or_else(|| {
            i64::try_from(self.config.default_page_size).unwrap_or(i64::MAX)
        });
        Ok(self.log.history_page(id, page, size))
    }

    /// Records touching any account of the user registered with this phone number
    pub fn transaction_history_by_phone(&self, phone_number: &str) -> Vec<Transaction> {
        let accounts: Vec<_> = self
            .directory
            .find_accounts_by_phone(phone_number)
            .iter()
            .map(|a| a.id)
            .collect();
        if accounts.is_empty() {
            return Vec::new();
        }
        self.log.history_for_accounts(&accounts)
    }

    pub fn transaction_history_between(
        &self,
        account_number: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let id = self.ledger.account_by_number(account_number)?.id;
        Ok(self.log.by_account_and_date_range(id, from, to))
    }

    pub fn completed_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Transaction> {
        self.log.completed_between(from, to)
    }

    pub fn transactions_by_status(&self, status: TransactionStatus) -> Vec<Transaction> {
        self.log.by_status(status)
    }

    pub fn transactions_by_type(&self, tx_type: TransactionType) -> Vec<Transaction> {
        self.log.by_type(tx_type)
    }

    /// Every record, in the order they were recorded
    pub fn all_transactions(&self) -> Vec<Transaction> {
        self.log.all()
    }

    pub fn transaction_count(&self, account_number: &str) -> Result<usize, LedgerError> {
        let id = self.ledger.account_by_number(account_number)?.id;
        Ok(self.log.count_for_account(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::directory::InMemoryDirectory;
    use crate::types::{ErrorKind, UserProfile};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn engine() -> BankingEngine {
        let directory = Arc::new(InMemoryDirectory::new());
        directory
            .register_user(UserProfile::new(1, "+15550001"))
            .unwrap();
        directory
            .register_user(UserProfile::new(2, "+15550002"))
            .unwrap();
        let engine = BankingEngine::new(
            directory.clone(),
            directory,
            LedgerConfig::new(
                Duration::from_secs(300),
                Duration::from_secs(1),
                Duration::from_secs(1),
                2,
            ),
        );
        engine
            .open_account_with_number("1000000001", 1, AccountType::Savings, dec!(100))
            .unwrap();
        engine
            .open_account_with_number("1000000002", 1, AccountType::Current, dec!(0))
            .unwrap();
        engine
            .open_account_with_number("2000000001", 2, AccountType::Savings, dec!(0))
            .unwrap();
        engine
    }

    #[test]
    fn test_history_by_phone_covers_all_accounts_of_the_user() {
        let engine = engine();
        engine
            .transfer("1000000001", "1000000002", dec!(10), None, false)
            .unwrap();
        engine
            .transfer("1000000002", "2000000001", dec!(5), None, false)
            .unwrap();
        engine.deposit("2000000001", dec!(1), None).unwrap();

        assert_eq!(engine.transaction_history_by_phone("+15550001").len(), 2);
        assert_eq!(engine.transaction_history_by_phone("+15550002").len(), 2);
        assert!(engine.transaction_history_by_phone("+19999999").is_empty());
        assert_eq!(engine.transaction_count("1000000002").unwrap(), 2);
    }

    #[test]
    fn test_history_page_uses_configured_default_size() {
        let engine = engine();
        for _ in 0..5 {
            engine.deposit("1000000001", dec!(1), None).unwrap();
        }

        let page = engine
            .transaction_history_page("1000000001", 0, None)
            .unwrap();
        let full = engine
            .transaction_history_page("1000000001", 0, Some(0))
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(full.items.len(), 5);
    }

    #[test]
    fn test_history_of_unknown_account() {
        let engine = engine();

        assert_eq!(
            engine.transaction_history("404").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_close_and_status_by_account_number() {
        let engine = engine();

        engine
            .set_account_status("1000000002", AccountStatus::Inactive)
            .unwrap();
        let closed = engine.close_account("1000000002").unwrap();

        assert_eq!(closed.status, AccountStatus::Closed);
        assert_eq!(engine.accounts_by_status(AccountStatus::Closed).len(), 1);
        assert_eq!(engine.accounts_for_phone("+15550001").len(), 2);
    }

    #[test]
    fn test_pin_session_round_trip_through_engine() {
        let engine = engine();

        let code = engine.generate_pin("session-1");
        assert_eq!(engine.view_pin("session-1"), Some(code.clone()));
        assert!(engine.verify_pin("session-1", &code));
        assert!(!engine.verify_pin("session-1", &code));
        assert!(engine.pin_status("session-1").used);
        assert!(engine.invalidate_pin("session-1"));
    }

    #[test]
    fn test_transfer_pin_gates_user_transfers() {
        let engine = engine();
        assert!(!engine.has_transfer_pin(1));
        engine.set_transfer_pin(1, "246810").unwrap();

        assert!(engine.verify_transfer_pin(1, "246810"));
        engine
            .transfer_by_phone("1000000001", "+15550002", dec!(20), None, 1, "246810")
            .unwrap();
        assert_eq!(engine.balance("2000000001").unwrap(), dec!(20.00));
        assert_eq!(engine.transactions_by_type(TransactionType::Transfer).len(), 1);
    }

    #[test]
    fn test_account_request_workflow_through_engine() {
        let engine = engine();
        let approved = engine
            .request_account(2, AccountType::Current, dec!(75))
            .unwrap();
        let rejected = engine
            .request_account(2, AccountType::Savings, dec!(0))
            .unwrap();

        let approved = engine
            .approve_account_request(approved.id, Some("2000000002"))
            .unwrap();
        engine.reject_account_request(rejected.id).unwrap();

        assert_eq!(engine.balance("2000000002").unwrap(), dec!(75.00));
        assert_eq!(
            approved.created_account.unwrap().account_number,
            "2000000002"
        );
        assert!(engine.pending_account_requests().is_empty());
        assert_eq!(engine.account_requests_by_status(RequestStatus::Rejected).len(), 1);
        assert_eq!(engine.account_requests_for_user(2).len(), 2);
        assert_eq!(
            engine.account_request(rejected.id).unwrap().status,
            RequestStatus::Rejected
        );
        assert_eq!(
            engine
                .approve_account_request(rejected.id, None)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidState
        );
    }
}
