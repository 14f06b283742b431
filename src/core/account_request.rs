//! Account-opening request workflow
//!
//! Customers file requests for new accounts; staff approve or reject them.
//! Approval opens the account through the [`Ledger`] and links it to the
//! request. A request is decided exactly once.
//!
//! A user may have at most [`MAX_PENDING_REQUESTS`] undecided requests at a
//! time. The check and the insert happen under one intake lock, so concurrent
//! filings cannot both slip past the limit.

use crate::core::ledger::Ledger;
use crate::core::traits::AccountDirectory;
use crate::types::{
    validate_opening_balance, Account, AccountRef, AccountRequest, AccountType, LedgerError,
    RequestId, RequestStatus, UserId,
};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;
use ulid::Ulid;

/// Prefix of every external request id
pub const REQUEST_ID_PREFIX: &str = "REQ";

/// Undecided requests a single user may hold
pub const MAX_PENDING_REQUESTS: usize = 3;

/// Store and state machine for account-opening requests
pub struct AccountRequests {
    directory: Arc<dyn AccountDirectory>,
    ledger: Arc<Ledger>,
    requests: DashMap<RequestId, AccountRequest>,

    /// external id -> internal id
    request_ids: DashMap<String, RequestId>,

    next_id: AtomicU64,

    /// Serializes the pending-limit check with the insert
    intake: Mutex<()>,
}

impl AccountRequests {
    pub fn new(directory: Arc<dyn AccountDirectory>, ledger: Arc<Ledger>) -> Self {
        Self {
            directory,
            ledger,
            requests: DashMap::new(),
            request_ids: DashMap::new(),
            next_id: AtomicU64::new(1),
            intake: Mutex::new(()),
        }
    }

    /// File a new PENDING request
    ///
    /// # Returns
    ///
    /// * `Ok(AccountRequest)` - The stored request
    /// * `Err(LedgerError::UserNotFound)` - If the owner is unknown
    /// * `Err(LedgerError::InvalidAmount)` - If the deposit is negative or too precise
    /// * `Err(LedgerError::TooManyPendingRequests)` - If the owner already has
    ///   [`MAX_PENDING_REQUESTS`] undecided requests
    pub fn create(
        &self,
        owner: UserId,
        account_type: AccountType,
        initial_deposit: Decimal,
    ) -> Result<AccountRequest, LedgerError> {
        if !self.directory.user_exists(owner) {
            return Err(LedgerError::UserNotFound { user: owner });
        }
        let initial_deposit = validate_opening_balance(initial_deposit)?;

        let _intake = self.intake.lock();
        let pending = self.pending_count_for_user(owner);
        if pending >= MAX_PENDING_REQUESTS {
            return Err(LedgerError::TooManyPendingRequests {
                user: owner,
                pending,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request_id = format!("{}{}", REQUEST_ID_PREFIX, Ulid::new());

        let mut claimed = false;
        self.request_ids.entry(request_id.clone()).or_insert_with(|| {
            claimed = true;
            id
        });
        if !claimed {
            return Err(LedgerError::DuplicateRequestId {
                request: request_id,
            });
        }

        let request = AccountRequest {
            id,
            request_id,
            owner,
            account_type,
            initial_deposit,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
            created_account: None,
        };
        self.requests.insert(id, request.clone());

        info!(
            request = %request.request_id,
            owner,
            account_type = %account_type,
            "Account request filed"
        );
        Ok(request)
    }

    /// Approve a PENDING request, opening its account with a generated number
    pub fn approve(&self, id: RequestId) -> Result<AccountRequest, LedgerError> {
        self.approve_with(id, |request| {
            self.ledger.open_account(
                request.owner,
                request.account_type,
                request.initial_deposit,
            )
        })
    }

    /// Approve a PENDING request, opening its account under a chosen number
    pub fn approve_with_number(
        &self,
        id: RequestId,
        account_number: &str,
    ) -> Result<AccountRequest, LedgerError> {
        self.approve_with(id, |request| {
            self.ledger.open_account_with_number(
                account_number,
                request.owner,
                request.account_type,
                request.initial_deposit,
            )
        })
    }

    /// Reject a PENDING request
    ///
    /// Fails with `RequestNotPending` once the request has been decided.
    pub fn reject(&self, id: RequestId) -> Result<AccountRequest, LedgerError> {
        let mut entry = self
            .requests
            .get_mut(&id)
            .ok_or(LedgerError::AccountRequestNotFound { request: id })?;
        let request = entry.value_mut();
        ensure_pending(request)?;

        request.status = RequestStatus::Rejected;
        request.processed_at = Some(Utc::now());

        info!(request = %request.request_id, "Account request rejected");
        Ok(request.clone())
    }

    // Holding the entry keeps a concurrent reject or second approval out
    // until the account is open. A failed open leaves the request PENDING.
    fn approve_with<F>(&self, id: RequestId, open: F) -> Result<AccountRequest, LedgerError>
    where
        F: FnOnce(&AccountRequest) -> Result<Account, LedgerError>,
    {
        let mut entry = self
            .requests
            .get_mut(&id)
            .ok_or(LedgerError::AccountRequestNotFound { request: id })?;
        let request = entry.value_mut();
        ensure_pending(request)?;

        let account = open(request)?;
        request.status = RequestStatus::Approved;
        request.processed_at = Some(Utc::now());
        request.created_account = Some(AccountRef::from(&account));

        info!(
            request = %request.request_id,
            account = %account.account_number,
            "Account request approved"
        );
        Ok(request.clone())
    }

    pub fn find_by_id(&self, id: RequestId) -> Option<AccountRequest> {
        self.requests.get(&id).map(|entry| entry.value().clone())
    }

    pub fn find_by_request_id(&self, request_id: &str) -> Option<AccountRequest> {
        let id = *self.request_ids.get(request_id)?;
        self.find_by_id(id)
    }

    /// Every request, in filing order
    pub fn all(&self) -> Vec<AccountRequest> {
        self.collect(|_| true)
    }

    pub fn for_user(&self, owner: UserId) -> Vec<AccountRequest> {
        self.collect(|r| r.owner == owner)
    }

    pub fn by_status(&self, status: RequestStatus) -> Vec<AccountRequest> {
        self.collect(|r| r.status == status)
    }

    /// Undecided requests, oldest first
    pub fn pending(&self) -> Vec<AccountRequest> {
        self.by_status(RequestStatus::Pending)
    }

    pub fn pending_count_for_user(&self, owner: UserId) -> usize {
        self.requests
            .iter()
            .filter(|r| r.owner == owner && r.status == RequestStatus::Pending)
            .count()
    }

    fn collect<P>(&self, predicate: P) -> Vec<AccountRequest>
    where
        P: Fn(&AccountRequest) -> bool,
    {
        let mut requests: Vec<AccountRequest> = self
            .requests
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        requests.sort_by_key(|r| r.id);
        requests
    }
}

fn ensure_pending(request: &AccountRequest) -> Result<(), LedgerError> {
    if request.status.is_terminal() {
        return Err(LedgerError::RequestNotPending {
            request: request.request_id.clone(),
            status: request.status,
        });
    }
    Ok(())
}
