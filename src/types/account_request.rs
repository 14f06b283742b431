//! Account-opening request types
//!
//! Customers ask for new accounts through requests that staff later approve
//! or reject. An approved request points at the account it produced.

use super::account::AccountType;
use super::transaction::AccountRef;
use super::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Internal request identifier, assigned sequentially
pub type RequestId = u64;

/// Review state of an account-opening request
///
/// Requests start `Pending` and are decided exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            RequestStatus::Pending => false,
            RequestStatus::Approved | RequestStatus::Rejected => true,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(RequestStatus::Pending),
            "APPROVED" => Ok(RequestStatus::Approved),
            "REJECTED" => Ok(RequestStatus::Rejected),
            other => Err(format!("Unknown request status '{}'", other)),
        }
    }
}

/// A request to open an account
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRequest {
    pub id: RequestId,

    /// Unique human-facing identifier (`REQ` followed by a ULID)
    pub request_id: String,

    /// The user the account will belong to
    pub owner: UserId,

    pub account_type: AccountType,

    /// Opening balance of the account, zero or positive, two decimal places
    pub initial_deposit: Decimal,

    pub status: RequestStatus,

    pub created_at: DateTime<Utc>,

    /// When the request was approved or rejected
    pub processed_at: Option<DateTime<Utc>>,

    /// The account opened on approval
    pub created_account: Option<AccountRef>,
}
