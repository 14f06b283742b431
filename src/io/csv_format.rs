//! CSV format handling for replayed operations and ledger output
//!
//! This module centralizes all CSV format concerns, providing:
//! - OperationRecord structure for deserialization
//! - Conversion from CSV records to [`Operation`]s
//! - Account and transaction output serialization
//!
//! All functions are pure (no file I/O) for easy testing.
//!
//! # Input format
//!
//! Columns: `op,user,phone,account,target,account_type,status,amount,description,pin,
//! request,session`. Only the columns an operation needs must be filled in:
//!
//! | op                 | required columns                               |
//! |--------------------|------------------------------------------------|
//! | `user`             | user, phone                                    |
//! | `set_pin`          | user, pin                                      |
//! | `open`             | user, account_type (account, amount optional)  |
//! | `deposit`          | account, amount                                |
//! | `withdraw`         | account, amount                                |
//! | `transfer`         | account, amount, and target or phone           |
//! | `transfer_phone`   | account, phone, amount, user, pin              |
//! | `transfer_account` | account, target, amount, user, pin             |
//! | `status`           | account, status                                |
//! | `close`            | account                                        |
//! | `request`          | user, account_type (amount optional)           |
//! | `approve`          | request (account optional)                     |
//! | `reject`           | request                                        |
//! | `pin_generate`     | session                                        |
//! | `pin_view`         | session                                        |
//! | `pin_verify`       | session (pin optional)                         |
//! | `pin_invalidate`   | session                                        |
//! | `wait`             | amount, in seconds                             |

use crate::types::{
    Account, AccountRef, AccountStatus, AccountType, LedgerError, RequestId, Transaction, UserId,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

/// CSV record structure for deserialization
///
/// Every column is optional at this level; [`convert_csv_record`] checks
/// that the ones the operation needs are present.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct OperationRecord {
    pub op: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub request: Option<String>,
    #[serde(default)]
    pub session: Option<String>,
}

/// One replayable operation against the ledger core
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    RegisterUser {
        user: UserId,
        phone: String,
    },
    SetTransferPin {
        user: UserId,
        pin: String,
    },
    OpenAccount {
        user: UserId,
        account_type: AccountType,
        /// Caller-chosen account number; generated when absent
        account: Option<String>,
        opening_balance: Decimal,
    },
    Deposit {
        account: String,
        amount: Decimal,
        description: Option<String>,
    },
    Withdraw {
        account: String,
        amount: Decimal,
        description: Option<String>,
    },
    /// Internal transfer, no transfer PIN
    Transfer {
        from: String,
        to: String,
        amount: Decimal,
        description: Option<String>,
        is_phone: bool,
    },
    TransferByPhone {
        from: String,
        phone: String,
        amount: Decimal,
        description: Option<String>,
        user: UserId,
        pin: String,
    },
    TransferByAccount {
        from: String,
        to: String,
        amount: Decimal,
        description: Option<String>,
        user: UserId,
        pin: String,
    },
    SetStatus {
        account: String,
        status: AccountStatus,
    },
    Close {
        account: String,
    },
    RequestAccount {
        user: UserId,
        account_type: AccountType,
        initial_deposit: Decimal,
    },
    ApproveRequest {
        request: RequestId,
        /// Number for the new account; generated when absent
        account: Option<String>,
    },
    RejectRequest {
        request: RequestId,
    },
    GeneratePin {
        session: String,
    },
    ViewPin {
        session: String,
    },
    /// Verify with the given code, or with the last code the replay saw
    VerifyPin {
        session: String,
        code: Option<String>,
    },
    InvalidatePin {
        session: String,
    },
    /// Pause the replay, letting PIN sessions age
    Wait {
        duration: Duration,
    },
}

/// Convert an OperationRecord to an Operation
///
/// # Arguments
///
/// * `record` - The deserialized CSV record
///
/// # Returns
///
/// * `Ok(Operation)` - Successfully converted operation
/// * `Err(LedgerError::ParseError)` - Unknown op, missing column or bad value.
///   The error carries no line number; the reader adds it.
pub fn convert_csv_record(record: OperationRecord) -> Result<Operation, LedgerError> {
    let op = record.op.trim().to_ascii_lowercase();

    match op.as_str() {
        "user" => Ok(Operation::RegisterUser {
            user: user_id(&record)?,
            phone: required(&record.phone, "phone", &op)?,
        }),
        "set_pin" => Ok(Operation::SetTransferPin {
            user: user_id(&record)?,
            pin: required(&record.pin, "pin", &op)?,
        }),
        "open" => Ok(Operation::OpenAccount {
            user: user_id(&record)?,
            account_type: account_type(&record, &op)?,
            account: optional(&record.account),
            opening_balance: optional_amount(&record)?,
        }),
        "deposit" => Ok(Operation::Deposit {
            account: required(&record.account, "account", &op)?,
            amount: amount(&record, &op)?,
            description: optional(&record.description),
        }),
        "withdraw" | "withdrawal" => Ok(Operation::Withdraw {
            account: required(&record.account, "account", &op)?,
            amount: amount(&record, &op)?,
            description: optional(&record.description),
        }),
        "transfer" => {
            let (to, is_phone) = match (optional(&record.target), optional(&record.phone)) {
                (Some(target), _) => (target, false),
                (None, Some(phone)) => (phone, true),
                (None, None) => {
                    return Err(parse_error(format!(
                        "'{}' requires a target account or a phone number",
                        op
                    )))
                }
            };
            Ok(Operation::Transfer {
                from: required(&record.account, "account", &op)?,
                to,
                amount: amount(&record, &op)?,
                description: optional(&record.description),
                is_phone,
            })
        }
        "transfer_phone" => Ok(Operation::TransferByPhone {
            from: required(&record.account, "account", &op)?,
            phone: required(&record.phone, "phone", &op)?,
            amount: amount(&record, &op)?,
            description: optional(&record.description),
            user: user_id(&record)?,
            pin: required(&record.pin, "pin", &op)?,
        }),
        "transfer_account" => Ok(Operation::TransferByAccount {
            from: required(&record.account, "account", &op)?,
            to: required(&record.target, "target", &op)?,
            amount: amount(&record, &op)?,
            description: optional(&record.description),
            user: user_id(&record)?,
            pin: required(&record.pin, "pin", &op)?,
        }),
        "status" => {
            let status = required(&record.status, "status", &op)?;
            Ok(Operation::SetStatus {
                account: required(&record.account, "account", &op)?,
                status: AccountStatus::from_str(&status).map_err(parse_error)?,
            })
        }
        "close" => Ok(Operation::Close {
            account: required(&record.account, "account", &op)?,
        }),
        "request" => Ok(Operation::RequestAccount {
            user: user_id(&record)?,
            account_type: account_type(&record, &op)?,
            initial_deposit: optional_amount(&record)?,
        }),
        "approve" => Ok(Operation::ApproveRequest {
            request: request_id(&record, &op)?,
            account: optional(&record.account),
        }),
        "reject" => Ok(Operation::RejectRequest {
            request: request_id(&record, &op)?,
        }),
        "pin_generate" => Ok(Operation::GeneratePin {
            session: required(&record.session, "session", &op)?,
        }),
        "pin_view" => Ok(Operation::ViewPin {
            session: required(&record.session, "session", &op)?,
        }),
        "pin_verify" => Ok(Operation::VerifyPin {
            session: required(&record.session, "session", &op)?,
            code: optional(&record.pin),
        }),
        "pin_invalidate" => Ok(Operation::InvalidatePin {
            session: required(&record.session, "session", &op)?,
        }),
        "wait" => Ok(Operation::Wait {
            duration: seconds(&required(&record.amount, "amount", &op)?)?,
        }),
        _ => Err(parse_error(format!("Invalid operation: '{}'", record.op))),
    }
}

fn parse_error(message: impl Into<String>) -> LedgerError {
    LedgerError::ParseError {
        line: None,
        message: message.into(),
    }
}

fn optional(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required(field: &Option<String>, column: &str, op: &str) -> Result<String, LedgerError> {
    optional(field).ok_or_else(|| parse_error(format!("'{}' requires column '{}'", op, column)))
}

fn user_id(record: &OperationRecord) -> Result<UserId, LedgerError> {
    let raw = required(&record.user, "user", record.op.trim())?;
    raw.parse::<UserId>()
        .map_err(|_| parse_error(format!("Invalid user id '{}'", raw)))
}

fn request_id(record: &OperationRecord, op: &str) -> Result<RequestId, LedgerError> {
    let raw = required(&record.request, "request", op)?;
    raw.parse::<RequestId>()
        .map_err(|_| parse_error(format!("Invalid request id '{}'", raw)))
}

fn account_type(record: &OperationRecord, op: &str) -> Result<AccountType, LedgerError> {
    AccountType::from_str(&required(&record.account_type, "account_type", op)?)
        .map_err(parse_error)
}

fn amount(record: &OperationRecord, op: &str) -> Result<Decimal, LedgerError> {
    decimal(&required(&record.amount, "amount", op)?)
}

/// Amount column that defaults to zero when left blank
fn optional_amount(record: &OperationRecord) -> Result<Decimal, LedgerError> {
    match optional(&record.amount) {
        Some(amount) => decimal(&amount),
        None => Ok(Decimal::ZERO),
    }
}

fn seconds(raw: &str) -> Result<Duration, LedgerError> {
    let millis = decimal(raw)?
        .checked_mul(Decimal::ONE_THOUSAND)
        .and_then(|millis| millis.trunc().to_u64())
        .ok_or_else(|| parse_error(format!("Invalid wait '{}'", raw)))?;
    Ok(Duration::from_millis(millis))
}

fn decimal(raw: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(raw).map_err(|_| parse_error(format!("Invalid amount '{}'", raw)))
}

/// Write account states to CSV format
///
/// Writes accounts with columns: account, owner, type, status, balance.
/// Accounts are sorted by account number for deterministic output and
/// balances always carry two decimal places.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["account", "owner", "type", "status", "balance"])?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));

    for account in sorted_accounts {
        writer.write_record(&[
            account.account_number.clone(),
            account.owner.to_string(),
            account.account_type.to_string(),
            account.status.to_string(),
            format!("{:.2}", account.balance),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write transaction records to CSV format
///
/// Columns: transaction_id, timestamp, type, status, amount, from, to,
/// recipient, description. Records are written in the order given.
pub fn write_transactions_csv(
    transactions: &[Transaction],
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record([
        "transaction_id",
        "timestamp",
        "type",
        "status",
        "amount",
        "from",
        "to",
        "recipient",
        "description",
    ])?;

    for tx in transactions {
        let account_number = |r: &Option<AccountRef>| {
            r.as_ref()
                .map(|r| r.account_number.clone())
                .unwrap_or_default()
        };
        writer.write_record(&[
            tx.transaction_id.clone(),
            tx.timestamp.to_rfc3339(),
            tx.tx_type.to_string(),
            tx.status.to_string(),
            format!("{:.2}", tx.amount),
            account_number(&tx.from_account),
            account_number(&tx.to_account),
            tx.recipient
                .as_ref()
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            tx.description.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Recipient, TransactionStatus, TransactionType};
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn record(op: &str) -> OperationRecord {
        OperationRecord {
            op: op.to_string(),
            ..OperationRecord::default()
        }
    }

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_convert_open_with_defaults() {
        let op = convert_csv_record(OperationRecord {
            user: some("1"),
            account_type: some("savings"),
            ..record("open")
        })
        .unwrap();

        assert_eq!(
            op,
            Operation::OpenAccount {
                user: 1,
                account_type: AccountType::Savings,
                account: None,
                opening_balance: Decimal::ZERO,
            }
        );
    }

    #[test]
    fn test_convert_transfer_prefers_target_over_phone() {
        let by_account = convert_csv_record(OperationRecord {
            account: some("1000000001"),
            target: some("2000000001"),
            phone: some("+15550002"),
            amount: some("10.00"),
            ..record("transfer")
        })
        .unwrap();
        let by_phone = convert_csv_record(OperationRecord {
            account: some("1000000001"),
            phone: some("+15550002"),
            amount: some("10.00"),
            ..record("TRANSFER")
        })
        .unwrap();

        assert!(matches!(
            by_account,
            Operation::Transfer { is_phone: false, ref to, .. } if to == "2000000001"
        ));
        assert!(matches!(
            by_phone,
            Operation::Transfer { is_phone: true, ref to, .. } if to == "+15550002"
        ));
    }

    #[test]
    fn test_convert_user_initiated_transfer() {
        let op = convert_csv_record(OperationRecord {
            user: some("1"),
            account: some("1000000001"),
            phone: some("+15550002"),
            amount: some(" 25.5 "),
            description: some("dinner"),
            pin: some("123456"),
            ..record("transfer_phone")
        })
        .unwrap();

        assert_eq!(
            op,
            Operation::TransferByPhone {
                from: "1000000001".to_string(),
                phone: "+15550002".to_string(),
                amount: dec!(25.5),
                description: some("dinner"),
                user: 1,
                pin: "123456".to_string(),
            }
        );
    }

    #[test]
    fn test_convert_account_request_ops() {
        let request = convert_csv_record(OperationRecord {
            user: some("2"),
            account_type: some("fixed_deposit"),
            amount: some("1000"),
            ..record("request")
        })
        .unwrap();
        let approve = convert_csv_record(OperationRecord {
            request: some(" 3 "),
            account: some("2000000001"),
            ..record("approve")
        })
        .unwrap();
        let reject = convert_csv_record(OperationRecord {
            request: some("4"),
            ..record("Reject")
        })
        .unwrap();

        assert_eq!(
            request,
            Operation::RequestAccount {
                user: 2,
                account_type: AccountType::FixedDeposit,
                initial_deposit: dec!(1000),
            }
        );
        assert_eq!(
            approve,
            Operation::ApproveRequest {
                request: 3,
                account: some("2000000001"),
            }
        );
        assert_eq!(reject, Operation::RejectRequest { request: 4 });
    }

    #[rstest]
    #[case::generate("pin_generate", None, Operation::GeneratePin { session: "s1".to_string() })]
    #[case::view("pin_view", None, Operation::ViewPin { session: "s1".to_string() })]
    #[case::verify_remembered(
        "pin_verify",
        None,
        Operation::VerifyPin { session: "s1".to_string(), code: None }
    )]
    #[case::verify_given(
        "pin_verify",
        Some("042042"),
        Operation::VerifyPin { session: "s1".to_string(), code: Some("042042".to_string()) }
    )]
    #[case::invalidate("pin_invalidate", None, Operation::InvalidatePin { session: "s1".to_string() })]
    fn test_convert_pin_session_ops(
        #[case] op: &str,
        #[case] pin: Option<&str>,
        #[case] expected: Operation,
    ) {
        let converted = convert_csv_record(OperationRecord {
            session: some("s1"),
            pin: pin.map(str::to_string),
            ..record(op)
        })
        .unwrap();

        assert_eq!(converted, expected);
    }

    #[rstest]
    #[case("1.5", Duration::from_millis(1500))]
    #[case("0.05", Duration::from_millis(50))]
    #[case("2", Duration::from_secs(2))]
    fn test_convert_wait(#[case] amount: &str, #[case] expected: Duration) {
        let op = convert_csv_record(OperationRecord {
            amount: some(amount),
            ..record("wait")
        })
        .unwrap();

        assert_eq!(op, Operation::Wait { duration: expected });
    }

    #[rstest]
    #[case::unknown_op(record("refund"), "Invalid operation")]
    #[case::deposit_missing_amount(OperationRecord { account: some("1"), ..record("deposit") }, "requires column 'amount'")]
    #[case::deposit_blank_account(OperationRecord { account: some("  "), amount: some("1"), ..record("deposit") }, "requires column 'account'")]
    #[case::bad_amount(OperationRecord { account: some("1"), amount: some("ten"), ..record("withdraw") }, "Invalid amount")]
    #[case::bad_user(OperationRecord { user: some("alice"), phone: some("+1"), ..record("user") }, "Invalid user id")]
    #[case::bad_status(OperationRecord { account: some("1"), status: some("frozen"), ..record("status") }, "Unknown account status")]
    #[case::bad_type(OperationRecord { user: some("1"), account_type: some("checking"), ..record("open") }, "Unknown account type")]
    #[case::transfer_without_recipient(OperationRecord { account: some("1"), amount: some("1"), ..record("transfer") }, "requires a target account or a phone number")]
    #[case::approve_without_request(record("approve"), "requires column 'request'")]
    #[case::bad_request_id(OperationRecord { request: some("REQ1"), ..record("reject") }, "Invalid request id")]
    #[case::pin_without_session(record("pin_view"), "requires column 'session'")]
    #[case::negative_wait(OperationRecord { amount: some("-1"), ..record("wait") }, "Invalid wait")]
    fn test_convert_errors(#[case] input: OperationRecord, #[case] expected: &str) {
        let err = convert_csv_record(input).unwrap_err();

        assert!(matches!(err, LedgerError::ParseError { line: None, .. }));
        assert!(err.to_string().contains(expected), "{}", err);
    }

    #[test]
    fn test_write_accounts_csv_sorts_and_formats() {
        let accounts = vec![
            Account::new(2, "2000000001".to_string(), AccountType::Current, dec!(5), 2),
            Account::new(1, "1000000001".to_string(), AccountType::FixedDeposit, dec!(100.5), 1),
        ];
        let mut output = Vec::new();

        write_accounts_csv(&accounts, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "account,owner,type,status,balance\n\
             1000000001,1,FIXED_DEPOSIT,ACTIVE,100.50\n\
             2000000001,2,CURRENT,ACTIVE,5.00\n"
        );
    }

    #[test]
    fn test_write_accounts_csv_empty() {
        let mut output = Vec::new();

        write_accounts_csv(&[], &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "account,owner,type,status,balance\n"
        );
    }

    #[test]
    fn test_write_transactions_csv() {
        let tx = Transaction {
            id: 1,
            transaction_id: "TXN01".to_string(),
            tx_type: TransactionType::Transfer,
            amount: dec!(10),
            description: "Money transfer, with comma".to_string(),
            status: TransactionStatus::Completed,
            timestamp: Utc::now(),
            from_account: Some(AccountRef {
                id: 1,
                account_number: "1000000001".to_string(),
            }),
            to_account: Some(AccountRef {
                id: 2,
                account_number: "2000000001".to_string(),
            }),
            recipient: Some(Recipient::Phone("+15550002".to_string())),
        };
        let mut output = Vec::new();

        write_transactions_csv(&[tx], &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("TXN01,"));
        assert!(row.ends_with(
            ",TRANSFER,COMPLETED,10.00,1000000001,2000000001,+15550002,\"Money transfer, with comma\""
        ));
    }
}
