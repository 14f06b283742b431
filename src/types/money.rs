//! Fixed-point money helpers
//!
//! All balances and amounts are decimals with two fractional digits.
//! Inputs with finer precision are rejected rather than rounded.

use super::error::LedgerError;
use rust_decimal::Decimal;

/// Number of fractional digits carried by every amount and balance
pub const MONEY_SCALE: u32 = 2;

/// Validate a movement amount and bring it to the money scale
///
/// # Returns
///
/// * `Ok(Decimal)` - The amount rescaled to two decimal places
/// * `Err(LedgerError::InvalidAmount)` - If the amount is zero, negative,
///   or has more than two significant fractional digits
pub fn validate_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(amount, "amount must be positive"));
    }
    to_money(amount)
}

/// Validate an opening balance, which may be zero
pub fn validate_opening_balance(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::invalid_amount(
            amount,
            "opening balance cannot be negative",
        ));
    }
    to_money(amount)
}

fn to_money(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(LedgerError::invalid_amount(
            amount,
            "at most two decimal places are allowed",
        ));
    }
    let mut money = amount;
    money.rescale(MONEY_SCALE);
    Ok(money)
}
