//! Monetary units
//!
//! Values on the ledger are fixed-point integers so that sums are exact:
//! one coin is 100,000,000 base units. Human-facing amounts ("12.5") are
//! converted at the edges with `rust_decimal`.

use crate::error::{LedgerError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Base units in one coin
pub const UNITS_PER_COIN: u64 = 100_000_000;

/// Fractional digits a coin amount may carry
pub const COIN_DECIMALS: u32 = 8;

/// Fixed coinbase reward: 12.5 coins
pub const BLOCK_REWARD: u64 = 12 * UNITS_PER_COIN + UNITS_PER_COIN / 2;

/// Parses a decimal coin amount such as `"5.0"` into base units
pub fn coins_to_units(coins: &str) -> Result<u64> {
    let amount = Decimal::from_str(coins.trim())
        .map_err(|e| LedgerError::Transaction(format!("Invalid amount {coins}: {e}")))?;
    decimal_to_units(amount)
}

pub fn decimal_to_units(amount: Decimal) -> Result<u64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LedgerError::Transaction(format!(
            "Amount must not be negative: {amount}"
        )));
    }
    if amount.normalize().scale() > COIN_DECIMALS {
        return Err(LedgerError::Transaction(format!(
            "Amount has more than {COIN_DECIMALS} decimal places: {amount}"
        )));
    }
    amount
        .checked_mul(Decimal::from(UNITS_PER_COIN))
        .and_then(|units| units.to_u64())
        .ok_or_else(|| LedgerError::Transaction(format!("Amount out of range: {amount}")))
}

/// Converts base units back into a normalized coin amount
pub fn units_to_coins(units: u64) -> Decimal {
    (Decimal::from(units) / Decimal::from(UNITS_PER_COIN)).normalize()
}
