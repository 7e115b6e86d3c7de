//! Conversion between atomic units (wei) and human display strings.
//!
//! Display strings carry no trailing zeros: 1_500_000_000_000_000_000 wei at
//! 18 decimals is "1.5", zero is "0".

use ethers::types::U256;

use crate::core::errors::WalletError;

/// Parse a non-negative decimal display amount into atomic units.
pub fn to_atomic(amount: &str, decimals: u32) -> Result<U256, WalletError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(WalletError::ValidationError("Amount is empty".into()));
    }
    if amount.starts_with('-') {
        return Err(WalletError::ValidationError(format!("Amount must not be negative: {}", amount)));
    }

    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(WalletError::ValidationError(format!("Invalid amount: {}", amount)));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(WalletError::ValidationError(format!("Amount is not numeric: {}", amount)));
    }
    let decimals = decimals as usize;
    if frac.len() > decimals {
        return Err(WalletError::ValidationError(format!(
            "Amount {} has more than {} decimal places",
            amount, decimals
        )));
    }

    let overflow = || WalletError::ValidationError(format!("Amount out of range: {}", amount));
    let whole_value = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| overflow())?
    };
    let frac_padded = format!("{:0<width$}", frac, width = decimals);
    let frac_value = if frac_padded.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(&frac_padded).map_err(|_| overflow())?
    };

    whole_value
        .checked_mul(U256::exp10(decimals))
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(overflow)
}

/// Render atomic units as a display string.
pub fn to_display(atomic: U256, decimals: u32) -> String {
    let decimals = decimals as usize;
    let (whole, rem) = atomic.div_mod(U256::exp10(decimals));
    if rem.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", rem.to_string(), width = decimals);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
