//! # Sales Rate and Reward Factor Math
//!
//! Sales rates are Q64 amounts per second. Reward factors are Q128 output per
//! unit sold and accumulate like fee growth: they may wrap, and are only ever
//! read as differences.

use ethnum::U256;

use crate::constants::{BPS_DENOMINATOR, MAX_FEE_BPS, REWARD_FACTOR_SHIFT, SALES_RATE_SHIFT};
use crate::errors::{TwammError, TwammResult};
use crate::math::big_int::{checked_shl, to_u128};

/// Sales rate for selling `amount_in` evenly over `duration` seconds
pub fn sales_rate_for(amount_in: u128, duration: u64) -> TwammResult<U256> {
    if duration == 0 {
        return Err(TwammError::DivisionByZero);
    }
    let scaled = checked_shl(U256::from(amount_in), SALES_RATE_SHIFT)?;
    Ok(scaled / U256::from(duration))
}

/// Tokens sold at `sales_rate` over `elapsed` seconds, rounded down
pub fn amount_sold(sales_rate: U256, elapsed: u64) -> TwammResult<u128> {
    let product = sales_rate
        .checked_mul(U256::from(elapsed))
        .ok_or(TwammError::MathOverflow)?;
    to_u128(product >> SALES_RATE_SHIFT)
}

/// Reward factor increment for distributing `amount_out` over `sales_rate`
pub fn reward_factor_delta(amount_out: u128, sales_rate: U256) -> TwammResult<U256> {
    if sales_rate == U256::ZERO {
        return Err(TwammError::DivisionByZero);
    }
    let scaled = checked_shl(U256::from(amount_out), REWARD_FACTOR_SHIFT)?;
    Ok(scaled / sales_rate)
}

/// Difference of two reward factor readings, tolerating wrap-around
pub fn sub_reward_factor(current: U256, checkpoint: U256) -> U256 {
    current.wrapping_sub(checkpoint)
}

/// Proceeds owed to an order of `sales_rate` since `checkpoint`
pub fn proceeds_since(current: U256, checkpoint: U256, sales_rate: U256) -> TwammResult<u128> {
    let delta = sub_reward_factor(current, checkpoint);
    let product = delta.checked_mul(sales_rate).ok_or(TwammError::MathOverflow)?;
    to_u128(product >> REWARD_FACTOR_SHIFT)
}

/// Validate a pair fee in basis points
pub fn validate_fee(fee_bps: u32) -> TwammResult<()> {
    if fee_bps > MAX_FEE_BPS {
        return Err(TwammError::InvalidFee(fee_bps));
    }
    Ok(())
}

/// Portion of `amount` left after the fee skim, rounded down
pub fn amount_after_fee(amount: u128, fee_bps: u32) -> TwammResult<u128> {
    let kept = BPS_DENOMINATOR - fee_bps as u128;
    let product = U256::from(amount) * U256::from(kept);
    to_u128(product / U256::from(BPS_DENOMINATOR))
}
