//! # Virtual Order Trade Math
//!
//! Closed-form settlement of a constant-rate TWAMM step. Two opposing flows
//! selling into a constant-product pool over the same interval have an exact
//! continuous-time solution, so a whole step between two boundaries is settled
//! at once instead of simulated as a series of instant swaps.
//!
//! With `x0, y0` the reserves and `a, b` the fee-adjusted amounts sold by each
//! side over the step:
//!
//! ```text
//! h    = sqrt(a * b / (x0 * y0))
//! d    = tanh(h) / h
//! xEnd = (x0 + a * d) * y0 / (y0 + b * d)
//! yEnd = (y0 + b * d) * x0 / (x0 + a * d)
//! ```
//!
//! so `xEnd * yEnd = x0 * y0`. Only `h` and `d` are evaluated in
//! `rust_decimal`, from square roots of each input normalized on its own;
//! `d` is then applied to the flows in 256-bit integers. The result is
//! finished in integer arithmetic so that outputs never exceed what the pool
//! holds and the product of the reserves never decreases.

use ethnum::U256;
use rust_decimal::{Decimal, MathematicalOps};

use crate::constants::BPS_DENOMINATOR;
use crate::errors::{TwammError, TwammResult};
use crate::math::big_int::{div_rounding, mul_div, to_u128, Rounding};
use crate::math::reward_math::{amount_after_fee, validate_fee};
use crate::math::safe_math::{safe_add_u128, safe_sub_u128};

/// Each solver input is normalized to this many bits before the decimal
/// evaluation
const DECIMAL_INPUT_BITS: i32 = 90;

/// Largest power of two a decimal holds exactly
const MAX_DECIMAL_POW2: u32 = 95;

/// Above this `h` the hyperbolic tangent is 1 to decimal precision
const TANH_SATURATION: Decimal = Decimal::from_parts(32, 0, 0, false, 0);

/// `h = m * 2^e` with `m >= 1/4` saturates once `e` reaches this
const SATURATED_EXPONENT: i32 = 7;

/// Below this `h` the tangent is evaluated by its Taylor series
const TANH_SERIES_CUTOFF: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Range reduction target for the exponential
const EXP_REDUCED_MAX: Decimal = Decimal::from_parts(125, 0, 0, false, 3);

/// Convergence tolerance of the reduced exponential series (1e-28)
const EXP_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 28);

/// Outcome of settling one execution step against the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VirtualTrade {
    /// Instant-swap reserve of token0 after the step
    pub reserve0: u128,
    /// Instant-swap reserve of token1 after the step
    pub reserve1: u128,
    /// Token0 paid to the 1-for-0 sellers
    pub amount_out0: u128,
    /// Token1 paid to the 0-for-1 sellers
    pub amount_out1: u128,
}

/// Instant constant-product output with the fee skimmed from the input
pub fn get_amount_out(
    amount_in: u128,
    reserve_in: u128,
    reserve_out: u128,
    fee_bps: u32,
) -> TwammResult<u128> {
    validate_fee(fee_bps)?;
    if amount_in == 0 {
        return Err(TwammError::InvalidAmount);
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(TwammError::InsufficientLiquidity);
    }

    let amount_in_with_fee = U256::from(amount_in) * U256::from(BPS_DENOMINATOR - fee_bps as u128);
    let numerator = amount_in_with_fee * U256::from(reserve_out);
    let denominator = U256::from(reserve_in) * U256::from(BPS_DENOMINATOR) + amount_in_with_fee;
    to_u128(numerator / denominator)
}

/// Settle one constant-rate step in which `amount_in0` of token0 and
/// `amount_in1` of token1 are sold into the pool.
pub fn compute_virtual_balances(
    reserve0: u128,
    reserve1: u128,
    amount_in0: u128,
    amount_in1: u128,
    fee_bps: u32,
) -> TwammResult<VirtualTrade> {
    validate_fee(fee_bps)?;

    match (amount_in0, amount_in1) {
        (0, 0) => Ok(VirtualTrade {
            reserve0,
            reserve1,
            amount_out0: 0,
            amount_out1: 0,
        }),
        (a, 0) => {
            let out1 = get_amount_out(a, reserve0, reserve1, fee_bps)?;
            Ok(VirtualTrade {
                reserve0: safe_add_u128(reserve0, a)?,
                reserve1: safe_sub_u128(reserve1, out1)?,
                amount_out0: 0,
                amount_out1: out1,
            })
        }
        (0, b) => {
            let out0 = get_amount_out(b, reserve1, reserve0, fee_bps)?;
            Ok(VirtualTrade {
                reserve0: safe_sub_u128(reserve0, out0)?,
                reserve1: safe_add_u128(reserve1, b)?,
                amount_out0: out0,
                amount_out1: 0,
            })
        }
        (a, b) => two_sided(reserve0, reserve1, a, b, fee_bps),
    }
}

fn two_sided(x0: u128, y0: u128, a: u128, b: u128, fee_bps: u32) -> TwammResult<VirtualTrade> {
    let a_eff = amount_after_fee(a, fee_bps)?;
    let b_eff = amount_after_fee(b, fee_bps)?;
    let fee0 = a - a_eff;
    let fee1 = b - b_eff;

    // Empty pool: the two flows trade directly against each other.
    if x0 == 0 || y0 == 0 {
        return Ok(VirtualTrade {
            reserve0: safe_add_u128(x0, fee0)?,
            reserve1: safe_add_u128(y0, fee1)?,
            amount_out0: a_eff,
            amount_out1: b_eff,
        });
    }

    // Fee rounding wiped out one side entirely.
    if a_eff == 0 || b_eff == 0 {
        let (sold0, sold1) = if a_eff == 0 { (0, b) } else { (a, 0) };
        let mut trade = compute_virtual_balances(x0, y0, sold0, sold1, fee_bps)?;
        if a_eff == 0 {
            trade.reserve0 = safe_add_u128(trade.reserve0, a)?;
        } else {
            trade.reserve1 = safe_add_u128(trade.reserve1, b)?;
        }
        return Ok(trade);
    }

    let x_max = safe_add_u128(x0, a_eff)?;
    let y_max = safe_add_u128(y0, b_eff)?;
    let k = U256::from(x0) * U256::from(y0);

    let estimate = estimate_x_end(x0, y0, a_eff, b_eff)?;
    let mut x_end = estimate.clamp(1, x_max);
    let mut y_end = div_rounding(k, U256::from(x_end), Rounding::Up)?;
    if y_end > U256::from(y_max) {
        y_end = U256::from(y_max);
        x_end = to_u128(div_rounding(k, y_end, Rounding::Up)?)?;
    }
    let y_end = to_u128(y_end)?;

    Ok(VirtualTrade {
        reserve0: safe_add_u128(x_end, fee0)?,
        reserve1: safe_add_u128(y_end, fee1)?,
        amount_out0: safe_sub_u128(x_max, x_end)?,
        amount_out1: safe_sub_u128(y_max, y_end)?,
    })
}

/// Continuous-time estimate of the token0 reserve at the end of the step,
/// rounded up. Every input must be non-zero.
///
/// The result is not clamped; the caller bounds it to what the pool can pay.
pub fn estimate_x_end(x0: u128, y0: u128, a: u128, b: u128) -> TwammResult<u128> {
    if x0 == 0 || y0 == 0 {
        return Err(TwammError::InsufficientLiquidity);
    }
    if a == 0 || b == 0 {
        return Err(TwammError::InvalidAmount);
    }

    let damping = Damping::for_step(x0, y0, a, b)?;
    let numerator = U256::from(x0) + U256::from(damping.apply(a)?);
    let denominator = U256::from(y0) + U256::from(damping.apply(b)?);
    to_u128(mul_div(numerator, U256::from(y0), denominator, Rounding::Up)?)
}

/// `tanh(h) / h` stored as `mantissa / 2^shift`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Damping {
    mantissa: Decimal,
    shift: u32,
}

impl Damping {
    fn for_step(x0: u128, y0: u128, a: u128, b: u128) -> TwammResult<Self> {
        let (sx, ex) = scaled_sqrt(x0)?;
        let (sy, ey) = scaled_sqrt(y0)?;
        let (sa, ea) = scaled_sqrt(a)?;
        let (sb, eb) = scaled_sqrt(b)?;

        // h = m * 2^e with m in [1/4, 4]
        let m = mul(div(sa, sx)?, div(sb, sy)?)?;
        let e = ea + eb - ex - ey;

        if e >= SATURATED_EXPONENT {
            // tanh(h) is 1, leaving 1/h
            let shift = u32::try_from(e).map_err(|_| TwammError::MathOverflow)?;
            return Ok(Self {
                mantissa: div(Decimal::ONE, m)?,
                shift,
            });
        }
        let h = with_pow2(m, e)?;
        Ok(Self {
            mantissa: tanh_over_h(h)?,
            shift: 0,
        })
    }

    /// `value * tanh(h) / h`, rounded down
    fn apply(&self, value: u128) -> TwammResult<u128> {
        let mantissa = u128::try_from(self.mantissa.mantissa()).map_err(|_| TwammError::MathUnderflow)?;
        let scale = 10u128.pow(self.mantissa.scale());
        let product = mul_div(
            U256::from(value),
            U256::from(mantissa),
            U256::from(scale),
            Rounding::Down,
        )?;
        if self.shift >= 256 {
            return Ok(0);
        }
        to_u128(product >> self.shift)
    }
}

/// `sqrt(value)` as `(mantissa, exponent)` with `value` first moved by an even
/// shift into `[2^88, 2^90)`
fn scaled_sqrt(value: u128) -> TwammResult<(Decimal, i32)> {
    if value == 0 {
        return Err(TwammError::DivisionByZero);
    }
    let bits = 128 - value.leading_zeros() as i32;
    let excess = bits - DECIMAL_INPUT_BITS;
    let shift = excess + excess.rem_euclid(2);
    let normalized = if shift >= 0 {
        value >> shift
    } else {
        value << -shift
    };
    Ok((sqrt(to_decimal(normalized)?)?, shift / 2))
}

/// `value * 2^exponent`; results below decimal resolution become zero
fn with_pow2(value: Decimal, exponent: i32) -> TwammResult<Decimal> {
    let magnitude = exponent.unsigned_abs();
    if magnitude > MAX_DECIMAL_POW2 {
        return if exponent > 0 {
            Err(TwammError::MathOverflow)
        } else {
            Ok(Decimal::ZERO)
        };
    }
    let factor = to_decimal(1u128 << magnitude)?;
    if exponent >= 0 {
        mul(value, factor)
    } else {
        div(value, factor)
    }
}

/// `tanh(h) / h` for non-negative `h`, 1 at `h = 0`
fn tanh_over_h(h: Decimal) -> TwammResult<Decimal> {
    if h < TANH_SERIES_CUTOFF {
        // 1 - h^2/3 + 2h^4/15 - 17h^6/315
        let h2 = mul(h, h)?;
        let h4 = mul(h2, h2)?;
        let h6 = mul(h4, h2)?;
        return sub(
            add(sub(Decimal::ONE, div(h2, Decimal::from(3))?)?, div(mul(h4, Decimal::TWO)?, Decimal::from(15))?)?,
            div(mul(h6, Decimal::from(17))?, Decimal::from(315))?,
        );
    }
    div(tanh(h)?, h)
}

/// Hyperbolic tangent for non-negative decimal input
fn tanh(h: Decimal) -> TwammResult<Decimal> {
    if h >= TANH_SATURATION {
        return Ok(Decimal::ONE);
    }
    if h < TANH_SERIES_CUTOFF {
        return mul(h, tanh_over_h(h)?);
    }
    let e = exp(mul(h, Decimal::TWO)?)?;
    div(sub(e, Decimal::ONE)?, add(e, Decimal::ONE)?)
}

/// e^x for non-negative x: halve into the series range, evaluate there,
/// then square back up
fn exp(x: Decimal) -> TwammResult<Decimal> {
    let mut reduced = x;
    let mut squarings = 0u32;
    while reduced > EXP_REDUCED_MAX {
        reduced = div(reduced, Decimal::TWO)?;
        squarings += 1;
    }

    let mut result = reduced
        .checked_exp_with_tolerance(EXP_TOLERANCE)
        .ok_or(TwammError::MathOverflow)?;
    for _ in 0..squarings {
        result = mul(result, result)?;
    }
    Ok(result)
}

fn to_decimal(value: u128) -> TwammResult<Decimal> {
    let signed = i128::try_from(value).map_err(|_| TwammError::MathOverflow)?;
    Decimal::try_from_i128_with_scale(signed, 0).map_err(|_| TwammError::MathOverflow)
}

fn sqrt(value: Decimal) -> TwammResult<Decimal> {
    value.sqrt().ok_or(TwammError::MathOverflow)
}

fn mul(a: Decimal, b: Decimal) -> TwammResult<Decimal> {
    a.checked_mul(b).ok_or(TwammError::MathOverflow)
}

fn div(a: Decimal, b: Decimal) -> TwammResult<Decimal> {
    if b.is_zero() {
        return Err(TwammError::DivisionByZero);
    }
    a.checked_div(b).ok_or(TwammError::MathOverflow)
}

fn add(a: Decimal, b: Decimal) -> TwammResult<Decimal> {
    a.checked_add(b).ok_or(TwammError::MathOverflow)
}

fn sub(a: Decimal, b: Decimal) -> TwammResult<Decimal> {
    a.checked_sub(b).ok_or(TwammError::MathUnderflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal::prelude::ToPrimitive;

    /// Reference closed form evaluated in f64
    fn reference_x_end(x0: f64, y0: f64, a: f64, b: f64) -> f64 {
        let k = x0 * y0;
        let c = ((x0 * b).sqrt() - (y0 * a).sqrt()) / ((x0 * b).sqrt() + (y0 * a).sqrt());
        let e = (2.0 * (a * b / k).sqrt()).exp();
        (k * a / b).sqrt() * (e + c) / (e - c)
    }

    #[test]
    fn test_estimate_matches_reference() {
        let cases = [
            (1_000_000_000u128, 1_000_000_000u128, 1_000_000u128, 500_000u128),
            (5_000_000_000, 2_000_000_000, 300_000_000, 700_000_000),
            (1_000_000, 1_000_000, 10_000_000, 10_000_000),
            (10u128.pow(24), 3 * 10u128.pow(24), 10u128.pow(21), 10u128.pow(20)),
        ];
        for (x0, y0, a, b) in cases {
            let estimate = estimate_x_end(x0, y0, a, b).unwrap() as f64;
            let reference = reference_x_end(x0 as f64, y0 as f64, a as f64, b as f64);
            assert_relative_eq!(estimate, reference, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_equal_flows_keep_price() {
        let trade = compute_virtual_balances(1_000_000, 1_000_000, 50_000, 50_000, 0).unwrap();
        // Balanced flows at a balanced price cross entirely with each other.
        assert!(trade.reserve0.abs_diff(1_000_000) <= 2);
        assert!(trade.reserve1.abs_diff(1_000_000) <= 2);
        assert!(trade.amount_out0.abs_diff(50_000) <= 2);
        assert!(trade.amount_out1.abs_diff(50_000) <= 2);
    }

    #[test]
    fn test_two_sided_conserves_tokens_and_k() {
        let (x0, y0, a, b) = (2_000_000_000u128, 1_000_000_000u128, 40_000_000u128, 5_000_000u128);
        let trade = compute_virtual_balances(x0, y0, a, b, 30).unwrap();

        assert_eq!(trade.reserve0 + trade.amount_out0, x0 + a);
        assert_eq!(trade.reserve1 + trade.amount_out1, y0 + b);
        assert!(U256::from(trade.reserve0) * U256::from(trade.reserve1) >= U256::from(x0) * U256::from(y0));
    }

    #[test]
    fn test_one_sided_is_exact_constant_product() {
        let trade = compute_virtual_balances(1_000_000_000, 1_000_000_000, 10_000, 0, 30).unwrap();
        let instant = get_amount_out(10_000, 1_000_000_000, 1_000_000_000, 30).unwrap();

        assert_eq!(trade.amount_out1, instant);
        assert_eq!(trade.amount_out0, 0);
        assert_eq!(trade.reserve0, 1_000_010_000);
        assert_eq!(trade.reserve1, 1_000_000_000 - instant);
    }

    #[test]
    fn test_empty_pool_flows_cross() {
        let trade = compute_virtual_balances(0, 0, 10_000, 20_000, 30).unwrap();
        assert_eq!(trade.amount_out0, 9_970);
        assert_eq!(trade.amount_out1, 19_940);
        assert_eq!(trade.reserve0, 30);
        assert_eq!(trade.reserve1, 60);
    }

    #[test]
    fn test_no_flow_is_noop() {
        let trade = compute_virtual_balances(7, 11, 0, 0, 30).unwrap();
        assert_eq!(trade, VirtualTrade { reserve0: 7, reserve1: 11, amount_out0: 0, amount_out1: 0 });
    }

    #[test]
    fn test_wide_reserves_stay_bounded() {
        let big = (1u128 << 111) - 1;
        let trade = compute_virtual_balances(big, big / 3, 1u128 << 100, 1u128 << 98, 30).unwrap();
        assert_eq!(trade.reserve0 + trade.amount_out0, big + (1u128 << 100));
        assert_eq!(trade.reserve1 + trade.amount_out1, big / 3 + (1u128 << 98));
    }

    #[test]
    fn test_small_flow_against_deep_pool_is_paid() {
        let deep = 1u128 << 100;
        let trade = compute_virtual_balances(deep, deep, 1u128 << 90, 1_000, 0).unwrap();
        // The small side trades at roughly the post-trade price
        assert!(trade.amount_out0 >= 998 && trade.amount_out0 <= 1_002);
        assert!(trade.amount_out1 > 0);
        assert_eq!(trade.reserve0 + trade.amount_out0, deep + (1u128 << 90));
        assert_eq!(trade.reserve1 + trade.amount_out1, deep + 1_000);
    }

    #[test]
    fn test_lopsided_reserves_settle_both_sides() {
        let (x0, y0) = (1u128, 1u128 << 111);
        let (a, b) = (1u128 << 111, 1u128 << 20);
        let trade = compute_virtual_balances(x0, y0, a, b, 0).unwrap();

        assert!(trade.amount_out0 > 0);
        assert!(trade.amount_out1 > 0);
        assert_eq!(trade.reserve0 + trade.amount_out0, x0 + a);
        assert_eq!(trade.reserve1 + trade.amount_out1, y0 + b);
        assert!(U256::from(trade.reserve0) * U256::from(trade.reserve1) >= U256::from(x0) * U256::from(y0));
        // Token0 settles near sqrt(k * a / b)
        let limit = 1u128 << 101;
        assert!(trade.reserve0.abs_diff(limit) <= limit / 1_000);
    }

    #[test]
    fn test_checked_math_reports_overflow() {
        assert_eq!(
            compute_virtual_balances(u128::MAX, 1u128 << 64, 1_000, 1u128 << 60, 0),
            Err(TwammError::MathOverflow)
        );
    }

    #[test]
    fn test_estimate_rejects_empty_inputs() {
        assert_eq!(estimate_x_end(0, 1, 1, 1), Err(TwammError::InsufficientLiquidity));
        assert_eq!(estimate_x_end(1, 1, 0, 1), Err(TwammError::InvalidAmount));
    }

    #[test]
    fn test_damping_limits() {
        assert_eq!(tanh_over_h(Decimal::ZERO).unwrap(), Decimal::ONE);

        // h = 2^100: tanh saturates and the weight is carried as a shift
        let damping = Damping::for_step(1, 1, 1u128 << 100, 1u128 << 100).unwrap();
        assert_eq!(damping.shift, 100);
        assert!(damping.apply(1u128 << 110).unwrap().abs_diff(1_024) <= 1);
    }

    #[test]
    fn test_get_amount_out_errors() {
        assert_eq!(get_amount_out(0, 1, 1, 30), Err(TwammError::InvalidAmount));
        assert_eq!(get_amount_out(1, 0, 1, 30), Err(TwammError::InsufficientLiquidity));
        assert_eq!(get_amount_out(1, 1, 1, 10_000), Err(TwammError::InvalidFee(10_000)));
    }

    #[test]
    fn test_exp_and_tanh() {
        let e = exp(Decimal::ONE).unwrap().to_f64().unwrap();
        assert_relative_eq!(e, std::f64::consts::E, max_relative = 1e-15);
        let e20 = exp(Decimal::from(20)).unwrap().to_f64().unwrap();
        assert_relative_eq!(e20, 20f64.exp(), max_relative = 1e-12);

        for h in [0.0001f64, 0.01, 0.5, 3.0, 40.0] {
            let t = tanh(Decimal::try_from(h).unwrap()).unwrap().to_f64().unwrap();
            assert_relative_eq!(t, h.tanh(), max_relative = 1e-12);
        }
    }
}
