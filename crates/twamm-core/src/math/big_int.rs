//! Big integer operations for high-precision math
//!
//! Wraps `ethnum::U256` with checked helpers used by the sales-rate and
//! reward-factor accounting.

use ethnum::U256;

use crate::errors::{TwammError, TwammResult};

/// Rounding mode for division operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round down (towards zero)
    Down,
    /// Round up (away from zero)
    Up,
}

/// Narrow a U256 to u128, failing if the high word is set
pub fn to_u128(value: U256) -> TwammResult<u128> {
    let (hi, lo) = value.into_words();
    if hi == 0 {
        Ok(lo)
    } else {
        Err(TwammError::MathOverflow)
    }
}

/// Checked left shift that fails if any set bit would be shifted out
pub fn checked_shl(value: U256, shift: u32) -> TwammResult<U256> {
    if value == U256::ZERO {
        return Ok(U256::ZERO);
    }
    if shift >= 256 || value.leading_zeros() < shift {
        return Err(TwammError::MathOverflow);
    }
    Ok(value << shift)
}

/// Calculate (a * b) / denominator with the requested rounding
pub fn mul_div(a: U256, b: U256, denominator: U256, rounding: Rounding) -> TwammResult<U256> {
    if denominator == U256::ZERO {
        return Err(TwammError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(TwammError::MathOverflow)?;
    let quotient = product / denominator;
    match rounding {
        Rounding::Down => Ok(quotient),
        Rounding::Up => {
            if product % denominator == U256::ZERO {
                Ok(quotient)
            } else {
                quotient.checked_add(U256::ONE).ok_or(TwammError::MathOverflow)
            }
        }
    }
}

/// u128 mul-div through a 256-bit intermediate
pub fn mul_div_u128(a: u128, b: u128, denominator: u128, rounding: Rounding) -> TwammResult<u128> {
    let result = mul_div(U256::from(a), U256::from(b), U256::from(denominator), rounding)?;
    to_u128(result)
}

/// Divide with the requested rounding
pub fn div_rounding(numerator: U256, denominator: U256, rounding: Rounding) -> TwammResult<U256> {
    mul_div(numerator, U256::ONE, denominator, rounding)
}

/// Integer square root of a 256-bit value
pub fn sqrt_u256(n: U256) -> u128 {
    if n == U256::ZERO {
        return 0;
    }
    // Newton's method from a power of two above the root
    let bits = 256 - n.leading_zeros();
    let mut x = U256::ONE << ((bits + 1) / 2);
    loop {
        let y = (x + n / x) >> 1;
        if y >= x {
            break;
        }
        x = y;
    }
    let (_, lo) = x.into_words();
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_rounding() {
        assert_eq!(mul_div_u128(10, 10, 3, Rounding::Down).unwrap(), 33);
        assert_eq!(mul_div_u128(10, 10, 3, Rounding::Up).unwrap(), 34);
        assert_eq!(mul_div_u128(9, 10, 3, Rounding::Up).unwrap(), 30);
        assert_eq!(
            mul_div_u128(1, 1, 0, Rounding::Down),
            Err(TwammError::DivisionByZero)
        );
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // (2^127 * 2^100) / 2^120 = 2^107
        let result = mul_div_u128(1u128 << 127, 1u128 << 100, 1u128 << 120, Rounding::Down).unwrap();
        assert_eq!(result, 1u128 << 107);
    }

    #[test]
    fn test_to_u128_overflow() {
        assert_eq!(to_u128(U256::from(u128::MAX)).unwrap(), u128::MAX);
        assert_eq!(to_u128(U256::from(u128::MAX) + U256::ONE), Err(TwammError::MathOverflow));
    }

    #[test]
    fn test_sqrt_u256() {
        assert_eq!(sqrt_u256(U256::ZERO), 0);
        assert_eq!(sqrt_u256(U256::from(99u8)), 9);
        assert_eq!(sqrt_u256(U256::from(100u8)), 10);
        let max = U256::from(u128::MAX) * U256::from(u128::MAX);
        assert_eq!(sqrt_u256(max), u128::MAX);
    }

    #[test]
    fn test_checked_shl() {
        assert_eq!(checked_shl(U256::ONE, 255).unwrap(), U256::ONE << 255);
        assert!(checked_shl(U256::from(2u8), 255).is_err());
        assert_eq!(checked_shl(U256::ZERO, 300).unwrap(), U256::ZERO);
    }
}
