//! # Safe Math Operations
//!
//! Overflow-checked arithmetic for token amounts and timestamps.

use crate::errors::{TwammError, TwammResult};

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    // Binary operations with checked methods
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Checked arithmetic mapped to a core error
        pub fn $fn_name(a: $type, b: $type) -> TwammResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };
}

safe_arith!(safe_add_u64, u64, checked_add, TwammError::MathOverflow);
safe_arith!(safe_mul_u64, u64, checked_mul, TwammError::MathOverflow);

safe_arith!(safe_add_u128, u128, checked_add, TwammError::MathOverflow);
safe_arith!(safe_sub_u128, u128, checked_sub, TwammError::MathUnderflow);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_ops() {
        assert_eq!(safe_add_u128(1, 2), Ok(3));
        assert_eq!(safe_add_u128(u128::MAX, 1), Err(TwammError::MathOverflow));
        assert_eq!(safe_sub_u128(1, 2), Err(TwammError::MathUnderflow));
        assert_eq!(safe_add_u64(u64::MAX, 1), Err(TwammError::MathOverflow));
        assert_eq!(safe_mul_u64(u64::MAX, 2), Err(TwammError::MathOverflow));
    }
}
