//! # Protocol Constants
//!
//! Fixed-point scales, reserve bounds and pair defaults:
//! - Fixed-point shifts for sales rates and reward factors
//! - Fee structure parameters
//! - Reserve and liquidity limits
//! - Order timing defaults

// ============================================================================
// Mathematical Constants
// ============================================================================

/// Sales rates are stored as amount-per-second scaled by 2^64
pub const SALES_RATE_SHIFT: u32 = 64;

/// Reward factors are stored as output-per-unit-sold scaled by 2^128
pub const REWARD_FACTOR_SHIFT: u32 = 128;

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

// ============================================================================
// Fee Constants
// ============================================================================

/// Default pair fee: 0.30%
pub const DEFAULT_FEE_BPS: u32 = 30;

/// Fees at or above 100% are rejected
pub const MAX_FEE_BPS: u32 = 9_999;

// ============================================================================
// Reserve Constants
// ============================================================================

/// Per-token ceiling on instant plus embedded reserves (2^112 - 1)
pub const MAX_RESERVE: u128 = (1u128 << 112) - 1;

/// Liquidity shares locked forever on the first deposit
pub const MINIMUM_LIQUIDITY: u128 = 1_000;

// ============================================================================
// Order Timing Constants
// ============================================================================

/// Default order time interval: one hour
pub const DEFAULT_ORDER_TIME_INTERVAL: u64 = 3_600;

/// Upper bound on how many intervals a single order may span (~5 years at 1h)
pub const MAX_ORDER_INTERVALS: u64 = 43_800;

/// Default number of scheduled expirations processed per execution call
pub const DEFAULT_MAX_BOUNDARIES_PER_CALL: usize = 256;
