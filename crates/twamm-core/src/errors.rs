//! # Core Error Types
//!
//! Every fallible operation in the pair returns [`TwammResult`]. A failed call
//! leaves pair state untouched.

use thiserror::Error;

/// Errors raised by the TWAMM pair and its math
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum TwammError {
    // ========================================================================
    // Order Lifecycle Errors
    // ========================================================================

    #[error("New long-term swaps are paused")]
    SwapsPaused,

    #[error("Invalid order duration: {0} intervals")]
    InvalidDuration(u64),

    #[error("Caller is not authorized")]
    Unauthorized,

    #[error("Order {0} is already finalized")]
    OrderAlreadyFinalized(u64),

    #[error("Order {0} has nothing to withdraw")]
    NothingToWithdraw(u64),

    #[error("Order {0} not found")]
    OrderNotFound(u64),

    // ========================================================================
    // Execution Errors
    // ========================================================================

    #[error("Timestamp {requested} is before last virtual order timestamp {last}")]
    StaleOrOutOfRangeTimestamp { requested: u64, last: u64 },

    #[error("Virtual order execution stopped at {reached} before reaching {target}")]
    ExecutionOverflow { reached: u64, target: u64 },

    // ========================================================================
    // Math Errors
    // ========================================================================

    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Inconsistent pair state: {0}")]
    InconsistentState(String),

    // ========================================================================
    // Reserve and Liquidity Errors
    // ========================================================================

    #[error("Reserve overflow")]
    ReserveOverflow,

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Insufficient liquidity minted")]
    InsufficientLiquidityMinted,

    #[error("Insufficient liquidity burned")]
    InsufficientLiquidityBurned,

    #[error("Insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: u128, held: u128 },

    #[error("Slippage exceeded: out {amount_out} below minimum {min_amount_out}")]
    SlippageExceeded { amount_out: u128, min_amount_out: u128 },

    // ========================================================================
    // Validation Errors
    // ========================================================================

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Invalid fee: {0} bps")]
    InvalidFee(u32),

    #[error("Invalid order time interval: {0}")]
    InvalidInterval(u64),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // ========================================================================
    // Factory Errors
    // ========================================================================

    #[error("Pair tokens must differ")]
    IdenticalTokens,

    #[error("Pair already exists")]
    PairExists,

    #[error("Pair not found")]
    PairNotFound,
}

/// Result type using core errors
pub type TwammResult<T> = Result<T, TwammError>;
