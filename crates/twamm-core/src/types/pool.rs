//! # Pool Views
//!
//! Snapshots of pair state returned by read-only queries and mutation results.

use ethnum::U256;

/// Instant and embedded reserves together with the engine clock
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TwammReserves {
    pub reserve0: u128,
    pub reserve1: u128,
    pub last_virtual_order_timestamp: u64,
    pub twamm_reserve0: u128,
    pub twamm_reserve1: u128,
    pub fee_bps: u32,
}

/// Order pool aggregates for both directions
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TwammState {
    pub order_time_interval: u64,
    pub last_virtual_order_timestamp: u64,
    pub sales_rate0: U256,
    pub sales_rate1: U256,
    pub reward_factor0: U256,
    pub reward_factor1: U256,
}

/// Outcome of one `execute_virtual_orders` call
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatchUp {
    /// Engine timestamp after the call
    pub reached: u64,
    /// Scheduled expirations crossed during the call
    pub boundaries_crossed: usize,
    /// Whether the requested (clamped) target was reached
    pub complete: bool,
}

/// Totals of one engine step, reported to indexers
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionStep {
    pub start: u64,
    pub end: u64,
    pub sold0: u128,
    pub sold1: u128,
    pub purchased0: u128,
    pub purchased1: u128,
    /// Instant-swap reserves at `end`
    pub reserve0: u128,
    pub reserve1: u128,
}

/// Result of an instant swap
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapResult {
    pub amount_in: u128,
    pub amount_out: u128,
    /// Part of `amount_in` kept as fee
    pub fee_amount: u128,
}

/// Result of a liquidity deposit or withdrawal
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiquidityResult {
    pub shares: u128,
    pub amount0: u128,
    pub amount1: u128,
}
