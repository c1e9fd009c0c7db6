//! # Order Types
//!
//! Long-term order records and the read-only views handed to callers.

use std::fmt;

use ethnum::U256;

/// Identity of a caller, order owner or pair admin
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Order identifier, assigned monotonically per pair and never reused
pub type OrderId = u64;

/// Which token a long-term order sells
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Sells token0 for token1
    ZeroForOne,
    /// Sells token1 for token0
    OneForZero,
}

impl Direction {
    /// Index of the token being sold
    pub fn token_in_index(self) -> usize {
        match self {
            Direction::ZeroForOne => 0,
            Direction::OneForZero => 1,
        }
    }

    /// Index of the token being bought
    pub fn token_out_index(self) -> usize {
        1 - self.token_in_index()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ZeroForOne => f.write_str("0->1"),
            Direction::OneForZero => f.write_str("1->0"),
        }
    }
}

/// Lifecycle state derived from an order's flags and the engine clock
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Active,
    Cancelled,
    ExpiredUnclaimed,
    ExpiredWithdrawn,
}

/// A long-term order as stored by the registry
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub owner: AccountId,
    pub direction: Direction,
    /// Q64 tokens sold per second
    pub sales_rate: U256,
    pub submission_timestamp: u64,
    pub expiration_timestamp: u64,
    /// Reward factor of the order's pool at submission or last withdrawal
    pub reward_factor_at_last_checkpoint: U256,
    pub cancelled: bool,
    pub fully_withdrawn: bool,
}

impl Order {
    pub fn is_finalized(&self) -> bool {
        self.cancelled || self.fully_withdrawn
    }

    /// Status as seen by an engine that has processed up to `timestamp`
    pub fn status_at(&self, timestamp: u64) -> OrderStatus {
        if self.cancelled {
            OrderStatus::Cancelled
        } else if self.fully_withdrawn {
            OrderStatus::ExpiredWithdrawn
        } else if timestamp >= self.expiration_timestamp {
            OrderStatus::ExpiredUnclaimed
        } else {
            OrderStatus::Active
        }
    }

    /// Whether the order's rate belongs in its pool's current sales rate
    pub fn contributes_at(&self, timestamp: u64) -> bool {
        !self.cancelled
            && self.submission_timestamp <= timestamp
            && timestamp < self.expiration_timestamp
    }
}

/// Public view of an order
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderView {
    pub id: OrderId,
    pub owner: AccountId,
    pub direction: Direction,
    pub sales_rate: U256,
    pub submission_timestamp: u64,
    pub expiration_timestamp: u64,
    pub status: OrderStatus,
}

/// Stored order record paired with whether it is finalized
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailedOrder {
    pub order: Order,
    /// Cancelled or fully withdrawn; nothing further is owed
    pub is_complete: bool,
}

/// Tokens returned by cancelling an order
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CancelResult {
    /// Unsold principal refunded in the sell token
    pub refund: u128,
    /// Proceeds paid in the buy token
    pub proceeds: u128,
}

/// Tokens paid by a proceeds withdrawal
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WithdrawResult {
    pub proceeds: u128,
    pub fully_withdrawn: bool,
}
