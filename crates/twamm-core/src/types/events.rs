//! # Pair Events
//!
//! Observable record of every state change, buffered on the pair for indexers.

use ethnum::U256;

use crate::types::orders::{AccountId, Direction, OrderId};

#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairEvent {
    /// Instant-swap reserves changed
    Sync { reserve0: u128, reserve1: u128 },
    Swap {
        sender: AccountId,
        token_in: usize,
        amount_in: u128,
        amount_out: u128,
    },
    Mint {
        sender: AccountId,
        amount0: u128,
        amount1: u128,
        shares: u128,
    },
    Burn {
        sender: AccountId,
        amount0: u128,
        amount1: u128,
        shares: u128,
    },
    LongTermSwap {
        owner: AccountId,
        order_id: OrderId,
        direction: Direction,
        amount_in: u128,
        sales_rate: U256,
        expiration_timestamp: u64,
    },
    CancelLongTermOrder {
        owner: AccountId,
        order_id: OrderId,
        unsold_amount: u128,
        purchased_amount: u128,
    },
    WithdrawProceedsFromLongTermOrder {
        owner: AccountId,
        order_id: OrderId,
        proceeds: u128,
        fully_withdrawn: bool,
    },
    VirtualOrderExecution {
        timestamp: u64,
        reserve0: u128,
        reserve1: u128,
        sold0: u128,
        sold1: u128,
        purchased0: u128,
        purchased1: u128,
    },
    PauseToggled { paused: bool },
}

impl PairEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PairEvent::Sync { .. } => "Sync",
            PairEvent::Swap { .. } => "Swap",
            PairEvent::Mint { .. } => "Mint",
            PairEvent::Burn { .. } => "Burn",
            PairEvent::LongTermSwap { .. } => "LongTermSwap",
            PairEvent::CancelLongTermOrder { .. } => "CancelLongTermOrder",
            PairEvent::WithdrawProceedsFromLongTermOrder { .. } => "WithdrawProceedsFromLongTermOrder",
            PairEvent::VirtualOrderExecution { .. } => "VirtualOrderExecution",
            PairEvent::PauseToggled { .. } => "PauseToggled",
        }
    }
}
