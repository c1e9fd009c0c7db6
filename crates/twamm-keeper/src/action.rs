//! Pair actions shared by scenario replays and the live keeper's feed.
//!
//! Actions are tagged by `action` in both TOML scenarios and JSON lines.

use serde::{Deserialize, Serialize};
use twamm_core::Direction;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    AddLiquidity {
        pair: String,
        account: String,
        amount0: u64,
        amount1: u64,
    },
    RemoveLiquidity {
        pair: String,
        account: String,
        shares: u64,
    },
    Swap {
        pair: String,
        account: String,
        zero_for_one: bool,
        amount_in: u64,
        #[serde(default)]
        min_amount_out: u64,
    },
    LongTermSwap {
        pair: String,
        account: String,
        zero_for_one: bool,
        amount_in: u64,
        intervals: u64,
    },
    Cancel {
        pair: String,
        account: String,
        order_id: u64,
    },
    Withdraw {
        pair: String,
        account: String,
        order_id: u64,
    },
    Execute {
        pair: String,
        account: String,
        /// Defaults to the current time
        target: Option<u64>,
    },
    TogglePause {
        pair: String,
        account: String,
    },
    /// Move a replay clock forward; live keepers reject it
    Advance {
        seconds: u64,
    },
    KeeperTick,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddLiquidity { .. } => "add_liquidity",
            Action::RemoveLiquidity { .. } => "remove_liquidity",
            Action::Swap { .. } => "swap",
            Action::LongTermSwap { .. } => "long_term_swap",
            Action::Cancel { .. } => "cancel",
            Action::Withdraw { .. } => "withdraw",
            Action::Execute { .. } => "execute",
            Action::TogglePause { .. } => "toggle_pause",
            Action::Advance { .. } => "advance",
            Action::KeeperTick => "keeper_tick",
        }
    }
}

pub(crate) fn direction(zero_for_one: bool) -> Direction {
    if zero_for_one {
        Direction::ZeroForOne
    } else {
        Direction::OneForZero
    }
}
