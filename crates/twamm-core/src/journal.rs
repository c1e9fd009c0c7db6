//! # State Journal
//!
//! Tracks the original value of each piece of pair state the first time a
//! mutating call touches it. A failed call restores exactly those entries;
//! a successful one drops them. Cost follows what the call touched, not the
//! size of the order history.

use std::collections::BTreeMap;

use ethnum::U256;

use crate::reserves::ReserveManager;
use crate::types::{AccountId, Order, OrderId};

// ============================================================================
// Tracked State
// ============================================================================

/// Unique location of tracked pair state. Pools are indexed by the token
/// they sell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum StateKey {
    Reserves,
    LastVirtualOrderTimestamp,
    PoolTotals(usize),
    SalesRateEnding(usize, u64),
    RewardFactorAtExpiry(usize, u64),
    NextOrderId,
    Order(OrderId),
    OwnerOrders(AccountId),
}

/// Value found at a [`StateKey`] before the call first touched it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Original {
    Reserves(ReserveManager),
    LastVirtualOrderTimestamp(u64),
    PoolTotals {
        pool: usize,
        current_sales_rate: U256,
        reward_factor: U256,
    },
    SalesRateEnding {
        pool: usize,
        timestamp: u64,
        value: Option<U256>,
    },
    RewardFactorAtExpiry {
        pool: usize,
        timestamp: u64,
        value: Option<U256>,
    },
    NextOrderId(OrderId),
    Order {
        id: OrderId,
        order: Option<Order>,
    },
    OwnerOrders {
        owner: AccountId,
        len: usize,
    },
}

// ============================================================================
// Journal
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Journal {
    originals: BTreeMap<StateKey, Original>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracked(&self, key: &StateKey) -> bool {
        self.originals.contains_key(key)
    }

    /// Store the original for `key` unless one is already tracked
    pub fn record(&mut self, key: StateKey, original: Original) {
        self.originals.entry(key).or_insert(original);
    }

    /// Number of distinct locations touched
    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn into_originals(self) -> impl Iterator<Item = Original> {
        self.originals.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_touch_wins() {
        let mut journal = Journal::new();
        journal.record(StateKey::NextOrderId, Original::NextOrderId(3));
        journal.record(StateKey::NextOrderId, Original::NextOrderId(4));
        journal.record(
            StateKey::LastVirtualOrderTimestamp,
            Original::LastVirtualOrderTimestamp(10),
        );

        assert_eq!(journal.len(), 2);
        assert!(journal.is_tracked(&StateKey::NextOrderId));
        assert!(!journal.is_tracked(&StateKey::Order(3)));

        let originals: Vec<Original> = journal.into_originals().collect();
        assert!(originals.contains(&Original::NextOrderId(3)));
        assert!(!originals.contains(&Original::NextOrderId(4)));
    }
}
