//! # Order Pools and Registry
//!
//! An [`OrderPool`] aggregates every order selling in one direction: the summed
//! sales rate, the cumulative reward factor, and the schedule of rate
//! decrements keyed by expiration. The [`OrderRegistry`] keeps individual order
//! records; orders are flagged terminal, never removed.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included, Unbounded};

use ethnum::U256;

use crate::errors::{TwammError, TwammResult};
use crate::math::reward_factor_delta;
use crate::types::{AccountId, Direction, Order, OrderId};

// ============================================================================
// Order Pool
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPool {
    direction: Direction,
    current_sales_rate: U256,
    reward_factor: U256,
    sales_rate_ending_at: BTreeMap<u64, U256>,
    reward_factor_at_expiry: BTreeMap<u64, U256>,
}

impl OrderPool {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            current_sales_rate: U256::ZERO,
            reward_factor: U256::ZERO,
            sales_rate_ending_at: BTreeMap::new(),
            reward_factor_at_expiry: BTreeMap::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn current_sales_rate(&self) -> U256 {
        self.current_sales_rate
    }

    pub fn reward_factor(&self) -> U256 {
        self.reward_factor
    }

    /// Scheduled rate decrement at `timestamp`, zero if none is pending
    pub fn sales_rate_ending_at(&self, timestamp: u64) -> U256 {
        self.sales_rate_ending_at
            .get(&timestamp)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Reward factor recorded when the engine crossed the expiry `timestamp`
    pub fn reward_factor_at_expiry(&self, timestamp: u64) -> Option<U256> {
        self.reward_factor_at_expiry.get(&timestamp).copied()
    }

    /// Earliest scheduled expiration strictly after `timestamp`
    pub fn next_expiry_after(&self, timestamp: u64) -> Option<u64> {
        self.sales_rate_ending_at
            .range((Excluded(timestamp), Unbounded))
            .next()
            .map(|(ts, _)| *ts)
    }

    /// Scheduled expirations in `(after, up_to]`
    pub fn expiries_between(&self, after: u64, up_to: u64) -> impl Iterator<Item = u64> + '_ {
        self.sales_rate_ending_at
            .range((Excluded(after), Included(up_to.max(after))))
            .map(|(ts, _)| *ts)
    }

    pub(crate) fn add_order(&mut self, sales_rate: U256, expiration: u64) -> TwammResult<()> {
        self.current_sales_rate = self
            .current_sales_rate
            .checked_add(sales_rate)
            .ok_or(TwammError::MathOverflow)?;
        let ending = self.sales_rate_ending_at.entry(expiration).or_insert(U256::ZERO);
        *ending = ending.checked_add(sales_rate).ok_or(TwammError::MathOverflow)?;
        Ok(())
    }

    /// Withdraw a still-running order's rate and its scheduled decrement
    pub(crate) fn remove_order(&mut self, sales_rate: U256, expiration: u64) -> TwammResult<()> {
        self.current_sales_rate = self
            .current_sales_rate
            .checked_sub(sales_rate)
            .ok_or(TwammError::MathUnderflow)?;
        let ending = self
            .sales_rate_ending_at
            .get_mut(&expiration)
            .ok_or(TwammError::MathUnderflow)?;
        *ending = ending.checked_sub(sales_rate).ok_or(TwammError::MathUnderflow)?;
        if *ending == U256::ZERO {
            self.sales_rate_ending_at.remove(&expiration);
        }
        Ok(())
    }

    /// Credit `amount_out` bought during a step to every order in the pool
    pub(crate) fn distribute(&mut self, amount_out: u128) -> TwammResult<()> {
        if self.current_sales_rate == U256::ZERO || amount_out == 0 {
            return Ok(());
        }
        let delta = reward_factor_delta(amount_out, self.current_sales_rate)?;
        self.reward_factor = self.reward_factor.wrapping_add(delta);
        Ok(())
    }

    pub(crate) fn has_expiry_at(&self, timestamp: u64) -> bool {
        self.sales_rate_ending_at.contains_key(&timestamp)
    }

    /// Apply the decrement scheduled at `timestamp`, if any, and snapshot the
    /// reward factor for the orders expiring there.
    pub(crate) fn cross_boundary(&mut self, timestamp: u64) -> TwammResult<bool> {
        match self.sales_rate_ending_at.remove(&timestamp) {
            Some(ending) => {
                self.current_sales_rate = self
                    .current_sales_rate
                    .checked_sub(ending)
                    .ok_or(TwammError::MathUnderflow)?;
                self.reward_factor_at_expiry.insert(timestamp, self.reward_factor);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn restore_totals(&mut self, current_sales_rate: U256, reward_factor: U256) {
        self.current_sales_rate = current_sales_rate;
        self.reward_factor = reward_factor;
    }

    pub(crate) fn scheduled_ending(&self, timestamp: u64) -> Option<U256> {
        self.sales_rate_ending_at.get(&timestamp).copied()
    }

    pub(crate) fn restore_ending(&mut self, timestamp: u64, value: Option<U256>) {
        match value {
            Some(value) => self.sales_rate_ending_at.insert(timestamp, value),
            None => self.sales_rate_ending_at.remove(&timestamp),
        };
    }

    pub(crate) fn restore_expiry_snapshot(&mut self, timestamp: u64, value: Option<U256>) {
        match value {
            Some(value) => self.reward_factor_at_expiry.insert(timestamp, value),
            None => self.reward_factor_at_expiry.remove(&timestamp),
        };
    }

    /// Running totals without the expiry history
    pub(crate) fn pending(&self) -> Self {
        Self {
            direction: self.direction,
            current_sales_rate: self.current_sales_rate,
            reward_factor: self.reward_factor,
            sales_rate_ending_at: self.sales_rate_ending_at.clone(),
            reward_factor_at_expiry: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Order Registry
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderRegistry {
    orders: BTreeMap<OrderId, Order>,
    by_owner: BTreeMap<AccountId, Vec<OrderId>>,
    next_order_id: OrderId,
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_order_id(&self) -> OrderId {
        self.next_order_id
    }

    pub fn get(&self, id: OrderId) -> TwammResult<&Order> {
        self.orders.get(&id).ok_or(TwammError::OrderNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: OrderId) -> TwammResult<&mut Order> {
        self.orders.get_mut(&id).ok_or(TwammError::OrderNotFound(id))
    }

    pub fn ids_for_owner(&self, owner: &AccountId) -> &[OrderId] {
        self.by_owner.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Orders in `direction` whose rate counts toward the pool at `timestamp`
    pub fn active_orders(&self, direction: Direction, timestamp: u64) -> impl Iterator<Item = &Order> {
        self.orders
            .values()
            .filter(move |order| order.direction == direction && order.contributes_at(timestamp))
    }

    /// Sum of active order rates, the value each pool's current rate must match
    pub fn active_sales_rate(&self, direction: Direction, timestamp: u64) -> U256 {
        self.active_orders(direction, timestamp)
            .fold(U256::ZERO, |acc, order| acc.wrapping_add(order.sales_rate))
    }

    /// Register an order under the next identifier
    pub(crate) fn insert(
        &mut self,
        owner: AccountId,
        direction: Direction,
        sales_rate: U256,
        submission_timestamp: u64,
        expiration_timestamp: u64,
        reward_factor: U256,
    ) -> TwammResult<OrderId> {
        let id = self.next_order_id;
        self.next_order_id = id.checked_add(1).ok_or(TwammError::MathOverflow)?;
        self.by_owner.entry(owner.clone()).or_default().push(id);
        self.orders.insert(
            id,
            Order {
                id,
                owner,
                direction,
                sales_rate,
                submission_timestamp,
                expiration_timestamp,
                reward_factor_at_last_checkpoint: reward_factor,
                cancelled: false,
                fully_withdrawn: false,
            },
        );
        Ok(id)
    }

    pub(crate) fn restore_next_order_id(&mut self, id: OrderId) {
        self.next_order_id = id;
    }

    pub(crate) fn restore_order(&mut self, id: OrderId, order: Option<Order>) {
        match order {
            Some(order) => self.orders.insert(id, order),
            None => self.orders.remove(&id),
        };
    }

    pub(crate) fn truncate_owner_orders(&mut self, owner: &AccountId, len: usize) {
        if let Some(ids) = self.by_owner.get_mut(owner) {
            ids.truncate(len);
            if ids.is_empty() {
                self.by_owner.remove(owner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(value: u128) -> U256 {
        U256::from(value) << 64
    }

    #[test]
    fn test_pool_schedules_and_crosses_boundaries() {
        let mut pool = OrderPool::new(Direction::ZeroForOne);
        pool.add_order(rate(2), 7_200).unwrap();
        pool.add_order(rate(3), 10_800).unwrap();
        pool.add_order(rate(5), 7_200).unwrap();

        assert_eq!(pool.current_sales_rate(), rate(10));
        assert_eq!(pool.sales_rate_ending_at(7_200), rate(7));
        assert_eq!(pool.next_expiry_after(0), Some(7_200));
        assert_eq!(pool.next_expiry_after(7_200), Some(10_800));
        assert_eq!(pool.expiries_between(0, 10_800).count(), 2);
        assert_eq!(pool.expiries_between(7_200, 7_200).count(), 0);

        pool.distribute(1_000).unwrap();
        assert!(pool.cross_boundary(7_200).unwrap());
        assert!(!pool.cross_boundary(7_200).unwrap());
        assert_eq!(pool.current_sales_rate(), rate(3));
        assert_eq!(pool.reward_factor_at_expiry(7_200), Some(pool.reward_factor()));
        assert_eq!(pool.sales_rate_ending_at(7_200), U256::ZERO);
    }

    #[test]
    fn test_remove_order_clears_empty_schedule() {
        let mut pool = OrderPool::new(Direction::OneForZero);
        pool.add_order(rate(4), 3_600).unwrap();
        pool.remove_order(rate(4), 3_600).unwrap();
        assert_eq!(pool.current_sales_rate(), U256::ZERO);
        assert_eq!(pool.next_expiry_after(0), None);
        assert_eq!(pool.remove_order(rate(1), 3_600), Err(TwammError::MathUnderflow));
    }

    #[test]
    fn test_distribute_skips_idle_pool() {
        let mut pool = OrderPool::new(Direction::ZeroForOne);
        pool.distribute(500).unwrap();
        assert_eq!(pool.reward_factor(), U256::ZERO);
    }

    #[test]
    fn test_registry_assigns_monotonic_ids() {
        let mut registry = OrderRegistry::new();
        let alice = AccountId::from("alice");
        let a = registry
            .insert(alice.clone(), Direction::ZeroForOne, rate(1), 0, 3_600, U256::ZERO)
            .unwrap();
        let b = registry
            .insert(AccountId::from("bob"), Direction::OneForZero, rate(1), 0, 7_200, U256::ZERO)
            .unwrap();
        let c = registry
            .insert(alice.clone(), Direction::ZeroForOne, rate(2), 100, 7_200, U256::ZERO)
            .unwrap();

        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(registry.next_order_id(), 3);
        assert_eq!(registry.ids_for_owner(&alice), &[0, 2]);
        assert_eq!(registry.active_sales_rate(Direction::ZeroForOne, 50), rate(1));
        assert_eq!(registry.active_sales_rate(Direction::ZeroForOne, 4_000), rate(2));
        assert_eq!(registry.get(9).unwrap_err(), TwammError::OrderNotFound(9));
    }
}
