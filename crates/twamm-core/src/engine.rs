//! # Virtual Order Execution Engine
//!
//! [`PairState`] is the single owned state of a pair. The engine advances it
//! from `last_virtual_order_timestamp` toward a target, one step per scheduled
//! expiration, settling each step with the closed-form trade. Sales rates only
//! change at expirations, so each step sees constant rates.
//!
//! Every call crosses at most `max_boundaries_per_call` expirations. Reaching
//! that cap is not an error for [`PairState::execute_virtual_orders`]: it stops
//! on the last boundary crossed and reports an incomplete [`CatchUp`].
//!
//! All mutation goes through helpers that record the touched location in the
//! active [`Journal`], so a failed call rolls back only what it changed.

use std::collections::BTreeSet;

use ethnum::U256;
use tracing::{debug, warn};

use crate::constants::DEFAULT_MAX_BOUNDARIES_PER_CALL;
use crate::errors::{TwammError, TwammResult};
use crate::journal::{Journal, Original, StateKey};
use crate::math::{amount_sold, compute_virtual_balances};
use crate::order_pool::{OrderPool, OrderRegistry};
use crate::reserves::ReserveManager;
use crate::types::{
    AccountId, CatchUp, Direction, ExecutionStep, Order, OrderId, TwammReserves, TwammState,
};

/// Static pair parameters fixed by the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairParams {
    pub order_time_interval: u64,
    pub fee_bps: u32,
    pub max_boundaries_per_call: usize,
}

impl Default for PairParams {
    fn default() -> Self {
        Self {
            order_time_interval: crate::constants::DEFAULT_ORDER_TIME_INTERVAL,
            fee_bps: crate::constants::DEFAULT_FEE_BPS,
            max_boundaries_per_call: DEFAULT_MAX_BOUNDARIES_PER_CALL,
        }
    }
}

impl PairParams {
    pub fn validate(&self) -> TwammResult<()> {
        if self.order_time_interval == 0 {
            return Err(TwammError::InvalidInterval(self.order_time_interval));
        }
        if self.max_boundaries_per_call == 0 {
            return Err(TwammError::InvalidParameter(
                "max_boundaries_per_call must be positive".to_string(),
            ));
        }
        crate::math::validate_fee(self.fee_bps)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairState {
    reserves: ReserveManager,
    pools: [OrderPool; 2],
    registry: OrderRegistry,
    last_virtual_order_timestamp: u64,
    params: PairParams,
    journal: Option<Journal>,
}

impl PairState {
    pub fn new(params: PairParams, created_at: u64) -> TwammResult<Self> {
        params.validate()?;
        Ok(Self {
            reserves: ReserveManager::new(params.fee_bps)?,
            pools: [
                OrderPool::new(Direction::ZeroForOne),
                OrderPool::new(Direction::OneForZero),
            ],
            registry: OrderRegistry::new(),
            last_virtual_order_timestamp: created_at,
            params,
            journal: None,
        })
    }

    pub fn params(&self) -> PairParams {
        self.params
    }

    pub fn last_virtual_order_timestamp(&self) -> u64 {
        self.last_virtual_order_timestamp
    }

    pub fn reserves(&self) -> &ReserveManager {
        &self.reserves
    }

    pub fn registry(&self) -> &OrderRegistry {
        &self.registry
    }

    pub fn pool(&self, direction: Direction) -> &OrderPool {
        &self.pools[direction.token_in_index()]
    }

    pub fn twamm_reserves(&self) -> TwammReserves {
        self.reserves.view(self.last_virtual_order_timestamp)
    }

    pub fn twamm_state(&self) -> TwammState {
        let [pool0, pool1] = &self.pools;
        TwammState {
            order_time_interval: self.params.order_time_interval,
            last_virtual_order_timestamp: self.last_virtual_order_timestamp,
            sales_rate0: pool0.current_sales_rate(),
            sales_rate1: pool1.current_sales_rate(),
            reward_factor0: pool0.reward_factor(),
            reward_factor1: pool1.reward_factor(),
        }
    }

    /// Whether no time has passed since the engine last ran
    pub fn is_up_to_date(&self, now: u64) -> bool {
        self.last_virtual_order_timestamp >= now
    }

    /// Distinct scheduled expirations in `(last_virtual_order_timestamp, target]`
    pub fn pending_boundaries(&self, target: u64) -> usize {
        let last = self.last_virtual_order_timestamp;
        self.pools
            .iter()
            .flat_map(|pool| pool.expiries_between(last, target))
            .collect::<BTreeSet<_>>()
            .len()
    }

    fn next_expiry(&self) -> Option<u64> {
        let last = self.last_virtual_order_timestamp;
        self.pools
            .iter()
            .filter_map(|pool| pool.next_expiry_after(last))
            .min()
    }

    /// Advance toward `min(target, now)`, crossing at most
    /// `max_boundaries_per_call` scheduled expirations. Progress made before
    /// the cap is kept. Returns every settled step alongside the outcome.
    pub fn execute_virtual_orders(
        &mut self,
        target: u64,
        now: u64,
    ) -> TwammResult<(CatchUp, Vec<ExecutionStep>)> {
        let target = target.min(now);
        let mut steps = Vec::new();
        let mut crossed = 0usize;

        while self.last_virtual_order_timestamp < target {
            let (next, is_boundary) = match self.next_expiry() {
                Some(expiry) if expiry <= target => (expiry, true),
                _ => (target, false),
            };
            if is_boundary && crossed >= self.params.max_boundaries_per_call {
                warn!(
                    reached = self.last_virtual_order_timestamp,
                    target,
                    pending = self.pending_boundaries(target),
                    "virtual order execution hit boundary cap"
                );
                break;
            }

            let step = self.step_to(next).map_err(|err| match err {
                TwammError::MathOverflow | TwammError::MathUnderflow | TwammError::DivisionByZero => {
                    TwammError::ExecutionOverflow {
                        reached: self.last_virtual_order_timestamp,
                        target,
                    }
                }
                other => other,
            })?;
            steps.push(step);
            if is_boundary {
                crossed += 1;
            }
        }

        let catch_up = CatchUp {
            reached: self.last_virtual_order_timestamp,
            boundaries_crossed: crossed,
            complete: self.last_virtual_order_timestamp >= target,
        };
        Ok((catch_up, steps))
    }

    /// Catch up to `min(bound, now)` or fail with `ExecutionOverflow`
    pub(crate) fn catch_up_to(&mut self, bound: u64, now: u64) -> TwammResult<Vec<ExecutionStep>> {
        // A clock behind the engine would double count time already sold.
        if now < self.last_virtual_order_timestamp {
            return Err(TwammError::StaleOrOutOfRangeTimestamp {
                requested: now,
                last: self.last_virtual_order_timestamp,
            });
        }
        let (catch_up, steps) = self.execute_virtual_orders(bound, now)?;
        if !catch_up.complete {
            return Err(TwammError::ExecutionOverflow {
                reached: catch_up.reached,
                target: bound.min(now),
            });
        }
        Ok(steps)
    }

    /// Reserves the pair would hold once caught up to `timestamp`, without
    /// mutating state and without a boundary cap.
    pub fn reserves_after_twamm(&self, timestamp: u64) -> TwammResult<TwammReserves> {
        if timestamp < self.last_virtual_order_timestamp {
            return Err(TwammError::StaleOrOutOfRangeTimestamp {
                requested: timestamp,
                last: self.last_virtual_order_timestamp,
            });
        }
        let mut preview = PairState {
            reserves: self.reserves.clone(),
            pools: [self.pools[0].pending(), self.pools[1].pending()],
            registry: OrderRegistry::new(),
            last_virtual_order_timestamp: self.last_virtual_order_timestamp,
            params: PairParams {
                max_boundaries_per_call: usize::MAX,
                ..self.params
            },
            journal: None,
        };
        preview.execute_virtual_orders(timestamp, timestamp)?;
        Ok(preview.twamm_reserves())
    }

    /// Settle the constant-rate interval ending at `next`
    fn step_to(&mut self, next: u64) -> TwammResult<ExecutionStep> {
        let start = self.last_virtual_order_timestamp;
        let elapsed = next - start;
        let rate0 = self.pools[0].current_sales_rate();
        let rate1 = self.pools[1].current_sales_rate();

        let mut step = ExecutionStep {
            start,
            end: next,
            ..ExecutionStep::default()
        };

        let sold0 = amount_sold(rate0, elapsed)?;
        let sold1 = amount_sold(rate1, elapsed)?;
        if sold0 > 0 || sold1 > 0 {
            let (reserve0, reserve1) = self.reserves.reserves();
            let trade =
                compute_virtual_balances(reserve0, reserve1, sold0, sold1, self.reserves.fee_bps())?;
            self.reserves_mut().settle_step([sold0, sold1], &trade)?;
            self.distribute(0, trade.amount_out1)?;
            self.distribute(1, trade.amount_out0)?;

            step.sold0 = sold0;
            step.sold1 = sold1;
            step.purchased0 = trade.amount_out0;
            step.purchased1 = trade.amount_out1;
        }

        (step.reserve0, step.reserve1) = self.reserves.reserves();
        let crossed0 = self.cross_boundary(0, next)?;
        let crossed1 = self.cross_boundary(1, next)?;
        self.touch(StateKey::LastVirtualOrderTimestamp);
        self.last_virtual_order_timestamp = next;

        debug!(
            start,
            end = next,
            sold0 = step.sold0,
            sold1 = step.sold1,
            purchased0 = step.purchased0,
            purchased1 = step.purchased1,
            boundary = crossed0 || crossed1,
            "virtual order step"
        );
        Ok(step)
    }

    // ========================================================================
    // Journaled Mutation
    // ========================================================================

    /// Start tracking originals for a mutating call
    pub(crate) fn begin(&mut self) {
        self.journal = Some(Journal::new());
    }

    /// Keep every change since [`PairState::begin`]. Returns the number of
    /// distinct locations the call touched.
    pub(crate) fn commit(&mut self) -> usize {
        self.journal.take().map_or(0, |journal| journal.len())
    }

    /// Restore every location touched since [`PairState::begin`]
    pub(crate) fn rollback(&mut self) {
        if let Some(journal) = self.journal.take() {
            let touched = journal.len();
            for original in journal.into_originals() {
                self.restore(original);
            }
            debug!(touched, "pair state rolled back");
        }
    }

    fn touch(&mut self, key: StateKey) {
        match &self.journal {
            Some(journal) if !journal.is_tracked(&key) => {}
            _ => return,
        }
        let original = self.capture(&key);
        if let Some(journal) = self.journal.as_mut() {
            journal.record(key, original);
        }
    }

    fn capture(&self, key: &StateKey) -> Original {
        match key {
            StateKey::Reserves => Original::Reserves(self.reserves.clone()),
            StateKey::LastVirtualOrderTimestamp => {
                Original::LastVirtualOrderTimestamp(self.last_virtual_order_timestamp)
            }
            StateKey::PoolTotals(pool) => Original::PoolTotals {
                pool: *pool,
                current_sales_rate: self.pools[*pool].current_sales_rate(),
                reward_factor: self.pools[*pool].reward_factor(),
            },
            StateKey::SalesRateEnding(pool, timestamp) => Original::SalesRateEnding {
                pool: *pool,
                timestamp: *timestamp,
                value: self.pools[*pool].scheduled_ending(*timestamp),
            },
            StateKey::RewardFactorAtExpiry(pool, timestamp) => Original::RewardFactorAtExpiry {
                pool: *pool,
                timestamp: *timestamp,
                value: self.pools[*pool].reward_factor_at_expiry(*timestamp),
            },
            StateKey::NextOrderId => Original::NextOrderId(self.registry.next_order_id()),
            StateKey::Order(id) => Original::Order {
                id: *id,
                order: self.registry.get(*id).ok().cloned(),
            },
            StateKey::OwnerOrders(owner) => Original::OwnerOrders {
                owner: owner.clone(),
                len: self.registry.ids_for_owner(owner).len(),
            },
        }
    }

    fn restore(&mut self, original: Original) {
        match original {
            Original::Reserves(reserves) => self.reserves = reserves,
            Original::LastVirtualOrderTimestamp(timestamp) => {
                self.last_virtual_order_timestamp = timestamp
            }
            Original::PoolTotals {
                pool,
                current_sales_rate,
                reward_factor,
            } => self.pools[pool].restore_totals(current_sales_rate, reward_factor),
            Original::SalesRateEnding {
                pool,
                timestamp,
                value,
            } => self.pools[pool].restore_ending(timestamp, value),
            Original::RewardFactorAtExpiry {
                pool,
                timestamp,
                value,
            } => self.pools[pool].restore_expiry_snapshot(timestamp, value),
            Original::NextOrderId(id) => self.registry.restore_next_order_id(id),
            Original::Order { id, order } => self.registry.restore_order(id, order),
            Original::OwnerOrders { owner, len } => self.registry.truncate_owner_orders(&owner, len),
        }
    }

    pub(crate) fn reserves_mut(&mut self) -> &mut ReserveManager {
        self.touch(StateKey::Reserves);
        &mut self.reserves
    }

    /// Add a running order to its pool; returns the pool's reward factor
    pub(crate) fn schedule_order(
        &mut self,
        direction: Direction,
        sales_rate: U256,
        expiration: u64,
    ) -> TwammResult<U256> {
        let pool = direction.token_in_index();
        self.touch(StateKey::PoolTotals(pool));
        self.touch(StateKey::SalesRateEnding(pool, expiration));
        self.pools[pool].add_order(sales_rate, expiration)?;
        Ok(self.pools[pool].reward_factor())
    }

    /// Pull a running order out of its pool; returns the pool's reward factor
    pub(crate) fn unschedule_order(
        &mut self,
        direction: Direction,
        sales_rate: U256,
        expiration: u64,
    ) -> TwammResult<U256> {
        let pool = direction.token_in_index();
        self.touch(StateKey::PoolTotals(pool));
        self.touch(StateKey::SalesRateEnding(pool, expiration));
        self.pools[pool].remove_order(sales_rate, expiration)?;
        Ok(self.pools[pool].reward_factor())
    }

    pub(crate) fn register_order(
        &mut self,
        owner: AccountId,
        direction: Direction,
        sales_rate: U256,
        submission_timestamp: u64,
        expiration_timestamp: u64,
        reward_factor: U256,
    ) -> TwammResult<OrderId> {
        let id = self.registry.next_order_id();
        self.touch(StateKey::NextOrderId);
        self.touch(StateKey::Order(id));
        self.touch(StateKey::OwnerOrders(owner.clone()));
        self.registry.insert(
            owner,
            direction,
            sales_rate,
            submission_timestamp,
            expiration_timestamp,
            reward_factor,
        )
    }

    pub(crate) fn order_mut(&mut self, id: OrderId) -> TwammResult<&mut Order> {
        self.touch(StateKey::Order(id));
        self.registry.get_mut(id)
    }

    fn distribute(&mut self, pool: usize, amount_out: u128) -> TwammResult<()> {
        self.touch(StateKey::PoolTotals(pool));
        self.pools[pool].distribute(amount_out)
    }

    fn cross_boundary(&mut self, pool: usize, timestamp: u64) -> TwammResult<bool> {
        if self.pools[pool].has_expiry_at(timestamp) {
            self.touch(StateKey::PoolTotals(pool));
            self.touch(StateKey::SalesRateEnding(pool, timestamp));
            self.touch(StateKey::RewardFactorAtExpiry(pool, timestamp));
        }
        self.pools[pool].cross_boundary(timestamp)
    }
}
