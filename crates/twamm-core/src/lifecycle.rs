//! # Order Lifecycle
//!
//! Submission, cancellation and withdrawal of long-term orders. Each operation
//! synchronizes the engine first. Cancellation and withdrawal only require the
//! engine to reach `min(now, expiration)`, so an order never depends on
//! boundaries beyond its own lifetime.

use ethnum::U256;
use tracing::info;

use crate::constants::MAX_ORDER_INTERVALS;
use crate::engine::PairState;
use crate::errors::{TwammError, TwammResult};
use crate::math::{amount_sold, proceeds_since, safe_add_u64, safe_mul_u64, sales_rate_for};
use crate::types::{
    AccountId, CancelResult, Direction, ExecutionStep, Order, OrderId, WithdrawResult,
};

/// A freshly registered order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub order_id: OrderId,
    pub sales_rate: U256,
    pub expiration_timestamp: u64,
}

impl PairState {
    /// Expiration for an order submitted at `now` spanning `intervals`
    /// intervals after the current one.
    pub fn expiration_for(&self, now: u64, intervals: u64) -> TwammResult<u64> {
        let interval = self.params().order_time_interval;
        let last_boundary = now - now % interval;
        let span = safe_mul_u64(safe_add_u64(intervals, 1)?, interval)?;
        safe_add_u64(last_boundary, span)
    }

    pub(crate) fn submit_long_term_order(
        &mut self,
        owner: AccountId,
        direction: Direction,
        amount_in: u128,
        intervals: u64,
        now: u64,
    ) -> TwammResult<(Submission, Vec<ExecutionStep>)> {
        if amount_in == 0 {
            return Err(TwammError::InvalidAmount);
        }
        if intervals == 0 || intervals > MAX_ORDER_INTERVALS {
            return Err(TwammError::InvalidDuration(intervals));
        }

        let steps = self.catch_up_to(now, now)?;

        let (reserve0, reserve1) = self.reserves().reserves();
        if reserve0 == 0 || reserve1 == 0 {
            return Err(TwammError::InsufficientLiquidity);
        }

        let expiration = self.expiration_for(now, intervals)?;
        let sales_rate = sales_rate_for(amount_in, expiration - now)?;
        if sales_rate == U256::ZERO {
            return Err(TwammError::InvalidAmount);
        }

        self.reserves_mut()
            .deposit_twamm(direction.token_in_index(), amount_in)?;
        let reward_factor = self.schedule_order(direction, sales_rate, expiration)?;
        let order_id = self.register_order(
            owner.clone(),
            direction,
            sales_rate,
            now,
            expiration,
            reward_factor,
        )?;

        info!(
            order_id,
            owner = %owner,
            direction = %direction,
            amount_in,
            expiration,
            "long-term order submitted"
        );
        Ok((
            Submission {
                order_id,
                sales_rate,
                expiration_timestamp: expiration,
            },
            steps,
        ))
    }

    pub(crate) fn cancel_long_term_order(
        &mut self,
        caller: &AccountId,
        order_id: OrderId,
        now: u64,
    ) -> TwammResult<(CancelResult, Vec<ExecutionStep>)> {
        let order = self.registry().get(order_id)?.clone();
        if &order.owner != caller {
            return Err(TwammError::Unauthorized);
        }
        if order.is_finalized() {
            return Err(TwammError::OrderAlreadyFinalized(order_id));
        }

        let steps = self.catch_up_to(order.expiration_timestamp, now)?;

        let (refund, reward_factor) = if now < order.expiration_timestamp {
            let refund = amount_sold(order.sales_rate, order.expiration_timestamp - now)?;
            let reward_factor =
                self.unschedule_order(order.direction, order.sales_rate, order.expiration_timestamp)?;
            (refund, reward_factor)
        } else {
            (0, self.expiry_reward_factor(&order)?)
        };
        let proceeds = proceeds_since(
            reward_factor,
            order.reward_factor_at_last_checkpoint,
            order.sales_rate,
        )?;

        let reserves = self.reserves_mut();
        reserves.release_twamm(order.direction.token_in_index(), refund)?;
        reserves.release_twamm(order.direction.token_out_index(), proceeds)?;

        let stored = self.order_mut(order_id)?;
        stored.cancelled = true;
        stored.reward_factor_at_last_checkpoint = reward_factor;

        info!(order_id, refund, proceeds, "long-term order cancelled");
        Ok((CancelResult { refund, proceeds }, steps))
    }

    pub(crate) fn withdraw_proceeds(
        &mut self,
        caller: &AccountId,
        order_id: OrderId,
        now: u64,
    ) -> TwammResult<(WithdrawResult, Vec<ExecutionStep>)> {
        let order = self.registry().get(order_id)?.clone();
        if &order.owner != caller {
            return Err(TwammError::Unauthorized);
        }
        if order.is_finalized() {
            return Err(TwammError::NothingToWithdraw(order_id));
        }

        let steps = self.catch_up_to(order.expiration_timestamp, now)?;

        let expired = now >= order.expiration_timestamp;
        let reward_factor = if expired {
            self.expiry_reward_factor(&order)?
        } else {
            self.pool(order.direction).reward_factor()
        };
        let proceeds = proceeds_since(
            reward_factor,
            order.reward_factor_at_last_checkpoint,
            order.sales_rate,
        )?;

        self.reserves_mut()
            .release_twamm(order.direction.token_out_index(), proceeds)?;

        let stored = self.order_mut(order_id)?;
        stored.reward_factor_at_last_checkpoint = reward_factor;
        stored.fully_withdrawn = expired;

        info!(order_id, proceeds, fully_withdrawn = expired, "long-term order proceeds withdrawn");
        Ok((
            WithdrawResult {
                proceeds,
                fully_withdrawn: expired,
            },
            steps,
        ))
    }

    /// Proceeds owed to an order against the engine's current position
    pub fn order_proceeds(&self, order_id: OrderId) -> TwammResult<u128> {
        let order = self.registry().get(order_id)?;
        if order.is_finalized() {
            return Ok(0);
        }
        let reward_factor = if self.last_virtual_order_timestamp() >= order.expiration_timestamp {
            self.expiry_reward_factor(order)?
        } else {
            self.pool(order.direction).reward_factor()
        };
        proceeds_since(
            reward_factor,
            order.reward_factor_at_last_checkpoint,
            order.sales_rate,
        )
    }

    fn expiry_reward_factor(&self, order: &Order) -> TwammResult<U256> {
        self.pool(order.direction)
            .reward_factor_at_expiry(order.expiration_timestamp)
            .ok_or_else(|| {
                TwammError::InconsistentState(format!(
                    "no reward snapshot at expiry {} of order {}",
                    order.expiration_timestamp, order.id
                ))
            })
    }
}
