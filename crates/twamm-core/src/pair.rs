//! # TWAMM Pair
//!
//! External surface of one trading pair. Every mutating call journals the
//! state it touches and commits only if it succeeds, so a failed call never
//! leaves partial changes behind. Capped progress from
//! [`TwammPair::execute_virtual_orders`] is itself a successful result.

use ethnum::U256;
use tracing::{debug, info};

use crate::clock::Context;
use crate::engine::{PairParams, PairState};
use crate::errors::{TwammError, TwammResult};
use crate::lifecycle::Submission;
use crate::liquidity::LiquidityLedger;
use crate::pause::PauseController;
use crate::types::{
    AccountId, CancelResult, CatchUp, DetailedOrder, Direction, ExecutionStep, LiquidityResult, OrderId,
    OrderView, PairEvent, SwapResult, TwammReserves, TwammState, WithdrawResult,
};

#[derive(Debug, Clone)]
pub struct TwammPair {
    token0: String,
    token1: String,
    state: PairState,
    liquidity: LiquidityLedger,
    pause: PauseController,
    events: Vec<PairEvent>,
}

/// Journaled view of the pair a mutating call operates on
struct Working<'a> {
    state: &'a mut PairState,
    liquidity: &'a mut LiquidityLedger,
    events: Vec<PairEvent>,
}

impl Working<'_> {
    fn record_steps(&mut self, steps: &[ExecutionStep]) {
        let mut reserves_changed = false;
        for step in steps.iter().filter(|s| s.sold0 > 0 || s.sold1 > 0) {
            self.events.push(PairEvent::VirtualOrderExecution {
                timestamp: step.end,
                reserve0: step.reserve0,
                reserve1: step.reserve1,
                sold0: step.sold0,
                sold1: step.sold1,
                purchased0: step.purchased0,
                purchased1: step.purchased1,
            });
            reserves_changed = true;
        }
        if reserves_changed {
            self.sync();
        }
    }

    fn sync(&mut self) {
        let (reserve0, reserve1) = self.state.reserves().reserves();
        self.events.push(PairEvent::Sync { reserve0, reserve1 });
    }
}

impl TwammPair {
    pub fn new(
        token0: impl Into<String>,
        token1: impl Into<String>,
        params: PairParams,
        admin: AccountId,
        created_at: u64,
    ) -> TwammResult<Self> {
        Ok(Self {
            token0: token0.into(),
            token1: token1.into(),
            state: PairState::new(params, created_at)?,
            liquidity: LiquidityLedger::default(),
            pause: PauseController::new(admin),
            events: Vec::new(),
        })
    }

    fn atomically<T>(
        &mut self,
        ctx: &Context,
        op: impl FnOnce(&mut Working<'_>) -> TwammResult<T>,
    ) -> TwammResult<T> {
        let ledger = self.liquidity.checkpoint(&ctx.caller);
        self.state.begin();
        let mut working = Working {
            state: &mut self.state,
            liquidity: &mut self.liquidity,
            events: Vec::new(),
        };
        let outcome = op(&mut working);
        let events = working.events;

        match outcome {
            Ok(result) => {
                let touched = self.state.commit();
                debug!(pair = %self.name(), touched, "pair call committed");
                for event in events {
                    self.emit(event);
                }
                Ok(result)
            }
            Err(err) => {
                self.state.rollback();
                self.liquidity.restore(ledger);
                Err(err)
            }
        }
    }

    fn emit(&mut self, event: PairEvent) {
        debug!(pair = %self.name(), event = event.name(), ?event, "pair event");
        self.events.push(event);
    }

    // ========================================================================
    // Liquidity
    // ========================================================================

    pub fn add_liquidity(&mut self, ctx: &Context, amount0: u128, amount1: u128) -> TwammResult<LiquidityResult> {
        if amount0 == 0 || amount1 == 0 {
            return Err(TwammError::InvalidAmount);
        }
        self.atomically(ctx, |w| {
            let steps = w.state.catch_up_to(ctx.timestamp, ctx.timestamp)?;
            w.record_steps(&steps);

            let (reserve0, reserve1) = w.state.reserves().reserves();
            let shares = w.liquidity.mint(&ctx.caller, amount0, amount1, reserve0, reserve1)?;
            w.state.reserves_mut().add_liquidity(amount0, amount1)?;

            w.events.push(PairEvent::Mint {
                sender: ctx.caller.clone(),
                amount0,
                amount1,
                shares,
            });
            w.sync();
            Ok(LiquidityResult {
                shares,
                amount0,
                amount1,
            })
        })
    }

    pub fn remove_liquidity(&mut self, ctx: &Context, shares: u128) -> TwammResult<LiquidityResult> {
        self.atomically(ctx, |w| {
            let steps = w.state.catch_up_to(ctx.timestamp, ctx.timestamp)?;
            w.record_steps(&steps);

            let (reserve0, reserve1) = w.state.reserves().reserves();
            let (amount0, amount1) = w.liquidity.burn(&ctx.caller, shares, reserve0, reserve1)?;
            w.state.reserves_mut().remove_liquidity(amount0, amount1)?;

            w.events.push(PairEvent::Burn {
                sender: ctx.caller.clone(),
                amount0,
                amount1,
                shares,
            });
            w.sync();
            Ok(LiquidityResult {
                shares,
                amount0,
                amount1,
            })
        })
    }

    // ========================================================================
    // Instant Swaps
    // ========================================================================

    /// Swap against the instant reserves after catching up to now
    pub fn swap(
        &mut self,
        ctx: &Context,
        direction: Direction,
        amount_in: u128,
        min_amount_out: u128,
    ) -> TwammResult<SwapResult> {
        self.atomically(ctx, |w| {
            let steps = w.state.catch_up_to(ctx.timestamp, ctx.timestamp)?;
            w.record_steps(&steps);

            let result = w.state.reserves_mut().instant_swap(direction, amount_in)?;
            if result.amount_out < min_amount_out {
                return Err(TwammError::SlippageExceeded {
                    amount_out: result.amount_out,
                    min_amount_out,
                });
            }

            w.events.push(PairEvent::Swap {
                sender: ctx.caller.clone(),
                token_in: direction.token_in_index(),
                amount_in,
                amount_out: result.amount_out,
            });
            w.sync();
            Ok(result)
        })
    }

    // ========================================================================
    // Long-Term Orders
    // ========================================================================

    pub fn long_term_swap_from_0_to_1(
        &mut self,
        ctx: &Context,
        amount_in: u128,
        number_of_intervals: u64,
    ) -> TwammResult<OrderId> {
        self.long_term_swap(ctx, Direction::ZeroForOne, amount_in, number_of_intervals)
            .map(|s| s.order_id)
    }

    pub fn long_term_swap_from_1_to_0(
        &mut self,
        ctx: &Context,
        amount_in: u128,
        number_of_intervals: u64,
    ) -> TwammResult<OrderId> {
        self.long_term_swap(ctx, Direction::OneForZero, amount_in, number_of_intervals)
            .map(|s| s.order_id)
    }

    pub fn long_term_swap(
        &mut self,
        ctx: &Context,
        direction: Direction,
        amount_in: u128,
        number_of_intervals: u64,
    ) -> TwammResult<Submission> {
        self.pause.ensure_new_swaps_allowed()?;
        self.atomically(ctx, |w| {
            let (submission, steps) = w.state.submit_long_term_order(
                ctx.caller.clone(),
                direction,
                amount_in,
                number_of_intervals,
                ctx.timestamp,
            )?;
            w.record_steps(&steps);
            w.events.push(PairEvent::LongTermSwap {
                owner: ctx.caller.clone(),
                order_id: submission.order_id,
                direction,
                amount_in,
                sales_rate: submission.sales_rate,
                expiration_timestamp: submission.expiration_timestamp,
            });
            Ok(submission)
        })
    }

    pub fn cancel_long_term_swap(&mut self, ctx: &Context, order_id: OrderId) -> TwammResult<CancelResult> {
        self.atomically(ctx, |w| {
            let (result, steps) = w
                .state
                .cancel_long_term_order(&ctx.caller, order_id, ctx.timestamp)?;
            w.record_steps(&steps);
            w.events.push(PairEvent::CancelLongTermOrder {
                owner: ctx.caller.clone(),
                order_id,
                unsold_amount: result.refund,
                purchased_amount: result.proceeds,
            });
            Ok(result)
        })
    }

    pub fn withdraw_proceeds_from_long_term_swap(
        &mut self,
        ctx: &Context,
        order_id: OrderId,
    ) -> TwammResult<WithdrawResult> {
        self.atomically(ctx, |w| {
            let (result, steps) = w
                .state
                .withdraw_proceeds(&ctx.caller, order_id, ctx.timestamp)?;
            w.record_steps(&steps);
            w.events.push(PairEvent::WithdrawProceedsFromLongTermOrder {
                owner: ctx.caller.clone(),
                order_id,
                proceeds: result.proceeds,
                fully_withdrawn: result.fully_withdrawn,
            });
            Ok(result)
        })
    }

    // ========================================================================
    // Execution and Administration
    // ========================================================================

    /// Advance virtual orders toward `target` (clamped to the call's time).
    /// Anyone may call this; capped progress is committed.
    pub fn execute_virtual_orders(&mut self, ctx: &Context, target: u64) -> TwammResult<CatchUp> {
        let catch_up = self.atomically(ctx, |w| {
            let (catch_up, steps) = w.state.execute_virtual_orders(target, ctx.timestamp)?;
            w.record_steps(&steps);
            Ok(catch_up)
        })?;
        if catch_up.boundaries_crossed > 0 || !catch_up.complete {
            info!(
                pair = %self.name(),
                reached = catch_up.reached,
                boundaries = catch_up.boundaries_crossed,
                complete = catch_up.complete,
                "executed virtual orders"
            );
        }
        Ok(catch_up)
    }

    pub fn toggle_pause_new_swaps(&mut self, ctx: &Context) -> TwammResult<bool> {
        let paused = self.pause.toggle(&ctx.caller)?;
        self.emit(PairEvent::PauseToggled { paused });
        Ok(paused)
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn name(&self) -> String {
        format!("{}/{}", self.token0, self.token1)
    }

    pub fn tokens(&self) -> (&str, &str) {
        (&self.token0, &self.token1)
    }

    pub fn admin(&self) -> &AccountId {
        self.pause.admin()
    }

    pub fn state(&self) -> &PairState {
        &self.state
    }

    pub fn new_swaps_paused(&self) -> bool {
        self.pause.new_swaps_paused()
    }

    pub fn get_next_order_id(&self) -> OrderId {
        self.state.registry().next_order_id()
    }

    pub fn get_twamm_order(&self, order_id: OrderId) -> TwammResult<OrderView> {
        let order = self.state.registry().get(order_id)?;
        Ok(OrderView {
            id: order.id,
            owner: order.owner.clone(),
            direction: order.direction,
            sales_rate: order.sales_rate,
            submission_timestamp: order.submission_timestamp,
            expiration_timestamp: order.expiration_timestamp,
            status: order.status_at(self.state.last_virtual_order_timestamp()),
        })
    }

    pub fn get_twamm_reserves(&self) -> TwammReserves {
        self.state.twamm_reserves()
    }

    pub fn get_twamm_state(&self) -> TwammState {
        self.state.twamm_state()
    }

    /// Scheduled sales-rate decrements at `timestamp` for (0->1, 1->0)
    pub fn get_twamm_sales_rate_ending(&self, timestamp: u64) -> (U256, U256) {
        (
            self.state.pool(Direction::ZeroForOne).sales_rate_ending_at(timestamp),
            self.state.pool(Direction::OneForZero).sales_rate_ending_at(timestamp),
        )
    }

    pub fn get_twamm_reward_factor_at_expiry(&self, timestamp: u64) -> (Option<U256>, Option<U256>) {
        (
            self.state.pool(Direction::ZeroForOne).reward_factor_at_expiry(timestamp),
            self.state.pool(Direction::OneForZero).reward_factor_at_expiry(timestamp),
        )
    }

    pub fn get_reserve_after_twamm(&self, timestamp: u64) -> TwammResult<TwammReserves> {
        self.state.reserves_after_twamm(timestamp)
    }

    pub fn get_order_ids_for_owner(&self, owner: &AccountId) -> &[OrderId] {
        self.state.registry().ids_for_owner(owner)
    }

    /// Up to `count` of `owner`'s orders, starting at position `start` of
    /// their submission history. Past the end yields an empty page.
    pub fn get_detailed_orders_for_owner(
        &self,
        owner: &AccountId,
        start: usize,
        count: usize,
    ) -> TwammResult<Vec<DetailedOrder>> {
        let registry = self.state.registry();
        registry
            .ids_for_owner(owner)
            .iter()
            .skip(start)
            .take(count)
            .map(|id| {
                let order = registry.get(*id)?;
                Ok(DetailedOrder {
                    order: order.clone(),
                    is_complete: order.is_finalized(),
                })
            })
            .collect()
    }

    pub fn get_twamm_order_proceeds(&self, order_id: OrderId) -> TwammResult<u128> {
        self.state.order_proceeds(order_id)
    }

    pub fn twamm_up_to_date(&self, now: u64) -> bool {
        self.state.is_up_to_date(now)
    }

    pub fn pending_boundaries(&self, now: u64) -> usize {
        self.state.pending_boundaries(now)
    }

    pub fn liquidity_balance(&self, owner: &AccountId) -> u128 {
        self.liquidity.balance_of(owner)
    }

    pub fn total_supply(&self) -> u128 {
        self.liquidity.total_supply()
    }

    pub fn quote(&self, direction: Direction, amount_in: u128) -> TwammResult<SwapResult> {
        self.state.reserves().quote(direction, amount_in)
    }

    pub fn events(&self) -> &[PairEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<PairEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_002_800;

    fn pair() -> TwammPair {
        let params = PairParams {
            order_time_interval: 3_600,
            fee_bps: 30,
            max_boundaries_per_call: 8,
        };
        let mut pair = TwammPair::new("FRAX", "FXS", params, AccountId::from("admin"), T0).unwrap();
        pair.add_liquidity(&Context::new("lp", T0), 1_000_000_000, 1_000_000_000)
            .unwrap();
        pair
    }

    #[test]
    fn test_failed_call_leaves_no_trace() {
        let mut pair = pair();
        pair.long_term_swap_from_0_to_1(&Context::new("alice", T0), 10_000, 1)
            .unwrap();
        pair.long_term_swap_from_1_to_0(&Context::new("bob", T0), 20_000, 3)
            .unwrap();
        let state = pair.state().clone();
        let events = pair.events().len();

        // The catch-up crosses alice's expiry before the slippage check fails
        let err = pair
            .swap(&Context::new("bob", T0 + 9_000), Direction::OneForZero, 1_000, u128::MAX)
            .unwrap_err();
        assert!(matches!(err, TwammError::SlippageExceeded { .. }));
        assert_eq!(pair.state(), &state);
        assert_eq!(pair.get_twamm_reward_factor_at_expiry(T0 + 7_200), (None, None));
        assert_eq!(pair.events().len(), events);
    }

    #[test]
    fn test_failed_liquidity_call_restores_shares() {
        let mut pair = pair();
        pair.long_term_swap_from_0_to_1(&Context::new("alice", T0), 10_000, 1)
            .unwrap();
        let state = pair.state().clone();
        let supply = pair.total_supply();
        let lp = AccountId::from("lp");
        let held = pair.liquidity_balance(&lp);

        assert!(matches!(
            pair.remove_liquidity(&Context::new("lp", T0 + 9_000), held + 1),
            Err(TwammError::InsufficientShares { .. })
        ));
        assert_eq!(pair.state(), &state);
        assert_eq!(pair.total_supply(), supply);
        assert_eq!(pair.liquidity_balance(&lp), held);
    }

    #[test]
    fn test_detailed_orders_page_through_history() {
        let mut pair = pair();
        let dave = AccountId::from("dave");
        let ids: Vec<OrderId> = (1..=5u64)
            .map(|intervals| {
                pair.long_term_swap_from_0_to_1(&Context::new("dave", T0), 10_000, intervals)
                    .unwrap()
            })
            .collect();
        pair.long_term_swap_from_1_to_0(&Context::new("erin", T0), 10_000, 1)
            .unwrap();

        let first = pair.get_detailed_orders_for_owner(&dave, 0, 2).unwrap();
        let rest = pair.get_detailed_orders_for_owner(&dave, 2, 10).unwrap();
        assert_eq!(first.iter().map(|d| d.order.id).collect::<Vec<_>>(), ids[..2]);
        assert_eq!(rest.iter().map(|d| d.order.id).collect::<Vec<_>>(), ids[2..]);
        assert!(first.iter().chain(&rest).all(|d| !d.is_complete));
        assert!(pair.get_detailed_orders_for_owner(&dave, 5, 3).unwrap().is_empty());

        // Completion flips once the shortest order is withdrawn past expiry
        let later = T0 + 2 * 3_600;
        pair.withdraw_proceeds_from_long_term_swap(&Context::new("dave", later), ids[0])
            .unwrap();
        let page = pair.get_detailed_orders_for_owner(&dave, 0, 2).unwrap();
        assert!(page[0].is_complete);
        assert!(page[0].order.fully_withdrawn);
        assert!(!page[1].is_complete);
    }

    #[test]
    fn test_swap_catches_up_first() {
        let mut pair = pair();
        pair.long_term_swap_from_0_to_1(&Context::new("alice", T0), 10_000, 2)
            .unwrap();
        pair.drain_events();

        pair.swap(&Context::new("bob", T0 + 1_000), Direction::OneForZero, 1_000, 0)
            .unwrap();
        assert_eq!(pair.get_twamm_reserves().last_virtual_order_timestamp, T0 + 1_000);

        let names: Vec<&str> = pair.events().iter().map(PairEvent::name).collect();
        assert_eq!(names, vec!["VirtualOrderExecution", "Sync", "Swap", "Sync"]);
    }

    #[test]
    fn test_order_view_and_ids() {
        let mut pair = pair();
        assert_eq!(pair.get_next_order_id(), 0);
        let id = pair
            .long_term_swap_from_1_to_0(&Context::new("carol", T0 + 10), 5_000, 1)
            .unwrap();
        assert_eq!(pair.get_next_order_id(), 1);

        let view = pair.get_twamm_order(id).unwrap();
        assert_eq!(view.owner, AccountId::from("carol"));
        assert_eq!(view.direction, Direction::OneForZero);
        assert_eq!(view.submission_timestamp, T0 + 10);
        assert_eq!(view.expiration_timestamp, T0 + 7_200);
        assert_eq!(pair.get_twamm_sales_rate_ending(T0 + 7_200).1, view.sales_rate);
        assert_eq!(pair.get_order_ids_for_owner(&AccountId::from("carol")), &[id]);
        assert_eq!(pair.get_twamm_order(42).unwrap_err(), TwammError::OrderNotFound(42));
    }

    #[test]
    fn test_liquidity_round_trip() {
        let mut pair = pair();
        let lp = AccountId::from("lp");
        let shares = pair.liquidity_balance(&lp);
        let removed = pair.remove_liquidity(&Context::new("lp", T0 + 5), shares).unwrap();
        assert_eq!(removed.amount0, 1_000_000_000 - 1_000);
        assert_eq!(pair.get_twamm_reserves().reserve0, 1_000);
        assert_eq!(pair.total_supply(), 1_000);
    }

    #[test]
    fn test_stale_clock_rejected() {
        let mut pair = pair();
        pair.execute_virtual_orders(&Context::new("keeper", T0 + 100), T0 + 100)
            .unwrap();
        assert!(matches!(
            pair.swap(&Context::new("bob", T0 + 50), Direction::ZeroForOne, 10, 0),
            Err(TwammError::StaleOrOutOfRangeTimestamp { .. })
        ));
    }
}
