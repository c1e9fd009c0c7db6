use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, warn};
use twamm_core::{AccountId, CatchUp, Clock, Context, PairFactory, TwammPair, TwammReserves};

use crate::action::{direction, Action};
use crate::config::{CatchUpConfig, KeeperConfig};
use crate::error::{KeeperError, KeeperResult};

/// Keeper service that owns the pairs and keeps their virtual orders executed
pub struct Keeper {
    /// Keeper configuration
    config: KeeperConfig,

    /// Source of the current timestamp
    clock: Arc<dyn Clock>,

    /// Pairs created from the configuration
    factory: PairFactory,

    /// Account the keeper acts as; also every pair's admin
    admin: AccountId,

    /// Completed `run_once` calls
    ticks: u64,
}

/// Outcome of one pair within a keeper tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairTick {
    pub name: String,
    pub reached: u64,
    pub attempts: u32,
    pub boundaries_crossed: usize,
    pub complete: bool,
    /// New long-term swaps were paused by this tick
    pub auto_paused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub timestamp: u64,
    pub pairs: Vec<PairTick>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairHealth {
    pub name: String,
    pub enabled: bool,
    pub last_virtual_order_timestamp: u64,
    pub pending_boundaries: usize,
    pub up_to_date: bool,
    pub new_swaps_paused: bool,
    pub reserves: TwammReserves,
}

/// Counters from one [`Keeper::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub actions_applied: u64,
    pub actions_failed: u64,
}

impl PairHealth {
    /// A pair that one engine call cannot bring up to date
    pub fn is_backlogged(&self, max_boundaries_per_call: usize) -> bool {
        self.pending_boundaries > max_boundaries_per_call
    }
}

impl Keeper {
    /// Create the configured pairs and seed their initial liquidity
    pub fn new(config: KeeperConfig, clock: Arc<dyn Clock>) -> KeeperResult<Self> {
        config.validate()?;
        let admin = AccountId::new(config.admin.clone());
        let mut factory = PairFactory::new(admin.clone(), config.pair_params())?;

        let now = clock.now();
        for pair_config in &config.pairs {
            let pair = factory.create_pair(&pair_config.token0, &pair_config.token1, now)?;
            if pair_config.initial_reserve0 > 0 {
                pair.add_liquidity(
                    &Context::new(admin.clone(), now),
                    u128::from(pair_config.initial_reserve0),
                    u128::from(pair_config.initial_reserve1),
                )?;
            }
            info!(pair = %pair_config.name, enabled = pair_config.enabled, "pair initialized");
        }

        Ok(Self {
            config,
            clock,
            factory,
            admin,
            ticks: 0,
        })
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn factory(&self) -> &PairFactory {
        &self.factory
    }

    pub fn pair(&self, name: &str) -> KeeperResult<&TwammPair> {
        let pair_config = self.config.pair(name)?;
        Ok(self.factory.get_pair(&pair_config.token0, &pair_config.token1)?)
    }

    pub fn pair_mut(&mut self, name: &str) -> KeeperResult<&mut TwammPair> {
        let pair_config = self.config.pair(name)?;
        Ok(self
            .factory
            .get_pair_mut(&pair_config.token0, &pair_config.token1)?)
    }

    /// Execute virtual orders on every enabled pair up to now
    pub fn run_once(&mut self) -> KeeperResult<TickReport> {
        let now = self.clock.now();
        let ctx = Context::new(self.admin.clone(), now);
        let mut pairs = Vec::new();

        for pair_config in self.config.get_enabled_pairs() {
            let pair = self
                .factory
                .get_pair_mut(&pair_config.token0, &pair_config.token1)?;
            match catch_up_pair(&pair_config.name, pair, &ctx, &self.config.catch_up) {
                Ok(tick) => pairs.push(tick),
                Err(e) => {
                    error!(pair = %pair_config.name, error = %e, "failed to execute virtual orders");
                    // Continue with other pairs
                }
            }
        }

        self.ticks += 1;
        Ok(TickReport {
            timestamp: now,
            pairs,
        })
    }

    /// Apply one action at the clock's current time
    pub fn apply(&mut self, action: &Action) -> KeeperResult<Value> {
        let now = self.clock.now();
        let ctx = |account: &str| Context::new(AccountId::from(account), now);

        let result = match action {
            Action::AddLiquidity {
                pair,
                account,
                amount0,
                amount1,
            } => {
                let minted = self.pair_mut(pair)?.add_liquidity(
                    &ctx(account),
                    u128::from(*amount0),
                    u128::from(*amount1),
                )?;
                serde_json::to_value(minted)?
            }
            Action::RemoveLiquidity {
                pair,
                account,
                shares,
            } => {
                let burned = self.pair_mut(pair)?.remove_liquidity(&ctx(account), u128::from(*shares))?;
                serde_json::to_value(burned)?
            }
            Action::Swap {
                pair,
                account,
                zero_for_one,
                amount_in,
                min_amount_out,
            } => {
                let swapped = self.pair_mut(pair)?.swap(
                    &ctx(account),
                    direction(*zero_for_one),
                    u128::from(*amount_in),
                    u128::from(*min_amount_out),
                )?;
                serde_json::to_value(swapped)?
            }
            Action::LongTermSwap {
                pair,
                account,
                zero_for_one,
                amount_in,
                intervals,
            } => {
                let submission = self.pair_mut(pair)?.long_term_swap(
                    &ctx(account),
                    direction(*zero_for_one),
                    u128::from(*amount_in),
                    *intervals,
                )?;
                json!({
                    "order_id": submission.order_id,
                    "sales_rate": submission.sales_rate.to_string(),
                    "expiration_timestamp": submission.expiration_timestamp,
                })
            }
            Action::Cancel {
                pair,
                account,
                order_id,
            } => {
                let cancelled = self
                    .pair_mut(pair)?
                    .cancel_long_term_swap(&ctx(account), *order_id)?;
                serde_json::to_value(cancelled)?
            }
            Action::Withdraw {
                pair,
                account,
                order_id,
            } => {
                let withdrawn = self
                    .pair_mut(pair)?
                    .withdraw_proceeds_from_long_term_swap(&ctx(account), *order_id)?;
                serde_json::to_value(withdrawn)?
            }
            Action::Execute {
                pair,
                account,
                target,
            } => {
                let catch_up = self
                    .pair_mut(pair)?
                    .execute_virtual_orders(&ctx(account), target.unwrap_or(now))?;
                serde_json::to_value(catch_up)?
            }
            Action::TogglePause { pair, account } => {
                let paused = self.pair_mut(pair)?.toggle_pause_new_swaps(&ctx(account))?;
                json!({ "paused": paused })
            }
            Action::Advance { .. } => {
                return Err(KeeperError::UnsupportedAction(action.name().to_string()));
            }
            Action::KeeperTick => serde_json::to_value(self.run_once()?)?,
        };
        Ok(result)
    }

    /// Per-pair engine lag and pause state
    pub fn health_check(&self) -> KeeperResult<Vec<PairHealth>> {
        let now = self.clock.now();
        let mut report = Vec::with_capacity(self.config.pairs.len());

        for pair_config in &self.config.pairs {
            let pair = self
                .factory
                .get_pair(&pair_config.token0, &pair_config.token1)?;
            let health = PairHealth {
                name: pair_config.name.clone(),
                enabled: pair_config.enabled,
                last_virtual_order_timestamp: pair.get_twamm_state().last_virtual_order_timestamp,
                pending_boundaries: pair.pending_boundaries(now),
                up_to_date: pair.twamm_up_to_date(now),
                new_swaps_paused: pair.new_swaps_paused(),
                reserves: pair.get_twamm_reserves(),
            };

            if health.is_backlogged(self.config.max_boundaries_per_call) {
                warn!(
                    pair = %health.name,
                    pending = health.pending_boundaries,
                    "pair needs more than one call to catch up"
                );
            }
            if health.new_swaps_paused {
                warn!(pair = %health.name, "new long-term swaps are paused");
            }
            report.push(health);
        }

        debug!(pairs = report.len(), "health check complete");
        Ok(report)
    }

    /// Tick every `tick_interval_secs` until `ticks` ticks ran or Ctrl-C.
    /// Actions arriving on `actions` are applied between ticks, ahead of a
    /// due tick; a closed feed leaves the loop ticking.
    pub async fn run(
        &mut self,
        ticks: Option<u64>,
        mut actions: mpsc::Receiver<Action>,
    ) -> KeeperResult<RunSummary> {
        let mut interval_timer = time::interval(Duration::from_secs(self.config.tick_interval_secs));
        let mut summary = RunSummary::default();
        let mut feed_open = true;

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!(iteration = summary.ticks, "shutdown requested");
                    return Ok(summary);
                }
                received = actions.recv(), if feed_open => {
                    match received {
                        Some(action) => self.apply_fed(&action, &mut summary),
                        None => {
                            feed_open = false;
                            debug!("action feed closed");
                        }
                    }
                    continue;
                }
                _ = interval_timer.tick() => {}
            }
            summary.ticks += 1;
            let iteration = summary.ticks;
            debug!(iteration, "starting keeper iteration");

            match self.run_once() {
                Ok(report) => {
                    let behind = report.pairs.iter().filter(|p| !p.complete).count();
                    if behind > 0 {
                        warn!(iteration, behind, "pairs still catching up");
                    } else {
                        debug!(iteration, pairs = report.pairs.len(), "all pairs up to date");
                    }
                }
                Err(e) => {
                    error!(iteration, error = %e, "keeper iteration failed");
                    // Continue running even if individual iterations fail
                }
            }

            if iteration % self.config.health_check_every == 0 {
                info!(iteration, "keeper health check");
                if let Err(e) = self.health_check() {
                    warn!(error = %e, "health check failed");
                }
            }

            if ticks.is_some_and(|limit| iteration >= limit) {
                return Ok(summary);
            }
        }
    }

    fn apply_fed(&mut self, action: &Action, summary: &mut RunSummary) {
        match self.apply(action) {
            Ok(result) => {
                summary.actions_applied += 1;
                info!(action = action.name(), %result, "applied fed action");
            }
            Err(e) => {
                summary.actions_failed += 1;
                warn!(action = action.name(), error = %e, "fed action failed");
            }
        }
    }
}

/// Run up to `max_attempts` capped engine calls, pausing the pair if it is
/// still behind afterwards and auto-pause is enabled.
fn catch_up_pair(
    name: &str,
    pair: &mut TwammPair,
    ctx: &Context,
    catch_up: &CatchUpConfig,
) -> KeeperResult<PairTick> {
    let mut attempts = 0;
    let mut boundaries_crossed = 0;
    let mut outcome = CatchUp::default();

    while attempts < catch_up.max_attempts {
        attempts += 1;
        outcome = pair.execute_virtual_orders(ctx, ctx.timestamp)?;
        boundaries_crossed += outcome.boundaries_crossed;
        if outcome.complete {
            break;
        }
    }

    let mut auto_paused = false;
    if !outcome.complete {
        warn!(
            pair = name,
            reached = outcome.reached,
            pending = pair.pending_boundaries(ctx.timestamp),
            attempts,
            "pair still behind after catch-up attempts"
        );
        if catch_up.auto_pause && !pair.new_swaps_paused() {
            pair.toggle_pause_new_swaps(ctx)?;
            auto_paused = true;
            warn!(pair = name, "paused new long-term swaps until the backlog drains");
        }
    }

    Ok(PairTick {
        name: name.to_string(),
        reached: outcome.reached,
        attempts,
        boundaries_crossed,
        complete: outcome.complete,
        auto_paused,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PairConfig;
    use twamm_core::ManualClock;

    const T0: u64 = 1_700_002_800;

    fn config(max_boundaries_per_call: usize, max_attempts: u32) -> KeeperConfig {
        KeeperConfig {
            max_boundaries_per_call,
            order_time_interval: 3_600,
            catch_up: CatchUpConfig {
                max_attempts,
                auto_pause: true,
            },
            pairs: vec![PairConfig {
                name: "A/B".to_string(),
                token0: "A".to_string(),
                token1: "B".to_string(),
                initial_reserve0: 1_000_000_000,
                initial_reserve1: 1_000_000_000,
                enabled: true,
            }],
            ..KeeperConfig::default()
        }
    }

    #[test]
    fn test_keeper_seeds_liquidity() {
        let clock = ManualClock::new(T0);
        let keeper = Keeper::new(config(8, 2), Arc::new(clock)).unwrap();
        let reserves = keeper.pair("A/B").unwrap().get_twamm_reserves();
        assert_eq!(reserves.reserve0, 1_000_000_000);
        assert_eq!(keeper.pair("A/B").unwrap().admin(), keeper.admin());
    }

    #[test]
    fn test_run_once_catches_up() {
        let clock = ManualClock::new(T0);
        let mut keeper = Keeper::new(config(8, 2), Arc::new(clock.clone())).unwrap();
        keeper
            .pair_mut("A/B")
            .unwrap()
            .long_term_swap_from_0_to_1(&Context::new("alice", T0), 1_000_000, 3)
            .unwrap();

        clock.advance(5 * 3_600).unwrap();
        let report = keeper.run_once().unwrap();
        assert_eq!(report.pairs.len(), 1);
        assert!(report.pairs[0].complete);
        assert_eq!(report.pairs[0].reached, T0 + 5 * 3_600);
        assert_eq!(report.pairs[0].boundaries_crossed, 1);
        assert_eq!(keeper.ticks(), 1);
    }

    #[test]
    fn test_run_once_skips_disabled_pairs() {
        let mut config = config(8, 2);
        config.pairs.push(PairConfig {
            name: "C/D".to_string(),
            token0: "C".to_string(),
            token1: "D".to_string(),
            initial_reserve0: 1_000_000,
            initial_reserve1: 1_000_000,
            enabled: false,
        });
        let clock = ManualClock::new(T0);
        let mut keeper = Keeper::new(config, Arc::new(clock.clone())).unwrap();
        keeper
            .pair_mut("C/D")
            .unwrap()
            .long_term_swap_from_0_to_1(&Context::new("carol", T0), 10_000, 1)
            .unwrap();

        clock.advance(3 * 3_600).unwrap();
        let report = keeper.run_once().unwrap();
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.pairs[0].name, "A/B");
        assert_eq!(
            keeper.pair("C/D").unwrap().get_twamm_state().last_virtual_order_timestamp,
            T0
        );
    }

    #[test]
    fn test_backlog_triggers_auto_pause() {
        let clock = ManualClock::new(T0);
        let mut keeper = Keeper::new(config(1, 2), Arc::new(clock.clone())).unwrap();
        let pair = keeper.pair_mut("A/B").unwrap();
        for intervals in 1..=6 {
            pair.long_term_swap_from_1_to_0(&Context::new("bob", T0), 100_000, intervals)
                .unwrap();
        }

        clock.advance(24 * 3_600).unwrap();
        let report = keeper.run_once().unwrap();
        let tick = &report.pairs[0];
        assert!(!tick.complete);
        assert!(tick.auto_paused);
        assert_eq!(tick.attempts, 2);
        assert_eq!(tick.boundaries_crossed, 2);

        let health = keeper.health_check().unwrap();
        assert!(health[0].new_swaps_paused);
        assert!(health[0].is_backlogged(1));

        // The next ticks drain the backlog without toggling the pause back
        let mut ticks = 0;
        while !keeper.run_once().unwrap().pairs[0].complete {
            ticks += 1;
            assert!(ticks < 10);
        }
        assert!(keeper.pair("A/B").unwrap().new_swaps_paused());
    }

    #[test]
    fn test_live_keeper_rejects_clock_moves() {
        let clock = ManualClock::new(T0);
        let mut keeper = Keeper::new(config(8, 2), Arc::new(clock.clone())).unwrap();
        assert!(matches!(
            keeper.apply(&Action::Advance { seconds: 60 }),
            Err(KeeperError::UnsupportedAction(name)) if name == "advance"
        ));
        assert_eq!(keeper.now(), T0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_applies_fed_actions_between_ticks() {
        let clock = ManualClock::new(T0);
        let mut keeper = Keeper::new(config(8, 2), Arc::new(clock.clone())).unwrap();
        let (sender, receiver) = mpsc::channel(8);
        sender
            .send(Action::LongTermSwap {
                pair: "A/B".to_string(),
                account: "alice".to_string(),
                zero_for_one: true,
                amount_in: 1_000_000,
                intervals: 2,
            })
            .await
            .unwrap();
        sender.send(Action::Advance { seconds: 60 }).await.unwrap();
        sender
            .send(Action::Withdraw {
                pair: "A/B".to_string(),
                account: "alice".to_string(),
                order_id: 7,
            })
            .await
            .unwrap();
        drop(sender);

        let summary = keeper.run(Some(2), receiver).await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                ticks: 2,
                actions_applied: 1,
                actions_failed: 2,
            }
        );
        assert_eq!(keeper.ticks(), 2);
        assert_eq!(keeper.pair("A/B").unwrap().get_next_order_id(), 1);
    }
}
