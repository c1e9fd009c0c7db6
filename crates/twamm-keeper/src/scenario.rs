//! Scenario replay against a manual clock.
//!
//! A scenario is a keeper configuration plus a list of timed actions. Each
//! action runs at the clock's current time; `advance` moves the clock. Failing
//! actions are recorded in the report rather than aborting the replay, so a
//! scenario can assert expected rejections.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use twamm_core::{Clock, ManualClock, TwammReserves, TwammState};

use crate::action::Action;
use crate::config::KeeperConfig;
use crate::error::{KeeperError, KeeperResult};
use crate::keeper::{Keeper, PairHealth};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Scenario {
    /// Clock value before the first action
    pub start_timestamp: u64,
    pub keeper: KeeperConfig,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub index: usize,
    pub action: &'static str,
    pub timestamp: u64,
    pub ok: bool,
    /// Action result on success, error message on failure
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairReport {
    pub name: String,
    pub reserves: TwammReserves,
    pub state: TwammState,
    pub total_supply: u128,
    pub new_swaps_paused: bool,
    pub next_order_id: u64,
    pub events_emitted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub final_timestamp: u64,
    pub outcomes: Vec<ActionOutcome>,
    pub pairs: Vec<PairReport>,
    pub health: Vec<PairHealth>,
}

impl ScenarioReport {
    pub fn failures(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(|o| !o.ok)
    }
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> KeeperResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> KeeperResult<Self> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.keeper.validate()?;
        Ok(scenario)
    }

    /// Replay every action and report the final state of each pair
    pub fn run(&self) -> KeeperResult<ScenarioReport> {
        let clock = ManualClock::new(self.start_timestamp);
        let mut keeper = Keeper::new(self.keeper.clone(), Arc::new(clock.clone()))?;
        let mut outcomes = Vec::with_capacity(self.actions.len());

        for (index, action) in self.actions.iter().enumerate() {
            let timestamp = clock.now();
            let outcome = match replay(&mut keeper, &clock, action) {
                Ok(result) => ActionOutcome {
                    index,
                    action: action.name(),
                    timestamp,
                    ok: true,
                    result,
                },
                Err(e) => {
                    warn!(index, action = action.name(), error = %e, "scenario action failed");
                    ActionOutcome {
                        index,
                        action: action.name(),
                        timestamp,
                        ok: false,
                        result: Value::String(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let mut pairs = Vec::with_capacity(self.keeper.pairs.len());
        for pair_config in &self.keeper.pairs {
            let pair = keeper.pair(&pair_config.name)?;
            pairs.push(PairReport {
                name: pair_config.name.clone(),
                reserves: pair.get_twamm_reserves(),
                state: pair.get_twamm_state(),
                total_supply: pair.total_supply(),
                new_swaps_paused: pair.new_swaps_paused(),
                next_order_id: pair.get_next_order_id(),
                events_emitted: pair.events().len(),
            });
        }

        let report = ScenarioReport {
            final_timestamp: clock.now(),
            outcomes,
            pairs,
            health: keeper.health_check()?,
        };
        info!(
            actions = report.outcomes.len(),
            failures = report.failures().count(),
            "scenario replayed"
        );
        Ok(report)
    }
}

/// Apply `action` at the replay clock's time. Only the replay owns a clock it
/// can move, so `advance` is handled here.
fn replay(keeper: &mut Keeper, clock: &ManualClock, action: &Action) -> KeeperResult<Value> {
    match action {
        Action::Advance { seconds } => {
            let now = clock.advance(*seconds)?;
            Ok(json!({ "now": now }))
        }
        other => keeper.apply(other),
    }
}

/// Replay a scenario file and render its report as pretty JSON
pub fn simulate_file(path: impl AsRef<Path>) -> KeeperResult<String> {
    let scenario = Scenario::load(path)?;
    let report = scenario.run()?;
    serde_json::to_string_pretty(&report).map_err(KeeperError::from)
}
