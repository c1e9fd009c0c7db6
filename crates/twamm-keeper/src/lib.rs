pub mod action;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod keeper;
pub mod scenario;

pub use action::Action;
pub use clock::SystemClock;
pub use config::{create_example_config, CatchUpConfig, KeeperConfig, PairConfig};
pub use error::{KeeperError, KeeperResult};
pub use keeper::{Keeper, PairHealth, PairTick, RunSummary, TickReport};
pub use scenario::{Scenario, ScenarioReport};
