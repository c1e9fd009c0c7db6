use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use twamm_core::{PairParams, MAX_FEE_BPS};

use crate::error::{KeeperError, KeeperResult};

/// Prefix of environment variables overriding file values,
/// e.g. `TWAMM_KEEPER__CATCH_UP__MAX_ATTEMPTS=8`
pub const ENV_PREFIX: &str = "TWAMM_KEEPER";

/// Keeper configuration loaded from TOML file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeeperConfig {
    /// Account that administers every pair and seeds initial liquidity
    pub admin: String,

    /// Seconds between scheduled expirations
    pub order_time_interval: u64,

    /// Pair fee in basis points
    pub fee_bps: u32,

    /// Expirations one engine call may cross
    pub max_boundaries_per_call: usize,

    /// Seconds between keeper ticks in `run`
    pub tick_interval_secs: u64,

    /// Ticks between health checks in `run`
    pub health_check_every: u64,

    /// Catch-up behaviour per tick
    pub catch_up: CatchUpConfig,

    /// Pairs to create and maintain
    pub pairs: Vec<PairConfig>,
}

/// Configuration for individual pair
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PairConfig {
    /// Pair name for logging and scenario references
    pub name: String,
    pub token0: String,
    pub token1: String,

    /// Liquidity seeded by the admin when the pair is created
    #[serde(default)]
    pub initial_reserve0: u64,
    #[serde(default)]
    pub initial_reserve1: u64,

    /// Whether the keeper executes this pair's virtual orders
    pub enabled: bool,
}

/// Catch-up configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CatchUpConfig {
    /// Engine calls per pair per tick before giving up
    pub max_attempts: u32,

    /// Pause new long-term swaps on pairs still behind after `max_attempts`
    pub auto_pause: bool,
}

impl KeeperConfig {
    /// Load configuration from a TOML file, applying environment overrides
    pub fn load(path: impl AsRef<Path>) -> KeeperResult<Self> {
        let path = path.as_ref();
        let config: KeeperConfig = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without environment overrides
    pub fn from_toml(content: &str) -> KeeperResult<Self> {
        let config: KeeperConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> KeeperResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> KeeperResult<()> {
        if self.admin.is_empty() {
            return Err(invalid("admin", "empty", "non-empty account name"));
        }

        if self.pairs.is_empty() {
            return Err(invalid("pairs", "empty", "at least one pair"));
        }

        if self.order_time_interval == 0 {
            return Err(invalid("order_time_interval", "0", "greater than 0"));
        }

        if self.fee_bps > MAX_FEE_BPS {
            return Err(invalid(
                "fee_bps",
                &self.fee_bps.to_string(),
                &format!("at most {}", MAX_FEE_BPS),
            ));
        }

        if self.max_boundaries_per_call == 0 {
            return Err(invalid("max_boundaries_per_call", "0", "greater than 0"));
        }

        if self.tick_interval_secs == 0 {
            return Err(invalid("tick_interval_secs", "0", "greater than 0"));
        }

        if self.health_check_every == 0 {
            return Err(invalid("health_check_every", "0", "greater than 0"));
        }

        for (i, pair) in self.pairs.iter().enumerate() {
            pair.validate()?;
            if self.pairs[..i].iter().any(|other| other.name == pair.name) {
                return Err(invalid("pairs.name", &pair.name, "unique pair names"));
            }
        }

        self.catch_up.validate()
    }

    pub fn pair_params(&self) -> PairParams {
        PairParams {
            order_time_interval: self.order_time_interval,
            fee_bps: self.fee_bps,
            max_boundaries_per_call: self.max_boundaries_per_call,
        }
    }

    pub fn get_enabled_pairs(&self) -> impl Iterator<Item = &PairConfig> {
        self.pairs.iter().filter(|p| p.enabled)
    }

    pub fn pair(&self, name: &str) -> KeeperResult<&PairConfig> {
        self.pairs
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| KeeperError::UnknownPair(name.to_string()))
    }
}

impl PairConfig {
    fn validate(&self) -> KeeperResult<()> {
        if self.name.is_empty() {
            return Err(invalid("pair_name", "empty", "non-empty string"));
        }

        if self.token0.is_empty() || self.token1.is_empty() {
            return Err(invalid("tokens", &self.name, "two non-empty token names"));
        }

        // Pairs store tokens sorted; amounts and directions are given in that order.
        if self.token0 >= self.token1 {
            return Err(invalid(
                "tokens",
                &format!("{}/{}", self.token0, self.token1),
                "distinct tokens with token0 sorting first",
            ));
        }

        if (self.initial_reserve0 == 0) != (self.initial_reserve1 == 0) {
            return Err(invalid(
                "initial_reserve",
                &self.name,
                "both reserves zero or both non-zero",
            ));
        }

        Ok(())
    }
}

impl CatchUpConfig {
    fn validate(&self) -> KeeperResult<()> {
        if self.max_attempts == 0 {
            return Err(invalid("catch_up.max_attempts", "0", "greater than 0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: &str, expected: &str) -> KeeperError {
    KeeperError::InvalidConfig(format!("{}: got {}, expected {}", field, value, expected))
}

impl Default for KeeperConfig {
    fn default() -> Self {
        let params = PairParams::default();
        Self {
            admin: "admin".to_string(),
            order_time_interval: params.order_time_interval,
            fee_bps: params.fee_bps,
            max_boundaries_per_call: params.max_boundaries_per_call,
            tick_interval_secs: 60,
            health_check_every: 100,
            catch_up: CatchUpConfig::default(),
            pairs: vec![],
        }
    }
}

impl Default for CatchUpConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            auto_pause: true,
        }
    }
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            name: "Default Pair".to_string(),
            token0: "TOKEN0".to_string(),
            token1: "TOKEN1".to_string(),
            initial_reserve0: 0,
            initial_reserve1: 0,
            enabled: true,
        }
    }
}

/// Create example configuration file
pub fn create_example_config(path: impl AsRef<Path>) -> KeeperResult<()> {
    let example_config = KeeperConfig {
        admin: "treasury".to_string(),
        order_time_interval: 3_600,
        fee_bps: 30,
        max_boundaries_per_call: 64,
        tick_interval_secs: 30,
        health_check_every: 20,
        catch_up: CatchUpConfig::default(),
        pairs: vec![
            PairConfig {
                name: "FRAX/FXS".to_string(),
                token0: "FRAX".to_string(),
                token1: "FXS".to_string(),
                initial_reserve0: 1_000_000_000_000,
                initial_reserve1: 250_000_000_000,
                enabled: true,
            },
            PairConfig {
                name: "FRAX/WETH".to_string(),
                token0: "FRAX".to_string(),
                token1: "WETH".to_string(),
                initial_reserve0: 3_000_000_000_000,
                initial_reserve1: 1_000_000_000,
                enabled: false,
            },
        ],
    };

    example_config.validate()?;
    example_config.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = KeeperConfig::default();
        assert!(config.validate().is_err());

        config.pairs.push(PairConfig::default());
        assert!(config.validate().is_ok());

        config.fee_bps = 10_000;
        assert!(config.validate().is_err());
        config.fee_bps = 30;

        config.pairs.push(PairConfig::default());
        assert!(matches!(config.validate(), Err(KeeperError::InvalidConfig(_))));
    }

    #[test]
    fn test_one_sided_initial_reserves_rejected() {
        let mut config = KeeperConfig::default();
        config.pairs.push(PairConfig {
            initial_reserve0: 1_000,
            ..PairConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enabled_pairs_and_lookup() {
        let mut config = KeeperConfig::default();
        config.pairs.push(PairConfig::default());
        config.pairs.push(PairConfig {
            name: "Idle".to_string(),
            enabled: false,
            ..PairConfig::default()
        });
        assert_eq!(config.get_enabled_pairs().count(), 1);
        assert!(config.pair("Idle").is_ok());
        assert!(matches!(config.pair("Missing"), Err(KeeperError::UnknownPair(_))));
    }
}
