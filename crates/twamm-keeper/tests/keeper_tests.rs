//! # Keeper Integration Tests
//!
//! Configuration files on disk and the bundled demo scenario.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use twamm_core::{Context, ManualClock};
    use twamm_keeper::*;

    #[test]
    fn test_example_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keeper.toml");
        create_example_config(&path).unwrap();

        let loaded = KeeperConfig::load(&path).unwrap();
        assert_eq!(loaded.pairs.len(), 2);
        assert_eq!(loaded.get_enabled_pairs().count(), 1);

        let copy = dir.path().join("copy.toml");
        loaded.save(&copy).unwrap();
        assert_eq!(KeeperConfig::load(&copy).unwrap(), loaded);
    }

    #[test]
    fn test_invalid_config_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keeper.toml");
        let mut config = KeeperConfig::default();
        config.pairs.push(PairConfig::default());
        config.order_time_interval = 0;
        config.save(&path).unwrap();

        assert!(matches!(
            KeeperConfig::load(&path),
            Err(KeeperError::InvalidConfig(_))
        ));
        assert!(KeeperConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_demo_config_parses() {
        let config = KeeperConfig::from_toml(include_str!("../../../demos/keeper.toml")).unwrap();
        assert_eq!(config.admin, "treasury");
        assert_eq!(config.pair_params().max_boundaries_per_call, 64);
    }

    #[test]
    fn test_pause_recovery_demo() {
        let scenario = Scenario::from_toml(include_str!("../../../demos/pause_recovery.toml")).unwrap();
        let report = scenario.run().unwrap();

        let failures: Vec<_> = report.failures().map(|o| (o.index, o.action)).collect();
        assert_eq!(failures, vec![(4, "long_term_swap")]);

        let cancelled = &report.outcomes[5].result;
        assert!(cancelled["refund"].as_u64().unwrap_or(0) > 0);

        let withdrawn = &report.outcomes[9].result;
        assert_eq!(withdrawn["fully_withdrawn"], serde_json::Value::Bool(true));

        let pair = &report.pairs[0];
        assert!(!pair.new_swaps_paused);
        assert_eq!(pair.next_order_id, 3);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"FRAX/FXS\""));
    }

    #[test]
    fn test_keeper_with_manual_clock() {
        let config = KeeperConfig::from_toml(include_str!("../../../demos/keeper.toml")).unwrap();
        let clock = ManualClock::new(1_700_002_800);
        let mut keeper = Keeper::new(config, Arc::new(clock.clone())).unwrap();

        keeper
            .pair_mut("FRAX/FXS")
            .unwrap()
            .long_term_swap_from_0_to_1(&Context::new("alice", clock.advance(10).unwrap()), 1_000_000_000, 6)
            .unwrap();

        clock.advance(2 * 3_600).unwrap();
        let health = keeper.health_check().unwrap();
        assert!(!health[0].up_to_date);

        let report = keeper.run_once().unwrap();
        assert!(report.pairs[0].complete);
        assert!(keeper.health_check().unwrap()[0].up_to_date);
    }
}
