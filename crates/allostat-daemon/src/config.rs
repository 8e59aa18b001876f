//! Daemon configuration

use allostat_regulator::RegulatorConfig;
use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `ALLOSTAT__REGULATION_INTERVAL_MS`
pub const ENV_PREFIX: &str = "ALLOSTAT";

/// Config file looked up next to the working directory (any supported extension)
pub const CONFIG_FILE: &str = "allostat";

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Interval between regulation triggers; also the sensing cadence the
    /// regulator's load estimator expects
    pub regulation_interval_ms: u64,
    /// tracing filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Dump Prometheus text exposition on shutdown
    pub dump_metrics_on_exit: bool,
    /// Regulator settings
    pub regulator: RegulatorConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            regulation_interval_ms: 1000,
            log_filter: "info".to_string(),
            dump_metrics_on_exit: true,
            regulator: RegulatorConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from `.env`, an optional `allostat.*` file, then `ALLOSTAT__*` variables
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let builder = Self::defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));
        Self::build(builder)
    }

    /// Parse a TOML document layered over the defaults
    pub fn from_toml(document: &str) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from_str(document, FileFormat::Toml));
        Self::build(builder)
    }

    fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
        let defaults =
            Config::try_from(&Self::default()).context("Failed to serialize default config")?;
        Ok(Config::builder().add_source(defaults))
    }

    fn build(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let mut config: Self = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.regulator.expected_sample_interval_ms = config.regulation_interval_ms;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.regulation_interval_ms == 0 {
            anyhow::bail!("regulation_interval_ms must be non-zero");
        }
        self.regulator.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::from_toml("").unwrap();
        assert_eq!(config.regulation_interval_ms, 1000);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.regulator.prediction_horizon_ms, 10_000);
        assert_eq!(config.regulator.setpoints.len(), 6);
    }

    #[test]
    fn test_overrides() {
        let config = DaemonConfig::from_toml(
            r#"
            regulation_interval_ms = 250
            log_filter = "allostat_regulator=debug"

            [regulator]
            prediction_horizon_ms = 5000
            settle_delay_ms = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.regulation_interval_ms, 250);
        assert_eq!(config.log_filter, "allostat_regulator=debug");
        assert_eq!(config.regulator.prediction_horizon_ms, 5000);
        assert_eq!(config.regulator.settle_delay_ms, 20);
        assert_eq!(config.regulator.history_size, 100);
        assert_eq!(config.regulator.expected_sample_interval_ms, 250);
    }

    #[test]
    fn test_sample_interval_follows_trigger_interval() {
        let config = DaemonConfig::from_toml(
            "regulation_interval_ms = 500\n[regulator]\nexpected_sample_interval_ms = 1000",
        )
        .unwrap();
        assert_eq!(config.regulator.expected_sample_interval_ms, 500);
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(DaemonConfig::from_toml("regulation_interval_ms = 0").is_err());
    }

    #[test]
    fn test_rejects_invalid_regulator_settings() {
        let document = "[regulator]\nhistory_size = 0";
        assert!(DaemonConfig::from_toml(document).is_err());
    }
}
