//! Distribution configuration.
//!
//! Loaded from a TOML file, then overridden from `LANDING_*` environment
//! variables, then from command-line flags by the binary.
//!
//! ```toml
//! source = "xrb_3t6k35gi95xu6tergt6p69ck76ogmitsa8mnijtpxm9fkcm736xtoncuohr3"
//! destination = "xrb_1111111111111111111111111111111111111111111111111111hifc8npp"
//! amount = "1000000000000000000000000000000"
//! baseline = 0
//! checkpoint_file = "landing.dat"
//!
//! [distribution]
//! interval_secs = 64
//!
//! [rpc]
//! url = "http://[::1]:7076"
//! wallet = "000D1BAEC8EC208142C99059B393051BAC8380F9B5A2E6B2489A277D81789F3F"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::account::{Account, Amount};
use crate::checkpoint::CheckpointRecord;

/// Default distribution interval: 2^6 seconds.
pub const DEFAULT_DISTRIBUTION_INTERVAL_SECS: u64 = 1 << 6;
/// Default delay between evaluation ticks.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 7;
pub const DEFAULT_CHECKPOINT_FILE: &str = "landing.dat";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {var}: {value:?}")]
    InvalidOverride { var: &'static str, value: String },
    #[error("distribution amount must be greater than zero")]
    ZeroAmount,
    #[error("source and destination must differ (both {0})")]
    SameAccount(Account),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("rpc wallet must be 64 hex chars")]
    InvalidWallet,
}

/// Timing and retry parameters of the distribution controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistributionConfig {
    /// Minimum time between two payouts.
    pub interval_secs: u64,
    /// How often the controller checks whether a payout is due.
    pub tick_interval_secs: u64,
    /// First delay before retrying a failed checkpoint write.
    pub persist_backoff_base_ms: u64,
    /// Cap for the checkpoint write retry delay.
    pub persist_backoff_max_ms: u64,
    /// Consecutive failed writes before persistence is reported degraded.
    pub degraded_after_attempts: u32,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_DISTRIBUTION_INTERVAL_SECS,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            persist_backoff_base_ms: 1_000,
            persist_backoff_max_ms: 60_000,
            degraded_after_attempts: 5,
        }
    }
}

impl DistributionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroDuration("distribution.interval_secs"));
        }
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration("distribution.tick_interval_secs"));
        }
        if self.persist_backoff_base_ms == 0 {
            return Err(ConfigError::ZeroDuration(
                "distribution.persist_backoff_base_ms",
            ));
        }
        Ok(())
    }
}

/// Node RPC endpoint used for balance queries and payment submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcConfig {
    pub url: String,
    /// Wallet id holding the source account's key.
    pub wallet: String,
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://[::1]:7076".to_string(),
            wallet: String::new(),
            timeout_secs: 10,
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wallet.len() != 64 || hex::decode(&self.wallet).is_err() {
            return Err(ConfigError::InvalidWallet);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("rpc.timeout_secs"));
        }
        Ok(())
    }
}

/// Full configuration of a landing distributor.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LandingConfig {
    #[serde_as(as = "DisplayFromStr")]
    pub source: Account,
    #[serde_as(as = "DisplayFromStr")]
    pub destination: Account,
    /// Raw units per payout.
    #[serde_as(as = "DisplayFromStr")]
    pub amount: Amount,
    /// `last` of a freshly created checkpoint.
    #[serde(default)]
    pub baseline: u64,
    /// Relative paths resolve against the data directory.
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: PathBuf,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
}

fn default_checkpoint_file() -> PathBuf {
    PathBuf::from(DEFAULT_CHECKPOINT_FILE)
}

impl LandingConfig {
    pub fn new(source: Account, destination: Account, amount: Amount) -> Self {
        Self {
            source,
            destination,
            amount,
            baseline: 0,
            checkpoint_file: default_checkpoint_file(),
            distribution: DistributionConfig::default(),
            rpc: RpcConfig::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `LANDING_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("LANDING_RPC_URL") {
            if !url.trim().is_empty() {
                self.rpc.url = url.trim().to_string();
            }
        }
        if let Some(wallet) = lookup("LANDING_WALLET") {
            if !wallet.trim().is_empty() {
                self.rpc.wallet = wallet.trim().to_string();
            }
        }
        if let Some(secs) = lookup("LANDING_INTERVAL_SECS") {
            self.distribution.interval_secs =
                secs.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOverride {
                        var: "LANDING_INTERVAL_SECS",
                        value: secs.clone(),
                    })?;
        }
        if let Some(file) = lookup("LANDING_CHECKPOINT_FILE") {
            if !file.trim().is_empty() {
                self.checkpoint_file = PathBuf::from(file.trim());
            }
        }
        Ok(())
    }

    /// Reject configurations the distribution core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.amount.is_zero() {
            return Err(ConfigError::ZeroAmount);
        }
        if self.source == self.destination {
            return Err(ConfigError::SameAccount(self.source));
        }
        self.distribution.validate()
    }

    /// Checkpoint location, resolved against `data_dir` when relative.
    pub fn checkpoint_path(&self, data_dir: &Path) -> PathBuf {
        if self.checkpoint_file.is_absolute() {
            self.checkpoint_file.clone()
        } else {
            data_dir.join(&self.checkpoint_file)
        }
    }

    /// Record used when no checkpoint exists yet.
    pub fn initial_checkpoint(&self) -> CheckpointRecord {
        CheckpointRecord::new(self.source, self.destination, self.amount, self.baseline)
    }
}

/// Platform data directory for the distributor, if one can be determined.
pub fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("net", "raiblocks", "landing")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SOURCE: &str = "xrb_3t6k35gi95xu6tergt6p69ck76ogmitsa8mnijtpxm9fkcm736xtoncuohr3";
    const DESTINATION_HEX: &str =
        "0000000000000000000000000000000000000000000000000000000000000001";

    fn minimal_toml() -> String {
        format!(
            r#"
            source = "{SOURCE}"
            destination = "{DESTINATION_HEX}"
            amount = "1000"
            "#
        )
    }

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = LandingConfig::from_toml(&minimal_toml()).unwrap();
        assert_eq!(config.source.to_string(), SOURCE);
        assert_eq!(config.destination, Account::from(1u64));
        assert_eq!(config.amount, Amount::new(1000));
        assert_eq!(config.baseline, 0);
        assert_eq!(config.checkpoint_file, PathBuf::from(DEFAULT_CHECKPOINT_FILE));
        assert_eq!(config.distribution, DistributionConfig::default());
        assert_eq!(config.distribution.interval(), Duration::from_secs(64));
        assert_eq!(config.distribution.tick_interval(), Duration::from_secs(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let text = format!(
            r#"
            {}
            baseline = 1700000000
            checkpoint_file = "/var/lib/landing/state.dat"

            [distribution]
            interval_secs = 3600
            degraded_after_attempts = 2

            [rpc]
            url = "http://127.0.0.1:7076"
            wallet = "{}"
            "#,
            minimal_toml(),
            "AB".repeat(32)
        );
        let config = LandingConfig::from_toml(&text).unwrap();
        assert_eq!(config.baseline, 1_700_000_000);
        assert_eq!(config.distribution.interval_secs, 3600);
        assert_eq!(config.distribution.degraded_after_attempts, 2);
        assert_eq!(config.distribution.tick_interval_secs, DEFAULT_TICK_INTERVAL_SECS);
        assert_eq!(config.rpc.url, "http://127.0.0.1:7076");
        assert!(config.rpc.validate().is_ok());
        assert_eq!(
            config.checkpoint_path(Path::new("/tmp")),
            PathBuf::from("/var/lib/landing/state.dat")
        );
    }

    #[test]
    fn test_parse_rejects_bad_account() {
        let text = minimal_toml().replace(SOURCE, "xrb_nope");
        assert!(matches!(
            LandingConfig::from_toml(&text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let text = format!("{}\nstart = 5\n", minimal_toml());
        assert!(LandingConfig::from_toml(&text).is_err());
    }

    #[test]
    fn test_validate_zero_amount() {
        let config = LandingConfig::new(Account::from(1u64), Account::from(2u64), Amount::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroAmount)));
    }

    #[test]
    fn test_validate_same_account() {
        let config = LandingConfig::new(Account::from(1u64), Account::from(1u64), Amount::new(5));
        assert!(matches!(config.validate(), Err(ConfigError::SameAccount(_))));
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config =
            LandingConfig::new(Account::from(1u64), Account::from(2u64), Amount::new(5));
        config.distribution.interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDuration("distribution.interval_secs"))
        ));
    }

    #[test]
    fn test_rpc_wallet_validation() {
        let mut rpc = RpcConfig::default();
        assert!(matches!(rpc.validate(), Err(ConfigError::InvalidWallet)));
        rpc.wallet = "zz".repeat(32);
        assert!(matches!(rpc.validate(), Err(ConfigError::InvalidWallet)));
        rpc.wallet = "00".repeat(32);
        assert!(rpc.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config = LandingConfig::from_toml(&minimal_toml()).unwrap();
        let vars: HashMap<&str, &str> = [
            ("LANDING_RPC_URL", " http://node:7076 "),
            ("LANDING_WALLET", "11"),
            ("LANDING_INTERVAL_SECS", "120"),
            ("LANDING_CHECKPOINT_FILE", "other.dat"),
        ]
        .into_iter()
        .collect();
        config
            .apply_overrides(|var| vars.get(var).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.rpc.url, "http://node:7076");
        assert_eq!(config.rpc.wallet, "11");
        assert_eq!(config.distribution.interval_secs, 120);
        assert_eq!(
            config.checkpoint_path(Path::new("/data")),
            PathBuf::from("/data/other.dat")
        );
    }

    #[test]
    fn test_override_rejects_bad_interval() {
        let mut config = LandingConfig::from_toml(&minimal_toml()).unwrap();
        let result = config.apply_overrides(|var| {
            (var == "LANDING_INTERVAL_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOverride {
                var: "LANDING_INTERVAL_SECS",
                ..
            })
        ));
    }

    #[test]
    fn test_initial_checkpoint_uses_baseline() {
        let mut config =
            LandingConfig::new(Account::from(1u64), Account::from(2u64), Amount::new(5));
        config.baseline = 42;
        assert_eq!(
            config.initial_checkpoint(),
            CheckpointRecord::new(1u64, 2u64, 5u128, 42)
        );
    }
}
