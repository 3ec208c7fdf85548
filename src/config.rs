use crate::fx::{Rates, DEFAULT_TTL_SECS};
use crate::ledger::DEFAULT_PRIMARY;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";

/// Shortest delay the auto-pull loop accepts.
pub const MIN_AUTO_INTERVAL_MS: u64 = 50;

fn default_auto_interval_ms() -> u64 {
    1_000
}

fn default_starting_primary() -> u64 {
    DEFAULT_PRIMARY
}

fn default_fx_ttl_secs() -> i64 {
    DEFAULT_TTL_SECS
}

fn default_fx_rates() -> Rates {
    let mut rates = Rates::new();
    rates.insert("USD".to_string(), Decimal::new(1_380, 4));
    rates.insert("JPY".to_string(), Decimal::new(2_090, 2));
    rates.insert("VND".to_string(), Decimal::new(3_510, 0));
    rates
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Where stored blobs live; the platform config dir when unset.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    /// Fixed RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_auto_interval_ms")]
    pub auto_interval_ms: u64,
    /// Stop auto-pull after this many batches; unlimited when unset.
    #[serde(default)]
    pub auto_max_batches: Option<u32>,
    #[serde(default = "default_starting_primary")]
    pub starting_primary: u64,
    #[serde(default)]
    pub bundles_path: Option<PathBuf>,
    #[serde(default)]
    pub skin_bundles_path: Option<PathBuf>,
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default = "default_fx_ttl_secs")]
    pub fx_ttl_secs: i64,
    #[serde(default = "default_fx_rates")]
    pub fx_rates: Rates,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            seed: None,
            auto_interval_ms: default_auto_interval_ms(),
            auto_max_batches: None,
            starting_primary: default_starting_primary(),
            bundles_path: None,
            skin_bundles_path: None,
            catalog_path: None,
            fx_ttl_secs: default_fx_ttl_secs(),
            fx_rates: default_fx_rates(),
        }
    }
}

impl SimConfig {
    pub fn default_path() -> PathBuf {
        crate::save::FileStore::default_dir().join(CONFIG_FILE)
    }

    /// Read the config file. Missing means defaults; unreadable or invalid
    /// is logged and also means defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| serde_json::from_str::<SimConfig>(&json).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(err) => {
                log::warn!("Ignoring config at {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    pub fn auto_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.auto_interval_ms.max(MIN_AUTO_INTERVAL_MS))
    }

    pub fn fx_ttl(&self) -> Duration {
        Duration::seconds(self.fx_ttl_secs.max(0))
    }
}
