//! Persisted progression store. State is kept as whole JSON blobs under
//! fixed keys; a missing or unreadable blob always loads as defaults.
use crate::error::{GachaError, Result};
use crate::state::{SimState, STATE_VERSION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SIM_KEY: &str = "gacha_sim";
pub const SKIN_WALLET_KEY: &str = "gachalorant_wallet";
pub const SKIN_COLLECTION_KEY: &str = "gachalorant_collection";
pub const FX_RATES_KEY: &str = "gacha_sim_currency_rates";

/// Whole-value key-value storage.
pub trait KeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Stored blobs that carry a layout version.
pub trait Versioned {
    fn version(&self) -> u32;
}

impl Versioned for SimState {
    fn version(&self) -> u32 {
        self.version
    }
}

/// Parse a stored blob, rejecting layouts newer than this build.
pub fn decode<T: DeserializeOwned + Versioned>(raw: &str) -> Result<T> {
    let value: T =
        serde_json::from_str(raw).map_err(|e| GachaError::CorruptPersistedState(e.to_string()))?;
    if value.version() > STATE_VERSION {
        return Err(GachaError::CorruptPersistedState(format!(
            "layout version {} is newer than {}",
            value.version(),
            STATE_VERSION
        )));
    }
    Ok(value)
}

pub fn load_or_default<T, S>(store: &S, key: &str) -> T
where
    T: DeserializeOwned + Default + Versioned,
    S: KeyValueStore + ?Sized,
{
    load_or_else(store, key, T::default)
}

/// Like `load_or_default`, with the fallback built by `fresh`.
pub fn load_or_else<T, S, F>(store: &S, key: &str, fresh: F) -> T
where
    T: DeserializeOwned + Versioned,
    S: KeyValueStore + ?Sized,
    F: FnOnce() -> T,
{
    match store.read(key) {
        Ok(Some(raw)) => decode(&raw).unwrap_or_else(|err| {
            log::warn!("Stored '{}' unreadable, falling back to defaults: {}", key, err);
            fresh()
        }),
        Ok(None) => fresh(),
        Err(err) => {
            log::warn!("Failed to read '{}', falling back to defaults: {}", key, err);
            fresh()
        }
    }
}

pub fn save<T, S>(store: &mut S, key: &str, value: &T) -> Result<()>
where
    T: Serialize,
    S: KeyValueStore + ?Sized,
{
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| GachaError::Storage(format!("Failed to serialize '{key}': {e}")))?;
    store.write(key, &json)
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key. Writes go through a tmp file and a rename, the
/// previous value is kept as `.bak` and read back if the main file is gone.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_dir() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("gacha-sim")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn backup_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json.bak"))
    }

    fn tmp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json.tmp"))
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let main = self.path(key);
        let bak = self.backup_path(key);

        if main.exists() {
            fs::read_to_string(&main)
                .map(Some)
                .map_err(|e| GachaError::Storage(format!("Failed to read {}: {}", main.display(), e)))
        } else if bak.exists() {
            log::warn!("{} not found, loading backup", main.display());
            fs::read_to_string(&bak)
                .map(Some)
                .map_err(|e| GachaError::Storage(format!("Failed to read backup: {}", e)))
        } else {
            Ok(None)
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| GachaError::Storage(format!("Failed to create store dir: {}", e)))?;

        let tmp = self.tmp_path(key);
        let main = self.path(key);
        let bak = self.backup_path(key);

        fs::write(&tmp, value).map_err(|e| GachaError::Storage(format!("Failed to write tmp: {}", e)))?;

        if main.exists() {
            if let Err(e) = fs::copy(&main, &bak) {
                log::warn!("Failed to back up {}: {}", main.display(), e);
            }
        }

        fs::rename(&tmp, &main).map_err(|e| GachaError::Storage(format!("Failed to rename: {}", e)))?;
        Ok(())
    }
}

/// Write the simulator state to an arbitrary file.
pub fn export_state(state: &SimState, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| GachaError::Storage(format!("Failed to serialize: {}", e)))?;
    fs::write(path, json).map_err(|e| GachaError::Storage(format!("Failed to export: {}", e)))
}

/// Read a state file written by `export_state`. Unlike loading from the
/// store, a bad file is an error here.
pub fn import_state(path: &Path) -> Result<SimState> {
    let data = fs::read_to_string(path)
        .map_err(|e| GachaError::Storage(format!("Failed to read import file: {}", e)))?;
    decode(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::collection::{pull_skins, CollectionLedger, SkinWallet};
    use crate::fx::{FxCache, Rates, StaticRates};
    use crate::ledger::BundleCatalog;
    use crate::pool::{roll, PoolKind};
    use crate::rng::seeded;
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("gacha-sim-{name}-{}-{nanos}", std::process::id()))
    }

    #[test]
    fn missing_key_loads_defaults() {
        let store = MemoryStore::new();
        let state: SimState = load_or_default(&store, SIM_KEY);
        assert_eq!(state, SimState::default());
    }

    #[test]
    fn malformed_json_loads_defaults() {
        let mut store = MemoryStore::new();
        store.write(SIM_KEY, "{ not json").unwrap();
        let state: SimState = load_or_default(&store, SIM_KEY);
        assert_eq!(state, SimState::default());
    }

    #[test]
    fn fallback_is_only_used_without_a_valid_blob() {
        let mut store = MemoryStore::new();
        let fresh: SimState = load_or_else(&store, SIM_KEY, || SimState::with_starting_primary(500));
        assert_eq!(fresh.wallet.primary, 500);

        save(&mut store, SIM_KEY, &SimState::default()).unwrap();
        let stored: SimState = load_or_else(&store, SIM_KEY, || SimState::with_starting_primary(500));
        assert_eq!(stored, SimState::default());
    }

    #[test]
    fn newer_layout_counts_as_corrupt() {
        let raw = r#"{"version": 99}"#;
        assert!(matches!(
            decode::<SimState>(raw),
            Err(GachaError::CorruptPersistedState(_))
        ));
    }

    #[test]
    fn file_store_round_trip_and_backup() {
        let dir = scratch_dir("roundtrip");
        let mut store = FileStore::new(&dir);
        let first = roll(PoolKind::Character, 10, &SimState::default(), &mut seeded(9))
            .unwrap()
            .state;
        save(&mut store, SIM_KEY, &first).unwrap();
        let second = roll(PoolKind::Character, 1, &first, &mut seeded(10)).unwrap().state;
        save(&mut store, SIM_KEY, &second).unwrap();

        let loaded: SimState = load_or_default(&store, SIM_KEY);
        assert_eq!(loaded, second);

        // main file lost: the backup holds the previous save
        fs::remove_file(store.path(SIM_KEY)).unwrap();
        let recovered: SimState = load_or_default(&store, SIM_KEY);
        assert_eq!(recovered, first);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn export_then_import() {
        let dir = scratch_dir("export");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("export.json");
        let state = SimState::default().top_up_for_test();
        export_state(&state, &path).unwrap();
        assert_eq!(import_state(&path).unwrap(), state);

        fs::write(&path, "garbage").unwrap();
        assert!(import_state(&path).is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    impl SimState {
        fn top_up_for_test(&self) -> SimState {
            SimState {
                wallet: self.wallet.top_up(Decimal::new(12_345, 2)).unwrap(),
                ..self.clone()
            }
        }
    }

    #[test]
    fn fx_cache_round_trip() {
        let mut rates = Rates::new();
        rates.insert("USD".to_string(), Decimal::new(1380, 4));
        rates.insert("VND".to_string(), Decimal::from(3510));
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let cache = FxCache::default().refresh(&StaticRates::new(rates), now, Duration::seconds(60));

        let mut store = MemoryStore::new();
        save(&mut store, FX_RATES_KEY, &cache).unwrap();
        let loaded: FxCache = load_or_default(&store, FX_RATES_KEY);
        assert_eq!(loaded, cache);
        assert!(loaded.is_fresh(now, Duration::seconds(60)));
    }

    proptest! {
        #[test]
        fn skin_state_round_trip(seed in any::<u64>(), batches in 1usize..4, knife in any::<bool>()) {
            let catalog = StaticCatalog::default_catalog();
            let (mut wallet, _) = SkinWallet::default()
                .top_up(Decimal::from(200))
                .unwrap()
                .purchase(BundleCatalog::default_usd(), "vp_11000")
                .unwrap();
            wallet.rpoints = 1_000;
            let mut ledger = CollectionLedger::default().sync_with_catalog(catalog, 1_700_000_000);
            let pool = if knife { "knife" } else { "vandal" };
            let mut rng = seeded(seed);
            for _ in 0..batches {
                let outcome = pull_skins(pool, 10, &wallet, &ledger, catalog, &mut rng).unwrap();
                wallet = outcome.wallet;
                ledger = outcome.ledger;
            }

            let mut store = MemoryStore::new();
            save(&mut store, SKIN_WALLET_KEY, &wallet).unwrap();
            save(&mut store, SKIN_COLLECTION_KEY, &ledger).unwrap();
            let loaded_wallet: SkinWallet = load_or_default(&store, SKIN_WALLET_KEY);
            let loaded_ledger: CollectionLedger = load_or_default(&store, SKIN_COLLECTION_KEY);
            prop_assert_eq!(loaded_wallet, wallet);
            prop_assert_eq!(loaded_ledger, ledger);
        }

        #[test]
        fn save_load_round_trip(seed in any::<u64>(), pulls in 1u32..60, weapon_batches in 0usize..3) {
            let mut state = SimState::default();
            state.wallet.secondary = 10_000;
            let mut rng = seeded(seed);
            state = roll(PoolKind::Character, pulls.min(20), &state, &mut rng).unwrap().state;
            for _ in 0..weapon_batches {
                state = roll(PoolKind::Weapon, 10, &state, &mut rng).unwrap().state;
            }
            state = state.top_up_for_test();

            let mut store = MemoryStore::new();
            save(&mut store, SIM_KEY, &state).unwrap();
            let loaded: SimState = load_or_default(&store, SIM_KEY);
            prop_assert_eq!(loaded, state);
        }
    }
}
