//! Command handlers behind the CLI. Each one loads what it needs from the
//! store, runs one engine operation, saves the result and hands back JSON.
use crate::autopull::{self, AutoPullOptions, AutoPullSummary, BatchReport};
use crate::catalog::StaticCatalog;
use crate::collection::{pull_skins, CollectionLedger, SkinWallet};
use crate::config::SimConfig;
use crate::error::Result;
use crate::fx::{FxCache, StaticRates};
use crate::ledger::{BundleCatalog, Wallet};
use crate::pool::{PoolKind, PoolRules};
use crate::rng;
use crate::save::{self, KeyValueStore, FX_RATES_KEY, SIM_KEY, SKIN_COLLECTION_KEY, SKIN_WALLET_KEY};
use crate::state::SimState;
use chrono::Utc;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

/// Everything a command needs: storage, config, randomness and catalogs.
pub struct Session<S: KeyValueStore> {
    pub store: S,
    pub config: SimConfig,
    pub rng: ChaCha8Rng,
    pub bundles: BundleCatalog,
    pub skin_bundles: BundleCatalog,
    pub catalog: StaticCatalog,
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(store: S, config: SimConfig) -> Result<Self> {
        let bundles = match &config.bundles_path {
            Some(path) => BundleCatalog::from_path(path)?,
            None => BundleCatalog::default_cny().clone(),
        };
        let skin_bundles = match &config.skin_bundles_path {
            Some(path) => BundleCatalog::from_path(path)?,
            None => BundleCatalog::default_usd().clone(),
        };
        let catalog = match &config.catalog_path {
            Some(path) => StaticCatalog::from_path(path)?,
            None => StaticCatalog::default_catalog().clone(),
        };
        Ok(Self {
            rng: rng::for_seed(config.seed),
            store,
            config,
            bundles,
            skin_bundles,
            catalog,
        })
    }

    fn load_sim(&self) -> SimState {
        let starting = self.config.starting_primary;
        save::load_or_else(&self.store, SIM_KEY, || SimState::with_starting_primary(starting))
    }

    fn save_sim(&mut self, state: &SimState) -> Result<()> {
        save::save(&mut self.store, SIM_KEY, state)
    }

    /// Cached FX rates, refreshed from the configured rates once stale.
    fn fx(&mut self) -> FxCache {
        let cached: FxCache = save::load_or_default(&self.store, FX_RATES_KEY);
        let source = StaticRates::new(self.config.fx_rates.clone());
        let fresh = cached.refresh(&source, Utc::now(), self.config.fx_ttl());
        if fresh != cached {
            if let Err(err) = save::save(&mut self.store, FX_RATES_KEY, &fresh) {
                log::warn!("Failed to cache currency rates: {}", err);
            }
        }
        fresh
    }

    fn wallet_json(&mut self, wallet: &Wallet, currency: Option<&str>) -> Result<Value> {
        let mut value = json!({
            "oroberyl": wallet.primary,
            "arsenal_tokens": wallet.secondary,
            "origeometry": wallet.exchange,
            "balance": wallet.account.balance,
            "spent": wallet.account.spent,
        });
        if let Some(code) = currency {
            let fx = self.fx();
            value["display"] = json!({
                "currency": code.to_ascii_uppercase(),
                "balance": fx.format(wallet.account.balance, code)?,
                "spent": fx.format(wallet.account.spent, code)?,
            });
        }
        Ok(value)
    }

    pub fn status(&mut self, currency: Option<&str>) -> Result<Value> {
        let state = self.load_sim();
        Ok(json!({
            "wallet": self.wallet_json(&state.wallet, currency)?,
            "character": PoolRules::character().summary(&state.character),
            "weapon": PoolRules::weapon().summary(&state.weapon),
        }))
    }

    pub fn pull(&mut self, pool: PoolKind, pulls: u32) -> Result<Value> {
        let state = self.load_sim();
        let outcome = PoolRules::for_pool(pool).roll(&state, pulls, &mut self.rng)?;
        self.save_sim(&outcome.state)?;
        let stats = outcome.state.pool(pool);
        Ok(json!({
            "pool": pool,
            "results": outcome.results,
            "pity": stats.pity,
            "pull_count": stats.pull_count,
            "hard_pity_available": stats.hard_pity_available,
            "oroberyl": outcome.state.wallet.primary,
            "arsenal_tokens": outcome.state.wallet.secondary,
        }))
    }

    pub fn history(&mut self, pool: PoolKind) -> Result<Value> {
        let state = self.load_sim();
        let stats = state.pool(pool);
        Ok(json!({
            "pool": pool,
            "history": stats.pull_history,
            "summary": PoolRules::for_pool(pool).summary(stats),
        }))
    }

    pub fn reset(&mut self, pool: PoolKind) -> Result<Value> {
        let state = self.load_sim().reset_pool(pool);
        self.save_sim(&state)?;
        log::info!("Reset {} pool", pool);
        Ok(json!({ "pool": pool, "reset": true }))
    }

    /// Top up the payment account; `currency` amounts are converted to CNY first.
    pub fn top_up(&mut self, amount: Decimal, currency: Option<&str>) -> Result<Value> {
        let amount = match currency {
            Some(code) => self.fx().convert_to_base(amount, code)?.round_dp(2),
            None => amount,
        };
        let mut state = self.load_sim();
        state.wallet = state.wallet.top_up(amount)?;
        self.save_sim(&state)?;
        Ok(json!({ "credited": amount, "balance": state.wallet.account.balance }))
    }

    pub fn buy(&mut self, bundle_id: &str) -> Result<Value> {
        let mut state = self.load_sim();
        let purchase = state.wallet.apply_bundle_purchase(&self.bundles, bundle_id)?;
        state.wallet = purchase.wallet;
        self.save_sim(&state)?;
        log::info!("Bought {} for {} origeometry", bundle_id, purchase.reward);
        Ok(json!({
            "bundle": bundle_id,
            "origeometry_received": purchase.reward,
            "origeometry": state.wallet.exchange,
            "balance": state.wallet.account.balance,
        }))
    }

    pub fn convert(&mut self, amount: u64) -> Result<Value> {
        let mut state = self.load_sim();
        let conversion = state.wallet.convert_exchange(amount)?;
        state.wallet = conversion.wallet;
        self.save_sim(&state)?;
        Ok(json!({
            "oroberyl_received": conversion.received,
            "oroberyl": state.wallet.primary,
            "origeometry": state.wallet.exchange,
        }))
    }

    pub fn bundles(&mut self, currency: Option<&str>) -> Result<Value> {
        let state = self.load_sim();
        let offers = state.wallet.offers(&self.bundles);
        let Some(code) = currency else {
            return Ok(json!(offers));
        };
        let fx = self.fx();
        let listed = offers
            .into_iter()
            .map(|offer| {
                let display_price = fx.format(offer.bundle.price, code)?;
                Ok(json!({ "offer": offer, "display_price": display_price }))
            })
            .collect::<Result<Vec<Value>>>()?;
        Ok(Value::Array(listed))
    }

    pub fn auto(
        &mut self,
        pool: PoolKind,
        batches: Option<u32>,
        interval_ms: Option<u64>,
        report: impl FnMut(&BatchReport),
    ) -> Result<AutoPullSummary> {
        let options = AutoPullOptions {
            interval: Duration::from_millis(interval_ms.unwrap_or(self.config.auto_interval_ms)),
            max_batches: batches.or(self.config.auto_max_batches),
            starting_primary: self.config.starting_primary,
        };
        autopull::run_auto_pull(&mut self.store, pool, options, None, &mut self.rng, report)
    }

    pub fn export(&mut self, path: &Path) -> Result<Value> {
        let state = self.load_sim();
        save::export_state(&state, path)?;
        Ok(json!({ "exported": path.display().to_string() }))
    }

    pub fn import(&mut self, path: &Path) -> Result<Value> {
        let state = save::import_state(path)?;
        self.save_sim(&state)?;
        Ok(json!({ "imported": path.display().to_string() }))
    }

    fn load_skin_wallet(&self) -> SkinWallet {
        save::load_or_default(&self.store, SKIN_WALLET_KEY)
    }

    /// Stored collection, merged with the catalog when a check is due.
    fn load_collection(&mut self) -> Result<CollectionLedger> {
        let stored: CollectionLedger = save::load_or_default(&self.store, SKIN_COLLECTION_KEY);
        let synced = stored.sync_with_catalog(&self.catalog, Utc::now().timestamp());
        if synced != stored {
            save::save(&mut self.store, SKIN_COLLECTION_KEY, &synced)?;
        }
        Ok(synced)
    }

    pub fn skin_pull(&mut self, pool_id: &str, pulls: u32) -> Result<Value> {
        let wallet = self.load_skin_wallet();
        let ledger = self.load_collection()?;
        let outcome = pull_skins(pool_id, pulls, &wallet, &ledger, &self.catalog, &mut self.rng)?;
        save::save(&mut self.store, SKIN_COLLECTION_KEY, &outcome.ledger)?;
        save::save(&mut self.store, SKIN_WALLET_KEY, &outcome.wallet)?;
        Ok(json!({
            "pool": pool_id,
            "results": outcome.results,
            "vpoints": outcome.wallet.vpoints,
            "rpoints": outcome.wallet.rpoints,
        }))
    }

    pub fn skin_collection(&mut self, pool_id: &str) -> Result<Value> {
        let ledger = self.load_collection()?;
        Ok(json!(ledger.items_for_pool(pool_id, &self.catalog)))
    }

    pub fn skin_stats(&mut self) -> Result<Value> {
        let ledger = self.load_collection()?;
        Ok(json!({
            "statistics": ledger.statistics,
            "rarity": ledger.rarity_breakdown(),
            "quality": ledger.quality_breakdown(),
        }))
    }

    pub fn skin_top_up(&mut self, amount: Decimal) -> Result<Value> {
        let wallet = self.load_skin_wallet().top_up(amount)?;
        save::save(&mut self.store, SKIN_WALLET_KEY, &wallet)?;
        Ok(json!({ "credited": amount, "balance_usd": wallet.account.balance }))
    }

    pub fn skin_buy(&mut self, bundle_id: &str) -> Result<Value> {
        let (wallet, reward) = self.load_skin_wallet().purchase(&self.skin_bundles, bundle_id)?;
        save::save(&mut self.store, SKIN_WALLET_KEY, &wallet)?;
        Ok(json!({
            "bundle": bundle_id,
            "vpoints_received": reward,
            "vpoints": wallet.vpoints,
            "balance_usd": wallet.account.balance,
        }))
    }

    pub fn skin_wallet(&mut self) -> Result<Value> {
        let wallet = self.load_skin_wallet();
        Ok(json!({
            "vpoints": wallet.vpoints,
            "rpoints": wallet.rpoints,
            "balance_usd": wallet.account.balance,
            "spent_usd": wallet.account.spent,
            "bundles": wallet.offers(&self.skin_bundles),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::MemoryStore;

    fn session() -> Session<MemoryStore> {
        let config = SimConfig {
            seed: Some(17),
            ..SimConfig::default()
        };
        Session::new(MemoryStore::new(), config).unwrap()
    }

    #[test]
    fn pull_persists_between_commands() {
        let mut session = session();
        let out = session.pull(PoolKind::Character, 10).unwrap();
        assert_eq!(out["results"].as_array().unwrap().len(), 10);
        assert_eq!(out["oroberyl"], json!(5_000));

        let status = session.status(None).unwrap();
        assert_eq!(status["character"]["total_pulls"], json!(10));
    }

    #[test]
    fn buy_then_convert() {
        let mut session = session();
        session.top_up(Decimal::from(100), None).unwrap();
        let bought = session.buy("origeometry_1").unwrap();
        let received = bought["origeometry_received"].as_u64().unwrap();
        assert!(received > 0);

        let converted = session.convert(received).unwrap();
        assert_eq!(converted["oroberyl_received"], json!(received * 75));
        assert_eq!(converted["origeometry"], json!(0));
    }

    #[test]
    fn status_in_foreign_currency() {
        let mut session = session();
        session.top_up(Decimal::from(100), None).unwrap();
        let status = session.status(Some("usd")).unwrap();
        assert_eq!(status["wallet"]["display"]["balance"], json!("$13.80"));
        assert!(session.status(Some("GBP")).is_err());
    }

    #[test]
    fn reset_clears_pool_and_currency() {
        let mut session = session();
        session.pull(PoolKind::Character, 1).unwrap();
        session.reset(PoolKind::Character).unwrap();
        let status = session.status(None).unwrap();
        assert_eq!(status["character"]["total_pulls"], json!(0));
        assert_eq!(status["wallet"]["oroberyl"], json!(0));
    }

    #[test]
    fn skin_flow() {
        let mut session = session();
        assert!(session.skin_pull("vandal", 1).is_err());

        session.skin_top_up(Decimal::from(100)).unwrap();
        let bought = session.skin_buy("vp_475").unwrap();
        assert!(bought["vpoints"].as_u64().unwrap() >= 200);

        let pulled = session.skin_pull("vandal", 1).unwrap();
        assert_eq!(pulled["results"].as_array().unwrap().len(), 1);

        let stats = session.skin_stats().unwrap();
        assert_eq!(stats["rarity"]["total"], json!(1));
        let collection = session.skin_collection("vandal").unwrap();
        assert_eq!(collection["items"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn auto_uses_config_defaults() {
        let mut session = session();
        session.config.auto_max_batches = Some(1);
        let mut reports = 0;
        let summary = session.auto(PoolKind::Character, None, Some(0), |_| reports += 1).unwrap();
        assert_eq!(summary.batches, 1);
        assert_eq!(reports, 1);
    }
}
