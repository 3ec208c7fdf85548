//! Skin collection: per-weapon ownership counts, per-category statistics,
//! the VP/RP wallet and the pull flow that ties them together.
use crate::catalog::ItemCatalog;
use crate::error::{GachaError, Result};
use crate::ledger::{BundleCatalog, BundleOffer, PaymentAccount};
use crate::save::Versioned;
use crate::skin::{
    category_label, is_knife_pool, pool_by_id, roll_skin_once, Edition, QualityTier, SkinRoll, KNIFE_CATEGORY,
};
use crate::state::STATE_VERSION;
use rand::RngCore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Seconds between catalog syncs.
pub const SYNC_INTERVAL_SECS: i64 = 3_600;

fn default_version() -> u32 {
    STATE_VERSION
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinRewards {
    pub vpoints: u64,
    pub rpoints: u64,
}

const REPEAT_REWARDS: [SkinRewards; 5] = [
    SkinRewards { vpoints: 25, rpoints: 0 },
    SkinRewards { vpoints: 50, rpoints: 0 },
    SkinRewards { vpoints: 125, rpoints: 0 },
    SkinRewards { vpoints: 1_980, rpoints: 10 },
    SkinRewards { vpoints: 2_040, rpoints: 10 },
];

const FIRST_TIME_REWARDS: [SkinRewards; 5] = [
    SkinRewards { vpoints: 150, rpoints: 0 },
    SkinRewards { vpoints: 200, rpoints: 0 },
    SkinRewards { vpoints: 600, rpoints: 0 },
    SkinRewards { vpoints: 5_940, rpoints: 30 },
    SkinRewards { vpoints: 6_120, rpoints: 30 },
];

pub fn rewards_for(edition: Edition, is_new: bool) -> SkinRewards {
    if is_new {
        FIRST_TIME_REWARDS[edition.index()]
    } else {
        REPEAT_REWARDS[edition.index()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: u32,
    pub obtained: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedSkin {
    pub id: String,
    pub rarity: Edition,
    #[serde(default)]
    pub max_quality: f64,
    #[serde(default)]
    pub tier_counts: [u32; 5],
}

impl OwnedSkin {
    fn unowned(id: &str, rarity: Edition) -> Self {
        Self {
            id: id.to_string(),
            rarity,
            max_quality: 0.0,
            tier_counts: [0; 5],
        }
    }

    pub fn count(&self) -> u32 {
        self.tier_counts.iter().sum()
    }

    pub fn is_obtained(&self) -> bool {
        self.count() > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub is_new: bool,
    pub rewards: SkinRewards,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionLedger {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Unix seconds.
    #[serde(default)]
    pub next_check: i64,
    #[serde(default)]
    pub last_check: i64,
    #[serde(default)]
    pub statistics: BTreeMap<String, CategoryStats>,
    /// Owned data keyed by category.
    #[serde(default)]
    pub items: BTreeMap<String, Vec<OwnedSkin>>,
}

impl Default for CollectionLedger {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            next_check: 0,
            last_check: 0,
            statistics: BTreeMap::new(),
            items: BTreeMap::new(),
        }
    }
}

impl Versioned for CollectionLedger {
    fn version(&self) -> u32 {
        self.version
    }
}

/// Obtained counts bucketed five ways, per category and overall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub labels: Vec<String>,
    pub categories: Vec<CategoryBreakdown>,
    pub totals: [u32; 5],
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryBreakdown {
    pub id: String,
    pub label: String,
    pub counts: [u32; 5],
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionEntry {
    pub weapon_id: String,
    pub weapon_name: String,
    pub rarity: Edition,
    pub tier_label: &'static str,
    pub max_quality: f64,
    pub counts: [u32; 5],
    pub image_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolCollection {
    pub items: Vec<CollectionEntry>,
    pub statistics: CategoryStats,
}

fn calculate_statistics(items: &BTreeMap<String, Vec<OwnedSkin>>) -> BTreeMap<String, CategoryStats> {
    items
        .iter()
        .filter(|(_, skins)| !skins.is_empty())
        .map(|(category, skins)| {
            let stats = CategoryStats {
                total: skins.len() as u32,
                obtained: skins.iter().filter(|s| s.is_obtained()).count() as u32,
            };
            (category.clone(), stats)
        })
        .collect()
}

impl CollectionLedger {
    pub fn needs_sync(&self, now: i64) -> bool {
        self.items.is_empty() || now >= self.next_check
    }

    /// Merge catalog items the ledger has not seen yet. A no-op until the
    /// next check is due, unless the ledger is still empty.
    pub fn sync_with_catalog(&self, catalog: &dyn ItemCatalog, now: i64) -> Self {
        if !self.needs_sync(now) {
            return self.clone();
        }
        let mut next = self.clone();
        let had_statistics = !next.statistics.is_empty();
        let mut added = 0usize;
        for category in catalog.categories() {
            for item in catalog.list_items(&category) {
                let skins = next.items.entry(category.clone()).or_default();
                if skins.iter().any(|s| s.id == item.id) {
                    continue;
                }
                skins.push(OwnedSkin::unowned(&item.id, item.rarity));
                added += 1;
                if had_statistics {
                    next.statistics.entry(category.clone()).or_default().total += 1;
                }
            }
        }
        if !had_statistics {
            next.statistics = calculate_statistics(&next.items);
        }
        next.last_check = now;
        next.next_check = now + SYNC_INTERVAL_SECS;
        log::info!("Collection synced: {} new items", added);
        next
    }

    pub fn record_pull(
        &self,
        weapon_id: &str,
        category: &str,
        rarity: Edition,
        quality: f64,
        tier: QualityTier,
    ) -> (Self, RecordOutcome) {
        let is_knife = category == KNIFE_CATEGORY;
        let rarity = if is_knife { Edition::Exclusive } else { rarity };

        let mut next = self.clone();
        let skins = next.items.entry(category.to_string()).or_default();
        let position = match skins.iter().position(|s| s.id == weapon_id) {
            Some(position) => position,
            None => {
                skins.push(OwnedSkin::unowned(weapon_id, rarity));
                if !next.statistics.is_empty() {
                    next.statistics.entry(category.to_string()).or_default().total += 1;
                }
                skins.len() - 1
            }
        };

        let skin = &mut skins[position];
        let is_new = !skin.is_obtained();
        if quality > skin.max_quality {
            skin.max_quality = quality;
        }
        skin.tier_counts[tier.index()] += 1;

        if next.statistics.is_empty() {
            next.statistics = calculate_statistics(&next.items);
        } else if is_new {
            next.statistics.entry(category.to_string()).or_default().obtained += 1;
        }

        let rewards = if is_knife {
            SkinRewards::default()
        } else {
            rewards_for(rarity, is_new)
        };
        (next, RecordOutcome { is_new, rewards })
    }

    /// Stored statistics for a category, or counted from items if none are stored.
    pub fn category_stats(&self, category: &str) -> CategoryStats {
        if self.statistics.is_empty() {
            return calculate_statistics(&self.items)
                .remove(category)
                .unwrap_or_default();
        }
        self.statistics.get(category).copied().unwrap_or_default()
    }

    fn breakdown(&self, labels: Vec<String>, bucket: impl Fn(&OwnedSkin, &mut [u32; 5])) -> Breakdown {
        let mut totals = [0u32; 5];
        let categories: Vec<CategoryBreakdown> = self
            .items
            .iter()
            .map(|(category, skins)| {
                let mut counts = [0u32; 5];
                for skin in skins {
                    bucket(skin, &mut counts);
                }
                for (total, count) in totals.iter_mut().zip(counts) {
                    *total += count;
                }
                CategoryBreakdown {
                    id: category.clone(),
                    label: category_label(category),
                    counts,
                    total: counts.iter().sum(),
                }
            })
            .collect();
        Breakdown {
            labels,
            categories,
            total: totals.iter().sum(),
            totals,
        }
    }

    /// Pulls per edition.
    pub fn rarity_breakdown(&self) -> Breakdown {
        let labels = Edition::ALL.iter().map(|e| e.name().to_string()).collect();
        self.breakdown(labels, |skin, counts| counts[skin.rarity.index()] += skin.count())
    }

    /// Pulls per quality tier.
    pub fn quality_breakdown(&self) -> Breakdown {
        let labels = QualityTier::ALL.iter().map(QualityTier::label).collect();
        self.breakdown(labels, |skin, counts| {
            for (count, tier_count) in counts.iter_mut().zip(skin.tier_counts) {
                *count += tier_count;
            }
        })
    }

    /// Catalog items of a pool joined with what the ledger holds for them.
    pub fn items_for_pool(&self, pool_id: &str, catalog: &dyn ItemCatalog) -> PoolCollection {
        let pool = pool_by_id(pool_id);
        let owned = self.items.get(pool.category);
        let items = catalog
            .list_items(pool.category)
            .into_iter()
            .map(|item| {
                let stored = owned.and_then(|skins| skins.iter().find(|s| s.id == item.id));
                CollectionEntry {
                    tier_label: QualityTier::ALL[item.rarity.index()].roman(),
                    max_quality: stored.map(|s| s.max_quality).unwrap_or(0.0),
                    counts: stored.map(|s| s.tier_counts).unwrap_or_default(),
                    weapon_id: item.id,
                    weapon_name: item.name,
                    rarity: item.rarity,
                    image_ref: item.image_ref,
                }
            })
            .collect();
        PoolCollection {
            items,
            statistics: self.category_stats(pool.category),
        }
    }
}

pub const VPOINTS: &str = "valorant points";
pub const RPOINTS: &str = "radianite points";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkinCost {
    pub vpoints: u64,
    pub rpoints: u64,
}

impl SkinCost {
    /// `done` out of `of` pulls' worth of this cost.
    fn share(self, done: u64, of: u64) -> Self {
        if of == 0 || done >= of {
            return self;
        }
        Self {
            vpoints: self.vpoints * done / of,
            rpoints: self.rpoints * done / of,
        }
    }
}

/// Knife pulls cost RP, everything else VP; ten pulls come at a discount.
pub fn pull_cost(pool_id: &str, pulls: u32) -> SkinCost {
    let ten = pulls == 10;
    if is_knife_pool(pool_id) {
        SkinCost {
            vpoints: 0,
            rpoints: if ten { 100 } else { 10 },
        }
    } else {
        SkinCost {
            vpoints: if ten { 1_980 } else { 200 },
            rpoints: 0,
        }
    }
}

/// VP/RP balances and the USD payment account behind them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinWallet {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub vpoints: u64,
    #[serde(default)]
    pub rpoints: u64,
    #[serde(default)]
    pub account: PaymentAccount,
}

impl Default for SkinWallet {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            vpoints: 0,
            rpoints: 0,
            account: PaymentAccount::default(),
        }
    }
}

impl Versioned for SkinWallet {
    fn version(&self) -> u32 {
        self.version
    }
}

impl SkinWallet {
    pub fn can_afford(&self, pool_id: &str, pulls: u32) -> bool {
        self.ensure_affordable(pool_id, pulls).is_ok()
    }

    pub fn ensure_affordable(&self, pool_id: &str, pulls: u32) -> Result<()> {
        let cost = pull_cost(pool_id, pulls);
        if self.vpoints < cost.vpoints {
            return Err(GachaError::InsufficientCurrency {
                currency: VPOINTS,
                required: cost.vpoints,
                available: self.vpoints,
            });
        }
        if self.rpoints < cost.rpoints {
            return Err(GachaError::InsufficientCurrency {
                currency: RPOINTS,
                required: cost.rpoints,
                available: self.rpoints,
            });
        }
        Ok(())
    }

    pub fn top_up(&self, amount: Decimal) -> Result<Self> {
        Ok(Self {
            account: self.account.top_up(amount)?,
            ..self.clone()
        })
    }

    /// Buy a VP bundle; the reward lands in `vpoints`.
    pub fn purchase(&self, catalog: &BundleCatalog, bundle_id: &str) -> Result<(Self, u64)> {
        let (account, reward) = self.account.purchase(catalog, bundle_id)?;
        let vpoints = self
            .vpoints
            .checked_add(reward)
            .ok_or_else(|| GachaError::InvalidAmount(format!("{reward} VP overflows the balance")))?;
        let next = Self {
            account,
            vpoints,
            ..self.clone()
        };
        log::info!("Bought {} for {} VP", bundle_id, reward);
        Ok((next, reward))
    }

    pub fn offers(&self, catalog: &BundleCatalog) -> Vec<BundleOffer> {
        self.account.offers(catalog)
    }

    fn credit(&mut self, rewards: SkinRewards) {
        self.vpoints = self.vpoints.saturating_add(rewards.vpoints);
        self.rpoints = self.rpoints.saturating_add(rewards.rpoints);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkinPullResult {
    #[serde(flatten)]
    pub roll: SkinRoll,
    /// Edition the ledger recorded; knives always count as Exclusive.
    pub rarity: Edition,
    pub is_new: bool,
    pub rewards: SkinRewards,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkinPullOutcome {
    pub results: Vec<SkinPullResult>,
    pub wallet: SkinWallet,
    pub ledger: CollectionLedger,
}

/// Pull 1 or 10 skins: pay, roll, record and credit rewards. Inputs are
/// left as they were; a failure returns before anything is charged.
pub fn pull_skins<R: RngCore>(
    pool_id: &str,
    pulls: u32,
    wallet: &SkinWallet,
    ledger: &CollectionLedger,
    catalog: &dyn ItemCatalog,
    rng: &mut R,
) -> Result<SkinPullOutcome> {
    if pulls != 1 && pulls != 10 {
        return Err(GachaError::InvalidAmount(format!(
            "skin pulls come in 1 or 10, got {pulls}"
        )));
    }
    let pool = pool_by_id(pool_id);
    wallet.ensure_affordable(pool.id, pulls)?;

    let mut wallet = wallet.clone();
    let mut ledger = ledger.clone();
    let mut results = Vec::with_capacity(pulls as usize);

    for _ in 0..pulls {
        let Some(roll) = roll_skin_once(pool.id, catalog, rng) else {
            log::warn!("No catalog item for a roll from '{}', skipping", pool.id);
            continue;
        };
        let (next, outcome) = ledger.record_pull(
            &roll.weapon_id,
            &roll.category,
            roll.edition,
            roll.quality,
            roll.quality_tier,
        );
        ledger = next;
        wallet.credit(outcome.rewards);
        log::debug!(
            "{} {} q={} new={}",
            roll.weapon_id,
            roll.edition.name(),
            roll.quality,
            outcome.is_new
        );
        let rarity = if roll.category == KNIFE_CATEGORY {
            Edition::Exclusive
        } else {
            roll.edition
        };
        results.push(SkinPullResult {
            roll,
            rarity,
            is_new: outcome.is_new,
            rewards: outcome.rewards,
        });
    }

    // rolls the catalog could not fill are not charged
    let charged = pull_cost(pool.id, pulls).share(results.len() as u64, pulls as u64);
    wallet.vpoints -= charged.vpoints;
    wallet.rpoints -= charged.rpoints;

    log::info!("{} skin pull(s) from {}", results.len(), pool.label);
    Ok(SkinPullOutcome {
        results,
        wallet,
        ledger,
    })
}
