//! Currency ledger: in-game currencies, the simulated payment account and
//! bundle purchases. Every operation returns a new value; the input is
//! never touched, so a failed call leaves nothing half-applied.
use crate::error::{GachaError, Result};
use crate::pool::{Currency, PoolKind, PoolRules};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Primary currency received per unit of exchange currency.
pub const EXCHANGE_RATE: u64 = 75;

pub const DEFAULT_PRIMARY: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub fixed_reward: u64,
    #[serde(default)]
    pub bonus_reward: u64,
    #[serde(default)]
    pub first_bonus_reward: u64,
}

/// A bundle as one account sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleOffer {
    #[serde(flatten)]
    pub bundle: Bundle,
    pub first_bonus_consumed: bool,
    pub reward: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleCatalog {
    bundles: Vec<Bundle>,
}

static DEFAULT_CNY_BUNDLES: Lazy<BundleCatalog> =
    Lazy::new(|| BundleCatalog::embedded(include_str!("../data/bundles_cny.json")));

static DEFAULT_USD_BUNDLES: Lazy<BundleCatalog> =
    Lazy::new(|| BundleCatalog::embedded(include_str!("../data/bundles_usd.json")));

impl BundleCatalog {
    pub fn new(bundles: Vec<Bundle>) -> Self {
        Self { bundles }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| GachaError::Storage(format!("bundle catalog: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| GachaError::Storage(format!("read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    fn embedded(json: &str) -> Self {
        Self::from_json(json).unwrap_or_else(|e| {
            log::error!("Embedded bundle catalog is invalid: {}", e);
            Self::default()
        })
    }

    /// Origeometry bundles priced in CNY.
    pub fn default_cny() -> &'static BundleCatalog {
        &DEFAULT_CNY_BUNDLES
    }

    /// VP bundles priced in USD.
    pub fn default_usd() -> &'static BundleCatalog {
        &DEFAULT_USD_BUNDLES
    }

    pub fn get(&self, id: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.id == id)
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }
}

/// Simulated real-money account, in one base currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAccount {
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub spent: Decimal,
    /// Bundle ids whose first-purchase bonus is gone.
    #[serde(default)]
    pub first_bonus_used: BTreeSet<String>,
}

impl PaymentAccount {
    pub fn top_up(&self, amount: Decimal) -> Result<Self> {
        if amount <= Decimal::ZERO {
            return Err(GachaError::InvalidAmount(format!(
                "top-up must be positive, got {amount}"
            )));
        }
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| GachaError::InvalidAmount(format!("top-up of {amount} overflows the balance")))?;
        Ok(Self {
            balance,
            ..self.clone()
        })
    }

    pub fn reward_for(&self, bundle: &Bundle) -> u64 {
        let bonus = if self.first_bonus_used.contains(&bundle.id) {
            bundle.bonus_reward
        } else {
            bundle.first_bonus_reward
        };
        bundle.fixed_reward + bonus
    }

    /// Debit the bundle price and consume its first bonus in one step.
    pub fn purchase(&self, catalog: &BundleCatalog, bundle_id: &str) -> Result<(Self, u64)> {
        let bundle = catalog
            .get(bundle_id)
            .ok_or_else(|| GachaError::BundleNotFound(bundle_id.to_string()))?;
        if self.balance < bundle.price {
            return Err(GachaError::InsufficientBalance {
                required: bundle.price,
                available: self.balance,
            });
        }
        let reward = self.reward_for(bundle);
        let mut first_bonus_used = self.first_bonus_used.clone();
        first_bonus_used.insert(bundle.id.clone());
        let spent = self
            .spent
            .checked_add(bundle.price)
            .ok_or_else(|| GachaError::InvalidAmount(format!("spending {} overflows the total", bundle.price)))?;
        let next = Self {
            balance: self.balance - bundle.price,
            spent,
            first_bonus_used,
        };
        Ok((next, reward))
    }

    pub fn offers(&self, catalog: &BundleCatalog) -> Vec<BundleOffer> {
        catalog
            .bundles()
            .iter()
            .map(|bundle| BundleOffer {
                bundle: bundle.clone(),
                first_bonus_consumed: self.first_bonus_used.contains(&bundle.id),
                reward: self.reward_for(bundle),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Oroberyl, spent on character pulls.
    #[serde(default)]
    pub primary: u64,
    /// Arsenal tokens, earned from character pulls and spent on weapon batches.
    #[serde(default)]
    pub secondary: u64,
    /// Origeometry, bought with real money.
    #[serde(default)]
    pub exchange: u64,
    #[serde(default)]
    pub account: PaymentAccount,
}

impl Default for Wallet {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY,
            secondary: 0,
            exchange: 0,
            account: PaymentAccount::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub wallet: Wallet,
    pub reward: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub wallet: Wallet,
    pub received: u64,
}

impl Wallet {
    pub fn with_primary(primary: u64) -> Self {
        Self {
            primary,
            ..Self::default()
        }
    }

    pub fn balance_of(&self, currency: Currency) -> u64 {
        match currency {
            Currency::Primary => self.primary,
            Currency::Secondary => self.secondary,
        }
    }

    pub(crate) fn balance_mut(&mut self, currency: Currency) -> &mut u64 {
        match currency {
            Currency::Primary => &mut self.primary,
            Currency::Secondary => &mut self.secondary,
        }
    }

    pub fn can_afford(&self, pool: PoolKind, pulls: u32) -> bool {
        let rules = PoolRules::for_pool(pool);
        match rules.normalize_pulls(pulls) {
            Ok(pulls) => self.balance_of(rules.currency) >= rules.cost(pulls),
            Err(_) => false,
        }
    }

    /// Fails with `InsufficientCurrency` when the batch cannot be paid.
    pub fn ensure_affordable(&self, rules: &PoolRules, pulls: u32) -> Result<()> {
        let required = rules.cost(pulls);
        let available = self.balance_of(rules.currency);
        if available < required {
            return Err(GachaError::InsufficientCurrency {
                currency: rules.currency.name(),
                required,
                available,
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

    pub fn apply_bundle_purchase(&self, catalog: &BundleCatalog, bundle_id: &str) -> Result<Purchase> {
        let (account, reward) = self.account.purchase(catalog, bundle_id)?;
        let exchange = self
            .exchange
            .checked_add(reward)
            .ok_or_else(|| GachaError::InvalidAmount(format!("{reward} origeometry overflows the balance")))?;
        Ok(Purchase {
            wallet: Self {
                exchange,
                account,
                ..self.clone()
            },
            reward,
        })
    }

    pub fn convert_exchange(&self, amount: u64) -> Result<Conversion> {
        if amount == 0 || amount > self.exchange {
            return Err(GachaError::InvalidAmount(format!(
                "cannot convert {amount} origeometry, have {}",
                self.exchange
            )));
        }
        let received = amount
            .checked_mul(EXCHANGE_RATE)
            .filter(|r| self.primary.checked_add(*r).is_some())
            .ok_or_else(|| GachaError::InvalidAmount(format!("converting {amount} origeometry overflows oroberyl")))?;
        Ok(Conversion {
            wallet: Self {
                exchange: self.exchange - amount,
                primary: self.primary + received,
                ..self.clone()
            },
            received,
        })
    }

    pub fn offers(&self, catalog: &BundleCatalog) -> Vec<BundleOffer> {
        self.account.offers(catalog)
    }
}

/// Whether `wallet` can pay for `pulls` in `pool`.
pub fn can_afford(pool: PoolKind, pulls: u32, wallet: &Wallet) -> bool {
    wallet.can_afford(pool, pulls)
}
