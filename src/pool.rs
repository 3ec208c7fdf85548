//! Pool roll engine. A batch runs pull by pull on a working copy of the
//! simulator state; the caller only sees the copy once every pull is done.
use crate::error::{GachaError, Result};
use crate::pity::{PitySummary, PoolStats, PullMode};
use crate::rarity::{PityCurve, RateTable, Rarity, CHARACTER_CURVE, CHARACTER_RATES, WEAPON_CURVE, WEAPON_RATES};
use crate::state::SimState;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Character,
    Weapon,
}

impl PoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Character => "character",
            PoolKind::Weapon => "weapon",
        }
    }
}

impl FromStr for PoolKind {
    type Err = GachaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "character" | "char" => Ok(PoolKind::Character),
            "weapon" => Ok(PoolKind::Weapon),
            other => Err(GachaError::UnknownPool(other.to_string())),
        }
    }
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    Primary,
    Secondary,
}

impl Currency {
    pub fn name(&self) -> &'static str {
        match self {
            Currency::Primary => "oroberyl",
            Currency::Secondary => "arsenal token",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pricing {
    PerPull(u64),
    /// Only sold as whole batches of `size` pulls.
    Batch { size: u32, cost: u64 },
}

/// Guaranteed 6★ once `after` pulls have passed without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardPity {
    pub after: u32,
    /// The guaranteed 6★ is always the rate-up one.
    pub forced_win: bool,
    /// Needs `hard_pity_available`, which a rate-up 6★ clears.
    pub consumable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolRules {
    pub kind: PoolKind,
    pub rates: RateTable,
    pub curve: PityCurve,
    pub hard_pity: HardPity,
    /// Chance a 6★ is the rate-up one.
    pub win_rate: f64,
    pub currency: Currency,
    pub pricing: Pricing,
    /// Secondary currency granted per pull, indexed 4★, 5★, 6★.
    pub rewards: Option<[u64; 3]>,
}

pub const CHARACTER_COST: u64 = 500;
pub const CHARACTER_REWARDS: [u64; 3] = [20, 200, 2_000];
pub const WEAPON_BATCH_COST: u64 = 1_980;
pub const WEAPON_BATCH_SIZE: u32 = 10;

impl PoolRules {
    pub fn character() -> Self {
        Self {
            kind: PoolKind::Character,
            rates: CHARACTER_RATES,
            curve: CHARACTER_CURVE,
            hard_pity: HardPity {
                after: 120,
                forced_win: true,
                consumable: true,
            },
            win_rate: 0.5,
            currency: Currency::Primary,
            pricing: Pricing::PerPull(CHARACTER_COST),
            rewards: Some(CHARACTER_REWARDS),
        }
    }

    pub fn weapon() -> Self {
        Self {
            kind: PoolKind::Weapon,
            rates: WEAPON_RATES,
            curve: WEAPON_CURVE,
            hard_pity: HardPity {
                after: WEAPON_CURVE.certain_at(),
                forced_win: false,
                consumable: false,
            },
            win_rate: 0.75,
            currency: Currency::Secondary,
            pricing: Pricing::Batch {
                size: WEAPON_BATCH_SIZE,
                cost: WEAPON_BATCH_COST,
            },
            rewards: None,
        }
    }

    pub fn for_pool(pool: PoolKind) -> Self {
        match pool {
            PoolKind::Character => Self::character(),
            PoolKind::Weapon => Self::weapon(),
        }
    }

    /// Pull count that will actually run for a request.
    pub fn normalize_pulls(&self, requested: u32) -> Result<u32> {
        if requested == 0 {
            return Err(GachaError::InvalidAmount("pull count must be at least 1".into()));
        }
        Ok(match self.pricing {
            Pricing::PerPull(_) => requested,
            Pricing::Batch { size, .. } => size,
        })
    }

    pub fn cost(&self, pulls: u32) -> u64 {
        match self.pricing {
            Pricing::PerPull(cost) => cost * u64::from(pulls),
            Pricing::Batch { cost, .. } => cost,
        }
    }

    /// Currency spent to reach `pull_count` lifetime pulls.
    pub fn spent_for(&self, pull_count: u32) -> u64 {
        match self.pricing {
            Pricing::PerPull(cost) => cost * u64::from(pull_count),
            Pricing::Batch { size, cost } => u64::from(pull_count / size) * cost,
        }
    }

    pub fn reward_for(&self, rarity: Rarity) -> u64 {
        self.rewards
            .map(|table| match rarity {
                Rarity::FourStar => table[0],
                Rarity::FiveStar => table[1],
                Rarity::SixStar => table[2],
            })
            .unwrap_or(0)
    }

    /// 6★ probability at a given pity.
    pub fn top_rate(&self, pity: u32) -> f64 {
        self.curve.top_rate(self.rates.rate(Rarity::SixStar), pity)
    }

    pub fn summary(&self, stats: &PoolStats) -> PitySummary {
        PitySummary::compute(
            stats,
            self.curve,
            self.rates.rate(Rarity::SixStar),
            self.spent_for(stats.pull_count),
        )
    }

    fn hard_pity_fires(&self, stats: &PoolStats) -> bool {
        let armed = !self.hard_pity.consumable || stats.hard_pity_available;
        armed && stats.pulls_since_top() >= self.hard_pity.after
    }

    fn coin<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() < self.win_rate
    }

    /// Resolve one pull: hard pity, then the shiny guarantee, then the
    /// pity-adjusted table.
    fn resolve<R: Rng + ?Sized>(
        &self,
        stats: &PoolStats,
        shiny: bool,
        rng: &mut R,
    ) -> (Rarity, Option<bool>, PullMode) {
        if self.hard_pity_fires(stats) {
            let win = self.hard_pity.forced_win || self.coin(rng);
            return (Rarity::SixStar, Some(win), PullMode::HardPity);
        }

        let (rarity, mode) = if shiny {
            (self.rates.sample_high(rng), PullMode::Shiny)
        } else {
            let base = self.rates.rate(Rarity::SixStar);
            let top = self.top_rate(stats.pity);
            let mode = if top > base {
                PullMode::SoftPity
            } else {
                PullMode::Normal
            };
            (self.rates.sample(rng, Some(top)), mode)
        };

        let win = (rarity == Rarity::SixStar).then(|| self.coin(rng));
        (rarity, win, mode)
    }

    pub fn roll<R: Rng + ?Sized>(&self, state: &SimState, pulls: u32, rng: &mut R) -> Result<RollOutcome> {
        let pulls = self.normalize_pulls(pulls)?;
        state.wallet.ensure_affordable(self, pulls)?;

        let mut working = state.clone();
        if let Pricing::Batch { cost, .. } = self.pricing {
            let balance = working.wallet.balance_mut(self.currency);
            *balance = balance.saturating_sub(cost);
        }

        let mut results = Vec::with_capacity(pulls as usize);
        for _ in 0..pulls {
            let stats = working.pool(self.kind);
            let pull_index = stats.pull_count + 1;
            let shiny = stats.shiny_guaranteed(pull_index);
            let (rarity, win, mode) = self.resolve(stats, shiny, rng);
            log::debug!(
                "{} pull #{}: {} ({:?}, win {:?})",
                self.kind,
                pull_index,
                rarity,
                mode,
                win
            );

            working
                .pool_mut(self.kind)
                .record(pull_index, rarity, win, self.hard_pity.consumable);

            if let Pricing::PerPull(cost) = self.pricing {
                let balance = working.wallet.balance_mut(self.currency);
                *balance = balance.saturating_sub(cost);
            }
            working.wallet.secondary = working.wallet.secondary.saturating_add(self.reward_for(rarity));

            results.push(PullResult {
                rarity,
                win,
                pull_index,
                mode,
            });
        }

        log::info!(
            "{} pool: {} pulls, {} at 6★, pity now {}",
            self.kind,
            results.len(),
            results.iter().filter(|r| r.rarity == Rarity::SixStar).count(),
            working.pool(self.kind).pity
        );

        Ok(RollOutcome {
            results,
            state: working,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResult {
    pub rarity: Rarity,
    pub win: Option<bool>,
    pub pull_index: u32,
    pub mode: PullMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollOutcome {
    pub results: Vec<PullResult>,
    pub state: SimState,
}

/// Run `pulls` pulls in `pool` against `state`.
pub fn roll<R: Rng + ?Sized>(pool: PoolKind, pulls: u32, state: &SimState, rng: &mut R) -> Result<RollOutcome> {
    PoolRules::for_pool(pool).roll(state, pulls, rng)
}
