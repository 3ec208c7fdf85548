use crate::ledger::Wallet;
use crate::pity::PoolStats;
use crate::pool::PoolKind;
use serde::{Deserialize, Serialize};

/// Layout version written with every stored blob.
pub const STATE_VERSION: u32 = 1;

fn default_version() -> u32 {
    STATE_VERSION
}

/// Everything the gacha simulator persists under one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub character: PoolStats,
    #[serde(default)]
    pub weapon: PoolStats,
    #[serde(default)]
    pub wallet: Wallet,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            character: PoolStats::default(),
            weapon: PoolStats::default(),
            wallet: Wallet::default(),
        }
    }
}

impl SimState {
    /// Fresh state with a custom starting oroberyl balance.
    pub fn with_starting_primary(primary: u64) -> Self {
        Self {
            wallet: Wallet::with_primary(primary),
            ..Self::default()
        }
    }

    pub fn pool(&self, pool: PoolKind) -> &PoolStats {
        match pool {
            PoolKind::Character => &self.character,
            PoolKind::Weapon => &self.weapon,
        }
    }

    pub(crate) fn pool_mut(&mut self, pool: PoolKind) -> &mut PoolStats {
        match pool {
            PoolKind::Character => &mut self.character,
            PoolKind::Weapon => &mut self.weapon,
        }
    }

    /// Wipe one pool: counters, history and that pool's currency.
    pub fn reset_pool(&self, pool: PoolKind) -> Self {
        let mut next = self.clone();
        *next.pool_mut(pool) = PoolStats::default();
        match pool {
            PoolKind::Character => next.wallet.primary = 0,
            PoolKind::Weapon => next.wallet.secondary = 0,
        }
        next
    }
}
