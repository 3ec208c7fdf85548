//! Skin pulls: an edition roll, an independent quality roll, and the knife
//! redirect for the two top editions.
use crate::catalog::ItemCatalog;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Edition {
    Select,
    Deluxe,
    Premium,
    Exclusive,
    Ultra,
}

/// Edition odds in percent, rolled top to bottom of this list.
pub const EDITION_TABLE: [(Edition, f64); 5] = [
    (Edition::Select, 79.92),
    (Edition::Deluxe, 15.98),
    (Edition::Premium, 3.2),
    (Edition::Exclusive, 0.64),
    (Edition::Ultra, 0.26),
];

impl Edition {
    pub const ALL: [Edition; 5] = [
        Edition::Select,
        Edition::Deluxe,
        Edition::Premium,
        Edition::Exclusive,
        Edition::Ultra,
    ];

    pub fn id(&self) -> u8 {
        match self {
            Edition::Select => 1,
            Edition::Deluxe => 2,
            Edition::Premium => 3,
            Edition::Exclusive => 4,
            Edition::Ultra => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Edition::Select => "Select Edition",
            Edition::Deluxe => "Deluxe Edition",
            Edition::Premium => "Premium Edition",
            Edition::Exclusive => "Exclusive Edition",
            Edition::Ultra => "Ultra Edition",
        }
    }

    pub fn index(&self) -> usize {
        usize::from(self.id() - 1)
    }
}

impl From<Edition> for u8 {
    fn from(edition: Edition) -> u8 {
        edition.id()
    }
}

impl TryFrom<u8> for Edition {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Edition::ALL
            .iter()
            .copied()
            .find(|e| e.id() == id)
            .ok_or_else(|| format!("no edition with id {id}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum QualityTier {
    I,
    II,
    III,
    IV,
    V,
}

/// Lower bounds of tiers I..V; each tier runs up to the next bound, V up to 100.
const QUALITY_BREAKPOINTS: [(QualityTier, f64, f64); 5] = [
    (QualityTier::I, 0.0, 30.0),
    (QualityTier::II, 30.0, 55.0),
    (QualityTier::III, 55.0, 75.0),
    (QualityTier::IV, 75.0, 90.0),
    (QualityTier::V, 90.0, 100.0),
];

impl QualityTier {
    pub const ALL: [QualityTier; 5] = [
        QualityTier::I,
        QualityTier::II,
        QualityTier::III,
        QualityTier::IV,
        QualityTier::V,
    ];

    pub fn from_value(value: f64) -> Self {
        QUALITY_BREAKPOINTS
            .iter()
            .find(|(_, min, max)| value >= *min && value < *max)
            .map(|(tier, _, _)| *tier)
            .unwrap_or(QualityTier::V)
    }

    pub fn id(&self) -> u8 {
        match self {
            QualityTier::I => 1,
            QualityTier::II => 2,
            QualityTier::III => 3,
            QualityTier::IV => 4,
            QualityTier::V => 5,
        }
    }

    pub fn index(&self) -> usize {
        usize::from(self.id() - 1)
    }

    pub fn roman(&self) -> &'static str {
        match self {
            QualityTier::I => "I",
            QualityTier::II => "II",
            QualityTier::III => "III",
            QualityTier::IV => "IV",
            QualityTier::V => "V",
        }
    }

    /// e.g. "III (Base 55-75%)"
    pub fn label(&self) -> String {
        let (_, min, max) = QUALITY_BREAKPOINTS[self.index()];
        format!("{} (Base {}-{}%)", self.roman(), min, max)
    }
}

impl From<QualityTier> for u8 {
    fn from(tier: QualityTier) -> u8 {
        tier.id()
    }
}

impl TryFrom<u8> for QualityTier {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        QualityTier::ALL
            .iter()
            .copied()
            .find(|t| t.id() == id)
            .ok_or_else(|| format!("no quality tier {id}"))
    }
}

pub fn roll_edition<R: Rng + ?Sized>(rng: &mut R) -> Edition {
    let roll = rng.gen::<f64>() * 100.0;
    let mut cursor = 0.0;
    for (edition, probability) in EDITION_TABLE {
        let next = cursor + probability;
        if roll >= cursor && roll < next {
            return edition;
        }
        cursor = next;
    }
    Edition::Ultra
}

/// Uniform quality in `[0, 100)`, rounded to 8 decimals.
pub fn roll_quality<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let value = rng.gen::<f64>() * 100.0;
    let rounded = (value * 1e8).round() / 1e8;
    // rounding may land exactly on 100
    rounded.min(100.0 - 1e-8)
}

pub const KNIFE_POOL_ID: &str = "knife";
pub const KNIFE_CATEGORY: &str = "melee";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkinPool {
    pub id: &'static str,
    pub label: &'static str,
    pub category: &'static str,
}

const fn gun(id: &'static str, label: &'static str) -> SkinPool {
    SkinPool {
        id,
        label,
        category: id,
    }
}

pub const GUN_POOLS: [SkinPool; 18] = [
    gun("classic", "Classic"),
    gun("shorty", "Shorty"),
    gun("frenzy", "Frenzy"),
    gun("ghost", "Ghost"),
    gun("sheriff", "Sheriff"),
    gun("stinger", "Stinger"),
    gun("spectre", "Spectre"),
    gun("bucky", "Bucky"),
    gun("judge", "Judge"),
    gun("bulldog", "Bulldog"),
    gun("guardian", "Guardian"),
    gun("phantom", "Phantom"),
    gun("vandal", "Vandal"),
    gun("marshal", "Marshal"),
    gun("outlaw", "Outlaw"),
    gun("operator", "Operator"),
    gun("ares", "Ares"),
    gun("odin", "Odin"),
];

pub const KNIFE_POOL: SkinPool = SkinPool {
    id: KNIFE_POOL_ID,
    label: "Knife",
    category: KNIFE_CATEGORY,
};

pub fn is_knife_pool(pool_id: &str) -> bool {
    pool_id == KNIFE_POOL_ID
}

/// Pool by id; unknown ids fall back to the first gun pool.
pub fn pool_by_id(pool_id: &str) -> &'static SkinPool {
    if is_knife_pool(pool_id) {
        return &KNIFE_POOL;
    }
    GUN_POOLS
        .iter()
        .find(|pool| pool.id == pool_id)
        .unwrap_or(&GUN_POOLS[0])
}

/// Label for a stored category.
pub fn category_label(category: &str) -> String {
    if category == KNIFE_CATEGORY {
        return "Knife".to_string();
    }
    let mut chars = category.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Exclusive and Ultra rolls from a gun pool may turn into a knife.
fn stays_on_gun<R: Rng + ?Sized>(edition: Edition, rng: &mut R) -> bool {
    match edition {
        Edition::Exclusive => rng.gen::<f64>() < 0.5,
        Edition::Ultra => rng.gen::<f64>() < 0.6666,
        _ => true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinRoll {
    pub weapon_id: String,
    pub weapon_name: String,
    pub edition: Edition,
    pub quality: f64,
    pub quality_tier: QualityTier,
    pub category: String,
    pub image_ref: String,
}

/// One skin from `pool_id`. `None` when the catalog has nothing to hand out.
pub fn roll_skin_once<R: RngCore>(pool_id: &str, catalog: &dyn ItemCatalog, rng: &mut R) -> Option<SkinRoll> {
    let edition = roll_edition(rng);
    let quality = roll_quality(rng);
    let quality_tier = QualityTier::from_value(quality);

    let mut pool = pool_by_id(pool_id);
    if !is_knife_pool(pool.id) && matches!(edition, Edition::Exclusive | Edition::Ultra) && !stays_on_gun(edition, rng) {
        pool = &KNIFE_POOL;
    }

    // knives are all catalogued as Exclusive
    let lookup = if is_knife_pool(pool.id) {
        Edition::Exclusive
    } else {
        edition
    };
    let dyn_rng: &mut dyn RngCore = rng;
    let item = catalog.random_item(pool.category, lookup, dyn_rng)?;

    Some(SkinRoll {
        weapon_id: item.id,
        weapon_name: item.name,
        edition,
        quality,
        quality_tier,
        category: item.category,
        image_ref: item.image_ref,
    })
}
