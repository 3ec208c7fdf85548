//! Rarity tiers, rate tables and the pity-adjusted top-tier rate.
//! Character pool: 6★ 0.8%, 5★ 8%, soft pity from pity 66 up to a certain 6★ at 79.
//! Weapon pool: 6★ 4%, 5★ 15%, 6★ certain on the 30th pull without one.
use crate::error::{GachaError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Rarity {
    FourStar,
    FiveStar,
    SixStar,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::FourStar => "4★",
            Rarity::FiveStar => "5★",
            Rarity::SixStar => "6★",
        }
    }

    pub fn stars(&self) -> u8 {
        match self {
            Rarity::FourStar => 4,
            Rarity::FiveStar => 5,
            Rarity::SixStar => 6,
        }
    }

    /// 5★ and above are logged in the pull history.
    pub fn is_high(&self) -> bool {
        *self >= Rarity::FiveStar
    }
}

impl From<Rarity> for u8 {
    fn from(rarity: Rarity) -> u8 {
        rarity.stars()
    }
}

impl TryFrom<u8> for Rarity {
    type Error = String;

    fn try_from(stars: u8) -> std::result::Result<Self, Self::Error> {
        match stars {
            4 => Ok(Rarity::FourStar),
            5 => Ok(Rarity::FiveStar),
            6 => Ok(Rarity::SixStar),
            other => Err(format!("no {other}★ tier")),
        }
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const RATE_SUM_TOLERANCE: f64 = 1e-9;

/// Base probabilities per tier. Always sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    low: f64,
    mid: f64,
    top: f64,
}

pub const CHARACTER_RATES: RateTable = RateTable {
    low: 0.912,
    mid: 0.08,
    top: 0.008,
};

pub const WEAPON_RATES: RateTable = RateTable {
    low: 0.81,
    mid: 0.15,
    top: 0.04,
};

impl RateTable {
    pub fn new(low: f64, mid: f64, top: f64) -> Result<Self> {
        for (name, rate) in [("4★", low), ("5★", mid), ("6★", top)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(GachaError::InvalidRateTable(format!(
                    "{name} rate {rate} outside [0, 1]"
                )));
            }
        }
        let sum = low + mid + top;
        if (sum - 1.0).abs() > RATE_SUM_TOLERANCE {
            return Err(GachaError::InvalidRateTable(format!(
                "rates sum to {sum}, expected 1"
            )));
        }
        Ok(Self { low, mid, top })
    }

    pub fn rate(&self, rarity: Rarity) -> f64 {
        match rarity {
            Rarity::FourStar => self.low,
            Rarity::FiveStar => self.mid,
            Rarity::SixStar => self.top,
        }
    }

    /// Draw one tier. Bands are laid out top first: `[0, top)` is 6★,
    /// `[top, top + mid)` is 5★, the rest is 4★. `top_override` swaps the
    /// 6★ band width only; 5★ keeps its raw rate.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, top_override: Option<f64>) -> Rarity {
        let roll: f64 = rng.gen();
        let top = top_override.unwrap_or(self.top);
        if roll < top {
            Rarity::SixStar
        } else if roll < top + self.mid {
            Rarity::FiveStar
        } else {
            Rarity::FourStar
        }
    }

    /// Tier under a "5★ or better" guarantee, split by the base 6★:5★ ratio.
    pub fn sample_high<R: Rng + ?Sized>(&self, rng: &mut R) -> Rarity {
        let high = self.mid + self.top;
        if high <= 0.0 {
            return Rarity::FiveStar;
        }
        let roll: f64 = rng.gen();
        if roll < self.top / high {
            Rarity::SixStar
        } else {
            Rarity::FiveStar
        }
    }
}

/// How the 6★ rate grows with pity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PityCurve {
    /// Base rate up to `start` inclusive, linear up to 1.0 at `full`.
    Linear { start: u32, full: u32 },
    /// Base rate below `at`, 1.0 from `at` on.
    Step { at: u32 },
}

pub const CHARACTER_CURVE: PityCurve = PityCurve::Linear { start: 65, full: 79 };
pub const WEAPON_CURVE: PityCurve = PityCurve::Step { at: 29 };

impl PityCurve {
    pub fn top_rate(&self, base: f64, pity: u32) -> f64 {
        match *self {
            PityCurve::Linear { start, full } => {
                if pity <= start {
                    base
                } else if pity >= full {
                    1.0
                } else {
                    let progress = f64::from(pity - start) / f64::from(full - start);
                    base + progress * (1.0 - base)
                }
            }
            PityCurve::Step { at } => {
                if pity >= at {
                    1.0
                } else {
                    base
                }
            }
        }
    }

    /// Pity value at which the rate reaches 1.0.
    pub fn certain_at(&self) -> u32 {
        match *self {
            PityCurve::Linear { full, .. } => full,
            PityCurve::Step { at } => at,
        }
    }
}

/// 6★ rate of the character pool at a given pity.
pub fn character_top_rate(pity: u32) -> f64 {
    CHARACTER_CURVE.top_rate(CHARACTER_RATES.top, pity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn rarity_as_str_all_variants() {
        assert_eq!(Rarity::FourStar.as_str(), "4★");
        assert_eq!(Rarity::FiveStar.as_str(), "5★");
        assert_eq!(Rarity::SixStar.as_str(), "6★");
    }

    #[test]
    fn rarity_serializes_as_star_count() {
        assert_eq!(serde_json::to_string(&Rarity::SixStar).unwrap(), "6");
        let back: Rarity = serde_json::from_str("5").unwrap();
        assert_eq!(back, Rarity::FiveStar);
        assert!(serde_json::from_str::<Rarity>("7").is_err());
    }

    #[test]
    fn builtin_tables_validate() {
        let c = CHARACTER_RATES;
        let w = WEAPON_RATES;
        assert!(RateTable::new(c.low, c.mid, c.top).is_ok());
        assert!(RateTable::new(w.low, w.mid, w.top).is_ok());
    }

    #[test]
    fn table_rejects_bad_sums_and_ranges() {
        assert!(matches!(
            RateTable::new(0.5, 0.2, 0.2),
            Err(GachaError::InvalidRateTable(_))
        ));
        assert!(matches!(
            RateTable::new(1.2, -0.1, -0.1),
            Err(GachaError::InvalidRateTable(_))
        ));
    }

    #[test]
    fn sample_uses_top_first_bands() {
        let table = CHARACTER_RATES;
        assert_eq!(table.sample(&mut ScriptedRng::constant(0.0009), None), Rarity::SixStar);
        assert_eq!(table.sample(&mut ScriptedRng::constant(0.008), None), Rarity::FiveStar);
        assert_eq!(table.sample(&mut ScriptedRng::constant(0.0879), None), Rarity::FiveStar);
        assert_eq!(table.sample(&mut ScriptedRng::constant(0.089), None), Rarity::FourStar);
    }

    #[test]
    fn override_replaces_only_top_band() {
        let table = CHARACTER_RATES;
        // 6★ band widened to 0.5, 5★ band keeps its 0.08 width.
        assert_eq!(table.sample(&mut ScriptedRng::constant(0.49), Some(0.5)), Rarity::SixStar);
        assert_eq!(table.sample(&mut ScriptedRng::constant(0.57), Some(0.5)), Rarity::FiveStar);
        assert_eq!(table.sample(&mut ScriptedRng::constant(0.59), Some(0.5)), Rarity::FourStar);
        assert_eq!(table.sample(&mut ScriptedRng::constant(0.999), Some(1.0)), Rarity::SixStar);
    }

    #[test]
    fn high_sample_splits_by_base_ratio() {
        let table = CHARACTER_RATES;
        let six_share = 0.008 / 0.088;
        assert_eq!(
            table.sample_high(&mut ScriptedRng::constant(six_share - 0.001)),
            Rarity::SixStar
        );
        assert_eq!(
            table.sample_high(&mut ScriptedRng::constant(six_share + 0.001)),
            Rarity::FiveStar
        );
    }

    #[test]
    fn soft_pity_boundaries() {
        assert_eq!(character_top_rate(0), 0.008);
        assert_eq!(character_top_rate(65), 0.008);
        assert_eq!(character_top_rate(79), 1.0);
        assert_eq!(character_top_rate(200), 1.0);
        let mid = character_top_rate(72);
        assert!((mid - (0.008 + 0.5 * 0.992)).abs() < 1e-12);
    }

    #[test]
    fn soft_pity_is_monotonic() {
        let mut prev = 0.0;
        for pity in 0..=130 {
            let rate = character_top_rate(pity);
            assert!(rate >= prev, "rate dropped at pity {pity}: {rate} < {prev}");
            assert!(rate <= 1.0);
            prev = rate;
        }
    }

    #[test]
    fn weapon_curve_steps_to_certain() {
        assert_eq!(WEAPON_CURVE.top_rate(0.04, 28), 0.04);
        assert_eq!(WEAPON_CURVE.top_rate(0.04, 29), 1.0);
        assert_eq!(WEAPON_CURVE.certain_at(), 29);
    }

    #[test]
    fn six_star_base_rate_within_expected_bounds() {
        // 0.8% over 50 000 draws is ~400; [250, 550] covers many standard deviations.
        let mut rng = SmallRng::seed_from_u64(12_345);
        let count = (0..50_000)
            .filter(|_| CHARACTER_RATES.sample(&mut rng, None) == Rarity::SixStar)
            .count();
        assert!(
            count > 250 && count < 550,
            "6★ count {count} outside expected range for 50 000 draws at 0.8%"
        );
    }

    #[test]
    fn all_rarities_are_reachable() {
        let mut rng = SmallRng::seed_from_u64(99_999);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50_000 {
            seen.insert(WEAPON_RATES.sample(&mut rng, None));
        }
        assert_eq!(seen.len(), 3);
    }
}
