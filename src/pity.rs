//! Per-pool pity state: counters, the 5★+ pull log and the analytics
//! derived from it.
use crate::rarity::{PityCurve, Rarity};
use serde::{Deserialize, Serialize};

/// Pulls without a 5★ or better before the next one is forced.
pub const SHINY_WINDOW: u32 = 10;

/// One logged 5★+ result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRecord {
    pub pull_index: u32,
    pub rarity: Rarity,
    /// Rate-up outcome; only set on 6★.
    pub win: Option<bool>,
}

/// Which rule decided a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullMode {
    Normal,
    SoftPity,
    Shiny,
    HardPity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    #[serde(default)]
    pub pull_count: u32,
    #[serde(default)]
    pub pity: u32,
    #[serde(default = "default_hard_pity_available")]
    pub hard_pity_available: bool,
    /// Newest first.
    #[serde(default)]
    pub pull_history: Vec<PullRecord>,
}

fn default_hard_pity_available() -> bool {
    true
}

impl Default for PoolStats {
    fn default() -> Self {
        Self {
            pull_count: 0,
            pity: 0,
            hard_pity_available: default_hard_pity_available(),
            pull_history: Vec::new(),
        }
    }
}

impl PoolStats {
    /// Pull index of the newest 5★+ result.
    pub fn last_high_pull(&self) -> Option<u32> {
        self.pull_history
            .iter()
            .filter(|r| r.rarity.is_high())
            .map(|r| r.pull_index)
            .max()
    }

    /// Pull index of the newest 6★ result.
    pub fn last_top_pull(&self) -> Option<u32> {
        self.pull_history
            .iter()
            .filter(|r| r.rarity == Rarity::SixStar)
            .map(|r| r.pull_index)
            .max()
    }

    pub fn pulls_since_top(&self) -> u32 {
        self.pull_count
            .saturating_sub(self.last_top_pull().unwrap_or(0))
    }

    /// Pity as implied by the history alone.
    pub fn pity_from_history(&self) -> u32 {
        self.pulls_since_top()
    }

    /// Whether pull number `current` must be 5★ or better.
    pub fn shiny_guaranteed(&self, current: u32) -> bool {
        match self.last_high_pull() {
            None => current >= SHINY_WINDOW,
            Some(last) => current.saturating_sub(last) >= SHINY_WINDOW,
        }
    }

    /// Apply one resolved pull to this (working) copy.
    pub(crate) fn record(&mut self, pull_index: u32, rarity: Rarity, win: Option<bool>, consume_on_win: bool) {
        if rarity == Rarity::SixStar {
            self.pity = 0;
            if consume_on_win && win == Some(true) {
                self.hard_pity_available = false;
            }
        } else {
            self.pity += 1;
        }
        if rarity.is_high() {
            self.pull_history.push(PullRecord {
                pull_index,
                rarity,
                win,
            });
            self.pull_history
                .sort_by(|a, b| b.pull_index.cmp(&a.pull_index));
        }
        self.pull_count = pull_index;
    }
}

/// Pulls between two consecutive 6★ results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PitySegment {
    pub start: u32,
    pub end: u32,
    pub pity: u32,
    pub win: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PityMetric {
    pub pity: u32,
    /// 6★ probability at that pity, in percent.
    pub probability: f64,
}

/// History analytics for one pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitySummary {
    pub total_pulls: u32,
    pub current_pity: u32,
    pub current_top_rate: f64,
    pub five_star_count: usize,
    pub six_star_count: usize,
    pub six_star_wins: usize,
    pub six_star_losses: usize,
    /// Percentages of total pulls / of 6★ results.
    pub five_star_rate: f64,
    pub six_star_rate: f64,
    pub win_rate: f64,
    pub loss_rate: f64,
    pub segments: Vec<PitySegment>,
    pub average: Option<PityMetric>,
    pub lowest: Option<PityMetric>,
    pub highest: Option<PityMetric>,
    pub currency_spent: u64,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl PitySummary {
    pub fn compute(stats: &PoolStats, curve: PityCurve, base_top: f64, currency_spent: u64) -> Self {
        let history = &stats.pull_history;
        let five_star_count = history.iter().filter(|r| r.rarity == Rarity::FiveStar).count();
        let six: Vec<&PullRecord> = {
            let mut six: Vec<&PullRecord> = history
                .iter()
                .filter(|r| r.rarity == Rarity::SixStar)
                .collect();
            six.sort_by_key(|r| r.pull_index);
            six
        };
        let six_star_wins = six.iter().filter(|r| r.win == Some(true)).count();
        let six_star_losses = six.iter().filter(|r| r.win == Some(false)).count();

        let mut segments = Vec::with_capacity(six.len());
        let mut prev = 0;
        for record in &six {
            segments.push(PitySegment {
                start: prev,
                end: record.pull_index,
                pity: record.pull_index.saturating_sub(prev),
                win: record.win,
            });
            prev = record.pull_index;
        }

        let metric = |pity: u32| PityMetric {
            pity,
            probability: curve.top_rate(base_top, pity) * 100.0,
        };
        let pities: Vec<u32> = segments.iter().map(|s| s.pity).collect();
        let average = if pities.is_empty() {
            None
        } else {
            let mean = pities.iter().map(|&p| f64::from(p)).sum::<f64>() / pities.len() as f64;
            Some(metric(mean.round() as u32))
        };

        let total = stats.pull_count as usize;
        Self {
            total_pulls: stats.pull_count,
            current_pity: stats.pity,
            current_top_rate: curve.top_rate(base_top, stats.pity) * 100.0,
            five_star_count,
            six_star_count: six.len(),
            six_star_wins,
            six_star_losses,
            five_star_rate: percent(five_star_count, total),
            six_star_rate: percent(six.len(), total),
            win_rate: percent(six_star_wins, six.len()),
            loss_rate: percent(six_star_losses, six.len()),
            segments,
            average,
            lowest: pities.iter().min().map(|&p| metric(p)),
            highest: pities.iter().max().map(|&p| metric(p)),
            currency_spent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rarity::{CHARACTER_CURVE, CHARACTER_RATES};

    fn stats_with(history: &[(u32, Rarity, Option<bool>)], pull_count: u32) -> PoolStats {
        let mut stats = PoolStats::default();
        for &(idx, rarity, win) in history {
            stats.pull_history.push(PullRecord {
                pull_index: idx,
                rarity,
                win,
            });
        }
        stats.pull_history.sort_by(|a, b| b.pull_index.cmp(&a.pull_index));
        stats.pull_count = pull_count;
        stats.pity = stats.pity_from_history();
        stats
    }

    #[test]
    fn record_resets_pity_on_six_star() {
        let mut stats = PoolStats::default();
        for i in 1..=5 {
            stats.record(i, Rarity::FourStar, None, true);
        }
        assert_eq!(stats.pity, 5);
        stats.record(6, Rarity::SixStar, Some(false), true);
        assert_eq!(stats.pity, 0);
        assert!(stats.hard_pity_available, "a lost 50/50 keeps hard pity armed");
        stats.record(7, Rarity::SixStar, Some(true), true);
        assert!(!stats.hard_pity_available);
        assert_eq!(stats.pull_count, 7);
        assert_eq!(stats.pull_history[0].pull_index, 7);
    }

    #[test]
    fn history_only_keeps_high_rarity() {
        let mut stats = PoolStats::default();
        stats.record(1, Rarity::FourStar, None, true);
        stats.record(2, Rarity::FiveStar, None, true);
        stats.record(3, Rarity::FourStar, None, true);
        assert_eq!(stats.pull_history.len(), 1);
        assert_eq!(stats.pity, 3);
        assert_eq!(stats.pity_from_history(), 3);
    }

    #[test]
    fn shiny_window_from_start_and_from_last_high() {
        let fresh = PoolStats::default();
        assert!(!fresh.shiny_guaranteed(9));
        assert!(fresh.shiny_guaranteed(10));

        let stats = stats_with(&[(4, Rarity::FiveStar, None)], 12);
        assert!(!stats.shiny_guaranteed(13));
        assert!(stats.shiny_guaranteed(14));
    }

    #[test]
    fn summary_segments_and_extremes() {
        let stats = stats_with(
            &[
                (30, Rarity::SixStar, Some(true)),
                (50, Rarity::FiveStar, None),
                (100, Rarity::SixStar, Some(false)),
            ],
            110,
        );
        let summary = PitySummary::compute(&stats, CHARACTER_CURVE, CHARACTER_RATES.rate(Rarity::SixStar), 55_000);
        assert_eq!(summary.six_star_count, 2);
        assert_eq!(summary.five_star_count, 1);
        assert_eq!(summary.segments.len(), 2);
        assert_eq!(summary.segments[0].pity, 30);
        assert_eq!(summary.segments[1].pity, 70);
        assert_eq!(summary.lowest.as_ref().map(|m| m.pity), Some(30));
        assert_eq!(summary.highest.as_ref().map(|m| m.pity), Some(70));
        assert_eq!(summary.average.as_ref().map(|m| m.pity), Some(50));
        assert_eq!(summary.win_rate, 50.0);
        assert_eq!(summary.current_pity, 10);
        assert_eq!(summary.currency_spent, 55_000);
    }

    #[test]
    fn summary_of_empty_pool() {
        let summary = PitySummary::compute(&PoolStats::default(), CHARACTER_CURVE, 0.008, 0);
        assert!(summary.average.is_none());
        assert_eq!(summary.six_star_rate, 0.0);
        assert!((summary.current_top_rate - 0.8).abs() < 1e-12);
    }
}
