//! Display currencies for the payment account. Prices are kept in CNY;
//! other currencies go through a cached rate table.
use crate::error::{GachaError, Result};
use crate::save::Versioned;
use crate::state::STATE_VERSION;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BASE_CURRENCY: &str = "CNY";
pub const DEFAULT_TTL_SECS: i64 = 3_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrencyMeta {
    pub code: &'static str,
    pub label: &'static str,
    pub symbol: &'static str,
    pub decimals: u32,
}

pub const SUPPORTED_CURRENCIES: [CurrencyMeta; 4] = [
    CurrencyMeta { code: "CNY", label: "CNY (¥)", symbol: "¥", decimals: 2 },
    CurrencyMeta { code: "USD", label: "USD ($)", symbol: "$", decimals: 2 },
    CurrencyMeta { code: "JPY", label: "JPY (¥)", symbol: "¥", decimals: 0 },
    CurrencyMeta { code: "VND", label: "VND (₫)", symbol: "₫", decimals: 0 },
];

pub fn currency_meta(code: &str) -> Option<&'static CurrencyMeta> {
    SUPPORTED_CURRENCIES.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Units of each currency per one unit of the base currency.
pub type Rates = BTreeMap<String, Decimal>;

pub trait RateSource {
    fn fetch(&self) -> Result<Rates>;
}

/// Fixed rates, typically from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticRates {
    rates: Rates,
}

impl StaticRates {
    pub fn new(rates: Rates) -> Self {
        Self { rates }
    }
}

impl RateSource for StaticRates {
    fn fetch(&self) -> Result<Rates> {
        if self.rates.is_empty() {
            return Err(GachaError::RateUnavailable("any currency, no rates configured".to_string()));
        }
        Ok(self.rates.clone())
    }
}

fn default_version() -> u32 {
    STATE_VERSION
}

fn base_rates() -> Rates {
    let mut rates = Rates::new();
    rates.insert(BASE_CURRENCY.to_string(), Decimal::ONE);
    rates
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxCache {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "base_rates")]
    pub rates: Rates,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Default for FxCache {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            rates: base_rates(),
            fetched_at: None,
        }
    }
}

impl Versioned for FxCache {
    fn version(&self) -> u32 {
        self.version
    }
}

impl FxCache {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.fetched_at.map_or(false, |at| now - at <= ttl)
    }

    /// Refetch once the TTL has passed. A failed fetch keeps the old rates
    /// and timestamp so the next call tries again.
    pub fn refresh(&self, source: &dyn RateSource, now: DateTime<Utc>, ttl: Duration) -> Self {
        if self.is_fresh(now, ttl) {
            return self.clone();
        }
        match source.fetch() {
            Ok(fetched) => {
                let mut rates = base_rates();
                for meta in SUPPORTED_CURRENCIES.iter().filter(|m| m.code != BASE_CURRENCY) {
                    if let Some(rate) = fetched.get(meta.code).filter(|r| **r > Decimal::ZERO) {
                        rates.insert(meta.code.to_string(), *rate);
                    }
                }
                log::info!("Currency rates refreshed ({} currencies)", rates.len());
                Self {
                    version: STATE_VERSION,
                    rates,
                    fetched_at: Some(now),
                }
            }
            Err(err) => {
                log::warn!("Currency rate fetch failed, keeping cached rates: {}", err);
                self.clone()
            }
        }
    }

    pub fn rate(&self, code: &str) -> Result<Decimal> {
        let meta = currency_meta(code).ok_or_else(|| GachaError::RateUnavailable(code.to_string()))?;
        if meta.code == BASE_CURRENCY {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(meta.code)
            .copied()
            .filter(|r| *r > Decimal::ZERO)
            .ok_or_else(|| GachaError::RateUnavailable(meta.code.to_string()))
    }

    pub fn convert_from_base(&self, amount: Decimal, code: &str) -> Result<Decimal> {
        amount
            .checked_mul(self.rate(code)?)
            .ok_or_else(|| GachaError::RateUnavailable(format!("{code}: {amount} overflows")))
    }

    pub fn convert_to_base(&self, amount: Decimal, code: &str) -> Result<Decimal> {
        amount
            .checked_div(self.rate(code)?)
            .ok_or_else(|| GachaError::RateUnavailable(format!("{code}: {amount} overflows")))
    }

    /// Base amount shown in `code`, e.g. "$13.80".
    pub fn format(&self, amount: Decimal, code: &str) -> Result<String> {
        let meta = currency_meta(code).ok_or_else(|| GachaError::RateUnavailable(code.to_string()))?;
        let value = self.convert_from_base(amount, meta.code)?.round_dp(meta.decimals);
        Ok(format!("{}{}", meta.symbol, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingSource {
        calls: Cell<u32>,
        result: Result<Rates>,
    }

    impl RateSource for CountingSource {
        fn fetch(&self) -> Result<Rates> {
            self.calls.set(self.calls.get() + 1);
            self.result.clone()
        }
    }

    fn rates() -> Rates {
        let mut rates = Rates::new();
        rates.insert("USD".to_string(), Decimal::new(138, 3));
        rates.insert("JPY".to_string(), Decimal::new(205, 1));
        rates.insert("EUR".to_string(), Decimal::new(127, 3));
        rates
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn fresh_cache_skips_fetch() {
        let source = CountingSource {
            calls: Cell::new(0),
            result: Ok(rates()),
        };
        let ttl = Duration::seconds(DEFAULT_TTL_SECS);
        let cache = FxCache::default().refresh(&source, at(0), ttl);
        assert_eq!(source.calls.get(), 1);
        assert_eq!(cache.fetched_at, Some(at(0)));
        // unsupported codes are dropped
        assert!(!cache.rates.contains_key("EUR"));

        let again = cache.refresh(&source, at(DEFAULT_TTL_SECS), ttl);
        assert_eq!(source.calls.get(), 1);
        assert_eq!(again, cache);

        cache.refresh(&source, at(DEFAULT_TTL_SECS + 1), ttl);
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn failed_fetch_keeps_stale_rates() {
        let good = CountingSource {
            calls: Cell::new(0),
            result: Ok(rates()),
        };
        let ttl = Duration::seconds(60);
        let cache = FxCache::default().refresh(&good, at(0), ttl);

        let bad = CountingSource {
            calls: Cell::new(0),
            result: Err(GachaError::RateUnavailable("offline".to_string())),
        };
        let stale = cache.refresh(&bad, at(600), ttl);
        assert_eq!(bad.calls.get(), 1);
        assert_eq!(stale, cache);
        assert_eq!(stale.rate("USD").unwrap(), Decimal::new(138, 3));
    }

    #[test]
    fn conversions() {
        let source = StaticRates::new(rates());
        let cache = FxCache::default().refresh(&source, at(0), Duration::seconds(60));
        let price = Decimal::new(648, 0);
        assert_eq!(cache.convert_from_base(price, "CNY").unwrap(), price);
        assert_eq!(cache.convert_from_base(price, "usd").unwrap(), Decimal::new(89424, 3));
        assert_eq!(cache.convert_to_base(Decimal::new(205, 0), "JPY").unwrap(), Decimal::new(10, 0));
        assert_eq!(cache.format(price, "USD").unwrap(), "$89.42");
        assert_eq!(cache.format(price, "JPY").unwrap(), "¥13284");
    }

    #[test]
    fn missing_rates_are_errors() {
        let cache = FxCache::default();
        assert!(matches!(cache.rate("VND"), Err(GachaError::RateUnavailable(_))));
        assert!(matches!(cache.rate("GBP"), Err(GachaError::RateUnavailable(_))));
        assert!(StaticRates::default().fetch().is_err());
    }

    #[test]
    fn overflowing_conversions_are_errors() {
        let mut table = rates();
        table.insert("VND".to_string(), Decimal::from(3510));
        let cache = FxCache::default().refresh(&StaticRates::new(table), at(0), Duration::seconds(60));
        assert!(matches!(cache.format(Decimal::MAX, "VND"), Err(GachaError::RateUnavailable(_))));
        assert!(matches!(
            cache.convert_to_base(Decimal::MAX, "USD"),
            Err(GachaError::RateUnavailable(_))
        ));
        assert_eq!(cache.format(Decimal::MAX, "CNY").unwrap(), format!("¥{}", Decimal::MAX));
    }
}
