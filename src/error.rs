use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by pulls, ledger operations and storage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GachaError {
    #[error("not enough {currency}: need {required}, have {available}")]
    InsufficientCurrency {
        currency: &'static str,
        required: u64,
        available: u64,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("bundle not found: {0}")]
    BundleNotFound(String),

    #[error("balance too low for bundle: need {required}, have {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("corrupt persisted state: {0}")]
    CorruptPersistedState(String),

    #[error("invalid rate table: {0}")]
    InvalidRateTable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("unknown pool: {0}")]
    UnknownPool(String),

    #[error("exchange rate unavailable for {0}")]
    RateUnavailable(String),
}

pub type Result<T> = std::result::Result<T, GachaError>;
