//! Gacha simulator: pity-driven character/weapon pools with a currency
//! ledger, plus a skin gacha with a collection ledger.
//! `run()` is the CLI entry point; the modules are usable on their own.
pub mod autopull;
pub mod catalog;
pub mod collection;
pub mod commands;
pub mod config;
pub mod error;
pub mod fx;
pub mod ledger;
pub mod pity;
pub mod pool;
pub mod rarity;
pub mod rng;
pub mod save;
pub mod skin;
pub mod state;

pub use error::{GachaError, Result};
pub use ledger::can_afford;
pub use pool::{roll, PoolKind, PullResult, RollOutcome};
pub use state::SimState;

use clap::{Parser, Subcommand};
use commands::Session;
use config::SimConfig;
use rust_decimal::Decimal;
use save::FileStore;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gacha-sim", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fixed RNG seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Directory for saved state
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Wallet and pity summary for both pools
    Status {
        #[arg(long)]
        currency: Option<String>,
    },
    /// Pull from the character or weapon pool
    Pull {
        pool: PoolKind,
        #[arg(short = 'n', long, default_value_t = 1)]
        pulls: u32,
    },
    /// 5★ and 6★ history with pity analytics
    History { pool: PoolKind },
    /// Wipe a pool's progress and currency
    Reset { pool: PoolKind },
    /// Add money to the payment account
    TopUp {
        amount: Decimal,
        /// Currency of `amount`; CNY when omitted
        #[arg(long)]
        currency: Option<String>,
    },
    /// Buy an origeometry bundle
    Buy { bundle: String },
    /// Convert origeometry into oroberyl
    Convert { amount: u64 },
    /// List bundles and their first-purchase bonus state
    Bundles {
        #[arg(long)]
        currency: Option<String>,
    },
    /// Keep pulling 10-pull batches until out of currency
    Auto {
        pool: PoolKind,
        #[arg(long)]
        batches: Option<u32>,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Write the simulator state to a file
    Export { path: PathBuf },
    /// Replace the simulator state with a file written by `export`
    Import { path: PathBuf },
    /// Skin gacha
    #[command(subcommand)]
    Skin(SkinCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum SkinCommand {
    /// Pull 1 or 10 skins from a weapon pool or `knife`
    Pull {
        pool: String,
        #[arg(short = 'n', long, default_value_t = 1)]
        pulls: u32,
    },
    /// Owned counts for every skin in a pool
    Collection { pool: String },
    /// Collection statistics by edition and quality
    Stats,
    /// Add USD to the skin account
    TopUp { amount: Decimal },
    /// Buy a VP bundle
    Buy { bundle: String },
    /// VP/RP balances and bundle offers
    Wallet,
}

fn dispatch(session: &mut Session<FileStore>, command: Command) -> Result<Value> {
    match command {
        Command::Status { currency } => session.status(currency.as_deref()),
        Command::Pull { pool, pulls } => session.pull(pool, pulls),
        Command::History { pool } => session.history(pool),
        Command::Reset { pool } => session.reset(pool),
        Command::TopUp { amount, currency } => session.top_up(amount, currency.as_deref()),
        Command::Buy { bundle } => session.buy(&bundle),
        Command::Convert { amount } => session.convert(amount),
        Command::Bundles { currency } => session.bundles(currency.as_deref()),
        Command::Auto {
            pool,
            batches,
            interval_ms,
        } => {
            let summary = session.auto(pool, batches, interval_ms, |report| {
                println!("{}", serde_json::json!(report));
            })?;
            Ok(serde_json::json!(summary))
        }
        Command::Export { path } => session.export(&path),
        Command::Import { path } => session.import(&path),
        Command::Skin(skin) => match skin {
            SkinCommand::Pull { pool, pulls } => session.skin_pull(&pool, pulls),
            SkinCommand::Collection { pool } => session.skin_collection(&pool),
            SkinCommand::Stats => session.skin_stats(),
            SkinCommand::TopUp { amount } => session.skin_top_up(amount),
            SkinCommand::Buy { bundle } => session.skin_buy(&bundle),
            SkinCommand::Wallet => session.skin_wallet(),
        },
    }
}

pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(SimConfig::default_path);
    let mut config = SimConfig::load(&config_path);
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(dir) = cli.store.clone() {
        config.storage_dir = Some(dir);
    }

    let store = match &config.storage_dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::default(),
    };
    log::debug!("Using store at {}", store.dir().display());

    let mut session = Session::new(store, config)?;
    let output = dispatch(&mut session, cli.command)?;
    let pretty = serde_json::to_string_pretty(&output)
        .map_err(|e| GachaError::Storage(format!("Failed to render output: {e}")))?;
    println!("{pretty}");
    Ok(())
}
