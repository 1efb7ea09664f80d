pub mod cli;
pub mod core;
pub mod oracle;
pub mod providers;
pub mod store;

use crate::cli::rate::{ASSET_CODE, FIAT_CODE};
use crate::core::config::AppConfig;
use crate::oracle::PriceOracle;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_ASSET_PRECISION: i32 = 3;
pub const DEFAULT_FIAT_PRECISION: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    Rate,
    ToAsset { amount: f64, precision: i32 },
    ToFiat { amount: f64, precision: i32 },
}

/// Wires the configured feeds and the cache file into an oracle.
pub fn build_oracle(config: &AppConfig) -> PriceOracle {
    let ticker = providers::MtGoxProvider::new(config.providers.mtgox_url());
    let fiat = providers::CnbProvider::new(config.providers.cnb_url());
    let store = store::DiskRateStore::new(&config.oracle.cache_path);

    PriceOracle::new(
        Arc::new(ticker),
        Arc::new(fiat),
        Arc::new(store),
        &config.oracle,
    )
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("kurz starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let oracle = build_oracle(&config);
    let output = execute(&oracle, command).await?;
    println!("{output}");
    Ok(())
}

/// Runs `command` against `oracle` and returns the text to print.
pub async fn execute(oracle: &PriceOracle, command: AppCommand) -> Result<String> {
    let spinner = cli::ui::new_spinner("Fetching exchange rate...");
    let resolved = oracle.resolve().await;
    spinner.finish_and_clear();
    let resolved = resolved.context("Failed to resolve exchange rate")?;
    let now = chrono::Utc::now().timestamp();

    // Conversions below reuse the rate resolved above
    let output = match command {
        AppCommand::Rate => cli::rate::display_rate(&resolved, now),
        AppCommand::ToAsset { amount, precision } => {
            let converted = oracle.convert_fiat_to_asset(amount, precision).await?;
            cli::rate::display_conversion(
                amount, FIAT_CODE, converted, ASSET_CODE, precision, &resolved, now,
            )
        }
        AppCommand::ToFiat { amount, precision } => {
            let converted = oracle.convert_asset_to_fiat(amount, precision).await?;
            cli::rate::display_conversion(
                amount, ASSET_CODE, converted, FIAT_CODE, precision, &resolved, now,
            )
        }
    };
    Ok(output)
}
