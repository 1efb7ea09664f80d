use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::error::OracleError;
use crate::core::price::TickerProvider;
use crate::providers::util::fetch_text;

const PROVIDER: &str = "mtgox";
const TICKER_PATH: &str = "/code/ticker.php";

// MtGoxProvider implementation for TickerProvider, quoting BTC in USD
pub struct MtGoxProvider {
    base_url: String,
}

impl MtGoxProvider {
    pub fn new(base_url: &str) -> Self {
        MtGoxProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct TickerResponse {
    ticker: Option<Ticker>,
}

#[derive(Deserialize, Debug)]
struct Ticker {
    last: Option<Quote>,
}

/// The ticker has served `last` both as a JSON number and as a string.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Quote {
    Number(f64),
    Text(String),
}

impl Quote {
    fn value(&self) -> Option<f64> {
        match self {
            Quote::Number(n) => Some(*n),
            Quote::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Extracts `ticker.last` from a ticker payload.
pub fn parse_last_price(body: &str) -> Result<f64, OracleError> {
    if body.trim().is_empty() {
        return Err(OracleError::upstream(PROVIDER, "Received empty response"));
    }

    let data: TickerResponse = serde_json::from_str(body)
        .map_err(|e| OracleError::upstream(PROVIDER, format!("Failed to parse JSON response: {e}")))?;

    let quote = data
        .ticker
        .and_then(|t| t.last)
        .ok_or_else(|| OracleError::upstream(PROVIDER, "No last price in ticker"))?;

    match quote.value() {
        Some(price) if price.is_finite() && price > 0.0 => Ok(price),
        _ => Err(OracleError::upstream(
            PROVIDER,
            format!("Invalid last price: {quote:?}"),
        )),
    }
}

#[async_trait]
impl TickerProvider for MtGoxProvider {
    #[instrument(name = "MtGoxTickerFetch", skip(self))]
    async fn last_price(&self) -> Result<f64, OracleError> {
        let url = format!("{}{}", self.base_url, TICKER_PATH);
        let body = fetch_text(PROVIDER, &url).await?;
        let price = parse_last_price(&body)?;
        debug!(price, "Received ticker price");
        Ok(price)
    }
}
