use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, instrument};

use crate::core::currency::CurrencyRateProvider;
use crate::core::error::OracleError;
use crate::providers::util::fetch_text;

const PROVIDER: &str = "cnb";
const DAILY_RATES_PATH: &str = "/cs/financni_trhy/devizovy_trh/kurzy_devizoveho_trhu/denni_kurz.txt";

const CODE_COLUMN: usize = 3;
const RATE_COLUMN: usize = 4;

/// Czech National Bank daily fixing, CZK per unit of foreign currency
pub struct CnbProvider {
    base_url: String,
}

impl CnbProvider {
    pub fn new(base_url: &str) -> Self {
        CnbProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Reads the fixing date from the table's first line, e.g. `17.10.2026 #201`.
fn table_date(body: &str) -> Option<NaiveDate> {
    let first = body.lines().next()?.split_whitespace().next()?;
    NaiveDate::parse_from_str(first, "%d.%m.%Y").ok()
}

/// Finds the rate for `code` in a pipe-delimited daily table
///
/// Every row is scanned and a later row for the same code replaces an earlier
/// one. The rate column uses a decimal comma.
pub fn parse_rate_table(body: &str, code: &str) -> Result<f64, OracleError> {
    let raw = body
        .lines()
        .map(|line| line.split('|').collect::<Vec<_>>())
        .filter(|cols| cols.len() > RATE_COLUMN && cols[CODE_COLUMN].trim() == code)
        .map(|cols| cols[RATE_COLUMN].trim().to_string())
        .last()
        .ok_or_else(|| OracleError::upstream(PROVIDER, format!("No rate row for {code}")))?;

    match raw.replace(',', ".").parse::<f64>() {
        Ok(rate) if rate.is_finite() && rate > 0.0 => Ok(rate),
        _ => Err(OracleError::upstream(
            PROVIDER,
            format!("Invalid rate for {code}: '{raw}'"),
        )),
    }
}

#[async_trait]
impl CurrencyRateProvider for CnbProvider {
    #[instrument(name = "CnbRateFetch", skip(self))]
    async fn get_rate(&self, code: &str) -> Result<f64, OracleError> {
        let url = format!("{}{}", self.base_url, DAILY_RATES_PATH);
        let body = fetch_text(PROVIDER, &url).await?;

        if let Some(date) = table_date(&body) {
            debug!(%date, "Received daily rate table");
        }

        let rate = parse_rate_table(&body, code)?;
        debug!(rate, "Parsed {} rate", code);
        Ok(rate)
    }
}
