//! Currency conversion abstractions

use crate::core::error::OracleError;
use async_trait::async_trait;

/// Source of the fiat value of one unit of a foreign currency.
#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rate(&self, code: &str) -> Result<f64, OracleError>;
}
