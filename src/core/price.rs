//! Asset price abstractions

use crate::core::error::OracleError;
use async_trait::async_trait;

/// Source of the asset's last traded price in the intermediate currency.
#[async_trait]
pub trait TickerProvider: Send + Sync {
    async fn last_price(&self) -> Result<f64, OracleError>;
}
