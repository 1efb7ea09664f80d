//! Asset/fiat exchange rate with a time-bounded cache and stale fallback

use crate::core::config::OracleConfig;
use crate::core::{
    CachedRate, CurrencyRateProvider, OracleError, RateOrigin, RateStore, ResolvedRate,
    TickerProvider,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Rounds half away from zero to `precision` decimal places. Negative
/// precision rounds to tens, hundreds and so on.
///
/// The scaled value is first cut to 15 significant digits so that decimal
/// ties which are not exact in binary (`1.005`) still round up. A precision
/// too large to scale by leaves the value as is, or zero when negative.
pub fn round_to(value: f64, precision: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(precision.saturating_abs());
    if !factor.is_finite() {
        return if precision >= 0 { value } else { 0.0 };
    }

    let scaled = if precision >= 0 {
        value * factor
    } else {
        value / factor
    };
    if !scaled.is_finite() {
        return value;
    }

    let rounded = significant_digits(scaled).round();
    if precision >= 0 {
        rounded / factor
    } else {
        rounded * factor
    }
}

fn significant_digits(value: f64) -> f64 {
    format!("{value:.14e}").parse().unwrap_or(value)
}

/// Converts between the asset and fiat using a rate derived from a ticker
/// (asset in the intermediate currency) and a fiat table (intermediate
/// currency in fiat).
///
/// Resolution order on the first request: fresh cache, live feeds, stale
/// cache. Once a rate is resolved it is kept for the lifetime of the instance.
pub struct PriceOracle {
    ticker: Arc<dyn TickerProvider>,
    fiat: Arc<dyn CurrencyRateProvider>,
    store: Arc<dyn RateStore>,
    validity: Duration,
    intermediate_currency: String,
    resolved: Mutex<Option<CachedRate>>,
}

impl PriceOracle {
    pub fn new(
        ticker: Arc<dyn TickerProvider>,
        fiat: Arc<dyn CurrencyRateProvider>,
        store: Arc<dyn RateStore>,
        config: &OracleConfig,
    ) -> Self {
        Self {
            ticker,
            fiat,
            store,
            validity: config.validity(),
            intermediate_currency: config.intermediate_currency.clone(),
            resolved: Mutex::new(None),
        }
    }

    /// Fiat amount to asset amount, rounded to `precision` places.
    pub async fn convert_fiat_to_asset(
        &self,
        amount: f64,
        precision: i32,
    ) -> Result<f64, OracleError> {
        let rate = self.get_rate().await?;
        Ok(round_to(amount / rate, precision))
    }

    /// Asset amount to fiat amount, rounded to `precision` places.
    pub async fn convert_asset_to_fiat(
        &self,
        amount: f64,
        precision: i32,
    ) -> Result<f64, OracleError> {
        let rate = self.get_rate().await?;
        Ok(round_to(amount * rate, precision))
    }

    /// Fiat units per one asset unit.
    pub async fn get_rate(&self) -> Result<f64, OracleError> {
        self.resolve().await.map(|resolved| resolved.rate())
    }

    /// Like [`get_rate`](Self::get_rate), also reporting when the rate was
    /// derived and which path produced it.
    #[instrument(name = "ResolveRate", skip(self))]
    pub async fn resolve(&self) -> Result<ResolvedRate, OracleError> {
        // Held for the whole resolution so one instance fetches at most once
        let mut resolved = self.resolved.lock().await;
        if let Some(cached) = *resolved {
            debug!("Rate already resolved");
            return Ok(ResolvedRate {
                cached,
                origin: RateOrigin::Memoized,
            });
        }

        let result = match self.load_fresh().await {
            Some(cached) => ResolvedRate {
                cached,
                origin: RateOrigin::Fresh,
            },
            None => match self.fetch_live().await {
                Ok(cached) => {
                    if let Err(e) = self.store.save(&cached).await {
                        warn!("Failed to persist rate: {e:#}");
                    }
                    ResolvedRate {
                        cached,
                        origin: RateOrigin::Live,
                    }
                }
                Err(e) => {
                    warn!("Live rate unavailable, trying stale cache: {e}");
                    let cached = self.store.load().await.ok_or(OracleError::RateUnavailable)?;
                    ResolvedRate {
                        cached,
                        origin: RateOrigin::Stale,
                    }
                }
            },
        };

        *resolved = Some(result.cached);
        Ok(result)
    }

    async fn load_fresh(&self) -> Option<CachedRate> {
        let now = Utc::now().timestamp();
        let cached = self.store.load().await?;
        if cached.is_fresh(self.validity, now) {
            Some(cached)
        } else {
            debug!(age = cached.age_secs(now), "Cached rate expired");
            None
        }
    }

    async fn fetch_live(&self) -> Result<CachedRate, OracleError> {
        let asset_price = self.ticker.last_price().await?;
        let fiat_rate = self.fiat.get_rate(&self.intermediate_currency).await?;
        let rate = asset_price * fiat_rate;
        debug!(asset_price, fiat_rate, rate, "Derived live rate");

        let cached = CachedRate::now(rate);
        if !cached.is_valid() {
            return Err(OracleError::upstream(
                "derived rate",
                format!("{asset_price} x {fiat_rate} is not a usable rate"),
            ));
        }
        Ok(cached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DiskRateStore, MemoryRateStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockTicker {
        price: Option<f64>,
        call_count: AtomicUsize,
    }

    impl MockTicker {
        fn new(price: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                price,
                call_count: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TickerProvider for MockTicker {
        async fn last_price(&self) -> Result<f64, OracleError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.price
                .ok_or_else(|| OracleError::upstream("ticker", "down"))
        }
    }

    struct MockFiat {
        rate: Option<f64>,
        call_count: AtomicUsize,
    }

    impl MockFiat {
        fn new(rate: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                rate,
                call_count: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CurrencyRateProvider for MockFiat {
        async fn get_rate(&self, code: &str) -> Result<f64, OracleError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            assert_eq!(code, "USD");
            self.rate.ok_or_else(|| OracleError::upstream("fiat", "down"))
        }
    }

    fn oracle(
        ticker: &Arc<MockTicker>,
        fiat: &Arc<MockFiat>,
        store: Arc<dyn RateStore>,
    ) -> PriceOracle {
        PriceOracle::new(
            ticker.clone(),
            fiat.clone(),
            store,
            &OracleConfig::default(),
        )
    }

    fn seconds_ago(secs: i64) -> i64 {
        Utc::now().timestamp() - secs
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_fetch() {
        let ticker = MockTicker::new(Some(100.0));
        let fiat = MockFiat::new(Some(20.0));
        let store = Arc::new(MemoryRateStore::with_rate(CachedRate::new(
            480.5,
            seconds_ago(60),
        )));
        let oracle = oracle(&ticker, &fiat, store.clone());

        let resolved = oracle.resolve().await.unwrap();
        assert_eq!(resolved.rate(), 480.5);
        assert_eq!(resolved.origin, RateOrigin::Fresh);
        assert_eq!(ticker.calls(), 0);
        assert_eq!(fiat.calls(), 0);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_cache_refreshes_from_feeds() {
        let ticker = MockTicker::new(Some(25.0));
        let fiat = MockFiat::new(Some(20.0));
        let store = Arc::new(MemoryRateStore::with_rate(CachedRate::new(
            480.5,
            seconds_ago(301),
        )));
        let oracle = oracle(&ticker, &fiat, store.clone());

        let before = Utc::now().timestamp();
        let resolved = oracle.resolve().await.unwrap();
        assert_eq!(resolved.rate(), 500.0);
        assert_eq!(resolved.origin, RateOrigin::Live);

        let saved = store.current().await.unwrap();
        assert_eq!(saved.rate, 500.0);
        assert!(saved.timestamp >= before);
        assert_eq!(ticker.calls(), 1);
        assert_eq!(fiat.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_cache_refreshes_from_feeds() {
        let ticker = MockTicker::new(Some(10.0));
        let fiat = MockFiat::new(Some(2.5));
        let store = Arc::new(MemoryRateStore::new());
        let oracle = oracle(&ticker, &fiat, store.clone());

        assert_eq!(oracle.get_rate().await.unwrap(), 25.0);
        assert_eq!(store.current().await.map(|c| c.rate), Some(25.0));
    }

    #[tokio::test]
    async fn test_failed_feed_falls_back_to_stale_cache() {
        let stale = CachedRate::new(455.0, seconds_ago(86_400));

        for (ticker, fiat) in [
            (MockTicker::new(None), MockFiat::new(Some(20.0))),
            (MockTicker::new(Some(25.0)), MockFiat::new(None)),
        ] {
            let store = Arc::new(MemoryRateStore::with_rate(stale));
            let oracle = oracle(&ticker, &fiat, store.clone());

            let resolved = oracle.resolve().await.unwrap();
            assert_eq!(resolved.rate(), 455.0);
            assert_eq!(resolved.origin, RateOrigin::Stale);
            // Stale data is never rewritten with a new timestamp
            assert_eq!(store.save_count(), 0);
            assert_eq!(store.current().await, Some(stale));
        }
    }

    #[tokio::test]
    async fn test_failed_feed_without_cache_is_unavailable() {
        let ticker = MockTicker::new(None);
        let fiat = MockFiat::new(Some(20.0));
        let oracle = oracle(&ticker, &fiat, Arc::new(MemoryRateStore::new()));

        assert_eq!(oracle.get_rate().await, Err(OracleError::RateUnavailable));
        assert_eq!(
            oracle.convert_asset_to_fiat(1.0, 2).await,
            Err(OracleError::RateUnavailable)
        );
        assert_eq!(
            oracle.convert_fiat_to_asset(1.0, 3).await,
            Err(OracleError::RateUnavailable)
        );
    }

    #[tokio::test]
    async fn test_corrupt_cache_file_goes_live_or_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("price_cache.dat");
        std::fs::write(&path, "{broken").unwrap();

        let oracle_down = oracle(
            &MockTicker::new(None),
            &MockFiat::new(Some(20.0)),
            Arc::new(DiskRateStore::new(&path)),
        );
        assert_eq!(
            oracle_down.get_rate().await,
            Err(OracleError::RateUnavailable)
        );

        let oracle_up = oracle(
            &MockTicker::new(Some(30.0)),
            &MockFiat::new(Some(20.0)),
            Arc::new(DiskRateStore::new(&path)),
        );
        assert_eq!(oracle_up.get_rate().await, Ok(600.0));
        // The corrupt file got replaced by the live rate
        let stored = DiskRateStore::new(&path).load().await.unwrap();
        assert_eq!(stored.rate, 600.0);
    }

    #[tokio::test]
    async fn test_rate_is_memoized() {
        let ticker = MockTicker::new(Some(25.0));
        let fiat = MockFiat::new(Some(20.0));
        let store = Arc::new(MemoryRateStore::new());
        let oracle = oracle(&ticker, &fiat, store.clone());

        let first = oracle.get_rate().await.unwrap();
        // Changes behind the oracle's back are not observed
        store
            .save(&CachedRate::new(1.0, Utc::now().timestamp()))
            .await
            .unwrap();
        let second = oracle.resolve().await.unwrap();

        assert_eq!(first, 500.0);
        assert_eq!(second.rate(), 500.0);
        assert_eq!(second.origin, RateOrigin::Memoized);
        assert_eq!(ticker.calls(), 1);
        assert_eq!(fiat.calls(), 1);
        assert_eq!(store.load_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_rate_is_memoized() {
        let ticker = MockTicker::new(None);
        let fiat = MockFiat::new(Some(20.0));
        let store = Arc::new(MemoryRateStore::with_rate(CachedRate::new(
            400.0,
            seconds_ago(1_000),
        )));
        let oracle = oracle(&ticker, &fiat, store);

        assert_eq!(oracle.get_rate().await, Ok(400.0));
        assert_eq!(oracle.get_rate().await, Ok(400.0));
        assert_eq!(ticker.calls(), 1);
    }

    #[tokio::test]
    async fn test_conversions() {
        let store = Arc::new(MemoryRateStore::with_rate(CachedRate::new(
            500.0,
            seconds_ago(0),
        )));
        let oracle = oracle(&MockTicker::new(None), &MockFiat::new(None), store);

        assert_eq!(oracle.convert_fiat_to_asset(1000.0, 3).await, Ok(2.0));
        assert_eq!(oracle.convert_asset_to_fiat(2.0, 2).await, Ok(1000.0));
        assert_eq!(oracle.convert_fiat_to_asset(1.0, 3).await, Ok(0.002));
        assert_eq!(oracle.convert_fiat_to_asset(1234.0, 3).await, Ok(2.468));
        assert_eq!(oracle.convert_asset_to_fiat(0.123456, 2).await, Ok(61.73));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.0, 3), 2.0);
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
        assert_eq!(round_to(1234.5, -2), 1200.0);
        assert_eq!(round_to(1250.0, -2), 1300.0);
    }

    #[test]
    fn test_round_to_decimal_ties() {
        assert_eq!(round_to(1.005, 2), 1.01);
        assert_eq!(round_to(2.675, 2), 2.68);
        assert_eq!(round_to(-1.005, 2), -1.01);
        assert_eq!(round_to(1.0049, 2), 1.0);
        assert_eq!(round_to(0.285, 2), 0.29);
    }

    #[test]
    fn test_round_to_extreme_precision() {
        assert_eq!(round_to(1e10, 300), 1e10);
        assert_eq!(round_to(1.5, 400), 1.5);
        assert_eq!(round_to(1.5, i32::MAX), 1.5);
        assert_eq!(round_to(5.0, -400), 0.0);
        assert_eq!(round_to(5.0, i32::MIN), 0.0);
        assert!(round_to(123.456, 350).is_finite());
    }

    #[tokio::test]
    async fn test_conversion_rounds_decimal_ties_up() {
        let store = Arc::new(MemoryRateStore::with_rate(CachedRate::new(
            1.0,
            seconds_ago(0),
        )));
        let oracle = oracle(&MockTicker::new(None), &MockFiat::new(None), store);

        assert_eq!(oracle.convert_asset_to_fiat(1.005, 2).await, Ok(1.01));
        assert_eq!(oracle.convert_fiat_to_asset(2.675, 2).await, Ok(2.68));
        assert_eq!(oracle.convert_asset_to_fiat(1.5, 400).await, Ok(1.5));
        assert_eq!(oracle.convert_fiat_to_asset(5.0, -400).await, Ok(0.0));
    }

    #[tokio::test]
    async fn test_overflowing_live_rate_falls_back_to_stale_cache() {
        let stale = CachedRate::new(455.0, seconds_ago(86_400));
        let ticker = MockTicker::new(Some(1e200));
        let fiat = MockFiat::new(Some(1e200));
        let store = Arc::new(MemoryRateStore::with_rate(stale));
        let oracle = oracle(&ticker, &fiat, store.clone());

        let resolved = oracle.resolve().await.unwrap();
        assert_eq!(resolved.rate(), 455.0);
        assert_eq!(resolved.origin, RateOrigin::Stale);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_overflowing_live_rate_without_cache_is_unavailable() {
        let oracle = oracle(
            &MockTicker::new(Some(f64::MAX)),
            &MockFiat::new(Some(2.0)),
            Arc::new(MemoryRateStore::new()),
        );
        assert_eq!(oracle.get_rate().await, Err(OracleError::RateUnavailable));
    }
}
