//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod price;
pub mod rate;

// Re-export main types for cleaner imports
pub use cache::RateStore;
pub use currency::CurrencyRateProvider;
pub use error::OracleError;
pub use price::TickerProvider;
pub use rate::{CachedRate, RateOrigin, ResolvedRate};
