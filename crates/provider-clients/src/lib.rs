//! Typed HTTP clients for the external series providers, plus the
//! per-indicator fetchers that transform raw observations onto each
//! indicator's canonical scale.

pub mod alpha_vantage;
pub mod coingecko;
pub mod fred;
pub mod twelvedata;

mod fetchers;

pub use alpha_vantage::{signal_multiplier, AlphaVantageClient, TechnicalReadings};
pub use coingecko::CoinGeckoClient;
pub use fetchers::{
    build_fetchers, CryptoReturnFetcher, FredSeriesFetcher, UsdIndexFetcher, YieldCurveFetcher,
};
pub use fred::FredClient;
pub use twelvedata::TwelveDataClient;
