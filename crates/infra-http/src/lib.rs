// Exclusive Infrastructure - HTTP Adapter
// Implements: Fetcher (reqwest)

pub mod config;
pub mod http_fetcher;

pub use config::HttpFetcherConfig;
pub use http_fetcher::HttpFetcher;
