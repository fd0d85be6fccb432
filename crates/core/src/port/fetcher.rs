// Fetcher Port
// Abstraction over the host's network retrieval capability

use crate::domain::{FetchRequest, FetchResponse};
use async_trait::async_trait;
use thiserror::Error;

/// Fetch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Body error: {0}")]
    Body(String),
}

/// Fetcher trait
///
/// Implementations:
/// - HttpFetcher (infra-http): reqwest client
/// - MockFetcher: scripted responses for tests
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform one retrieval
    ///
    /// # Errors
    /// - FetchError::InvalidRequest if the request cannot be built
    /// - FetchError::Transport if the remote could not be reached
    /// - FetchError::Body if the response body could not be read
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock fetcher behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Respond with status and body
        Respond(u16, String),
        /// Fail with a transport error
        Fail(String),
    }

    #[derive(Default)]
    struct Calls {
        log: Vec<String>,
        in_flight: usize,
        max_in_flight: usize,
    }

    /// Mock Fetcher for testing
    ///
    /// Records call order and the highest number of overlapping calls, which
    /// is what serialization tests assert on.
    pub struct MockFetcher {
        default: MockBehavior,
        routes: HashMap<String, MockBehavior>,
        latency: Duration,
        calls: Arc<Mutex<Calls>>,
    }

    impl MockFetcher {
        pub fn new(default: MockBehavior) -> Self {
            Self {
                default,
                routes: HashMap::new(),
                latency: Duration::ZERO,
                calls: Arc::new(Mutex::new(Calls::default())),
            }
        }
        pub fn new_ok() -> Self {
            Self::new(MockBehavior::Respond(200, "ok".to_string()))
        }
        pub fn with_route(mut self, url: impl Into<String>, behavior: MockBehavior) -> Self {
            self.routes.insert(url.into(), behavior);
            self
        }
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }
        /// URLs in the order they were fetched
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().log.clone()
        }
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().log.len()
        }
        pub fn max_in_flight(&self) -> usize {
            self.calls.lock().unwrap().max_in_flight
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
            {
                let mut calls = self.calls.lock().unwrap();
                calls.log.push(request.url.clone());
                calls.in_flight += 1;
                calls.max_in_flight = calls.max_in_flight.max(calls.in_flight);
            }

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            self.calls.lock().unwrap().in_flight -= 1;

            let behavior = self
                .routes
                .get(&request.url)
                .unwrap_or(&self.default)
                .clone();

            match behavior {
                MockBehavior::Respond(status, body) => Ok(FetchResponse {
                    status,
                    url: request.url,
                    headers: vec![("content-type".to_string(), "text/plain".to_string())],
                    body: body.into_bytes(),
                }),
                MockBehavior::Fail(msg) => Err(FetchError::Transport(msg)),
            }
        }
    }
}
