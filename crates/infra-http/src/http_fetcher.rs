// HTTP fetcher implementation
// reason: reqwest for the host-side retrieval behind the Fetcher port (ADR-001)
use async_trait::async_trait;
use tracing::debug;

use exclusive_core::domain::{FetchMethod, FetchRequest, FetchResponse};
use exclusive_core::port::fetcher::{FetchError, Fetcher};
use exclusive_core::{AppError, Result};

use crate::config::HttpFetcherConfig;

/// HTTP fetcher
/// One pooled reqwest client shared by every request
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher from configuration
    ///
    /// # Example
    /// ```ignore
    /// let fetcher = HttpFetcher::new(&HttpFetcherConfig::from_env()?)?;
    /// ```
    ///
    /// # Errors
    /// - AppError::Config if the client cannot be built (e.g. TLS backend unavailable)
    pub fn new(config: &HttpFetcherConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap an existing client (shared pool, custom TLS or proxy settings)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: FetchRequest) -> std::result::Result<reqwest::Request, FetchError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.as_str());

        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        builder
            .build()
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> std::result::Result<FetchResponse, FetchError> {
        let method = request.method;
        let request = self.build(request)?;
        debug!(method = %method, url = %request.url(), "Sending request");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?
            .to_vec();

        debug!(status, url = %url, bytes = body.len(), "Response received");

        Ok(FetchResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

fn to_reqwest_method(method: FetchMethod) -> reqwest::Method {
    match method {
        FetchMethod::Get => reqwest::Method::GET,
        FetchMethod::Head => reqwest::Method::HEAD,
        FetchMethod::Post => reqwest::Method::POST,
        FetchMethod::Put => reqwest::Method::PUT,
        FetchMethod::Patch => reqwest::Method::PATCH,
        FetchMethod::Delete => reqwest::Method::DELETE,
        FetchMethod::Options => reqwest::Method::OPTIONS,
    }
}
