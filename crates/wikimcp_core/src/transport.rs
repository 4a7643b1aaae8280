use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::config::ClientConfig;
use crate::error::{Error, Result, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// api.php
    Api,
    /// index.php, used for `action=raw`.
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub endpoint: Endpoint,
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP exchange with the wiki. Session cookies live inside the
/// implementation, so every call through the same transport shares them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

pub struct HttpTransport {
    client: Client,
    api_url: Url,
    index_url: Url,
    user_agent: String,
    timeout_ms: u64,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|error| Error::Config(format!("invalid API URL: {error}")))?;
        let index_url = Url::parse(&config.index_url())
            .map_err(|error| Error::Config(format!("invalid index URL: {error}")))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .cookie_store(true)
            .build()
            .map_err(|error| Error::Config(format!("failed to build MediaWiki HTTP client: {error}")))?;

        Ok(Self {
            client,
            api_url,
            index_url,
            user_agent: config.user_agent.clone(),
            timeout_ms: config.timeout_ms,
        })
    }

    fn describe(&self, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            return format!("request timed out after {} ms", self.timeout_ms);
        }
        if error.is_connect() {
            return format!("connection failed: {error}");
        }
        format!("failed to call MediaWiki API: {error}")
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let url = match request.endpoint {
            Endpoint::Api => self.api_url.clone(),
            Endpoint::Index => self.index_url.clone(),
        };
        let builder = match request.method {
            HttpMethod::Get => self.client.get(url).query(&request.params),
            HttpMethod::Post => self.client.post(url).form(&request.params),
        };

        let response = builder
            .header("User-Agent", self.user_agent.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| TransportError::Unreachable(self.describe(&error)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| TransportError::Unreachable(self.describe(&error)))?;
        Ok(RawResponse { status, body })
    }
}
