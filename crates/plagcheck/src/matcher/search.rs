//! Web search providers used by the internet matcher.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{InternetConfig, SearchProviderKind};
use crate::secrets::{resolve_env_secret, SecretError};

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Web search is disabled")]
    Disabled,

    #[error("Missing API key: {0}")]
    MissingKey(#[from] SecretError),

    #[error("{provider} search HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("Search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Search provider misconfigured: {0}")]
    Config(String),
}

/// A search backend returning result URLs for a query.
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs `query` and returns at most `limit` result URLs, best first.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError>;

    /// False for providers that never issue a request.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Builds the provider selected in the config.
///
/// A provider that cannot be built (missing key, bad client) degrades to
/// [`DisabledSearch`] with a warning so checks still run locally.
pub fn from_config(config: &InternetConfig) -> Arc<dyn WebSearch> {
    let built: Result<Arc<dyn WebSearch>, SearchError> = match config.provider {
        SearchProviderKind::Disabled => {
            tracing::info!("Web search disabled; checks use the local corpus only");
            Ok(Arc::new(DisabledSearch))
        }
        SearchProviderKind::Brave => BraveSearch::from_config(config).map(|p| Arc::new(p) as Arc<dyn WebSearch>),
        SearchProviderKind::Searxng => SearxngSearch::from_config(config).map(|p| Arc::new(p) as Arc<dyn WebSearch>),
    };

    match built {
        Ok(provider) => provider,
        Err(e) => {
            tracing::warn!(error = %e, "Web search unavailable; internet matching disabled");
            Arc::new(DisabledSearch)
        }
    }
}

fn http_client(timeout_ms: u64) -> Result<reqwest::blocking::Client, SearchError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_millis(timeout_ms.clamp(1_000, 60_000)))
        .user_agent(concat!("plagcheck/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Always fails; the matcher treats that as "no match".
pub struct DisabledSearch;

impl WebSearch for DisabledSearch {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>, SearchError> {
        Err(SearchError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveWebResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    url: String,
}

/// Brave Search web API.
pub struct BraveSearch {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: SecretString,
}

impl BraveSearch {
    pub fn from_config(config: &InternetConfig) -> Result<Self, SearchError> {
        let api_key = resolve_env_secret(&config.api_key_env)?;
        Ok(Self {
            client: http_client(config.timeout_ms)?,
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| BRAVE_ENDPOINT.to_string()),
            api_key,
        })
    }
}

impl WebSearch for BraveSearch {
    fn name(&self) -> &'static str {
        "brave"
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        let count = limit.to_string();
        let resp = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", self.api_key.expose_secret())
            .query(&[("q", query), ("count", count.as_str())])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                provider: "brave",
                status: status.as_u16(),
            });
        }

        let parsed: BraveWebSearchResponse = resp.json()?;
        Ok(brave_urls(parsed, limit))
    }
}

fn brave_urls(parsed: BraveWebSearchResponse, limit: usize) -> Vec<String> {
    parsed
        .web
        .and_then(|w| w.results)
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.url)
        .take(limit)
        .collect()
}

#[derive(Debug, Deserialize)]
struct SearxngSearchResponse {
    results: Option<Vec<SearxngResult>>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: Option<String>,
}

/// A SearxNG instance queried through its JSON output format.
pub struct SearxngSearch {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl SearxngSearch {
    pub fn from_config(config: &InternetConfig) -> Result<Self, SearchError> {
        let base = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SearchError::Config("SearxNG requires an endpoint".to_string()))?;

        Ok(Self {
            client: http_client(config.timeout_ms)?,
            endpoint: searxng_search_url(base),
        })
    }
}

fn searxng_search_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/search") {
        base.to_string()
    } else {
        format!("{}/search", base)
    }
}

impl WebSearch for SearxngSearch {
    fn name(&self) -> &'static str {
        "searxng"
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json")])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                provider: "searxng",
                status: status.as_u16(),
            });
        }

        let parsed: SearxngSearchResponse = resp.json()?;
        Ok(searxng_urls(parsed, limit))
    }
}

fn searxng_urls(parsed: SearxngSearchResponse, limit: usize) -> Vec<String> {
    parsed
        .results
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| r.url)
        .filter(|u| !u.trim().is_empty())
        .take(limit)
        .collect()
}
