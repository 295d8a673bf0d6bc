//! HTTP transport for the code search and repository endpoints
//!
//! This module handles:
//! - Building the HTTP client with the configured user agent and timeouts
//! - Formatting search requests (query, language filter, filename prefix, page)
//! - Capturing every response as a plain `ResponseOutcome` for the governor

use crate::config::ApiConfig;
use crate::crawler::credentials::Credential;
use crate::HarvestError;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Status, headers and body of one API response
#[derive(Debug, Clone, Default)]
pub struct ResponseOutcome {
    pub status: u16,
    /// Header names are stored lowercase
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ResponseOutcome {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header (builder style)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Looks up a header case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `message` field of a JSON error body, if there is one
    pub fn message(&self) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()?
            .get("message")?
            .as_str()
            .map(str::to_string)
    }
}

/// One page of one search partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub filename_prefix: String,
    pub page: u32,
}

/// The two API calls the harvester makes
///
/// Implemented over HTTP by `GitHubClient`; tests substitute scripted
/// transports.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Fetches one page of code search results
    async fn search(
        &self,
        credential: &Credential,
        request: &SearchRequest,
    ) -> Result<ResponseOutcome, HarvestError>;

    /// Fetches the metadata of one repository (`owner/name`)
    async fn repository(
        &self,
        credential: &Credential,
        full_name: &str,
    ) -> Result<ResponseOutcome, HarvestError>;
}

/// Builds an HTTP client with proper configuration
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Transport over the GitHub REST API
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: Url,
    language: String,
    per_page: u32,
}

impl GitHubClient {
    /// Creates a client for the configured API
    pub fn new(config: &ApiConfig) -> Result<Self, HarvestError> {
        let client = build_http_client(config).map_err(|source| HarvestError::Http {
            url: config.base_url.clone(),
            source,
        })?;

        // A trailing slash makes relative joins append instead of replace
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            language: config.language.clone(),
            per_page: config.per_page,
        })
    }

    /// Full search URL for a request
    ///
    /// The query string is `q=<text> language:<lang> filename:<prefix>`.
    pub fn search_url(&self, request: &SearchRequest) -> Result<Url, HarvestError> {
        let mut q = request.query.clone();
        if !self.language.is_empty() {
            q.push_str(&format!(" language:{}", self.language));
        }
        q.push_str(&format!(" filename:{}", request.filename_prefix));

        let mut url = self.base_url.join("search/code")?;
        url.query_pairs_mut()
            .append_pair("q", &q)
            .append_pair("page", &request.page.to_string())
            .append_pair("per_page", &self.per_page.to_string());
        Ok(url)
    }

    /// Metadata URL for a repository
    pub fn repository_url(&self, full_name: &str) -> Result<Url, HarvestError> {
        Ok(self.base_url.join(&format!("repos/{}", full_name))?)
    }

    async fn get(&self, credential: &Credential, url: Url) -> Result<ResponseOutcome, HarvestError> {
        let url_str = url.to_string();
        tracing::trace!("GET {}", url_str);

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("token {}", credential.secret()))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|source| HarvestError::Http {
                url: url_str.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|source| HarvestError::Http {
            url: url_str,
            source,
        })?;

        Ok(ResponseOutcome {
            status,
            headers,
            body,
        })
    }
}

impl Transport for GitHubClient {
    async fn search(
        &self,
        credential: &Credential,
        request: &SearchRequest,
    ) -> Result<ResponseOutcome, HarvestError> {
        let url = self.search_url(request)?;
        self.get(credential, url).await
    }

    async fn repository(
        &self,
        credential: &Credential,
        full_name: &str,
    ) -> Result<ResponseOutcome, HarvestError> {
        let url = self.repository_url(full_name)?;
        self.get(credential, url).await
    }
}
