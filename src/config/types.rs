use serde::Deserialize;

/// Main configuration structure for gh-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "query")]
    pub queries: Vec<QueryEntry>,
}

/// Search API endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Language filter appended to every search query (empty disables it)
    #[serde(default = "default_language")]
    pub language: String,

    /// Results requested per search page
    #[serde(rename = "per-page", default = "default_per_page")]
    pub per_page: u32,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Where the API tokens come from
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Environment variables holding one token each; unset ones are skipped
    #[serde(rename = "env-vars", default = "default_env_vars")]
    pub env_vars: Vec<String>,
}

/// Crawl pacing and stop conditions
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Page ceiling per search partition
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Non-recoverable failures tolerated before the run aborts
    #[serde(rename = "failure-budget", default = "default_failure_budget")]
    pub failure_budget: u32,

    /// Pause after every successful search page (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Rate-limit waits allowed for a single request before giving up
    #[serde(
        rename = "max-rate-limit-retries",
        default = "default_max_rate_limit_retries"
    )]
    pub max_rate_limit_retries: u32,

    /// Wait used when a rate-limit response carries no timing headers
    #[serde(
        rename = "rate-limit-fallback-secs",
        default = "default_rate_limit_fallback_secs"
    )]
    pub rate_limit_fallback_secs: u64,

    /// Added to every computed rate-limit wait to absorb clock skew
    #[serde(
        rename = "rate-limit-margin-secs",
        default = "default_rate_limit_margin_secs"
    )]
    pub rate_limit_margin_secs: u64,

    /// First filename character; one outer partition per character
    #[serde(rename = "outer-alphabet", default = "default_outer_alphabet")]
    pub outer_alphabet: String,

    /// Second filename character
    #[serde(rename = "inner-alphabet", default = "default_inner_alphabet")]
    pub inner_alphabet: String,
}

/// Repository metadata enrichment pacing
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Pause after every repository lookup (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_enrich_delay_ms")]
    pub politeness_delay_ms: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for all Parquet output
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    /// Item partition path relative to `data-dir`.
    /// Placeholders: `{query}`, `{category}`, `{version}`, `{outer}`.
    #[serde(rename = "path-template", default = "default_path_template")]
    pub path_template: String,

    /// SQLite progress ledger; relative paths resolve against `data-dir`
    #[serde(rename = "ledger-path", default = "default_ledger_path")]
    pub ledger_path: String,
}

/// A named search query
#[derive(Debug, Clone, Deserialize)]
pub struct QueryEntry {
    /// Identifier used in file names, e.g. "mtls_strict_v1"
    pub name: String,

    /// Raw search text passed to the API
    pub text: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            language: default_language(),
            per_page: default_per_page(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_vars: default_env_vars(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            failure_budget: default_failure_budget(),
            politeness_delay_ms: default_politeness_delay_ms(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            rate_limit_fallback_secs: default_rate_limit_fallback_secs(),
            rate_limit_margin_secs: default_rate_limit_margin_secs(),
            outer_alphabet: default_outer_alphabet(),
            inner_alphabet: default_inner_alphabet(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            politeness_delay_ms: default_enrich_delay_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_language() -> String {
    "YAML".to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_user_agent() -> String {
    format!("gh-harvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_env_vars() -> Vec<String> {
    (1..=4).map(|i| format!("GITHUB_TOKEN{}", i)).collect()
}

fn default_max_pages() -> u32 {
    10
}

fn default_failure_budget() -> u32 {
    10
}

fn default_politeness_delay_ms() -> u64 {
    1600
}

fn default_max_rate_limit_retries() -> u32 {
    20
}

fn default_rate_limit_fallback_secs() -> u64 {
    60
}

fn default_rate_limit_margin_secs() -> u64 {
    1
}

fn default_outer_alphabet() -> String {
    "abcdefghijklmnopqrstuvwxyz0123456789".to_string()
}

fn default_inner_alphabet() -> String {
    "abcdefghijklmnopqrstuvwxyz0123456789-".to_string()
}

fn default_enrich_delay_ms() -> u64 {
    10
}

fn default_path_template() -> String {
    "{category}/{version}/{query}_{outer}.parquet".to_string()
}

fn default_ledger_path() -> String {
    "harvest.db".to_string()
}
