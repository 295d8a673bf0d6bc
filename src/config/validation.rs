use crate::config::types::{ApiConfig, Config, CrawlerConfig, OutputConfig, QueryEntry};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// The search API never serves more than 1000 results per query
const MAX_SEARCH_PAGES: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_queries(&config.queries)?;
    Ok(())
}

/// Validates API endpoint configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::Validation(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.per_page < 1 || config.per_page > 100 {
        return Err(ConfigError::Validation(format!(
            "per-page must be between 1 and 100, got {}",
            config.per_page
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 || config.max_pages > MAX_SEARCH_PAGES {
        return Err(ConfigError::Validation(format!(
            "max-pages must be between 1 and {}, got {}",
            MAX_SEARCH_PAGES, config.max_pages
        )));
    }

    if config.failure_budget < 1 {
        return Err(ConfigError::Validation(format!(
            "failure-budget must be >= 1, got {}",
            config.failure_budget
        )));
    }

    validate_alphabet("outer-alphabet", &config.outer_alphabet)?;
    validate_alphabet("inner-alphabet", &config.inner_alphabet)?;

    Ok(())
}

/// An alphabet must be non-empty, free of duplicates and usable in a filename
fn validate_alphabet(name: &str, alphabet: &str) -> Result<(), ConfigError> {
    if alphabet.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }

    let mut seen = HashSet::new();
    for c in alphabet.chars() {
        if c.is_whitespace() || c == '/' || c == '\\' {
            return Err(ConfigError::Validation(format!(
                "{} contains unusable character {:?}",
                name, c
            )));
        }
        if !seen.insert(c) {
            return Err(ConfigError::Validation(format!(
                "{} contains duplicate character {:?}",
                name, c
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    if config.ledger_path.is_empty() {
        return Err(ConfigError::Validation(
            "ledger-path cannot be empty".to_string(),
        ));
    }

    let template = &config.path_template;
    for placeholder in ["{query}", "{outer}"] {
        if !template.contains(placeholder) {
            return Err(ConfigError::Validation(format!(
                "path-template must contain {}, got '{}'",
                placeholder, template
            )));
        }
    }

    if !template.ends_with(".parquet") {
        return Err(ConfigError::Validation(format!(
            "path-template must end in .parquet, got '{}'",
            template
        )));
    }

    if template.ends_with("_repos.parquet") {
        return Err(ConfigError::Validation(
            "path-template cannot end in _repos.parquet (reserved for metadata)".to_string(),
        ));
    }

    Ok(())
}

/// Validates the query set
fn validate_queries(queries: &[QueryEntry]) -> Result<(), ConfigError> {
    if queries.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[query]] must be configured".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for query in queries {
        validate_query_name(&query.name)?;

        if query.text.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "query '{}' has empty text",
                query.name
            )));
        }

        if !names.insert(query.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate query name '{}'",
                query.name
            )));
        }
    }

    Ok(())
}

/// Query names end up in file names, so keep them to a safe character set
fn validate_query_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "query name cannot be empty".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "query name must contain only ASCII alphanumerics, '_' and '-', got '{}'",
            name
        )));
    }

    Ok(())
}
