//! API credentials and round-robin rotation
//!
//! Rotation spreads requests across tokens so no single token hits its rate
//! ceiling first. It is pacing only: the crawl stays correct if every request
//! used the same token.

use crate::config::CredentialsConfig;
use crate::ConfigError;
use std::fmt;

/// An opaque API token
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the Authorization header
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Ordered credential pool with a cycling cursor
#[derive(Debug, Clone)]
pub struct CredentialRotator {
    credentials: Vec<Credential>,
    index: usize,
}

impl CredentialRotator {
    /// Builds a rotator; fewer than two credentials is a configuration error
    pub fn new(credentials: Vec<Credential>) -> Result<Self, ConfigError> {
        if credentials.len() < 2 {
            return Err(ConfigError::InsufficientCredentials {
                found: credentials.len(),
            });
        }
        Ok(Self {
            credentials,
            index: 0,
        })
    }

    /// Loads credentials from the environment variables named in config
    pub fn from_env(config: &CredentialsConfig) -> Result<Self, ConfigError> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Loads credentials through an arbitrary variable lookup
    ///
    /// Unset and blank variables are skipped.
    pub fn from_lookup<F>(config: &CredentialsConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials: Vec<Credential> = config
            .env_vars
            .iter()
            .filter_map(|name| lookup(name))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .map(Credential::new)
            .collect();

        tracing::debug!(
            "Loaded {} credential(s) from {} variable(s)",
            credentials.len(),
            config.env_vars.len()
        );

        Self::new(credentials)
    }

    /// The credential the next request should use
    pub fn current(&self) -> &Credential {
        &self.credentials[self.index]
    }

    /// Moves to the next credential, wrapping at the end
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.credentials.len();
    }

    /// Position of the current credential in the pool
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
