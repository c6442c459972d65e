//! Environment-sourced daemon configuration.
//!
//! All required values come from `PAGESMITH_`-prefixed environment
//! variables. Parsing collects every problem before reporting, so a
//! misconfigured deployment sees all missing variables at once instead of
//! fixing them one restart at a time.

use std::env;
use thiserror::Error;

/// Default GitHub API base. Overridable so tests can point the provider
/// client at a local stub.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default timeout applied to every outbound HTTP call, in seconds.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    #[error("Missing required environment variable: {var}")]
    Missing { var: String },

    /// A variable is present but unparseable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// One or more variables failed; carries the full set.
    #[error("Configuration incomplete: {0}")]
    Incomplete(String),
}

/// Fully-resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Shared secret checked against every inbound task submission.
    pub secret: String,
    /// Bearer credential for the repository provider.
    pub github_token: String,
    /// Owning account under which repositories are created.
    pub github_user: String,
    /// Provider API base URL.
    pub api_base: String,
    /// Timeout for outbound HTTP calls, in seconds.
    pub http_timeout_secs: u64,
}

impl DaemonConfig {
    /// Load configuration from the process environment.
    ///
    /// Absence of any required variable is fatal; every failure is
    /// reported in a single [`ConfigError::Incomplete`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut parser = EnvParser::new();

        let secret = parser.require("SECRET");
        let github_token = parser.require("GITHUB_TOKEN");
        let github_user = parser.require("GITHUB_USER");
        let api_base = parser.optional("API_BASE", DEFAULT_API_BASE);
        let http_timeout_secs = parser.optional_u64("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS);

        if parser.has_errors() {
            let summary = parser
                .take_errors()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ConfigError::Incomplete(summary));
        }

        Ok(Self {
            secret: secret.unwrap_or_default(),
            github_token: github_token.unwrap_or_default(),
            github_user: github_user.unwrap_or_default(),
            api_base,
            http_timeout_secs,
        })
    }
}

/// Type-safe environment variable parser with error accumulation.
struct EnvParser {
    prefix: &'static str,
    errors: Vec<ConfigError>,
}

impl EnvParser {
    fn new() -> Self {
        Self {
            prefix: "PAGESMITH_",
            errors: Vec::new(),
        }
    }

    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn take_errors(&mut self) -> Vec<ConfigError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// A variable that must be present and non-empty.
    fn require(&mut self, name: &str) -> Option<String> {
        let var = self.var_name(name);
        match env::var(&var) {
            Ok(value) if !value.trim().is_empty() => Some(value),
            _ => {
                self.errors.push(ConfigError::Missing { var });
                None
            }
        }
    }

    /// A variable with a default when absent.
    fn optional(&mut self, name: &str, default: &str) -> String {
        let var = self.var_name(name);
        match env::var(&var) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => default.to_string(),
        }
    }

    /// A numeric variable with a default when absent.
    fn optional_u64(&mut self, name: &str, default: u64) -> u64 {
        let var = self.var_name(name);
        match env::var(&var) {
            Ok(value) if !value.trim().is_empty() => match value.parse() {
                Ok(parsed) => parsed,
                Err(_) => {
                    self.errors.push(ConfigError::InvalidValue {
                        var,
                        expected: "unsigned integer".to_string(),
                        value,
                    });
                    default
                }
            },
            _ => default,
        }
    }
}
