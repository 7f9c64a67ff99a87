//! Configuration types for PSDNS
//!
//! [`ApiConfig`] is supplied once when a client is constructed. The host is
//! responsible for sourcing it; [`ApiConfig::from_lookup`] covers the common
//! case of environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment tag whose API gateway carries no host prefix
const PRODUCTION_ENV: &str = "prod";

/// Environment used when none is configured
const DEFAULT_ENV: &str = "test";

/// Long-lived credentials for the OAuth2 password grant
///
/// # Security
///
/// The `Debug` implementation never exposes the client secret or password.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// OAuth client identifier
    pub client_id: String,

    /// OAuth client secret
    /// ⚠️ NEVER log this value
    pub client_secret: String,

    /// Resource owner username
    pub username: String,

    /// Resource owner password
    /// ⚠️ NEVER log this value
    pub password: String,

    /// Token endpoint URL
    pub token_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl Credentials {
    /// Validate that every credential is present
    pub fn validate(&self) -> Result<(), crate::Error> {
        let fields = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
            ("token_url", &self.token_url),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(crate::Error::config(format!("{} cannot be empty", name)));
            }
        }
        validate_http_url("token_url", &self.token_url)
    }
}

/// Settings of an authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Timeout for token endpoint calls (in seconds)
    #[serde(default = "default_token_timeout_secs")]
    pub token_timeout_secs: u64,

    /// Timeout for API calls (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Refresh the bearer token this many seconds before it expires
    #[serde(default = "default_refresh_threshold_secs")]
    pub refresh_threshold_secs: u64,
}

impl SessionSettings {
    /// Token endpoint timeout as a `Duration`
    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    /// API call timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.token_timeout_secs == 0 {
            return Err(crate::Error::config("token timeout must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("request timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            token_timeout_secs: default_token_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            refresh_threshold_secs: default_refresh_threshold_secs(),
        }
    }
}

/// Main API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Password-grant credentials
    pub credentials: Credentials,

    /// Environment tag (`prod`, `test`, `dev`, ...)
    #[serde(default = "default_env")]
    pub environment: String,

    /// Explicit API base URL, overriding the one derived from `environment`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Session settings
    #[serde(default)]
    pub session: SessionSettings,
}

impl ApiConfig {
    /// Create a configuration for the default environment
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            environment: default_env(),
            base_url: None,
            session: SessionSettings::default(),
        }
    }

    /// Set the environment tag
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into().trim().to_string();
        self
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Replace the session settings
    pub fn with_session(mut self, session: SessionSettings) -> Self {
        self.session = session;
        self
    }

    /// Resolve the API base URL
    ///
    /// `prod` has no host prefix; every other environment is addressed as
    /// `tool-<env>`.
    pub fn base_url(&self) -> String {
        if let Some(ref url) = self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        let env = self.environment.trim();
        if env == PRODUCTION_ENV {
            "https://tool.ps-intern.de/api-gateway-legacy/gateway/entity".to_string()
        } else {
            format!(
                "https://tool-{}.ps-intern.de/api-gateway-legacy/gateway/entity",
                env
            )
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.credentials.validate()?;
        self.session.validate()?;

        if self.base_url.is_none() {
            let env = self.environment.trim();
            if env.is_empty() {
                return Err(crate::Error::config("environment cannot be empty"));
            }
            if !env.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(crate::Error::config(format!(
                    "environment '{}' may only contain alphanumerics and hyphens",
                    env
                )));
            }
        }

        if let Some(ref url) = self.base_url {
            validate_http_url("base_url", url)?;
        }

        Ok(())
    }

    /// Load the configuration through a variable lookup
    ///
    /// Reads `PSDNS_CLIENT_ID`, `PSDNS_CLIENT_SECRET`, `PSDNS_USERNAME`,
    /// `PSDNS_PASSWORD`, `PSDNS_TOKEN_URL`, `PSDNS_API_ENV`,
    /// `PSDNS_BASE_URL`, `PSDNS_REQUEST_TIMEOUT_SECS` and
    /// `PSDNS_TOKEN_TIMEOUT_SECS`. Pass `|key| std::env::var(key).ok()` to
    /// read the process environment.
    ///
    /// The result is validated before it is returned.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, crate::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| crate::Error::config(format!("{} is required", key)))
        };
        let seconds = |key: &str, default: u64| match lookup(key) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                crate::Error::config(format!("{} must be a number of seconds, got '{}'", key, raw))
            }),
            None => Ok(default),
        };

        let config = Self {
            credentials: Credentials {
                client_id: required("PSDNS_CLIENT_ID")?,
                client_secret: required("PSDNS_CLIENT_SECRET")?,
                username: required("PSDNS_USERNAME")?,
                password: required("PSDNS_PASSWORD")?,
                token_url: required("PSDNS_TOKEN_URL")?,
            },
            environment: lookup("PSDNS_API_ENV")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(default_env),
            base_url: lookup("PSDNS_BASE_URL").filter(|value| !value.is_empty()),
            session: SessionSettings {
                token_timeout_secs: seconds(
                    "PSDNS_TOKEN_TIMEOUT_SECS",
                    default_token_timeout_secs(),
                )?,
                request_timeout_secs: seconds(
                    "PSDNS_REQUEST_TIMEOUT_SECS",
                    default_request_timeout_secs(),
                )?,
                refresh_threshold_secs: default_refresh_threshold_secs(),
            },
        };

        config.validate()?;
        Ok(config)
    }
}

fn validate_http_url(name: &str, url: &str) -> Result<(), crate::Error> {
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(crate::Error::config(format!(
            "{} must use HTTP or HTTPS scheme. Got: {}",
            name, url
        )));
    }
    Ok(())
}

fn default_env() -> String {
    DEFAULT_ENV.to_string()
}

fn default_token_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_refresh_threshold_secs() -> u64 {
    10
}
