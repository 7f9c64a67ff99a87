//! OAuth2 password-grant session
//!
//! [`Session::obtain`] exchanges [`Credentials`] for a bearer token and keeps
//! it fresh. Every API call goes through [`Session::authorize`], which
//! attaches the current token and refreshes it first when it is about to
//! expire.
//!
//! Refresh is the only mutation of shared state. Readers take a read lock on
//! the token; the first caller that finds it stale takes the write lock,
//! checks again, and refreshes. Concurrent callers then see the new token.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Credentials, SessionSettings};
use crate::error::{Error, Result};

/// Bearer token with its expiry
#[derive(Clone)]
pub(crate) struct TokenSet {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Whether the token expires within `threshold`.
    ///
    /// Tokens issued without `expires_in` never expire client-side.
    fn is_expiring(&self, threshold: chrono::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + threshold >= expires_at,
            None => false,
        }
    }
}

/// Token endpoint success body (RFC 6749 §5.1)
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        let expires_at = response
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
        }
    }
}

/// Token endpoint error body (RFC 6749 §5.2)
#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

enum Grant<'a> {
    Password,
    Refresh(&'a str),
}

/// Authenticated transport bound to a refreshable bearer token
///
/// A session is shared read-only (behind an `Arc`) by every client built on
/// it.
pub struct Session {
    credentials: Credentials,
    http: reqwest::Client,
    token_http: reqwest::Client,
    token: RwLock<TokenSet>,
    refresh_threshold: chrono::Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token_url", &self.credentials.token_url)
            .field("username", &self.credentials.username)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl Session {
    /// Exchange credentials for a session
    ///
    /// # Errors
    ///
    /// - [`Error::Auth`] if the token endpoint is unreachable or rejects the
    ///   exchange. There is no retry here; retry policy belongs to whoever
    ///   constructs the client.
    /// - [`Error::Cancelled`] if `cancel` fires first.
    pub async fn obtain(
        credentials: Credentials,
        settings: &SessionSettings,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        credentials.validate()?;
        settings.validate()?;

        let token_http = reqwest::Client::builder()
            .timeout(settings.token_timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let token = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            token = exchange(&token_http, &credentials, Grant::Password) => token?,
        };

        info!(
            "Obtained access token for {} from {}",
            credentials.username, credentials.token_url
        );

        Ok(Self {
            credentials,
            http,
            token_http,
            token: RwLock::new(token),
            refresh_threshold: chrono::Duration::seconds(settings.refresh_threshold_secs as i64),
        })
    }

    /// Attach a current bearer token to `request`, refreshing it first if
    /// it is about to expire
    pub async fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    /// Underlying HTTP client for API calls
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Token endpoint this session authenticates against
    pub fn token_url(&self) -> &str {
        &self.credentials.token_url
    }

    async fn access_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if !token.is_expiring(self.refresh_threshold) {
                return Ok(token.access_token.clone());
            }
        }

        let mut token = self.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if !token.is_expiring(self.refresh_threshold) {
            return Ok(token.access_token.clone());
        }

        debug!("Access token is about to expire, refreshing");
        let refreshed = match token.refresh_token.as_deref() {
            Some(refresh_token) => {
                match exchange(&self.token_http, &self.credentials, Grant::Refresh(refresh_token)).await {
                    Ok(refreshed) => refreshed,
                    Err(e) => {
                        warn!("Refresh grant failed ({}), falling back to password grant", e);
                        exchange(&self.token_http, &self.credentials, Grant::Password).await?
                    }
                }
            }
            None => exchange(&self.token_http, &self.credentials, Grant::Password).await?,
        };

        *token = refreshed;
        debug!("Access token refreshed");
        Ok(token.access_token.clone())
    }
}

/// Run a single grant against the token endpoint
///
/// Client id and secret travel in the form body.
async fn exchange(
    client: &reqwest::Client,
    credentials: &Credentials,
    grant: Grant<'_>,
) -> Result<TokenSet> {
    let mut params = vec![
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
    ];
    match grant {
        Grant::Password => {
            params.push(("grant_type", "password"));
            params.push(("username", credentials.username.as_str()));
            params.push(("password", credentials.password.as_str()));
        }
        Grant::Refresh(refresh_token) => {
            params.push(("grant_type", "refresh_token"));
            params.push(("refresh_token", refresh_token));
        }
    }

    let endpoint = credentials.token_url.as_str();
    let response = client
        .post(endpoint)
        .form(&params)
        .send()
        .await
        .map_err(|e| Error::auth(endpoint, format!("token request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::auth(endpoint, format!("failed to read token response: {}", e)))?;

    if !status.is_success() {
        let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(oauth) => match oauth.error_description {
                Some(description) => format!("{} ({}): {}", status, oauth.error, description),
                None => format!("{} ({})", status, oauth.error),
            },
            Err(_) => format!("{}: {}", status, body),
        };
        return Err(Error::auth(endpoint, message));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| Error::auth(endpoint, format!("invalid token response: {}", e)))?;
    Ok(token.into())
}
