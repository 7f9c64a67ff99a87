//! Authenticated request executor
//!
//! A [`Client`] is bound to one logical API family (its *segment*) and builds
//! every call the same way:
//!
//! ```text
//! {base_url}/{api_segment}/{path}
//! Authorization: Bearer <token>          (via Session)
//! X-Message-Id: <fresh uuid>
//! X-Transaction-Id: <fresh uuid>
//! X-Transaction-Caller: psdns
//! Content-Type: application/json         (all methods except GET/DELETE)
//! ```
//!
//! Anything but `200 OK` is an [`Error::NonOk`]. The executor never retries.

use std::future::Future;
use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span};
use uuid::Uuid;

use crate::auth::Session;
use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Per-call message identifier header
pub const MESSAGE_ID_HEADER: &str = "X-Message-Id";

/// Per-call transaction identifier header
pub const TRANSACTION_ID_HEADER: &str = "X-Transaction-Id";

/// Fixed caller tag header
pub const TRANSACTION_CALLER_HEADER: &str = "X-Transaction-Caller";

/// Value of [`TRANSACTION_CALLER_HEADER`] on every call
pub const CALLER_TAG: &str = "psdns";

/// Correlation identifiers stamped on a single call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceIds {
    /// `X-Message-Id`
    pub message_id: Uuid,
    /// `X-Transaction-Id`
    pub transaction_id: Uuid,
}

impl TraceIds {
    /// Fresh random identifiers
    pub fn fresh() -> Self {
        Self {
            message_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
        }
    }
}

/// Whether requests with `method` carry a JSON body
pub fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::DELETE)
}

/// Run `fut` unless `cancel` fires first
///
/// Dropping the losing future aborts any in-flight HTTP exchange.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Client for one logical API family
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    api_segment: String,
    session: Arc<Session>,
}

impl Client {
    /// Create a client over an existing session
    pub fn new(
        base_url: impl Into<String>,
        api_segment: impl Into<String>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_segment: api_segment.into().trim_matches('/').to_string(),
            session,
        }
    }

    /// Obtain a session from `config` and create a client for `api_segment`
    ///
    /// # Errors
    ///
    /// Configuration errors, [`Error::Auth`] and [`Error::Cancelled`].
    pub async fn connect(
        config: &ApiConfig,
        api_segment: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        let session = Session::obtain(config.credentials.clone(), &config.session, cancel).await?;
        Ok(Self::new(config.base_url(), api_segment, Arc::new(session)))
    }

    /// The shared session
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The API segment this client is bound to
    pub fn api_segment(&self) -> &str {
        &self.api_segment
    }

    /// Full URL of `path`
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.api_segment,
            path.trim_start_matches('/')
        )
    }

    /// Execute one authenticated call
    ///
    /// The body is ignored for GET and DELETE. On success the unconsumed
    /// response is handed back; dropping it releases the connection.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] for network failures
    /// - [`Error::NonOk`] for any status other than 200
    /// - [`Error::Auth`] if the token needed refreshing and that failed
    /// - [`Error::Cancelled`] if `cancel` fires first
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let ids = TraceIds::fresh();
        let span = debug_span!(
            "api_call",
            method = %method,
            path = path,
            message_id = %ids.message_id,
            transaction_id = %ids.transaction_id,
        );
        cancellable(cancel, self.send(method, path, body, ids))
            .instrument(span)
            .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        ids: TraceIds,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        let with_body = carries_body(&method);

        let mut request = self
            .session
            .http()
            .request(method, &url)
            .header(MESSAGE_ID_HEADER, ids.message_id.to_string())
            .header(TRANSACTION_ID_HEADER, ids.transaction_id.to_string())
            .header(TRANSACTION_CALLER_HEADER, CALLER_TAG);

        if with_body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body.unwrap_or_default());
        }

        let request = self.session.authorize(request).await?;

        debug!("Sending request to {}", url);
        let response = request.send().await.map_err(Error::Transport)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let url = response.url().to_string();
            let body = response.text().await.ok();
            debug!("Request to {} failed with status {}", url, status);
            return Err(Error::non_ok(status.as_u16(), url, body));
        }

        debug!("Request to {} succeeded", url);
        Ok(response)
    }

    /// Execute a call and read the full body
    pub async fn execute_bytes(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let response = self.execute(method, path, body, cancel).await?;
        let bytes = cancellable(cancel, async {
            response.bytes().await.map_err(Error::Transport)
        })
        .await?;
        Ok(bytes.to_vec())
    }

    /// Marshal `request`, execute the call and unmarshal the response
    ///
    /// # Errors
    ///
    /// Everything [`Client::execute`] returns, plus [`Error::Encode`] when
    /// the request cannot be serialized and [`Error::Decode`] when the
    /// response does not match `T`.
    pub async fn call<B, T>(
        &self,
        method: Method,
        path: &str,
        request: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = request
            .map(|payload| serde_json::to_vec(payload).map_err(Error::Encode))
            .transpose()?;
        let bytes = self.execute_bytes(method, path, body, cancel).await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::decode(path, e))
    }
}
