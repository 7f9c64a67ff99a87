//! Error types for PSDNS
//!
//! Every failure the core can produce is a variant of [`Error`]. Nothing is
//! logged-and-swallowed inside the libraries; callers receive the typed
//! failure and decide what to surface.

use thiserror::Error;

/// Result type alias for PSDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for PSDNS
#[derive(Error, Debug)]
pub enum Error {
    /// Credential exchange against the token endpoint failed
    #[error("Authentication against {endpoint} failed: {message}")]
    Auth {
        /// Token endpoint that rejected the exchange
        endpoint: String,
        /// Underlying cause
        message: String,
    },

    /// Network, DNS or TLS failure before a response was received
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server answered with a status other than 200
    #[error("got a non 200 status code: {status}{}", describe_body(.body.as_deref(), .url))]
    NonOk {
        /// HTTP status code
        status: u16,
        /// URL of the response
        url: String,
        /// Response body, when it could be read
        body: Option<String>,
    },

    /// A request payload could not be serialized
    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// A response body did not have the expected JSON shape
    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        /// API path the response came from
        path: String,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be relocated in its domain's record set
    #[error("Record not found in domain record set ({selector})")]
    RecordNotFound {
        /// Natural key or identifier that was searched for
        selector: String,
    },

    /// A domain search did not return exactly one match
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// The operation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Malformed composite import identifier
    #[error("unexpected format of ID ({0}), expected domainId:recordId")]
    InvalidImportId(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Cardinality failures of a name-based domain search
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// No domain matched the selector
    #[error("no domain found: the api has returned no domain that matched {name}")]
    Empty {
        /// Name that was searched for
        name: String,
    },

    /// More than one domain matched the selector
    #[error("ambiguous domain selector: the api has returned {count} domains that matched {name}")]
    Ambiguous {
        /// Name that was searched for
        name: String,
        /// Number of matches
        count: usize,
    },
}

fn describe_body(body: Option<&str>, url: &str) -> String {
    match body {
        Some(body) => format!(" - {} URL: {}", body, url),
        None => String::new(),
    }
}

impl Error {
    /// Create an authentication error
    pub fn auth(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a non-200 response error
    pub fn non_ok(status: u16, url: impl Into<String>, body: Option<String>) -> Self {
        Self::NonOk {
            status,
            url: url.into(),
            body,
        }
    }

    /// Create a decode error for the response of `path`
    pub fn decode(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    /// Create a reconciliation "not found" error
    pub fn record_not_found(selector: impl Into<String>) -> Self {
        Self::RecordNotFound {
            selector: selector.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the caller may retry the operation with backoff.
    ///
    /// Only transport failures qualify. Non-200 responses may be permanent
    /// client-side errors and decode failures never heal on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// HTTP status of a `NonOk` error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NonOk { status, .. } => Some(*status),
            _ => None,
        }
    }
}
