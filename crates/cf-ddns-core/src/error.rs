//! Error types for the DDNS updater
//!
//! Every fallible operation in the workspace returns [`Result`]. Errors are
//! split into transient ones (worth retrying within a cycle) and permanent
//! ones (retrying cannot help until something outside the process changes).

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS updater
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure: connect, timeout, unreadable body
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status that has no more specific mapping
    #[error("HTTP error ({status}): {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Invalid or insufficiently privileged credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limited by the remote API
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote answered with something we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Provider-reported failure that maps to nothing above
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an HTTP status error
    pub fn http(status: u16, msg: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: msg.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// A DNS record that does not exist
    pub fn record_not_found(name: &str, record_type: crate::config::RecordType) -> Self {
        Self::NotFound(format!("DNS record not found: {} (type: {})", name, record_type))
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request later in the cycle may succeed
    ///
    /// Network failures, rate limiting and 5xx responses are transient.
    /// Everything else needs an operator or a config change.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) | Error::RateLimited(_) => true,
            Error::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether this error should abort startup
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Authentication(_) | Error::NotFound(_)
        )
    }
}
