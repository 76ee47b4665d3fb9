//! Fetch Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. HTTP failures are classified so that callers can tell
//! an outage from a missing record.

use derive_more::{Display, Error};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The request didn't complete in time, or the server said it was overloaded.
    #[display("timed out: {_0}")]
    Timeout(#[error(not(source))] String),
    /// The provider is rate limiting us.
    #[display("rate limited: {_0}")]
    RateLimited(#[error(not(source))] String),
    /// The provider has nothing for this identifier.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Any other unsuccessful HTTP status.
    #[display("HTTP {status}: {url}")]
    Status {
        status: u16,
        #[error(not(source))]
        url: String,
    },
    /// The server answered with a redirect that was not followed.
    #[display("HTTP {status} redirect to {location}")]
    Redirect {
        status: u16,
        #[error(not(source))]
        location: String,
    },
    /// Connection, TLS or protocol failure.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The body wasn't what we expected.
    #[display("invalid response: {_0}")]
    InvalidResponse(#[error(not(source))] String),
    /// The body exceeded the allowed size.
    #[display("response larger than {_0} bytes")]
    TooLarge(#[error(not(source))] u64),
}

/// Coarse failure classes used by the known-bad registry and circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Timeout,
    RateLimited,
    NotFound,
    Hard,
}

impl ErrorKind {
    /// Map an unsuccessful HTTP status onto an error.
    pub fn from_status(status: u16, url: impl Into<String>) -> Self {
        let url = url.into();
        match status {
            404 | 410 => Self::NotFound(url),
            429 => Self::RateLimited(url),
            408 | 500 | 502 | 503 | 504 => Self::Timeout(url),
            _ => Self::Status { status, url },
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            Self::Timeout(_) => FailureClass::Timeout,
            Self::RateLimited(_) => FailureClass::RateLimited,
            Self::NotFound(_) => FailureClass::NotFound,
            Self::Status { .. } | Self::Redirect { .. } | Self::Network(_) | Self::InvalidResponse(_) | Self::TooLarge(_) => FailureClass::Hard,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), FailureClass::Timeout | FailureClass::RateLimited) || matches!(self, Self::Network(_))
    }

    /// Whether the failure says something about the provider's health (as
    /// opposed to the identifier we asked about).
    pub fn counts_against_provider(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::NotFound(_) | Self::Redirect { .. } | Self::InvalidResponse(_) | Self::TooLarge(_) => false,
            Self::Timeout(_) | Self::RateLimited(_) | Self::Network(_) => true,
        }
    }
}
