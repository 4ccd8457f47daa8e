//! Error handling types
//!
//! One variant per error kind in the system taxonomy, plus plumbing
//! variants for I/O, JSON, and configuration failures. Transports map
//! [`ErrorKind`] onto wire codes; the domain never leaks internals.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Taxonomy kind of an [`Error`], used for wire mapping and telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Schema violation or malformed request
    InvalidArgument,
    /// Name or URI unknown
    NotFound,
    /// Authorization failure
    Denied,
    /// Registration collision
    Conflict,
    /// Queue full; caller should retry later
    Overloaded,
    /// Invocation or dependency timeout
    TimedOut,
    /// Handler cancelled before completion
    Cancelled,
    /// Embedding, vector, blob, or directory dependency failure
    UpstreamUnavailable,
    /// Upstream billing quota exhausted
    BudgetExhausted,
    /// Invariant violation or uncaught failure
    Internal,
}

impl ErrorKind {
    /// Stable snake_case label, as emitted in telemetry records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Denied => "denied",
            Self::Conflict => "conflict",
            Self::Overloaded => "overloaded",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Internal => "internal",
        }
    }

    /// Whether a retry may succeed without caller-side changes
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Overloaded | Self::TimedOut | Self::UpstreamUnavailable
        )
    }
}

/// Main error type for the MCP Capability Server
#[derive(Error, Debug)]
pub enum Error {
    /// Schema violation or malformed request
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// Resource not found error
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Authorization failure
    #[error("Denied: {message}")]
    Denied {
        /// Description of the denied operation
        message: String,
    },

    /// Registration collision
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting registration
        message: String,
    },

    /// Queue or concurrency cap exceeded
    #[error("Overloaded: {message}")]
    Overloaded {
        /// Description of the saturated resource
        message: String,
        /// Suggested wait before retrying, in milliseconds
        retry_after_ms: Option<u64>,
    },

    /// Invocation or dependency deadline exceeded
    #[error("Timed out: {message}")]
    TimedOut {
        /// Description of what timed out
        message: String,
    },

    /// Invocation was cancelled before completion
    #[error("Cancelled: {message}")]
    Cancelled {
        /// Description of the cancelled operation
        message: String,
    },

    /// Embedding, vector index, blob store, or directory failure
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable {
        /// Description of the failing dependency
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Upstream billing quota exhausted
    #[error("Budget exhausted: {message}")]
    BudgetExhausted {
        /// Description of the exhausted budget
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O operation error
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON parsing or serialization error
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },
}

impl Error {
    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } | Self::Json { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Denied { .. } => ErrorKind::Denied,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Overloaded { .. } => ErrorKind::Overloaded,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::BudgetExhausted { .. } => ErrorKind::BudgetExhausted,
            Self::Internal { .. } | Self::Configuration { .. } | Self::Io { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

// Basic error creation methods
impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a denied error
    pub fn denied<S: Into<String>>(message: S) -> Self {
        Self::Denied {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create an overloaded error
    pub fn overloaded<S: Into<String>>(message: S) -> Self {
        Self::Overloaded {
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Create an overloaded error with a retry-after hint
    pub fn overloaded_with_hint<S: Into<String>>(message: S, retry_after_ms: u64) -> Self {
        Self::Overloaded {
            message: message.into(),
            retry_after_ms: Some(retry_after_ms),
        }
    }

    /// Create a timed out error
    pub fn timed_out<S: Into<String>>(message: S) -> Self {
        Self::TimedOut {
            message: message.into(),
        }
    }

    /// Create a cancelled error
    pub fn cancelled<S: Into<String>>(message: S) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Create a budget exhausted error
    pub fn budget_exhausted<S: Into<String>>(message: S) -> Self {
        Self::BudgetExhausted {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// Upstream error creation methods
impl Error {
    /// Create an upstream unavailable error
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create an upstream unavailable error with source
    pub fn upstream_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Configuration error creation methods
impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
