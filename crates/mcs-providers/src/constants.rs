//! Provider-level constants

/// JSON content type header value
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Dimension of the default remote embedding model
pub const EMBEDDING_DIMENSION_DEFAULT: usize = 1536;

/// Dimension of the null embedding provider
pub const EMBEDDING_DIMENSION_NULL: usize = 1536;

/// Error message prefix for request timeouts
pub const ERROR_MSG_REQUEST_TIMEOUT: &str = "Request timed out after";

/// Rough character-per-token estimate used for billing attribution when the
/// upstream response carries no usage block
pub const CHARS_PER_TOKEN_ESTIMATE: usize = 4;
