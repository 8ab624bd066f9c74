use thiserror::Error;

/// Structured failure for a single remote operation.
///
/// Operations never collapse faults into `None`/`false`; they return one of
/// these so stories and the runner can tell a retryable fault from a
/// terminal one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpError {
    /// Token acquisition failed or the service rejected the bearer token
    #[error("Unauthorized: {service} rejected the request: {message}")]
    Unauthorized { service: String, message: String },

    /// The addressed entity does not exist (or no longer exists)
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Network failures, throttling and 5xx responses
    #[error("Transient error: {service} call failed: {message}")]
    Transient { service: String, message: String },

    /// Malformed input or a payload the service refused
    #[error("Invalid request: {message}")]
    Invalid { message: String },

    /// The user declined or abandoned interactive sign-in
    #[error("Sign-in was cancelled")]
    SignInCancelled,

    /// Missing or unusable configuration
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Coarse classification used by callers that decide whether to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    NotFound,
    Transient,
    Invalid,
    Cancelled,
    Configuration,
}

/// Result type alias using OpError
pub type OpResult<T> = std::result::Result<T, OpError>;

impl OpError {
    pub fn unauthorized(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Transient { .. } => ErrorCategory::Transient,
            Self::Invalid { .. } => ErrorCategory::Invalid,
            Self::SignInCancelled => ErrorCategory::Cancelled,
            Self::Config { .. } => ErrorCategory::Configuration,
        }
    }

    /// Only transient faults are worth another attempt
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

/// Sentinel view of an operation result for callers that only care whether
/// a value came back.
pub trait SentinelExt<T> {
    fn ok_or_sentinel(self) -> Option<T>;
}

impl<T> SentinelExt<T> for OpResult<T> {
    fn ok_or_sentinel(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Operation failed, returning sentinel: {}", e);
                None
            }
        }
    }
}

/// Convert reqwest::Error to OpError
impl From<reqwest::Error> for OpError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() {
            Self::transient("HTTP", error.to_string())
        } else if error.is_decode() {
            Self::invalid(format!("Undecodable response body: {}", error))
        } else if let Some(status) = error.status() {
            match status.as_u16() {
                401 | 403 => Self::unauthorized("HTTP", error.to_string()),
                404 => Self::not_found(error.to_string()),
                429 | 500..=599 => Self::transient("HTTP", error.to_string()),
                _ => Self::invalid(error.to_string()),
            }
        } else {
            Self::transient("HTTP", error.to_string())
        }
    }
}

/// Convert serde_json::Error to OpError
impl From<serde_json::Error> for OpError {
    fn from(error: serde_json::Error) -> Self {
        Self::invalid(format!("Failed to parse JSON: {}", error))
    }
}

/// Convert std::io::Error to OpError
impl From<std::io::Error> for OpError {
    fn from(error: std::io::Error) -> Self {
        Self::config(format!("I/O failure: {}", error))
    }
}

/// Convert toml::de::Error to OpError
impl From<toml::de::Error> for OpError {
    fn from(error: toml::de::Error) -> Self {
        Self::config(format!("Failed to parse TOML: {}", error))
    }
}
