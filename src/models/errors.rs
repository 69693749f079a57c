//! Centralized Error Handling Module
//!
//! Every failure carries a unique code so logs and API responses can be
//! correlated. Codes follow the pattern CATEGORY_SPECIFIC_ERROR:
//! - EXPLORER_xxx: block-explorer transport and envelope errors
//! - TRACE_xxx: validation and lifecycle errors of a trace invocation
//! - CFG_xxx: configuration errors
//!
//! Nothing in the engine panics on these paths; every failure is a value.

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Coarse failure classes.
///
/// Validation failures are definitive for the given input; upstream failures
/// may succeed on retry; cancelled means the caller gave up first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Upstream,
    Cancelled,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Explorer Errors
    // ============================================
    /// Explorer request exceeded its timeout
    ExplorerTimeout,
    /// Connection to the explorer failed
    ExplorerConnectionFailed,
    /// Explorer returned a non-2xx status
    ExplorerHttpError,
    /// Explorer throttled us (HTTP 429 or rate-limit message)
    ExplorerRateLimited,
    /// Body was not the JSON shape we expect
    ExplorerInvalidResponse,
    /// Explorer answered with status "0" and an error message
    ExplorerError,

    // ============================================
    // Trace Errors
    // ============================================
    /// Address failed format validation for the chain
    TraceInvalidAddress,
    /// No chain configuration (with credentials) matched the request
    TraceNoChain,
    /// Caller-supplied cancellation fired
    TraceCancelled,
    /// Caller-supplied deadline elapsed
    TraceDeadlineExceeded,

    // ============================================
    // Configuration Errors
    // ============================================
    ConfigMissingApiKey,
    ConfigInvalidValue,

    // ============================================
    // External Service Errors
    // ============================================
    DexScreenerError,
    TokenNotFound,

    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplorerTimeout => "EXPLORER_TIMEOUT",
            Self::ExplorerConnectionFailed => "EXPLORER_CONNECTION_FAILED",
            Self::ExplorerHttpError => "EXPLORER_HTTP_ERROR",
            Self::ExplorerRateLimited => "EXPLORER_RATE_LIMITED",
            Self::ExplorerInvalidResponse => "EXPLORER_INVALID_RESPONSE",
            Self::ExplorerError => "EXPLORER_ERROR",

            Self::TraceInvalidAddress => "TRACE_INVALID_ADDRESS",
            Self::TraceNoChain => "TRACE_NO_CHAIN",
            Self::TraceCancelled => "TRACE_CANCELLED",
            Self::TraceDeadlineExceeded => "TRACE_DEADLINE_EXCEEDED",

            Self::ConfigMissingApiKey => "CFG_MISSING_API_KEY",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::DexScreenerError => "DEXSCREENER_ERROR",
            Self::TokenNotFound => "TOKEN_NOT_FOUND",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TraceInvalidAddress
            | Self::TraceNoChain
            | Self::ConfigMissingApiKey
            | Self::ConfigInvalidValue
            | Self::TokenNotFound => ErrorCategory::Validation,
            Self::ExplorerTimeout
            | Self::ExplorerConnectionFailed
            | Self::ExplorerHttpError
            | Self::ExplorerRateLimited
            | Self::ExplorerInvalidResponse
            | Self::ExplorerError
            | Self::DexScreenerError => ErrorCategory::Upstream,
            Self::TraceCancelled | Self::TraceDeadlineExceeded => ErrorCategory::Cancelled,
            Self::Unknown => ErrorCategory::Internal,
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self.category() {
            ErrorCategory::Validation if *self == Self::TokenNotFound => 404,
            ErrorCategory::Validation => 400,
            ErrorCategory::Upstream => 502,
            ErrorCategory::Cancelled => 504,
            ErrorCategory::Internal => 500,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExplorerTimeout
                | Self::ExplorerConnectionFailed
                | Self::ExplorerRateLimited
                | Self::DexScreenerError
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn invalid_address(address: &str) -> Self {
        Self::new(
            ErrorCode::TraceInvalidAddress,
            format!("Invalid address: {}", address),
        )
    }

    pub fn no_chain(hint: impl Into<String>) -> Self {
        Self::new(ErrorCode::TraceNoChain, hint)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCode::TraceCancelled, "Trace cancelled by caller")
    }

    pub fn deadline_exceeded(secs: f64) -> Self {
        Self::new(
            ErrorCode::TraceDeadlineExceeded,
            format!("Trace exceeded deadline of {:.1}s", secs),
        )
    }

    pub fn explorer(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExplorerError, msg)
    }

    pub fn explorer_http(status: u16) -> Self {
        if status == 429 {
            Self::rate_limited("HTTP 429")
        } else {
            Self::new(
                ErrorCode::ExplorerHttpError,
                format!("Request failed with status {}", status),
            )
        }
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExplorerRateLimited, msg)
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExplorerInvalidResponse, msg)
    }

    pub fn missing_api_key(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingApiKey,
            format!("Missing API key: {}", key_name),
        )
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    pub fn dexscreener_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DexScreenerError, msg)
    }

    pub fn token_not_found(query: &str) -> Self {
        Self::new(
            ErrorCode::TokenNotFound,
            format!("No trading pair found for {}", query),
        )
    }
}

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ExplorerTimeout, "Request timed out")
        } else if err.is_connect() {
            Self::new(ErrorCode::ExplorerConnectionFailed, "Connection failed")
        } else if let Some(status) = err.status() {
            Self::explorer_http(status.as_u16())
        } else if err.is_decode() {
            Self::new(
                ErrorCode::ExplorerInvalidResponse,
                "Failed to parse JSON response",
            )
        } else {
            // Display of a reqwest error can carry the query string, which
            // holds the API key.
            Self::new(ErrorCode::Unknown, "Unknown request error")
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorCode::ExplorerInvalidResponse,
            "JSON parse error",
            err,
        )
    }
}
