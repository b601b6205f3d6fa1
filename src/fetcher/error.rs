use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a single fetch attempt failed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),

    #[error("No content block met the minimum length")]
    ExtractionMiss,

    #[error("Browser session failed: {0}")]
    RenderingEnvironment(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),
}

impl FetchError {
    /// The normalized category recorded in telemetry
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrl(_) => ErrorCategory::InvalidInput,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Connection(_) | Self::Navigation(_) => ErrorCategory::Connection,
            Self::Status { status, .. } => match *status {
                429 => ErrorCategory::RateLimited,
                500..=599 => ErrorCategory::ServerError,
                _ => ErrorCategory::ClientError,
            },
            Self::UnsupportedContent(_) => ErrorCategory::UnsupportedContent,
            Self::ExtractionMiss => ErrorCategory::ExtractionMiss,
            Self::RenderingEnvironment(_) => ErrorCategory::RenderingEnvironment,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            // reqwest does not expose the configured duration
            Self::Timeout(Duration::ZERO)
        } else if let Some(status) = error.status() {
            Self::Status {
                url: error.url().map(|u| u.to_string()).unwrap_or_default(),
                status: status.as_u16(),
            }
        } else {
            Self::Connection(error.to_string())
        }
    }
}

/// Normalized short error strings used for "common errors per domain"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidInput,
    Timeout,
    Connection,
    ServerError,
    ClientError,
    RateLimited,
    UnsupportedContent,
    ExtractionMiss,
    RenderingEnvironment,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::ServerError => "server_error",
            Self::ClientError => "client_error",
            Self::RateLimited => "rate_limited",
            Self::UnsupportedContent => "unsupported_content",
            Self::ExtractionMiss => "extraction_miss",
            Self::RenderingEnvironment => "rendering_environment",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "invalid_input" => Some(Self::InvalidInput),
            "timeout" => Some(Self::Timeout),
            "connection" => Some(Self::Connection),
            "server_error" => Some(Self::ServerError),
            "client_error" => Some(Self::ClientError),
            "rate_limited" => Some(Self::RateLimited),
            "unsupported_content" => Some(Self::UnsupportedContent),
            "extraction_miss" => Some(Self::ExtractionMiss),
            "rendering_environment" => Some(Self::RenderingEnvironment),
            _ => None,
        }
    }

    /// Transient failures are retried within a strategy's budget
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connection | Self::ServerError | Self::RateLimited
        )
    }

    /// Failures that end the whole crawl rather than one strategy attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InvalidInput | Self::UnsupportedContent)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
