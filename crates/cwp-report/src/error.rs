//! Error types for CWP report generation

use thiserror::Error;

/// Report generation error
#[derive(Error, Debug)]
pub enum Error {
    /// The console kept answering 429 after every backoff attempt
    #[error(
        "rate limited at offset {offset}: gave up after {attempts} attempts (last status {status})"
    )]
    RateLimited {
        offset: u64,
        attempts: u32,
        status: u16,
    },

    /// Non-retryable status returned by the console
    #[error("request failed with status {status} at offset {offset}")]
    RequestFailed { status: u16, offset: u64 },

    /// The console refused a runtime policy update
    #[error("runtime policy rejected with status {status}")]
    PolicyRejected { status: u16 },

    /// Event timestamp matched neither accepted format
    #[error("unparseable event timestamp: {value:?}")]
    TimestampParse { value: String },

    /// A raw record could not be decoded into its typed shape
    #[error("record {index} could not be decoded: {source}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status carried by a failed request, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RateLimited { status, .. }
            | Error::RequestFailed { status, .. }
            | Error::PolicyRejected { status } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if backoff was exhausted
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// Returns true if the error belongs to a single record rather than the session
    pub fn is_record_error(&self) -> bool {
        matches!(self, Error::TimestampParse { .. } | Error::Decode { .. })
    }
}

/// Result type for report generation
pub type Result<T> = std::result::Result<T, Error>;
