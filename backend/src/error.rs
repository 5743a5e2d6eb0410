//! Error types for the VOC import pipeline.
//!
//! Errors are grouped by concern:
//!
//! - [`CsvError`] - delimited-text reading errors
//! - [`ReferenceError`] - code table loading errors (fatal)
//! - [`DirectoryError`] - personnel directory errors (fatal)
//! - [`ConfigError`] - environment / `.env` configuration errors (fatal)
//! - [`AiError`] - type inference client errors (never fatal)
//! - [`HttpError`] - session, login and submission errors
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Row-level validation failures are not errors: they are collected in a
//! [`crate::validation::ValidationReport`] and the rows are dropped.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// CSV Reading Errors
// =============================================================================

/// Errors while reading a delimited-text source.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content could not be decoded with the detected encoding.
    #[error("Failed to decode content as {0}")]
    Encoding(String),

    /// A record could not be parsed.
    #[error("Line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// Empty file.
    #[error("CSV content is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// The reader only splits on single-byte delimiters.
    #[error("Delimiter '{0}' is not an ASCII character")]
    InvalidDelimiter(char),
}

// =============================================================================
// Reference Table Errors
// =============================================================================

/// Errors while loading a code table. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Reference table not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Reference table {} has no column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Reference table {} has no rows", path.display())]
    EmptySource { path: PathBuf },

    #[error("Reference table {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: CsvError,
    },
}

// =============================================================================
// Directory Errors
// =============================================================================

/// Errors while fetching the personnel directory or authorized members.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory source unavailable: {0}")]
    Unavailable(String),

    #[error("Directory file error: {0}")]
    Csv(#[from] CsvError),

    #[error("Directory query file error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "postgres")]
    #[error("Directory database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Personnel directory is empty")]
    Empty,
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while reading settings from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(String),

    #[error("Invalid value for {var}: {message}")]
    Invalid { var: String, message: String },
}

// =============================================================================
// AI Client Errors
// =============================================================================

/// Which fixed-window quota refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    RequestsPerMinute,
    RequestsPerDay,
    TokensPerMinute,
    /// The provider itself answered with a quota error.
    ProviderQuota,
}

impl std::fmt::Display for RateLimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateLimitKind::RequestsPerMinute => write!(f, "requests per minute"),
            RateLimitKind::RequestsPerDay => write!(f, "requests per day"),
            RateLimitKind::TokensPerMinute => write!(f, "tokens per minute"),
            RateLimitKind::ProviderQuota => write!(f, "provider quota"),
        }
    }
}

/// Errors from the type inference client.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Missing GOOGLE_API_KEY environment variable")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid AI response: {0}")]
    InvalidResponse(String),

    #[error("Free tier quota exceeded ({0})")]
    RateLimited(RateLimitKind),
}

// =============================================================================
// HTTP Errors
// =============================================================================

/// Errors from the remote VOC application.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Login rejected (status {status}): {snippet}")]
    LoginRejected { status: u16, snippet: String },

    #[error("VOC page unavailable (status {status}): {snippet}")]
    PageUnavailable { status: u16, snippet: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("'{0}' is not an authorized VOC operator")]
    Unauthorized(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors. Anything reaching this type terminates the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    #[error("Code mapping error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No CSV file found in {}", .0.display())]
    NoDataFile(PathBuf),

    #[error("{count} CSV files found in {} (exactly one expected)", dir.display())]
    MultipleDataFiles { dir: PathBuf, count: usize },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP API errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type CsvResult<T> = Result<T, CsvError>;

pub type ReferenceResult<T> = Result<T, ReferenceError>;

pub type DirectoryResult<T> = Result<T, DirectoryError>;

pub type ConfigResult<T> = Result<T, ConfigError>;

pub type AiResult<T> = Result<T, AiError>;

pub type HttpResult<T> = Result<T, HttpError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let err: PipelineError = CsvError::EmptyFile.into();
        assert!(err.to_string().contains("empty"));

        let err: PipelineError = ReferenceError::MissingColumn {
            path: PathBuf::from("voc_type.csv"),
            column: "code".into(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("voc_type.csv"));
        assert!(msg.contains("'code'"));
    }

    #[test]
    fn test_rate_limit_message_names_quota() {
        let err = AiError::RateLimited(RateLimitKind::RequestsPerDay);
        assert!(err.to_string().contains("requests per day"));
    }

    #[test]
    fn test_multiple_data_files_format() {
        let err = PipelineError::MultipleDataFiles {
            dir: PathBuf::from("data"),
            count: 2,
        };
        assert_eq!(err.to_string(), "2 CSV files found in data (exactly one expected)");
    }
}
