//! Error hierarchy for the data edges of vitalrs
//!
//! Scoring engines never fail; missing data degrades to absence. Errors only
//! arise when loading datasets, talking to a data provider, or reading
//! configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum VitalRsError {
    /// Dataset import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Data provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors while reading an exported dataset file
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Parse error in {format}: {reason}")]
    ParseError { format: String, reason: String },

    /// A required column or field is absent
    #[error("Missing required data: {field}")]
    MissingData { field: String },

    #[error("Invalid value for {field} on line {line}: {value}")]
    InvalidValue {
        field: String,
        line: usize,
        value: String,
    },
}

/// Errors returned by a `HealthDataProvider`
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The source could not be reached
    #[error("Data source unavailable: {source_name}")]
    Unavailable { source_name: String },

    /// The source did not answer in time
    #[error("Request to {source_name} timed out")]
    Timeout { source_name: String },

    /// The source answered with data that could not be used
    #[error("Invalid response from {source_name}: {reason}")]
    InvalidResponse { source_name: String, reason: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Result type alias for vitalrs operations
pub type Result<T> = std::result::Result<T, VitalRsError>;

impl VitalRsError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VitalRsError::Provider(ProviderError::Unavailable { .. })
                | VitalRsError::Provider(ProviderError::Timeout { .. })
                | VitalRsError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            VitalRsError::Import(ImportError::FileNotFound { .. }) => ErrorSeverity::Warning,
            VitalRsError::Import(ImportError::InvalidValue { .. }) => ErrorSeverity::Warning,
            VitalRsError::Provider(ProviderError::Timeout { .. }) => ErrorSeverity::Warning,
            VitalRsError::Provider(_) => ErrorSeverity::Error,
            VitalRsError::Config(_) => ErrorSeverity::Error,
            VitalRsError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            VitalRsError::Import(ImportError::FileNotFound { path }) => {
                format!("Could not find data file: {}", path.display())
            }
            VitalRsError::Import(ImportError::UnsupportedFormat { format }) => {
                format!(
                    "Files of type '{}' are not supported. Use a JSON dataset or CSV of daily metrics.",
                    format
                )
            }
            VitalRsError::Provider(ProviderError::Unavailable { source_name }) => {
                format!(
                    "Unable to read from {}. Scores will use the data that is available.",
                    source_name
                )
            }
            VitalRsError::Config(ConfigError::InvalidValue { key, reason }) => {
                format!("Configuration value '{}' is invalid: {}", key, reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
