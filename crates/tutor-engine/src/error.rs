//! Error types for the adaptive tutor engine.
//!
//! The learning-state core never fails: it substitutes defaults for anything
//! missing or malformed. Everything in this module belongs to the boundary
//! around it: configuration loading, snapshot persistence, the external
//! question generator and report output.

use std::path::PathBuf;

/// A specialized `Result` type for tutor engine operations.
pub type Result<T> = std::result::Result<T, TutorError>;

/// Errors that can occur at the engine boundary.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your tutor.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// The key-value store could not read or write a snapshot.
    #[error("Storage error for key '{key}': {message}\n\nSuggestion: Check that the state directory exists and is writable")]
    StorageError {
        /// Key of the snapshot being accessed.
        key: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Question Generator Errors
    // ========================================================================
    /// No generator is configured; every question comes from the local fallback.
    #[error("Question generator unavailable\n\nSuggestion: Set 'generator.endpoint' in tutor.json to enable generated questions")]
    GeneratorUnavailable,

    /// The generator could not be reached.
    #[error("Question generator transport error: {message}\n\nSuggestion: Check your network connection and the generator endpoint")]
    GeneratorTransport {
        /// Description of the transport failure.
        message: String,
        /// Whether the failure was a timeout.
        timed_out: bool,
    },

    /// The generator answered with a non-success HTTP status.
    #[error("Question generator returned HTTP {status}: {body}")]
    GeneratorStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The generator answered, but not with something that can become a question.
    #[error("Malformed question from generator: {message}")]
    MalformedQuestion {
        /// What was wrong with the response.
        message: String,
    },

    // ========================================================================
    // Report Errors
    // ========================================================================
    /// Failed to write a report to disk.
    #[error("Failed to write report to '{path}': {message}\n\nSuggestion: Check write permissions and available disk space")]
    ReportWriteError {
        /// Path where the report was to be written.
        path: PathBuf,
        /// Description of the write failure.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TutorError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `StorageError`.
    #[must_use]
    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageError {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a new `GeneratorTransport` error.
    #[must_use]
    pub fn generator_transport(message: impl Into<String>, timed_out: bool) -> Self {
        Self::GeneratorTransport {
            message: message.into(),
            timed_out,
        }
    }

    /// Creates a new `GeneratorStatus` error.
    #[must_use]
    pub fn generator_status(status: u16, body: impl Into<String>) -> Self {
        Self::GeneratorStatus {
            status,
            body: body.into(),
        }
    }

    /// Creates a new `MalformedQuestion` error.
    #[must_use]
    pub fn malformed_question(message: impl Into<String>) -> Self {
        Self::MalformedQuestion {
            message: message.into(),
        }
    }

    /// Creates a new `ReportWriteError`.
    #[must_use]
    pub fn report_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ReportWriteError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is transient and a later attempt may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::GeneratorTransport { .. } => true,
            Self::GeneratorStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if this error is fatal and requires immediate termination.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. }
        )
    }

    /// Returns `true` if this error came from the question generator boundary.
    ///
    /// Every such error is recovered by substituting a local fallback question.
    #[must_use]
    pub const fn is_generator_failure(&self) -> bool {
        matches!(
            self,
            Self::GeneratorUnavailable
                | Self::GeneratorTransport { .. }
                | Self::GeneratorStatus { .. }
                | Self::MalformedQuestion { .. }
        )
    }
}
