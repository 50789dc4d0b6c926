//! Error types for the TCE harvester.

use std::path::{Path, PathBuf};

/// Errors that can occur while planning or running a harvest.
///
/// All error variants are marked with `#[non_exhaustive]` to allow
/// adding new error types without breaking changes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Network failure talking to the archive (connect, reset, TLS, etc.)
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
        /// Source error if available
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Request timeout
    #[error("Request timed out after {seconds}s")]
    Timeout {
        /// Timeout duration in seconds
        seconds: u64,
    },

    /// The archive answered with an HTTP error status
    #[error("Archive error (HTTP {status}): {message}")]
    Archive {
        /// HTTP status code
        status: u16,
        /// Response excerpt or reason
        message: String,
    },

    /// The archive accepted the query but has not finished it yet
    #[error("Archive query {service} not complete (status {status})")]
    ArchivePending {
        /// MAST service name
        service: String,
        /// Reported status string
        status: String,
    },

    /// A downloaded file is not the expected FITS light curve
    #[error("Invalid FITS file {}: {message}", .path.display())]
    InvalidFits {
        /// File that failed the check
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Malformed catalogue input
    #[error("Input error in {}{}: {message}", .path.display(), .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    Input {
        /// Input file
        path: PathBuf,
        /// 1-based data line, if known
        line: Option<u64>,
        /// What went wrong
        message: String,
    },

    /// Value validation error
    #[error("Validation error: {message}")]
    Validation {
        /// Field or aspect that failed validation
        field: Option<String>,
        /// What went wrong
        message: String,
    },

    /// I/O error without path context
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error on a known path
    #[error("I/O error on {}: {source}", .path.display())]
    IoPath {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catalog database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },
}

/// Convenience `Result` type alias for harvester operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns whether this error is retryable.
    ///
    /// Retryable errors are transient: dropped connections, timeouts,
    /// throttling or server-side failures at the archive, and queries the
    /// archive is still executing.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::Timeout { .. } => true,
            Error::Archive { status, .. } => *status == 429 || *status >= 500,
            Error::ArchivePending { .. } => true,
            Error::Io(e) | Error::IoPath { source: e, .. } => is_transient_io(e),
            Error::Database(_) => true, // Locked/busy databases clear up
            Error::InvalidFits { .. } => false,
            Error::Input { .. } => false,
            Error::Validation { .. } => false,
            Error::Csv(_) => false,
            Error::Serialization(_) => false,
            Error::Config { .. } => false,
        }
    }

    /// Creates a new network error with a message.
    pub fn network<S: Into<String>>(message: S) -> Self {
        Error::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new network error with a message and source error.
    pub fn network_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new archive HTTP error.
    pub fn archive<S: Into<String>>(status: u16, message: S) -> Self {
        Error::Archive {
            status,
            message: message.into(),
        }
    }

    /// Creates a new FITS integrity error.
    pub fn invalid_fits<P, M>(path: P, message: M) -> Self
    where
        P: Into<PathBuf>,
        M: Into<String>,
    {
        Error::InvalidFits {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new input error for a catalogue file.
    pub fn input<P, M>(path: P, line: Option<u64>, message: M) -> Self
    where
        P: Into<PathBuf>,
        M: Into<String>,
    {
        Error::Input {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Creates a new validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a new validation error with a field name.
    pub fn validation_field<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Wraps an I/O error with the path that caused it.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Error::IoPath {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

fn is_transient_io(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::UnexpectedEof
    )
}
