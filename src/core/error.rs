/// Error Module
///
/// This module defines the error types for dbsession. `DbError` is what
/// callers of a session see; `DriverError` is what a native driver reports
/// and is wrapped by `DbError` at the session boundary.
use thiserror::Error;

/// Error type returned by every fallible session operation.
///
/// The first four variants are the error kinds a session distinguishes:
/// - `Config`: the connection string could not be turned into connection parameters
/// - `Connection`: the native driver refused to open a connection
/// - `InvalidCommand`: the statement does not match the helper it was passed to
/// - `Command`: the native driver failed while executing, fetching or committing
///
/// The rest cover the settings file and binary output.
#[derive(Error, Debug)]
pub enum DbError {
    /// Malformed connection string or missing required component
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// Native connect failure, reported with the descriptor and user that were tried
    #[error("Connection error: could not connect to {descriptor} as user {user}: {source}")]
    Connection {
        descriptor: String,
        user: String,
        #[source]
        source: DriverError,
    },

    /// Statement rejected before reaching the driver
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Native execution, fetch or commit failure
    #[error("Command error: {0}")]
    Command(#[from] DriverError),

    /// Settings file could not be read or parsed
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Builds a configuration error that carries no underlying parse error.
    pub fn config(message: impl Into<String>) -> Self {
        DbError::Config {
            message: message.into(),
            source: None,
        }
    }
}

/// Errors raised by a native driver or one of its handles.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Reading a large object to completion failed
    #[error("large object read failed: {0}")]
    Lob(#[from] std::io::Error),

    /// The driver does not understand a connect option or parameter shape
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Failure reported by a driver that has no richer error type
    #[error("{0}")]
    Native(String),

    #[error("session is not connected")]
    NotConnected,

    #[error("session has been closed and cannot be reconnected")]
    SessionClosed,

    #[error("driver environment has been torn down")]
    EnvironmentClosed,
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Result type used across the native driver traits.
pub type DriverResult<T> = std::result::Result<T, DriverError>;
