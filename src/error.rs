use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Code given to failures the adapter synthesizes when the driver reports a
/// failed execution status.
pub const BAD_REQUEST_CODE: i64 = 400;

/// The adapter operation that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Prepare,
    BindValue,
    Execute,
    FetchAssoc,
    LastInsertId,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Prepare => "prepare",
            Operation::BindValue => "bind_value",
            Operation::Execute => "execute",
            Operation::FetchAssoc => "fetch_assoc",
            Operation::LastInsertId => "last_insert_id",
        };
        f.write_str(name)
    }
}

/// Failure reported by a database driver.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (code {code})")]
pub struct DriverError {
    pub message: String,
    pub code: i64,
    pub sqlstate: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code,
            sqlstate: None,
        }
    }

    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }
}

/// The driver's error-info triple for the last operation on a statement:
/// SQLSTATE, driver-specific code and driver message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub sqlstate: String,
    pub code: Option<i64>,
    pub message: Option<String>,
}

impl ErrorInfo {
    /// Error info of a statement with no pending failure.
    pub fn ok() -> Self {
        Self {
            sqlstate: "00000".to_string(),
            code: None,
            message: None,
        }
    }

    pub fn new(sqlstate: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            sqlstate: sqlstate.into(),
            code: Some(code),
            message: Some(message.into()),
        }
    }

    /// Encodes the triple as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

impl From<&DriverError> for ErrorInfo {
    fn from(err: &DriverError) -> Self {
        Self {
            sqlstate: err.sqlstate.clone().unwrap_or_else(|| "HY000".to_string()),
            code: Some(err.code),
            message: Some(err.message.clone()),
        }
    }
}

/// Error type for persistence operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistenceError {
    #[error("{operation} failed: {source}")]
    Driver {
        operation: Operation,
        #[source]
        source: DriverError,
    },

    #[error("{0} requires a prepared statement")]
    NoStatement(Operation),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PersistenceError {
    pub(crate) fn driver(operation: Operation, source: DriverError) -> Self {
        PersistenceError::Driver { operation, source }
    }

    /// Builds the failure recorded when a driver executes a statement but
    /// reports a failed status.
    pub(crate) fn rejected(info: &ErrorInfo) -> Self {
        let mut source = DriverError::new(info.to_json(), BAD_REQUEST_CODE);
        source.sqlstate = Some(info.sqlstate.clone());
        PersistenceError::Driver {
            operation: Operation::Execute,
            source,
        }
    }

    /// The operation that failed, if the error came from an adapter call.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            PersistenceError::Driver { operation, .. } => Some(*operation),
            PersistenceError::NoStatement(operation) => Some(*operation),
            _ => None,
        }
    }

    /// The failure message without the operation prefix.
    pub fn message(&self) -> String {
        match self {
            PersistenceError::Driver { source, .. } => source.message.clone(),
            other => other.to_string(),
        }
    }

    /// Numeric status code of the failure.
    pub fn code(&self) -> i64 {
        match self {
            PersistenceError::Driver { source, .. } => source.code,
            PersistenceError::NoStatement(_) => BAD_REQUEST_CODE,
            _ => 0,
        }
    }

    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            PersistenceError::Driver { source, .. } => source.sqlstate.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias for persistence operations
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Result type alias for driver calls
pub type DriverResult<T> = std::result::Result<T, DriverError>;
