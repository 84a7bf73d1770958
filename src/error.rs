use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::classify::Diagnosis;

/// Error reported by the database backend, reduced to an SQLSTATE-like code
/// and the backend's own message.
///
/// The driver error is preserved as the source so callers can still downcast
/// to it (for `SQLite`, a [`rusqlite::Error`]).
#[derive(Debug)]
pub struct BackendError {
    code: Option<String>,
    message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl BackendError {
    #[must_use]
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_owned),
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// SQLSTATE-like classification string, if the backend supplied one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The driver error this was built from, if any.
    #[must_use]
    pub fn driver_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl StdError for BackendError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[derive(Debug, Error)]
pub enum SqlOrdinalError {
    /// No usable connection when one was required. Not retried.
    #[error("Connection error: {message}")]
    ConnectFailure {
        message: String,
        #[source]
        source: Option<BackendError>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The backend refused a bound parameter. The session stays usable.
    #[error("cannot bind {type_name} to parameter {ordinal}: {diagnosis}")]
    BindFailure {
        ordinal: usize,
        type_name: &'static str,
        diagnosis: Diagnosis,
        #[source]
        source: BackendError,
    },

    /// The backend rejected the statement text when it was prepared.
    #[error("cannot prepare statement: {diagnosis}")]
    PrepareFailure {
        diagnosis: Diagnosis,
        #[source]
        source: BackendError,
    },

    /// The backend refused a column read, or executing the query failed.
    #[error("cannot read {type_name}{}: {diagnosis}", column_suffix(.ordinal))]
    ReadFailure {
        /// `None` when executing the query failed before any column was read.
        ordinal: Option<usize>,
        type_name: &'static str,
        diagnosis: Diagnosis,
        #[source]
        source: BackendError,
    },

    /// A standalone DML execution failed.
    #[error("SQL execution error: {diagnosis}")]
    ExecuteFailure {
        diagnosis: Diagnosis,
        #[source]
        source: BackendError,
    },

    /// A batch statement or the commit itself failed; the transaction was
    /// rolled back before this was returned.
    #[error("commit failed{}: {diagnosis}", statement_suffix(.statement))]
    CommitFailure {
        /// Zero-based position in the batch of the statement that failed, or
        /// `None` when the final commit failed.
        statement: Option<usize>,
        diagnosis: Diagnosis,
        #[source]
        source: BackendError,
    },

    /// Rolling back after a failure also failed. The connection's
    /// transactional state is unknown and it must not be reused.
    #[error("rollback failed after \"{trigger}\": {source}")]
    RollbackFailure {
        trigger: Box<SqlOrdinalError>,
        #[source]
        source: BackendError,
    },
}

fn column_suffix(ordinal: &Option<usize>) -> String {
    ordinal.map_or_else(String::new, |idx| format!(" from column {idx}"))
}

fn statement_suffix(statement: &Option<usize>) -> String {
    statement.map_or_else(String::new, |idx| format!(" at batch statement {idx}"))
}

impl SqlOrdinalError {
    pub(crate) fn not_connected() -> Self {
        SqlOrdinalError::ConnectFailure {
            message: "no database connection has been established".into(),
            source: None,
        }
    }

    /// Whether the error leaves the connection unusable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SqlOrdinalError::ConnectFailure { .. } | SqlOrdinalError::RollbackFailure { .. }
        )
    }

    /// The classified diagnosis, for backend-originated failures.
    #[must_use]
    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            SqlOrdinalError::BindFailure { diagnosis, .. }
            | SqlOrdinalError::PrepareFailure { diagnosis, .. }
            | SqlOrdinalError::ReadFailure { diagnosis, .. }
            | SqlOrdinalError::ExecuteFailure { diagnosis, .. }
            | SqlOrdinalError::CommitFailure { diagnosis, .. } => Some(diagnosis),
            SqlOrdinalError::RollbackFailure { trigger, .. } => trigger.diagnosis(),
            SqlOrdinalError::ConnectFailure { .. } | SqlOrdinalError::ConfigError(_) => None,
        }
    }

    /// The untouched backend error, for advanced diagnosis.
    #[must_use]
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            SqlOrdinalError::BindFailure { source, .. }
            | SqlOrdinalError::PrepareFailure { source, .. }
            | SqlOrdinalError::ReadFailure { source, .. }
            | SqlOrdinalError::ExecuteFailure { source, .. }
            | SqlOrdinalError::CommitFailure { source, .. }
            | SqlOrdinalError::RollbackFailure { source, .. } => Some(source),
            SqlOrdinalError::ConnectFailure { source, .. } => source.as_ref(),
            SqlOrdinalError::ConfigError(_) => None,
        }
    }
}
