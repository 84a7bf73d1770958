use std::mem;
use std::path::Path;
use std::rc::Rc;

use crate::config::ConnectionConfig;
use crate::error::SqlOrdinalError;
use crate::session::Session;
use crate::sqlite::config::SqliteOptions;
use crate::sqlite::connection::SqliteConnection;
use crate::transaction::commit_sessions;

/// Shared transaction context: one connection, the auto-commit flag that lives
/// on it, and the batch of sessions collected for the next commit.
///
/// Every session created from a context runs on its connection, so they all
/// see the same transaction. The context is single-threaded (`!Send`).
#[derive(Debug, Default)]
pub struct DbContext {
    connection: Option<Rc<SqliteConnection>>,
    options: SqliteOptions,
    pending: Vec<Session>,
}

impl DbContext {
    /// A context with no connection yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: SqliteOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Connect to `url`, replacing any existing connection.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ConfigError` for an unusable URL and
    /// `SqlOrdinalError::ConnectFailure` if the database cannot be opened.
    pub fn connect(&mut self, url: &str, user: &str, password: &str) -> Result<(), SqlOrdinalError> {
        self.connect_with_config(&ConnectionConfig::new(url, user, password))
    }

    /// Connect using an already loaded [`ConnectionConfig`].
    ///
    /// Collected sessions belong to the old connection and are dropped.
    ///
    /// # Errors
    /// See [`connect`](Self::connect).
    pub fn connect_with_config(&mut self, config: &ConnectionConfig) -> Result<(), SqlOrdinalError> {
        let connection = SqliteConnection::open(config, &self.options)?;
        if !self.pending.is_empty() {
            tracing::warn!(
                dropped = self.pending.len(),
                "reconnecting; collected sessions discarded"
            );
            self.pending.clear();
        }
        self.connection = Some(Rc::new(connection));
        Ok(())
    }

    /// Connect with settings read from a properties file holding `url`,
    /// `user` and `password`.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ConfigError` if the file is unreadable or
    /// incomplete, otherwise see [`connect`](Self::connect).
    pub fn connect_with_file(&mut self, path: impl AsRef<Path>) -> Result<(), SqlOrdinalError> {
        let config = ConnectionConfig::from_properties_file(path)?;
        self.connect_with_config(&config)
    }

    /// Connect to a private in-memory database.
    ///
    /// # Errors
    /// See [`connect`](Self::connect).
    pub fn connect_in_memory(&mut self) -> Result<(), SqlOrdinalError> {
        self.connect(":memory:", "", "")
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn connection(&self) -> Result<&Rc<SqliteConnection>, SqlOrdinalError> {
        self.connection
            .as_ref()
            .ok_or_else(SqlOrdinalError::not_connected)
    }

    /// Prepare `sql` as a new [`Session`].
    ///
    /// # Errors
    /// See [`Session::new`].
    pub fn session(&self, sql: impl Into<String>) -> Result<Session, SqlOrdinalError> {
        Session::new(self, sql)
    }

    /// Run one or more `;`-separated statements without parameters, e.g. DDL.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ConnectFailure` without a usable connection
    /// and `SqlOrdinalError::ExecuteFailure` if the backend rejects the SQL.
    pub fn execute_batch(&self, sql: &str) -> Result<(), SqlOrdinalError> {
        let connection = self.connection()?;
        connection.ensure_usable()?;
        connection
            .ensure_transaction()
            .and_then(|()| connection.execute_batch(sql))
            .map_err(|source| SqlOrdinalError::ExecuteFailure {
                diagnosis: crate::classify::classify(&source),
                source,
            })
    }

    /// Turn auto-commit on or off for the shared connection.
    ///
    /// Turning it on commits whatever the open transaction holds.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ConnectFailure` when not connected,
    /// `SqlOrdinalError::CommitFailure` if the implicit commit fails and
    /// `SqlOrdinalError::ExecuteFailure` if a transaction cannot be opened.
    pub fn set_auto_commit(&self, enabled: bool) -> Result<(), SqlOrdinalError> {
        let connection = self.connection()?;
        connection.ensure_usable()?;
        connection.set_auto_commit(enabled).map_err(|source| {
            let diagnosis = crate::classify::classify(&source);
            if enabled {
                SqlOrdinalError::CommitFailure {
                    statement: None,
                    diagnosis,
                    source,
                }
            } else {
                SqlOrdinalError::ExecuteFailure { diagnosis, source }
            }
        })
    }

    /// Current auto-commit mode; `true` when not connected.
    #[must_use]
    pub fn auto_commit(&self) -> bool {
        self.connection
            .as_ref()
            .is_none_or(|connection| connection.auto_commit())
    }

    /// Queue `session` for the next [`commit_collected`](Self::commit_collected).
    ///
    /// Nothing runs now; the batch executes the statement.
    pub fn collect(&mut self, session: Session) {
        tracing::trace!(sql = %session.sql(), position = self.pending.len(), "collected");
        self.pending.push(session);
    }

    /// Number of collected sessions waiting for commit.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Execute `sessions` in order and commit them as one unit.
    ///
    /// Under auto-commit each statement commits as it runs and the final
    /// commit is a no-op. Returns the number of rows affected.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::CommitFailure` after rolling back, naming the
    /// failed statement's position; `SqlOrdinalError::RollbackFailure` if the
    /// rollback failed too, after which the connection refuses further work;
    /// `SqlOrdinalError::ConnectFailure` if a session belongs to another
    /// connection.
    pub fn commit_batch(&self, sessions: &mut [Session]) -> Result<usize, SqlOrdinalError> {
        if sessions.is_empty() {
            return Ok(0);
        }
        let connection = self.connection()?;
        if let Some(idx) = sessions
            .iter()
            .position(|s| !Rc::ptr_eq(s.connection(), connection))
        {
            return Err(SqlOrdinalError::ConnectFailure {
                message: format!("batch statement {idx} was prepared on a different connection"),
                source: None,
            });
        }
        commit_sessions(connection, sessions)
    }

    /// Commit the collected sessions in collection order.
    ///
    /// The collection is emptied whatever the outcome; a failed batch is not
    /// retried.
    ///
    /// # Errors
    /// See [`commit_batch`](Self::commit_batch).
    pub fn commit_collected(&mut self) -> Result<usize, SqlOrdinalError> {
        let mut batch = mem::take(&mut self.pending);
        self.commit_batch(&mut batch)
    }
}
