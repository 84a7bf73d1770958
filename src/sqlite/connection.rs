use std::cell::Cell;
use std::fmt;
use std::thread;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode};

use super::config::{SqliteOptions, SqliteTarget};
use crate::config::ConnectionConfig;
use crate::error::{BackendError, SqlOrdinalError};

const ROLLBACK_BUSY_RETRIES: &[Duration] =
    &[Duration::from_millis(10), Duration::from_millis(25), Duration::from_millis(50)];

/// The single connection shared by every session of a context.
///
/// Auto-commit is on by default. With it off, every statement runs inside a
/// transaction; after a commit or rollback the next statement opens a new one.
pub struct SqliteConnection {
    conn: Connection,
    target: SqliteTarget,
    auto_commit: Cell<bool>,
    broken: Cell<bool>,
    /// Bumped at every transaction boundary.
    epoch: Cell<u64>,
    #[cfg(test)]
    fail_next_rollback: Cell<bool>,
}

impl SqliteConnection {
    /// Open a connection described by `config`.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ConfigError` for an unusable URL and
    /// `SqlOrdinalError::ConnectFailure` if `SQLite` cannot open the database.
    pub fn open(config: &ConnectionConfig, options: &SqliteOptions) -> Result<Self, SqlOrdinalError> {
        let target = SqliteTarget::from_url(&config.url)?;
        if !config.user.is_empty() || !config.password.is_empty() {
            tracing::debug!(user = %config.user, "SQLite ignores connection credentials");
        }

        let conn = match &target {
            SqliteTarget::Memory => Connection::open_in_memory(),
            SqliteTarget::Path(path) => Connection::open(path),
        }
        .and_then(|conn| {
            conn.busy_timeout(options.busy_timeout)?;
            if options.foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            }
            Ok(conn)
        })
        .map_err(|e| {
            let source = BackendError::from(e);
            tracing::error!(url = %config.url, error = %source, "could not connect to database");
            SqlOrdinalError::ConnectFailure {
                message: format!("could not open `{}`", config.url),
                source: Some(source),
            }
        })?;

        tracing::debug!(?target, "connected");
        Ok(Self {
            conn,
            target,
            auto_commit: Cell::new(true),
            broken: Cell::new(false),
            epoch: Cell::new(0),
            #[cfg(test)]
            fail_next_rollback: Cell::new(false),
        })
    }

    /// Run synchronous `rusqlite` logic against the connection.
    ///
    /// # Errors
    /// Returns the callback's driver error converted into a [`BackendError`].
    pub fn with_connection<F, R>(&self, func: F) -> Result<R, BackendError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R>,
    {
        func(&self.conn).map_err(BackendError::from)
    }

    #[must_use]
    pub fn target(&self) -> &SqliteTarget {
        &self.target
    }

    #[must_use]
    pub fn auto_commit(&self) -> bool {
        self.auto_commit.get()
    }

    /// Whether a failed rollback left the connection in an unknown state.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken.get()
    }

    pub(crate) fn ensure_usable(&self) -> Result<(), SqlOrdinalError> {
        if self.broken.get() {
            return Err(SqlOrdinalError::ConnectFailure {
                message: "connection is in an unknown transactional state after a failed rollback; reconnect before reuse".into(),
                source: None,
            });
        }
        Ok(())
    }

    pub(crate) fn mark_broken(&self) {
        self.broken.set(true);
    }

    /// Identifies the current transaction. Changes whenever a transaction
    /// begins, commits or rolls back, including the switch of auto-commit.
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// Whether `SQLite` currently has a transaction open.
    pub(crate) fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn next_epoch(&self) {
        self.epoch.set(self.epoch.get().wrapping_add(1));
    }

    /// Switch auto-commit. Turning it on commits the open transaction.
    pub(crate) fn set_auto_commit(&self, enabled: bool) -> Result<(), BackendError> {
        if enabled == self.auto_commit.get() {
            return Ok(());
        }
        if enabled {
            if !self.conn.is_autocommit() {
                self.execute_batch("COMMIT")?;
            }
            self.next_epoch();
        } else {
            self.begin()?;
        }
        self.auto_commit.set(enabled);
        tracing::debug!(enabled, "auto-commit changed");
        Ok(())
    }

    /// Make sure a transaction is open when auto-commit is off.
    ///
    /// `SQLite` ends the transaction on its own after some failures; the next
    /// statement must not silently run in auto-commit mode.
    pub(crate) fn ensure_transaction(&self) -> Result<(), BackendError> {
        if !self.auto_commit.get() && self.conn.is_autocommit() {
            self.begin()?;
        }
        Ok(())
    }

    /// Commit the open transaction. A no-op under auto-commit, where every
    /// statement has already committed.
    ///
    /// The next transaction is opened by [`ensure_transaction`](Self::ensure_transaction)
    /// when the next statement runs, so an error here always means the commit
    /// itself failed.
    pub(crate) fn commit(&self) -> Result<(), BackendError> {
        if self.auto_commit.get() {
            return Ok(());
        }
        if !self.conn.is_autocommit() {
            self.execute_batch("COMMIT")?;
        }
        self.next_epoch();
        tracing::debug!("committed");
        Ok(())
    }

    /// Roll back the open transaction. A no-op under auto-commit.
    pub(crate) fn rollback(&self) -> Result<(), BackendError> {
        if self.auto_commit.get() {
            tracing::warn!("rollback requested under auto-commit; statements already committed");
            return Ok(());
        }
        if self.take_forced_rollback_failure() {
            return Err(BackendError::new(Some("40000"), "forced rollback failure"));
        }
        if !self.conn.is_autocommit() {
            self.rollback_with_busy_retries()?;
        }
        self.next_epoch();
        Ok(())
    }

    fn rollback_with_busy_retries(&self) -> Result<(), BackendError> {
        for (idx, delay) in ROLLBACK_BUSY_RETRIES.iter().copied().enumerate() {
            match self.conn.execute_batch("ROLLBACK") {
                Ok(()) => return Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::DatabaseBusy
                        && idx + 1 < ROLLBACK_BUSY_RETRIES.len() =>
                {
                    tracing::debug!(attempt = idx + 1, "rollback busy; retrying");
                    thread::sleep(delay);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(BackendError::new(None, "rollback retries exhausted"))
    }

    fn begin(&self) -> Result<(), BackendError> {
        self.execute_batch("BEGIN DEFERRED")?;
        self.next_epoch();
        Ok(())
    }

    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), BackendError> {
        self.conn.execute_batch(sql).map_err(BackendError::from)
    }

    #[cfg(test)]
    pub(crate) fn fail_next_rollback_for_tests(&self) {
        self.fail_next_rollback.set(true);
    }

    #[cfg(test)]
    fn take_forced_rollback_failure(&self) -> bool {
        self.fail_next_rollback.replace(false)
    }

    #[cfg(not(test))]
    fn take_forced_rollback_failure(&self) -> bool {
        false
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("target", &self.target)
            .field("auto_commit", &self.auto_commit.get())
            .field("broken", &self.broken.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> SqliteConnection {
        let config = ConnectionConfig::new("sqlite::memory:", "", "");
        let conn = SqliteConnection::open(&config, &SqliteOptions::default()).unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
        conn
    }

    fn in_transaction(conn: &SqliteConnection) -> bool {
        conn.in_transaction()
    }

    fn count(conn: &SqliteConnection) -> i64 {
        conn.with_connection(|c| c.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)))
            .unwrap()
    }

    #[test]
    fn disabling_auto_commit_opens_a_transaction() {
        let conn = open();
        assert!(conn.auto_commit());
        conn.set_auto_commit(false).unwrap();
        assert!(!conn.auto_commit());
        assert!(in_transaction(&conn));
    }

    #[test]
    fn rollback_discards_and_next_statement_reopens() {
        let conn = open();
        conn.set_auto_commit(false).unwrap();
        conn.execute_batch("INSERT INTO t VALUES (1)").unwrap();
        conn.rollback().unwrap();
        assert_eq!(count(&conn), 0);
        assert!(!in_transaction(&conn));
        conn.ensure_transaction().unwrap();
        assert!(in_transaction(&conn));
    }

    #[test]
    fn commit_leaves_reopening_to_the_next_statement() {
        let conn = open();
        conn.set_auto_commit(false).unwrap();
        conn.execute_batch("INSERT INTO t VALUES (1)").unwrap();
        conn.commit().unwrap();
        assert!(!in_transaction(&conn));
        conn.ensure_transaction().unwrap();
        conn.execute_batch("INSERT INTO t VALUES (2)").unwrap();
        conn.rollback().unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn epoch_changes_at_every_transaction_boundary() {
        let conn = open();
        let mut seen = vec![conn.epoch()];
        conn.set_auto_commit(false).unwrap();
        seen.push(conn.epoch());
        conn.commit().unwrap();
        seen.push(conn.epoch());
        conn.ensure_transaction().unwrap();
        seen.push(conn.epoch());
        conn.rollback().unwrap();
        seen.push(conn.epoch());
        conn.set_auto_commit(true).unwrap();
        seen.push(conn.epoch());
        let mut distinct = seen.clone();
        distinct.dedup();
        assert_eq!(distinct, seen);
        conn.ensure_transaction().unwrap();
        assert_eq!(conn.epoch(), *seen.last().unwrap());
    }

    #[test]
    fn enabling_auto_commit_commits_pending_work() {
        let conn = open();
        conn.set_auto_commit(false).unwrap();
        conn.execute_batch("INSERT INTO t VALUES (1)").unwrap();
        conn.set_auto_commit(true).unwrap();
        conn.rollback().unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn ensure_transaction_reopens_after_external_end() {
        let conn = open();
        conn.set_auto_commit(false).unwrap();
        conn.execute_batch("COMMIT").unwrap();
        conn.ensure_transaction().unwrap();
        assert!(in_transaction(&conn));
    }

    #[test]
    fn broken_connection_is_unusable() {
        let conn = open();
        assert!(conn.ensure_usable().is_ok());
        conn.mark_broken();
        assert!(conn.is_broken());
        assert!(conn.ensure_usable().unwrap_err().is_fatal());
    }
}
