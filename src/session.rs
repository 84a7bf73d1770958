//! Prepared statement plus result cursor, addressed by call order.
//!
//! A [`Session`] binds parameters and reads columns in the order the caller
//! makes the calls: the first `bind` fills placeholder 1, the second fills
//! placeholder 2, and so on; reads walk the current row's columns the same
//! way, starting over at column 1 on every [`Session::advance`].
//!
//! There are two ways to reach rows:
//!
//! * **Single-row path.** Calling [`Session::read`] (or [`Session::skip`]
//!   followed by a read) on a session that has not run yet executes the query
//!   and positions on the first row. Meant for "execute and fetch one value".
//! * **Iteration path.** Calling [`Session::advance`] on a session that has
//!   not run yet executes the query and positions on the first row; every
//!   further call moves one row on.
//!
//! The paths share one cursor. After a single-row read, `advance` moves to
//! the *second* row, so pick one path per session.

use std::fmt;
use std::rc::Rc;
use std::slice;

use rusqlite::types::Value;

use crate::classify::{ColumnMetadata, classify, classify_mismatch, is_type_mismatch};
use crate::context::DbContext;
use crate::error::{BackendError, SqlOrdinalError};
use crate::sequence::SequenceCounter;
use crate::sqlite::connection::SqliteConnection;
use crate::sqlite::errors::from_sql_failure;
use crate::sqlite::params::{bind_all, sql_value_to_sqlite_value};
use crate::sqlite::query::{RowCursor, build_row_cursor};
use crate::transaction::commit_sessions;
use crate::types::{FromColumn, SqlValue};

/// Type name reported when executing the query fails before any column is read.
const ROW_TYPE_NAME: &str = "row";

/// One prepared statement and, once executed, its result cursor.
///
/// ```rust
/// use sql_ordinal::prelude::*;
///
/// # fn main() -> Result<(), SqlOrdinalError> {
/// let mut ctx = DbContext::new();
/// ctx.connect_in_memory()?;
/// ctx.execute_batch("CREATE TABLE products (id INTEGER, name TEXT, cost REAL)")?;
///
/// ctx.session("INSERT INTO products VALUES (?, ?, ?)")?
///     .bind(1)?
///     .bind("Widget")?
///     .bind(9.99)?
///     .execute()?;
///
/// let name: String = ctx.session("SELECT name FROM products WHERE id = ?")?
///     .bind(1)?
///     .read()?;
/// assert_eq!(name, "Widget");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Session {
    connection: Rc<SqliteConnection>,
    sql: String,
    params: Vec<Value>,
    bind_seq: SequenceCounter,
    read_seq: SequenceCounter,
    /// `None` until the query has been executed.
    cursor: Option<RowCursor>,
    /// Transaction the last `execute` ran in while auto-commit was off.
    executed_in: Option<u64>,
}

impl Session {
    /// Prepare `sql` on the context's connection.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ConnectFailure` if the context has no usable
    /// connection and `SqlOrdinalError::PrepareFailure` if the backend
    /// rejects the statement.
    pub fn new(ctx: &DbContext, sql: impl Into<String>) -> Result<Self, SqlOrdinalError> {
        let connection = Rc::clone(ctx.connection()?);
        connection.ensure_usable()?;
        let sql = sql.into();

        connection
            .with_connection(|conn| conn.prepare_cached(&sql).map(|_| ()))
            .map_err(|source| {
                tracing::debug!(%sql, error = %source, "could not prepare statement");
                SqlOrdinalError::PrepareFailure {
                    diagnosis: classify(&source),
                    source,
                }
            })?;
        tracing::debug!(%sql, "prepared statement");

        Ok(Self {
            connection,
            sql,
            params: Vec::new(),
            bind_seq: SequenceCounter::new(),
            read_seq: SequenceCounter::new(),
            cursor: None,
            executed_in: None,
        })
    }

    /// The statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether the query has been executed and a cursor obtained.
    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.cursor.is_some()
    }

    pub(crate) fn connection(&self) -> &Rc<SqliteConnection> {
        &self.connection
    }

    /// Whether the last `execute` already applied this statement inside the
    /// transaction that is still open on the connection.
    pub(crate) fn has_pending_effect(&self) -> bool {
        !self.connection.auto_commit()
            && self.connection.in_transaction()
            && self.executed_in == Some(self.connection.epoch())
    }

    /// Bind `value` to the next placeholder.
    ///
    /// The ordinal is consumed even when the backend rejects the value, so a
    /// failed bind never shifts later values onto the wrong placeholder.
    /// Values bound after the query ran take effect on the next execution.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::BindFailure` if the backend refuses the value
    /// for that placeholder, e.g. when there are more values than `?`s, and
    /// `SqlOrdinalError::ConnectFailure` once the connection is broken.
    pub fn bind<T: Into<SqlValue>>(&mut self, value: T) -> Result<&mut Self, SqlOrdinalError> {
        self.connection.ensure_usable()?;
        let value = value.into();
        let type_name = value.type_name();
        let ordinal = self.bind_seq.next();
        let native = sql_value_to_sqlite_value(value);

        let checked = self.connection.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(&self.sql)?;
            stmt.raw_bind_parameter(ordinal, &native)
        });
        if let Err(source) = checked {
            return Err(SqlOrdinalError::BindFailure {
                ordinal,
                type_name,
                diagnosis: classify(&source),
                source,
            });
        }

        if self.params.len() < ordinal {
            self.params.resize(ordinal, Value::Null);
        }
        self.params[ordinal - 1] = native;
        self.executed_in = None;
        Ok(self)
    }

    /// Move to the next row, executing the query on the first call.
    ///
    /// Restarts column reading at column 1. Keeps returning `false` once the
    /// rows are exhausted.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ReadFailure` if executing the query fails.
    pub fn advance(&mut self) -> Result<bool, SqlOrdinalError> {
        self.connection.ensure_usable()?;
        self.read_seq.reset();
        self.ensure_executed()
            .map_err(|source| read_failure(None, ROW_TYPE_NAME, classify(&source), source))?;
        Ok(self.cursor.as_mut().is_some_and(RowCursor::advance))
    }

    /// Read the next column of the current row as `T`.
    ///
    /// On a session that has not run yet this executes the query and
    /// positions on the first row. Use `Option<T>` for nullable columns.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ReadFailure` when the query fails, no row is
    /// current, the column does not exist, or its value is not a `T`;
    /// `SqlOrdinalError::ConnectFailure` once the connection is broken.
    pub fn read<T: FromColumn>(&mut self) -> Result<T, SqlOrdinalError> {
        self.connection.ensure_usable()?;
        match self.ensure_executed() {
            Ok(true) => {
                if let Some(cursor) = self.cursor.as_mut() {
                    cursor.advance();
                }
            }
            Ok(false) => {}
            Err(source) => {
                return Err(read_failure(
                    Some(self.read_seq.current() + 1),
                    T::TYPE_NAME,
                    classify(&source),
                    source,
                ));
            }
        }

        let ordinal = self.read_seq.next();
        let fetched = self.cursor().and_then(|cursor| {
            let value = cursor.value_at(ordinal)?;
            T::from_column(value).map_err(|e| from_sql_failure(e, ordinal, value))
        });

        fetched.map_err(|source| {
            let diagnosis = if is_type_mismatch(&source) {
                classify_mismatch(T::TYPE_NAME, &*self, &source)
            } else {
                classify(&source)
            };
            read_failure(Some(ordinal), T::TYPE_NAME, diagnosis, source)
        })
    }

    /// Pass over the next column without reading it.
    pub fn skip(&mut self) {
        self.read_seq.next();
    }

    /// Run the statement for its effect (INSERT/UPDATE/DELETE) and return the
    /// number of rows affected.
    ///
    /// Under auto-commit the change is committed at once; otherwise it stays
    /// pending until the context commits or rolls back.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ExecuteFailure` if the backend rejects the
    /// statement.
    pub fn execute(&mut self) -> Result<usize, SqlOrdinalError> {
        self.connection.ensure_usable()?;
        let affected = self.run_dml().map_err(|source| {
            tracing::debug!(sql = %self.sql, error = %source, "execute failed");
            SqlOrdinalError::ExecuteFailure {
                diagnosis: classify(&source),
                source,
            }
        })?;
        tracing::debug!(
            sql = %self.sql,
            affected,
            auto_commit = self.connection.auto_commit(),
            "executed statement"
        );
        self.executed_in = (!self.connection.auto_commit()).then(|| self.connection.epoch());
        Ok(affected)
    }

    /// Execute this statement and commit the connection, as a batch of one.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::CommitFailure` after rolling back, or
    /// `SqlOrdinalError::RollbackFailure` if the rollback failed as well.
    pub fn commit(&self) -> Result<usize, SqlOrdinalError> {
        commit_sessions(&self.connection, slice::from_ref(self))
    }

    /// Forget bound values and results so the statement can run again with
    /// fresh parameters.
    pub fn reset(&mut self) {
        self.params.clear();
        self.bind_seq.reset();
        self.read_seq.reset();
        self.cursor = None;
        self.executed_in = None;
    }

    /// Lending stream over the rows; each item is this session positioned on
    /// the next row.
    ///
    /// ```rust
    /// # use sql_ordinal::prelude::*;
    /// # fn main() -> Result<(), SqlOrdinalError> {
    /// # let mut ctx = DbContext::new();
    /// # ctx.connect_in_memory()?;
    /// let mut session = ctx.session("SELECT 1 UNION ALL SELECT 2")?;
    /// let mut rows = session.rows();
    /// let mut total = 0;
    /// while let Some(row) = rows.next()? {
    ///     total += row.read::<i64>()?;
    /// }
    /// assert_eq!(total, 3);
    /// # Ok(())
    /// # }
    /// ```
    pub fn rows(&mut self) -> RowStream<'_> {
        RowStream {
            session: self,
            done: false,
        }
    }

    /// Iterator mapping every remaining row through `map`.
    pub fn map_rows<F, T>(&mut self, map: F) -> MappedRows<'_, F>
    where
        F: FnMut(&mut Session) -> Result<T, SqlOrdinalError>,
    {
        MappedRows {
            session: self,
            map,
            done: false,
        }
    }

    /// Execute the query if that has not happened yet. Returns whether it ran now.
    fn ensure_executed(&mut self) -> Result<bool, BackendError> {
        if self.cursor.is_some() {
            return Ok(false);
        }
        let cursor = self.run_query()?;
        tracing::debug!(sql = %self.sql, columns = cursor.column_count(), "executed query");
        self.cursor = Some(cursor);
        Ok(true)
    }

    fn cursor(&self) -> Result<&RowCursor, BackendError> {
        self.cursor
            .as_ref()
            .ok_or_else(|| BackendError::new(Some("24000"), "query has not been executed"))
    }

    fn run_query(&self) -> Result<RowCursor, BackendError> {
        self.connection.ensure_transaction()?;
        self.connection.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(&self.sql)?;
            bind_all(&mut stmt, &self.params)?;
            build_row_cursor(&mut stmt)
        })
    }

    pub(crate) fn run_dml(&self) -> Result<usize, BackendError> {
        self.connection.ensure_transaction()?;
        self.connection.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(&self.sql)?;
            bind_all(&mut stmt, &self.params)?;
            stmt.raw_execute()
        })
    }
}

impl ColumnMetadata for Session {
    fn last_read_ordinal(&self) -> usize {
        self.read_seq.current()
    }

    fn column_type_name(&self, ordinal: usize) -> Result<String, BackendError> {
        self.cursor()?.column_type_name(ordinal)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

fn read_failure(
    ordinal: Option<usize>,
    type_name: &'static str,
    diagnosis: crate::classify::Diagnosis,
    source: BackendError,
) -> SqlOrdinalError {
    SqlOrdinalError::ReadFailure {
        ordinal,
        type_name,
        diagnosis,
        source,
    }
}

/// Rows of a [`Session`], one at a time. See [`Session::rows`].
///
/// Forward-only: once it has returned `None` it stays exhausted.
pub struct RowStream<'s> {
    session: &'s mut Session,
    done: bool,
}

impl RowStream<'_> {
    /// Advance and hand out the session positioned on the next row.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ReadFailure` if executing the query fails.
    pub fn next(&mut self) -> Result<Option<&mut Session>, SqlOrdinalError> {
        if self.done {
            return Ok(None);
        }
        if self.session.advance()? {
            Ok(Some(&mut *self.session))
        } else {
            self.done = true;
            Ok(None)
        }
    }
}

/// Iterator returned by [`Session::map_rows`].
pub struct MappedRows<'s, F> {
    session: &'s mut Session,
    map: F,
    done: bool,
}

impl<F, T> Iterator for MappedRows<'_, F>
where
    F: FnMut(&mut Session) -> Result<T, SqlOrdinalError>,
{
    type Item = Result<T, SqlOrdinalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.session.advance() {
            Ok(true) => Some((self.map)(&mut *self.session)),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
