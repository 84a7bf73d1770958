use std::collections::VecDeque;
use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::{Type, Value, ValueRef};

use crate::error::BackendError;

/// Name and declared type of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Type from the table definition; `None` for expression columns.
    pub decl_type: Option<String>,
}

/// Forward-only cursor over the rows of an executed query.
///
/// Rows are fetched from `SQLite` when the query runs so that no statement is
/// left active on the shared connection; they are handed out one at a time
/// and cannot be revisited.
#[derive(Debug, Clone)]
pub struct RowCursor {
    columns: Arc<Vec<ColumnInfo>>,
    pending: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
}

impl RowCursor {
    #[must_use]
    pub fn new(columns: Vec<ColumnInfo>, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        Self {
            columns: Arc::new(columns),
            pending: rows.into_iter().collect(),
            current: None,
        }
    }

    /// Move to the next row. Stays `false` once the rows are exhausted.
    pub fn advance(&mut self) -> bool {
        self.current = self.pending.pop_front();
        self.current.is_some()
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_positioned(&self) -> bool {
        self.current.is_some()
    }

    /// Value of the current row at `ordinal` (1-based).
    ///
    /// # Errors
    /// Returns `24000` when no row is current and `07009` when the ordinal is
    /// outside the row.
    pub fn value_at(&self, ordinal: usize) -> Result<ValueRef<'_>, BackendError> {
        let row = self.current.as_ref().ok_or_else(no_current_row)?;
        ordinal
            .checked_sub(1)
            .and_then(|idx| row.get(idx))
            .map(ValueRef::from)
            .ok_or_else(|| self.out_of_range(ordinal))
    }

    /// Declared type of the column at `ordinal`, or the storage class of the
    /// current value when the column has no declared type.
    ///
    /// # Errors
    /// Returns the same errors as [`value_at`](Self::value_at).
    pub fn column_type_name(&self, ordinal: usize) -> Result<String, BackendError> {
        let column = ordinal
            .checked_sub(1)
            .and_then(|idx| self.columns.get(idx))
            .ok_or_else(|| self.out_of_range(ordinal))?;
        if let Some(decl) = &column.decl_type {
            return Ok(decl.clone());
        }
        let storage = match self.value_at(ordinal)?.data_type() {
            Type::Null => "NULL",
            Type::Integer => "INTEGER",
            Type::Real => "REAL",
            Type::Text => "TEXT",
            Type::Blob => "BLOB",
        };
        Ok(storage.to_owned())
    }

    fn out_of_range(&self, ordinal: usize) -> BackendError {
        BackendError::new(
            Some("07009"),
            format!(
                "column index {ordinal} out of range; row has {} columns",
                self.columns.len()
            ),
        )
    }
}

fn no_current_row() -> BackendError {
    BackendError::new(Some("24000"), "cursor is not positioned on a row")
}

/// Run a statement whose parameters are already bound and collect its rows.
///
/// # Errors
/// Returns the driver error if stepping the statement or reading a value fails.
pub fn build_row_cursor(stmt: &mut Statement<'_>) -> rusqlite::Result<RowCursor> {
    let columns: Vec<ColumnInfo> = stmt
        .columns()
        .iter()
        .map(|col| ColumnInfo {
            name: col.name().to_owned(),
            decl_type: col.decl_type().map(str::to_owned),
        })
        .collect();
    let col_count = columns.len();

    let mut rows_iter = stmt.raw_query();
    let mut rows = VecDeque::new();
    while let Some(row) = rows_iter.next()? {
        let mut values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            values.push(row.get::<_, Value>(i)?);
        }
        rows.push_back(values);
    }

    Ok(RowCursor::new(columns, rows))
}
