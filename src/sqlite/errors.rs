use rusqlite::ErrorCode;
use rusqlite::types::{FromSqlError, ValueRef};

use crate::error::BackendError;

/// Derive an SQLSTATE-like code from `SQLite`'s message text.
///
/// `SQLite` reports most statement problems as a generic `SQLITE_ERROR`, so
/// the message is the only thing that distinguishes them.
fn code_from_message(message: &str) -> Option<&'static str> {
    let lower = message.to_ascii_lowercase();
    if lower.contains("syntax error")
        || lower.contains("incomplete input")
        || lower.contains("unrecognized token")
    {
        return Some("42000");
    }
    if lower.contains("no such table") {
        return Some("42S02");
    }
    if lower.contains("no such column") {
        return Some("42S22");
    }
    if lower.contains("no such function") {
        return Some("42883");
    }
    if lower.contains("values were supplied")
        || (lower.contains("values for") && lower.contains("columns"))
    {
        return Some("21S01");
    }
    None
}

fn sqlstate_for(err: &rusqlite::Error) -> Option<String> {
    let code = match err {
        rusqlite::Error::SqliteFailure(ffi_err, msg) => {
            if let Some(code) = msg.as_deref().and_then(code_from_message) {
                code
            } else {
                match ffi_err.code {
                    ErrorCode::ConstraintViolation => "23000",
                    ErrorCode::TypeMismatch => "HY000",
                    ErrorCode::ParameterOutOfRange => "07001",
                    ErrorCode::TooBig => "22001",
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => "40001",
                    _ => return Some(format!("SQLITE_{}", ffi_err.extended_code)),
                }
            }
        }
        rusqlite::Error::InvalidColumnIndex(_) | rusqlite::Error::InvalidColumnName(_) => "07009",
        rusqlite::Error::InvalidColumnType(..) => "22005",
        rusqlite::Error::IntegralValueOutOfRange(..) => "22003",
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::ToSqlConversionFailure(_) => "22018",
        rusqlite::Error::InvalidParameterCount(..) | rusqlite::Error::InvalidParameterName(_) => {
            "07001"
        }
        rusqlite::Error::QueryReturnedNoRows => "02000",
        other => return code_from_message(&other.to_string()).map(str::to_owned),
    };
    Some(code.to_owned())
}

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        let code = sqlstate_for(&err);
        BackendError::new(code.as_deref(), err.to_string()).with_source(err)
    }
}

/// Turn a failed column conversion into a backend error, the same way
/// `rusqlite::Row::get` reports it. `ordinal` is 1-based.
pub(crate) fn from_sql_failure(err: FromSqlError, ordinal: usize, value: ValueRef<'_>) -> BackendError {
    let idx = ordinal.saturating_sub(1);
    let data_type = value.data_type();
    if matches!(value, ValueRef::Null) && matches!(err, FromSqlError::InvalidType) {
        return BackendError::new(
            Some("22002"),
            format!("column {ordinal} is NULL; read it as an Option to accept missing values"),
        );
    }
    let driver_err = match err {
        FromSqlError::InvalidType => {
            rusqlite::Error::InvalidColumnType(idx, format!("column {ordinal}"), data_type)
        }
        FromSqlError::OutOfRange(i) => rusqlite::Error::IntegralValueOutOfRange(idx, i),
        FromSqlError::Other(inner) => rusqlite::Error::FromSqlConversionFailure(idx, data_type, inner),
        other => rusqlite::Error::FromSqlConversionFailure(idx, data_type, Box::new(other)),
    };
    BackendError::from(driver_err)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;

    fn failure(sql: &str) -> BackendError {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT, cost REAL, quantity INTEGER);")
            .unwrap();
        let err = conn.execute_batch(sql).unwrap_err();
        BackendError::from(err)
    }

    #[test]
    fn syntax_errors_map_to_42000() {
        let err = failure("SELEC * FROM products");
        assert_eq!(err.code(), Some("42000"));
    }

    #[test]
    fn missing_table_maps_to_42s02() {
        let err = failure("SELECT * FROM widgets");
        assert_eq!(err.code(), Some("42S02"));
        assert!(err.message().contains("widgets"));
    }

    #[test]
    fn value_count_mismatch_maps_to_21s01() {
        let err = failure("INSERT INTO products VALUES (1, 'a', 1.0)");
        assert_eq!(err.code(), Some("21S01"));
    }

    #[test]
    fn constraint_violations_map_to_23000() {
        let err = failure(
            "INSERT INTO products VALUES (1, 'a', 1.0, 1); INSERT INTO products VALUES (1, 'b', 2.0, 2);",
        );
        assert_eq!(err.code(), Some("23000"));
    }

    #[test]
    fn rowid_type_mismatch_maps_to_hy000() {
        let err = failure("INSERT INTO products VALUES ('abc', 'a', 1.0, 1)");
        assert_eq!(err.code(), Some("HY000"));
    }

    #[test]
    fn conversion_failures_carry_driver_error() {
        let err = from_sql_failure(FromSqlError::InvalidType, 2, ValueRef::Text(b"x"));
        assert_eq!(err.code(), Some("22005"));
        assert!(err.driver_error().is_some());

        let err = from_sql_failure(FromSqlError::OutOfRange(1 << 40), 1, ValueRef::Integer(1 << 40));
        assert_eq!(err.code(), Some("22003"));
    }

    #[test]
    fn null_reads_get_their_own_code() {
        let err = from_sql_failure(FromSqlError::InvalidType, 3, ValueRef::Null);
        assert_eq!(err.code(), Some("22002"));
        assert!(err.message().contains("column 3 is NULL"));
    }
}
