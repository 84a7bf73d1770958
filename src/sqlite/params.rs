use rusqlite::Statement;
use rusqlite::types::Value;

use crate::types::SqlValue;

const DATE_FORMAT: &str = "%F";
const TIMESTAMP_FORMAT: &str = "%F %T%.f";

/// Convert a single bound value to a rusqlite `Value`.
///
/// `SQLite` has no native decimal, date or JSON storage; those are written as
/// text in formats the read side parses back.
#[must_use]
pub fn sql_value_to_sqlite_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Integer(i64::from(b)),
        SqlValue::Byte(i) => Value::Integer(i64::from(i)),
        SqlValue::Short(i) => Value::Integer(i64::from(i)),
        SqlValue::Int(i) => Value::Integer(i64::from(i)),
        SqlValue::Long(i) => Value::Integer(i),
        SqlValue::Float(f) => Value::Real(f64::from(f)),
        SqlValue::Double(f) => Value::Real(f),
        SqlValue::Decimal(d) => Value::Text(d.to_string()),
        SqlValue::Bytes(bytes) => Value::Blob(bytes),
        SqlValue::Date(date) => Value::Text(date.format(DATE_FORMAT).to_string()),
        SqlValue::Timestamp(dt) => Value::Text(dt.format(TIMESTAMP_FORMAT).to_string()),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Json(jval) => Value::Text(jval.to_string()),
        SqlValue::Object(native) => native,
    }
}

/// Bind `params` to `stmt`, the first value at ordinal 1.
///
/// # Errors
/// Returns the driver error if `SQLite` rejects any ordinal.
pub fn bind_all(stmt: &mut Statement<'_>, params: &[Value]) -> rusqlite::Result<()> {
    for (idx, value) in params.iter().enumerate() {
        stmt.raw_bind_parameter(idx + 1, value)?;
    }
    Ok(())
}
