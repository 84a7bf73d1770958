use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value as NativeValue, ValueRef};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

/// Values that can be bound to a statement parameter.
///
/// Each variant keeps the caller's declared type so bind failures can name it:
/// ```rust
/// use sql_ordinal::prelude::*;
///
/// let params: Vec<SqlValue> = vec![1.into(), "Widget".into(), 9.99.into(), None::<i32>.into()];
/// assert_eq!(params[1].type_name(), "string");
/// assert!(params[3].is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Arbitrary-precision decimal, stored as text by `SQLite`
    Decimal(Decimal),
    /// Binary data
    Bytes(Vec<u8>),
    /// Calendar date
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
    /// JSON value, stored as text
    Json(JsonValue),
    /// Backend-native value passed through untouched
    Object(NativeValue),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Object(NativeValue::Null))
    }

    /// Name of the value's type as used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "boolean",
            SqlValue::Byte(_) => "byte",
            SqlValue::Short(_) => "short",
            SqlValue::Int(_) => "integer",
            SqlValue::Long(_) => "long",
            SqlValue::Float(_) => "float",
            SqlValue::Double(_) => "double",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Date(_) => "date",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Text(_) => "string",
            SqlValue::Json(_) => "json",
            SqlValue::Object(_) => "object",
        }
    }
}

macro_rules! impl_from_for_sql_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(value: $ty) -> Self {
                    SqlValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_sql_value! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    Decimal => Decimal,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveDateTime => Timestamp,
    String => Text,
    JsonValue => Json,
    NativeValue => Object,
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_owned())
    }
}

impl From<&[u8]> for SqlValue {
    fn from(value: &[u8]) -> Self {
        SqlValue::Bytes(value.to_vec())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// Types a result column can be read as.
///
/// `Option<T>` reads SQL NULL as `None`; every other implementation treats
/// NULL as a type mismatch, except the passthrough types ([`NativeValue`],
/// [`SqlValue`], [`JsonValue`]) which have their own null.
pub trait FromColumn: Sized {
    /// Name used when a read of this type fails.
    const TYPE_NAME: &'static str;

    /// Convert the raw column value.
    ///
    /// # Errors
    /// Returns `FromSqlError` if the value cannot be represented as `Self`.
    fn from_column(value: ValueRef<'_>) -> FromSqlResult<Self>;
}

macro_rules! impl_from_column_via_from_sql {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromColumn for $ty {
                const TYPE_NAME: &'static str = $name;

                fn from_column(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    <$ty as FromSql>::column_result(value)
                }
            }
        )*
    };
}

impl_from_column_via_from_sql! {
    bool => "boolean",
    i8 => "byte",
    i16 => "short",
    i32 => "integer",
    i64 => "long",
    f32 => "float",
    f64 => "double",
    Vec<u8> => "bytes",
    NaiveDate => "date",
    NaiveDateTime => "timestamp",
    String => "string",
    NativeValue => "object",
}

impl FromColumn for Decimal {
    const TYPE_NAME: &'static str = "decimal";

    fn from_column(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(i) => Ok(Decimal::from(i)),
            ValueRef::Real(f) => Decimal::try_from(f).map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Text(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                Decimal::from_str(text.trim()).map_err(|e| FromSqlError::Other(Box::new(e)))
            }
            ValueRef::Null | ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

impl FromColumn for JsonValue {
    const TYPE_NAME: &'static str = "json";

    fn from_column(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(JsonValue::Null),
            ValueRef::Integer(i) => Ok(JsonValue::from(i)),
            ValueRef::Real(f) => Ok(JsonValue::from(f)),
            ValueRef::Text(bytes) => {
                serde_json::from_slice(bytes).map_err(|e| FromSqlError::Other(Box::new(e)))
            }
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

impl FromColumn for SqlValue {
    const TYPE_NAME: &'static str = "object";

    fn from_column(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match NativeValue::from(value) {
            NativeValue::Null => SqlValue::Null,
            NativeValue::Integer(i) => SqlValue::Long(i),
            NativeValue::Real(f) => SqlValue::Double(f),
            NativeValue::Text(s) => SqlValue::Text(s),
            NativeValue::Blob(b) => SqlValue::Bytes(b),
        })
    }
}

impl<T: FromColumn> FromColumn for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_column(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(None),
            other => T::from_column(other).map(Some),
        }
    }
}
