//! Translation of backend errors into actionable diagnostics.
//!
//! Backends report failures as an SQLSTATE-like code plus free text. Codes
//! not listed here fall back to the backend's own message.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::BackendError;

static SQLSTATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Z]{5}$").expect("valid SQLSTATE pattern"));

/// Preamble `MySQL` puts in front of every syntax error.
const SYNTAX_PREAMBLE: &str = "You have an error in your SQL syntax; check the manual that \
     corresponds to your MySQL server version for the right syntax to use near ";

/// Longest slice of a syntax error message kept in a diagnosis.
const SYNTAX_EXCERPT_CHARS: usize = 64;

const COUNT_MISMATCH_CODES: &[&str] = &["21S01", "21S02"];
const SYNTAX_CODES: &[&str] = &["42000", "42601", "37000"];
const UNKNOWN_OBJECT_CODES: &[&str] = &["42S02", "42S12", "42S22", "42P01", "42703", "42883"];
const AMBIGUOUS_CODES: &[&str] = &["HY000"];
const TYPE_MISMATCH_CODES: &[&str] = &["22005", "22018", "42804"];

/// Broad category a backend failure was sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisKind {
    /// The code was missing or not SQLSTATE-shaped.
    Unclassified,
    ColumnCountMismatch,
    SyntaxError,
    UnknownObject,
    /// The backend was vague; usually a wrongly typed insert/update value.
    LikelyTypeMismatch,
    /// A typed read hit a column of another type.
    TypeMismatch,
    /// Recognised code with no dedicated wording.
    Other,
}

/// Classified failure with human-actionable wording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub kind: DiagnosisKind,
    pub message: String,
}

impl Diagnosis {
    fn new(kind: DiagnosisKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Schema lookups needed to explain a failed typed read.
pub trait ColumnMetadata {
    /// Ordinal of the column most recently consumed by a read.
    fn last_read_ordinal(&self) -> usize;

    /// Backend type name of the column at `ordinal` (1-based).
    ///
    /// # Errors
    /// Returns the backend error when the lookup itself fails.
    fn column_type_name(&self, ordinal: usize) -> Result<String, BackendError>;
}

/// Parse a backend code as an SQLSTATE, rejecting anything not shaped like one.
#[must_use]
pub fn sqlstate(err: &BackendError) -> Option<&str> {
    err.code().filter(|code| SQLSTATE.is_match(code))
}

/// Whether the backend reported a data type mismatch.
#[must_use]
pub fn is_type_mismatch(err: &BackendError) -> bool {
    sqlstate(err).is_some_and(|code| TYPE_MISMATCH_CODES.contains(&code))
}

/// General-purpose classification keyed off the backend's error code.
#[must_use]
pub fn classify(err: &BackendError) -> Diagnosis {
    let message = err.message();
    let Some(code) = sqlstate(err) else {
        return Diagnosis::new(
            DiagnosisKind::Unclassified,
            format!("could not classify database error: {message}"),
        );
    };

    if COUNT_MISMATCH_CODES.contains(&code) {
        Diagnosis::new(
            DiagnosisKind::ColumnCountMismatch,
            "column count doesn't match value count",
        )
    } else if SYNTAX_CODES.contains(&code) {
        Diagnosis::new(
            DiagnosisKind::SyntaxError,
            format!("syntax error: {}", syntax_excerpt(message)),
        )
    } else if UNKNOWN_OBJECT_CODES.contains(&code) {
        Diagnosis::new(DiagnosisKind::UnknownObject, message)
    } else if AMBIGUOUS_CODES.contains(&code) {
        Diagnosis::new(
            DiagnosisKind::LikelyTypeMismatch,
            format!("likely a type mismatch in an insert or update: {message}"),
        )
    } else {
        Diagnosis::new(DiagnosisKind::Other, message)
    }
}

/// Explain a failed typed read by asking the backend what the column really is.
///
/// Degrades to [`classify`] when the metadata lookup fails.
#[must_use]
pub fn classify_mismatch(
    requested: &str,
    metadata: &impl ColumnMetadata,
    err: &BackendError,
) -> Diagnosis {
    let ordinal = metadata.last_read_ordinal();
    match metadata.column_type_name(ordinal) {
        Ok(actual) => Diagnosis::new(
            DiagnosisKind::TypeMismatch,
            format!(
                "column `{ordinal}` is not a `{requested}`; database reports it is `{}`.",
                type_display_name(&actual)
            ),
        ),
        Err(lookup_err) => {
            tracing::debug!(ordinal, error = %lookup_err, "column type lookup failed");
            classify(err)
        }
    }
}

/// Map a backend type identifier onto the type names used in read diagnostics.
///
/// Length/precision arguments and `UNSIGNED` are ignored; unrecognised names
/// are returned unchanged.
#[must_use]
pub fn type_display_name(backend_type: &str) -> String {
    let base = backend_type
        .split('(')
        .next()
        .unwrap_or(backend_type)
        .trim()
        .trim_end_matches("UNSIGNED")
        .trim_end_matches("unsigned")
        .trim()
        .to_ascii_uppercase();

    let name = match base.as_str() {
        "INT" | "INTEGER" | "MEDIUMINT" | "INT4" | "SERIAL" => "integer",
        "BIGINT" | "INT8" | "BIGSERIAL" | "LONG" => "long",
        "SMALLINT" | "INT2" => "short",
        "TINYINT" => "byte",
        "REAL" | "FLOAT4" => "float",
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "FLOAT8" => "double",
        "DECIMAL" | "NUMERIC" | "NUMBER" | "MONEY" => "decimal",
        "TEXT" | "VARCHAR" | "CHAR" | "CHARACTER" | "CHARACTER VARYING" | "NCHAR"
        | "NVARCHAR" | "CLOB" | "STRING" => "string",
        "BOOLEAN" | "BOOL" | "BIT" => "boolean",
        "DATE" => "date",
        "DATETIME" | "TIMESTAMP" => "timestamp",
        "BLOB" | "BINARY" | "VARBINARY" | "BYTEA" => "bytes",
        "JSON" | "JSONB" => "json",
        "OBJECT" | "OTHER" | "JAVA_OBJECT" | "ANY" => "object",
        _ => return backend_type.to_owned(),
    };
    name.to_owned()
}

fn syntax_excerpt(message: &str) -> String {
    let body = message.strip_prefix(SYNTAX_PREAMBLE).unwrap_or(message);
    let mut chars = body.chars();
    let excerpt: String = chars.by_ref().take(SYNTAX_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{excerpt}...")
    } else {
        excerpt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMetadata {
        ordinal: usize,
        type_name: Option<&'static str>,
    }

    impl ColumnMetadata for FixedMetadata {
        fn last_read_ordinal(&self) -> usize {
            self.ordinal
        }

        fn column_type_name(&self, ordinal: usize) -> Result<String, BackendError> {
            self.type_name
                .map(str::to_owned)
                .ok_or_else(|| BackendError::new(Some("07009"), format!("no column {ordinal}")))
        }
    }

    fn err(code: Option<&str>, message: &str) -> BackendError {
        BackendError::new(code, message)
    }

    #[test]
    fn unparseable_codes_are_unclassified() {
        for code in [None, Some("SQLITE_1"), Some("42s02"), Some("4200")] {
            let d = classify(&err(code, "boom"));
            assert_eq!(d.kind, DiagnosisKind::Unclassified, "{code:?}");
            assert_eq!(d.message, "could not classify database error: boom");
        }
    }

    #[test]
    fn count_mismatch_has_fixed_wording() {
        let d = classify(&err(
            Some("21S01"),
            "table products has 4 columns but 3 values were supplied",
        ));
        assert_eq!(d.kind, DiagnosisKind::ColumnCountMismatch);
        assert_eq!(d.message, "column count doesn't match value count");
    }

    #[test]
    fn syntax_error_skips_preamble_and_truncates() {
        let tail = "'FORM products WHERE id = 1' at line 1";
        let d = classify(&err(Some("42000"), &format!("{SYNTAX_PREAMBLE}{tail}")));
        assert_eq!(d.kind, DiagnosisKind::SyntaxError);
        assert_eq!(d.message, format!("syntax error: {tail}"));

        let long = "x".repeat(100);
        let d = classify(&err(Some("42601"), &long));
        assert_eq!(d.message, format!("syntax error: {}...", "x".repeat(64)));
    }

    #[test]
    fn unknown_object_passes_message_through() {
        let d = classify(&err(Some("42S02"), "no such table: widgets"));
        assert_eq!(d.kind, DiagnosisKind::UnknownObject);
        assert_eq!(d.message, "no such table: widgets");
    }

    #[test]
    fn ambiguous_code_suggests_type_mismatch() {
        let d = classify(&err(Some("HY000"), "datatype mismatch"));
        assert_eq!(d.kind, DiagnosisKind::LikelyTypeMismatch);
        assert!(d.message.starts_with("likely a type mismatch"));
        assert!(d.message.ends_with("datatype mismatch"));
    }

    #[test]
    fn other_codes_keep_original_message() {
        let d = classify(&err(Some("23000"), "UNIQUE constraint failed: t.id"));
        assert_eq!(d.kind, DiagnosisKind::Other);
        assert_eq!(d.message, "UNIQUE constraint failed: t.id");
    }

    #[test]
    fn mismatch_names_requested_and_actual_types() {
        let meta = FixedMetadata {
            ordinal: 2,
            type_name: Some("VARCHAR(40)"),
        };
        let d = classify_mismatch("integer", &meta, &err(Some("22005"), "invalid type"));
        assert_eq!(d.kind, DiagnosisKind::TypeMismatch);
        assert_eq!(
            d.message,
            "column `2` is not a `integer`; database reports it is `string`."
        );
    }

    #[test]
    fn mismatch_degrades_when_lookup_fails() {
        let meta = FixedMetadata {
            ordinal: 9,
            type_name: None,
        };
        let d = classify_mismatch("integer", &meta, &err(Some("22005"), "invalid type"));
        assert_eq!(d.kind, DiagnosisKind::Other);
        assert_eq!(d.message, "invalid type");
    }

    #[test]
    fn display_names_cover_common_families() {
        assert_eq!(type_display_name("INTEGER"), "integer");
        assert_eq!(type_display_name("int unsigned"), "integer");
        assert_eq!(type_display_name("BIGINT"), "long");
        assert_eq!(type_display_name("decimal(10, 2)"), "decimal");
        assert_eq!(type_display_name("double precision"), "double");
        assert_eq!(type_display_name("Text"), "string");
        assert_eq!(type_display_name("BOOLEAN"), "boolean");
        assert_eq!(type_display_name("DATE"), "date");
        assert_eq!(type_display_name("BLOB"), "bytes");
        assert_eq!(type_display_name("GEOMETRY"), "GEOMETRY");
    }

    #[test]
    fn type_mismatch_detection_requires_sqlstate() {
        assert!(is_type_mismatch(&err(Some("22005"), "x")));
        assert!(is_type_mismatch(&err(Some("22018"), "x")));
        assert!(!is_type_mismatch(&err(Some("22003"), "x")));
        assert!(!is_type_mismatch(&err(None, "x")));
    }
}
