mod common;

use sql_ordinal::prelude::*;

use common::products_context;

fn kind(err: &SqlOrdinalError) -> Option<DiagnosisKind> {
    err.diagnosis().map(|d| d.kind)
}

#[test]
fn string_column_read_as_integer_names_both_types() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = products_context()?;
    let mut s = ctx.session("SELECT id, name FROM products WHERE id = 1")?;
    s.skip();
    let err = s.read::<i32>().unwrap_err();

    let SqlOrdinalError::ReadFailure { ordinal, type_name, diagnosis, .. } = &err else {
        panic!("expected read failure, got {err}");
    };
    assert_eq!(*ordinal, Some(2));
    assert_eq!(*type_name, "integer");
    assert_eq!(diagnosis.kind, DiagnosisKind::TypeMismatch);
    assert_eq!(
        diagnosis.message,
        "column `2` is not a `integer`; database reports it is `string`."
    );
    Ok(())
}

#[test]
fn unknown_table_passes_backend_message_through() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = products_context()?;
    let err = ctx.session("SELECT * FROM missing_table").unwrap_err();
    assert!(matches!(err, SqlOrdinalError::PrepareFailure { .. }), "{err}");
    assert_eq!(kind(&err), Some(DiagnosisKind::UnknownObject));
    assert!(err.to_string().contains("no such table: missing_table"), "{err}");
    assert!(!err.is_fatal());
    Ok(())
}

#[test]
fn syntax_errors_are_reported_as_such() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = products_context()?;
    let err = ctx.session("SELEC name FROM products").unwrap_err();
    assert_eq!(kind(&err), Some(DiagnosisKind::SyntaxError));
    assert!(err.to_string().contains("syntax error: "), "{err}");
    Ok(())
}

#[test]
fn value_count_mismatch_is_named() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = products_context()?;
    let err = ctx
        .session("INSERT INTO products (id, name) VALUES (?)")
        .unwrap_err();
    assert_eq!(kind(&err), Some(DiagnosisKind::ColumnCountMismatch));
    assert_eq!(
        err.diagnosis().map(|d| d.message.as_str()),
        Some("column count doesn't match value count")
    );
    Ok(())
}

#[test]
fn extra_bind_fails_and_consumes_its_ordinal() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = products_context()?;
    let mut s = ctx.session("SELECT name FROM products WHERE id = ?")?;
    s.bind(1)?;
    let err = s.bind("unexpected").unwrap_err();
    assert!(
        matches!(err, SqlOrdinalError::BindFailure { ordinal: 2, type_name: "string", .. }),
        "{err}"
    );
    assert!(!err.is_fatal());
    // the session is still usable with the values bound so far
    assert_eq!(s.read::<String>()?, "Widget");
    Ok(())
}

#[test]
fn constraint_violation_on_execute_keeps_backend_message() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = products_context()?;
    let mut s = ctx.session("INSERT INTO products (id, name) VALUES (?, ?)")?;
    s.bind(1)?.bind("Duplicate")?;
    let err = s.execute().unwrap_err();
    assert!(matches!(err, SqlOrdinalError::ExecuteFailure { .. }), "{err}");
    assert_eq!(err.backend_error().and_then(BackendError::code), Some("23000"));
    assert_eq!(kind(&err), Some(DiagnosisKind::Other));
    assert!(err.to_string().contains("UNIQUE constraint failed"), "{err}");
    Ok(())
}

#[test]
fn driver_error_is_still_reachable() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = products_context()?;
    let err = ctx.session("SELECT nope FROM products").unwrap_err();
    let driver = err
        .backend_error()
        .and_then(BackendError::driver_error)
        .and_then(|e| e.downcast_ref::<rusqlite::Error>());
    assert!(driver.is_some());
    Ok(())
}

#[test]
fn failing_query_is_reported_on_advance() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = products_context()?;
    let mut s = ctx.session("SELECT abs(?)")?;
    s.bind(i64::MIN)?;
    let err = s.advance().unwrap_err();
    assert!(
        matches!(err, SqlOrdinalError::ReadFailure { ordinal: None, type_name: "row", .. }),
        "{err}"
    );
    Ok(())
}
