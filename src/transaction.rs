//! All-or-nothing execution of a batch of sessions.

use crate::classify::classify;
use crate::error::{BackendError, SqlOrdinalError};
use crate::session::Session;
use crate::sqlite::connection::SqliteConnection;

/// Execute `sessions` in order and commit once.
///
/// Sessions already executed in the open transaction are not run a second
/// time; their changes are committed (or rolled back) with the rest. Returns
/// the total number of rows affected by the statements run here.
///
/// # Errors
/// Returns `SqlOrdinalError::CommitFailure` after rolling back when a
/// statement or the commit fails, and `SqlOrdinalError::RollbackFailure` when
/// the rollback fails too.
pub(crate) fn commit_sessions(
    conn: &SqliteConnection,
    sessions: &[Session],
) -> Result<usize, SqlOrdinalError> {
    conn.ensure_usable()?;
    let mut affected = 0;
    for (idx, session) in sessions.iter().enumerate() {
        if session.has_pending_effect() {
            tracing::debug!(statement = idx, sql = %session.sql(), "already executed in this transaction");
            continue;
        }
        match session.run_dml() {
            Ok(rows) => affected += rows,
            Err(source) => {
                tracing::debug!(statement = idx, sql = %session.sql(), error = %source, "batch statement failed");
                let trigger = SqlOrdinalError::CommitFailure {
                    statement: Some(idx),
                    diagnosis: classify(&source),
                    source,
                };
                return Err(roll_back(conn, trigger));
            }
        }
    }

    if let Err(source) = conn.commit() {
        let trigger = SqlOrdinalError::CommitFailure {
            statement: None,
            diagnosis: classify(&source),
            source,
        };
        return Err(roll_back(conn, trigger));
    }
    tracing::debug!(statements = sessions.len(), affected, "batch committed");
    Ok(affected)
}

/// Roll back after `trigger` and return the error to surface.
fn roll_back(conn: &SqliteConnection, trigger: SqlOrdinalError) -> SqlOrdinalError {
    tracing::warn!(error = %trigger, "rolling back batch");
    match conn.rollback() {
        Ok(()) => trigger,
        Err(source) => rollback_failure(conn, trigger, source),
    }
}

fn rollback_failure(
    conn: &SqliteConnection,
    trigger: SqlOrdinalError,
    source: BackendError,
) -> SqlOrdinalError {
    tracing::error!(error = %source, trigger = %trigger, "rollback failed; connection marked broken");
    conn.mark_broken();
    SqlOrdinalError::RollbackFailure {
        trigger: Box::new(trigger),
        source,
    }
}
