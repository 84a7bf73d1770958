//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so that
//! `use sql_ordinal::prelude::*;` is enough for everyday use.

pub use crate::classify::{Diagnosis, DiagnosisKind};
pub use crate::config::ConnectionConfig;
pub use crate::context::DbContext;
pub use crate::error::{BackendError, SqlOrdinalError};
pub use crate::session::Session;
pub use crate::sqlite::{SqliteOptions, SqliteOptionsBuilder};
pub use crate::types::{FromColumn, SqlValue};
