//! Ordinal binding and reading over a relational database connection.
//!
//! Parameters are bound and columns are read in call order, so a query reads
//! top to bottom without index bookkeeping. Backend failures come back with a
//! plain-language diagnosis derived from their SQLSTATE, and sessions can be
//! collected into a batch that commits or rolls back as one unit.
//!
//! ```rust
//! use sql_ordinal::prelude::*;
//!
//! # fn main() -> Result<(), SqlOrdinalError> {
//! let mut ctx = DbContext::new();
//! ctx.connect_in_memory()?;
//! ctx.execute_batch("CREATE TABLE products (id INTEGER, name TEXT)")?;
//! ctx.set_auto_commit(false)?;
//!
//! for (id, name) in [(1, "Widget"), (2, "Gadget")] {
//!     let mut insert = ctx.session("INSERT INTO products VALUES (?, ?)")?;
//!     insert.bind(id)?.bind(name)?;
//!     ctx.collect(insert);
//! }
//! assert_eq!(ctx.commit_collected()?, 2);
//!
//! let mut query = ctx.session("SELECT id, name FROM products ORDER BY id")?;
//! while query.advance()? {
//!     let id: i64 = query.read()?;
//!     let name: String = query.read()?;
//!     println!("{id}: {name}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod prelude;
pub mod sequence;
pub mod session;
pub mod sqlite;
mod transaction;
pub mod types;

pub use classify::{Diagnosis, DiagnosisKind};
pub use config::ConnectionConfig;
pub use context::DbContext;
pub use error::{BackendError, SqlOrdinalError};
pub use sequence::SequenceCounter;
pub use session::{MappedRows, RowStream, Session};
pub use types::{FromColumn, SqlValue};
