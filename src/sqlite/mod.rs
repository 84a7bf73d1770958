// SQLite backend - the database client the sessions run against
//
// This module is split into several sub-modules:
// - config: URL resolution and connection options
// - connection: the shared connection and its transaction mode
// - params: conversion of bound values into SQLite values
// - query: result materialisation into a forward-only row cursor
// - errors: mapping of rusqlite failures onto SQLSTATE-like codes

pub mod config;
pub mod connection;
pub mod errors;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder, SqliteTarget};
pub use connection::SqliteConnection;
pub use query::{ColumnInfo, RowCursor};
