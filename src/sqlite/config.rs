use std::path::PathBuf;
use std::time::Duration;

use crate::error::SqlOrdinalError;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for opening a `SQLite` connection.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub busy_timeout: Duration,
    pub foreign_keys: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            foreign_keys: true,
        }
    }
}

impl SqliteOptions {
    #[must_use]
    pub fn builder() -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new()
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone, Default)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.opts.foreign_keys = foreign_keys;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }
}

/// Where a connection URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    Memory,
    Path(PathBuf),
}

impl SqliteTarget {
    /// Resolve a connection URL.
    ///
    /// Accepts `sqlite::memory:`, `:memory:`, `sqlite://<path>`,
    /// `sqlite:<path>`, `jdbc:sqlite:<path>` or a bare path.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ConfigError` if the URL names no database.
    pub fn from_url(url: &str) -> Result<Self, SqlOrdinalError> {
        let url = url.trim();
        let rest = url
            .strip_prefix("jdbc:")
            .unwrap_or(url);
        let rest = rest
            .strip_prefix("sqlite://")
            .or_else(|| rest.strip_prefix("sqlite:"))
            .unwrap_or(rest);

        match rest {
            "" => Err(SqlOrdinalError::ConfigError(format!(
                "connection url `{url}` does not name a database"
            ))),
            ":memory:" | "memory:" => Ok(SqliteTarget::Memory),
            path => Ok(SqliteTarget::Path(PathBuf::from(path))),
        }
    }
}
