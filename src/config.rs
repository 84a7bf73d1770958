use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::SqlOrdinalError;

/// URL/user/password triple describing where to connect.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    pub url: String,
    pub user: String,
    pub password: String,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    /// Parse properties text with the required keys `url`, `user` and `password`.
    ///
    /// Lines are `key=value` or `key: value`; blank lines and lines starting
    /// with `#` or `!` are ignored. Unknown keys are ignored too.
    ///
    /// Properties shipped inside the program work the same way:
    /// `ConnectionConfig::from_properties_str(include_str!("db.properties"))`.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ConfigError` naming the first missing key.
    pub fn from_properties_str(text: &str) -> Result<Self, SqlOrdinalError> {
        let mut map = Map::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = match line.find(['=', ':']) {
                Some(pos) => (&line[..pos], &line[pos + 1..]),
                None => (line, ""),
            };
            map.insert(key.trim().to_owned(), JsonValue::String(value.trim().to_owned()));
        }
        serde_json::from_value(JsonValue::Object(map))
            .map_err(|e| SqlOrdinalError::ConfigError(format!("connection properties: {e}")))
    }

    /// Read and parse a properties file.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ConfigError` if the file cannot be read or
    /// lacks a required key.
    pub fn from_properties_file(path: impl AsRef<Path>) -> Result<Self, SqlOrdinalError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            SqlOrdinalError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_properties_str(&text)
    }

    /// Parse a JSON object with the keys `url`, `user` and `password`.
    ///
    /// # Errors
    /// Returns `SqlOrdinalError::ConfigError` if the JSON is malformed or
    /// lacks a required key.
    pub fn from_json_str(json: &str) -> Result<Self, SqlOrdinalError> {
        serde_json::from_str(json)
            .map_err(|e| SqlOrdinalError::ConfigError(format!("connection json: {e}")))
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_properties_with_comments_and_separators() {
        let cfg = ConnectionConfig::from_properties_str(
            "# local database\n\
             url = jdbc:sqlite:shop.db\n\
             ! ignored\n\
             user: admin\n\
             password=s3cr=t\n\
             pool=4\n",
        )
        .unwrap();
        assert_eq!(cfg, ConnectionConfig::new("jdbc:sqlite:shop.db", "admin", "s3cr=t"));
    }

    #[test]
    fn missing_key_is_named() {
        let err = ConnectionConfig::from_properties_str("url=x\nuser=y\n").unwrap_err();
        assert!(err.to_string().contains("password"), "{err}");
    }

    #[test]
    fn parses_json() {
        let cfg = ConnectionConfig::from_json_str(
            r#"{"url": "sqlite::memory:", "user": "", "password": ""}"#,
        )
        .unwrap();
        assert_eq!(cfg.url, "sqlite::memory:");
    }

    #[test]
    fn debug_redacts_password() {
        let cfg = ConnectionConfig::new("u", "me", "hunter2");
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
