//! Database configuration

use crate::backends::SqlDialect;
use crate::error::{ModelError, ModelResult};

/// Connection settings for [`Database::connect`](crate::database::Database::connect)
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// `sqlite:` URL, e.g. `sqlite::memory:` or `sqlite://data/app.db`
    pub url: String,
    /// Record every statement in the query log from the start
    pub log_queries: bool,
    /// Override the dialect reported by the backend
    pub dialect: Option<SqlDialect>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            log_queries: false,
            dialect: None,
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Read `DATABASE_URL` and `DB_LOG_QUERIES` from the environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            config.url = url;
        }
        if let Some(flag) = lookup("DB_LOG_QUERIES") {
            config.log_queries = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        config
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_query_log(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.url.trim().is_empty() {
            return Err(ModelError::Configuration(
                "Database URL cannot be empty".to_string(),
            ));
        }
        if !self.url.starts_with("sqlite:") {
            return Err(ModelError::Configuration(format!(
                "Unsupported database URL '{}': only sqlite: URLs have a bundled backend",
                self.url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite::memory:");
        assert!(!config.log_queries);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite://data/app.db"),
            ("DB_LOG_QUERIES", "true"),
        ]
        .into_iter()
        .collect();

        let config = DatabaseConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.url, "sqlite://data/app.db");
        assert!(config.log_queries);
    }

    #[test]
    fn test_blank_url_falls_back_to_default() {
        let config = DatabaseConfig::from_lookup(|key| {
            (key == "DATABASE_URL").then(|| "  ".to_string())
        });
        assert_eq!(config.url, "sqlite::memory:");
    }

    #[test]
    fn test_validate_rejects_other_schemes() {
        let config = DatabaseConfig::new("mysql://localhost/app");
        assert!(matches!(
            config.validate(),
            Err(ModelError::Configuration(_))
        ));
        assert!(DatabaseConfig::new("").validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = DatabaseConfig::default()
            .with_url("sqlite://x.db")
            .with_query_log(true)
            .with_dialect(SqlDialect::MySql);
        assert_eq!(config.url, "sqlite://x.db");
        assert!(config.log_queries);
        assert_eq!(config.dialect, Some(SqlDialect::MySql));
    }
}
