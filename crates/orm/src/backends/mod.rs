//! Database Backends
//!
//! The ORM never opens connections itself. Everything it runs goes through a
//! [`DbPort`] handed to [`Database`](crate::database::Database) by the host.

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::OrmResult;
use crate::query::types::DatePart;

pub mod sqlite;
pub mod value;

pub use sqlite::SqliteBackend;
pub use value::{DatabaseValue, DATETIME_FORMAT};

/// One result row, column name → value, in select-list order
pub type Row = IndexMap<String, DatabaseValue>;

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// Outcome of [`DbPort::query`], which accepts any statement kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// SQL dialects the query compiler knows how to target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    MySql,
}

impl SqlDialect {
    pub fn name(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::MySql => "mysql",
        }
    }

    /// Wrap a column in the dialect's date-part extraction function
    pub fn date_part(&self, part: DatePart, column: &str) -> String {
        match (self, part) {
            (SqlDialect::MySql, DatePart::Date) => format!("DATE({})", column),
            (SqlDialect::MySql, DatePart::Month) => format!("MONTH({})", column),
            (SqlDialect::MySql, DatePart::Year) => format!("YEAR({})", column),
            (SqlDialect::MySql, DatePart::Time) => format!("TIME({})", column),
            (SqlDialect::Sqlite, DatePart::Date) => format!("date({})", column),
            (SqlDialect::Sqlite, DatePart::Month) => {
                format!("CAST(strftime('%m', {}) AS INTEGER)", column)
            }
            (SqlDialect::Sqlite, DatePart::Year) => {
                format!("CAST(strftime('%Y', {}) AS INTEGER)", column)
            }
            (SqlDialect::Sqlite, DatePart::Time) => format!("time({})", column),
        }
    }
}

impl Default for SqlDialect {
    fn default() -> Self {
        SqlDialect::Sqlite
    }
}

/// Query-execution port consumed by the ORM.
///
/// Statements use `?` placeholders and the parameter count always matches.
/// Transaction calls are plain statements on the port's connection; the
/// ORM tracks nesting and emits savepoints itself.
#[async_trait]
pub trait DbPort: Send + Sync {
    /// Run a statement that returns rows
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Row>>;

    /// Run a statement that returns no rows
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<ExecuteResult>;

    /// Run any statement, dispatching on its leading keyword
    async fn query(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<QueryResult> {
        if returns_rows(sql) {
            let rows = self.fetch_all(sql, params).await?;
            Ok(QueryResult {
                rows,
                ..QueryResult::default()
            })
        } else {
            let result = self.execute(sql, params).await?;
            Ok(QueryResult {
                rows: Vec::new(),
                rows_affected: result.rows_affected,
                last_insert_id: result.last_insert_id,
            })
        }
    }

    async fn begin_transaction(&self) -> OrmResult<()>;

    async fn commit(&self) -> OrmResult<()>;

    async fn rollback(&self) -> OrmResult<()>;

    fn dialect(&self) -> SqlDialect;
}

fn returns_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(keyword.as_str(), "SELECT" | "WITH" | "PRAGMA" | "VALUES" | "EXPLAIN")
}
