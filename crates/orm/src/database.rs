//! Database context
//!
//! [`Database`] is the explicit handle every entity and query operation
//! receives. It owns the [`DbPort`], the dialect, the per-type definition
//! cache and the query log. Clones share all of it.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::backends::{DatabaseValue, DbPort, ExecuteResult, QueryResult, Row, SqlDialect, SqliteBackend};
use crate::config::DatabaseConfig;
use crate::error::OrmResult;
use crate::model::{Entity, EntityDefinition};

/// A statement captured by the query log
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
    pub elapsed: Duration,
}

struct DatabaseInner {
    port: Arc<dyn DbPort>,
    dialect: SqlDialect,
    definitions: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    log_enabled: AtomicBool,
    query_log: Mutex<Vec<LoggedQuery>>,
    transaction_depth: AtomicUsize,
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Wrap a port supplied by the host
    pub fn new(port: Arc<dyn DbPort>) -> Self {
        let dialect = port.dialect();
        Self::build(port, dialect, false)
    }

    /// Open the bundled SQLite backend described by `config`
    pub async fn connect(config: DatabaseConfig) -> OrmResult<Self> {
        config.validate()?;
        let backend = SqliteBackend::connect(&config.url).await?;
        let dialect = config.dialect.unwrap_or_else(|| backend.dialect());
        Ok(Self::build(Arc::new(backend), dialect, config.log_queries))
    }

    /// Private in-memory SQLite database
    pub async fn in_memory() -> OrmResult<Self> {
        Self::connect(DatabaseConfig::default()).await
    }

    fn build(port: Arc<dyn DbPort>, dialect: SqlDialect, log_queries: bool) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                port,
                dialect,
                definitions: DashMap::new(),
                log_enabled: AtomicBool::new(log_queries),
                query_log: Mutex::new(Vec::new()),
                transaction_depth: AtomicUsize::new(0),
            }),
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.inner.dialect
    }

    pub fn port(&self) -> &Arc<dyn DbPort> {
        &self.inner.port
    }

    /// The cached definition of `E`, built on first use
    pub fn definition<E: Entity>(&self) -> Arc<EntityDefinition<E>> {
        let key = TypeId::of::<E>();
        if let Some(cached) = self.inner.definitions.get(&key) {
            if let Ok(definition) = Arc::clone(cached.value()).downcast::<EntityDefinition<E>>() {
                return definition;
            }
        }

        let definition = Arc::new(E::definition());
        self.inner
            .definitions
            .insert(key, Arc::clone(&definition) as Arc<dyn Any + Send + Sync>);
        definition
    }

    /// Run a raw statement that returns rows
    pub async fn select(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Row>> {
        let started = Instant::now();
        let result = self.inner.port.fetch_all(sql, params).await;
        self.record(sql, params, started.elapsed(), result.is_ok());
        result
    }

    /// Run a raw statement that returns no rows
    pub async fn statement(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<ExecuteResult> {
        let started = Instant::now();
        let result = self.inner.port.execute(sql, params).await;
        self.record(sql, params, started.elapsed(), result.is_ok());
        result
    }

    /// Run any raw statement through [`DbPort::query`]
    pub async fn query(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<QueryResult> {
        let started = Instant::now();
        let result = self.inner.port.query(sql, params).await;
        self.record(sql, params, started.elapsed(), result.is_ok());
        result
    }

    fn record(&self, sql: &str, params: &[DatabaseValue], elapsed: Duration, ok: bool) {
        debug!(
            sql,
            params = params.len(),
            elapsed_us = elapsed.as_micros() as u64,
            ok,
            "executed statement"
        );

        if self.inner.log_enabled.load(Ordering::Relaxed) {
            if let Ok(mut log) = self.inner.query_log.lock() {
                log.push(LoggedQuery {
                    sql: sql.to_string(),
                    params: params.to_vec(),
                    elapsed,
                });
            }
        }
    }

    pub fn enable_query_log(&self) {
        self.inner.log_enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable_query_log(&self) {
        self.inner.log_enabled.store(false, Ordering::Relaxed);
    }

    pub fn query_log(&self) -> Vec<LoggedQuery> {
        self.inner
            .query_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn flush_query_log(&self) {
        if let Ok(mut log) = self.inner.query_log.lock() {
            log.clear();
        }
    }

    pub(crate) fn transaction_depth(&self) -> &AtomicUsize {
        &self.inner.transaction_depth
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.inner.dialect)
            .field("cached_definitions", &self.inner.definitions.len())
            .field("transaction_depth", &self.inner.transaction_depth.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_log_records_only_when_enabled() {
        let db = Database::in_memory().await.unwrap();
        db.select("SELECT 1", &[]).await.unwrap();
        assert!(db.query_log().is_empty());

        db.enable_query_log();
        db.select("SELECT ?", &[DatabaseValue::Int64(2)]).await.unwrap();
        let log = db.query_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sql, "SELECT ?");
        assert_eq!(log[0].params, vec![DatabaseValue::Int64(2)]);

        db.flush_query_log();
        assert!(db.query_log().is_empty());
    }

    #[tokio::test]
    async fn test_failed_statements_are_logged_too() {
        let db = Database::connect(DatabaseConfig::default().with_query_log(true))
            .await
            .unwrap();
        assert!(db.statement("DROP TABLE nope", &[]).await.is_err());
        assert_eq!(db.query_log().len(), 1);
    }

    #[tokio::test]
    async fn test_raw_query_dispatch() {
        let db = Database::in_memory().await.unwrap();
        db.statement("CREATE TABLE t (v INTEGER)", &[]).await.unwrap();
        let inserted = db
            .query("INSERT INTO t (v) VALUES (?)", &[DatabaseValue::Int64(5)])
            .await
            .unwrap();
        assert_eq!(inserted.rows_affected, 1);
        let selected = db.query("SELECT v FROM t", &[]).await.unwrap();
        assert_eq!(selected.rows.len(), 1);
        assert_eq!(selected.rows[0]["v"], DatabaseValue::Int64(5));
    }

    #[tokio::test]
    async fn test_dialect_override() {
        let db = Database::connect(
            DatabaseConfig::default().with_dialect(SqlDialect::MySql),
        )
        .await
        .unwrap();
        assert_eq!(db.dialect(), SqlDialect::MySql);
    }
}
