//! SQLite backend built on a single `sqlx` connection

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Row as _, Sqlite, TypeInfo, ValueRef};
use tokio::sync::Mutex;
use tracing::info;

use super::{DatabaseValue, DbPort, ExecuteResult, Row, SqlDialect, DATETIME_FORMAT};
use crate::error::{ModelError, OrmResult};

/// [`DbPort`] over one SQLite connection.
///
/// The connection sits behind an async mutex, so statements from concurrent
/// tasks are serialized and a transaction begun by one task is visible to
/// every caller sharing the backend.
pub struct SqliteBackend {
    connection: Mutex<SqliteConnection>,
    url: String,
}

impl SqliteBackend {
    /// Open a connection from a `sqlite:` URL, creating the file if missing
    pub async fn connect(url: &str) -> OrmResult<Self> {
        if !url.starts_with("sqlite:") {
            return Err(ModelError::Configuration(format!(
                "Unsupported database URL '{}': expected a sqlite: URL",
                url
            )));
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| ModelError::Configuration(format!("Invalid SQLite URL '{}': {}", url, e)))?
            .create_if_missing(true);

        let connection = SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| ModelError::Connection(format!("Failed to open '{}': {}", url, e)))?;

        info!("Connected to SQLite database at {}", url);

        Ok(Self {
            connection: Mutex::new(connection),
            url: url.to_string(),
        })
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> OrmResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn run_plain(&self, sql: &str) -> OrmResult<()> {
        let mut conn = self.connection.lock().await;
        sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error(sql, e))?;
        Ok(())
    }
}

#[async_trait]
impl DbPort for SqliteBackend {
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Row>> {
        let mut conn = self.connection.lock().await;
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }

        let rows = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error(sql, e))?;

        rows.iter().map(|row| decode_row(sql, row)).collect()
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<ExecuteResult> {
        let mut conn = self.connection.lock().await;
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param);
        }

        let result = query
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error(sql, e))?;

        let is_insert = sql
            .trim_start()
            .get(..6)
            .map(|head| head.eq_ignore_ascii_case("INSERT"))
            .unwrap_or(false);

        Ok(ExecuteResult {
            rows_affected: result.rows_affected(),
            last_insert_id: is_insert.then(|| result.last_insert_rowid()),
        })
    }

    async fn begin_transaction(&self) -> OrmResult<()> {
        self.run_plain("BEGIN").await
    }

    async fn commit(&self) -> OrmResult<()> {
        self.run_plain("COMMIT").await
    }

    async fn rollback(&self) -> OrmResult<()> {
        self.run_plain("ROLLBACK").await
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q DatabaseValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        DatabaseValue::Null => query.bind(None::<String>),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.as_str()),
        DatabaseValue::Bytes(b) => query.bind(b.as_slice()),
        DatabaseValue::DateTime(dt) => query.bind(dt.format(DATETIME_FORMAT).to_string()),
        DatabaseValue::Json(j) => query.bind(j.to_string()),
    }
}

/// Decode by the storage class of each value, not the declared column type
fn decode_row(sql: &str, row: &SqliteRow) -> OrmResult<Row> {
    let mut decoded = Row::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        let storage_class = {
            let raw = row
                .try_get_raw(index)
                .map_err(|e| map_sqlx_error(sql, e))?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_ascii_uppercase())
            }
        };

        let value = match storage_class.as_deref() {
            None => DatabaseValue::Null,
            Some("INTEGER") | Some("BOOLEAN") => {
                DatabaseValue::Int64(decode_cell::<i64>(sql, row, index)?)
            }
            Some("REAL") => DatabaseValue::Float64(decode_cell::<f64>(sql, row, index)?),
            Some("BLOB") => DatabaseValue::Bytes(decode_cell::<Vec<u8>>(sql, row, index)?),
            Some(_) => DatabaseValue::String(decode_cell::<String>(sql, row, index)?),
        };

        decoded.insert(column.name().to_string(), value);
    }

    Ok(decoded)
}

fn decode_cell<T>(sql: &str, row: &SqliteRow, index: usize) -> OrmResult<T>
where
    T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get_unchecked::<T, _>(index)
        .map_err(|e| map_sqlx_error(sql, e))
}

fn map_sqlx_error(sql: &str, err: sqlx::Error) -> ModelError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ModelError::Connection(err.to_string()),
        sqlx::Error::Database(db) => ModelError::query(sql, db.message()),
        _ => ModelError::query(sql, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_storage_classes() {
        let db = SqliteBackend::in_memory().await.unwrap();
        db.execute(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, n TEXT, r REAL, b BLOB, flag INTEGER)",
            &[],
        )
        .await
        .unwrap();

        let result = db
            .execute(
                "INSERT INTO t (n, r, b, flag) VALUES (?, ?, ?, ?)",
                &[
                    DatabaseValue::from("ann"),
                    DatabaseValue::Float64(1.5),
                    DatabaseValue::Bytes(vec![1, 2]),
                    DatabaseValue::Bool(true),
                ],
            )
            .await
            .unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.last_insert_id, Some(1));

        let rows = db.fetch_all("SELECT * FROM t", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["id"], DatabaseValue::Int64(1));
        assert_eq!(row["n"], DatabaseValue::from("ann"));
        assert_eq!(row["r"], DatabaseValue::Float64(1.5));
        assert_eq!(row["b"], DatabaseValue::Bytes(vec![1, 2]));
        assert_eq!(row["flag"], DatabaseValue::Int64(1));
    }

    #[tokio::test]
    async fn test_null_and_column_order() {
        let db = SqliteBackend::in_memory().await.unwrap();
        let rows = db
            .fetch_all("SELECT NULL AS z, 2 AS a", &[])
            .await
            .unwrap();
        let columns: Vec<&String> = rows[0].keys().collect();
        assert_eq!(columns, ["z", "a"]);
        assert!(rows[0]["z"].is_null());
    }

    #[tokio::test]
    async fn test_errors_carry_sql() {
        let db = SqliteBackend::in_memory().await.unwrap();
        let err = db.fetch_all("SELECT * FROM missing", &[]).await.unwrap_err();
        assert_eq!(err.sql(), Some("SELECT * FROM missing"));
    }

    #[tokio::test]
    async fn test_invalid_url_is_configuration_error() {
        let err = SqliteBackend::connect("postgres://nope").await.err().unwrap();
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_file_backed_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let url = format!("sqlite://{}", path.display());

        let db = SqliteBackend::connect(&url).await.unwrap();
        db.execute("CREATE TABLE k (v TEXT)", &[]).await.unwrap();
        assert!(path.exists());
        assert_eq!(db.url(), url);
    }
}
