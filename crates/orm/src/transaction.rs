//! Transaction Management
//!
//! `Database::transaction` wraps a callback in BEGIN/COMMIT and rolls back
//! when the callback fails or panics. Nested calls become savepoints.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::database::Database;
use crate::error::{ModelError, ModelResult};

fn savepoint_name(level: usize) -> String {
    format!("sp_{}", level)
}

impl Database {
    /// Run `callback` inside a transaction.
    ///
    /// Commits when it returns `Ok`, rolls back and returns the error when it
    /// returns `Err`, rolls back and resumes unwinding when it panics.
    pub async fn transaction<F, Fut, T>(&self, callback: F) -> ModelResult<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = ModelResult<T>>,
    {
        self.begin_transaction().await?;

        let db = self.clone();
        let outcome = AssertUnwindSafe(async move { callback(db).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => {
                self.commit().await?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!("Rollback after failed transaction also failed: {}", rollback_err);
                }
                Err(err)
            }
            Err(panic) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!("Rollback after panic failed: {}", rollback_err);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Begin a transaction, or a savepoint when one is already open
    pub async fn begin_transaction(&self) -> ModelResult<()> {
        let level = self.transaction_depth().fetch_add(1, Ordering::SeqCst);

        let result = if level == 0 {
            debug!("Beginning transaction");
            self.port().begin_transaction().await
        } else {
            debug!("Creating savepoint {}", savepoint_name(level));
            self.statement(&format!("SAVEPOINT {}", savepoint_name(level)), &[])
                .await
                .map(|_| ())
        };

        if result.is_err() {
            self.transaction_depth().fetch_sub(1, Ordering::SeqCst);
        }
        result
    }

    /// Commit the innermost open transaction or savepoint. A failed
    /// commit is rolled back, so the level is closed either way.
    pub async fn commit(&self) -> ModelResult<()> {
        let level = self.close_level()?;

        let result = if level == 0 {
            debug!("Committing transaction");
            self.port().commit().await
        } else {
            debug!("Releasing savepoint {}", savepoint_name(level));
            self.statement(&format!("RELEASE SAVEPOINT {}", savepoint_name(level)), &[])
                .await
                .map(|_| ())
        };

        if let Err(err) = result {
            warn!("Commit at level {} failed, rolling back: {}", level, err);
            if let Err(rollback_err) = self.rollback_level(level).await {
                warn!("Rollback after failed commit also failed: {}", rollback_err);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Roll back the innermost open transaction or savepoint
    pub async fn rollback(&self) -> ModelResult<()> {
        let level = self.close_level()?;
        self.rollback_level(level).await
    }

    async fn rollback_level(&self, level: usize) -> ModelResult<()> {
        if level == 0 {
            debug!("Rolling back transaction");
            return self.port().rollback().await;
        }

        let name = savepoint_name(level);
        debug!("Rolling back to savepoint {}", name);
        let rolled_back = self
            .statement(&format!("ROLLBACK TO SAVEPOINT {}", name), &[])
            .await
            .map(|_| ());
        // the savepoint is popped even when ROLLBACK TO failed
        let released = self
            .statement(&format!("RELEASE SAVEPOINT {}", name), &[])
            .await
            .map(|_| ());
        rolled_back.and(released)
    }

    /// Number of open transactions, counting savepoints
    pub fn transaction_level(&self) -> usize {
        self.transaction_depth().load(Ordering::SeqCst)
    }

    /// Pop one nesting level and return the level being closed (0 = outermost)
    fn close_level(&self) -> ModelResult<usize> {
        self.transaction_depth()
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| depth.checked_sub(1))
            .map(|previous| previous - 1)
            .map_err(|_| ModelError::Transaction("No active transaction".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DatabaseValue;

    async fn setup() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.statement("CREATE TABLE t (v INTEGER)", &[]).await.unwrap();
        db
    }

    async fn count(db: &Database) -> i64 {
        let rows = db.select("SELECT COUNT(*) AS n FROM t", &[]).await.unwrap();
        rows[0]["n"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let db = setup().await;
        let value = db
            .transaction(|tx| async move {
                tx.statement("INSERT INTO t (v) VALUES (?)", &[DatabaseValue::Int64(1)])
                    .await?;
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(count(&db).await, 1);
        assert_eq!(db.transaction_level(), 0);
    }

    #[tokio::test]
    async fn test_rollback_on_error() {
        let db = setup().await;
        let result: ModelResult<()> = db
            .transaction(|tx| async move {
                tx.statement("INSERT INTO t (v) VALUES (1)", &[]).await?;
                Err(ModelError::usage("abort"))
            })
            .await;
        assert!(matches!(result, Err(ModelError::Usage(_))));
        assert_eq!(count(&db).await, 0);
        assert_eq!(db.transaction_level(), 0);
    }

    #[tokio::test]
    async fn test_nested_savepoint_rollback_keeps_outer_work() {
        let db = setup().await;
        db.transaction(|outer| async move {
            outer.statement("INSERT INTO t (v) VALUES (1)", &[]).await?;
            let inner: ModelResult<()> = outer
                .transaction(|inner| async move {
                    inner.statement("INSERT INTO t (v) VALUES (2)", &[]).await?;
                    Err(ModelError::usage("inner failure"))
                })
                .await;
            assert!(inner.is_err());
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let db = setup().await;
        db.statement("PRAGMA foreign_keys = ON", &[]).await.unwrap();
        db.statement("CREATE TABLE parent (id INTEGER PRIMARY KEY)", &[])
            .await
            .unwrap();
        db.statement(
            "CREATE TABLE child (parent_id INTEGER REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED)",
            &[],
        )
        .await
        .unwrap();

        let result: ModelResult<()> = db
            .transaction(|tx| async move {
                tx.statement("INSERT INTO t (v) VALUES (1)", &[]).await?;
                tx.statement("INSERT INTO child (parent_id) VALUES (99)", &[])
                    .await?;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ModelError::Query { .. })));
        assert_eq!(db.transaction_level(), 0);
        assert_eq!(count(&db).await, 0);

        // the connection is usable for a new transaction
        db.transaction(|tx| async move {
            tx.statement("INSERT INTO t (v) VALUES (2)", &[]).await?;
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_commit_without_transaction_fails() {
        let db = setup().await;
        assert!(matches!(db.commit().await, Err(ModelError::Transaction(_))));
        assert!(matches!(db.rollback().await, Err(ModelError::Transaction(_))));
    }

    #[tokio::test]
    async fn test_manual_begin_and_rollback() {
        let db = setup().await;
        db.begin_transaction().await.unwrap();
        db.statement("INSERT INTO t (v) VALUES (3)", &[]).await.unwrap();
        assert_eq!(db.transaction_level(), 1);
        db.rollback().await.unwrap();
        assert_eq!(count(&db).await, 0);
    }
}
