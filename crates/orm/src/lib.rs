//! # strata-orm: Active Record models over a fluent query builder
//!
//! Entities describe tables once through an [`EntityDefinition`]; rows come
//! back as [`Record`]s that track dirty attributes, apply casts and
//! accessors, fire lifecycle observers and persist themselves. Queries are
//! built with [`QueryBuilder`] (plain SQL compilation) or [`Query`] (bound
//! to an entity and a [`Database`]), with soft deletes, pagination,
//! aggregates and batched eager loading of relations.
//!
//! ```ignore
//! let db = Database::connect(DatabaseConfig::from_env()).await?;
//! let mut user = User::create(&db, [("name", "Ann"), ("email", "ann@example.com")]).await?;
//! user.set("name", "Ann2");
//! user.save(&db).await?;
//!
//! let recent = User::query(&db)
//!     .where_gt("age", 18)
//!     .with(["posts"])
//!     .latest()
//!     .paginate(15, 1)
//!     .await?;
//! ```

pub mod backends;
pub mod collection;
pub mod config;
pub mod database;
pub mod error;
pub mod event_error;
pub mod events;
pub mod model;
pub mod observers;
pub mod query;
pub mod relationships;
pub mod transaction;

// Re-export core traits and types
pub use backends::{
    DatabaseValue, DbPort, ExecuteResult, QueryResult, Row, SqlDialect, SqliteBackend,
};
pub use collection::{Collection, CollectionKey, Exportable};
pub use config::DatabaseConfig;
pub use database::{Database, LoggedQuery};
pub use error::{ModelError, ModelResult, OrmError, OrmResult};
pub use event_error::EventError;
pub use events::{LifecycleEvent, ModelObserver};
pub use model::{
    CastType, CrudOperations, Entity, EntityDefinition, MassAssignmentGuard, Record, Rule,
    ValidationErrors,
};
pub use observers::ObserverRegistry;
pub use query::{ArrayQuery, OrderDirection, PageMeta, Paginator, Query, QueryBuilder, QueryOperator};
pub use relationships::{Relation, RelationKind, RelationValue};
