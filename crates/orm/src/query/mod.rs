//! Query Builder Module - fluent SELECT/INSERT/UPDATE/DELETE construction
//! and execution
//!
//! [`QueryBuilder`] compiles to parameterized SQL without touching a
//! database. [`Query`] binds a builder to a [`crate::Database`] and an
//! entity, adding soft-delete scoping, eager loading and terminals such as
//! `get`, `count` and `paginate`.

pub mod builder;
pub mod dml;
pub mod execution;
pub mod joins;
pub mod model_query;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use model_query::{ArrayQuery, Query};
pub use pagination::{PageMeta, Paginator};
pub use types::{
    Connective, DatePart, JoinClause, JoinType, OrderDirection, Predicate, QueryOperator,
    QueryType, SetClause, TrashedScope, WhereCondition,
};
