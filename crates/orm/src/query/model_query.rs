//! Entity-aware query: a [`QueryBuilder`] bound to a database context and
//! an entity definition, with the same fluent surface

use std::sync::Arc;

use super::builder::QueryBuilder;
use crate::backends::DatabaseValue;
use crate::database::Database;
use crate::model::{Entity, EntityDefinition};

pub struct Query<E: Entity> {
    pub(crate) db: Database,
    pub(crate) definition: Arc<EntityDefinition<E>>,
    pub(crate) builder: QueryBuilder,
    pub(crate) eager: Vec<String>,
}

impl<E: Entity> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            definition: Arc::clone(&self.definition),
            builder: self.builder.clone(),
            eager: self.eager.clone(),
        }
    }
}

impl<E: Entity> std::fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("entity", &E::type_name())
            .field("builder", &self.builder)
            .field("eager", &self.eager)
            .finish()
    }
}

impl<E: Entity> Query<E> {
    /// SELECT over `E`'s table, hiding soft-deleted rows when enabled
    pub fn new(db: &Database) -> Self {
        let definition = db.definition::<E>();
        let mut builder = QueryBuilder::table(definition.table()).with_dialect(db.dialect());
        if definition.uses_soft_deletes() {
            builder = builder.soft_deletes(definition.deleted_at_column_name());
        }
        Self {
            db: db.clone(),
            definition,
            builder,
            eager: Vec::new(),
        }
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn definition(&self) -> &EntityDefinition<E> {
        &self.definition
    }

    pub(crate) fn map_builder<F>(mut self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.builder = f(self.builder);
        self
    }

    /// Eager load named relations when the query runs
    pub fn with<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for relation in relations {
            let relation = relation.into();
            if !self.eager.contains(&relation) {
                self.eager.push(relation);
            }
        }
        self
    }

    pub fn with_trashed(self) -> Self {
        self.map_builder(QueryBuilder::with_trashed)
    }

    pub fn only_trashed(self) -> Self {
        self.map_builder(QueryBuilder::only_trashed)
    }

    pub fn without_trashed(self) -> Self {
        self.map_builder(QueryBuilder::without_trashed)
    }

    pub fn where_eq<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.map_builder(|b| b.where_eq(column, value))
    }

    pub fn where_op<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.map_builder(|b| b.where_op(column, op, value))
    }

    pub fn where_ne<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.map_builder(|b| b.where_ne(column, value))
    }

    pub fn where_gt<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.map_builder(|b| b.where_gt(column, value))
    }

    pub fn where_gte<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.map_builder(|b| b.where_gte(column, value))
    }

    pub fn where_lt<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.map_builder(|b| b.where_lt(column, value))
    }

    pub fn where_lte<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.map_builder(|b| b.where_lte(column, value))
    }

    pub fn or_where<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.map_builder(|b| b.or_where(column, op, value))
    }

    pub fn or_where_eq<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.map_builder(|b| b.or_where_eq(column, value))
    }

    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.map_builder(|b| b.where_like(column, pattern))
    }

    pub fn where_not_like(self, column: &str, pattern: &str) -> Self {
        self.map_builder(|b| b.where_not_like(column, pattern))
    }

    pub fn where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.map_builder(|b| b.where_in(column, values))
    }

    pub fn or_where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.map_builder(|b| b.or_where_in(column, values))
    }

    pub fn where_not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.map_builder(|b| b.where_not_in(column, values))
    }

    pub fn where_between<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.map_builder(|b| b.where_between(column, values))
    }

    pub fn where_not_between<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.map_builder(|b| b.where_not_between(column, values))
    }

    pub fn where_null(self, column: &str) -> Self {
        self.map_builder(|b| b.where_null(column))
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.map_builder(|b| b.where_not_null(column))
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.map_builder(|b| b.or_where_null(column))
    }

    pub fn where_date<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.map_builder(|b| b.where_date(column, op, value))
    }

    pub fn where_month<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.map_builder(|b| b.where_month(column, op, value))
    }

    pub fn where_year<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.map_builder(|b| b.where_year(column, op, value))
    }

    pub fn where_time<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.map_builder(|b| b.where_time(column, op, value))
    }

    pub fn where_raw(self, sql: &str, bindings: Vec<DatabaseValue>) -> Self {
        self.map_builder(|b| b.where_raw(sql, bindings))
    }

    pub fn or_where_raw(self, sql: &str, bindings: Vec<DatabaseValue>) -> Self {
        self.map_builder(|b| b.or_where_raw(sql, bindings))
    }

    pub fn select(self, fields: &str) -> Self {
        self.map_builder(|b| b.select(fields))
    }

    pub fn select_raw(self, expression: &str) -> Self {
        self.map_builder(|b| b.select_raw(expression))
    }

    pub fn distinct(self) -> Self {
        self.map_builder(QueryBuilder::distinct)
    }

    pub fn join(self, table: &str, left: &str, op: &str, right: &str) -> Self {
        self.map_builder(|b| b.join(table, left, op, right))
    }

    pub fn left_join(self, table: &str, left: &str, op: &str, right: &str) -> Self {
        self.map_builder(|b| b.left_join(table, left, op, right))
    }

    pub fn right_join(self, table: &str, left: &str, op: &str, right: &str) -> Self {
        self.map_builder(|b| b.right_join(table, left, op, right))
    }

    pub fn order_by(self, column: &str) -> Self {
        self.map_builder(|b| b.order_by(column))
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.map_builder(|b| b.order_by_desc(column))
    }

    pub fn order_by_dir(self, column: &str, direction: &str) -> Self {
        self.map_builder(|b| b.order_by_dir(column, direction))
    }

    /// Newest first by the created-at column
    pub fn latest(self) -> Self {
        let column = self.definition.created_at_column().to_string();
        self.map_builder(|b| b.latest(&column))
    }

    /// Oldest first by the created-at column
    pub fn oldest(self) -> Self {
        let column = self.definition.created_at_column().to_string();
        self.map_builder(|b| b.oldest(&column))
    }

    pub fn group_by(self, column: &str) -> Self {
        self.map_builder(|b| b.group_by(column))
    }

    pub fn having<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.map_builder(|b| b.having(column, op, value))
    }

    pub fn limit(self, count: u64) -> Self {
        self.map_builder(|b| b.limit(count))
    }

    pub fn offset(self, count: u64) -> Self {
        self.map_builder(|b| b.offset(count))
    }

    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        self.map_builder(|b| b.for_page(page, per_page))
    }

    /// Compiled SQL and parameters
    pub fn to_sql_with_params(&self) -> crate::error::OrmResult<(String, Vec<DatabaseValue>)> {
        self.builder.to_sql_with_params()
    }

    pub fn to_sql(&self) -> crate::error::OrmResult<String> {
        self.builder.to_sql()
    }

    /// Return raw rows instead of records
    pub fn as_array(self) -> ArrayQuery<E> {
        ArrayQuery { query: self }
    }
}

/// Query returning plain rows; casts, accessors and eager loads are skipped
pub struct ArrayQuery<E: Entity> {
    pub(crate) query: Query<E>,
}

impl<E: Entity> Clone for ArrayQuery<E> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
        }
    }
}

impl<E: Entity> std::fmt::Debug for ArrayQuery<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ArrayQuery").field(&self.query).finish()
    }
}
