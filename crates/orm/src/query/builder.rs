//! Query Builder - Core builder implementation

use super::types::*;
use crate::backends::{DatabaseValue, SqlDialect};

/// Accumulates clause state and compiles it to SQL with `?` placeholders.
///
/// Fluent methods consume and return the builder; clone it to branch.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    pub(crate) query_type: QueryType,
    pub(crate) table: String,
    pub(crate) select_fields: Vec<String>,
    pub(crate) distinct: bool,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) where_conditions: Vec<WhereCondition>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having_conditions: Vec<WhereCondition>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit_count: Option<u64>,
    pub(crate) offset_value: Option<u64>,
    pub(crate) set_clauses: Vec<SetClause>,
    pub(crate) insert_columns: Vec<String>,
    pub(crate) insert_rows: Vec<Vec<DatabaseValue>>,
    pub(crate) soft_delete_column: Option<String>,
    pub(crate) trashed: TrashedScope,
    pub(crate) dialect: SqlDialect,
    /// Misuse detected while chaining, reported when the query is compiled
    pub(crate) errors: Vec<String>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self {
            query_type: QueryType::Select,
            table: String::new(),
            select_fields: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            where_conditions: Vec::new(),
            group_by: Vec::new(),
            having_conditions: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
            set_clauses: Vec::new(),
            insert_columns: Vec::new(),
            insert_rows: Vec::new(),
            soft_delete_column: None,
            trashed: TrashedScope::Exclude,
            dialect: SqlDialect::default(),
            errors: Vec::new(),
        }
    }

    /// Start a SELECT against `table`
    pub fn table(table: &str) -> Self {
        Self::new().from(table)
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Enable soft-delete scoping on `column`
    pub fn soft_deletes(mut self, column: &str) -> Self {
        self.soft_delete_column = Some(column.to_string());
        self
    }

    pub fn with_trashed(mut self) -> Self {
        self.trashed = TrashedScope::Include;
        self
    }

    pub fn only_trashed(mut self) -> Self {
        self.trashed = TrashedScope::Only;
        self
    }

    pub fn without_trashed(mut self) -> Self {
        self.trashed = TrashedScope::Exclude;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn trashed_scope(&self) -> TrashedScope {
        self.trashed
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// True when at least one caller-supplied WHERE node compiles to SQL
    pub fn has_conditions(&self) -> bool {
        self.where_conditions
            .iter()
            .any(|condition| !condition.is_vacuous())
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.errors.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_branch_independently() {
        let base = QueryBuilder::table("users").where_eq("active", true);
        let a = base.clone().where_eq("role", "admin");
        let b = base.clone().limit(5);

        assert_eq!(base.where_conditions.len(), 1);
        assert_eq!(a.where_conditions.len(), 2);
        assert_eq!(b.where_conditions.len(), 1);
        assert_eq!(b.limit_count, Some(5));
    }

    #[test]
    fn test_trashed_scope_last_call_wins() {
        let q = QueryBuilder::table("posts")
            .soft_deletes("deleted_at")
            .with_trashed()
            .only_trashed();
        assert_eq!(q.trashed_scope(), TrashedScope::Only);
        assert_eq!(q.without_trashed().trashed_scope(), TrashedScope::Exclude);
    }
}
