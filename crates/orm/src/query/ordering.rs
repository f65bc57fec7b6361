//! Query Builder ORDER BY, GROUP BY, HAVING operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::DatabaseValue;

impl QueryBuilder {
    /// Add ORDER BY clause (ascending)
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Asc));
        self
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Desc));
        self
    }

    /// Add ORDER BY clause with a direction string ("asc" / "desc")
    pub fn order_by_dir(mut self, column: &str, direction: &str) -> Self {
        self.order_by
            .push((column.to_string(), OrderDirection::parse(direction)));
        self
    }

    /// Newest first on `column`
    pub fn latest(self, column: &str) -> Self {
        self.order_by_desc(column)
    }

    /// Oldest first on `column`
    pub fn oldest(self, column: &str) -> Self {
        self.order_by(column)
    }

    pub fn has_ordering(&self) -> bool {
        !self.order_by.is_empty()
    }

    /// Add GROUP BY clause
    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by.push(column.to_string());
        self
    }

    /// Add HAVING clause; nodes are joined with AND
    pub fn having<T: Into<DatabaseValue>>(mut self, column: &str, op: &str, value: T) -> Self {
        match QueryOperator::parse(op) {
            Some(operator) => self.having_conditions.push(WhereCondition {
                connective: Connective::And,
                column: column.to_string(),
                predicate: Predicate::Compare {
                    operator,
                    value: value.into(),
                },
            }),
            None => self.record_error(format!("Unknown operator '{}' in HAVING on '{}'", op, column)),
        }
        self
    }

    /// Drop ORDER BY, LIMIT and OFFSET, as needed for aggregates
    pub(crate) fn without_ordering(mut self) -> Self {
        self.order_by.clear();
        self.limit_count = None;
        self.offset_value = None;
        self
    }
}
