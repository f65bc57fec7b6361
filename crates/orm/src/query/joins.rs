//! Query Builder JOIN operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    fn push_join(mut self, join_type: JoinType, table: &str, left: &str, op: &str, right: &str) -> Self {
        match QueryOperator::parse(op) {
            Some(operator) => self.joins.push(JoinClause {
                join_type,
                table: table.to_string(),
                left: left.to_string(),
                operator,
                right: right.to_string(),
            }),
            None => self.record_error(format!("Unknown join operator '{}' for table '{}'", op, table)),
        }
        self
    }

    /// Add INNER JOIN
    pub fn join(self, table: &str, left: &str, op: &str, right: &str) -> Self {
        self.push_join(JoinType::Inner, table, left, op, right)
    }

    /// Add LEFT JOIN
    pub fn left_join(self, table: &str, left: &str, op: &str, right: &str) -> Self {
        self.push_join(JoinType::Left, table, left, op, right)
    }

    /// Add RIGHT JOIN
    pub fn right_join(self, table: &str, left: &str, op: &str, right: &str) -> Self {
        self.push_join(JoinType::Right, table, left, op, right)
    }
}
