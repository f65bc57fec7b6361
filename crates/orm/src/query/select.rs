//! Query Builder SELECT operations

use super::builder::QueryBuilder;
use super::types::QueryType;

impl QueryBuilder {
    /// Add SELECT fields; a comma separated list is split into columns
    pub fn select(mut self, fields: &str) -> Self {
        self.query_type = QueryType::Select;
        self.select_fields.extend(
            fields
                .split(',')
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(str::to_string),
        );
        self
    }

    /// Add a single select expression verbatim
    pub fn select_raw(mut self, expression: &str) -> Self {
        self.query_type = QueryType::Select;
        self.select_fields.push(expression.to_string());
        self
    }

    /// Set the FROM table
    pub fn from(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Replace the select list
    pub(crate) fn reselect(mut self, expression: &str) -> Self {
        self.select_fields = vec![expression.to_string()];
        self
    }
}
