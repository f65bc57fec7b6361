//! Query Builder DML operations (INSERT, UPDATE, DELETE)

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::DatabaseValue;

impl QueryBuilder {
    /// Start INSERT INTO `table`
    pub fn insert_into(mut self, table: &str) -> Self {
        self.query_type = QueryType::Insert;
        self.table = table.to_string();
        self
    }

    /// Start UPDATE on `table`
    pub fn update(mut self, table: &str) -> Self {
        self.query_type = QueryType::Update;
        self.table = table.to_string();
        self
    }

    /// Start DELETE FROM `table`
    pub fn delete_from(mut self, table: &str) -> Self {
        self.query_type = QueryType::Delete;
        self.table = table.to_string();
        self
    }

    /// Turn the current query into an UPDATE of its own table, keeping the filters
    pub(crate) fn into_update(mut self) -> Self {
        self.query_type = QueryType::Update;
        self
    }

    /// Turn the current query into a DELETE of its own table, keeping the filters
    pub(crate) fn into_delete(mut self) -> Self {
        self.query_type = QueryType::Delete;
        self
    }

    /// Add SET clause for UPDATE
    pub fn set<T: Into<DatabaseValue>>(mut self, column: &str, value: T) -> Self {
        self.set_clauses.push(SetClause {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Add several SET clauses in order
    pub fn set_values<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (String, DatabaseValue)>,
    {
        self.set_clauses.extend(
            values
                .into_iter()
                .map(|(column, value)| SetClause { column, value }),
        );
        self
    }

    /// Add one row for INSERT; the first row fixes the column list
    pub fn values<I>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = (String, DatabaseValue)>,
    {
        let (columns, values): (Vec<String>, Vec<DatabaseValue>) = row.into_iter().unzip();
        if self.insert_rows.is_empty() {
            self.insert_columns = columns;
        } else if columns != self.insert_columns {
            self.record_error(format!(
                "Insert row {} has columns {:?}, expected {:?}",
                self.insert_rows.len() + 1,
                columns,
                self.insert_columns
            ));
            return self;
        }
        self.insert_rows.push(values);
        self
    }
}
