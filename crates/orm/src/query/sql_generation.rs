//! SQL compilation
//!
//! Placeholders and their parameters are produced in the same pass, so the
//! parameter vector always lines up with the `?` marks in the text.

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::{DatabaseValue, SqlDialect};
use crate::error::{ModelError, OrmResult};

impl QueryBuilder {
    /// Compile to SQL text and the ordered parameter list
    pub fn to_sql_with_params(&self) -> OrmResult<(String, Vec<DatabaseValue>)> {
        if let Some(message) = self.errors.first() {
            return Err(ModelError::Usage(message.clone()));
        }
        if self.table.is_empty() {
            return Err(ModelError::usage("Query has no table"));
        }

        let mut sql = String::new();
        let mut params = Vec::new();

        match self.query_type {
            QueryType::Select => self.build_select(&mut sql, &mut params),
            QueryType::Insert => self.build_insert(&mut sql, &mut params),
            QueryType::Update => self.build_update(&mut sql, &mut params)?,
            QueryType::Delete => self.build_delete(&mut sql, &mut params),
        }

        Ok((sql, params))
    }

    /// Compile to SQL text only
    pub fn to_sql(&self) -> OrmResult<String> {
        self.to_sql_with_params().map(|(sql, _)| sql)
    }

    fn build_select(&self, sql: &mut String, params: &mut Vec<DatabaseValue>) {
        sql.push_str("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.select_fields.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select_fields.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.table);

        for join in &self.joins {
            sql.push_str(&format!(
                " {} {} ON {} {} {}",
                join.join_type, join.table, join.left, join.operator, join.right
            ));
        }

        self.build_where_clause(sql, params);

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.having_conditions.is_empty() {
            let fragments: Vec<String> = self
                .having_conditions
                .iter()
                .filter_map(|condition| self.compile_condition(condition, params))
                .collect();
            if !fragments.is_empty() {
                sql.push_str(" HAVING ");
                sql.push_str(&fragments.join(" AND "));
            }
        }

        self.build_order_limit_clause(sql);
    }

    fn build_insert(&self, sql: &mut String, params: &mut Vec<DatabaseValue>) {
        sql.push_str("INSERT INTO ");
        sql.push_str(&self.table);

        if self.insert_rows.is_empty() || self.insert_columns.is_empty() {
            sql.push_str(" DEFAULT VALUES");
            return;
        }

        sql.push_str(&format!(" ({}) VALUES ", self.insert_columns.join(", ")));
        let row_placeholder = format!("({})", vec!["?"; self.insert_columns.len()].join(", "));
        for (index, row) in self.insert_rows.iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&row_placeholder);
            params.extend(row.iter().cloned());
        }
    }

    fn build_update(&self, sql: &mut String, params: &mut Vec<DatabaseValue>) -> OrmResult<()> {
        if self.set_clauses.is_empty() {
            return Err(ModelError::usage(format!(
                "UPDATE on '{}' has no columns to set",
                self.table
            )));
        }

        sql.push_str("UPDATE ");
        sql.push_str(&self.table);
        sql.push_str(" SET ");
        let assignments: Vec<String> = self
            .set_clauses
            .iter()
            .map(|clause| {
                params.push(clause.value.clone());
                format!("{} = ?", clause.column)
            })
            .collect();
        sql.push_str(&assignments.join(", "));

        self.build_where_clause(sql, params);
        Ok(())
    }

    fn build_delete(&self, sql: &mut String, params: &mut Vec<DatabaseValue>) {
        sql.push_str("DELETE FROM ");
        sql.push_str(&self.table);
        self.build_where_clause(sql, params);
    }

    /// Soft-delete predicate first, then caller nodes in insertion order
    fn build_where_clause(&self, sql: &mut String, params: &mut Vec<DatabaseValue>) {
        let scope = self.soft_delete_predicate();

        let mut user: Vec<(Connective, String)> = Vec::new();
        for condition in &self.where_conditions {
            if let Some(fragment) = self.compile_condition(condition, params) {
                user.push((condition.connective, fragment));
            }
        }

        if scope.is_none() && user.is_empty() {
            return;
        }

        sql.push_str(" WHERE ");
        let mut user_sql = String::new();
        for (index, (connective, fragment)) in user.iter().enumerate() {
            if index > 0 {
                user_sql.push_str(&format!(" {} ", connective));
            }
            user_sql.push_str(fragment);
        }

        match scope {
            Some(scope) if user.is_empty() => sql.push_str(&scope),
            Some(scope) => {
                // OR nodes must not escape the soft-delete scope
                let has_or = user.iter().skip(1).any(|(c, _)| *c == Connective::Or);
                if has_or {
                    sql.push_str(&format!("{} AND ({})", scope, user_sql));
                } else {
                    sql.push_str(&format!("{} AND {}", scope, user_sql));
                }
            }
            None => sql.push_str(&user_sql),
        }
    }

    fn soft_delete_predicate(&self) -> Option<String> {
        let column = self.soft_delete_column.as_ref()?;
        let qualified = if self.joins.is_empty() {
            column.clone()
        } else {
            format!("{}.{}", self.table, column)
        };
        match self.trashed {
            TrashedScope::Exclude => Some(format!("{} IS NULL", qualified)),
            TrashedScope::Only => Some(format!("{} IS NOT NULL", qualified)),
            TrashedScope::Include => None,
        }
    }

    /// `None` when the node compiles to nothing (empty NOT IN)
    fn compile_condition(
        &self,
        condition: &WhereCondition,
        params: &mut Vec<DatabaseValue>,
    ) -> Option<String> {
        let column = &condition.column;
        match &condition.predicate {
            Predicate::Compare { operator, value } => {
                params.push(value.clone());
                Some(format!("{} {} ?", column, operator))
            }
            _ if condition.is_vacuous() => None,
            Predicate::In { values, .. } if values.is_empty() => {
                Some(format!("{} IN (NULL)", column))
            }
            Predicate::In { values, negated } => {
                params.extend(values.iter().cloned());
                let placeholders = vec!["?"; values.len()].join(", ");
                let keyword = if *negated { "NOT IN" } else { "IN" };
                Some(format!("{} {} ({})", column, keyword, placeholders))
            }
            Predicate::Between { values, negated } => {
                params.extend(values.iter().cloned());
                let keyword = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                Some(format!("{} {} ? AND ?", column, keyword))
            }
            Predicate::Null { negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                Some(format!("{} {}", column, keyword))
            }
            Predicate::DatePart {
                part,
                operator,
                value,
            } => {
                params.push(value.clone());
                Some(format!(
                    "{} {} ?",
                    self.dialect.date_part(*part, column),
                    operator
                ))
            }
            Predicate::Raw { sql, bindings } => {
                params.extend(bindings.iter().cloned());
                Some(sql.clone())
            }
        }
    }

    fn build_order_limit_clause(&self, sql: &mut String) {
        if !self.order_by.is_empty() {
            let parts: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }

        match (self.limit_count, self.offset_value) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite rejects OFFSET without LIMIT
            (None, Some(_)) if self.dialect == SqlDialect::Sqlite => sql.push_str(" LIMIT -1"),
            _ => {}
        }
        if let Some(offset) = self.offset_value {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
    }
}
