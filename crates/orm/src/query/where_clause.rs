//! Query Builder WHERE clause operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::DatabaseValue;

impl QueryBuilder {
    fn push_where(mut self, connective: Connective, column: &str, predicate: Predicate) -> Self {
        self.where_conditions.push(WhereCondition {
            connective,
            column: column.to_string(),
            predicate,
        });
        self
    }

    fn push_compare<T: Into<DatabaseValue>>(
        mut self,
        connective: Connective,
        column: &str,
        op: &str,
        value: T,
    ) -> Self {
        match QueryOperator::parse(op) {
            Some(operator) => self.push_where(
                connective,
                column,
                Predicate::Compare {
                    operator,
                    value: value.into(),
                },
            ),
            None => {
                self.record_error(format!("Unknown operator '{}' on column '{}'", op, column));
                self
            }
        }
    }

    fn push_between<I, T>(mut self, column: &str, values: I, negated: bool) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        let values: Vec<DatabaseValue> = values.into_iter().map(Into::into).collect();
        if values.len() != 2 {
            self.record_error(format!(
                "BETWEEN on column '{}' needs exactly 2 values, got {}",
                column,
                values.len()
            ));
            return self;
        }
        self.push_where(Connective::And, column, Predicate::Between { values, negated })
    }

    fn push_date_part<T: Into<DatabaseValue>>(
        mut self,
        part: DatePart,
        column: &str,
        op: &str,
        value: T,
    ) -> Self {
        match QueryOperator::parse(op) {
            Some(operator) => self.push_where(
                Connective::And,
                column,
                Predicate::DatePart {
                    part,
                    operator,
                    value: value.into(),
                },
            ),
            None => {
                self.record_error(format!("Unknown operator '{}' on column '{}'", op, column));
                self
            }
        }
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push_compare(Connective::And, column, "=", value)
    }

    /// Add WHERE condition with an explicit operator (`=`, `!=`, `<>`, `<`, `>`, `<=`, `>=`, `LIKE`, `NOT LIKE`)
    pub fn where_op<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.push_compare(Connective::And, column, op, value)
    }

    pub fn where_ne<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push_compare(Connective::And, column, "!=", value)
    }

    pub fn where_gt<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push_compare(Connective::And, column, ">", value)
    }

    pub fn where_gte<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push_compare(Connective::And, column, ">=", value)
    }

    pub fn where_lt<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push_compare(Connective::And, column, "<", value)
    }

    pub fn where_lte<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push_compare(Connective::And, column, "<=", value)
    }

    /// OR-connected comparison
    pub fn or_where<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.push_compare(Connective::Or, column, op, value)
    }

    pub fn or_where_eq<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.push_compare(Connective::Or, column, "=", value)
    }

    /// Add WHERE condition with LIKE
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.push_compare(Connective::And, column, "LIKE", pattern)
    }

    pub fn where_not_like(self, column: &str, pattern: &str) -> Self {
        self.push_compare(Connective::And, column, "NOT LIKE", pattern)
    }

    /// `column IN (...)`. An empty list matches nothing.
    pub fn where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where(Connective::And, column, Predicate::In { values, negated: false })
    }

    pub fn or_where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where(Connective::Or, column, Predicate::In { values, negated: false })
    }

    /// `column NOT IN (...)`. An empty list drops the predicate.
    pub fn where_not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where(Connective::And, column, Predicate::In { values, negated: true })
    }

    /// Inclusive range; anything other than two values is a usage error
    pub fn where_between<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.push_between(column, values, false)
    }

    pub fn where_not_between<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.push_between(column, values, true)
    }

    pub fn where_null(self, column: &str) -> Self {
        self.push_where(Connective::And, column, Predicate::Null { negated: false })
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.push_where(Connective::And, column, Predicate::Null { negated: true })
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.push_where(Connective::Or, column, Predicate::Null { negated: false })
    }

    pub fn where_date<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.push_date_part(DatePart::Date, column, op, value)
    }

    pub fn where_month<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.push_date_part(DatePart::Month, column, op, value)
    }

    pub fn where_year<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.push_date_part(DatePart::Year, column, op, value)
    }

    pub fn where_time<T: Into<DatabaseValue>>(self, column: &str, op: &str, value: T) -> Self {
        self.push_date_part(DatePart::Time, column, op, value)
    }

    /// Raw SQL fragment with its own `?` bindings
    pub fn where_raw(self, sql: &str, bindings: Vec<DatabaseValue>) -> Self {
        self.push_where(
            Connective::And,
            "",
            Predicate::Raw {
                sql: sql.to_string(),
                bindings,
            },
        )
    }

    pub fn or_where_raw(self, sql: &str, bindings: Vec<DatabaseValue>) -> Self {
        self.push_where(
            Connective::Or,
            "",
            Predicate::Raw {
                sql: sql.to_string(),
                bindings,
            },
        )
    }
}
