//! Query Builder Types - Core types and enums for query building

use std::fmt;

use crate::backends::DatabaseValue;

/// Comparison operators accepted by `where_op` / `having`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    NotEqualAlt,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotLike,
}

impl QueryOperator {
    /// Parse an operator string; `None` for anything unsupported
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim().to_ascii_uppercase().as_str() {
            "=" => Some(QueryOperator::Equal),
            "!=" => Some(QueryOperator::NotEqual),
            "<>" => Some(QueryOperator::NotEqualAlt),
            ">" => Some(QueryOperator::GreaterThan),
            ">=" => Some(QueryOperator::GreaterThanOrEqual),
            "<" => Some(QueryOperator::LessThan),
            "<=" => Some(QueryOperator::LessThanOrEqual),
            "LIKE" => Some(QueryOperator::Like),
            "NOT LIKE" => Some(QueryOperator::NotLike),
            _ => None,
        }
    }
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::NotEqualAlt => write!(f, "<>"),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::Like => write!(f, "LIKE"),
            QueryOperator::NotLike => write!(f, "NOT LIKE"),
        }
    }
}

/// How a where node attaches to the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connective::And => write!(f, "AND"),
            Connective::Or => write!(f, "OR"),
        }
    }
}

/// Date component extracted by `where_date` and friends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Date,
    Month,
    Year,
    Time,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        operator: QueryOperator,
        value: DatabaseValue,
    },
    In {
        values: Vec<DatabaseValue>,
        negated: bool,
    },
    Between {
        values: Vec<DatabaseValue>,
        negated: bool,
    },
    Null {
        negated: bool,
    },
    DatePart {
        part: DatePart,
        operator: QueryOperator,
        value: DatabaseValue,
    },
    Raw {
        sql: String,
        bindings: Vec<DatabaseValue>,
    },
}

/// Where clause condition
#[derive(Debug, Clone, PartialEq)]
pub struct WhereCondition {
    pub connective: Connective,
    /// Empty for raw fragments
    pub column: String,
    pub predicate: Predicate,
}

impl WhereCondition {
    /// An empty NOT IN matches every row and emits no SQL
    pub fn is_vacuous(&self) -> bool {
        matches!(
            &self.predicate,
            Predicate::In { values, negated: true } if values.is_empty()
        )
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
            JoinType::Right => write!(f, "RIGHT JOIN"),
        }
    }
}

/// Join clause
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub left: String,
    pub operator: QueryOperator,
    pub right: String,
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn parse(direction: &str) -> Self {
        if direction.trim().eq_ignore_ascii_case("desc") {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Query types supported by the builder
#[derive(Debug, Clone, PartialEq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
}

/// Set clause for UPDATE operations
#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub column: String,
    pub value: DatabaseValue,
}

/// Visibility of soft-deleted rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashedScope {
    /// Hide rows whose soft-delete column is set
    #[default]
    Exclude,
    /// Show every row
    Include,
    /// Show only soft-deleted rows
    Only,
}
