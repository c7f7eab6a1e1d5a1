//! Query criteria value objects.
//!
//! These render SQL fragments from column names chosen by calling code and
//! keep every data value as a bound parameter.

use std::fmt;
use tabula_core::SqlValue;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Condition {
    sql: String,
    value: Option<SqlValue>,
}

/// A conjunction of simple conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Where {
    conditions: Vec<Condition>,
}

impl Where {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn compare(mut self, column: &str, op: &str, value: impl Into<SqlValue>) -> Self {
        self.conditions.push(Condition {
            sql: format!("{column} {op} ?"),
            value: Some(value.into()),
        });
        self
    }

    /// `column = ?`
    #[must_use]
    pub fn eq(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, "=", value)
    }

    /// `column <> ?`
    #[must_use]
    pub fn ne(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, "<>", value)
    }

    #[must_use]
    pub fn gt(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, ">", value)
    }

    #[must_use]
    pub fn ge(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, ">=", value)
    }

    #[must_use]
    pub fn lt(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, "<", value)
    }

    #[must_use]
    pub fn le(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, "<=", value)
    }

    /// `column LIKE ?`
    #[must_use]
    pub fn like(self, column: &str, pattern: impl Into<SqlValue>) -> Self {
        self.compare(column, "LIKE", pattern)
    }

    #[must_use]
    pub fn is_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition {
            sql: format!("{column} IS NULL"),
            value: None,
        });
        self
    }

    #[must_use]
    pub fn is_not_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition {
            sql: format!("{column} IS NOT NULL"),
            value: None,
        });
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// `WHERE a = ? AND b IS NULL`, or an empty string without conditions.
    #[must_use]
    pub fn to_sql(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let joined = self
            .conditions
            .iter()
            .map(|c| c.sql.as_str())
            .collect::<Vec<_>>()
            .join(" AND ");
        format!("WHERE {joined}")
    }

    /// Bound values, in placeholder order.
    #[must_use]
    pub fn values(&self) -> Vec<SqlValue> {
        self.conditions.iter().filter_map(|c| c.value.clone()).collect()
    }
}

/// Row window: `LIMIT offset,count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub offset: u64,
    pub count: u64,
}

impl Limit {
    #[must_use]
    pub const fn new(offset: u64, count: u64) -> Self {
        Self { offset, count }
    }

    /// The first row only.
    #[must_use]
    pub const fn first() -> Self {
        Self::new(0, 1)
    }

    #[must_use]
    pub fn to_sql(&self) -> String {
        format!("LIMIT {},{}", self.offset, self.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

/// One sort term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub order: Order,
}

impl OrderBy {
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: Order::Asc,
        }
    }

    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: Order::Desc,
        }
    }

    #[must_use]
    pub fn to_sql(&self) -> String {
        format!("{} {}", self.column, self.order)
    }
}

/// Where clause, sort order and row window of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    where_clause: Where,
    order_by: Vec<OrderBy>,
    limit: Option<Limit>,
}

impl Criteria {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_where(where_clause: Where) -> Self {
        Self {
            where_clause,
            ..Self::default()
        }
    }

    /// Adds an equality condition.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.where_clause = self.where_clause.eq(column, value);
        self
    }

    #[must_use]
    pub fn filter(mut self, where_clause: Where) -> Self {
        self.where_clause = where_clause;
        self
    }

    #[must_use]
    pub fn order_by(mut self, term: OrderBy) -> Self {
        self.order_by.push(term);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the row window from a page number and page size.
    #[must_use]
    pub fn page(self, page: u64, size: u64) -> Self {
        self.limit(Limit::new(page.saturating_mul(size), size))
    }

    #[must_use]
    pub const fn where_clause(&self) -> &Where {
        &self.where_clause
    }

    #[must_use]
    pub const fn get_limit(&self) -> Option<Limit> {
        self.limit
    }

    #[must_use]
    pub fn order_terms(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// `ORDER BY a ASC, b DESC`, or an empty string.
    #[must_use]
    pub fn order_by_sql(&self) -> String {
        if self.order_by.is_empty() {
            return String::new();
        }
        let terms = self
            .order_by
            .iter()
            .map(OrderBy::to_sql)
            .collect::<Vec<_>>()
            .join(", ");
        format!("ORDER BY {terms}")
    }
}

impl From<Where> for Criteria {
    fn from(where_clause: Where) -> Self {
        Self::from_where(where_clause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_where_renders_nothing() {
        let clause = Where::new();
        assert!(clause.is_empty());
        assert_eq!(clause.to_sql(), "");
        assert!(clause.values().is_empty());
    }

    #[test]
    fn test_where_conjunction() {
        let clause = Where::new().eq("name", "Foo").is_null("deleted").gt("qty", 3);
        assert_eq!(clause.to_sql(), "WHERE name = ? AND deleted IS NULL AND qty > ?");
        assert_eq!(clause.values(), vec![SqlValue::from("Foo"), SqlValue::Int(3)]);
    }

    #[test]
    fn test_limit_and_order() {
        let criteria = Criteria::new()
            .order_by(OrderBy::desc("created"))
            .order_by(OrderBy::asc("name"))
            .page(2, 25);
        assert_eq!(criteria.order_by_sql(), "ORDER BY created DESC, name ASC");
        assert_eq!(criteria.get_limit(), Some(Limit::new(50, 25)));
        assert_eq!(Limit::first().to_sql(), "LIMIT 0,1");
    }
}
