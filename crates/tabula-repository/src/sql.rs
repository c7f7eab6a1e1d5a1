//! SQL statement builders.
//!
//! Every function here is pure: it combines names taken from an
//! [`EntityDescriptor`] (or passed in by calling code) with `?`
//! placeholders, and returns the data values separately as parameters.

use crate::criteria::{Criteria, Limit};
use crate::metadata::EntityDescriptor;
use std::fmt;
use tabula_core::{require_non_empty, require_text, DaoError, DaoResult, SqlValue};

/// Value that selects `IS NULL` instead of an equality match in
/// [`select_by_field_paged`].
pub const NULL_SENTINEL: &str = "NULL";

/// SQL text plus its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A statement without parameters.
    #[must_use]
    pub fn text(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Aggregate functions supported by [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Min,
    Max,
}

impl Aggregate {
    const fn function(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

fn select_from<E>(descriptor: &EntityDescriptor<E>) -> String {
    format!(
        "SELECT {} FROM {}",
        descriptor.select_fields(),
        descriptor.table_name()
    )
}

fn join_clauses(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `SELECT … FROM t WHERE t_id = ?`
pub fn select_by_id<E>(descriptor: &EntityDescriptor<E>, id: SqlValue) -> Statement {
    Statement::new(
        format!(
            "{} WHERE {} = ?",
            select_from(descriptor),
            descriptor.id_column()
        ),
        vec![id],
    )
}

fn select_with<E>(descriptor: &EntityDescriptor<E>, criteria: &Criteria, limit: Option<Limit>) -> Statement {
    let select = select_from(descriptor);
    let where_sql = criteria.where_clause().to_sql();
    let order_sql = criteria.order_by_sql();
    let limit_sql = limit.map(|l| l.to_sql()).unwrap_or_default();
    let sql = join_clauses(&[
        select.as_str(),
        where_sql.as_str(),
        order_sql.as_str(),
        limit_sql.as_str(),
    ]);
    Statement::new(sql, criteria.where_clause().values())
}

/// `SELECT … FROM t <where> <order by> <limit>`; no conditions selects
/// every row.
pub fn select_criteria<E>(descriptor: &EntityDescriptor<E>, criteria: &Criteria) -> Statement {
    select_with(descriptor, criteria, criteria.get_limit())
}

/// Like [`select_criteria`] for a singular lookup: the limit defaults to
/// `LIMIT 0,1`.
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] when the limit asks for more than
/// one row.
pub fn select_single<E>(descriptor: &EntityDescriptor<E>, criteria: &Criteria) -> DaoResult<Statement> {
    let limit = match criteria.get_limit() {
        Some(limit) if limit.count > 1 => {
            return Err(DaoError::invalid_argument(format!(
                "a singular lookup cannot use a limit of {} rows",
                limit.count
            )))
        }
        Some(limit) => limit,
        None => Limit::first(),
    };
    Ok(select_with(descriptor, criteria, Some(limit)))
}

/// `SELECT … FROM t WHERE <text>`, with the condition text taken verbatim.
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] for blank condition text.
pub fn select_where_text<E>(descriptor: &EntityDescriptor<E>, where_text: &str) -> DaoResult<Statement> {
    let where_text = require_text(where_text, "where")?;
    Ok(Statement::text(format!(
        "{} WHERE {where_text}",
        select_from(descriptor)
    )))
}

/// [`select_where_text`] limited to one row.
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] for blank condition text.
pub fn find_where_text<E>(descriptor: &EntityDescriptor<E>, where_text: &str) -> DaoResult<Statement> {
    let mut statement = select_where_text(descriptor, where_text)?;
    statement.sql.push_str(" LIMIT 1");
    Ok(statement)
}

fn field_condition(field: &str, value: SqlValue, params: &mut Vec<SqlValue>) -> String {
    if value.is_null() || value.as_text() == Some(NULL_SENTINEL) {
        format!("{field} IS NULL")
    } else {
        params.push(value);
        format!("{field} = ?")
    }
}

/// `SELECT … FROM t WHERE f = ?`
///
/// The value is always bound, so the text `"NULL"` matches literally.
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] for a blank field name.
pub fn select_by_field<E>(descriptor: &EntityDescriptor<E>, field: &str, value: SqlValue) -> DaoResult<Statement> {
    let field = require_text(field, "field")?;
    Ok(Statement::new(
        format!("{} WHERE {field} = ?", select_from(descriptor)),
        vec![value],
    ))
}

/// `SELECT … FROM t WHERE f = ? ORDER BY o LIMIT page*count,count`.
///
/// The value `"NULL"` (or [`SqlValue::Null`]) selects `f IS NULL` and binds
/// nothing.
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] for a blank field or order column.
pub fn select_by_field_paged<E>(
    descriptor: &EntityDescriptor<E>,
    field: &str,
    value: SqlValue,
    order_by: &str,
    page: u32,
    count: u32,
) -> DaoResult<Statement> {
    let field = require_text(field, "field")?;
    let order_by = require_text(order_by, "order_by")?;
    let mut params = Vec::with_capacity(1);
    let condition = field_condition(field, value, &mut params);
    let limit = Limit::new(u64::from(page) * u64::from(count), u64::from(count));
    Ok(Statement::new(
        format!(
            "{} WHERE {condition} ORDER BY {order_by} {}",
            select_from(descriptor),
            limit.to_sql()
        ),
        params,
    ))
}

/// `SELECT … FROM t WHERE f1=? AND f2=?`
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] when either list is empty or the
/// lengths differ.
pub fn select_by_fields<E>(
    descriptor: &EntityDescriptor<E>,
    fields: &[&str],
    values: &[SqlValue],
) -> DaoResult<Statement> {
    require_non_empty(fields, "fields")?;
    require_non_empty(values, "values")?;
    if fields.len() != values.len() {
        return Err(DaoError::invalid_argument(format!(
            "{} fields were given with {} values",
            fields.len(),
            values.len()
        )));
    }
    let conditions = fields
        .iter()
        .map(|field| require_text(field, "field").map(|f| format!("{f}=?")))
        .collect::<DaoResult<Vec<_>>>()?
        .join(" AND ");
    Ok(Statement::new(
        format!("{} WHERE {conditions}", select_from(descriptor)),
        values.to_vec(),
    ))
}

/// `SELECT … FROM t WHERE t_id = ? OR t_id = ?`
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] for an empty id list.
pub fn select_by_ids<E>(descriptor: &EntityDescriptor<E>, ids: Vec<SqlValue>) -> DaoResult<Statement> {
    require_non_empty(&ids, "ids")?;
    let condition = vec![format!("{} = ?", descriptor.id_column()); ids.len()].join(" OR ");
    Ok(Statement::new(
        format!("{} WHERE {condition}", select_from(descriptor)),
        ids,
    ))
}

/// `INSERT [DELAYED] INTO t(a,b) VALUES (?,?)`
pub fn insert<E>(descriptor: &EntityDescriptor<E>, entity: &E, delayed: bool) -> Statement {
    let verb = if delayed { "INSERT DELAYED INTO" } else { "INSERT INTO" };
    Statement::new(
        format!(
            "{verb} {}({}) VALUES ({})",
            descriptor.table_name(),
            descriptor.insert_fields(),
            descriptor.insert_placeholders()
        ),
        descriptor.insert_values(entity),
    )
}

/// `UPDATE t SET b=?,c=? WHERE t_id = ?`
pub fn update<E>(descriptor: &EntityDescriptor<E>, entity: &E) -> Statement {
    Statement::new(
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            descriptor.table_name(),
            descriptor.update_set_clause(),
            descriptor.id_column()
        ),
        descriptor.update_values(entity),
    )
}

/// `DELETE FROM t WHERE t_id = ?`
pub fn delete_by_id<E>(descriptor: &EntityDescriptor<E>, id: SqlValue) -> Statement {
    Statement::new(
        format!(
            "DELETE FROM {} WHERE {} = ?",
            descriptor.table_name(),
            descriptor.id_column()
        ),
        vec![id],
    )
}

/// `UPDATE t SET f=f + n WHERE t_id = ?`
///
/// `field` is concatenated into the statement as given; only pass column
/// names from calling code.
///
/// # Errors
///
/// Returns [`DaoError::InvalidArgument`] for a blank field name.
pub fn increment<E>(descriptor: &EntityDescriptor<E>, field: &str, amount: i32, id: SqlValue) -> DaoResult<Statement> {
    let field = require_text(field, "field")?;
    let (op, magnitude) = if amount < 0 {
        ("-", amount.unsigned_abs())
    } else {
        ("+", amount.unsigned_abs())
    };
    Ok(Statement::new(
        format!(
            "UPDATE {} SET {field}={field} {op} {magnitude} WHERE {} = ?",
            descriptor.table_name(),
            descriptor.id_column()
        ),
        vec![id],
    ))
}

/// `SELECT COUNT(*) FROM t <where>`, or `MIN(f)` / `MAX(f)`.
///
/// A missing field aggregates over `*`.
pub fn aggregate<E>(
    descriptor: &EntityDescriptor<E>,
    function: Aggregate,
    field: Option<&str>,
    criteria: &Criteria,
) -> Statement {
    let target = field.filter(|f| !f.trim().is_empty()).unwrap_or("*");
    let select = format!(
        "SELECT {}({target}) FROM {}",
        function.function(),
        descriptor.table_name()
    );
    let where_sql = criteria.where_clause().to_sql();
    let sql = join_clauses(&[select.as_str(), where_sql.as_str()]);
    Statement::new(sql, criteria.where_clause().values())
}
