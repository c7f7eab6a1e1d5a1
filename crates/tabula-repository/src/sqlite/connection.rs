//! [`Connection`] over an SQLx SQLite pool.

use crate::connection::{Connection, RawRow};
use crate::pool::DatabasePool;
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::sync::Arc;
use tabula_core::{ConnectionResult, SqlValue};
use tracing::trace;

/// Runs DAO statements on a shared [`DatabasePool`].
#[derive(Debug, Clone)]
pub struct SqlxConnection {
    pool: Arc<DatabasePool>,
}

impl SqlxConnection {
    #[must_use]
    pub fn new(pool: Arc<DatabasePool>) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<DatabasePool> {
        &self.pool
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Long(l) => query.bind(*l),
            SqlValue::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

/// Converts a row by the storage class of each value.
fn to_raw_row(row: &SqliteRow) -> ConnectionResult<RawRow> {
    let mut raw = RawRow::new();
    for column in row.columns() {
        let index = column.ordinal();
        let value = row.try_get_raw(index)?;
        let cell = if value.is_null() {
            SqlValue::Null
        } else {
            let storage = value.type_info().name().to_ascii_uppercase();
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" | "INT" | "BIGINT" | "INT8" => {
                    SqlValue::Long(row.try_get_unchecked::<i64, _>(index)?)
                }
                "REAL" | "NUMERIC" | "FLOAT" | "DOUBLE" => {
                    SqlValue::Text(row.try_get_unchecked::<f64, _>(index)?.to_string())
                }
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                    SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
            }
        };
        raw.push(column.name(), cell);
    }
    Ok(raw)
}

#[async_trait]
impl Connection for SqlxConnection {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> ConnectionResult<u64> {
        let result = bind_params(sqlx::query(sql), params)
            .execute(self.pool.inner())
            .await?;
        trace!(rows_affected = result.rows_affected(), "Statement executed");
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> ConnectionResult<Vec<RawRow>> {
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(self.pool.inner())
            .await?;
        trace!(rows = rows.len(), "Query returned");
        rows.iter().map(to_raw_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_config::DatabaseConfig;

    async fn connection() -> SqlxConnection {
        let pool = DatabasePool::new(&DatabaseConfig::in_memory()).await.unwrap();
        SqlxConnection::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn test_storage_classes() {
        let conn = connection().await;
        conn.execute(
            "CREATE TABLE sample (i INTEGER, r REAL, t TEXT, b BLOB, n TEXT)",
            &[],
        )
        .await
        .unwrap();
        let inserted = conn
            .execute(
                "INSERT INTO sample (i, r, t, b, n) VALUES (?, 1.5, ?, x'6869', ?)",
                &[SqlValue::Long(42), SqlValue::from("hello"), SqlValue::Null],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let rows = conn.query("SELECT i, r, t, b, n FROM sample", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("i"), Some(&SqlValue::Long(42)));
        assert_eq!(row.get("r"), Some(&SqlValue::from("1.5")));
        assert_eq!(row.get("t"), Some(&SqlValue::from("hello")));
        assert_eq!(row.get("b"), Some(&SqlValue::from("hi")));
        assert_eq!(row.get("n"), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn test_bool_binds_as_integer() {
        let conn = connection().await;
        conn.execute("CREATE TABLE flags (f BOOLEAN)", &[]).await.unwrap();
        conn.execute("INSERT INTO flags (f) VALUES (?)", &[SqlValue::Bool(true)])
            .await
            .unwrap();
        let value = conn.query_scalar_long("SELECT f FROM flags", &[]).await.unwrap();
        assert_eq!(value, Some(1));
    }

    #[tokio::test]
    async fn test_sql_error_surfaces() {
        let conn = connection().await;
        assert!(conn.query("SELECT * FROM missing_table", &[]).await.is_err());
        assert!(!conn.supports_delayed_insert());
    }
}
