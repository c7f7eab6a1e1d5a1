//! Common test infrastructure for database integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, Once};
use tabula_config::DatabaseConfig;
use tabula_core::telemetry::init_tracing;
use tabula_core::{ConnectionResult, SqlValue, TelemetryConfig};
use tabula_repository::{
    set_table_name, Cell, ColumnKind, Connection, DatabasePool, Entity, Field, FieldType,
    IdentifiableEnum, MappingProblem, RawRow, SqlxConnection, Statement, TypeShape,
};

const SCHEMA: &str = include_str!("schema.sql");

/// Private in-memory SQLite database with the test schema applied.
pub struct TestDatabase {
    pool: Arc<DatabasePool>,
}

impl TestDatabase {
    pub async fn new() -> Self {
        register_tables();

        let pool = DatabasePool::new(&DatabaseConfig::in_memory())
            .await
            .expect("Failed to open in-memory database");
        sqlx::raw_sql(SCHEMA)
            .execute(pool.inner())
            .await
            .expect("Failed to apply schema");

        Self {
            pool: Arc::new(pool),
        }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<DatabasePool> {
        Arc::clone(&self.pool)
    }

    /// A connection that records every statement it runs.
    pub fn connection(&self) -> Arc<RecordingConnection> {
        Arc::new(RecordingConnection {
            inner: SqlxConnection::new(self.pool()),
            statements: Mutex::new(Vec::new()),
        })
    }
}

fn register_tables() {
    static TABLES: Once = Once::new();
    TABLES.call_once(|| {
        init_tracing(&TelemetryConfig::default()).expect("Failed to initialize tracing");
        set_table_name::<Widget>("widgets").expect("Failed to register widgets table");
    });
}

/// [`SqlxConnection`] that keeps a log of statements.
pub struct RecordingConnection {
    inner: SqlxConnection,
    statements: Mutex<Vec<Statement>>,
}

impl RecordingConnection {
    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn last(&self) -> Statement {
        self.statements().pop().expect("No statement recorded")
    }

    fn record(&self, sql: &str, params: &[SqlValue]) {
        self.statements
            .lock()
            .unwrap()
            .push(Statement::new(sql, params.to_vec()));
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> ConnectionResult<u64> {
        self.record(sql, params);
        self.inner.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> ConnectionResult<Vec<RawRow>> {
        self.record(sql, params);
        self.inner.query(sql, params).await
    }
}

// =============================================================================
// Entities
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct WidgetId(pub String);

impl FromStr for WidgetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err("widget id must not be empty".to_string())
        } else {
            Ok(Self(s.to_string()))
        }
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FieldType for WidgetId {
    const SHAPE: TypeShape = TypeShape::STRING_CONSTRUCTIBLE;

    fn to_sql(&self) -> SqlValue {
        SqlValue::Text(self.0.clone())
    }

    fn from_cell(_kind: ColumnKind, cell: Cell) -> Result<Self, MappingProblem> {
        cell.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Widget {
    pub id: Option<WidgetId>,
    pub name: String,
    pub qty: i32,
    pub created_date: DateTime<Utc>,
}

impl Entity for Widget {
    type Id = WidgetId;
    const TYPE_NAME: &'static str = "Widget";

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::new("id", |w: &Self| &w.id, |w: &mut Self, v| w.id = v),
            Field::new("name", |w: &Self| &w.name, |w: &mut Self, v| w.name = v),
            Field::new("qty", |w: &Self| &w.qty, |w: &mut Self, v| w.qty = v),
            Field::new(
                "created_date",
                |w: &Self| &w.created_date,
                |w: &mut Self, v| w.created_date = v,
            ),
        ]
    }

    fn id(&self) -> Option<&WidgetId> {
        self.id.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeKind {
    Pressure,
    Temperature,
}

impl IdentifiableEnum for GaugeKind {
    fn id(&self) -> &str {
        match self {
            Self::Pressure => "P",
            Self::Temperature => "T",
        }
    }

    fn values() -> &'static [Self] {
        &[Self::Pressure, Self::Temperature]
    }
}

impl FieldType for GaugeKind {
    const SHAPE: TypeShape = TypeShape::PLAIN_ENUM.with_identifiable_enum();

    fn to_sql(&self) -> SqlValue {
        SqlValue::from(self.id())
    }

    fn from_cell(_kind: ColumnKind, cell: Cell) -> Result<Self, MappingProblem> {
        cell.lookup()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gauge {
    pub id: Option<i64>,
    pub label: Option<String>,
    pub reading: i64,
    pub ceiling: Option<i64>,
    pub enabled: bool,
    pub audited: Option<bool>,
    pub kind: Option<GaugeKind>,
    pub checked_date: Option<DateTime<Utc>>,
    pub dirty: bool,
}

impl Entity for Gauge {
    type Id = i64;
    const TYPE_NAME: &'static str = "Gauge";

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::new("id", |g: &Self| &g.id, |g: &mut Self, v| g.id = v),
            Field::new("label", |g: &Self| &g.label, |g: &mut Self, v| g.label = v),
            Field::new("reading", |g: &Self| &g.reading, |g: &mut Self, v| g.reading = v),
            Field::new("ceiling", |g: &Self| &g.ceiling, |g: &mut Self, v| g.ceiling = v),
            Field::new("enabled", |g: &Self| &g.enabled, |g: &mut Self, v| g.enabled = v),
            Field::new("audited", |g: &Self| &g.audited, |g: &mut Self, v| g.audited = v),
            Field::new("kind", |g: &Self| &g.kind, |g: &mut Self, v| g.kind = v),
            Field::new(
                "checked_date",
                |g: &Self| &g.checked_date,
                |g: &mut Self, v| g.checked_date = v,
            ),
            Field::new("dirty", |g: &Self| &g.dirty, |g: &mut Self, v| g.dirty = v)
                .mark_transient(),
        ]
    }

    fn id(&self) -> Option<&i64> {
        self.id.as_ref()
    }
}
