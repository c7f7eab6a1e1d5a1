//! Integration tests for GenericDao.
//!
//! These tests run against a private in-memory SQLite database per test.

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::{Gauge, GaugeKind, TestDatabase, Widget, WidgetId};
use tabula_core::SqlValue;
use tabula_repository::{Criteria, EntityDao, GenericDao, OrderBy, Where};

fn widget(id: &str, name: &str, qty: i32, created_date: DateTime<Utc>) -> Widget {
    Widget {
        id: Some(WidgetId(id.to_string())),
        name: name.to_string(),
        qty,
        created_date,
    }
}

fn gauge(id: i64, label: Option<&str>, reading: i64, enabled: bool) -> Gauge {
    Gauge {
        id: Some(id),
        label: label.map(str::to_string),
        reading,
        enabled,
        ..Gauge::default()
    }
}

#[tokio::test]
async fn test_widget_insert_and_load() {
    let db = TestDatabase::new().await;
    let connection = db.connection();
    let dao: GenericDao<Widget, _> = GenericDao::new(connection.clone());

    let now_millis = Utc::now().timestamp_millis();
    let created = Utc.timestamp_opt(now_millis / 1000, 0).unwrap();
    let original = widget("w1", "Foo", 5, created);

    let inserted = dao.insert(&original).await.expect("Failed to insert widget");
    assert_eq!(inserted, 1);

    let statement = connection.last();
    assert_eq!(
        statement.sql,
        "INSERT INTO widgets(widget_id,name,qty,created) VALUES (?,?,?,?)"
    );
    assert_eq!(
        statement.params,
        vec![
            SqlValue::from("w1"),
            SqlValue::from("Foo"),
            SqlValue::Int(5),
            SqlValue::Long(now_millis / 1000),
        ]
    );

    let loaded = dao
        .load(&WidgetId("w1".to_string()))
        .await
        .expect("Failed to load widget")
        .expect("Widget not found");
    assert_eq!(loaded, original);
}

#[tokio::test]
async fn test_dates_keep_whole_seconds() {
    let db = TestDatabase::new().await;
    let dao: GenericDao<Widget, _> = GenericDao::new(db.connection());

    let precise = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
    dao.insert(&widget("w2", "Bar", 1, precise)).await.unwrap();

    let loaded = dao.load(&WidgetId("w2".to_string())).await.unwrap().unwrap();
    assert_eq!(loaded.created_date, Utc.timestamp_opt(1_700_000_123, 0).unwrap());
}

#[tokio::test]
async fn test_gauge_round_trip() {
    let db = TestDatabase::new().await;
    let dao: GenericDao<Gauge, _> = GenericDao::new(db.connection());

    let full = Gauge {
        id: Some(1),
        label: Some("boiler".to_string()),
        reading: 9_000_000_000,
        ceiling: Some(12_000_000_000),
        enabled: true,
        audited: Some(false),
        kind: Some(GaugeKind::Pressure),
        checked_date: Some(Utc.timestamp_opt(1_650_000_000, 0).unwrap()),
        dirty: true,
    };
    let sparse = gauge(2, None, -4, false);

    dao.insert(&full).await.unwrap();
    dao.insert(&sparse).await.unwrap();

    let loaded = dao.load(&1).await.unwrap().unwrap();
    assert_eq!(loaded.audited, Some(false));
    assert_eq!(loaded, Gauge { dirty: false, ..full });

    let loaded = dao.load(&2).await.unwrap().unwrap();
    assert_eq!(loaded.audited, None);
    assert_eq!(loaded, sparse);
    assert!(dao.load(&3).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_and_delete() {
    let db = TestDatabase::new().await;
    let dao: GenericDao<Gauge, _> = GenericDao::new(db.connection());

    let mut g = gauge(10, Some("tank"), 3, true);
    dao.insert(&g).await.unwrap();

    g.reading = 42;
    g.kind = Some(GaugeKind::Temperature);
    assert_eq!(dao.update(&g).await.unwrap(), 1);
    assert_eq!(dao.load(&10).await.unwrap().unwrap(), g);

    assert_eq!(dao.update(&gauge(11, None, 0, false)).await.unwrap(), 0);

    assert_eq!(dao.delete_by_id(&10).await.unwrap(), 1);
    assert!(dao.load(&10).await.unwrap().is_none());
    assert_eq!(dao.delete_by_id(&10).await.unwrap(), 0);
}

#[tokio::test]
async fn test_increment_and_decrement() {
    let db = TestDatabase::new().await;
    let dao: GenericDao<Gauge, _> = GenericDao::new(db.connection());

    let g = gauge(20, None, 100, true);
    dao.insert(&g).await.unwrap();

    dao.increment(&g, "reading").await.unwrap();
    dao.increment_by(&g, "reading", 10).await.unwrap();
    dao.decrement(&g, "reading").await.unwrap();
    dao.increment_by(&g, "reading", -50).await.unwrap();

    assert_eq!(dao.load(&20).await.unwrap().unwrap().reading, 60);
}

#[tokio::test]
async fn test_aggregates() {
    let db = TestDatabase::new().await;
    let dao: GenericDao<Gauge, _> = GenericDao::new(db.connection());

    for g in [
        gauge(1, Some("a"), 5, true),
        gauge(2, Some("b"), 15, false),
        gauge(3, None, 25, true),
    ] {
        dao.insert(&g).await.unwrap();
    }

    assert_eq!(dao.count(&Criteria::new()).await.unwrap(), 3);
    assert_eq!(dao.count(&Criteria::new().eq("enabled", true)).await.unwrap(), 2);
    assert_eq!(dao.max_long("reading", &Criteria::new()).await.unwrap(), 25);
    assert_eq!(
        dao.min_int("reading", &Criteria::new().eq("enabled", true)).await.unwrap(),
        5
    );
    assert_eq!(
        dao.max_int("reading", &Criteria::from(Where::new().gt("reading", 100)))
            .await
            .unwrap(),
        0
    );
    assert_eq!(dao.count_sql("SELECT COUNT(*) FROM gauge WHERE label IS NULL").await.unwrap(), 1);
}

#[tokio::test]
async fn test_list_and_find_variants() {
    let db = TestDatabase::new().await;
    let connection = db.connection();
    let dao: GenericDao<Gauge, _> = GenericDao::new(connection.clone());

    for g in [
        gauge(3, None, 30, true),
        gauge(1, Some("x"), 10, true),
        gauge(2, None, 20, false),
        gauge(4, Some("x"), 40, false),
    ] {
        dao.insert(&g).await.unwrap();
    }

    let unlabeled = dao.list_by_field("label", "NULL").await.unwrap();
    assert_eq!(unlabeled.iter().map(|g| g.id).collect::<Vec<_>>(), vec![Some(2), Some(3)]);
    assert!(connection.last().params.is_empty());

    let labeled = dao.list_by_field("label", "x").await.unwrap();
    assert_eq!(labeled.len(), 2);
    assert_eq!(connection.last().params, vec![SqlValue::from("x")]);

    let page = dao
        .list_by_field_paged("enabled", true, "reading", 1, 1)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, Some(3));

    let all = dao
        .list(&Criteria::new().order_by(OrderBy::desc("reading")))
        .await
        .unwrap();
    assert_eq!(all.first().and_then(|g| g.id), Some(4));
    assert!(dao.list(&Criteria::new().eq("reading", 999)).await.unwrap().is_empty());

    let by_ids = dao.find_by_ids(&[1, 4, 99]).await.unwrap();
    assert_eq!(by_ids.len(), 2);

    let found = dao
        .find_by_fields(&["label", "enabled"], &[SqlValue::from("x"), SqlValue::Bool(false)])
        .await
        .unwrap();
    assert_eq!(found.and_then(|g| g.id), Some(4));

    let found = dao.find_by_field("reading", 20).await.unwrap();
    assert_eq!(found.and_then(|g| g.id), Some(2));

    let found = dao.find_by_where("reading > 25 AND enabled = 1").await.unwrap();
    assert_eq!(found.and_then(|g| g.id), Some(3));

    let high = dao.list_where("reading >= 30").await.unwrap();
    assert_eq!(high.len(), 2);

    let first = dao
        .find(&Criteria::new().eq("enabled", false).order_by(OrderBy::asc("reading")))
        .await
        .unwrap();
    assert_eq!(first.and_then(|g| g.id), Some(2));
}

#[tokio::test]
async fn test_find_by_field_matches_null_text_literally() {
    let db = TestDatabase::new().await;
    let connection = db.connection();
    let dao: GenericDao<Gauge, _> = GenericDao::new(connection.clone());

    dao.insert(&gauge(1, None, 1, true)).await.unwrap();
    dao.insert(&gauge(2, Some("NULL"), 2, true)).await.unwrap();

    let found = dao.find_by_field("label", "NULL").await.unwrap();
    assert_eq!(found.and_then(|g| g.id), Some(2));
    assert_eq!(connection.last().params, vec![SqlValue::from("NULL")]);

    let unlabeled = dao.list_by_field("label", "NULL").await.unwrap();
    assert_eq!(unlabeled.iter().map(|g| g.id).collect::<Vec<_>>(), vec![Some(1)]);
}

#[tokio::test]
async fn test_duplicate_insert_is_data_access_failure() {
    let db = TestDatabase::new().await;
    let dao: GenericDao<Gauge, _> = GenericDao::new(db.connection());

    let g = gauge(7, None, 1, true);
    dao.insert(&g).await.unwrap();

    let err = dao.insert(&g).await.unwrap_err();
    assert_eq!(err.error_code(), "DATA_ACCESS_FAILURE");
    assert!(err.sql().is_some_and(|sql| sql.starts_with("INSERT INTO gauge(")));
}

#[tokio::test]
async fn test_dao_through_trait_object() {
    let db = TestDatabase::new().await;
    let dao: Box<dyn EntityDao<Widget>> = Box::new(GenericDao::<Widget>::new(db.connection()));

    let w = widget("w9", "Baz", 2, Utc.timestamp_opt(1_600_000_000, 0).unwrap());
    dao.insert(&w).await.unwrap();
    assert_eq!(dao.load(&WidgetId("w9".to_string())).await.unwrap(), Some(w.clone()));
    assert_eq!(dao.delete(&w).await.unwrap_err().error_code(), "UNSUPPORTED_OPERATION");
}
