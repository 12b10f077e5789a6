//! End-to-end tests against real in-memory SQLite databases: PRAGMA
//! introspection, relationship inference, drift watching, and a full
//! migration round trip.

use std::sync::Arc;

use schema_bridge::{
    Config, DatabaseEngine, EndpointConfig, MigrationManager, MigrationOptions, RelationshipKind,
    SchemaChangeKind, SchemaDiscovery, SchemaWatcher, SqliteEngine, TargetWriter,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn memory_engine() -> Arc<SqliteEngine> {
    init_tracing();
    Arc::new(
        SqliteEngine::connect(&EndpointConfig::sqlite(":memory:"))
            .await
            .expect("in-memory engine"),
    )
}

async fn seed_source(engine: &SqliteEngine) {
    let statements = [
        "CREATE TABLE customers (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email VARCHAR(120),
            balance DECIMAL(10,2) DEFAULT 0
        )",
        "CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            customer_id INTEGER NOT NULL,
            total REAL,
            placed_at DATETIME,
            FOREIGN KEY (customer_id) REFERENCES customers (id) ON DELETE CASCADE
        )",
        "CREATE INDEX idx_orders_customer ON orders (customer_id)",
        "CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT NOT NULL)",
        "CREATE TABLE customer_tags (
            customer_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (customer_id, tag_id),
            FOREIGN KEY (customer_id) REFERENCES customers (id),
            FOREIGN KEY (tag_id) REFERENCES tags (id)
        )",
        "CREATE VIEW customer_orders AS
            SELECT c.name, o.total FROM customers c JOIN orders o ON o.customer_id = c.id",
        "INSERT INTO customers (name, email, balance) VALUES
            ('ada', 'ada@example.com', '125.50'),
            ('grace', 'grace@example.com', '0'),
            ('edsger', NULL, '3.25')",
        "INSERT INTO orders (customer_id, total, placed_at) VALUES
            (1, 19.99, '2024-03-09 12:30:00'),
            (1, 5.00, '2024-03-10 08:00:00'),
            (2, 42.00, '2024-03-11 09:15:00')",
        "INSERT INTO tags (label) VALUES ('vip'), ('new')",
        "INSERT INTO customer_tags (customer_id, tag_id) VALUES (1, 1), (2, 2)",
    ];

    for sql in statements {
        engine.execute_ddl(sql).await.expect(sql);
    }
}

#[tokio::test]
async fn discovers_tables_keys_and_views() {
    let engine = memory_engine().await;
    seed_source(&engine).await;

    let discovery = SchemaDiscovery::new(engine.clone());
    let schema = discovery.discover().await.unwrap();

    assert_eq!(schema.tables.len(), 4);

    let customers = schema.table("customers").unwrap();
    assert_eq!(customers.primary_key, vec!["id"]);
    assert_eq!(customers.row_count, 3);
    let id = customers.column("id").unwrap();
    assert!(id.is_primary_key);
    assert!(id.is_auto_increment);
    let email = customers.column("email").unwrap();
    assert!(email.is_nullable);
    assert_eq!(email.max_length, 120);

    let orders = schema.table("orders").unwrap();
    assert_eq!(orders.foreign_keys.len(), 1);
    let fk = &orders.foreign_keys[0];
    assert_eq!(fk.referenced_table, "customers");
    assert_eq!(fk.referenced_column, "id");
    assert_eq!(fk.on_delete, "CASCADE");
    assert!(orders.indexes.iter().any(|i| i.name == "idx_orders_customer"));

    let view = &schema.views[0];
    assert_eq!(view.name, "customer_orders");
    assert_eq!(view.referenced_tables, vec!["customers", "orders"]);

    // Referential integrity holds, so validation is quiet.
    assert!(discovery.validate(&schema).is_empty());
}

#[tokio::test]
async fn infers_junction_and_forward_relationships() {
    let engine = memory_engine().await;
    seed_source(&engine).await;

    let schema = SchemaDiscovery::new(engine.clone()).discover().await.unwrap();

    let m2m: Vec<_> = schema
        .relationships
        .iter()
        .filter(|r| r.kind == RelationshipKind::ManyToMany)
        .collect();
    assert_eq!(m2m.len(), 2);
    assert!(m2m
        .iter()
        .all(|r| r.junction_table.as_deref() == Some("customer_tags")));

    let forward = schema
        .relationships
        .iter()
        .find(|r| r.from_table == "orders" && r.to_table == "customers")
        .expect("orders -> customers");
    assert_eq!(forward.kind, RelationshipKind::ManyToOne);
    assert_eq!(forward.from_column, "customer_id");
}

#[tokio::test]
async fn watcher_reports_added_table() {
    let engine = memory_engine().await;
    seed_source(&engine).await;

    let discovery = Arc::new(SchemaDiscovery::new(engine.clone()));
    let watcher = SchemaWatcher::new(discovery);

    // First manual check diffs against nothing: every table is new.
    let changes = watcher.check_for_changes().await.unwrap();
    assert_eq!(changes.len(), 4);
    assert!(changes.iter().all(|c| c.kind == SchemaChangeKind::TableAdded));

    // Unchanged database, quiet tick.
    assert!(watcher.check_for_changes().await.unwrap().is_empty());

    engine
        .execute_ddl("CREATE TABLE invoices (id INTEGER PRIMARY KEY, amount REAL)")
        .await
        .unwrap();

    let changes = watcher.check_for_changes().await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, SchemaChangeKind::TableAdded);
    assert_eq!(changes[0].table, "invoices");
}

#[tokio::test]
async fn migrates_schema_and_data_between_databases() {
    let source = memory_engine().await;
    seed_source(&source).await;
    let target = memory_engine().await;

    let config = Config {
        source: EndpointConfig::sqlite(":memory:"),
        target: EndpointConfig::sqlite(":memory:"),
        options: MigrationOptions::default(),
    };

    let manager = MigrationManager::with_engines(config, source.clone(), target.clone());
    let result = manager.migrate().await.unwrap();

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.tables_total, 4);
    assert_eq!(result.tables_migrated, 4);
    assert_eq!(result.rows_transferred, 3 + 3 + 2 + 2);
    assert!(result.tables_skipped.is_empty());
    assert!(
        !result.warnings.iter().any(|w| w.contains("mismatch")),
        "warnings: {:?}",
        result.warnings
    );

    // The migrated schema discovers identically on the target side.
    let migrated = SchemaDiscovery::new(target.clone()).discover().await.unwrap();
    assert_eq!(migrated.tables.len(), 4);
    let customers = migrated.table("customers").unwrap();
    assert_eq!(customers.row_count, 3);
    assert_eq!(customers.primary_key, vec!["id"]);
    let orders = migrated.table("orders").unwrap();
    assert_eq!(orders.foreign_keys.len(), 1);

    source.close().await;
    target.close().await;
}

#[tokio::test]
async fn discovers_file_backed_database() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");

    let engine = SqliteEngine::connect(&EndpointConfig::sqlite(&path))
        .await
        .expect("file-backed engine");
    engine
        .execute_ddl("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
        .await
        .unwrap();
    engine.close().await;

    // Reopen the same file: the schema persisted.
    let engine = SqliteEngine::connect(&EndpointConfig::sqlite(&path))
        .await
        .unwrap();
    let schema = SchemaDiscovery::new(Arc::new(engine)).discover().await.unwrap();
    assert_eq!(schema.table_names(), vec!["notes"]);
}

#[tokio::test]
async fn dry_run_generates_sql_without_writing() {
    let source = memory_engine().await;
    seed_source(&source).await;
    let target = memory_engine().await;

    let config = Config {
        source: EndpointConfig::sqlite(":memory:"),
        target: EndpointConfig::sqlite(":memory:"),
        options: MigrationOptions {
            dry_run: true,
            ..Default::default()
        },
    };

    let manager = MigrationManager::with_engines(config, source, target.clone());
    let result = manager.migrate().await.unwrap();

    assert!(result.success);
    assert!(result
        .sql_statements
        .iter()
        .any(|sql| sql.starts_with("CREATE TABLE \"customers\"")));
    assert_eq!(result.rows_transferred, 0);

    let untouched = SchemaDiscovery::new(target).discover().await.unwrap();
    assert!(untouched.tables.is_empty());
}
