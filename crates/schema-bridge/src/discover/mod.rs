//! Table and view metadata discovery.
//!
//! Per-table facet lookups run concurrently across tables. Failure
//! handling is deliberately uneven: a failed index/foreign-key/row-count
//! lookup degrades to an empty value and the table is still included,
//! while a failed column lookup drops the table (there is no useful
//! record without columns). Drops are logged, never propagated.

pub mod coordinator;

pub use coordinator::SchemaDiscovery;

use futures::future::join_all;
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use crate::core::schema::{TableInfo, ViewInfo};
use crate::core::traits::Introspector;
use crate::error::Result;

/// Table name filters applied before any per-table work.
#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Tables to include (empty = all). Case-insensitive.
    pub include_tables: Vec<String>,

    /// Tables to exclude. Case-insensitive.
    pub exclude_tables: Vec<String>,
}

impl DiscoverOptions {
    fn admits(&self, name: &str) -> bool {
        let matches = |list: &[String]| list.iter().any(|t| t.eq_ignore_ascii_case(name));
        if !self.include_tables.is_empty() && !matches(&self.include_tables) {
            return false;
        }
        !matches(&self.exclude_tables)
    }
}

/// Discover all tables, fanning facet lookups out concurrently.
pub async fn discover_tables(
    introspector: &dyn Introspector,
    options: &DiscoverOptions,
) -> Result<Vec<TableInfo>> {
    let names = introspector.list_tables().await?;
    let names: Vec<String> = names.into_iter().filter(|n| options.admits(n)).collect();

    let results = join_all(names.iter().map(|name| load_table(introspector, name))).await;

    let mut tables = Vec::with_capacity(results.len());
    for (name, result) in names.iter().zip(results) {
        match result {
            Ok(table) => tables.push(table),
            Err(e) => warn!("Dropping table {} from discovery: {}", name, e),
        }
    }

    Ok(tables)
}

async fn load_table(introspector: &dyn Introspector, name: &str) -> Result<TableInfo> {
    // Columns are the one facet a table cannot be reported without.
    let columns = introspector.get_columns(name).await?;

    let indexes = match introspector.get_indexes(name).await {
        Ok(indexes) => indexes,
        Err(e) => {
            warn!("Index lookup failed for {}; continuing without: {}", name, e);
            Vec::new()
        }
    };

    let foreign_keys = match introspector.get_foreign_keys(name).await {
        Ok(fks) => fks,
        Err(e) => {
            warn!(
                "Foreign key lookup failed for {}; continuing without: {}",
                name, e
            );
            Vec::new()
        }
    };

    let row_count = match introspector.get_row_count(name).await {
        Ok(count) => count,
        Err(e) => {
            warn!("Row count failed for {}; assuming 0: {}", name, e);
            0
        }
    };

    let primary_key = columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| c.name.clone())
        .collect();

    Ok(TableInfo {
        name: name.to_string(),
        schema: None,
        columns,
        primary_key,
        indexes,
        foreign_keys,
        row_count,
    })
}

/// Discover all views, with the same tolerance shape as tables: a view
/// whose definition cannot be fetched is dropped and logged.
pub async fn discover_views(introspector: &dyn Introspector) -> Result<Vec<ViewInfo>> {
    let names = introspector.list_views().await?;

    let results = join_all(names.iter().map(|name| async move {
        let definition = introspector.get_view_definition(name).await?;
        let referenced_tables = extract_view_references(&definition);
        Ok::<_, crate::error::BridgeError>(ViewInfo {
            name: name.clone(),
            schema: None,
            definition,
            referenced_tables,
        })
    }))
    .await;

    let mut views = Vec::with_capacity(results.len());
    for (name, result) in names.iter().zip(results) {
        match result {
            Ok(view) => views.push(view),
            Err(e) => warn!("Dropping view {} from discovery: {}", name, e),
        }
    }

    Ok(views)
}

fn view_reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // FROM/JOIN followed by an optionally quoted, optionally
        // schema-qualified identifier. Subqueries ("FROM (") do not
        // match the identifier class and are skipped naturally.
        Regex::new(
            r#"(?i)\b(?:from|join)\s+("[^"]+"|`[^`]+`|[A-Za-z_][\w$]*)(?:\s*\.\s*("[^"]+"|`[^`]+`|[A-Za-z_][\w$]*))?"#,
        )
        .expect("view reference regex is valid")
    })
}

/// Extract the tables a view's SQL body references.
///
/// Tolerates quoted and schema-qualified identifiers; results are
/// de-duplicated case-insensitively, preserving first-seen order and
/// spelling.
pub fn extract_view_references(sql: &str) -> Vec<String> {
    let mut seen = Vec::new();
    let mut out = Vec::new();

    for caps in view_reference_regex().captures_iter(sql) {
        // With a qualifier present the second capture is the table.
        let raw = caps
            .get(2)
            .or_else(|| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let name = raw.trim_matches(|c| c == '"' || c == '`');
        if name.is_empty() {
            continue;
        }
        let key = name.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(name.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_references() {
        let refs = extract_view_references(
            "SELECT * FROM orders JOIN customers ON orders.customer_id = customers.id",
        );
        assert_eq!(refs, vec!["orders", "customers"]);
    }

    #[test]
    fn test_extract_quoted_and_qualified() {
        let refs = extract_view_references(
            "SELECT o.id FROM public.orders o LEFT JOIN \"Order Items\" oi ON oi.order_id = o.id",
        );
        assert_eq!(refs, vec!["orders", "Order Items"]);
    }

    #[test]
    fn test_extract_deduplicates_case_insensitively() {
        let refs = extract_view_references(
            "SELECT * FROM orders UNION SELECT * FROM Orders JOIN ORDERS ON 1=1",
        );
        assert_eq!(refs, vec!["orders"]);
    }

    #[test]
    fn test_extract_skips_subqueries() {
        let refs =
            extract_view_references("SELECT * FROM (SELECT id FROM orders) sub JOIN users u");
        assert_eq!(refs, vec!["orders", "users"]);
    }

    #[tokio::test]
    async fn test_facet_failure_keeps_table_with_partial_data() {
        use crate::testing::{column, pk_column, table, MockEngine};

        let engine = MockEngine::new();
        let mut users = table(
            "users",
            vec![pk_column("id", "INTEGER"), column("name", "TEXT")],
        );
        users.indexes.push(crate::core::schema::IndexInfo {
            name: "idx_users_name".to_string(),
            columns: vec!["name".to_string()],
            is_unique: false,
        });
        engine.add_table(users);
        engine.fail_indexes.lock().unwrap().insert("users".to_string());

        let tables = discover_tables(&engine, &DiscoverOptions::default())
            .await
            .unwrap();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].columns.len(), 2);
        // Index lookup failed, so the facet degrades to empty.
        assert!(tables[0].indexes.is_empty());
        assert_eq!(tables[0].primary_key, vec!["id"]);
    }

    #[tokio::test]
    async fn test_column_failure_drops_table_without_propagating() {
        use crate::testing::{pk_column, table, MockEngine};

        let engine = MockEngine::new();
        engine.add_table(table("good", vec![pk_column("id", "INTEGER")]));
        engine.add_table(table("broken", vec![pk_column("id", "INTEGER")]));
        engine
            .fail_columns
            .lock()
            .unwrap()
            .insert("broken".to_string());

        let tables = discover_tables(&engine, &DiscoverOptions::default())
            .await
            .unwrap();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "good");
    }

    #[tokio::test]
    async fn test_view_discovery_extracts_references() {
        use crate::core::schema::ViewInfo;
        use crate::testing::MockEngine;

        let engine = MockEngine::new();
        engine.add_view(ViewInfo {
            name: "order_totals".to_string(),
            schema: None,
            definition: "SELECT c.name, SUM(o.total) FROM customers c \
                         JOIN orders o ON o.customer_id = c.id GROUP BY c.name"
                .to_string(),
            referenced_tables: vec![],
        });

        let views = discover_views(&engine).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].referenced_tables, vec!["customers", "orders"]);
    }

    #[test]
    fn test_discover_options_filters() {
        let options = DiscoverOptions {
            include_tables: vec!["orders".to_string(), "users".to_string()],
            exclude_tables: vec!["users".to_string()],
        };
        assert!(options.admits("Orders"));
        assert!(!options.admits("users"));
        assert!(!options.admits("audit_log"));

        let open = DiscoverOptions::default();
        assert!(open.admits("anything"));
    }
}
