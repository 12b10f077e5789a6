//! Cross-engine migration: schema creation, batched data transfer, and
//! row-count verification.
//!
//! The manager runs four ordered phases, each independently toggleable:
//! introspect both sides, reconcile target schema, transfer data in
//! batches, verify row counts. Per-table problems degrade to recorded
//! warnings or errors; the result always comes back with full counts so
//! callers can inspect partial outcomes, and `success` means only that
//! nothing fatal happened.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::core::schema::{SchemaInfo, TableInfo};
use crate::core::traits::DatabaseEngine;
use crate::dialect::typemap::remap_table_types;
use crate::dialect::Dialect;
use crate::diff::{
    compare_schemas, generate_add_foreign_key, generate_create_index, generate_create_table,
    SchemaComparisonResult,
};
use crate::discover::{DiscoverOptions, SchemaDiscovery};
use crate::drivers::connect_engine;
use crate::error::{BridgeError, Result};
use crate::relations::RelationshipEngine;

/// Per-batch progress report from a transfer worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationProgress {
    /// Table being transferred.
    pub table: String,
    /// Rows transferred so far.
    pub current: i64,
    /// Total rows to transfer.
    pub total: i64,
    /// current / total, as a percentage.
    pub percentage: f64,
}

/// Result of one `migrate()` call.
///
/// Accumulated over the lifetime of the call and returned whole;
/// nothing in the data path throws past this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// True when no fatal error occurred. Skipped tables and row-count
    /// mismatches are recorded below without clearing this flag.
    pub success: bool,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables selected for migration after filtering.
    pub tables_total: usize,

    /// Tables whose data transferred completely.
    pub tables_migrated: usize,

    /// Tables skipped after errors.
    pub tables_skipped: Vec<String>,

    /// Total rows transferred.
    pub rows_transferred: i64,

    /// Generated DDL, in execution order. Populated on dry runs and
    /// real runs alike.
    pub sql_statements: Vec<String>,

    /// Non-fatal observations: lossy type mappings, creation failures,
    /// row-count mismatches, referential issues.
    pub warnings: Vec<String>,

    /// Errors, fatal and per-table.
    pub errors: Vec<String>,
}

impl MigrationResult {
    /// Convert to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Options for `sync_schema`.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Execute the reconciliation statements against the target.
    pub apply: bool,
    /// Include the generated statements in the result.
    pub generate_sql: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            apply: false,
            generate_sql: true,
        }
    }
}

/// Result of `sync_schema`.
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Statements successfully applied to the target.
    pub applied_changes: usize,
    /// Generated statements (empty unless `generate_sql`).
    pub sql_statements: Vec<String>,
    /// Per-statement application errors.
    pub errors: Vec<String>,
}

/// Top-level orchestrator composing the differ and the data migrator.
pub struct MigrationManager {
    config: Config,
    source: Arc<dyn DatabaseEngine>,
    target: Arc<dyn DatabaseEngine>,
    source_dialect: Dialect,
    target_dialect: Dialect,
    progress: Option<mpsc::Sender<MigrationProgress>>,
}

impl MigrationManager {
    /// Validate the configuration and connect both endpoints.
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let source = connect_engine(&config.source).await?;
        let target = connect_engine(&config.target).await?;
        Ok(Self::with_engines(config, source, target))
    }

    /// Compose a manager over already-connected engines. Dialects are
    /// taken from the engines, not the config.
    pub fn with_engines(
        config: Config,
        source: Arc<dyn DatabaseEngine>,
        target: Arc<dyn DatabaseEngine>,
    ) -> Self {
        let source_dialect = source.dialect();
        let target_dialect = target.dialect();
        Self {
            config,
            source,
            target,
            source_dialect,
            target_dialect,
            progress: None,
        }
    }

    /// Attach a progress channel.
    pub fn with_progress(mut self, tx: mpsc::Sender<MigrationProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    fn discover_options(&self) -> DiscoverOptions {
        DiscoverOptions {
            include_tables: self.config.options.include_tables.clone(),
            exclude_tables: self.config.options.exclude_tables.clone(),
        }
    }

    /// Run the full migration.
    ///
    /// Never returns `Err` for per-table or verification problems; the
    /// result carries them. `Err` is reserved for conditions outside
    /// the migration itself (none today; the signature leaves room).
    pub async fn migrate(&self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let opts = &self.config.options;

        let mut warnings: Vec<String> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut sql_statements: Vec<String> = Vec::new();
        let mut tables_skipped: Vec<String> = Vec::new();
        let mut tables_migrated = 0usize;
        let mut rows_transferred = 0i64;
        let mut fatal = false;

        info!("Starting migration run: {}", run_id);

        // Phase 1: introspect both schemas.
        info!("Phase 1: Discovering source and target schemas");
        let filters = self.discover_options();
        let source_schema = match SchemaDiscovery::new(self.source.clone())
            .discover_with(&filters)
            .await
        {
            Ok(schema) => schema,
            Err(e) => {
                error!("Source discovery failed: {}", e);
                errors.push(format!("source discovery failed: {}", e));
                return Ok(self.finish(
                    run_id,
                    started_at,
                    false,
                    0,
                    0,
                    tables_skipped,
                    0,
                    sql_statements,
                    warnings,
                    errors,
                ));
            }
        };
        let target_schema = match SchemaDiscovery::new(self.target.clone())
            .discover_with(&filters)
            .await
        {
            Ok(schema) => schema,
            Err(e) => {
                error!("Target discovery failed: {}", e);
                errors.push(format!("target discovery failed: {}", e));
                return Ok(self.finish(
                    run_id,
                    started_at,
                    false,
                    source_schema.tables.len(),
                    0,
                    tables_skipped,
                    0,
                    sql_statements,
                    warnings,
                    errors,
                ));
            }
        };

        warnings.extend(RelationshipEngine::default().validate(&source_schema.tables));

        let tables_total = source_schema.tables.len();
        info!("Selected {} tables", tables_total);

        // Parents before referents, so targets that enforce foreign
        // keys during the data phase accept the insert order.
        let ordered = dependency_order(&source_schema.tables);

        // Tables whose target creation failed are excluded from the
        // data phase rather than failing the run.
        let mut skip_data: HashSet<String> = HashSet::new();
        let mut deferred_fk_sql: Vec<String> = Vec::new();

        // Phase 2: reconcile target schema.
        if !opts.data_only {
            info!("Phase 2: Preparing target schema (dry_run={})", opts.dry_run);
            self.prepare_target(
                &ordered,
                &target_schema,
                &mut sql_statements,
                &mut deferred_fk_sql,
                &mut warnings,
                &mut skip_data,
            )
            .await;
        }

        // Phase 3: transfer data.
        if !opts.schema_only && !opts.dry_run {
            info!("Phase 3: Transferring data");
            let migrator = DataMigrator {
                source: self.source.clone(),
                target: self.target.clone(),
                source_dialect: self.source_dialect,
                target_dialect: self.target_dialect,
                batch_size: opts.get_batch_size(),
                workers: opts.get_parallel_workers(),
                progress: self.progress.clone(),
            };

            for table in &ordered {
                if skip_data.contains(&table.name) {
                    tables_skipped.push(table.name.clone());
                    continue;
                }
                match migrator.migrate_table(table).await {
                    Ok(rows) => {
                        tables_migrated += 1;
                        rows_transferred += rows;
                        info!("{}: transferred {} rows", table.name, rows);
                    }
                    Err(e) => {
                        errors.push(format!("{}: {}", table.name, e));
                        if opts.continue_on_error {
                            warn!("{}: failed, skipping: {}", table.name, e);
                            tables_skipped.push(table.name.clone());
                        } else {
                            error!("{}: failed, aborting migration: {}", table.name, e);
                            fatal = true;
                            break;
                        }
                    }
                }
            }
        }

        // Deferred foreign keys go on after the data they constrain.
        if !fatal && !opts.dry_run {
            for sql in &deferred_fk_sql {
                if let Err(e) = self.target.execute_ddl(sql).await {
                    warnings.push(format!("foreign key creation failed: {}", e));
                }
            }
        }
        sql_statements.extend(deferred_fk_sql);

        // Phase 4: verify row counts.
        if opts.verify_row_counts && !opts.schema_only && !opts.dry_run && !fatal {
            info!("Phase 4: Verifying row counts");
            for table in &source_schema.tables {
                if skip_data.contains(&table.name) || tables_skipped.contains(&table.name) {
                    continue;
                }
                match self.verify_table(&table.name).await {
                    Ok((source_count, target_count)) if source_count == target_count => {
                        debug!("{}: {} rows (match)", table.name, source_count);
                    }
                    Ok((source_count, target_count)) => {
                        warnings.push(format!(
                            "row count mismatch for {}: source={} target={}",
                            table.name, source_count, target_count
                        ));
                    }
                    Err(e) => {
                        warnings.push(format!(
                            "row count verification failed for {}: {}",
                            table.name, e
                        ));
                    }
                }
            }
        }

        let result = self.finish(
            run_id,
            started_at,
            !fatal,
            tables_total,
            tables_migrated,
            tables_skipped,
            rows_transferred,
            sql_statements,
            warnings,
            errors,
        );

        info!(
            "Migration {}: {}/{} tables, {} rows in {:.1}s",
            if result.success { "succeeded" } else { "failed" },
            result.tables_migrated,
            result.tables_total,
            result.rows_transferred,
            result.duration_seconds,
        );

        Ok(result)
    }

    async fn prepare_target(
        &self,
        ordered: &[&TableInfo],
        target_schema: &SchemaInfo,
        sql_statements: &mut Vec<String>,
        deferred_fk_sql: &mut Vec<String>,
        warnings: &mut Vec<String>,
        skip_data: &mut HashSet<String>,
    ) {
        let opts = &self.config.options;
        let caps = self.target_dialect.capabilities();

        for table in ordered {
            let exists = target_schema.table(&table.name).is_some();

            if exists && !opts.drop_tables {
                debug!("{}: exists on target, keeping", table.name);
                continue;
            }

            let create = match generate_create_table(
                table,
                self.source_dialect,
                self.target_dialect,
                warnings,
            ) {
                Ok(sql) => sql,
                Err(e) => {
                    warnings.push(format!("{}: could not generate DDL: {}", table.name, e));
                    skip_data.insert(table.name.clone());
                    continue;
                }
            };

            if exists {
                sql_statements.push(format!("DROP TABLE {}", table.name));
            }
            sql_statements.push(create.clone());

            let mut index_sql = Vec::new();
            if opts.create_indexes {
                for index in &table.indexes {
                    match generate_create_index(&table.name, index, self.target_dialect) {
                        Ok(sql) => index_sql.push(sql),
                        Err(e) => {
                            warnings.push(format!(
                                "{}: could not generate index {}: {}",
                                table.name, index.name, e
                            ));
                        }
                    }
                }
            }
            sql_statements.extend(index_sql.iter().cloned());

            if opts.create_foreign_keys && caps.supports_add_constraint {
                for fk in &table.foreign_keys {
                    match generate_add_foreign_key(&table.name, fk, self.target_dialect) {
                        Ok(sql) => deferred_fk_sql.push(sql),
                        Err(e) => {
                            warnings.push(format!(
                                "{}: could not generate foreign key {}: {}",
                                table.name, fk.name, e
                            ));
                        }
                    }
                }
            }

            if opts.dry_run {
                continue;
            }

            if exists {
                if let Err(e) = self.target.drop_table(&table.name).await {
                    warnings.push(format!("{}: drop failed: {}", table.name, e));
                    skip_data.insert(table.name.clone());
                    continue;
                }
            }

            if let Err(e) = self.target.execute_ddl(&create).await {
                warnings.push(format!("{}: table creation failed: {}", table.name, e));
                skip_data.insert(table.name.clone());
                continue;
            }

            for sql in &index_sql {
                if let Err(e) = self.target.execute_ddl(sql).await {
                    warnings.push(format!("{}: index creation failed: {}", table.name, e));
                }
            }
        }
    }

    async fn verify_table(&self, table: &str) -> Result<(i64, i64)> {
        let source_count = self.source.get_row_count(table).await?;
        let target_count = self.target.get_row_count(table).await?;
        Ok((source_count, target_count))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        run_id: String,
        started_at: DateTime<Utc>,
        success: bool,
        tables_total: usize,
        tables_migrated: usize,
        tables_skipped: Vec<String>,
        rows_transferred: i64,
        sql_statements: Vec<String>,
        warnings: Vec<String>,
        errors: Vec<String>,
    ) -> MigrationResult {
        let completed_at = Utc::now();
        MigrationResult {
            run_id,
            success,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            tables_total,
            tables_migrated,
            tables_skipped,
            rows_transferred,
            sql_statements,
            warnings,
            errors,
        }
    }

    /// Compare the two schemas without changing anything.
    pub async fn compare_schemas(&self) -> Result<SchemaComparisonResult> {
        let filters = self.discover_options();
        let source_schema = SchemaDiscovery::new(self.source.clone())
            .discover_with(&filters)
            .await?;
        let target_schema = SchemaDiscovery::new(self.target.clone())
            .discover_with(&filters)
            .await?;
        compare_schemas(
            &source_schema,
            &target_schema,
            self.source_dialect,
            self.target_dialect,
        )
    }

    /// Reconcile the target schema to the source.
    pub async fn sync_schema(&self, options: SyncOptions) -> Result<SyncResult> {
        let comparison = self.compare_schemas().await?;

        let mut applied_changes = 0;
        let mut errors = Vec::new();

        if options.apply && !self.config.options.dry_run {
            for sql in &comparison.sql_statements {
                match self.target.execute_ddl(sql).await {
                    Ok(()) => applied_changes += 1,
                    Err(e) => errors.push(format!("{}: {}", sql, e)),
                }
            }
        }

        Ok(SyncResult {
            applied_changes,
            sql_statements: if options.generate_sql {
                comparison.sql_statements
            } else {
                Vec::new()
            },
            errors,
        })
    }
}

/// Order tables so every referenced table precedes its referents.
///
/// Engines that enforce foreign keys during the data phase then accept
/// the insert order. Self-references never block; a dependency cycle
/// leaves the remainder in discovery order.
fn dependency_order(tables: &[TableInfo]) -> Vec<&TableInfo> {
    let index: std::collections::HashMap<String, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.to_lowercase(), i))
        .collect();

    let mut placed: HashSet<usize> = HashSet::new();
    let mut remaining: Vec<usize> = (0..tables.len()).collect();
    let mut out = Vec::with_capacity(tables.len());

    while !remaining.is_empty() {
        let mut progressed = false;
        let mut deferred = Vec::new();

        for &i in &remaining {
            let ready = tables[i].foreign_keys.iter().all(|fk| {
                match index.get(&fk.referenced_table.to_lowercase()) {
                    Some(&j) => j == i || placed.contains(&j),
                    None => true,
                }
            });
            if ready {
                placed.insert(i);
                out.push(&tables[i]);
                progressed = true;
            } else {
                deferred.push(i);
            }
        }

        remaining = deferred;
        if !progressed {
            debug!("Foreign key cycle among {} tables; keeping discovery order", remaining.len());
            out.extend(remaining.iter().map(|&i| &tables[i]));
            break;
        }
    }

    out
}

/// Transfers one table's rows in fixed-size batches, optionally across
/// parallel workers on disjoint contiguous ranges.
struct DataMigrator {
    source: Arc<dyn DatabaseEngine>,
    target: Arc<dyn DatabaseEngine>,
    source_dialect: Dialect,
    target_dialect: Dialect,
    batch_size: usize,
    workers: usize,
    progress: Option<mpsc::Sender<MigrationProgress>>,
}

impl DataMigrator {
    async fn migrate_table(&self, table: &TableInfo) -> Result<i64> {
        let total = self.source.get_row_count(&table.name).await?;
        if total == 0 {
            self.report(&table.name, 0, 0).await;
            return Ok(0);
        }

        let (target_table, _) =
            remap_table_types(table, self.source_dialect, self.target_dialect);

        // Without a primary key the read order is not stable enough to
        // split into ranges.
        let workers = if table.primary_key.is_empty() {
            1
        } else {
            self.workers.max(1)
        };
        let range = (total + workers as i64 - 1) / workers as i64;

        let counter = Arc::new(AtomicI64::new(0));
        let source_table = Arc::new(table.clone());
        let target_table = Arc::new(target_table);

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers as i64 {
            let start = worker * range;
            let end = (start + range).min(total);
            if start >= end {
                continue;
            }

            let source = self.source.clone();
            let target = self.target.clone();
            let source_table = source_table.clone();
            let target_table = target_table.clone();
            let counter = counter.clone();
            let progress = self.progress.clone();
            let batch_size = self.batch_size;

            handles.push(tokio::spawn(async move {
                let mut offset = start;
                while offset < end {
                    let limit = ((end - offset) as usize).min(batch_size);
                    let rows = source.read_batch(&source_table, offset, limit).await?;
                    if rows.is_empty() {
                        break;
                    }
                    let fetched = rows.len() as i64;
                    target.write_batch(&target_table, &rows).await?;

                    let current = counter.fetch_add(fetched, Ordering::SeqCst) + fetched;
                    if let Some(tx) = &progress {
                        let _ = tx
                            .send(MigrationProgress {
                                table: source_table.name.clone(),
                                current,
                                total,
                                percentage: current as f64 / total as f64 * 100.0,
                            })
                            .await;
                    }

                    offset += fetched;
                }
                Ok::<(), BridgeError>(())
            }));
        }

        let mut first_error: Option<BridgeError> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error =
                            Some(BridgeError::transfer(&table.name, format!("worker panicked: {}", e)));
                    }
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        if let Err(e) = self.target.reset_auto_increment(&target_table).await {
            debug!("No sequence reset for {}: {}", table.name, e);
        }

        Ok(counter.load(Ordering::SeqCst))
    }

    async fn report(&self, table: &str, current: i64, total: i64) {
        if let Some(tx) = &self.progress {
            let percentage = if total == 0 {
                100.0
            } else {
                current as f64 / total as f64 * 100.0
            };
            let _ = tx
                .send(MigrationProgress {
                    table: table.to_string(),
                    current,
                    total,
                    percentage,
                })
                .await;
        }
    }
}
