//! Schema drift watcher.
//!
//! A single poll loop re-discovers the schema on an interval, hashes a
//! canonical serialization of it, and fires registered callbacks with a
//! structural diff when the hash moves. One discovery pass is in flight
//! at a time; manual checks and the poll loop serialize on the same
//! tick lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::core::schema::{SchemaChange, SchemaInfo};
use crate::diff::diff_schemas;
use crate::discover::SchemaDiscovery;
use crate::error::{BridgeError, Result};

/// Hash stored when the initial snapshot cannot be taken, so watching
/// still starts and the first successful read diffs against nothing.
pub const SENTINEL_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Ceiling for exponential backoff between failed ticks.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Time between poll ticks.
    pub poll_interval: Duration,

    /// Consecutive tick failures tolerated before the watcher makes a
    /// final attempt and fatally stops.
    pub max_retries: u32,

    /// Backoff after the first failure; doubles per consecutive
    /// failure up to an internal ceiling.
    pub initial_backoff: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

/// Callback invoked with the change list when drift is detected.
pub type ChangeCallback = Box<dyn Fn(&[SchemaChange]) + Send + Sync>;

struct WatchState {
    watching: AtomicBool,
    snapshot: Mutex<Option<SchemaInfo>>,
    hash: Mutex<String>,
    /// Serializes ticks so a manual check never overlaps the loop.
    tick_lock: tokio::sync::Mutex<()>,
}

/// Polls a [`SchemaDiscovery`] for structural drift.
///
/// State machine: stopped -> watching -> stopped.
pub struct SchemaWatcher {
    discovery: Arc<SchemaDiscovery>,
    callbacks: Arc<Mutex<Vec<ChangeCallback>>>,
    state: Arc<WatchState>,
    handle: Option<JoinHandle<()>>,
}

impl SchemaWatcher {
    /// Create a stopped watcher over the given discovery facade.
    pub fn new(discovery: Arc<SchemaDiscovery>) -> Self {
        Self {
            discovery,
            callbacks: Arc::new(Mutex::new(Vec::new())),
            state: Arc::new(WatchState {
                watching: AtomicBool::new(false),
                snapshot: Mutex::new(None),
                hash: Mutex::new(String::new()),
                tick_lock: tokio::sync::Mutex::new(()),
            }),
            handle: None,
        }
    }

    /// Register a change callback. Callbacks are discarded on stop.
    pub fn on_schema_change(&self, callback: impl Fn(&[SchemaChange]) + Send + Sync + 'static) {
        self.callbacks.lock().unwrap().push(Box::new(callback));
    }

    /// Whether the poll loop is active.
    pub fn is_watching(&self) -> bool {
        self.state.watching.load(Ordering::SeqCst)
    }

    /// Take the initial snapshot and start the poll loop.
    ///
    /// A failed initial snapshot does not prevent watching: the
    /// sentinel hash is stored instead, and the first successful tick
    /// reports every table as added.
    pub async fn start_watching(&mut self, options: WatchOptions) -> Result<()> {
        if self.is_watching() {
            return Err(BridgeError::Watch("watcher is already running".into()));
        }

        match self.discovery.discover().await {
            Ok(schema) => {
                *self.state.hash.lock().unwrap() = schema_hash(&schema);
                *self.state.snapshot.lock().unwrap() = Some(schema);
            }
            Err(e) => {
                warn!("Initial snapshot failed; starting with sentinel hash: {}", e);
                *self.state.hash.lock().unwrap() = SENTINEL_HASH.to_string();
                *self.state.snapshot.lock().unwrap() = None;
            }
        }

        self.state.watching.store(true, Ordering::SeqCst);

        let discovery = self.discovery.clone();
        let callbacks = self.callbacks.clone();
        let state = self.state.clone();

        self.handle = Some(tokio::spawn(async move {
            Self::poll_loop(discovery, callbacks, state, options).await;
        }));

        info!("Schema watcher started");
        Ok(())
    }

    async fn poll_loop(
        discovery: Arc<SchemaDiscovery>,
        callbacks: Arc<Mutex<Vec<ChangeCallback>>>,
        state: Arc<WatchState>,
        options: WatchOptions,
    ) {
        let mut failures: u32 = 0;
        let mut delay = options.poll_interval;

        loop {
            tokio::time::sleep(delay).await;
            if !state.watching.load(Ordering::SeqCst) {
                break;
            }

            match Self::tick(&discovery, &callbacks, &state).await {
                Ok(_) => {
                    failures = 0;
                    delay = options.poll_interval;
                }
                Err(e) => {
                    failures += 1;
                    if failures >= options.max_retries {
                        warn!(
                            "Poll failed {} consecutive times; making final attempt",
                            failures
                        );
                        match Self::tick(&discovery, &callbacks, &state).await {
                            Ok(_) => error!("Watcher stopping: retry budget exhausted"),
                            Err(e) => error!(
                                "Watcher stopping: retry budget exhausted, final attempt \
                                 failed: {}",
                                e
                            ),
                        }
                        state.watching.store(false, Ordering::SeqCst);
                        callbacks.lock().unwrap().clear();
                        break;
                    }

                    delay = (options.initial_backoff * 2u32.pow(failures - 1)).min(MAX_BACKOFF);
                    warn!(
                        "Poll tick failed (attempt {}/{}), backing off {:?}: {}",
                        failures, options.max_retries, delay, e
                    );
                }
            }
        }
    }

    /// Run one tick: discover, hash, diff, notify.
    ///
    /// Shares semantics with the poll loop, so embedders can drive the
    /// watcher manually. With no prior snapshot, every table is
    /// reported as added; this makes a watcher restart noisy rather
    /// than silently missing changes.
    pub async fn check_for_changes(&self) -> Result<Vec<SchemaChange>> {
        Self::tick(&self.discovery, &self.callbacks, &self.state).await
    }

    async fn tick(
        discovery: &SchemaDiscovery,
        callbacks: &Mutex<Vec<ChangeCallback>>,
        state: &WatchState,
    ) -> Result<Vec<SchemaChange>> {
        let _guard = state.tick_lock.lock().await;

        let schema = discovery.discover().await?;
        let new_hash = schema_hash(&schema);

        let previous_hash = state.hash.lock().unwrap().clone();
        if previous_hash == new_hash {
            *state.snapshot.lock().unwrap() = Some(schema);
            return Ok(Vec::new());
        }

        let previous = state.snapshot.lock().unwrap().clone().unwrap_or_default();
        let changes = diff_schemas(&previous, &schema);

        if !changes.is_empty() {
            info!("Schema drift detected: {} changes", changes.len());
            for callback in callbacks.lock().unwrap().iter() {
                callback(&changes);
            }
        }

        // The stored snapshot advances even when no concrete change
        // was found (or no callback fired), so the next tick compares
        // against current reality.
        *state.snapshot.lock().unwrap() = Some(schema);
        *state.hash.lock().unwrap() = new_hash;

        Ok(changes)
    }

    /// Stop the poll loop and discard registered callbacks.
    ///
    /// Synchronous: after this returns no further tick is observable.
    pub fn stop_watching(&mut self) {
        self.state.watching.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.callbacks.lock().unwrap().clear();
        info!("Schema watcher stopped");
    }
}

impl Drop for SchemaWatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Canonical, order-independent schema hash.
///
/// Tables are sorted by name and relationships by from-table before
/// hashing; each column contributes exactly its name, type, nullable
/// flag, primary-key flag, and default value. Discovery order therefore
/// never changes the hash.
pub fn schema_hash(schema: &SchemaInfo) -> String {
    let mut canonical = String::new();

    let mut tables: Vec<_> = schema.tables.iter().collect();
    tables.sort_by(|a, b| a.name.cmp(&b.name));
    for table in tables {
        canonical.push_str("table:");
        canonical.push_str(&table.name);
        canonical.push('\n');
        for col in &table.columns {
            canonical.push_str(&format!(
                "  col:{}|{}|{}|{}|{}\n",
                col.name,
                col.data_type,
                col.is_nullable,
                col.is_primary_key,
                col.default_value.as_deref().unwrap_or(""),
            ));
        }
    }

    let mut relationships: Vec<_> = schema.relationships.iter().collect();
    relationships.sort_by(|a, b| {
        (&a.from_table, &a.name, &a.to_table).cmp(&(&b.from_table, &b.name, &b.to_table))
    });
    for rel in relationships {
        canonical.push_str(&format!(
            "rel:{}|{}|{:?}|{}|{}\n",
            rel.from_table, rel.from_column, rel.kind, rel.to_table, rel.to_column,
        ));
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}
