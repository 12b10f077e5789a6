//! Discovery facade tying an engine to the relationship engine.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::EndpointConfig;
use crate::core::schema::SchemaInfo;
use crate::core::traits::DatabaseEngine;
use crate::dialect::{Dialect, DialectCapabilities};
use crate::drivers::connect_engine;
use crate::error::Result;
use crate::relations::RelationshipEngine;

use super::{discover_tables, discover_views, DiscoverOptions};

/// Dialect-dispatch facade over one connected engine.
///
/// Stateless after construction; a single instance may serve many
/// concurrent discovery passes, each producing its own immutable
/// [`SchemaInfo`] snapshot.
pub struct SchemaDiscovery {
    engine: Arc<dyn DatabaseEngine>,
    relations: RelationshipEngine,
    dialect: Dialect,
}

impl SchemaDiscovery {
    /// Connect to the endpoint and build a discovery facade for it.
    ///
    /// Unsupported dialects fail here, before any discovery work.
    pub async fn connect(config: &EndpointConfig) -> Result<Self> {
        let engine = connect_engine(config).await?;
        Ok(Self::new(engine))
    }

    /// Wrap an already-connected engine.
    pub fn new(engine: Arc<dyn DatabaseEngine>) -> Self {
        let dialect = engine.dialect();
        Self {
            engine,
            relations: RelationshipEngine::default(),
            dialect,
        }
    }

    /// Replace the relationship engine (e.g. to tune the junction
    /// threshold).
    pub fn with_relationship_engine(mut self, relations: RelationshipEngine) -> Self {
        self.relations = relations;
        self
    }

    /// The dialect this facade discovers.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Capability lookup for this facade's dialect.
    pub fn capabilities(&self) -> DialectCapabilities {
        self.dialect.capabilities()
    }

    /// The underlying engine.
    pub fn engine(&self) -> &Arc<dyn DatabaseEngine> {
        &self.engine
    }

    /// Run one full discovery pass.
    pub async fn discover(&self) -> Result<SchemaInfo> {
        self.discover_with(&DiscoverOptions::default()).await
    }

    /// Run one full discovery pass with table filters.
    pub async fn discover_with(&self, options: &DiscoverOptions) -> Result<SchemaInfo> {
        let tables = discover_tables(self.engine.as_ref(), options).await?;
        let relationships = self.relations.discover_relationships(&tables);

        let views = if self.capabilities().supports_views {
            discover_views(self.engine.as_ref()).await?
        } else {
            debug!("Dialect {} does not support views; skipping", self.dialect);
            Vec::new()
        };

        info!(
            "Discovered {} tables, {} relationships, {} views",
            tables.len(),
            relationships.len(),
            views.len()
        );

        Ok(SchemaInfo {
            tables,
            relationships,
            views,
        })
    }

    /// Validate foreign key referential integrity across a snapshot.
    ///
    /// Violations are collected, never thrown.
    pub fn validate(&self, schema: &SchemaInfo) -> Vec<String> {
        self.relations.validate(&schema.tables)
    }

    /// Report foreign-key cycles in a snapshot as diagnostic path
    /// strings. Cycles are legal; nothing is rejected.
    pub fn detect_cycles(&self, schema: &SchemaInfo) -> Vec<String> {
        self.relations.detect_cycles(&schema.tables)
    }
}
