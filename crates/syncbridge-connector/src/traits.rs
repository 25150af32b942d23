//! Client traits
//!
//! Capability-based interfaces for the systems the engine talks to. Each is
//! injected by constructor so tests can substitute fakes.

use async_trait::async_trait;

use crate::error::ConnectorResult;
use crate::types::{ChildMappingBatch, ComparisonKey, CountRecord, EntityMapping, SubjectDetail};

/// Read access to the system of record.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch the full record for one entity.
    ///
    /// # Arguments
    /// * `family` - The entity family (e.g. "activity", "allocation")
    /// * `source_id` - Identifier of the entity in the source system
    async fn fetch(&self, family: &str, source_id: &str) -> ConnectorResult<serde_json::Value>;
}

/// Write access to the legacy system being kept in sync.
#[async_trait]
pub trait TargetClient: Send + Sync {
    /// Create a record and return its target identifier.
    async fn create(&self, family: &str, payload: serde_json::Value) -> ConnectorResult<String>;

    /// Replace the record identified by `target_id`.
    async fn update(
        &self,
        family: &str,
        target_id: &str,
        payload: serde_json::Value,
    ) -> ConnectorResult<()>;

    /// Delete the record identified by `target_id`.
    async fn delete(&self, family: &str, target_id: &str) -> ConnectorResult<()>;
}

/// Persisted source/target identifier translation.
#[async_trait]
pub trait MappingStoreClient: Send + Sync {
    /// Look up a mapping. An absent mapping is `Ok(None)`, not an error.
    ///
    /// # Arguments
    /// * `family` - The entity family
    /// * `key_type` - Which identifier `id` is (e.g. "source-id", "target-id")
    /// * `id` - The identifier value
    async fn find_mapping(
        &self,
        family: &str,
        key_type: &str,
        id: &str,
    ) -> ConnectorResult<Option<EntityMapping>>;

    /// Persist a new mapping.
    ///
    /// Fails with [`crate::ConnectorError::MappingConflict`] when either side is
    /// already mapped.
    async fn create_mapping(&self, family: &str, mapping: &EntityMapping) -> ConnectorResult<()>;

    /// Apply a batch of child-record mapping changes.
    async fn update_child_mappings(
        &self,
        family: &str,
        batch: &ChildMappingBatch,
    ) -> ConnectorResult<()>;
}

/// Per-key counts used by reconciliation, implemented once per system.
#[async_trait]
pub trait CountClient: Send + Sync {
    /// Counts for a batch of keys within a partition. Keys without a record are omitted.
    async fn counts(
        &self,
        partition: &str,
        keys: &[ComparisonKey],
    ) -> ConnectorResult<Vec<CountRecord>>;

    /// Count for a single key.
    async fn count(
        &self,
        partition: &str,
        key: ComparisonKey,
    ) -> ConnectorResult<Option<CountRecord>> {
        let records = self.counts(partition, &[key]).await?;
        Ok(records.into_iter().find(|record| record.key == key))
    }
}

/// Enumerates the population of comparison keys.
#[async_trait]
pub trait PopulationClient: Send + Sync {
    /// Partitions that make up the whole active population.
    async fn active_partitions(&self) -> ConnectorResult<Vec<String>>;

    /// Total number of keys in a partition.
    async fn population_size(&self, partition: &str) -> ConnectorResult<u64>;

    /// One page of keys, zero-based.
    async fn population_page(
        &self,
        partition: &str,
        page: u64,
        page_size: u64,
    ) -> ConnectorResult<Vec<ComparisonKey>>;
}

/// Detail lookup for mismatched keys.
#[async_trait]
pub trait DetailClient: Send + Sync {
    async fn subject_detail(&self, key: ComparisonKey) -> ConnectorResult<SubjectDetail>;
}
