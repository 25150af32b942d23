//! Shared data model for mappings and reconciliation counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key used to line up source and target count records (e.g. a booking id).
pub type ComparisonKey = i64;

/// How a mapping came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingType {
    /// Created by event-driven synchronization from the source system.
    SourceCreated,
    /// Created by the target system and linked back.
    TargetCreated,
    /// Created by a bulk migration.
    Migrated,
    /// Any value this client does not know about.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for MappingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceCreated => write!(f, "SOURCE_CREATED"),
            Self::TargetCreated => write!(f, "TARGET_CREATED"),
            Self::Migrated => write!(f, "MIGRATED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Persisted translation between a source identifier and a target identifier.
///
/// At most one mapping exists per `source_id`; the mapping store enforces this
/// and answers a second create with a conflict carrying the existing mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMapping {
    pub source_id: String,
    pub target_id: String,
    pub mapping_type: MappingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl EntityMapping {
    /// Create a mapping stamped with the current time.
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        mapping_type: MappingType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            mapping_type,
            created_at: Some(Utc::now()),
        }
    }

    /// Whether two mappings link the same pair of identifiers.
    #[must_use]
    pub fn same_pair(&self, other: &EntityMapping) -> bool {
        self.source_id == other.source_id && self.target_id == other.target_id
    }
}

impl std::fmt::Display for EntityMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.source_id, self.target_id)
    }
}

/// Batch of child-record mapping changes applied in a single call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildMappingBatch {
    #[serde(default)]
    pub to_create: Vec<EntityMapping>,
    #[serde(default)]
    pub to_update: Vec<EntityMapping>,
    #[serde(default)]
    pub to_delete: Vec<EntityMapping>,
}

impl ChildMappingBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn create(mut self, mapping: EntityMapping) -> Self {
        self.to_create.push(mapping);
        self
    }

    #[must_use]
    pub fn update(mut self, mapping: EntityMapping) -> Self {
        self.to_update.push(mapping);
        self
    }

    #[must_use]
    pub fn delete(mut self, mapping: EntityMapping) -> Self {
        self.to_delete.push(mapping);
        self
    }

    /// Total number of changes in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-key count produced independently by each system for a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRecord<K = ComparisonKey> {
    pub key: K,
    pub count: u64,
}

impl<K> CountRecord<K> {
    pub fn new(key: K, count: u64) -> Self {
        Self { key, count }
    }
}

/// Richer record for a mismatched key, fetched only when needed for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDetail {
    pub key: ComparisonKey,
    /// Business identifier of the subject (e.g. an offender number).
    pub subject_ref: String,
    /// Partition the subject currently belongs to.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl SubjectDetail {
    /// Whether the subject now lives outside the given partition.
    #[must_use]
    pub fn has_moved_from(&self, partition: &str) -> bool {
        self.location
            .as_deref()
            .is_some_and(|location| location != partition)
    }
}
