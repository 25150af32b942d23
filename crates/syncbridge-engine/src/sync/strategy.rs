//! Per-family synchronization strategies.
//!
//! A strategy owns everything domain specific about one entity family: which
//! event types it reacts to, where the source id lives in the envelope, how a
//! source record becomes a target payload, and how duplicates are treated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use syncbridge_connector::MappingType;
use syncbridge_events::{ChangeEvent, EventEnvelope, TelemetryAttributes};

use crate::error::{SyncError, SyncResult};

/// Lifecycle action carried by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl SyncAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when the mapping store reports a duplicate on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Emit a duplicate event and finish the event successfully.
    #[default]
    LogAndSucceed,
    /// Fail the event permanently so it lands in the dead-letter queue.
    Reject,
}

/// Source to target transform.
pub type TransformFn =
    dyn Fn(SyncAction, &ChangeEvent, &serde_json::Value) -> SyncResult<serde_json::Value>
        + Send
        + Sync;

/// Domain-specific behaviour for one entity family.
pub trait EntitySyncStrategy: Send + Sync {
    /// Family name used in mapping URLs and telemetry (e.g. "activity").
    fn family(&self) -> &str;

    /// Event types this family reacts to and the action each one means.
    fn event_types(&self) -> Vec<(String, SyncAction)>;

    /// `additionalInformation` entry holding the source id.
    fn source_id_attribute(&self) -> &str;

    /// Mapping store key type for source-id lookups.
    fn source_key_type(&self) -> &str {
        "source-id"
    }

    /// Type stamped on mappings created by this family.
    fn mapping_type(&self) -> MappingType {
        MappingType::SourceCreated
    }

    /// Turn a source record into a target payload.
    ///
    /// Returns [`SyncError::Validation`] for data with no target equivalent.
    fn to_target(
        &self,
        action: SyncAction,
        event: &ChangeEvent,
        source: &serde_json::Value,
    ) -> SyncResult<serde_json::Value>;

    /// Business-key attributes added to every telemetry event for this family.
    fn telemetry_attributes(&self, _event: &ChangeEvent) -> TelemetryAttributes {
        TelemetryAttributes::new()
    }

    fn duplicate_policy(&self) -> DuplicatePolicy {
        DuplicatePolicy::default()
    }
}

/// Closure-configured strategy for families that need no custom type.
pub struct FamilyStrategy {
    family: String,
    event_types: Vec<(String, SyncAction)>,
    source_id_attribute: String,
    source_key_type: String,
    mapping_type: MappingType,
    business_keys: Vec<(String, String)>,
    duplicate_policy: DuplicatePolicy,
    transform: Arc<TransformFn>,
}

impl FamilyStrategy {
    /// Start building a strategy for `family`.
    pub fn builder(family: impl Into<String>) -> FamilyStrategyBuilder {
        FamilyStrategyBuilder {
            family: family.into(),
            event_types: Vec::new(),
            source_id_attribute: "id".to_string(),
            source_key_type: "source-id".to_string(),
            mapping_type: MappingType::SourceCreated,
            business_keys: Vec::new(),
            duplicate_policy: DuplicatePolicy::default(),
            transform: None,
        }
    }
}

impl EntitySyncStrategy for FamilyStrategy {
    fn family(&self) -> &str {
        &self.family
    }

    fn event_types(&self) -> Vec<(String, SyncAction)> {
        self.event_types.clone()
    }

    fn source_id_attribute(&self) -> &str {
        &self.source_id_attribute
    }

    fn source_key_type(&self) -> &str {
        &self.source_key_type
    }

    fn mapping_type(&self) -> MappingType {
        self.mapping_type
    }

    fn to_target(
        &self,
        action: SyncAction,
        event: &ChangeEvent,
        source: &serde_json::Value,
    ) -> SyncResult<serde_json::Value> {
        (self.transform)(action, event, source)
    }

    fn telemetry_attributes(&self, event: &ChangeEvent) -> TelemetryAttributes {
        self.business_keys
            .iter()
            .filter_map(|(attribute, telemetry_key)| {
                event
                    .attribute(attribute)
                    .map(|v| (telemetry_key.clone(), v.to_string()))
            })
            .collect()
    }

    fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }
}

/// Builder for [`FamilyStrategy`].
pub struct FamilyStrategyBuilder {
    family: String,
    event_types: Vec<(String, SyncAction)>,
    source_id_attribute: String,
    source_key_type: String,
    mapping_type: MappingType,
    business_keys: Vec<(String, String)>,
    duplicate_policy: DuplicatePolicy,
    transform: Option<Arc<TransformFn>>,
}

impl FamilyStrategyBuilder {
    /// React to `event_type` with `action`.
    #[must_use]
    pub fn on(mut self, event_type: impl Into<String>, action: SyncAction) -> Self {
        self.event_types.push((event_type.into(), action));
        self
    }

    #[must_use]
    pub fn source_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.source_id_attribute = attribute.into();
        self
    }

    #[must_use]
    pub fn source_key_type(mut self, key_type: impl Into<String>) -> Self {
        self.source_key_type = key_type.into();
        self
    }

    #[must_use]
    pub fn mapping_type(mut self, mapping_type: MappingType) -> Self {
        self.mapping_type = mapping_type;
        self
    }

    /// Copy event attribute `attribute` into telemetry as `telemetry_key`.
    #[must_use]
    pub fn business_key(
        mut self,
        attribute: impl Into<String>,
        telemetry_key: impl Into<String>,
    ) -> Self {
        self.business_keys
            .push((attribute.into(), telemetry_key.into()));
        self
    }

    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    #[must_use]
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(SyncAction, &ChangeEvent, &serde_json::Value) -> SyncResult<serde_json::Value>
            + Send
            + Sync
            + 'static,
    {
        let transform: Arc<TransformFn> = Arc::new(transform);
        self.transform = Some(transform);
        self
    }

    /// Build the strategy. Without a transform the source record is sent as is.
    #[must_use]
    pub fn build(self) -> FamilyStrategy {
        let transform: Arc<TransformFn> = match self.transform {
            Some(transform) => transform,
            None => Arc::new(pass_through),
        };
        FamilyStrategy {
            family: self.family,
            event_types: self.event_types,
            source_id_attribute: self.source_id_attribute,
            source_key_type: self.source_key_type,
            mapping_type: self.mapping_type,
            business_keys: self.business_keys,
            duplicate_policy: self.duplicate_policy,
            transform,
        }
    }
}

fn pass_through(
    _action: SyncAction,
    _event: &ChangeEvent,
    source: &serde_json::Value,
) -> SyncResult<serde_json::Value> {
    Ok(source.clone())
}

/// Resolves strategies by event type.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    by_event_type: HashMap<String, (Arc<dyn EntitySyncStrategy>, SyncAction)>,
}

impl StrategyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy for all of its event types. A later registration
    /// for the same event type replaces the earlier one.
    #[must_use]
    pub fn register(mut self, strategy: Arc<dyn EntitySyncStrategy>) -> Self {
        for (event_type, action) in strategy.event_types() {
            if let Some((previous, _)) = self
                .by_event_type
                .insert(event_type.clone(), (strategy.clone(), action))
            {
                warn!(
                    event_type = %event_type,
                    previous_family = %previous.family(),
                    family = %strategy.family(),
                    "Event type registered twice, keeping the latest strategy"
                );
            }
        }
        self
    }

    /// Strategy and action for an event type.
    #[must_use]
    pub fn resolve(&self, event_type: &str) -> Option<(Arc<dyn EntitySyncStrategy>, SyncAction)> {
        self.by_event_type
            .get(event_type)
            .map(|(strategy, action)| (strategy.clone(), *action))
    }

    /// Parse a raw message body into a change event.
    pub fn parse(&self, body: &[u8]) -> SyncResult<ChangeEvent> {
        let envelope = EventEnvelope::from_slice(body)?;
        let (strategy, _) =
            self.resolve(&envelope.event_type)
                .ok_or_else(|| SyncError::UnknownEventType {
                    event_type: envelope.event_type.clone(),
                })?;
        Ok(envelope.into_change_event(strategy.source_id_attribute())?)
    }

    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_event_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
