//! Synchronization orchestrator.
//!
//! Handles one change event end to end. Side effects happen in a fixed order
//! (mapping lookup, source fetch, target write, mapping write) and each branch
//! ends with exactly one `{family}-{action}-{outcome}` telemetry event.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use syncbridge_connector::{
    ConnectorError, EntityMapping, MappingStoreClient, SourceClient, TargetClient,
};
use syncbridge_events::{
    event_name, ChangeEvent, TelemetryAttributes, TelemetryEvent, TelemetrySink,
};

use crate::error::{SyncError, SyncResult};
use crate::sync::retry::{MappingRetryQueue, RetryContext};
use crate::sync::strategy::{DuplicatePolicy, EntitySyncStrategy, StrategyRegistry, SyncAction};

/// How a handled event ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Target record and mapping created.
    Created { target_id: String },
    /// A mapping already existed; nothing was written.
    AlreadyMapped { target_id: String },
    /// Mapping store reported a duplicate; manual reconciliation needed.
    Duplicate {
        existing: Box<EntityMapping>,
        duplicate: Box<EntityMapping>,
    },
    /// Target record created, mapping write handed to the retry coordinator.
    MappingRetryScheduled { target_id: String },
    /// Target record created, mapping write rejected permanently and dead-lettered.
    MappingDeadLettered { target_id: String },
    Updated { target_id: String },
    Deleted { target_id: String },
    /// Update or delete for an entity that was never synchronized.
    NotMapped,
}

impl SyncOutcome {
    /// Outcome segment of the terminal telemetry event name.
    #[must_use]
    pub fn telemetry_outcome(&self) -> &'static str {
        match self {
            Self::Created { .. } | Self::Updated { .. } | Self::Deleted { .. } => "success",
            Self::AlreadyMapped { .. } => "skipped",
            Self::Duplicate { .. } => "duplicate",
            Self::MappingRetryScheduled { .. } | Self::MappingDeadLettered { .. } => {
                "mapping-failed"
            }
            Self::NotMapped => "not-found",
        }
    }
}

/// Consumes change events and keeps the target system and mapping store in step.
pub struct SyncOrchestrator {
    registry: Arc<StrategyRegistry>,
    source: Arc<dyn SourceClient>,
    target: Arc<dyn TargetClient>,
    mapping_store: Arc<dyn MappingStoreClient>,
    retry_queue: Arc<dyn MappingRetryQueue>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl SyncOrchestrator {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        source: Arc<dyn SourceClient>,
        target: Arc<dyn TargetClient>,
        mapping_store: Arc<dyn MappingStoreClient>,
        retry_queue: Arc<dyn MappingRetryQueue>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            registry,
            source,
            target,
            mapping_store,
            retry_queue,
            telemetry,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Handle one change event.
    ///
    /// Errors are returned after the terminal telemetry event so the transport
    /// can redeliver (transient) or dead-letter (permanent).
    #[instrument(skip(self, event), fields(
        event_type = %event.event_type(),
        source_id = %event.source_entity_id(),
    ))]
    pub async fn handle(&self, event: &ChangeEvent) -> SyncResult<SyncOutcome> {
        let Some((strategy, action)) = self.registry.resolve(event.event_type()) else {
            warn!("No strategy registered for event type");
            return Err(SyncError::UnknownEventType {
                event_type: event.event_type().to_string(),
            });
        };
        let family = strategy.family().to_string();

        let mut attributes = strategy.telemetry_attributes(event);
        attributes.insert("sourceId".to_string(), event.source_entity_id().to_string());
        attributes.insert("eventType".to_string(), event.event_type().to_string());

        let result = match action {
            SyncAction::Create => self.create(strategy.as_ref(), event, &mut attributes).await,
            SyncAction::Update => self.update(strategy.as_ref(), event, &mut attributes).await,
            SyncAction::Delete => self.delete(strategy.as_ref(), event, &mut attributes).await,
        };

        let outcome = match &result {
            Ok(outcome) => {
                info!(family = %family, action = %action, outcome = outcome.telemetry_outcome(), "Event handled");
                outcome.telemetry_outcome()
            }
            Err(e) => {
                error!(family = %family, action = %action, error = %e, "Event handling failed");
                attributes.insert("error".to_string(), e.to_string());
                e.telemetry_outcome()
            }
        };

        self.telemetry.track(
            TelemetryEvent::new(event_name(&family, action.as_str(), outcome))
                .with_attributes(&attributes),
        );

        result
    }

    async fn find_mapping(
        &self,
        strategy: &dyn EntitySyncStrategy,
        source_id: &str,
    ) -> SyncResult<Option<EntityMapping>> {
        Ok(self
            .mapping_store
            .find_mapping(strategy.family(), strategy.source_key_type(), source_id)
            .await?)
    }

    async fn create(
        &self,
        strategy: &dyn EntitySyncStrategy,
        event: &ChangeEvent,
        attributes: &mut TelemetryAttributes,
    ) -> SyncResult<SyncOutcome> {
        let family = strategy.family();
        let source_id = event.source_entity_id();

        if let Some(existing) = self.find_mapping(strategy, source_id).await? {
            debug!(target_id = %existing.target_id, "Mapping exists, skipping create");
            attributes.insert("targetId".to_string(), existing.target_id.clone());
            return Ok(SyncOutcome::AlreadyMapped {
                target_id: existing.target_id,
            });
        }

        let source = self.source.fetch(family, source_id).await?;
        let payload = strategy.to_target(SyncAction::Create, event, &source)?;
        let target_id = self.target.create(family, payload).await?;
        attributes.insert("targetId".to_string(), target_id.clone());

        let mapping = EntityMapping::new(source_id, target_id.as_str(), strategy.mapping_type());

        match self.mapping_store.create_mapping(family, &mapping).await {
            Ok(()) => Ok(SyncOutcome::Created { target_id }),
            Err(ConnectorError::MappingConflict {
                existing,
                duplicate,
            }) => {
                warn!(
                    existing = %existing,
                    duplicate = %duplicate,
                    "Duplicate mapping detected"
                );
                attributes.insert("existingSourceId".to_string(), existing.source_id.clone());
                attributes.insert("existingTargetId".to_string(), existing.target_id.clone());
                attributes.insert("duplicateSourceId".to_string(), duplicate.source_id.clone());
                attributes.insert("duplicateTargetId".to_string(), duplicate.target_id.clone());

                match strategy.duplicate_policy() {
                    DuplicatePolicy::LogAndSucceed => Ok(SyncOutcome::Duplicate {
                        existing,
                        duplicate,
                    }),
                    DuplicatePolicy::Reject => Err(SyncError::DuplicateMapping {
                        existing,
                        duplicate,
                    }),
                }
            }
            Err(mapping_error) => {
                // The target record exists now; redelivering the event would create another.
                let context =
                    RetryContext::new(family, SyncAction::Create, mapping, attributes.clone());
                attributes.insert("mappingError".to_string(), mapping_error.to_string());

                let (handoff, outcome) = if mapping_error.is_transient() {
                    warn!(error = %mapping_error, target_id = %target_id, "Mapping write failed, scheduling retry");
                    (
                        self.retry_queue.submit(context).await,
                        SyncOutcome::MappingRetryScheduled {
                            target_id: target_id.clone(),
                        },
                    )
                } else {
                    warn!(error = %mapping_error, target_id = %target_id, "Mapping write rejected, dead-lettering");
                    (
                        self.retry_queue
                            .dead_letter(context, mapping_error.to_string())
                            .await,
                        SyncOutcome::MappingDeadLettered {
                            target_id: target_id.clone(),
                        },
                    )
                };

                if let Err(handoff_error) = handoff {
                    error!(error = %handoff_error, target_id = %target_id, "Could not hand off mapping write");
                    attributes.insert("retryError".to_string(), handoff_error.to_string());
                }

                Ok(outcome)
            }
        }
    }

    async fn update(
        &self,
        strategy: &dyn EntitySyncStrategy,
        event: &ChangeEvent,
        attributes: &mut TelemetryAttributes,
    ) -> SyncResult<SyncOutcome> {
        let family = strategy.family();
        let source_id = event.source_entity_id();

        let Some(mapping) = self.find_mapping(strategy, source_id).await? else {
            warn!("No mapping found, nothing to update");
            return Ok(SyncOutcome::NotMapped);
        };
        attributes.insert("targetId".to_string(), mapping.target_id.clone());

        let source = self.source.fetch(family, source_id).await?;
        let payload = strategy.to_target(SyncAction::Update, event, &source)?;
        self.target
            .update(family, &mapping.target_id, payload)
            .await?;

        Ok(SyncOutcome::Updated {
            target_id: mapping.target_id,
        })
    }

    async fn delete(
        &self,
        strategy: &dyn EntitySyncStrategy,
        event: &ChangeEvent,
        attributes: &mut TelemetryAttributes,
    ) -> SyncResult<SyncOutcome> {
        let Some(mapping) = self
            .find_mapping(strategy, event.source_entity_id())
            .await?
        else {
            warn!("No mapping found, nothing to delete");
            return Ok(SyncOutcome::NotMapped);
        };
        attributes.insert("targetId".to_string(), mapping.target_id.clone());

        self.target
            .delete(strategy.family(), &mapping.target_id)
            .await?;

        Ok(SyncOutcome::Deleted {
            target_id: mapping.target_id,
        })
    }
}
