//! Synchronization protocol tests.
//!
//! Drives the orchestrator, retry coordinator, worker and transport against
//! in-memory fakes and asserts on call counts, telemetry and dead letters.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{
    rejected, transient, FailingDeadLetterQueue, FakeMappingStore, FakeSource, FakeTarget,
};
use syncbridge_connector::{EntityMapping, MappingType};
use syncbridge_engine::{
    DeadLetterPayload, DeadLetterQueue, DeliveryOutcome, DuplicatePolicy, FamilyStrategy,
    InMemoryDeadLetterQueue, MappingRetryQueue, RedeliveringTransport, RetryCoordinator, RetryOutcome, RetryPolicy,
    RetryWorker, RetryWorkerConfig, StrategyRegistry, SyncAction, SyncError, SyncOrchestrator,
    SyncOutcome,
};
use syncbridge_events::{ChangeEvent, RecordingTelemetry};

const CREATED: &str = "activities.activity-schedule.created";
const AMENDED: &str = "activities.activity-schedule.amended";
const DELETED: &str = "activities.activity-schedule.deleted";

struct Harness {
    source: Arc<FakeSource>,
    target: Arc<FakeTarget>,
    mappings: Arc<FakeMappingStore>,
    dead_letters: Arc<InMemoryDeadLetterQueue>,
    telemetry: Arc<RecordingTelemetry>,
    coordinator: Arc<RetryCoordinator>,
    orchestrator: Arc<SyncOrchestrator>,
}

fn strategy(policy: DuplicatePolicy) -> FamilyStrategy {
    FamilyStrategy::builder("activity")
        .on(CREATED, SyncAction::Create)
        .on(AMENDED, SyncAction::Update)
        .on(DELETED, SyncAction::Delete)
        .source_id_attribute("activityScheduleId")
        .business_key("prisonId", "prisonId")
        .duplicate_policy(policy)
        .transform(|_, _, source| {
            let category = source["category"]
                .as_str()
                .ok_or_else(|| SyncError::validation("activity", "missing category"))?;
            Ok(json!({ "programCode": category }))
        })
        .build()
}

fn harness_with(mappings: FakeMappingStore, policy: DuplicatePolicy) -> Harness {
    let source = Arc::new(FakeSource::default());
    let target = Arc::new(FakeTarget::default());
    let mappings = Arc::new(mappings);
    let dead_letters = Arc::new(InMemoryDeadLetterQueue::new());
    let telemetry = Arc::new(RecordingTelemetry::default());

    let coordinator = Arc::new(RetryCoordinator::new(
        mappings.clone(),
        dead_letters.clone(),
        telemetry.clone(),
        RetryPolicy::immediate(3),
    ));
    let registry = Arc::new(StrategyRegistry::new().register(Arc::new(strategy(policy))));
    let orchestrator = Arc::new(SyncOrchestrator::new(
        registry,
        source.clone(),
        target.clone(),
        mappings.clone(),
        coordinator.clone(),
        telemetry.clone(),
    ));

    Harness {
        source,
        target,
        mappings,
        dead_letters,
        telemetry,
        coordinator,
        orchestrator,
    }
}

fn orchestrator_with(
    mappings: Arc<FakeMappingStore>,
    retry_queue: Arc<dyn MappingRetryQueue>,
    telemetry: Arc<RecordingTelemetry>,
) -> SyncOrchestrator {
    SyncOrchestrator::new(
        Arc::new(
            StrategyRegistry::new().register(Arc::new(strategy(DuplicatePolicy::LogAndSucceed))),
        ),
        Arc::new(FakeSource::default()),
        Arc::new(FakeTarget::default()),
        mappings,
        retry_queue,
        telemetry,
    )
}

fn harness() -> Harness {
    harness_with(FakeMappingStore::default(), DuplicatePolicy::LogAndSucceed)
}

fn created(source_id: &str) -> ChangeEvent {
    ChangeEvent::new(CREATED, source_id).with_attribute("prisonId", "MDI")
}

fn mapping(source_id: &str, target_id: &str) -> EntityMapping {
    EntityMapping::new(source_id, target_id, MappingType::SourceCreated)
}

fn body(event_type: &str, source_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "eventType": event_type,
        "additionalInformation": { "activityScheduleId": source_id, "prisonId": "MDI" }
    }))
    .unwrap()
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_writes_target_then_mapping() {
    let h = harness();

    let outcome = h.orchestrator.handle(&created("123")).await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Created {
            target_id: "T1".to_string()
        }
    );
    assert_eq!(h.target.creates(), 1);
    assert_eq!(h.target.payloads.lock().unwrap()[0], json!({ "programCode": "EDU" }));
    assert_eq!(h.mappings.mapping_for("123").unwrap().target_id, "T1");

    let events = h.telemetry.named("activity-create-success");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].attribute("sourceId"), Some("123"));
    assert_eq!(events[0].attribute("targetId"), Some("T1"));
    assert_eq!(events[0].attribute("prisonId"), Some("MDI"));
}

#[tokio::test]
async fn test_create_is_idempotent_when_mapping_exists() {
    let h = harness_with(
        FakeMappingStore::with_mapping(mapping("123", "T99")),
        DuplicatePolicy::LogAndSucceed,
    );

    let outcome = h.orchestrator.handle(&created("123")).await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::AlreadyMapped {
            target_id: "T99".to_string()
        }
    );
    assert_eq!(h.source.calls(), 0);
    assert_eq!(h.target.creates(), 0);
    assert_eq!(h.mappings.creates(), 0);
    assert_eq!(h.telemetry.count("activity-create-skipped"), 1);
}

#[tokio::test]
async fn test_redelivered_create_does_not_duplicate_target_record() {
    let h = harness();

    h.orchestrator.handle(&created("123")).await.unwrap();
    h.orchestrator.handle(&created("123")).await.unwrap();

    assert_eq!(h.target.creates(), 1);
    assert_eq!(h.mappings.len(), 1);
}

#[tokio::test]
async fn test_target_failure_propagates_without_mapping_write() {
    let h = harness();
    h.target.fail_creates([transient()]);

    let err = h.orchestrator.handle(&created("123")).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(h.mappings.creates(), 0);
    let events = h.telemetry.named("activity-create-failed");
    assert_eq!(events.len(), 1);
    assert!(events[0].attribute("error").is_some());
}

#[tokio::test]
async fn test_validation_failure_is_permanent() {
    let h = harness();
    let strict = FamilyStrategy::builder("visit")
        .on("visits.created", SyncAction::Create)
        .transform(|_, _, source| {
            source["visitType"]
                .as_str()
                .map(|visit_type| json!({ "type": visit_type }))
                .ok_or_else(|| SyncError::validation("visit", "missing visitType"))
        })
        .build();
    let orchestrator = SyncOrchestrator::new(
        Arc::new(StrategyRegistry::new().register(Arc::new(strict))),
        h.source.clone(),
        h.target.clone(),
        h.mappings.clone(),
        h.coordinator.clone(),
        h.telemetry.clone(),
    );

    let err = orchestrator
        .handle(&ChangeEvent::new("visits.created", "7"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Validation { .. }));
    assert!(!err.is_retryable());
    assert_eq!(h.target.creates(), 0);
    assert_eq!(h.telemetry.count("visit-create-failed"), 1);
}

#[tokio::test]
async fn test_unknown_event_type_emits_no_family_telemetry() {
    let h = harness();

    let err = h
        .orchestrator
        .handle(&ChangeEvent::new("activities.unknown", "1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::UnknownEventType { .. }));
    assert!(!err.is_retryable());
    assert!(h.telemetry.events().is_empty());
}

// ============================================================================
// Duplicates
// ============================================================================

#[tokio::test]
async fn test_duplicate_is_logged_and_succeeds() {
    // Another source id already claims the id the target will hand out.
    let h = harness_with(
        FakeMappingStore::with_mapping(mapping("999", "T1")),
        DuplicatePolicy::LogAndSucceed,
    );

    let outcome = h.orchestrator.handle(&created("123")).await.unwrap();

    assert!(matches!(outcome, SyncOutcome::Duplicate { .. }));
    assert_eq!(h.target.creates(), 1);
    assert_eq!(h.mappings.creates(), 1);
    assert!(h.dead_letters.is_empty().await);

    let events = h.telemetry.named("activity-create-duplicate");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].attribute("existingSourceId"), Some("999"));
    assert_eq!(events[0].attribute("existingTargetId"), Some("T1"));
    assert_eq!(events[0].attribute("duplicateSourceId"), Some("123"));
    assert_eq!(events[0].attribute("duplicateTargetId"), Some("T1"));
}

#[tokio::test]
async fn test_duplicate_rejected_by_policy() {
    let h = harness_with(
        FakeMappingStore::with_mapping(mapping("999", "T1")),
        DuplicatePolicy::Reject,
    );

    let err = h.orchestrator.handle(&created("123")).await.unwrap_err();

    assert!(err.is_duplicate());
    assert!(!err.is_retryable());
    assert_eq!(h.mappings.creates(), 1);
    assert_eq!(h.telemetry.count("activity-create-duplicate"), 1);
}

// ============================================================================
// Mapping retry
// ============================================================================

#[tokio::test]
async fn test_mapping_failure_retries_only_the_mapping_write() {
    let h = harness();
    h.mappings.fail_creates([transient()]);

    let outcome = h.orchestrator.handle(&created("123")).await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::MappingRetryScheduled {
            target_id: "T1".to_string()
        }
    );
    assert_eq!(h.target.creates(), 1);
    assert_eq!(h.mappings.creates(), 2);
    assert_eq!(h.mappings.mapping_for("123").unwrap().target_id, "T1");

    let success = h.telemetry.named("activity-create-mapping-retry-success");
    assert_eq!(success.len(), 1);
    assert_eq!(success[0].attribute("attempts"), Some("1"));
    assert_eq!(h.telemetry.count("activity-create-mapping-failed"), 1);
}

#[tokio::test]
async fn test_mapping_dead_lettered_after_max_attempts() {
    let h = harness();
    // Initial write plus three retries.
    h.mappings
        .fail_creates([transient(), transient(), transient(), transient()]);

    h.orchestrator.handle(&created("123")).await.unwrap();

    assert_eq!(h.target.creates(), 1);
    assert_eq!(h.mappings.creates(), 4);
    assert!(h.mappings.mapping_for("123").is_none());

    let entries = h.dead_letters.list().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attempt_count, 3);
    assert_eq!(entries[0].attempt_history.len(), 3);
    match &entries[0].payload {
        DeadLetterPayload::MappingRetry { context } => {
            assert_eq!(context.mapping.source_id, "123");
            assert_eq!(context.mapping.target_id, "T1");
            assert_eq!(context.action, SyncAction::Create);
        }
        other => panic!("unexpected payload {other:?}"),
    }

    let events = h.telemetry.named("activity-create-mapping-retry-dead-lettered");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].attribute("attempts"), Some("3"));
    assert_eq!(
        events[0].attribute("deadLetterId"),
        Some(entries[0].id.to_string().as_str())
    );
}

#[tokio::test]
async fn test_permanent_mapping_error_dead_letters_without_further_retries() {
    let h = harness();
    h.mappings.fail_creates([transient(), rejected()]);

    h.orchestrator.handle(&created("123")).await.unwrap();

    assert_eq!(h.mappings.creates(), 2);
    let entries = h.dead_letters.list().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attempt_count, 1);
}

#[tokio::test]
async fn test_rejected_first_mapping_write_dead_letters_immediately() {
    let h = harness();
    h.mappings.fail_creates([rejected()]);

    let outcome = h.orchestrator.handle(&created("123")).await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::MappingDeadLettered {
            target_id: "T1".to_string()
        }
    );
    assert_eq!(h.target.creates(), 1);
    assert_eq!(h.mappings.creates(), 1);

    let entries = h.dead_letters.list().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attempt_count, 0);
    assert!(entries[0].attempt_history.is_empty());

    let events = h.telemetry.named("activity-create-mapping-retry-dead-lettered");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].attribute("attempts"), Some("0"));
    assert_eq!(h.telemetry.count("activity-create-mapping-retry-success"), 0);
    assert_eq!(h.telemetry.count("activity-create-mapping-failed"), 1);
}

#[tokio::test]
async fn test_dead_letter_push_failure_is_reported() {
    let mappings = Arc::new(FakeMappingStore::default());
    mappings.fail_creates([transient(), transient(), transient(), transient()]);
    let dead_letters = Arc::new(FailingDeadLetterQueue::default());
    let telemetry = Arc::new(RecordingTelemetry::default());
    let coordinator = Arc::new(RetryCoordinator::new(
        mappings.clone(),
        dead_letters.clone(),
        telemetry.clone(),
        RetryPolicy::immediate(3),
    ));
    let orchestrator = orchestrator_with(mappings.clone(), coordinator, telemetry.clone());

    let outcome = orchestrator.handle(&created("123")).await.unwrap();

    assert!(matches!(outcome, SyncOutcome::MappingRetryScheduled { .. }));
    assert_eq!(dead_letters.pushes(), 1);

    let lost = telemetry.named("activity-create-mapping-retry-dead-letter-failed");
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].attribute("sourceId"), Some("123"));
    assert_eq!(lost[0].attribute("targetId"), Some("T1"));
    assert_eq!(lost[0].attribute("attempts"), Some("3"));
    assert!(lost[0].attribute("error").is_some());
    assert_eq!(
        telemetry.count("activity-create-mapping-retry-dead-lettered"),
        0
    );

    let failed = telemetry.named("activity-create-mapping-failed");
    assert_eq!(failed.len(), 1);
    assert!(failed[0].attribute("retryError").is_some());
}

#[tokio::test]
async fn test_retry_worker_reports_dead_letter_push_failure() {
    let mappings = Arc::new(FakeMappingStore::default());
    mappings.fail_creates([rejected()]);
    let dead_letters = Arc::new(FailingDeadLetterQueue::default());
    let telemetry = Arc::new(RecordingTelemetry::default());
    let coordinator = Arc::new(RetryCoordinator::new(
        mappings.clone(),
        dead_letters.clone(),
        telemetry.clone(),
        RetryPolicy::immediate(3),
    ));
    let (worker, handle) = RetryWorker::new(coordinator, RetryWorkerConfig::default());
    let worker_task = tokio::spawn(worker.run());
    let orchestrator = orchestrator_with(mappings.clone(), Arc::new(handle), telemetry.clone());

    let outcome = orchestrator.handle(&created("123")).await.unwrap();
    assert!(matches!(outcome, SyncOutcome::MappingDeadLettered { .. }));

    drop(orchestrator);
    worker_task.await.unwrap();

    assert_eq!(mappings.creates(), 1);
    assert_eq!(dead_letters.pushes(), 1);
    let lost = telemetry.named("activity-create-mapping-retry-dead-letter-failed");
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].attribute("sourceId"), Some("123"));
    assert_eq!(lost[0].attribute("targetId"), Some("T1"));
    assert_eq!(lost[0].attribute("attempts"), Some("0"));
}

#[tokio::test]
async fn test_handoff_to_stopped_worker_records_retry_error() {
    let mappings = Arc::new(FakeMappingStore::default());
    mappings.fail_creates([transient()]);
    let telemetry = Arc::new(RecordingTelemetry::default());
    let coordinator = Arc::new(RetryCoordinator::new(
        mappings.clone(),
        Arc::new(InMemoryDeadLetterQueue::new()),
        telemetry.clone(),
        RetryPolicy::immediate(3),
    ));
    let (worker, handle) = RetryWorker::new(coordinator, RetryWorkerConfig::default());
    drop(worker);
    let orchestrator = orchestrator_with(mappings.clone(), Arc::new(handle), telemetry.clone());

    let outcome = orchestrator.handle(&created("123")).await.unwrap();

    assert!(matches!(outcome, SyncOutcome::MappingRetryScheduled { .. }));
    assert_eq!(mappings.creates(), 1);
    let failed = telemetry.named("activity-create-mapping-failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0].attribute("retryError"),
        Some(SyncError::WorkerUnavailable.to_string().as_str())
    );
}

#[tokio::test]
async fn test_replay_dead_lettered_mapping_retry() {
    let h = harness();
    h.mappings
        .fail_creates([transient(), transient(), transient(), transient()]);
    h.orchestrator.handle(&created("123")).await.unwrap();
    let id = h.dead_letters.list().await.unwrap()[0].id;

    let outcome = h.coordinator.replay(id).await.unwrap();

    assert_eq!(outcome, RetryOutcome::Resolved { attempts: 1 });
    assert!(h.dead_letters.is_empty().await);
    assert_eq!(h.mappings.mapping_for("123").unwrap().target_id, "T1");
    assert_eq!(h.target.creates(), 1);
}

#[tokio::test]
async fn test_replay_unknown_dead_letter() {
    let h = harness();
    let err = h.coordinator.replay(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, SyncError::DeadLetterNotFound { .. }));
}

#[tokio::test]
async fn test_retry_worker_processes_and_drains() {
    let mappings = Arc::new(FakeMappingStore::default());
    mappings.fail_creates([transient()]);
    let target = Arc::new(FakeTarget::default());
    let telemetry = Arc::new(RecordingTelemetry::default());
    let coordinator = Arc::new(RetryCoordinator::new(
        mappings.clone(),
        Arc::new(InMemoryDeadLetterQueue::new()),
        telemetry.clone(),
        RetryPolicy::immediate(3),
    ));
    let (worker, handle) = RetryWorker::new(coordinator, RetryWorkerConfig::default());
    let worker_task = tokio::spawn(worker.run());

    let orchestrator = SyncOrchestrator::new(
        Arc::new(
            StrategyRegistry::new().register(Arc::new(strategy(DuplicatePolicy::LogAndSucceed))),
        ),
        Arc::new(FakeSource::default()),
        target.clone(),
        mappings.clone(),
        Arc::new(handle),
        telemetry.clone(),
    );

    let outcome = orchestrator.handle(&created("123")).await.unwrap();
    assert!(matches!(outcome, SyncOutcome::MappingRetryScheduled { .. }));

    drop(orchestrator);
    worker_task.await.unwrap();

    assert_eq!(mappings.mapping_for("123").unwrap().target_id, "T1");
    assert_eq!(target.creates(), 1);
    assert_eq!(telemetry.count("activity-create-mapping-retry-success"), 1);
}

// ============================================================================
// Update and delete
// ============================================================================

#[tokio::test]
async fn test_update_uses_mapped_target_id() {
    let h = harness_with(
        FakeMappingStore::with_mapping(mapping("5", "T5")),
        DuplicatePolicy::LogAndSucceed,
    );

    let outcome = h
        .orchestrator
        .handle(&ChangeEvent::new(AMENDED, "5"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Updated {
            target_id: "T5".to_string()
        }
    );
    assert_eq!(*h.target.updated.lock().unwrap(), vec!["T5".to_string()]);
    assert_eq!(h.telemetry.count("activity-update-success"), 1);
}

#[tokio::test]
async fn test_update_without_mapping_is_not_found() {
    let h = harness();

    let outcome = h
        .orchestrator
        .handle(&ChangeEvent::new(AMENDED, "5"))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::NotMapped);
    assert_eq!(h.source.calls(), 0);
    assert_eq!(h.target.updates(), 0);
    assert_eq!(h.telemetry.count("activity-update-not-found"), 1);
}

#[tokio::test]
async fn test_delete_uses_mapped_target_id() {
    let h = harness_with(
        FakeMappingStore::with_mapping(mapping("5", "T5")),
        DuplicatePolicy::LogAndSucceed,
    );

    let outcome = h
        .orchestrator
        .handle(&ChangeEvent::new(DELETED, "5"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Deleted {
            target_id: "T5".to_string()
        }
    );
    assert_eq!(*h.target.deleted.lock().unwrap(), vec!["T5".to_string()]);
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test]
async fn test_delete_without_mapping_is_not_found() {
    let h = harness();

    let outcome = h
        .orchestrator
        .handle(&ChangeEvent::new(DELETED, "5"))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::NotMapped);
    assert_eq!(h.target.deletes(), 0);
    assert_eq!(h.telemetry.count("activity-delete-not-found"), 1);
}

// ============================================================================
// Transport
// ============================================================================

#[tokio::test]
async fn test_transport_redelivers_transient_failures() {
    let h = harness();
    h.target.fail_creates([transient(), transient()]);
    let transport = RedeliveringTransport::new(h.orchestrator.clone(), h.dead_letters.clone(), 5);

    let outcome = transport.deliver(&body(CREATED, "123")).await.unwrap();

    assert_eq!(
        outcome,
        DeliveryOutcome::Handled {
            outcome: SyncOutcome::Created {
                target_id: "T1".to_string()
            },
            receive_count: 3,
        }
    );
    assert_eq!(h.target.creates(), 3);
    assert_eq!(h.mappings.len(), 1);
    assert_eq!(h.telemetry.count("activity-create-failed"), 2);
}

#[tokio::test]
async fn test_transport_dead_letters_after_receive_limit_and_replays() {
    let h = harness();
    h.target.fail_creates([transient(), transient(), transient()]);
    let transport = RedeliveringTransport::new(h.orchestrator.clone(), h.dead_letters.clone(), 3);

    let outcome = transport.deliver(&body(CREATED, "123")).await.unwrap();

    let DeliveryOutcome::DeadLettered {
        dead_letter_id,
        receive_count,
    } = outcome
    else {
        panic!("expected dead letter, got {outcome:?}");
    };
    assert_eq!(receive_count, 3);
    let entry = h.dead_letters.get(dead_letter_id).await.unwrap().unwrap();
    assert_eq!(entry.payload.kind(), "event");
    assert_eq!(entry.attempt_count, 3);

    let replayed = transport.replay(dead_letter_id).await.unwrap();
    assert!(matches!(
        replayed,
        DeliveryOutcome::Handled {
            outcome: SyncOutcome::Created { .. },
            receive_count: 1,
        }
    ));
    assert!(h.dead_letters.is_empty().await);
}

#[tokio::test]
async fn test_transport_dead_letters_permanent_failure_immediately() {
    let h = harness();
    h.target.fail_creates([rejected()]);
    let transport = RedeliveringTransport::new(h.orchestrator.clone(), h.dead_letters.clone(), 5);

    let outcome = transport.deliver(&body(CREATED, "123")).await.unwrap();

    assert!(matches!(
        outcome,
        DeliveryOutcome::DeadLettered {
            receive_count: 1,
            ..
        }
    ));
    assert_eq!(h.target.creates(), 1);
}

#[tokio::test]
async fn test_transport_dead_letters_malformed_body() {
    let h = harness();
    let transport = RedeliveringTransport::new(h.orchestrator.clone(), h.dead_letters.clone(), 5);

    let outcome = transport.deliver(b"not json").await.unwrap();

    assert!(matches!(outcome, DeliveryOutcome::DeadLettered { .. }));
    let entries = h.dead_letters.list().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].payload,
        DeadLetterPayload::Event {
            body: json!("not json")
        }
    );
    assert_eq!(h.target.creates(), 0);
}
