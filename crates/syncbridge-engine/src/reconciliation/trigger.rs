//! Fire-and-forget reconciliation trigger.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use super::report::ReconciliationSummary;
use super::runner::{
    ReconciliationError, ReconciliationResult, ReconciliationRunner, ReconciliationScope,
};

/// Returned as soon as a run has been spawned.
#[derive(Debug)]
pub struct TriggerAccepted {
    pub run_id: Uuid,
    pub scope: ReconciliationScope,
    handle: JoinHandle<ReconciliationResult<ReconciliationSummary>>,
}

impl TriggerAccepted {
    /// Wait for the spawned run. Dropping the acceptance detaches it instead.
    pub async fn wait(self) -> ReconciliationResult<ReconciliationSummary> {
        self.handle
            .await
            .map_err(|e| ReconciliationError::Aborted(e.to_string()))?
    }
}

/// Starts report runs in the background.
#[derive(Clone)]
pub struct ReconciliationTrigger {
    runner: Arc<ReconciliationRunner>,
}

impl ReconciliationTrigger {
    pub fn new(runner: Arc<ReconciliationRunner>) -> Self {
        Self { runner }
    }

    #[must_use]
    pub fn runner(&self) -> &ReconciliationRunner {
        &self.runner
    }

    /// Spawn a run and return immediately. The outcome is observable through
    /// telemetry, or through [`TriggerAccepted::wait`].
    pub fn trigger(&self, scope: ReconciliationScope) -> TriggerAccepted {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            reconciliation = %self.runner.kind().name(),
            scope = %scope,
            "Reconciliation run accepted"
        );

        let runner = Arc::clone(&self.runner);
        let run_scope = scope.clone();
        let handle = tokio::spawn(async move { runner.execute(run_id, &run_scope).await });

        TriggerAccepted {
            run_id,
            scope,
            handle,
        }
    }
}
