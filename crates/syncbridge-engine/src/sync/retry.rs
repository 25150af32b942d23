//! Mapping-write retry coordination.
//!
//! Runs when a target record was created but its mapping could not be saved.
//! Only the mapping write is retried; the target write is never repeated.
//!
//! ```text
//!  Pending ──► Retrying{1..=N} ──► Resolved
//!   ▲  │              │
//!   │  │              └──(N failures or permanent error)──► DeadLettered
//!   │  └──(permanent error on the first write)─────────────────►│
//!   └──────────────── replay ◄──────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use syncbridge_connector::{ConnectorError, EntityMapping, MappingStoreClient};
use syncbridge_events::{event_name, TelemetryAttributes, TelemetryEvent, TelemetrySink};

use crate::error::{SyncError, SyncResult};
use crate::sync::dead_letter::{AttemptRecord, DeadLetter, DeadLetterPayload, DeadLetterQueue};
use crate::sync::strategy::SyncAction;

/// Backoff between mapping-write attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = dead-letter straight away).
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempts and base delay.
    /// The maximum delay cap defaults to 60 seconds.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Policy without delays.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the zero-based `attempt`: `min(base * 2^attempt, max)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Lifecycle of one retry context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RetryState {
    Pending,
    Retrying { attempt: u32 },
    Resolved,
    DeadLettered,
}

impl RetryState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::DeadLettered)
    }
}

impl std::fmt::Display for RetryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Retrying { attempt } => write!(f, "retrying({attempt})"),
            Self::Resolved => write!(f, "resolved"),
            Self::DeadLettered => write!(f, "dead_lettered"),
        }
    }
}

/// Everything needed to retry a mapping write without touching the target system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryContext {
    pub id: Uuid,
    pub family: String,
    pub action: SyncAction,
    pub mapping: EntityMapping,
    pub telemetry_attributes: TelemetryAttributes,
}

impl RetryContext {
    pub fn new(
        family: impl Into<String>,
        action: SyncAction,
        mapping: EntityMapping,
        telemetry_attributes: TelemetryAttributes,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            family: family.into(),
            action,
            mapping,
            telemetry_attributes,
        }
    }

    fn event(&self, outcome: &str) -> TelemetryEvent {
        TelemetryEvent::new(event_name(&self.family, self.action.as_str(), outcome))
            .with_attributes(&self.telemetry_attributes)
    }
}

/// How a retry context ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Mapping saved after `attempts` retries.
    Resolved { attempts: u32 },
    /// Mapping store reported a different mapping for the same identifiers.
    Duplicate {
        existing: Box<EntityMapping>,
        duplicate: Box<EntityMapping>,
    },
    /// Context moved to the dead-letter queue.
    DeadLettered { dead_letter_id: Uuid, attempts: u32 },
}

impl RetryOutcome {
    /// Terminal state reached.
    #[must_use]
    pub fn state(&self) -> RetryState {
        match self {
            Self::Resolved { .. } | Self::Duplicate { .. } => RetryState::Resolved,
            Self::DeadLettered { .. } => RetryState::DeadLettered,
        }
    }
}

/// Hands retry contexts to whatever runs them.
#[async_trait]
pub trait MappingRetryQueue: Send + Sync {
    /// Retry the mapping write after a transient failure.
    async fn submit(&self, context: RetryContext) -> SyncResult<()>;

    /// Dead-letter the context without retrying, after a permanent failure.
    async fn dead_letter(&self, context: RetryContext, reason: String) -> SyncResult<()>;
}

/// Drives retry contexts through the state machine.
pub struct RetryCoordinator {
    mapping_store: Arc<dyn MappingStoreClient>,
    dead_letters: Arc<dyn DeadLetterQueue>,
    telemetry: Arc<dyn TelemetrySink>,
    policy: RetryPolicy,
}

impl RetryCoordinator {
    pub fn new(
        mapping_store: Arc<dyn MappingStoreClient>,
        dead_letters: Arc<dyn DeadLetterQueue>,
        telemetry: Arc<dyn TelemetrySink>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            mapping_store,
            dead_letters,
            telemetry,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn transition(context: &RetryContext, from: RetryState, to: RetryState) -> RetryState {
        debug!(
            context_id = %context.id,
            from = %from,
            to = %to,
            "Retry state transition"
        );
        to
    }

    /// Run a context from Pending to a terminal state.
    #[instrument(skip(self, context), fields(
        context_id = %context.id,
        family = %context.family,
        source_id = %context.mapping.source_id,
    ))]
    pub async fn process(&self, context: RetryContext) -> SyncResult<RetryOutcome> {
        let mut state = RetryState::Pending;
        let mut history = Vec::new();

        for attempt in 1..=self.policy.max_attempts {
            state = Self::transition(&context, state, RetryState::Retrying { attempt });

            let delay = self.policy.delay_for(attempt - 1);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self
                .mapping_store
                .create_mapping(&context.family, &context.mapping)
                .await
            {
                Ok(()) => {
                    Self::transition(&context, state, RetryState::Resolved);
                    info!(attempts = attempt, "Mapping saved on retry");
                    self.telemetry.track(
                        context
                            .event("mapping-retry-success")
                            .with("attempts", attempt),
                    );
                    return Ok(RetryOutcome::Resolved { attempts: attempt });
                }
                Err(ConnectorError::MappingConflict {
                    existing,
                    duplicate,
                }) => {
                    Self::transition(&context, state, RetryState::Resolved);
                    if existing.same_pair(&duplicate) {
                        // An earlier attempt landed even though it reported failure.
                        info!(attempts = attempt, "Mapping already present on retry");
                        self.telemetry.track(
                            context
                                .event("mapping-retry-success")
                                .with("attempts", attempt),
                        );
                        return Ok(RetryOutcome::Resolved { attempts: attempt });
                    }

                    warn!(
                        existing = %existing,
                        duplicate = %duplicate,
                        "Duplicate mapping detected on retry"
                    );
                    self.telemetry.track(
                        context
                            .event("duplicate")
                            .with("existingSourceId", &existing.source_id)
                            .with("existingTargetId", &existing.target_id)
                            .with("duplicateSourceId", &duplicate.source_id)
                            .with("duplicateTargetId", &duplicate.target_id),
                    );
                    return Ok(RetryOutcome::Duplicate {
                        existing,
                        duplicate,
                    });
                }
                Err(error) if error.is_transient() => {
                    debug!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %error,
                        "Mapping retry failed"
                    );
                    history.push(AttemptRecord::new(attempt, error.to_string()));
                }
                Err(error) => {
                    warn!(attempt, error = %error, "Mapping retry failed permanently");
                    history.push(AttemptRecord::new(attempt, error.to_string()));
                    break;
                }
            }
        }

        let reason = history.last().map_or_else(
            || "no retry attempts allowed".to_string(),
            |record| record.error.clone(),
        );
        self.store_dead_letter(context, state, history, reason).await
    }

    /// Dead-letter a context straight from Pending with zero attempts.
    pub async fn dead_letter_now(
        &self,
        context: RetryContext,
        reason: String,
    ) -> SyncResult<RetryOutcome> {
        warn!(
            context_id = %context.id,
            family = %context.family,
            reason = %reason,
            "Mapping write failed permanently, dead-lettering without retry"
        );
        self.store_dead_letter(context, RetryState::Pending, Vec::new(), reason)
            .await
    }

    async fn store_dead_letter(
        &self,
        context: RetryContext,
        state: RetryState,
        history: Vec<AttemptRecord>,
        reason: String,
    ) -> SyncResult<RetryOutcome> {
        let attempts = u32::try_from(history.len()).unwrap_or(u32::MAX);
        let entry = DeadLetter::mapping_retry(context.clone(), reason.clone(), history);

        let dead_letter_id = match self.dead_letters.push(entry).await {
            Ok(id) => id,
            Err(e) => {
                // The context is dropped here; this event is its only record.
                error!(
                    context_id = %context.id,
                    source_id = %context.mapping.source_id,
                    target_id = %context.mapping.target_id,
                    error = %e,
                    "Failed to dead-letter mapping retry"
                );
                self.telemetry.track(
                    context
                        .event("mapping-retry-dead-letter-failed")
                        .with("sourceId", &context.mapping.source_id)
                        .with("targetId", &context.mapping.target_id)
                        .with("attempts", attempts)
                        .with("reason", &reason)
                        .with("error", &e),
                );
                return Err(e);
            }
        };
        Self::transition(&context, state, RetryState::DeadLettered);

        warn!(
            dead_letter_id = %dead_letter_id,
            attempts,
            "Mapping retry dead-lettered"
        );
        self.telemetry.track(
            context
                .event("mapping-retry-dead-lettered")
                .with("attempts", attempts)
                .with("reason", &reason)
                .with("deadLetterId", dead_letter_id),
        );

        Ok(RetryOutcome::DeadLettered {
            dead_letter_id,
            attempts,
        })
    }

    /// Take a dead-lettered context and run it again from Pending.
    pub async fn replay(&self, dead_letter_id: Uuid) -> SyncResult<RetryOutcome> {
        match self.dead_letters.get(dead_letter_id).await? {
            Some(DeadLetter {
                payload: DeadLetterPayload::MappingRetry { .. },
                ..
            }) => {}
            _ => return Err(SyncError::DeadLetterNotFound { id: dead_letter_id }),
        }

        let Some(DeadLetter {
            payload: DeadLetterPayload::MappingRetry { context },
            ..
        }) = self.dead_letters.take(dead_letter_id).await?
        else {
            return Err(SyncError::DeadLetterNotFound { id: dead_letter_id });
        };

        info!(
            dead_letter_id = %dead_letter_id,
            context_id = %context.id,
            family = %context.family,
            "Replaying dead-lettered mapping retry"
        );
        self.process(context).await
    }
}

#[async_trait]
impl MappingRetryQueue for RetryCoordinator {
    async fn submit(&self, context: RetryContext) -> SyncResult<()> {
        self.process(context).await.map(|_| ())
    }

    async fn dead_letter(&self, context: RetryContext, reason: String) -> SyncResult<()> {
        self.dead_letter_now(context, reason).await.map(|_| ())
    }
}
