//! In-process redelivering transport.
//!
//! Delivers a message to the orchestrator up to a receive limit, redelivering
//! on retryable failures, and moves it to the dead-letter queue once the limit
//! is spent or the failure is permanent.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::sync::dead_letter::{AttemptRecord, DeadLetter, DeadLetterPayload, DeadLetterQueue};
use crate::sync::orchestrator::{SyncOrchestrator, SyncOutcome};

/// Result of delivering one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Orchestrator finished the event.
    Handled {
        outcome: SyncOutcome,
        receive_count: u32,
    },
    /// Message moved to the dead-letter queue.
    DeadLettered {
        dead_letter_id: Uuid,
        receive_count: u32,
    },
}

/// Redelivers failed messages up to `max_receive_count`, then dead-letters them.
pub struct RedeliveringTransport {
    orchestrator: Arc<SyncOrchestrator>,
    dead_letters: Arc<dyn DeadLetterQueue>,
    max_receive_count: u32,
    redelivery_delay: Duration,
}

impl RedeliveringTransport {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        dead_letters: Arc<dyn DeadLetterQueue>,
        max_receive_count: u32,
    ) -> Self {
        Self {
            orchestrator,
            dead_letters,
            max_receive_count: max_receive_count.max(1),
            redelivery_delay: Duration::ZERO,
        }
    }

    /// Wait this long between redeliveries.
    #[must_use]
    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay;
        self
    }

    #[must_use]
    pub fn max_receive_count(&self) -> u32 {
        self.max_receive_count
    }

    /// Deliver a raw message body.
    pub async fn deliver(&self, body: &[u8]) -> SyncResult<DeliveryOutcome> {
        let event = match self.orchestrator.registry().parse(body) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Undeliverable message");
                let history = vec![AttemptRecord::new(1, e.to_string())];
                return self.dead_letter(body, e.to_string(), history).await;
            }
        };

        let mut history = Vec::new();
        for receive_count in 1..=self.max_receive_count {
            match self.orchestrator.handle(&event).await {
                Ok(outcome) => {
                    return Ok(DeliveryOutcome::Handled {
                        outcome,
                        receive_count,
                    })
                }
                Err(e) if e.is_retryable() => {
                    debug!(
                        receive_count,
                        max_receive_count = self.max_receive_count,
                        error = %e,
                        "Redelivering event"
                    );
                    history.push(AttemptRecord::new(receive_count, e.to_string()));
                    if receive_count < self.max_receive_count && !self.redelivery_delay.is_zero() {
                        tokio::time::sleep(self.redelivery_delay).await;
                    }
                }
                Err(e) => {
                    history.push(AttemptRecord::new(receive_count, e.to_string()));
                    return self.dead_letter(body, e.to_string(), history).await;
                }
            }
        }

        let reason = history
            .last()
            .map_or_else(String::new, |record| record.error.clone());
        self.dead_letter(body, reason, history).await
    }

    async fn dead_letter(
        &self,
        body: &[u8],
        reason: String,
        history: Vec<AttemptRecord>,
    ) -> SyncResult<DeliveryOutcome> {
        let receive_count = u32::try_from(history.len()).unwrap_or(u32::MAX);
        let stored = serde_json::from_slice(body).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(body).into_owned())
        });

        let dead_letter_id = self
            .dead_letters
            .push(DeadLetter::event(stored, reason, history))
            .await?;

        Ok(DeliveryOutcome::DeadLettered {
            dead_letter_id,
            receive_count,
        })
    }

    /// Take a dead-lettered event and deliver it again.
    pub async fn replay(&self, dead_letter_id: Uuid) -> SyncResult<DeliveryOutcome> {
        match self.dead_letters.get(dead_letter_id).await? {
            Some(DeadLetter {
                payload: DeadLetterPayload::Event { .. },
                ..
            }) => {}
            _ => return Err(SyncError::DeadLetterNotFound { id: dead_letter_id }),
        }

        let Some(DeadLetter {
            payload: DeadLetterPayload::Event { body },
            ..
        }) = self.dead_letters.take(dead_letter_id).await?
        else {
            return Err(SyncError::DeadLetterNotFound { id: dead_letter_id });
        };

        info!(dead_letter_id = %dead_letter_id, "Replaying dead-lettered event");
        let bytes = match body {
            serde_json::Value::String(raw) => raw.into_bytes(),
            other => serde_json::to_vec(&other)?,
        };
        self.deliver(&bytes).await
    }
}
