//! Retry Worker
//!
//! Background worker that runs submitted retry contexts through the
//! coordinator with bounded concurrency. Dropping every handle drains the
//! channel and stops the worker once in-flight contexts finish.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, instrument};

use crate::error::{SyncError, SyncResult};
use crate::sync::retry::{MappingRetryQueue, RetryContext, RetryCoordinator, RetryOutcome};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct RetryWorkerConfig {
    /// Number of contexts processed at once.
    pub concurrency: usize,
    /// Capacity of the submission channel.
    pub channel_capacity: usize,
}

impl Default for RetryWorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            channel_capacity: 256,
        }
    }
}

#[derive(Debug)]
enum RetryJob {
    Retry(RetryContext),
    DeadLetter(RetryContext, String),
}

/// Cloneable submission side of a [`RetryWorker`].
#[derive(Debug, Clone)]
pub struct RetryWorkerHandle {
    sender: mpsc::Sender<RetryJob>,
}

impl RetryWorkerHandle {
    async fn send(&self, job: RetryJob) -> SyncResult<()> {
        self.sender
            .send(job)
            .await
            .map_err(|_| SyncError::WorkerUnavailable)
    }
}

#[async_trait]
impl MappingRetryQueue for RetryWorkerHandle {
    async fn submit(&self, context: RetryContext) -> SyncResult<()> {
        self.send(RetryJob::Retry(context)).await
    }

    async fn dead_letter(&self, context: RetryContext, reason: String) -> SyncResult<()> {
        self.send(RetryJob::DeadLetter(context, reason)).await
    }
}

/// Consumes retry contexts until every handle is dropped.
pub struct RetryWorker {
    coordinator: Arc<RetryCoordinator>,
    receiver: mpsc::Receiver<RetryJob>,
    config: RetryWorkerConfig,
}

impl RetryWorker {
    /// Create a worker and its submission handle.
    pub fn new(
        coordinator: Arc<RetryCoordinator>,
        config: RetryWorkerConfig,
    ) -> (Self, RetryWorkerHandle) {
        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
        (
            Self {
                coordinator,
                receiver,
                config,
            },
            RetryWorkerHandle { sender },
        )
    }

    /// Start the worker.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        let concurrency = self.config.concurrency.max(1);
        info!(concurrency, "Starting retry worker");

        let semaphore = Arc::new(Semaphore::new(concurrency));

        while let Some(job) = self.receiver.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let coordinator = self.coordinator.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let (context_id, source_id, target_id) = match &job {
                    RetryJob::Retry(context) | RetryJob::DeadLetter(context, _) => (
                        context.id,
                        context.mapping.source_id.clone(),
                        context.mapping.target_id.clone(),
                    ),
                };
                let result = match job {
                    RetryJob::Retry(context) => coordinator.process(context).await,
                    RetryJob::DeadLetter(context, reason) => {
                        coordinator.dead_letter_now(context, reason).await
                    }
                };
                match result {
                    Ok(RetryOutcome::DeadLettered { dead_letter_id, .. }) => {
                        info!(context_id = %context_id, dead_letter_id = %dead_letter_id, "Retry context dead-lettered");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(
                            context_id = %context_id,
                            source_id = %source_id,
                            target_id = %target_id,
                            error = %e,
                            "Retry context lost, target record has no mapping"
                        );
                    }
                }
            });
        }

        info!("Waiting for in-flight retries to complete...");
        let permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
        let _ = semaphore.acquire_many(permits).await;
        info!("Retry worker stopped");
    }
}
