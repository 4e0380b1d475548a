use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::domain::EnrollmentId;
use super::queue::{BatchSource, DeliveredMessage, MessageId, QueueError, Receipt};
use super::repository::{EnrollmentRepository, RepositoryError, StatusTransition};

/// Queue consumer advancing enrollments from `PENDING` to `PROCESSED`.
///
/// Every message in a batch is handled independently; a failure is recorded against that
/// message's identifier and never aborts the rest of the batch. Re-delivering a message for
/// an enrollment that is already `PROCESSED` succeeds without changing anything.
pub struct EnrollmentProcessor<R> {
    repository: Arc<R>,
    delay: Duration,
}

/// Result of handling one message that does not need redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Processed {
        enrollment_id: EnrollmentId,
        transition: StatusTransition,
    },
    /// Payload carried no enrollment id; consumed without touching the store.
    Skipped,
}

/// Per-message failure. Each one is reported back to the transport for redelivery.
#[derive(Debug, thiserror::Error)]
pub enum MessageFailure {
    #[error("message body is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("message body is not a JSON object")]
    NotAnObject,
    #[error("enrollment_id must be a string")]
    InvalidEnrollmentId,
    #[error("enrollment {0} not found")]
    EnrollmentMissing(EnrollmentId),
    #[error(transparent)]
    Backend(RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedItem {
    pub enrollment_id: EnrollmentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: MessageId,
}

/// Batch response handed back to the transport. Only `batch_item_failures` are redelivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub items_successfully_processed: Vec<ProcessedItem>,
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchReport {
    pub fn failed_ids(&self) -> Vec<MessageId> {
        self.batch_item_failures
            .iter()
            .map(|failure| failure.item_identifier.clone())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.batch_item_failures.is_empty()
    }
}

impl<R> EnrollmentProcessor<R>
where
    R: EnrollmentRepository + 'static,
{
    pub fn new(repository: Arc<R>, delay: Duration) -> Self {
        Self { repository, delay }
    }

    pub async fn process_batch(&self, messages: Vec<DeliveredMessage>) -> BatchReport {
        let mut report = BatchReport::default();

        for message in messages {
            match self.process_message(&message).await {
                Ok(MessageOutcome::Processed {
                    enrollment_id,
                    transition,
                }) => {
                    info!(%enrollment_id, ?transition, "enrollment processed");
                    report
                        .items_successfully_processed
                        .push(ProcessedItem { enrollment_id });
                }
                Ok(MessageOutcome::Skipped) => {
                    warn!(
                        message_id = ?message.message_id,
                        "skipping message without enrollment_id"
                    );
                }
                Err(failure) => {
                    error!(
                        message_id = ?message.message_id,
                        error = %failure,
                        "message processing failed"
                    );
                    // Without an identifier the transport cannot be told which message failed.
                    if let Some(message_id) = message.message_id {
                        report.batch_item_failures.push(BatchItemFailure {
                            item_identifier: message_id,
                        });
                    }
                }
            }
        }

        report
    }

    pub async fn process_message(
        &self,
        message: &DeliveredMessage,
    ) -> Result<MessageOutcome, MessageFailure> {
        let payload: Value = serde_json::from_str(&message.body)?;
        let Value::Object(fields) = payload else {
            return Err(MessageFailure::NotAnObject);
        };

        let enrollment_id = match fields.get("enrollment_id") {
            None | Some(Value::Null) => return Ok(MessageOutcome::Skipped),
            Some(Value::String(id)) if id.is_empty() => return Ok(MessageOutcome::Skipped),
            Some(Value::String(id)) => EnrollmentId(id.clone()),
            Some(_) => return Err(MessageFailure::InvalidEnrollmentId),
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.repository.mark_processed(&enrollment_id) {
            Ok(transition) => Ok(MessageOutcome::Processed {
                enrollment_id,
                transition,
            }),
            Err(RepositoryError::PreconditionFailed(_) | RepositoryError::NotFound) => {
                Err(MessageFailure::EnrollmentMissing(enrollment_id))
            }
            Err(other) => Err(MessageFailure::Backend(other)),
        }
    }
}

/// Polls a [`BatchSource`] and feeds each batch to the processor.
pub struct QueueConsumer<Q, R> {
    source: Arc<Q>,
    processor: Arc<EnrollmentProcessor<R>>,
    batch_size: usize,
    poll_interval: Duration,
}

impl<Q, R> QueueConsumer<Q, R>
where
    Q: BatchSource + 'static,
    R: EnrollmentRepository + 'static,
{
    pub fn new(
        source: Arc<Q>,
        processor: Arc<EnrollmentProcessor<R>>,
        batch_size: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            processor,
            batch_size: batch_size.max(1),
            poll_interval,
        }
    }

    /// Receive and process at most one batch. `None` when nothing was visible.
    pub async fn poll_once(&self) -> Result<Option<BatchReport>, QueueError> {
        let batch = self.source.receive(self.batch_size)?;
        if batch.is_empty() {
            return Ok(None);
        }

        let delivered: Vec<Receipt> = batch.iter().filter_map(DeliveredMessage::receipt).collect();
        let report = self.processor.process_batch(batch).await;
        self.source.complete(&delivered, &report.failed_ids())?;

        debug!(
            delivered = delivered.len(),
            failed = report.batch_item_failures.len(),
            "batch completed"
        );
        Ok(Some(report))
    }

    /// Keep polling until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(batch_size = self.batch_size, "enrollment consumer started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.poll_once().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(err) => {
                    error!(error = %err, "failed to poll enrollment queue");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        info!("enrollment consumer stopped");
    }
}
