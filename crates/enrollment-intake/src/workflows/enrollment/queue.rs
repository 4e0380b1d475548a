use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ProcessingConfig;

/// Opaque per-message identifier assigned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message as handed to the consumer. The body is opaque until the processor parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredMessage {
    #[serde(rename = "messageId", alias = "MessageId", default)]
    pub message_id: Option<MessageId>,
    #[serde(rename = "body", alias = "Body", default)]
    pub body: String,
    /// Handle for this particular delivery; a redelivery carries a new one.
    #[serde(
        rename = "receiptHandle",
        alias = "ReceiptHandle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub receipt_handle: Option<String>,
}

impl DeliveredMessage {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: Some(MessageId(message_id.into())),
            body: body.into(),
            receipt_handle: None,
        }
    }

    /// Acknowledgement token, present when the transport issued both an id and a handle.
    pub fn receipt(&self) -> Option<Receipt> {
        Some(Receipt {
            message_id: self.message_id.clone()?,
            handle: self.receipt_handle.clone()?,
        })
    }
}

/// Ties an acknowledgement to one delivery of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Receipt {
    pub message_id: MessageId,
    pub handle: String,
}

/// Batch delivery envelope. Accepts both the push-style `Records`/`messageId`/`body`
/// shape and the polled `Messages`/`MessageId`/`Body` shape.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueEvent {
    #[serde(alias = "Records", alias = "Messages")]
    pub messages: Vec<DeliveredMessage>,
}

/// Publishing side of the transport.
pub trait MessageQueue: Send + Sync {
    fn publish(&self, body: String) -> Result<MessageId, QueueError>;
}

/// Consuming side of the transport.
///
/// `complete` acknowledges every delivered message that is not listed in `failed`;
/// failed messages become visible again once their visibility window elapses. A receipt
/// from an earlier delivery of a message that has since been redelivered is ignored.
pub trait BatchSource: Send + Sync {
    fn receive(&self, max: usize) -> Result<Vec<DeliveredMessage>, QueueError>;
    fn complete(&self, delivered: &[Receipt], failed: &[MessageId]) -> Result<(), QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

/// Redelivery settings owned by the transport.
#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    pub visibility_timeout: Duration,
    pub max_receives: u32,
}

impl From<&ProcessingConfig> for QueueSettings {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            visibility_timeout: config.visibility_timeout,
            max_receives: config.max_receives.max(1),
        }
    }
}

/// Message that exhausted its delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLetter {
    pub message_id: MessageId,
    pub body: String,
    pub receive_count: u32,
}

#[derive(Debug)]
struct Entry {
    id: MessageId,
    body: String,
    receive_count: u32,
    visible_at: Instant,
    receipt_handle: Option<String>,
}

impl Entry {
    fn dead_letter(self) -> DeadLetter {
        DeadLetter {
            message_id: self.id,
            body: self.body,
            receive_count: self.receive_count,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<Entry>,
    dead_letters: Vec<DeadLetter>,
}

/// At-least-once in-process queue with visibility timeouts and a dead-letter list.
#[derive(Debug)]
pub struct InMemoryQueue {
    settings: QueueSettings,
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(QueueState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.state
            .lock()
            .map_err(|_| QueueError::Unavailable("queue state poisoned".to_string()))
    }

    /// Messages not yet acknowledged, visible or in flight.
    pub fn depth(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.entries.len())
    }

    pub fn dead_letters(&self) -> Result<Vec<DeadLetter>, QueueError> {
        Ok(self.lock()?.dead_letters.clone())
    }
}

impl MessageQueue for InMemoryQueue {
    fn publish(&self, body: String) -> Result<MessageId, QueueError> {
        let id = MessageId(Uuid::new_v4().to_string());
        self.lock()?.entries.push_back(Entry {
            id: id.clone(),
            body,
            receive_count: 0,
            visible_at: Instant::now(),
            receipt_handle: None,
        });
        Ok(id)
    }
}

impl BatchSource for InMemoryQueue {
    fn receive(&self, max: usize) -> Result<Vec<DeliveredMessage>, QueueError> {
        let now = Instant::now();
        let mut state = self.lock()?;
        let QueueState {
            entries,
            dead_letters,
        } = &mut *state;

        // Visible messages that already used every attempt never reach the consumer again.
        let max_receives = self.settings.max_receives;
        let mut kept = VecDeque::with_capacity(entries.len());
        for entry in entries.drain(..) {
            if entry.visible_at <= now && entry.receive_count >= max_receives {
                warn!(
                    message_id = %entry.id,
                    receive_count = entry.receive_count,
                    "message moved to dead-letter list"
                );
                dead_letters.push(entry.dead_letter());
            } else {
                kept.push_back(entry);
            }
        }
        *entries = kept;

        let batch = entries
            .iter_mut()
            .filter(|entry| entry.visible_at <= now)
            .take(max)
            .map(|entry| {
                let handle = Uuid::new_v4().to_string();
                entry.receive_count += 1;
                entry.visible_at = now + self.settings.visibility_timeout;
                entry.receipt_handle = Some(handle.clone());
                DeliveredMessage {
                    message_id: Some(entry.id.clone()),
                    body: entry.body.clone(),
                    receipt_handle: Some(handle),
                }
            })
            .collect();

        Ok(batch)
    }

    fn complete(&self, delivered: &[Receipt], failed: &[MessageId]) -> Result<(), QueueError> {
        let delivered: HashMap<&MessageId, &str> = delivered
            .iter()
            .map(|receipt| (&receipt.message_id, receipt.handle.as_str()))
            .collect();
        let failed: HashSet<&MessageId> = failed.iter().collect();
        let max_receives = self.settings.max_receives;

        let mut state = self.lock()?;
        let QueueState {
            entries,
            dead_letters,
        } = &mut *state;

        let mut kept = VecDeque::with_capacity(entries.len());
        for entry in entries.drain(..) {
            let Some(handle) = delivered.get(&entry.id) else {
                kept.push_back(entry);
                continue;
            };
            if entry.receipt_handle.as_deref() != Some(*handle) {
                debug!(message_id = %entry.id, "ignoring receipt from an earlier delivery");
                kept.push_back(entry);
            } else if !failed.contains(&entry.id) {
                continue;
            } else if entry.receive_count >= max_receives {
                warn!(
                    message_id = %entry.id,
                    receive_count = entry.receive_count,
                    "message moved to dead-letter list"
                );
                dead_letters.push(entry.dead_letter());
            } else {
                kept.push_back(entry);
            }
        }
        *entries = kept;
        Ok(())
    }
}
