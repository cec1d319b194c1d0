//! Batching and delivery of composed messages.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{OutboundMessage, Topic};
use crate::error::IndexerError;

/// Messages of one topic, delivered together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBatch {
    /// Destination topic.
    pub topic: Topic,
    messages: Vec<OutboundMessage>,
    size_bytes: usize,
}

impl MessageBatch {
    fn new(topic: Topic) -> Self {
        Self {
            topic,
            messages: Vec::new(),
            size_bytes: 0,
        }
    }

    fn push(&mut self, message: OutboundMessage) {
        self.size_bytes += message.size_bytes();
        self.messages.push(message);
    }

    /// Messages in composition order.
    #[must_use]
    pub fn messages(&self) -> &[OutboundMessage] {
        &self.messages
    }

    /// Consumes the batch, returning its messages.
    #[must_use]
    pub fn into_messages(self) -> Vec<OutboundMessage> {
        self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the batch holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Summed envelope size.
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

/// Groups messages per topic into batches of at most `max_bytes`.
///
/// Order within a topic is preserved. A message larger than `max_bytes`
/// forms a batch of its own.
#[must_use]
pub fn batch_messages(messages: Vec<OutboundMessage>, max_bytes: usize) -> Vec<MessageBatch> {
    let mut topics: Vec<Topic> = Vec::new();
    let mut open: Vec<MessageBatch> = Vec::new();
    let mut batches: Vec<MessageBatch> = Vec::new();

    for message in messages {
        let slot = match topics.iter().position(|t| *t == message.topic) {
            Some(slot) => slot,
            None => {
                topics.push(message.topic);
                open.push(MessageBatch::new(message.topic));
                topics.len() - 1
            }
        };
        let Some(batch) = open.get_mut(slot) else {
            continue;
        };

        if !batch.is_empty() && batch.size_bytes() + message.size_bytes() > max_bytes {
            let full = std::mem::replace(batch, MessageBatch::new(message.topic));
            batches.push(full);
        }
        batch.push(message);
    }

    batches.extend(open.into_iter().filter(|b| !b.is_empty()));
    batches
}

/// Transport for message batches.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Delivers one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the batch.
    async fn send(&self, batch: MessageBatch) -> Result<(), IndexerError>;
}

/// Sink backed by a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<MessageBatch>,
}

impl ChannelSink {
    /// Creates a sink and the receiving end of its channel.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MessageBatch>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn send(&self, batch: MessageBatch) -> Result<(), IndexerError> {
        self.sender
            .send(batch)
            .await
            .map_err(|e| IndexerError::Publish(format!("channel closed: {e}")))
    }
}

/// Hands composed messages to a sink.
#[derive(Clone)]
pub struct Publisher {
    sink: Arc<dyn MessageSink>,
    enabled: bool,
    max_batch_bytes: usize,
}

impl Publisher {
    /// Creates a publisher.
    #[must_use]
    pub fn new(sink: Arc<dyn MessageSink>, enabled: bool, max_batch_bytes: usize) -> Self {
        Self {
            sink,
            enabled,
            max_batch_bytes,
        }
    }

    /// Returns true if messages reach the sink.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Batches and sends messages. Returns the number of batches sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects a batch.
    pub async fn publish(&self, messages: Vec<OutboundMessage>) -> Result<usize, IndexerError> {
        if !self.enabled || messages.is_empty() {
            return Ok(0);
        }

        let batches = batch_messages(messages, self.max_batch_bytes);
        let count = batches.len();
        for batch in batches {
            debug!(
                "Publishing {} messages to {} ({} bytes)",
                batch.len(),
                batch.topic,
                batch.size_bytes()
            );
            self.sink.send(batch).await?;
        }
        Ok(count)
    }
}
