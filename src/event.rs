//! Fire-and-forget event publication.
//!
//! `EventChannel::publish` only enqueues; a dispatcher task owns the sink and
//! logs the outcome of every delivery. Nothing is retried and nothing is
//! reported back to the publisher. The queue is bounded: when the sink falls
//! behind, new events are dropped with a warning.

use async_trait::async_trait;
use broccoli_queue::queue::BroccoliQueue;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

pub trait DomainEvent: Serialize {
    /// Key used to look up the topic.
    const EVENT_TYPE: &'static str;

    fn partition_key(&self) -> String;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEvent {
    pub resource_id: i64,
}

impl DomainEvent for ResourceEvent {
    const EVENT_TYPE: &'static str = "ResourceEvent";

    fn partition_key(&self) -> String {
        self.resource_id.to_string()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventEnvelope {
    pub event_type: String,
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broker error: {0}")]
    Broker(String),
}

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers one envelope, returning a receipt on success.
    async fn deliver(&self, envelope: &EventEnvelope) -> Result<String, PublishError>;
}

/// Publishes envelopes onto a broccoli queue named after the topic.
pub struct BrokerSink {
    queue: BroccoliQueue,
}

impl BrokerSink {
    pub async fn connect(url: &str, pool_size: u8) -> Result<Self, PublishError> {
        let queue = BroccoliQueue::builder(url)
            .pool_connections(pool_size)
            .build()
            .await
            .map_err(|e| PublishError::Broker(e.to_string()))?;
        Ok(Self { queue })
    }
}

#[async_trait]
impl EventSink for BrokerSink {
    async fn deliver(&self, envelope: &EventEnvelope) -> Result<String, PublishError> {
        let message = self
            .queue
            .publish(&envelope.topic, None, envelope, None)
            .await
            .map_err(|e| PublishError::Broker(e.to_string()))?;
        Ok(message.task_id.to_string())
    }
}

/// Used when no broker is configured or reachable.
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn deliver(&self, envelope: &EventEnvelope) -> Result<String, PublishError> {
        info!(
            "no broker configured, {} for topic {} (key {}): {}",
            envelope.event_type, envelope.topic, envelope.key, envelope.payload
        );
        Ok("log-only".to_string())
    }
}

/// Picks the broker sink, or `LogSink` when no broker is configured or the
/// broker cannot be reached at startup.
pub async fn connect_sink(mq_url: Option<&str>, pool_size: u8) -> Arc<dyn EventSink> {
    let Some(url) = mq_url else {
        warn!("MQ_URL not set, resource events will only be logged");
        return Arc::new(LogSink);
    };
    or_log_sink(BrokerSink::connect(url, pool_size).await)
}

fn or_log_sink<S: EventSink + 'static>(connected: Result<S, PublishError>) -> Arc<dyn EventSink> {
    match connected {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            warn!("mq connect failed, resource events will only be logged: {}", e);
            Arc::new(LogSink)
        }
    }
}

#[derive(Clone)]
pub struct EventChannel {
    sender: mpsc::Sender<EventEnvelope>,
    topics: Arc<HashMap<&'static str, String>>,
}

impl EventChannel {
    /// Spawns the dispatcher. It exits once every `EventChannel` clone is dropped
    /// and the queue has drained.
    pub fn start(
        topics: HashMap<&'static str, String>,
        sink: Arc<dyn EventSink>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(dispatch(receiver, sink));
        let channel = Self {
            sender,
            topics: Arc::new(topics),
        };
        (channel, handle)
    }

    /// Returns whether the event was queued. Unregistered event types are
    /// skipped; a full or closed queue drops the event.
    pub fn publish<E: DomainEvent>(&self, event: &E) -> bool {
        let Some(topic) = self.topics.get(E::EVENT_TYPE) else {
            debug!("no topic registered for {}, skipping", E::EVENT_TYPE);
            return false;
        };
        let payload = match serde_json::to_value(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("encoding {} failed: {}", E::EVENT_TYPE, e);
                return false;
            }
        };
        info!("publishing {} message: {}", E::EVENT_TYPE, payload);
        let envelope = EventEnvelope {
            event_type: E::EVENT_TYPE.to_string(),
            topic: topic.clone(),
            key: event.partition_key(),
            payload,
        };
        match self.sender.try_send(envelope) {
            Ok(()) => true,
            Err(TrySendError::Full(envelope)) => {
                warn!("event queue full, dropping {}: {}", E::EVENT_TYPE, envelope.payload);
                false
            }
            Err(TrySendError::Closed(envelope)) => {
                warn!("event channel closed, dropping {}: {}", E::EVENT_TYPE, envelope.payload);
                false
            }
        }
    }
}

async fn dispatch(mut receiver: mpsc::Receiver<EventEnvelope>, sink: Arc<dyn EventSink>) {
    while let Some(envelope) = receiver.recv().await {
        match sink.deliver(&envelope).await {
            Ok(receipt) => info!(
                "published {} to {} (key {}), receipt {}",
                envelope.event_type, envelope.topic, envelope.key, receipt
            ),
            Err(e) => warn!(
                "publishing {} to {} failed, {} not delivered: {}",
                envelope.event_type, envelope.topic, envelope.payload, e
            ),
        }
    }
    debug!("event channel closed");
}
