//! Event bus implementation
//!
//! This module provides the event bus abstraction and an in-process
//! implementation for publishing and subscribing to role events.

use crate::types::Event;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

/// Event bus error types.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Failed to subscribe
    #[error("Failed to subscribe: {0}")]
    SubscribeError(String),

    /// Handler failed while processing an event
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Subscription handle for receiving events.
pub struct Subscription {
    /// Subscription ID
    pub id: String,
    /// Topic pattern
    pub topic: String,
    /// Event receiver
    pub receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event.
    ///
    /// Events missed because the subscriber lagged are skipped.
    pub async fn recv(&mut self) -> EventBusResult<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "Subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(EventBusError::ChannelClosed),
            }
        }
    }

    /// Receive an event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

/// Event handler trait for processing events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: Event) -> EventBusResult<()>;

    /// Get the topics this handler is interested in.
    fn topics(&self) -> Vec<String>;
}

type HandlerFuture = Pin<Box<dyn Future<Output = EventBusResult<()>> + Send>>;

/// Event handler backed by a closure.
///
/// # Example
///
/// ```rust
/// use market_events::{EventBus, FnEventHandler, MemoryEventBus};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let bus = MemoryEventBus::new();
/// let handler = FnEventHandler::new(["role.*"], |event| async move {
///     println!("{}", event.event_type);
///     Ok(())
/// });
/// bus.register_handler(Arc::new(handler)).await.unwrap();
/// # }
/// ```
pub struct FnEventHandler {
    topics: Vec<String>,
    handler: Box<dyn Fn(Event) -> HandlerFuture + Send + Sync>,
}

impl FnEventHandler {
    /// Create a handler for the given topic patterns.
    pub fn new<I, S, F, Fut>(topics: I, handler: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EventBusResult<()>> + Send + 'static,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            handler: Box::new(move |event| Box::pin(handler(event))),
        }
    }
}

impl std::fmt::Debug for FnEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEventHandler")
            .field("topics", &self.topics)
            .finish()
    }
}

#[async_trait]
impl EventHandler for FnEventHandler {
    async fn handle(&self, event: Event) -> EventBusResult<()> {
        (self.handler)(event).await
    }

    fn topics(&self) -> Vec<String> {
        self.topics.clone()
    }
}

/// Event bus trait for publish/subscribe operations.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event.
    async fn publish(&self, event: Event) -> EventBusResult<()>;

    /// Subscribe to a topic pattern.
    ///
    /// Topic patterns support wildcards:
    /// - `*` matches any single segment
    /// - `#` matches zero or more segments
    ///
    /// Examples:
    /// - `role.*` matches `role.changed`, `role.synced`
    /// - `#` matches every event
    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription>;

    /// Register an event handler.
    async fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()>;
}

/// Check if a topic matches a pattern.
///
/// Segments are separated by `.`; `*` matches one segment and `#` matches
/// zero or more.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let topic: Vec<&str> = topic.split('.').collect();
    segments_match(&pattern, &topic)
}

fn segments_match(pattern: &[&str], topic: &[&str]) -> bool {
    match (pattern.split_first(), topic.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => (0..=topic.len()).any(|skip| segments_match(rest, &topic[skip..])),
        (Some((&"*", rest)), Some((_, topic_rest))) => segments_match(rest, topic_rest),
        (Some((segment, rest)), Some((head, topic_rest))) => {
            segment == head && segments_match(rest, topic_rest)
        }
        _ => false,
    }
}

/// In-memory event bus implementation.
///
/// Subscribers sharing a pattern share one broadcast channel. A channel whose
/// subscriptions were all dropped is pruned on the next publish. Handlers run
/// on spawned tasks, so publishing never waits on them.
pub struct MemoryEventBus {
    /// Topic pattern to channel
    subscribers: Arc<RwLock<HashMap<String, broadcast::Sender<Event>>>>,
    /// Registered handlers
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
    /// Default channel capacity
    channel_capacity: usize,
}

impl std::fmt::Debug for MemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventBus")
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl MemoryEventBus {
    /// Create a new in-memory event bus.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create with custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(Vec::new())),
            channel_capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) -> EventBusResult<()> {
        let topic = event.topic().to_string();
        let mut delivered = 0usize;

        {
            let mut subscribers = self.subscribers.write().await;
            subscribers.retain(|_, sender| sender.receiver_count() > 0);
            for (pattern, sender) in subscribers.iter() {
                if topic_matches(pattern, &topic) {
                    // Err only means every receiver was dropped.
                    if let Ok(receivers) = sender.send(event.clone()) {
                        delivered += receivers;
                    }
                }
            }
        }

        {
            let handlers = self.handlers.read().await;
            for handler in handlers.iter() {
                if handler.topics().iter().any(|t| topic_matches(t, &topic)) {
                    let handler = handler.clone();
                    let event = event.clone();
                    delivered += 1;
                    tokio::task::spawn(async move {
                        if let Err(e) = handler.handle(event).await {
                            tracing::error!(error = %e, "Event handler failed");
                        }
                    });
                }
            }
        }

        tracing::debug!(topic = %topic, event_id = %event.id, delivered, "Event published");

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription> {
        if topic.is_empty() {
            return Err(EventBusError::SubscribeError("empty topic pattern".to_string()));
        }

        let id = uuid::Uuid::now_v7().to_string();

        let receiver = {
            let mut subscribers = self.subscribers.write().await;

            if let Some(sender) = subscribers.get(topic) {
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(self.channel_capacity);
                subscribers.insert(topic.to_string(), sender);
                receiver
            }
        };

        tracing::debug!(topic = %topic, subscription_id = %id, "Subscribed");

        Ok(Subscription {
            id,
            topic: topic.to_string(),
            receiver,
        })
    }

    async fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()> {
        self.handlers.write().await.push(handler);
        Ok(())
    }
}
