//! Domain event publishing.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{DomainEvent, SpinEvent};

use crate::error::SagaError;

/// Outbound message bus.
///
/// Publishing is best effort: sagas log and count failures but never
/// compensate for them.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &SpinEvent) -> Result<(), SagaError>;
}

/// Publisher that writes events to the structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: &SpinEvent) -> Result<(), SagaError> {
        let payload =
            serde_json::to_string(event).map_err(|e| SagaError::ExternalService(e.to_string()))?;
        tracing::info!(
            event_type = event.event_type(),
            correlation_id = event.correlation_id(),
            payload = %payload,
            "event published"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    events: Vec<SpinEvent>,
    fail: bool,
}

/// Publisher that keeps events in memory, for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish fail.
    pub fn set_fail(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail = fail;
    }

    /// Returns the published events, oldest first.
    pub fn events(&self) -> Vec<SpinEvent> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .clone()
    }

    /// Returns the published event types, oldest first.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .iter()
            .map(|e| e.event_type())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &SpinEvent) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(SagaError::ExternalService("message bus unavailable".into()));
        }
        state.events.push(event.clone());
        Ok(())
    }
}
