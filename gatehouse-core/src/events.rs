use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{error::EventError, identity::ClientIdentity};

/// Events emitted by the throttling services.
///
/// Handlers receive every event; match on the variants you care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A failed login was counted toward the retry threshold.
    LoginFailed {
        identity: ClientIdentity,
        attempted_username: Option<String>,
        /// Retry count after this failure
        retries: u32,
        timestamp: DateTime<Utc>,
    },

    /// A lockout was issued. Security-relevant; worth alerting on.
    LockoutIssued {
        identity: ClientIdentity,
        attempted_username: Option<String>,
        locked_until: DateTime<Utc>,
        escalation_count: u32,
        /// Whether the long lockout duration was applied
        long_lockout: bool,
        timestamp: DateTime<Utc>,
    },

    /// An attempt was refused because the identity is locked out.
    LoginDenied {
        identity: ClientIdentity,
        remaining_seconds: u64,
        timestamp: DateTime<Utc>,
    },

    /// A successful login cleared the identity's retry count.
    RetriesCleared {
        identity: ClientIdentity,
        timestamp: DateTime<Utc>,
    },
}

/// A trait for handling events emitted by the event bus
///
/// # Examples
///
/// ```rust,ignore
/// use gatehouse_core::events::{Event, EventHandler};
///
/// struct AuditHandler;
///
/// #[async_trait]
/// impl EventHandler for AuditHandler {
///     async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
///         if let Event::LockoutIssued { identity, .. } = event {
///             println!("locked out {identity}");
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that fans events out to registered handlers, in registration order.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers, stopping at the first error.
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }
}

/// Emit on an optional bus, logging rather than propagating handler failures.
pub(crate) async fn emit_logged(bus: Option<&EventBus>, event: Event) {
    let Some(bus) = bus else {
        return;
    };
    if let Err(e) = bus.emit(&event).await {
        tracing::warn!(error = %e, "Event handler failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        call_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ErroringEventHandler;

    #[async_trait]
    impl EventHandler for ErroringEventHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::HandlerError("Test error".into()))
        }
    }

    fn cleared() -> Event {
        Event::RetriesCleared {
            identity: ClientIdentity::new("192.0.2.1"),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_empty() {
        EventBus::default()
            .emit(&cleared())
            .await
            .expect("Failed to emit event");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_handlers() {
        let event_bus = EventBus::default();
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        event_bus
            .register(Arc::new(CountingHandler {
                call_count: count1.clone(),
            }))
            .await;
        event_bus
            .register(Arc::new(CountingHandler {
                call_count: count2.clone(),
            }))
            .await;

        event_bus.emit(&cleared()).await.unwrap();
        event_bus.emit(&cleared()).await.unwrap();

        assert_eq!(count1.load(Ordering::SeqCst), 2);
        assert_eq!(count2.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_event_bus_error_propagation() {
        let event_bus = EventBus::default();
        event_bus.register(Arc::new(ErroringEventHandler)).await;

        let result = event_bus.emit(&cleared()).await;
        assert!(matches!(result, Err(EventError::HandlerError(_))));
    }

    #[tokio::test]
    async fn test_emit_logged_swallows_errors() {
        let event_bus = EventBus::default();
        event_bus.register(Arc::new(ErroringEventHandler)).await;

        emit_logged(Some(&event_bus), cleared()).await;
        emit_logged(None, cleared()).await;
    }
}
