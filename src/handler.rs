//! The seam where business-specific models plug into the consumer.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error reported by a handler. Never fatal to the consumer loop; the
/// consumer reports it and moves on to the next message.
#[derive(Debug, Error)]
#[error("handler error: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A component that consumes a decoded message and updates its own state.
///
/// The consumer is agnostic to what a handler does; it only observes
/// success or failure.
pub trait EventHandler: Send + Sync {
    fn process(&self, topic: &str, key: &JsonValue, value: &JsonValue)
        -> Result<(), HandlerError>;
}

/// Result of dispatching one decoded message.
#[derive(Debug)]
pub enum DispatchOutcome {
    Handled,
    /// No handler registered for the message's topic; the message is
    /// discarded.
    NoHandler,
    Failed(HandlerError),
}

/// Maps topic names to the handler that owns their state mutations.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, topic: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(topic.into(), handler);
    }

    pub fn dispatch(&self, topic: &str, key: &JsonValue, value: &JsonValue) -> DispatchOutcome {
        match self.handlers.get(topic) {
            Some(handler) => match handler.process(topic, key, value) {
                Ok(()) => DispatchOutcome::Handled,
                Err(e) => DispatchOutcome::Failed(e),
            },
            None => DispatchOutcome::NoHandler,
        }
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("topics", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        invocations: AtomicUsize,
    }

    impl CountingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                invocations: AtomicUsize::new(0),
            })
        }
    }

    impl EventHandler for CountingHandler {
        fn process(
            &self,
            _topic: &str,
            _key: &JsonValue,
            _value: &JsonValue,
        ) -> Result<(), HandlerError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    impl EventHandler for FailingHandler {
        fn process(
            &self,
            _topic: &str,
            _key: &JsonValue,
            _value: &JsonValue,
        ) -> Result<(), HandlerError> {
            Err(HandlerError::new("boom"))
        }
    }

    #[test]
    fn test_dispatch_invokes_registered_handler_exactly_once_per_message() {
        let handler = CountingHandler::new();
        let mut registry = HandlerRegistry::new();
        registry.register("weather-events", handler.clone());

        for _ in 0..3 {
            let outcome =
                registry.dispatch("weather-events", &json!({"timestamp": 1}), &json!({}));
            assert!(matches!(outcome, DispatchOutcome::Handled));
        }

        assert_eq!(handler.invocations.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dispatch_to_unhandled_topic_is_a_noop() {
        let handler = CountingHandler::new();
        let mut registry = HandlerRegistry::new();
        registry.register("weather-events", handler.clone());

        let outcome = registry.dispatch("station-events", &json!(1), &json!({}));

        assert!(matches!(outcome, DispatchOutcome::NoHandler));
        assert_eq!(handler.invocations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_surfaces_handler_failure_without_panicking() {
        let mut registry = HandlerRegistry::new();
        registry.register("weather-events", Arc::new(FailingHandler));

        let outcome = registry.dispatch("weather-events", &json!(1), &json!({}));

        match outcome {
            DispatchOutcome::Failed(e) => assert_eq!(e.to_string(), "handler error: boom"),
            other => panic!("expected Failed, got {:?}", other),
        }
    }
}
