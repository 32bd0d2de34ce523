//! Synchronous fan-out pub/sub for lifecycle, action, and result events (§6.5).
//!
//! Grounded on `core/events.py`'s `EventBus`/`LoggingSubscriber`: sequential
//! delivery in subscriber-registration order, subscriber errors caught and
//! logged rather than propagated.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;
use tracing::Level;

/// Normalized terminal status, carried on `_end`/`_executed` event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Success,
    Pending,
    Error,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Success => "success",
            EventStatus::Pending => "pending",
            EventStatus::Error => "error",
        }
    }
}

/// `{role, name, version}` actor identity attached to every event.
#[derive(Debug, Clone)]
pub struct Actor {
    pub role: String,
    pub name: String,
    pub version: String,
}

impl Actor {
    pub fn new(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self { role: role.into(), name: name.into(), version: "1".to_string() }
    }
}

pub trait Subscriber: Send + Sync {
    fn handle_event(&self, event_name: &str, data: &Value);
}

/// Plain synchronous fan-out bus. Delivery within one `publish` call is
/// sequential in subscriber-registration order; a subscriber that panics or
/// otherwise misbehaves cannot break control flow for the publisher or the
/// remaining subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn publish(&self, event_name: &str, data: Value) {
        for subscriber in &self.subscribers {
            let result = catch_unwind(AssertUnwindSafe(|| subscriber.handle_event(event_name, &data)));
            if let Err(_panic) = result {
                tracing::warn!(event = event_name, "subscriber panicked while handling event");
            }
        }
    }
}

/// Default subscriber: renders every event through `tracing` at a
/// per-event-name configurable level.
pub struct LoggingSubscriber {
    pub event_levels: HashMap<String, Level>,
    pub default_level: Level,
    pub max_payload_chars: usize,
}

impl Default for LoggingSubscriber {
    fn default() -> Self {
        let mut event_levels = HashMap::new();
        event_levels.insert("error".to_string(), Level::ERROR);
        event_levels.insert("policy_denied".to_string(), Level::WARN);
        event_levels.insert("agent_start".to_string(), Level::INFO);
        event_levels.insert("agent_end".to_string(), Level::INFO);
        event_levels.insert("manager_start".to_string(), Level::INFO);
        event_levels.insert("manager_end".to_string(), Level::INFO);
        event_levels.insert("action_planned".to_string(), Level::DEBUG);
        event_levels.insert("action_executed".to_string(), Level::DEBUG);
        event_levels.insert("delegation_planned".to_string(), Level::DEBUG);
        event_levels.insert("delegation_chosen".to_string(), Level::DEBUG);
        event_levels.insert("delegation_executed".to_string(), Level::DEBUG);
        event_levels.insert("worker_tool_call".to_string(), Level::DEBUG);
        event_levels.insert("worker_tool_result".to_string(), Level::DEBUG);
        event_levels.insert("orchestrator_phase_start".to_string(), Level::DEBUG);
        event_levels.insert("manager_step_start".to_string(), Level::DEBUG);
        Self { event_levels, default_level: Level::DEBUG, max_payload_chars: 2000 }
    }
}

impl Subscriber for LoggingSubscriber {
    fn handle_event(&self, event_name: &str, data: &Value) {
        let level = self.event_levels.get(event_name).copied().unwrap_or(self.default_level);
        let mut payload = data.to_string();
        if payload.len() > self.max_payload_chars {
            payload.truncate(self.max_payload_chars);
            payload.push_str("...(truncated)");
        }
        match level {
            Level::ERROR => tracing::error!(event = event_name, data = %payload, "agent event"),
            Level::WARN => tracing::warn!(event = event_name, data = %payload, "agent event"),
            Level::INFO => tracing::info!(event = event_name, data = %payload, "agent event"),
            Level::DEBUG => tracing::debug!(event = event_name, data = %payload, "agent event"),
            Level::TRACE => tracing::trace!(event = event_name, data = %payload, "agent event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingSubscriber {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Subscriber for RecordingSubscriber {
        fn handle_event(&self, event_name: &str, _data: &Value) {
            self.seen.lock().unwrap().push(event_name.to_string());
        }
    }

    struct PanickingSubscriber;

    impl Subscriber for PanickingSubscriber {
        fn handle_event(&self, _event_name: &str, _data: &Value) {
            panic!("boom");
        }
    }

    #[test]
    fn delivers_sequentially_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(RecordingSubscriber { seen: seen.clone() }));
        bus.publish("agent_start", serde_json::json!({}));
        bus.publish("agent_end", serde_json::json!({}));
        assert_eq!(*seen.lock().unwrap(), vec!["agent_start".to_string(), "agent_end".to_string()]);
    }

    #[test]
    fn a_panicking_subscriber_does_not_break_delivery_to_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(PanickingSubscriber));
        bus.subscribe(Box::new(RecordingSubscriber { seen: seen.clone() }));
        bus.publish("error", serde_json::json!({}));
        assert_eq!(*seen.lock().unwrap(), vec!["error".to_string()]);
    }
}
