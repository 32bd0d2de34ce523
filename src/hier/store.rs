//! Process-wide, namespaced, thread-safe shared state store (§4.1).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::model::Message;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Namespace {
    conversation: Vec<ConversationTurn>,
    global: Vec<Value>,
    agents: HashMap<String, Vec<Message>>,
}

/// A process-wide repository of conversation turns, global broadcasts, and
/// per-agent message feeds, partitioned by namespace (typically the job id).
///
/// All operations hold an internal mutex for the duration of their access;
/// list operations return defensive copies. No operation blocks on external
/// I/O. Namespaces are created on first write.
#[derive(Default)]
pub struct SharedStateStore {
    namespaces: Mutex<HashMap<String, Namespace>>,
}

impl SharedStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_conversation(&self, ns: &str, role: impl Into<String>, content: impl Into<String>) {
        let mut guard = self.namespaces.lock().expect("shared state store mutex poisoned");
        let entry = guard.entry(ns.to_string()).or_default();
        entry.conversation.push(ConversationTurn {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn append_agent(&self, ns: &str, agent_key: &str, msg: Message) {
        let mut guard = self.namespaces.lock().expect("shared state store mutex poisoned");
        let entry = guard.entry(ns.to_string()).or_default();
        entry.agents.entry(agent_key.to_string()).or_default().push(msg);
    }

    pub fn append_global(&self, ns: &str, update: Value) {
        let mut guard = self.namespaces.lock().expect("shared state store mutex poisoned");
        let entry = guard.entry(ns.to_string()).or_default();
        entry.global.push(update);
    }

    pub fn list_conversation(&self, ns: &str) -> Vec<ConversationTurn> {
        let guard = self.namespaces.lock().expect("shared state store mutex poisoned");
        guard.get(ns).map(|n| n.conversation.clone()).unwrap_or_default()
    }

    pub fn list_agent(&self, ns: &str, agent_key: &str) -> Vec<Message> {
        let guard = self.namespaces.lock().expect("shared state store mutex poisoned");
        guard
            .get(ns)
            .and_then(|n| n.agents.get(agent_key))
            .cloned()
            .unwrap_or_default()
    }

    pub fn list_global(&self, ns: &str) -> Vec<Value> {
        let guard = self.namespaces.lock().expect("shared state store mutex poisoned");
        guard.get(ns).map(|n| n.global.clone()).unwrap_or_default()
    }

    /// Concatenation of several agent feeds, in the order the keys were given.
    pub fn list_team(&self, ns: &str, agent_keys: &[String]) -> Vec<Message> {
        let guard = self.namespaces.lock().expect("shared state store mutex poisoned");
        let Some(namespace) = guard.get(ns) else { return Vec::new() };
        agent_keys
            .iter()
            .flat_map(|key| namespace.agents.get(key).cloned().unwrap_or_default())
            .collect()
    }
}
