//! Memory views: per-agent handles over the shared state store with a
//! visibility scope appropriate to the agent's role (§4.2).

use std::sync::Arc;

use serde_json::Value;

use super::model::{Message, MessageType};
use super::store::SharedStateStore;

/// Translate conversation turns into `user_message`/`assistant_message` rows
/// so they can be interleaved with the rest of a feed for prompt assembly.
fn conversation_as_messages(store: &SharedStateStore, ns: &str) -> Vec<Message> {
    store
        .list_conversation(ns)
        .into_iter()
        .map(|turn| {
            let type_ = if turn.role == "user" { MessageType::UserMessage } else { MessageType::AssistantMessage };
            let mut msg = Message::new(type_, Value::String(turn.content));
            msg.timestamp = turn.timestamp;
            msg
        })
        .collect()
}

/// A single-agent private view: no cross-visibility at all.
pub struct PrivateView {
    store: Arc<SharedStateStore>,
    namespace: String,
    agent_key: String,
}

impl PrivateView {
    pub fn new(store: Arc<SharedStateStore>, namespace: impl Into<String>, agent_key: impl Into<String>) -> Self {
        Self { store, namespace: namespace.into(), agent_key: agent_key.into() }
    }

    pub fn add(&self, msg: Message) {
        self.store.append_agent(&self.namespace, &self.agent_key, msg);
    }

    pub fn get_history(&self) -> Vec<Message> {
        self.store.list_agent(&self.namespace, &self.agent_key)
    }
}

/// A worker-level view: private feed plus the namespace's global broadcasts
/// and conversation, but never a sibling's private feed.
pub struct SharedWorkerView {
    store: Arc<SharedStateStore>,
    namespace: String,
    agent_key: String,
}

impl SharedWorkerView {
    pub fn new(store: Arc<SharedStateStore>, namespace: impl Into<String>, agent_key: impl Into<String>) -> Self {
        Self { store, namespace: namespace.into(), agent_key: agent_key.into() }
    }

    pub fn add(&self, msg: Message) {
        self.store.append_agent(&self.namespace, &self.agent_key, msg);
    }

    pub fn add_global(&self, update: Value) {
        self.store.append_global(&self.namespace, update);
    }

    pub fn get_history(&self) -> Vec<Message> {
        let mut history = conversation_as_messages(&self.store, &self.namespace);
        history.extend(self.store.list_agent(&self.namespace, &self.agent_key));
        history.extend(
            self.store
                .list_global(&self.namespace)
                .into_iter()
                .map(|v| Message::new(MessageType::GlobalObservation, v)),
        );
        history
    }
}

/// A manager-level view: like `SharedWorkerView` plus every subordinate's
/// feed, inserted before the global broadcasts.
pub struct HierarchicalManagerView {
    store: Arc<SharedStateStore>,
    namespace: String,
    agent_key: String,
    subordinates: Vec<String>,
}

impl HierarchicalManagerView {
    pub fn new(
        store: Arc<SharedStateStore>,
        namespace: impl Into<String>,
        agent_key: impl Into<String>,
        subordinates: Vec<String>,
    ) -> Self {
        Self { store, namespace: namespace.into(), agent_key: agent_key.into(), subordinates }
    }

    pub fn add(&self, msg: Message) {
        self.store.append_agent(&self.namespace, &self.agent_key, msg);
    }

    pub fn add_global(&self, update: Value) {
        self.store.append_global(&self.namespace, update);
    }

    pub fn get_history(&self) -> Vec<Message> {
        let mut history = conversation_as_messages(&self.store, &self.namespace);
        history.extend(self.store.list_agent(&self.namespace, &self.agent_key));
        history.extend(self.store.list_team(&self.namespace, &self.subordinates));
        history.extend(
            self.store
                .list_global(&self.namespace)
                .into_iter()
                .map(|v| Message::new(MessageType::GlobalObservation, v)),
        );
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn worker_never_sees_sibling_private_feed_without_global_broadcast() {
        let store = Arc::new(SharedStateStore::new());
        let w1 = SharedWorkerView::new(store.clone(), "job", "w1");
        let w2 = SharedWorkerView::new(store.clone(), "job", "w2");

        w1.add(Message::task("secret to w1 only"));
        let w2_history = w2.get_history();
        assert!(w2_history.iter().all(|m| m.content != json!("secret to w1 only")));

        w1.add_global(json!({"summary": "w1 broadcast"}));
        let w2_history = w2.get_history();
        assert!(w2_history.iter().any(|m| m.content == json!({"summary": "w1 broadcast"})));
    }

    #[test]
    fn hierarchical_manager_view_sees_subordinate_feeds() {
        let store = Arc::new(SharedStateStore::new());
        let worker = PrivateView::new(store.clone(), "job", "child");
        worker.add(Message::task("child task"));

        let manager = HierarchicalManagerView::new(store, "job", "mgr", vec!["child".to_string()]);
        let history = manager.get_history();
        assert!(history.iter().any(|m| m.content == json!("child task")));
    }
}
