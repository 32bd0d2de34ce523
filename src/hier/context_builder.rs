//! Assembles role-specific prompt context bundles for each tier (§4.8).
//!
//! Grounded line-for-line on `services/context_builder.py`: the four fixed
//! templates, size limits, and fallback strings.

use std::sync::Arc;

use serde_json::Value;

use super::store::SharedStateStore;

/// `{name, description}` catalog entry for managers or workers.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
}

/// Optional host-supplied accessor for a data-model schema manifest. Kept as
/// an injected function rather than a concrete lookup — the manifest source
/// itself is out of scope (SPEC_FULL §1).
pub type ManifestGetter = dyn Fn() -> Option<String> + Send + Sync;

pub struct ContextBuilder {
    store: Arc<SharedStateStore>,
    namespace: String,
    manifest_getter: Option<Box<ManifestGetter>>,
    manifest_cache: std::sync::Mutex<Option<String>>,
}

const ORCHESTRATOR_HISTORY_TURNS: usize = 8;
const MANAGER_MANIFEST_LIMIT: usize = 6000;
const WORKER_SCRIPT_LIMIT: usize = 4000;

impl ContextBuilder {
    pub fn new(store: Arc<SharedStateStore>, namespace: impl Into<String>) -> Self {
        Self { store, namespace: namespace.into(), manifest_getter: None, manifest_cache: std::sync::Mutex::new(None) }
    }

    pub fn with_manifest_getter(mut self, getter: Box<ManifestGetter>) -> Self {
        self.manifest_getter = Some(getter);
        self
    }

    fn format_catalog(entries: &[CatalogEntry], fallback: &str) -> String {
        if entries.is_empty() {
            return fallback.to_string();
        }
        entries.iter().map(|e| format!("- {}: {}", e.name, e.description)).collect::<Vec<_>>().join("\n")
    }

    fn conversation_summary(&self, limit: usize) -> String {
        let turns = self.store.list_conversation(&self.namespace);
        if turns.is_empty() {
            return String::new();
        }
        let start = turns.len().saturating_sub(limit);
        turns[start..]
            .iter()
            .map(|t| format!("{}: {}", t.role.to_uppercase(), t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn get_schema_manifest(&self) -> Option<String> {
        {
            let cached = self.manifest_cache.lock().unwrap();
            if cached.is_some() {
                return cached.clone();
            }
        }
        let manifest = self.manifest_getter.as_ref().and_then(|getter| getter());
        if let Some(ref m) = manifest {
            *self.manifest_cache.lock().unwrap() = Some(m.clone());
        }
        manifest
    }

    /// Executive briefing for orchestrators (no detailed schema).
    pub fn build_orchestrator_context(&self, latest_request: &str, available_managers: &[CatalogEntry]) -> String {
        let managers_block = Self::format_catalog(available_managers, "No managers configured.");
        let conversation_summary = self.conversation_summary(ORCHESTRATOR_HISTORY_TURNS);
        let conversation_summary = if conversation_summary.is_empty() { "No prior conversation.".to_string() } else { conversation_summary };
        let request = if latest_request.trim().is_empty() { "(empty request)" } else { latest_request.trim() };
        format!(
            "== Available Managers ==\n{managers_block}\n\n== Conversation Summary ==\n{conversation_summary}\n\n== Current User Request ==\n{request}"
        )
    }

    /// Project blueprint for managers. Returns `(context_text, full_manifest)`.
    pub fn build_manager_context(&self, phase_goal: &str, worker_descriptions: &[CatalogEntry], previous_outcome: Option<&str>) -> (String, Option<String>) {
        let manifest_text = self.get_schema_manifest();
        let manifest_display = manifest_text.as_deref().unwrap_or("Manifest unavailable.");
        let manifest_display = if manifest_display.len() > MANAGER_MANIFEST_LIMIT {
            &manifest_display[..MANAGER_MANIFEST_LIMIT]
        } else {
            manifest_display
        };
        let workers_block = Self::format_catalog(worker_descriptions, "No workers configured.");
        let goal = if phase_goal.trim().is_empty() { "(no goal provided)" } else { phase_goal.trim() };
        let mut text = format!(
            "== Director Goal ==\n{goal}\n\n== Data Model Manifest ==\n{manifest_display}\n\n== Available Workers & Tools ==\n{workers_block}"
        );
        if let Some(outcome) = previous_outcome {
            text.push_str(&format!("\n\n== Previous Phase Outcome ==\n{outcome}"));
        }
        (text, manifest_text)
    }

    /// Work order for workers (goal + script or suggested plan).
    pub fn build_worker_execution_context(&self, manager_goal: &str, script_steps: Option<&Value>, suggested_plan: Option<&Value>) -> Value {
        let format_block = |title: &str, payload: Option<&Value>| -> String {
            let Some(payload) = payload else { return String::new() };
            if payload.is_null() {
                return String::new();
            }
            let mut block = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
            if block.len() > WORKER_SCRIPT_LIMIT {
                block.truncate(WORKER_SCRIPT_LIMIT);
                block.push_str("\n... (truncated)");
            }
            format!("\n\n== {title} ==\n{block}")
        };

        let goal = if manager_goal.trim().is_empty() { "(unspecified)" } else { manager_goal.trim() };
        let mut assembled = format!("== Manager Goal ==\n{goal}");
        assembled.push_str(&format_block("Script to Execute", script_steps));
        assembled.push_str(&format_block("Manager Suggested Plan", suggested_plan));

        serde_json::json!({
            "manager_goal": manager_goal,
            "script_steps": script_steps,
            "suggested_plan": suggested_plan,
            "assembled_context": assembled,
        })
    }

    /// Press-release style context for synthesizer agents.
    pub fn build_synthesizer_context(&self, latest_request: &str, technical_result: &Value) -> String {
        let result_text = serde_json::to_string_pretty(technical_result).unwrap_or_else(|_| technical_result.to_string());
        let request = if latest_request.trim().is_empty() { "(empty)" } else { latest_request.trim() };
        format!("== User Request ==\n{request}\n\n== Technical Outcome ==\n{result_text}")
    }

    pub fn latest_user_message(&self) -> Option<String> {
        self.store
            .list_conversation(&self.namespace)
            .into_iter()
            .rev()
            .find(|turn| turn.role == "user")
            .map(|turn| turn.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orchestrator_briefing_falls_back_when_empty() {
        let store = Arc::new(SharedStateStore::new());
        let builder = ContextBuilder::new(store, "job");
        let text = builder.build_orchestrator_context("", &[]);
        assert!(text.contains("No managers configured."));
        assert!(text.contains("No prior conversation."));
        assert!(text.contains("(empty request)"));
    }

    #[test]
    fn manager_blueprint_includes_previous_phase_outcome_when_present() {
        let store = Arc::new(SharedStateStore::new());
        let builder = ContextBuilder::new(store, "job");
        let (text, manifest) = builder.build_manager_context("Build report", &[], Some("W1 finished successfully"));
        assert!(text.contains("W1 finished successfully"));
        assert!(text.contains("Manifest unavailable."));
        assert!(manifest.is_none());
    }

    #[test]
    fn manifest_getter_is_consulted_and_cached() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let store = Arc::new(SharedStateStore::new());
        let builder = ContextBuilder::new(store, "job").with_manifest_getter(Box::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Some("table: orders".to_string())
        }));
        assert_eq!(builder.get_schema_manifest().as_deref(), Some("table: orders"));
        assert_eq!(builder.get_schema_manifest().as_deref(), Some("table: orders"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn synthesizer_context_assembles_request_and_outcome() {
        let store = Arc::new(SharedStateStore::new());
        let builder = ContextBuilder::new(store, "job");
        let text = builder.build_synthesizer_context("show me sales", &serde_json::json!({"rows": 3}));
        assert!(text.contains("show me sales"));
        assert!(text.contains("\"rows\": 3"));
    }
}
