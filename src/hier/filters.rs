//! Role-specific history projections used only for prompt assembly (§4.3).
//!
//! Grounded on `policies/history_filters.py`: each role sees a narrower slice
//! of the full history than the one before it.

use super::model::{Message, MessageType};

/// Ambient information a filter may need beyond the raw history.
#[derive(Debug, Clone, Default)]
pub struct FilterContext {
    pub max_conversation_turns: Option<usize>,
    pub phase_id: Option<usize>,
    pub previous_phase_id: Option<usize>,
}

pub trait HistoryFilter: Send + Sync {
    fn filter_for_prompt(&self, history: &[Message], ctx: &FilterContext) -> Vec<Message>;
}

/// High-level conversation summary for orchestrators: conversation turns
/// only, limited to the last N (default 8).
pub struct OrchestratorFilter {
    pub max_conversation_turns: usize,
}

impl Default for OrchestratorFilter {
    fn default() -> Self {
        Self { max_conversation_turns: 8 }
    }
}

impl HistoryFilter for OrchestratorFilter {
    fn filter_for_prompt(&self, history: &[Message], ctx: &FilterContext) -> Vec<Message> {
        let max_turns = ctx.max_conversation_turns.unwrap_or(self.max_conversation_turns);
        let conversation: Vec<Message> =
            history.iter().filter(|m| m.type_.is_conversation()).cloned().collect();
        let start = conversation.len().saturating_sub(max_turns);
        conversation[start..].to_vec()
    }
}

/// Phase-relevant context for managers: only the previous phase's synthesis
/// summary, nothing else.
#[derive(Default)]
pub struct ManagerFilter;

impl HistoryFilter for ManagerFilter {
    fn filter_for_prompt(&self, history: &[Message], ctx: &FilterContext) -> Vec<Message> {
        let target_phase = ctx.previous_phase_id.or_else(|| {
            ctx.phase_id.and_then(|p| if p > 0 { Some(p - 1) } else { None })
        });
        let Some(target_phase) = target_phase else { return Vec::new() };
        history
            .iter()
            .filter(|m| m.type_ == MessageType::Synthesis && m.phase_id == Some(target_phase))
            .cloned()
            .collect()
    }
}

/// Current-turn execution traces for workers: this is the turn-isolation
/// mechanism (§3.2).
#[derive(Default)]
pub struct WorkerFilter;

impl WorkerFilter {
    fn find_last_task_index(history: &[Message]) -> Option<usize> {
        history.iter().rposition(|m| m.type_ == MessageType::Task)
    }
}

impl HistoryFilter for WorkerFilter {
    fn filter_for_prompt(&self, history: &[Message], _ctx: &FilterContext) -> Vec<Message> {
        let Some(last_task_idx) = Self::find_last_task_index(history) else { return Vec::new() };
        history[last_task_idx + 1..]
            .iter()
            .filter(|m| {
                matches!(
                    m.type_,
                    MessageType::Action | MessageType::Observation | MessageType::Error | MessageType::GlobalObservation
                )
            })
            .cloned()
            .collect()
    }
}

/// Identity filter, kept for backward compatibility with callers that want
/// the unfiltered history.
#[derive(Default)]
pub struct DefaultFilter;

impl HistoryFilter for DefaultFilter {
    fn filter_for_prompt(&self, history: &[Message], _ctx: &FilterContext) -> Vec<Message> {
        history.to_vec()
    }
}
