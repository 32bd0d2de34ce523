//! `CompletionDetector`: decides whether a task is done (§4.4).

use serde_json::Value;

use super::current_turn;
use super::PolicyContext;
use crate::hier::model::{FinalResponse, Message, MessageType};

pub trait CompletionDetector: Send + Sync {
    fn is_complete(&self, result: &FinalResponse, history: &[Message], ctx: &PolicyContext) -> bool;
}

/// Default completion detector, grounded on `DefaultCompletionDetector` in
/// `policies/default.py`.
pub struct DefaultCompletionDetector {
    pub indicators: Vec<String>,
    pub terminal_operations: Vec<String>,
    pub check_history_depth: usize,
}

impl Default for DefaultCompletionDetector {
    fn default() -> Self {
        Self {
            indicators: vec![
                "task completed".to_string(),
                "task is complete".to_string(),
                "done with the task".to_string(),
            ],
            terminal_operations: vec!["display_message".to_string(), "display_table".to_string()],
            check_history_depth: 10,
        }
    }
}

impl DefaultCompletionDetector {
    fn summary_has_indicator(&self, summary: &str) -> bool {
        let lower = summary.to_lowercase();
        self.indicators.iter().any(|ind| lower.contains(ind))
    }

    fn entry_signals_completion(&self, entry: &Message) -> bool {
        match entry.type_ {
            MessageType::Action => entry.tool.as_deref() == Some("complete_task"),
            MessageType::Observation => {
                let completed = entry.content.get("completed").and_then(Value::as_bool).unwrap_or(false);
                let has_indicator = entry
                    .content
                    .get("message")
                    .and_then(Value::as_str)
                    .map(|s| self.summary_has_indicator(s))
                    .unwrap_or(false);
                completed || has_indicator
            }
            _ => false,
        }
    }
}

impl CompletionDetector for DefaultCompletionDetector {
    fn is_complete(&self, result: &FinalResponse, history: &[Message], _ctx: &PolicyContext) -> bool {
        if result.payload.get("completed").and_then(Value::as_bool).unwrap_or(false) {
            return true;
        }
        if result
            .payload
            .get("response_validation")
            .and_then(|v| v.get("complete"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return true;
        }
        if self.terminal_operations.contains(&result.operation) && self.summary_has_indicator(&result.human_readable_summary) {
            return true;
        }

        let turn = current_turn(history);
        let window_start = turn.len().saturating_sub(self.check_history_depth);
        turn[window_start..].iter().rev().any(|entry| self.entry_signals_completion(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hier::model::MessageType;
    use serde_json::json;

    #[test]
    fn completed_flag_short_circuits() {
        let detector = DefaultCompletionDetector::default();
        let result = FinalResponse::new("model_ops", json!({"completed": true}), "ok");
        assert!(detector.is_complete(&result, &[], &PolicyContext::default()));
    }

    #[test]
    fn ignores_completion_signal_from_a_previous_turn() {
        let detector = DefaultCompletionDetector::default();
        let mut history = vec![Message::task("first turn")];
        let mut old_action = Message::new(MessageType::Action, json!(null));
        old_action.tool = Some("complete_task".to_string());
        history.push(old_action);
        history.push(Message::task("second turn"));
        history.push(Message::new(MessageType::Action, json!(null)));

        let result = FinalResponse::display_message("still working");
        assert!(!detector.is_complete(&result, &history, &PolicyContext::default()));
    }

    #[test]
    fn complete_task_action_in_current_turn_is_detected() {
        let detector = DefaultCompletionDetector::default();
        let mut history = vec![Message::task("turn")];
        let mut action = Message::new(MessageType::Action, json!(null));
        action.tool = Some("complete_task".to_string());
        history.push(action);

        let result = FinalResponse::display_message("still working");
        assert!(detector.is_complete(&result, &history, &PolicyContext::default()));
    }

    #[test]
    fn indicator_substring_in_summary_is_detected() {
        let detector = DefaultCompletionDetector::default();
        let result = FinalResponse::new("display_message", json!({}), "The task is complete now.");
        assert!(detector.is_complete(&result, &[], &PolicyContext::default()));
    }
}
