//! `LoopPreventionPolicy`: detects stagnation so a run doesn't spin forever
//! repeating the same action (§4.4).

use super::PolicyContext;
use crate::hier::model::Action;
use crate::hier::signature::action_signature;
use serde_json::Value;

pub trait LoopPreventionPolicy: Send + Sync {
    /// Returns `Some(reason)` when stagnation is detected.
    fn detect_stagnation(&self, action_history: &[Action], observation_history: &[Value], ctx: &PolicyContext) -> Option<String>;
}

/// Default loop-prevention policy, grounded on `DefaultLoopPreventionPolicy`
/// in `policies/default.py`.
pub struct DefaultLoopPreventionPolicy {
    pub action_window: usize,
    pub observation_window: usize,
    pub repetition_threshold: usize,
}

impl Default for DefaultLoopPreventionPolicy {
    fn default() -> Self {
        Self {
            action_window: 5,
            observation_window: 5,
            repetition_threshold: 3,
        }
    }
}

impl LoopPreventionPolicy for DefaultLoopPreventionPolicy {
    fn detect_stagnation(&self, action_history: &[Action], observation_history: &[Value], ctx: &PolicyContext) -> Option<String> {
        // Highest priority: the task already appears complete but the
        // planner keeps going.
        if let Some(result) = &ctx.last_result {
            if result.payload.get("completed").and_then(Value::as_bool).unwrap_or(false) {
                return Some("task already appears complete but execution continued".to_string());
            }
        }

        if self.action_window < self.repetition_threshold || self.observation_window < self.repetition_threshold {
            return None;
        }

        let recent_actions = tail(action_history, self.action_window);
        let recent_observations = tail(observation_history, self.observation_window);

        if recent_actions.len() < self.repetition_threshold || recent_observations.len() < self.repetition_threshold {
            return None;
        }

        let last_n_actions = &recent_actions[recent_actions.len() - self.repetition_threshold..];
        let same_action = last_n_actions
            .windows(2)
            .all(|pair| action_signature(&pair[0].tool_name, &pair[0].tool_args) == action_signature(&pair[1].tool_name, &pair[1].tool_args));

        let last_n_observations = &recent_observations[recent_observations.len() - self.repetition_threshold..];
        let same_observation = last_n_observations.windows(2).all(|pair| pair[0] == pair[1]);

        if same_action && same_observation {
            Some(format!(
                "same action repeated {} times with identical observations",
                self.repetition_threshold
            ))
        } else {
            None
        }
    }
}

fn tail<T: Clone>(items: &[T], window: usize) -> Vec<T> {
    let start = items.len().saturating_sub(window);
    items[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hier::model::FinalResponse;
    use serde_json::json;
    use std::collections::HashMap;

    fn action(tool: &str, q: &str) -> Action {
        let mut args = HashMap::new();
        args.insert("q".to_string(), json!(q));
        Action::new(tool, args)
    }

    #[test]
    fn repeated_identical_actions_and_observations_trigger_stagnation() {
        let policy = DefaultLoopPreventionPolicy::default();
        let actions = vec![action("search", "x"), action("search", "x"), action("search", "x")];
        let observations = vec![json!("none"), json!("none"), json!("none")];
        assert!(policy.detect_stagnation(&actions, &observations, &PolicyContext::default()).is_some());
    }

    #[test]
    fn varied_observations_do_not_trigger_stagnation() {
        let policy = DefaultLoopPreventionPolicy::default();
        let actions = vec![action("search", "x"), action("search", "x"), action("search", "x")];
        let observations = vec![json!("none"), json!("one result"), json!("two results")];
        assert!(policy.detect_stagnation(&actions, &observations, &PolicyContext::default()).is_none());
    }

    #[test]
    fn window_smaller_than_threshold_never_fires() {
        let policy = DefaultLoopPreventionPolicy { action_window: 2, repetition_threshold: 3, ..Default::default() };
        let actions = vec![action("search", "x"), action("search", "x"), action("search", "x")];
        let observations = vec![json!("none"), json!("none"), json!("none")];
        assert!(policy.detect_stagnation(&actions, &observations, &PolicyContext::default()).is_none());
    }

    #[test]
    fn completion_already_reached_outranks_repetition_check() {
        let policy = DefaultLoopPreventionPolicy::default();
        let ctx = PolicyContext { last_result: Some(FinalResponse::new("model_ops", json!({"completed": true}), "done")), ..Default::default() };
        let stagnation = policy.detect_stagnation(&[], &[], &ctx);
        assert!(stagnation.is_some());
    }
}
