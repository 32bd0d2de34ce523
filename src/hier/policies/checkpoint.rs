//! `CheckpointPolicy`: decides when a run should pause and emit a
//! resumable checkpoint response (§4.4).

use std::collections::HashSet;

use super::PolicyContext;
use crate::hier::model::FinalResponse;

pub trait CheckpointPolicy: Send + Sync {
    fn should_checkpoint(&self, result: &FinalResponse, iteration: usize, ctx: &PolicyContext) -> bool;
    fn create_checkpoint_response(&self, result: &FinalResponse, ctx: &PolicyContext) -> FinalResponse;
}

/// Default checkpoint policy, grounded on `DefaultCheckpointPolicy` in
/// `policies/default.py`. Disabled by default — a host opts in explicitly.
#[derive(Default)]
pub struct DefaultCheckpointPolicy {
    pub iteration_threshold: Option<usize>,
    pub operations: HashSet<String>,
    pub tools: HashSet<String>,
}

impl CheckpointPolicy for DefaultCheckpointPolicy {
    fn should_checkpoint(&self, result: &FinalResponse, iteration: usize, ctx: &PolicyContext) -> bool {
        if let Some(threshold) = self.iteration_threshold {
            if iteration >= threshold {
                return true;
            }
        }
        if self.operations.contains(&result.operation) {
            return true;
        }
        if let Some(tool) = &ctx.last_tool {
            if self.tools.contains(tool) {
                return true;
            }
        }
        false
    }

    fn create_checkpoint_response(&self, result: &FinalResponse, _ctx: &PolicyContext) -> FinalResponse {
        let mut payload = result.payload.clone();
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("checkpoint".to_string(), serde_json::Value::Bool(true));
        }
        FinalResponse::new(
            result.operation.clone(),
            payload,
            format!("{} (checkpoint saved)", result.human_readable_summary),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        let policy = DefaultCheckpointPolicy::default();
        let result = FinalResponse::display_message("ok");
        assert!(!policy.should_checkpoint(&result, 100, &PolicyContext::default()));
    }

    #[test]
    fn fires_on_iteration_threshold() {
        let policy = DefaultCheckpointPolicy { iteration_threshold: Some(5), ..Default::default() };
        let result = FinalResponse::display_message("ok");
        assert!(policy.should_checkpoint(&result, 5, &PolicyContext::default()));
        assert!(!policy.should_checkpoint(&result, 4, &PolicyContext::default()));
    }

    #[test]
    fn checkpoint_response_preserves_operation_and_marks_flag() {
        let policy = DefaultCheckpointPolicy { iteration_threshold: Some(1), ..Default::default() };
        let result = FinalResponse::display_message("progress");
        let checkpoint = policy.create_checkpoint_response(&result, &PolicyContext::default());
        assert_eq!(checkpoint.operation, "display_message");
        assert_eq!(checkpoint.payload["checkpoint"], serde_json::json!(true));
    }
}
