//! `TerminationPolicy`: decides whether a worker iteration loop should stop (§4.4).

use super::{CompletionDetector, DefaultCompletionDetector, PolicyContext};
use crate::hier::model::{Message, PlanOutcome};

pub trait TerminationPolicy: Send + Sync {
    fn should_terminate(&self, iteration: usize, plan_outcome: &PlanOutcome, history: &[Message], ctx: &PolicyContext) -> bool;
}

/// Default termination policy, grounded on `DefaultTerminationPolicy` in
/// `policies/default.py`.
///
/// Crucially, the completion-detector branch only runs when `plan_outcome`
/// is a `FinalResponse` — never while the planner just returned actions, so
/// completion is evaluated only after those actions have actually executed.
pub struct DefaultTerminationPolicy {
    pub max_iterations: usize,
    pub completion: DefaultCompletionDetector,
}

impl Default for DefaultTerminationPolicy {
    fn default() -> Self {
        Self { max_iterations: 15, completion: DefaultCompletionDetector::default() }
    }
}

impl TerminationPolicy for DefaultTerminationPolicy {
    fn should_terminate(&self, iteration: usize, plan_outcome: &PlanOutcome, history: &[Message], ctx: &PolicyContext) -> bool {
        if iteration > self.max_iterations {
            return true;
        }
        match plan_outcome {
            // A FinalResponse always terminates regardless of what the
            // completion detector says about it; the detector is consulted
            // by callers that need to distinguish a natural finish from one
            // that still needs synthesizing (see `WorkerAgent`).
            PlanOutcome::Final(result) => {
                let _ = self.completion.is_complete(result, history, ctx);
                true
            }
            // Do not run completion checks while the planner just returned
            // actions — completion is judged after those actions execute.
            PlanOutcome::Single(_) | PlanOutcome::Many(_) => false,
        }
    }
}
