//! `FollowUpPolicy`: decides whether a manager should run the next phase
//! after the primary worker's result (§4.4).

use super::{CompletionDetector, DefaultCompletionDetector, PolicyContext};
use crate::hier::model::{FinalResponse, Message, Phase};

pub trait FollowUpPolicy: Send + Sync {
    fn should_follow_up(&self, primary_result: &FinalResponse, phases: &[Phase], completed_phases: usize, history: &[Message], ctx: &PolicyContext) -> bool;
}

/// Default follow-up policy, grounded on `DefaultFollowUpPolicy` in
/// `policies/default.py`. Checks run in this exact order, short-circuiting:
/// disabled → already-complete-with-stop-on-completion → phase-cap exceeded
/// → no phases remaining.
pub struct DefaultFollowUpPolicy {
    pub enabled: bool,
    pub stop_on_completion: bool,
    pub max_phases: Option<usize>,
    pub completion: DefaultCompletionDetector,
}

impl Default for DefaultFollowUpPolicy {
    fn default() -> Self {
        Self { enabled: true, stop_on_completion: true, max_phases: None, completion: DefaultCompletionDetector::default() }
    }
}

impl FollowUpPolicy for DefaultFollowUpPolicy {
    fn should_follow_up(&self, primary_result: &FinalResponse, phases: &[Phase], completed_phases: usize, history: &[Message], ctx: &PolicyContext) -> bool {
        if !self.enabled {
            return false;
        }
        if self.stop_on_completion && self.completion.is_complete(primary_result, history, ctx) {
            return false;
        }
        if let Some(max_phases) = self.max_phases {
            if completed_phases >= max_phases {
                return false;
            }
        }
        completed_phases < phases.len()
    }
}
