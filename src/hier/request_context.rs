//! Per-request ambient context: job id, collected approvals, the active
//! strategic plan, and per-manager phase indices, readable from anywhere in
//! a call tree without threading an explicit parameter through every
//! function (§5).
//!
//! Grounded on `services/request_context.py`'s `contextvars`-based globals;
//! `tokio::task_local!` is the async-native Rust analogue of a contextvar —
//! isolated per task, inherited by children only if explicitly propagated.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;

use super::model::StrategicPlan;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub job_id: Option<String>,
    pub approvals: HashMap<String, bool>,
    pub strategic_plan: Option<StrategicPlan>,
    pub phase_index_by_manager: HashMap<String, usize>,
}

impl RequestContext {
    pub fn with_job_id(job_id: impl Into<String>) -> Self {
        Self { job_id: Some(job_id.into()), ..Default::default() }
    }

    pub fn is_approved(&self, signature: &str) -> bool {
        self.approvals.get(signature).copied().unwrap_or(false)
    }

    pub fn phase_index(&self, manager_name: &str) -> usize {
        self.phase_index_by_manager.get(manager_name).copied().unwrap_or(0)
    }
}

tokio::task_local! {
    static CONTEXT: RefCell<RequestContext>;
}

/// Run `fut` with a fresh, empty context bound for its task tree.
pub async fn scope<F: Future>(fut: F) -> F::Output {
    CONTEXT.scope(RefCell::new(RequestContext::default()), fut).await
}

/// Run `fut` with an explicit starting context — used when spawning a child
/// task that should inherit the parent's snapshot rather than start blank.
pub async fn scope_with<F: Future>(context: RequestContext, fut: F) -> F::Output {
    CONTEXT.scope(RefCell::new(context), fut).await
}

/// A clone of the current task's context, meant to be handed to
/// `scope_with` when spawning a child (`tokio::spawn` does not inherit
/// task-locals automatically).
pub fn snapshot() -> RequestContext {
    CONTEXT.try_with(|cell| cell.borrow().clone()).unwrap_or_default()
}

pub fn get_from_context<T>(f: impl FnOnce(&RequestContext) -> T) -> Option<T> {
    CONTEXT.try_with(|cell| f(&cell.borrow())).ok()
}

/// Mutate the current task's context in place. No-op (returns `false`) if
/// called outside a `scope`/`scope_with` future.
pub fn update(f: impl FnOnce(&mut RequestContext)) -> bool {
    CONTEXT
        .try_with(|cell| {
            f(&mut cell.borrow_mut());
        })
        .is_ok()
}
