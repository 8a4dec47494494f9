//! Navigation guard — decides whether the wizard may show a step.

use serde::Serialize;

use super::evaluator::{are_all_steps_completed, is_step_complete};
use super::model::FormSnapshot;
use super::registry::Strictness;
use super::state::{FlowMode, StepKey};

/// A forward jump that was refused. The current step is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct NavigationBlocked {
    pub requested: StepKey,
    /// Where the user should go instead.
    pub first_incomplete: StepKey,
    pub message: String,
}

/// First predecessor of `target` that is not strictly complete.
pub fn first_blocking_step(
    snapshot: &FormSnapshot,
    mode: FlowMode,
    target: StepKey,
) -> Option<StepKey> {
    target
        .predecessors()
        .iter()
        .copied()
        .find(|step| !is_step_complete(snapshot, *step, mode, Strictness::Strict))
}

/// The first step is always reachable; any other step needs every step
/// before it strictly complete.
pub fn can_access_step(snapshot: &FormSnapshot, mode: FlowMode, target: StepKey) -> bool {
    if target == StepKey::first() {
        return true;
    }
    if target.is_terminal() {
        return are_all_steps_completed(snapshot, mode);
    }
    first_blocking_step(snapshot, mode, target).is_none()
}

/// Resolve a direct jump from `current` to `target`.
///
/// Going back, or staying put, is always allowed.
pub fn request_step(
    snapshot: &FormSnapshot,
    mode: FlowMode,
    current: StepKey,
    target: StepKey,
) -> Result<StepKey, NavigationBlocked> {
    if target <= current || can_access_step(snapshot, mode, target) {
        return Ok(target);
    }

    let first_incomplete = first_blocking_step(snapshot, mode, target).unwrap_or(current);
    Err(NavigationBlocked {
        requested: target,
        first_incomplete,
        message: format!(
            "Please complete {} before continuing",
            first_incomplete.label()
        ),
    })
}
