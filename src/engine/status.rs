use crate::model::Status;

use super::EngineError;

/// Statuses reachable in one step from `current`.
pub fn allowed_next(current: Status) -> &'static [Status] {
    match current {
        Status::Scheduled => &[Status::InProgress, Status::Cancelled],
        Status::InProgress => &[Status::Completed, Status::Cancelled],
        Status::Completed => &[],
        Status::Cancelled => &[Status::Scheduled],
    }
}

/// Validate a requested status change. `requested` is raw client text, so an
/// unknown status is reported the same way as a disallowed one.
pub fn transition(current: Status, requested: &str) -> Result<Status, EngineError> {
    let invalid = || EngineError::InvalidTransition {
        from: current,
        to: requested.to_string(),
    };
    let next: Status = requested.trim().parse().map_err(|_| invalid())?;
    if allowed_next(current).contains(&next) {
        Ok(next)
    } else {
        Err(invalid())
    }
}

/// Only walks that never started, or were called off, can be deleted.
pub fn can_delete(status: Status) -> bool {
    matches!(status, Status::Scheduled | Status::Cancelled)
}
