use chrono::NaiveDate;
use ulid::Ulid;

use crate::clock::ClockTime;
use crate::model::{Status, SubjectKind};

/// A booking that occupies part of the requested window.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub subject: SubjectKind,
    pub appointment_id: Ulid,
    pub start: ClockTime,
    pub end: ClockTime,
    /// Walker of the conflicting appointment; resolved for pet conflicts only.
    pub walker_name: Option<String>,
}

#[derive(Debug)]
pub enum EngineError {
    MissingField(&'static str),
    InvalidFormat {
        field: &'static str,
        expected: &'static str,
    },
    PastDate(NaiveDate),
    OutOfRange {
        field: &'static str,
        reason: String,
    },
    NotFound {
        kind: &'static str,
        id: String,
    },
    TooLong {
        field: &'static str,
        max: usize,
    },
    InvalidEnum {
        field: &'static str,
        value: String,
        allowed: &'static str,
    },
    SchedulingConflict(Conflict),
    InvalidTransition {
        from: Status,
        to: String,
    },
    Forbidden {
        id: Ulid,
        status: Status,
    },
    AlreadyExists {
        field: &'static str,
        value: String,
    },
    HasDependents {
        kind: &'static str,
        id: Ulid,
        dependents: &'static str,
    },
    LimitExceeded(&'static str),
    Unavailable(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Infrastructure failures only; every other variant is caused by the
    /// request and will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Unavailable(_))
    }

    /// SQLSTATE reported to the client.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            EngineError::MissingField(_) => "23502",
            EngineError::InvalidFormat { .. } => "22007",
            EngineError::PastDate(_) => "22008",
            EngineError::OutOfRange { .. } => "22003",
            EngineError::NotFound { .. } => "P0002",
            EngineError::TooLong { .. } => "22001",
            EngineError::InvalidEnum { .. } => "22P02",
            EngineError::SchedulingConflict(_) => "23P01",
            EngineError::InvalidTransition { .. } => "55000",
            EngineError::Forbidden { .. } => "55006",
            EngineError::AlreadyExists { .. } => "23505",
            EngineError::HasDependents { .. } => "23503",
            EngineError::LimitExceeded(_) => "54000",
            EngineError::Unavailable(_) => "58030",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MissingField(field) => write!(f, "missing required field: {field}"),
            EngineError::InvalidFormat { field, expected } => {
                write!(f, "{field} must use the format {expected}")
            }
            EngineError::PastDate(date) => {
                write!(f, "cannot schedule walks on a past date: {date}")
            }
            EngineError::OutOfRange { field, reason } => write!(f, "{field} out of range: {reason}"),
            EngineError::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            EngineError::TooLong { field, max } => {
                write!(f, "{field} cannot exceed {max} characters")
            }
            EngineError::InvalidEnum {
                field,
                value,
                allowed,
            } => write!(f, "invalid {field} '{value}', expected one of: {allowed}"),
            EngineError::SchedulingConflict(c) => match c.subject {
                SubjectKind::Walker => write!(
                    f,
                    "walker already has a walk scheduled that overlaps this time ({} - {})",
                    c.start, c.end
                ),
                SubjectKind::Pet => write!(
                    f,
                    "pet already has a walk scheduled with {} that overlaps this time ({} - {})",
                    c.walker_name.as_deref().unwrap_or("another walker"),
                    c.start,
                    c.end
                ),
            },
            EngineError::InvalidTransition { from, to } => {
                write!(f, "cannot change status from '{from}' to '{to}'")
            }
            EngineError::Forbidden { id, status } => {
                write!(f, "cannot delete appointment {id} while it is {status}")
            }
            EngineError::AlreadyExists { field, value } => {
                write!(f, "{field} already exists: {value}")
            }
            EngineError::HasDependents {
                kind,
                id,
                dependents,
            } => write!(f, "cannot delete {kind} {id}: it still has {dependents}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Unavailable(e) => write!(f, "storage unavailable: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict(subject: SubjectKind, walker_name: Option<&str>) -> EngineError {
        EngineError::SchedulingConflict(Conflict {
            subject,
            appointment_id: Ulid::new(),
            start: ClockTime::from_minutes(540),
            end: ClockTime::from_minutes(600),
            walker_name: walker_name.map(String::from),
        })
    }

    #[test]
    fn walker_conflict_names_the_window() {
        let msg = conflict(SubjectKind::Walker, None).to_string();
        assert!(msg.contains("walker"));
        assert!(msg.contains("(09:00 - 10:00)"), "{msg}");
    }

    #[test]
    fn pet_conflict_names_the_other_walker() {
        let msg = conflict(SubjectKind::Pet, Some("Ana")).to_string();
        assert!(msg.contains("with Ana"), "{msg}");
        assert!(msg.contains("(09:00 - 10:00)"));

        let anon = conflict(SubjectKind::Pet, None).to_string();
        assert!(anon.contains("another walker"));
    }

    #[test]
    fn transition_error_names_both_statuses() {
        let e = EngineError::InvalidTransition {
            from: Status::Completed,
            to: "in_progress".into(),
        };
        assert_eq!(e.to_string(), "cannot change status from 'completed' to 'in_progress'");
    }

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(EngineError::Unavailable("disk".into()).is_retryable());
        assert!(!conflict(SubjectKind::Walker, None).is_retryable());
        assert!(!EngineError::MissingField("notes").is_retryable());
    }

    #[test]
    fn conflict_maps_to_exclusion_violation() {
        assert_eq!(conflict(SubjectKind::Pet, None).sqlstate(), "23P01");
        assert_ne!(
            EngineError::Unavailable("timeout".into()).sqlstate(),
            conflict(SubjectKind::Walker, None).sqlstate()
        );
    }
}
