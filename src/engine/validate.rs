use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use ulid::Ulid;

use crate::clock::{add_duration, ClockTime, Window};
use crate::config::SchedulingPolicy;
use crate::model::*;

use super::availability::check_availability;
use super::repository::{AppointmentRepository, Directory};
use super::EngineError;

static YMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date pattern"));

/// A validated appointment, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAppointment {
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub duration_hours: f64,
    pub pet_id: Ulid,
    pub walker_id: Ulid,
    pub notes: String,
    pub admin_notes: String,
    pub status: Status,
}

impl NormalizedAppointment {
    pub fn into_appointment(self, id: Ulid, created_at: Ms, updated_at: Ms) -> Appointment {
        Appointment {
            id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_hours: self.duration_hours,
            pet_id: self.pet_id,
            walker_id: self.walker_id,
            notes: self.notes,
            admin_notes: self.admin_notes,
            status: self.status,
            created_at,
            updated_at,
        }
    }
}

/// Run every appointment check in order and stop at the first failure.
///
/// Field checks come first, then referential checks against `repo`, then
/// the walker and pet availability checks (skipping `exclude`).
pub async fn validate<R>(
    repo: &R,
    policy: &SchedulingPolicy,
    today: NaiveDate,
    input: &AppointmentInput,
    exclude: Option<Ulid>,
) -> Result<NormalizedAppointment, EngineError>
where
    R: AppointmentRepository + Directory + ?Sized,
{
    let date_raw = required("date", &input.date)?;
    let start_raw = required("start_time", &input.start_time)?;
    let duration_raw = required("duration_hours", &input.duration_hours)?;
    let pet_raw = required("pet_id", &input.pet_id)?;
    let walker_raw = required("walker_id", &input.walker_id)?;
    let notes = required("notes", &input.notes)?;

    let date = parse_date(date_raw)?;
    not_in_past(date, today)?;
    let start_time = parse_start_time(start_raw)?;
    let duration_hours = parse_duration(duration_raw, policy)?;
    same_day(start_time, duration_hours)?;

    let pet_id = parse_ref("pet", pet_raw)?;
    if !repo.pet_exists(pet_id).await? {
        return Err(EngineError::not_found("pet", pet_raw));
    }
    let walker_id = parse_ref("walker", walker_raw)?;
    if !repo.walker_exists(walker_id).await? {
        return Err(EngineError::not_found("walker", walker_raw));
    }

    max_len("notes", notes, policy.max_notes_len)?;
    let status = parse_status(optional(&input.status), policy)?;
    let admin_notes = optional(&input.admin_notes).unwrap_or_default();
    max_len("admin_notes", admin_notes, policy.max_admin_notes_len)?;

    check_availability(repo, policy, Subject::Walker(walker_id), date, start_time, duration_hours, exclude).await?;
    check_availability(repo, policy, Subject::Pet(pet_id), date, start_time, duration_hours, exclude).await?;

    Ok(NormalizedAppointment {
        date,
        start_time,
        end_time: add_duration(start_time, duration_hours),
        duration_hours,
        pet_id,
        walker_id,
        notes: notes.to_string(),
        admin_notes: admin_notes.to_string(),
        status,
    })
}

// ── Steps ────────────────────────────────────────────────────────

pub(crate) fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, EngineError> {
    optional(value).ok_or(EngineError::MissingField(field))
}

/// Trimmed value, `None` when absent or blank.
pub(crate) fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), EngineError> {
    if value.chars().count() > max {
        return Err(EngineError::TooLong { field, max });
    }
    Ok(())
}

/// Unparseable ids cannot name an existing record.
pub(crate) fn parse_ref(kind: &'static str, raw: &str) -> Result<Ulid, EngineError> {
    Ulid::from_string(raw).map_err(|_| EngineError::not_found(kind, raw))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, EngineError> {
    let invalid = EngineError::InvalidFormat {
        field: "date",
        expected: "YYYY-MM-DD",
    };
    if !YMD.is_match(raw) {
        return Err(invalid);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid)
}

fn not_in_past(date: NaiveDate, today: NaiveDate) -> Result<(), EngineError> {
    if date < today {
        return Err(EngineError::PastDate(date));
    }
    Ok(())
}

fn parse_start_time(raw: &str) -> Result<ClockTime, EngineError> {
    ClockTime::parse(raw).ok_or(EngineError::InvalidFormat {
        field: "start_time",
        expected: "HH:MM (24-hour)",
    })
}

fn parse_duration(raw: &str, policy: &SchedulingPolicy) -> Result<f64, EngineError> {
    let out_of_range = || EngineError::OutOfRange {
        field: "duration_hours",
        reason: format!(
            "must be between {} and {} hours",
            policy.min_duration_hours, policy.max_duration_hours
        ),
    };
    let hours: f64 = raw.parse().map_err(|_| out_of_range())?;
    if !hours.is_finite() || hours < policy.min_duration_hours || hours > policy.max_duration_hours {
        return Err(out_of_range());
    }
    Ok(hours)
}

/// Walks are dated by their start; one that would run into the next day
/// cannot be represented, so it is rejected. Ending at exactly 00:00 is fine.
fn same_day(start: ClockTime, duration_hours: f64) -> Result<(), EngineError> {
    let window = Window::new(start, duration_hours);
    if window.crosses_midnight() {
        return Err(EngineError::OutOfRange {
            field: "duration_hours",
            reason: format!(
                "a walk starting at {start} for {duration_hours}h would end after midnight ({})",
                window.end_time()
            ),
        });
    }
    Ok(())
}

fn parse_status(raw: Option<&str>, policy: &SchedulingPolicy) -> Result<Status, EngineError> {
    match raw {
        None => Ok(policy.default_status),
        Some(s) => s.parse().map_err(|_| EngineError::InvalidEnum {
            field: "status",
            value: s.to_string(),
            allowed: "scheduled, in_progress, completed, cancelled",
        }),
    }
}
