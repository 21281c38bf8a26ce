use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::clock::{ClockTime, Window};

/// Unix milliseconds, used for record timestamps.
pub type Ms = i64;

pub(crate) fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

// ── Appointment status ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Scheduled,
        Status::InProgress,
        Status::Completed,
        Status::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Scheduled => "scheduled",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL.into_iter().find(|st| st.as_str() == s).ok_or(())
    }
}

// ── Scheduling subjects ──────────────────────────────────────────

/// The two independent axes a walk can conflict on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubjectKind {
    Walker,
    Pet,
}

impl SubjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectKind::Walker => "walker",
            SubjectKind::Pet => "pet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    Walker(Ulid),
    Pet(Ulid),
}

impl Subject {
    pub fn kind(&self) -> SubjectKind {
        match self {
            Subject::Walker(_) => SubjectKind::Walker,
            Subject::Pet(_) => SubjectKind::Pet,
        }
    }

    pub fn id(&self) -> Ulid {
        match self {
            Subject::Walker(id) | Subject::Pet(id) => *id,
        }
    }
}

// ── Records ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    /// Always `start_time + duration_hours`, wrapped to a wall-clock time.
    pub end_time: ClockTime,
    pub duration_hours: f64,
    pub pet_id: Ulid,
    pub walker_id: Ulid,
    pub notes: String,
    pub admin_notes: String,
    pub status: Status,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Appointment {
    pub fn window(&self) -> Window {
        Window::new(self.start_time, self.duration_hours)
    }

    pub fn occupies(&self, subject: &Subject) -> bool {
        match subject {
            Subject::Walker(id) => self.walker_id == *id,
            Subject::Pet(id) => self.pet_id == *id,
        }
    }
}

/// Identification document kinds accepted for walkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdType {
    /// Citizenship card.
    Cc,
    /// Foreigner ID.
    Ce,
    /// Passport.
    Pp,
}

impl IdType {
    pub fn as_str(self) -> &'static str {
        match self {
            IdType::Cc => "CC",
            IdType::Ce => "CE",
            IdType::Pp => "PP",
        }
    }
}

impl FromStr for IdType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CC" => Ok(IdType::Cc),
            "CE" => Ok(IdType::Ce),
            "PP" => Ok(IdType::Pp),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Walker {
    pub id: Ulid,
    pub name: String,
    pub id_type: IdType,
    pub id_number: String,
    pub phone: String,
    pub email: String,
    pub company_phone: String,
    pub company_address: String,
    pub address: String,
    /// Hourly rate.
    pub rate: f64,
    pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Ulid,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: u32,
    pub gender: Gender,
    pub special_recommendations: String,
}

// ── Raw inputs ───────────────────────────────────────────────────
//
// Form-style submissions: every field is optional text and is coerced by
// validation, so "missing" and "malformed" stay distinguishable.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentInput {
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub duration_hours: Option<String>,
    pub pet_id: Option<String>,
    pub walker_id: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkerInput {
    pub name: Option<String>,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub company_phone: Option<String>,
    pub company_address: Option<String>,
    pub address: Option<String>,
    pub rate: Option<String>,
    pub rating: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PetInput {
    pub owner_id: Option<String>,
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub special_recommendations: Option<String>,
}

/// Flat event types, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OwnerSaved { owner: Owner },
    OwnerRemoved { id: Ulid },
    WalkerSaved { walker: Walker },
    WalkerRemoved { id: Ulid },
    PetSaved { pet: Pet },
    PetRemoved { id: Ulid },
    AppointmentSaved { appointment: Appointment },
    AppointmentStatusChanged { id: Ulid, status: Status, at: Ms },
    AppointmentRemoved { id: Ulid },
}

// ── Query result types ───────────────────────────────────────────

/// An appointment with its pet and walker resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentView {
    pub appointment: Appointment,
    pub pet: Option<Pet>,
    pub walker: Option<Walker>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PetView {
    pub pet: Pet,
    pub owner: Option<Owner>,
}
