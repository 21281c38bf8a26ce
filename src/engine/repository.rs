use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{Appointment, Status, Subject};

use super::EngineError;

/// Appointment storage as seen by the validator and availability checker.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Appointments of `subject` on exactly `date` whose status is in
    /// `statuses`, minus `exclude`, ordered by start time.
    async fn find_by_subject_and_date(
        &self,
        subject: Subject,
        date: NaiveDate,
        statuses: &[Status],
        exclude: Option<Ulid>,
    ) -> Result<Vec<Appointment>, EngineError>;

    async fn find_by_walker_and_date(
        &self,
        walker_id: Ulid,
        date: NaiveDate,
        statuses: &[Status],
        exclude: Option<Ulid>,
    ) -> Result<Vec<Appointment>, EngineError> {
        self.find_by_subject_and_date(Subject::Walker(walker_id), date, statuses, exclude)
            .await
    }

    async fn find_by_pet_and_date(
        &self,
        pet_id: Ulid,
        date: NaiveDate,
        statuses: &[Status],
        exclude: Option<Ulid>,
    ) -> Result<Vec<Appointment>, EngineError> {
        self.find_by_subject_and_date(Subject::Pet(pet_id), date, statuses, exclude)
            .await
    }

    async fn find_by_id(&self, id: Ulid) -> Result<Option<Appointment>, EngineError>;

    // The writes below change the collaborator's own state only. The engine
    // never calls them: its writes go through the WAL and replay into the
    // store with `apply_event`.

    async fn create(&self, appointment: Appointment) -> Result<Appointment, EngineError>;

    async fn update(&self, id: Ulid, appointment: Appointment) -> Result<Appointment, EngineError>;

    async fn delete(&self, id: Ulid) -> Result<(), EngineError>;

    async fn resolve_walker_name(&self, walker_id: Ulid) -> Result<Option<String>, EngineError>;
}

/// Existence lookups for the records an appointment references.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn pet_exists(&self, id: Ulid) -> Result<bool, EngineError>;

    async fn walker_exists(&self, id: Ulid) -> Result<bool, EngineError>;
}
