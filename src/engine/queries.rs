use std::cmp::Reverse;

use ulid::Ulid;

use crate::model::*;

use super::validate::{parse_date, parse_ref};
use super::{Engine, EngineError};

/// Newest date first, then latest start.
fn newest_first(appointments: &mut [Appointment]) {
    appointments.sort_by_key(|a| (Reverse(a.date), Reverse(a.start_time), a.id));
}

impl Engine {
    fn view(&self, appointment: Appointment) -> AppointmentView {
        AppointmentView {
            pet: self.store.get_pet(&appointment.pet_id),
            walker: self.store.get_walker(&appointment.walker_id),
            appointment,
        }
    }

    fn views(&self, appointments: Vec<Appointment>) -> Vec<AppointmentView> {
        appointments.into_iter().map(|a| self.view(a)).collect()
    }

    fn pet_view(&self, pet: Pet) -> PetView {
        PetView {
            owner: self.store.get_owner(&pet.owner_id),
            pet,
        }
    }

    // ── Appointments ─────────────────────────────────────────

    pub fn get_appointment(&self, id: &str) -> Result<AppointmentView, EngineError> {
        let ulid = parse_ref("appointment", id)?;
        self.store
            .get_appointment(&ulid)
            .map(|a| self.view(a))
            .ok_or_else(|| EngineError::not_found("appointment", id))
    }

    pub fn list_appointments(&self) -> Vec<AppointmentView> {
        let mut all = self.store.appointments();
        newest_first(&mut all);
        self.views(all)
    }

    /// Every walk on `date`, in booking order.
    pub fn appointments_by_date(&self, date: &str) -> Result<Vec<AppointmentView>, EngineError> {
        let date = parse_date(date.trim())?;
        let on_date = self
            .store
            .appointments()
            .into_iter()
            .filter(|a| a.date == date)
            .collect();
        Ok(self.views(on_date))
    }

    pub fn appointments_by_pet(&self, pet_id: &str) -> Result<Vec<AppointmentView>, EngineError> {
        let id = parse_ref("pet", pet_id)?;
        if !self.store.contains_pet(&id) {
            return Err(EngineError::not_found("pet", pet_id));
        }
        let mut found = self.store.appointments_of(Subject::Pet(id));
        newest_first(&mut found);
        Ok(self.views(found))
    }

    pub fn appointments_by_walker(&self, walker_id: &str) -> Result<Vec<AppointmentView>, EngineError> {
        let id = parse_ref("walker", walker_id)?;
        if !self.store.contains_walker(&id) {
            return Err(EngineError::not_found("walker", walker_id));
        }
        let mut found = self.store.appointments_of(Subject::Walker(id));
        newest_first(&mut found);
        Ok(self.views(found))
    }

    // ── Registries ───────────────────────────────────────────

    pub fn get_owner(&self, id: &str) -> Result<Owner, EngineError> {
        let ulid = parse_ref("owner", id)?;
        self.store
            .get_owner(&ulid)
            .ok_or_else(|| EngineError::not_found("owner", id))
    }

    pub fn list_owners(&self) -> Vec<Owner> {
        self.store.owners()
    }

    pub fn get_walker(&self, id: &str) -> Result<Walker, EngineError> {
        let ulid = parse_ref("walker", id)?;
        self.store
            .get_walker(&ulid)
            .ok_or_else(|| EngineError::not_found("walker", id))
    }

    pub fn list_walkers(&self) -> Vec<Walker> {
        self.store.walkers()
    }

    pub fn get_pet(&self, id: &str) -> Result<PetView, EngineError> {
        let ulid = parse_ref("pet", id)?;
        self.store
            .get_pet(&ulid)
            .map(|p| self.pet_view(p))
            .ok_or_else(|| EngineError::not_found("pet", id))
    }

    pub fn list_pets(&self) -> Vec<PetView> {
        self.store.pets().into_iter().map(|p| self.pet_view(p)).collect()
    }

    pub fn pets_by_owner(&self, owner_id: &str) -> Result<Vec<PetView>, EngineError> {
        let id: Ulid = parse_ref("owner", owner_id)?;
        if !self.store.contains_owner(&id) {
            return Err(EngineError::not_found("owner", owner_id));
        }
        Ok(self
            .store
            .pets_of_owner(&id)
            .into_iter()
            .map(|p| self.pet_view(p))
            .collect())
    }
}
