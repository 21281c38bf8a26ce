use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::repository::{AppointmentRepository, Directory};
use super::EngineError;

/// Current state of every record, rebuilt from the WAL on startup.
///
/// The store never validates: everything reaching [`InMemoryStore::apply_event`]
/// has already been checked by the engine.
pub struct InMemoryStore {
    owners: DashMap<Ulid, Owner>,
    walkers: DashMap<Ulid, Walker>,
    pets: DashMap<Ulid, Pet>,
    appointments: DashMap<Ulid, Appointment>,
    /// (walker or pet, date) → ids of appointments booked for it that day.
    day_index: DashMap<(Subject, NaiveDate), Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            owners: DashMap::new(),
            walkers: DashMap::new(),
            pets: DashMap::new(),
            appointments: DashMap::new(),
            day_index: DashMap::new(),
        }
    }

    // ── Registries ───────────────────────────────────────────

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    pub fn walker_count(&self) -> usize {
        self.walkers.len()
    }

    pub fn pet_count(&self) -> usize {
        self.pets.len()
    }

    pub fn get_owner(&self, id: &Ulid) -> Option<Owner> {
        self.owners.get(id).map(|e| e.value().clone())
    }

    pub fn get_walker(&self, id: &Ulid) -> Option<Walker> {
        self.walkers.get(id).map(|e| e.value().clone())
    }

    pub fn get_pet(&self, id: &Ulid) -> Option<Pet> {
        self.pets.get(id).map(|e| e.value().clone())
    }

    pub fn contains_owner(&self, id: &Ulid) -> bool {
        self.owners.contains_key(id)
    }

    pub fn contains_walker(&self, id: &Ulid) -> bool {
        self.walkers.contains_key(id)
    }

    pub fn contains_pet(&self, id: &Ulid) -> bool {
        self.pets.contains_key(id)
    }

    pub fn owners(&self) -> Vec<Owner> {
        let mut out: Vec<Owner> = self.owners.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|o| o.id);
        out
    }

    pub fn walkers(&self) -> Vec<Walker> {
        let mut out: Vec<Walker> = self.walkers.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|w| w.id);
        out
    }

    pub fn pets(&self) -> Vec<Pet> {
        let mut out: Vec<Pet> = self.pets.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|p| p.id);
        out
    }

    pub fn pets_of_owner(&self, owner_id: &Ulid) -> Vec<Pet> {
        let mut out: Vec<Pet> = self
            .pets
            .iter()
            .filter(|e| e.value().owner_id == *owner_id)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }

    /// Another walker (not `except`) already registered with `email`.
    pub fn walker_with_email(&self, email: &str, except: Option<Ulid>) -> Option<Ulid> {
        self.walkers
            .iter()
            .find(|e| Some(*e.key()) != except && e.value().email == email)
            .map(|e| *e.key())
    }

    pub fn walker_with_id_number(&self, id_number: &str, except: Option<Ulid>) -> Option<Ulid> {
        self.walkers
            .iter()
            .find(|e| Some(*e.key()) != except && e.value().id_number == id_number)
            .map(|e| *e.key())
    }

    // ── Appointments ─────────────────────────────────────────

    pub fn appointment_count(&self) -> usize {
        self.appointments.len()
    }

    pub fn get_appointment(&self, id: &Ulid) -> Option<Appointment> {
        self.appointments.get(id).map(|e| e.value().clone())
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        let mut out: Vec<Appointment> = self.appointments.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|a| a.id);
        out
    }

    /// Every appointment of `subject` on `date`, any status, by start time.
    pub fn appointments_on(&self, subject: Subject, date: NaiveDate) -> Vec<Appointment> {
        let ids = self
            .day_index
            .get(&(subject, date))
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut out: Vec<Appointment> = ids.iter().filter_map(|id| self.get_appointment(id)).collect();
        out.sort_by_key(|a| (a.start_time, a.id));
        out
    }

    pub fn appointments_of(&self, subject: Subject) -> Vec<Appointment> {
        self.appointments
            .iter()
            .filter(|e| e.value().occupies(&subject))
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn has_appointments(&self, subject: Subject) -> bool {
        self.appointments.iter().any(|e| e.value().occupies(&subject))
    }

    fn index(&self, appointment: &Appointment) {
        for subject in [
            Subject::Walker(appointment.walker_id),
            Subject::Pet(appointment.pet_id),
        ] {
            self.day_index
                .entry((subject, appointment.date))
                .or_default()
                .push(appointment.id);
        }
    }

    fn unindex(&self, appointment: &Appointment) {
        for subject in [
            Subject::Walker(appointment.walker_id),
            Subject::Pet(appointment.pet_id),
        ] {
            let key = (subject, appointment.date);
            if let Some(mut ids) = self.day_index.get_mut(&key) {
                ids.retain(|id| *id != appointment.id);
            }
            self.day_index.remove_if(&key, |_, ids| ids.is_empty());
        }
    }

    // ── Event application ────────────────────────────────────

    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::OwnerSaved { owner } => {
                self.owners.insert(owner.id, owner.clone());
            }
            Event::OwnerRemoved { id } => {
                self.owners.remove(id);
            }
            Event::WalkerSaved { walker } => {
                self.walkers.insert(walker.id, walker.clone());
            }
            Event::WalkerRemoved { id } => {
                self.walkers.remove(id);
            }
            Event::PetSaved { pet } => {
                self.pets.insert(pet.id, pet.clone());
            }
            Event::PetRemoved { id } => {
                self.pets.remove(id);
            }
            Event::AppointmentSaved { appointment } => {
                if let Some(previous) = self.appointments.insert(appointment.id, appointment.clone()) {
                    self.unindex(&previous);
                }
                self.index(appointment);
            }
            Event::AppointmentStatusChanged { id, status, at } => {
                if let Some(mut a) = self.appointments.get_mut(id) {
                    a.status = *status;
                    a.updated_at = *at;
                }
            }
            Event::AppointmentRemoved { id } => {
                if let Some((_, previous)) = self.appointments.remove(id) {
                    self.unindex(&previous);
                }
            }
        }
    }

    /// Minimal event sequence that recreates the current state.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::new();
        events.extend(self.owners().into_iter().map(|owner| Event::OwnerSaved { owner }));
        events.extend(self.walkers().into_iter().map(|walker| Event::WalkerSaved { walker }));
        events.extend(self.pets().into_iter().map(|pet| Event::PetSaved { pet }));
        events.extend(
            self.appointments()
                .into_iter()
                .map(|appointment| Event::AppointmentSaved { appointment }),
        );
        events
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryStore {
    async fn find_by_subject_and_date(
        &self,
        subject: Subject,
        date: NaiveDate,
        statuses: &[Status],
        exclude: Option<Ulid>,
    ) -> Result<Vec<Appointment>, EngineError> {
        let mut found = self.appointments_on(subject, date);
        found.retain(|a| statuses.contains(&a.status) && Some(a.id) != exclude);
        Ok(found)
    }

    async fn find_by_id(&self, id: Ulid) -> Result<Option<Appointment>, EngineError> {
        Ok(self.get_appointment(&id))
    }

    async fn create(&self, appointment: Appointment) -> Result<Appointment, EngineError> {
        self.apply_event(&Event::AppointmentSaved {
            appointment: appointment.clone(),
        });
        Ok(appointment)
    }

    async fn update(&self, id: Ulid, mut appointment: Appointment) -> Result<Appointment, EngineError> {
        if !self.appointments.contains_key(&id) {
            return Err(EngineError::not_found("appointment", id));
        }
        appointment.id = id;
        self.apply_event(&Event::AppointmentSaved {
            appointment: appointment.clone(),
        });
        Ok(appointment)
    }

    async fn delete(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.appointments.contains_key(&id) {
            return Err(EngineError::not_found("appointment", id));
        }
        self.apply_event(&Event::AppointmentRemoved { id });
        Ok(())
    }

    async fn resolve_walker_name(&self, walker_id: Ulid) -> Result<Option<String>, EngineError> {
        Ok(self.walkers.get(&walker_id).map(|w| w.name.clone()))
    }
}

#[async_trait]
impl Directory for InMemoryStore {
    async fn pet_exists(&self, id: Ulid) -> Result<bool, EngineError> {
        Ok(self.contains_pet(&id))
    }

    async fn walker_exists(&self, id: Ulid) -> Result<bool, EngineError> {
        Ok(self.contains_walker(&id))
    }
}
