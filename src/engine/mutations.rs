use tokio::sync::oneshot;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::check_walker_and_pet;
use super::registry::{validate_owner, validate_pet, validate_walker};
use super::status::{can_delete, transition};
use super::validate::{optional, validate};
use super::repository::AppointmentRepository;
use super::{Engine, EngineError, LockGuards, LockKey, WalCommand};

/// Ids an input refers to, when they parse. Unparseable ones fail validation
/// later, so they need no lock.
fn input_ref(raw: &Option<String>) -> Option<Ulid> {
    optional(raw).and_then(|s| Ulid::from_string(s).ok())
}

impl Engine {
    // ── Owners ───────────────────────────────────────────────

    pub async fn create_owner(&self, id: Ulid, input: &OwnerInput) -> Result<Owner, EngineError> {
        let _guards = self.lock(vec![LockKey::Owner(id)]).await;
        if self.store.contains_owner(&id) {
            return Err(EngineError::AlreadyExists { field: "id", value: id.to_string() });
        }
        if self.store.owner_count() >= MAX_OWNERS {
            return Err(EngineError::LimitExceeded("too many owners"));
        }
        let owner = validate_owner(id, input)?;
        self.persist_and_apply(Event::OwnerSaved { owner: owner.clone() }).await?;
        info!("owner {id} registered");
        Ok(owner)
    }

    pub async fn update_owner(&self, id: Ulid, input: &OwnerInput) -> Result<Owner, EngineError> {
        let _guards = self.lock(vec![LockKey::Owner(id)]).await;
        if !self.store.contains_owner(&id) {
            return Err(EngineError::not_found("owner", id));
        }
        let owner = validate_owner(id, input)?;
        self.persist_and_apply(Event::OwnerSaved { owner: owner.clone() }).await?;
        Ok(owner)
    }

    pub async fn delete_owner(&self, id: Ulid) -> Result<(), EngineError> {
        let _guards = self.lock(vec![LockKey::Owner(id)]).await;
        if !self.store.contains_owner(&id) {
            return Err(EngineError::not_found("owner", id));
        }
        if !self.store.pets_of_owner(&id).is_empty() {
            return Err(EngineError::HasDependents { kind: "owner", id, dependents: "pets" });
        }
        self.persist_and_apply(Event::OwnerRemoved { id }).await?;
        info!("owner {id} removed");
        Ok(())
    }

    // ── Walkers ──────────────────────────────────────────────

    pub async fn create_walker(&self, id: Ulid, input: &WalkerInput) -> Result<Walker, EngineError> {
        let _guards = self.lock(vec![LockKey::WalkerRegistry, LockKey::Walker(id)]).await;
        if self.store.contains_walker(&id) {
            return Err(EngineError::AlreadyExists { field: "id", value: id.to_string() });
        }
        if self.store.walker_count() >= MAX_WALKERS {
            return Err(EngineError::LimitExceeded("too many walkers"));
        }
        let walker = validate_walker(&self.store, &self.defaults, id, input)?;
        self.persist_and_apply(Event::WalkerSaved { walker: walker.clone() }).await?;
        info!("walker {id} registered");
        Ok(walker)
    }

    pub async fn update_walker(&self, id: Ulid, input: &WalkerInput) -> Result<Walker, EngineError> {
        let _guards = self.lock(vec![LockKey::WalkerRegistry, LockKey::Walker(id)]).await;
        if !self.store.contains_walker(&id) {
            return Err(EngineError::not_found("walker", id));
        }
        let walker = validate_walker(&self.store, &self.defaults, id, input)?;
        self.persist_and_apply(Event::WalkerSaved { walker: walker.clone() }).await?;
        Ok(walker)
    }

    pub async fn delete_walker(&self, id: Ulid) -> Result<(), EngineError> {
        let _guards = self.lock(vec![LockKey::WalkerRegistry, LockKey::Walker(id)]).await;
        if !self.store.contains_walker(&id) {
            return Err(EngineError::not_found("walker", id));
        }
        if self.store.has_appointments(Subject::Walker(id)) {
            return Err(EngineError::HasDependents { kind: "walker", id, dependents: "appointments" });
        }
        self.persist_and_apply(Event::WalkerRemoved { id }).await?;
        info!("walker {id} removed");
        Ok(())
    }

    // ── Pets ─────────────────────────────────────────────────

    fn pet_keys(id: Ulid, input: &PetInput) -> Vec<LockKey> {
        let mut keys = vec![LockKey::Pet(id)];
        keys.extend(input_ref(&input.owner_id).map(LockKey::Owner));
        keys
    }

    pub async fn create_pet(&self, id: Ulid, input: &PetInput) -> Result<Pet, EngineError> {
        let _guards = self.lock(Self::pet_keys(id, input)).await;
        if self.store.contains_pet(&id) {
            return Err(EngineError::AlreadyExists { field: "id", value: id.to_string() });
        }
        if self.store.pet_count() >= MAX_PETS {
            return Err(EngineError::LimitExceeded("too many pets"));
        }
        let pet = validate_pet(&self.store, id, input)?;
        self.persist_and_apply(Event::PetSaved { pet: pet.clone() }).await?;
        info!("pet {id} registered to owner {}", pet.owner_id);
        Ok(pet)
    }

    pub async fn update_pet(&self, id: Ulid, input: &PetInput) -> Result<Pet, EngineError> {
        let _guards = self.lock(Self::pet_keys(id, input)).await;
        if !self.store.contains_pet(&id) {
            return Err(EngineError::not_found("pet", id));
        }
        let pet = validate_pet(&self.store, id, input)?;
        self.persist_and_apply(Event::PetSaved { pet: pet.clone() }).await?;
        Ok(pet)
    }

    pub async fn delete_pet(&self, id: Ulid) -> Result<(), EngineError> {
        let _guards = self.lock(vec![LockKey::Pet(id)]).await;
        if !self.store.contains_pet(&id) {
            return Err(EngineError::not_found("pet", id));
        }
        if self.store.has_appointments(Subject::Pet(id)) {
            return Err(EngineError::HasDependents { kind: "pet", id, dependents: "appointments" });
        }
        self.persist_and_apply(Event::PetRemoved { id }).await?;
        info!("pet {id} removed");
        Ok(())
    }

    // ── Appointments ─────────────────────────────────────────

    /// Lock an existing appointment together with its walker and pet, plus
    /// `extra`. Retries if a concurrent update moved it to another walker or
    /// pet while we waited.
    async fn lock_appointment(&self, id: Ulid, extra: &[LockKey]) -> Result<(Appointment, LockGuards<'_>), EngineError> {
        loop {
            let seen = self
                .store
                .find_by_id(id)
                .await?
                .ok_or_else(|| EngineError::not_found("appointment", id))?;
            let mut keys = vec![
                LockKey::Appointment(id),
                LockKey::Walker(seen.walker_id),
                LockKey::Pet(seen.pet_id),
            ];
            keys.extend_from_slice(extra);
            let guards = self.lock(keys).await;

            let current = self
                .store
                .find_by_id(id)
                .await?
                .ok_or_else(|| EngineError::not_found("appointment", id))?;
            if current.walker_id == seen.walker_id && current.pet_id == seen.pet_id {
                return Ok((current, guards));
            }
            drop(guards);
        }
    }

    fn input_keys(input: &AppointmentInput) -> Vec<LockKey> {
        let mut keys = Vec::with_capacity(2);
        keys.extend(input_ref(&input.walker_id).map(LockKey::Walker));
        keys.extend(input_ref(&input.pet_id).map(LockKey::Pet));
        keys
    }

    /// Validate and book a new walk. The walker and pet stay locked from the
    /// availability check until the booking is durable.
    pub async fn create_appointment(&self, id: Ulid, input: &AppointmentInput) -> Result<Appointment, EngineError> {
        let mut keys = Self::input_keys(input);
        keys.push(LockKey::Appointment(id));
        let _guards = self.lock(keys).await;

        if self.store.find_by_id(id).await?.is_some() {
            return Err(EngineError::AlreadyExists { field: "id", value: id.to_string() });
        }
        if self.store.appointment_count() >= MAX_APPOINTMENTS {
            return Err(EngineError::LimitExceeded("too many appointments"));
        }

        let normalized = validate(&self.store, &self.policy, self.today(), input, None).await?;
        let now = now_ms();
        let appointment = normalized.into_appointment(id, now, now);
        self.persist_and_apply(Event::AppointmentSaved { appointment: appointment.clone() })
            .await?;
        info!(
            "appointment {id} booked: walker {} pet {} on {} {}-{}",
            appointment.walker_id, appointment.pet_id, appointment.date, appointment.start_time, appointment.end_time
        );
        Ok(appointment)
    }

    /// Full replacement of an appointment's fields. An omitted status keeps
    /// the current one; a changed status must be a legal transition.
    pub async fn update_appointment(&self, id: Ulid, input: &AppointmentInput) -> Result<Appointment, EngineError> {
        let (current, _guards) = self.lock_appointment(id, &Self::input_keys(input)).await?;

        let mut input = input.clone();
        if optional(&input.status).is_none() {
            input.status = Some(current.status.as_str().to_string());
        }
        let normalized = validate(&self.store, &self.policy, self.today(), &input, Some(id)).await?;
        if normalized.status != current.status {
            transition(current.status, normalized.status.as_str())?;
        }

        let appointment = normalized.into_appointment(id, current.created_at, now_ms());
        self.persist_and_apply(Event::AppointmentSaved { appointment: appointment.clone() })
            .await?;
        info!("appointment {id} updated");
        Ok(appointment)
    }

    /// Move an appointment through the status state machine. Reopening a
    /// cancelled walk re-checks that its slot is still free.
    pub async fn change_status(&self, id: Ulid, requested: &str) -> Result<Appointment, EngineError> {
        let (current, _guards) = self.lock_appointment(id, &[]).await?;
        let next = transition(current.status, requested)?;

        if self.policy.recheck_on_reopen && !self.policy.is_blocking(current.status) && self.policy.is_blocking(next) {
            check_walker_and_pet(
                &self.store,
                &self.policy,
                current.walker_id,
                current.pet_id,
                current.date,
                current.start_time,
                current.duration_hours,
                Some(id),
            )
            .await?;
        }

        self.persist_and_apply(Event::AppointmentStatusChanged { id, status: next, at: now_ms() })
            .await?;
        info!("appointment {id}: {} -> {next}", current.status);
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("appointment", id))
    }

    /// Only `scheduled` and `cancelled` walks can be removed.
    pub async fn delete_appointment(&self, id: Ulid) -> Result<(), EngineError> {
        let (current, _guards) = self.lock_appointment(id, &[]).await?;
        if !can_delete(current.status) {
            return Err(EngineError::Forbidden { id, status: current.status });
        }
        self.persist_and_apply(Event::AppointmentRemoved { id }).await?;
        info!("appointment {id} deleted");
        Ok(())
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let events = self.store.snapshot();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Unavailable(format!("WAL compaction failed: {e}")))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
