mod availability;
mod error;
mod mutations;
mod queries;
mod registry;
mod repository;
mod status;
mod store;
mod validate;

pub use availability::{check_availability, check_walker_and_pet};
pub use error::{Conflict, EngineError};
pub use registry::{validate_owner, validate_pet, validate_walker};
pub use repository::{AppointmentRepository, Directory};
pub use status::{allowed_next, can_delete, transition};
pub use store::InMemoryStore;
pub use validate::{validate, NormalizedAppointment};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedMutexGuard, RwLock};
use ulid::Ulid;

use crate::config::{RegistryDefaults, SchedulingPolicy};
use crate::model::*;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Drain every Append already queued behind it.
/// 3. One flush_sync for the whole batch, then answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };

        let mut batch = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!("WAL flush of {} events failed: {e}", batch.len());
        }
        respond_batch(batch, &result);

        // Compaction must see every append queued before it.
        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let appended = batch.iter().try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so half-written bytes don't leak
    // into the next batch.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let result = wal.append_buffered(&event).and_then(|()| wal.flush_sync());
            let _ = response.send(result);
        }
    }
}

// ── Scheduling locks ─────────────────────────────────────

/// What a mutation serializes on. Variant order is the acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) enum LockKey {
    /// Walker email / id number uniqueness.
    WalkerRegistry,
    Owner(Ulid),
    Walker(Ulid),
    Pet(Ulid),
    Appointment(Ulid),
}

type LockTable = DashMap<LockKey, Arc<Mutex<()>>>;

/// Held scheduling locks. Dropping releases them and evicts each entry nobody
/// else holds or waits on, so the table only tracks keys in use.
pub(super) struct LockGuards<'a> {
    table: &'a LockTable,
    held: Vec<(LockKey, OwnedMutexGuard<()>)>,
}

impl Drop for LockGuards<'_> {
    fn drop(&mut self) {
        for (key, guard) in self.held.drain(..) {
            drop(guard);
            // The table's own Arc is the only one left when the key is idle.
            // remove_if runs under the shard lock, so a concurrent `lock`
            // either cloned the Arc first or inserts a fresh mutex after.
            self.table.remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

pub struct Engine {
    pub store: InMemoryStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub policy: SchedulingPolicy,
    pub defaults: RegistryDefaults,
    locks: LockTable,
    /// Shared by every WAL-append-then-apply, exclusive for compaction, so a
    /// snapshot never misses an event that is already in the log.
    pub(super) commit_gate: RwLock<()>,
}

impl Engine {
    /// Replay the WAL at `wal_path` and start its writer task.
    pub fn new(wal_path: PathBuf, policy: SchedulingPolicy, defaults: RegistryDefaults) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = InMemoryStore::new();
        for event in &events {
            store.apply_event(event);
        }
        tracing::info!(
            "replayed {} events from {}: {} owners, {} walkers, {} pets, {} appointments",
            events.len(),
            wal_path.display(),
            store.owner_count(),
            store.walker_count(),
            store.pet_count(),
            store.appointment_count(),
        );

        Ok(Self {
            store,
            wal_tx,
            policy,
            defaults,
            locks: DashMap::new(),
            commit_gate: RwLock::new(()),
        })
    }

    /// Local calendar date used for the "not in the past" rule.
    pub fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Unavailable(format!("WAL append failed: {e}")))
    }

    /// WAL-append then apply. Nothing reaches the store unless it is durable.
    pub(super) async fn persist_and_apply(&self, event: Event) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        self.wal_append(&event).await?;
        self.store.apply_event(&event);
        Ok(())
    }

    /// Acquire the mutexes for `keys` in sorted order to prevent deadlocks.
    pub(super) async fn lock(&self, mut keys: Vec<LockKey>) -> LockGuards<'_> {
        keys.sort();
        keys.dedup();
        let mut guards = LockGuards {
            table: &self.locks,
            held: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            let mutex = self.locks.entry(key).or_default().clone();
            guards.held.push((key, mutex.lock_owned().await));
        }
        guards
    }
}
