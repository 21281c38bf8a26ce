use chrono::NaiveDate;
use ulid::Ulid;

use crate::clock::{ClockTime, Window};
use crate::config::SchedulingPolicy;
use crate::model::*;

use super::error::Conflict;
use super::repository::AppointmentRepository;
use super::EngineError;

/// Fail with `SchedulingConflict` if `subject` already has a blocking
/// appointment on `date` whose window overlaps `[start, start + duration)`.
///
/// `exclude` skips one appointment (the one being updated). Read-only.
pub async fn check_availability<R>(
    repo: &R,
    policy: &SchedulingPolicy,
    subject: Subject,
    date: NaiveDate,
    start: ClockTime,
    duration_hours: f64,
    exclude: Option<Ulid>,
) -> Result<(), EngineError>
where
    R: AppointmentRepository + ?Sized,
{
    let candidate = Window::new(start, duration_hours);
    let existing = repo
        .find_by_subject_and_date(subject, date, &policy.blocking_statuses, exclude)
        .await?;

    let Some(taken) = existing.iter().find(|a| a.window().overlaps(&candidate)) else {
        return Ok(());
    };

    // Pet conflicts usually involve a different walker; name them.
    let walker_name = match subject {
        Subject::Pet(_) => repo.resolve_walker_name(taken.walker_id).await?,
        Subject::Walker(_) => None,
    };

    metrics::counter!(crate::observability::SCHEDULING_CONFLICTS_TOTAL, "subject" => subject.kind().as_str())
        .increment(1);
    tracing::debug!(
        "{} {} busy on {date}: {} - {} overlaps {} - {}",
        subject.kind().as_str(),
        subject.id(),
        taken.start_time,
        taken.end_time,
        candidate.start_time(),
        candidate.end_time(),
    );

    Err(EngineError::SchedulingConflict(Conflict {
        subject: subject.kind(),
        appointment_id: taken.id,
        start: taken.start_time,
        end: taken.end_time,
        walker_name,
    }))
}

/// Both axes of a candidate walk, walker first.
pub async fn check_walker_and_pet<R>(
    repo: &R,
    policy: &SchedulingPolicy,
    walker_id: Ulid,
    pet_id: Ulid,
    date: NaiveDate,
    start: ClockTime,
    duration_hours: f64,
    exclude: Option<Ulid>,
) -> Result<(), EngineError>
where
    R: AppointmentRepository + ?Sized,
{
    check_availability(repo, policy, Subject::Walker(walker_id), date, start, duration_hours, exclude).await?;
    check_availability(repo, policy, Subject::Pet(pet_id), date, start, duration_hours, exclude).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::add_duration;
    use crate::engine::store::InMemoryStore;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2099, 6, 1).unwrap()
    }

    fn t(s: &str) -> ClockTime {
        ClockTime::parse(s).unwrap()
    }

    fn walker(store: &InMemoryStore, name: &str) -> Ulid {
        let id = Ulid::new();
        store.apply_event(&Event::WalkerSaved {
            walker: Walker {
                id,
                name: name.into(),
                id_type: IdType::Cc,
                id_number: id.to_string(),
                phone: "1".into(),
                email: format!("{id}@example.com"),
                company_phone: "1".into(),
                company_address: "a".into(),
                address: "a".into(),
                rate: 10.0,
                rating: 1,
            },
        });
        id
    }

    fn book(store: &InMemoryStore, walker_id: Ulid, pet_id: Ulid, start: &str, hours: f64, status: Status) -> Ulid {
        let start_time = t(start);
        let id = Ulid::new();
        store.apply_event(&Event::AppointmentSaved {
            appointment: Appointment {
                id,
                date: date(),
                start_time,
                end_time: add_duration(start_time, hours),
                duration_hours: hours,
                pet_id,
                walker_id,
                notes: "n".into(),
                admin_notes: String::new(),
                status,
                created_at: 0,
                updated_at: 0,
            },
        });
        id
    }

    #[tokio::test]
    async fn free_subject_passes() {
        let store = InMemoryStore::new();
        let policy = SchedulingPolicy::default();
        let r = check_availability(&store, &policy, Subject::Walker(Ulid::new()), date(), t("09:00"), 1.0, None).await;
        assert!(r.is_ok());
    }

    #[tokio::test]
    async fn adjacent_windows_do_not_conflict() {
        let store = InMemoryStore::new();
        let policy = SchedulingPolicy::default();
        let w = walker(&store, "Ana");
        book(&store, w, Ulid::new(), "09:00", 1.0, Status::Scheduled);

        let after = check_availability(&store, &policy, Subject::Walker(w), date(), t("10:00"), 1.0, None).await;
        let before = check_availability(&store, &policy, Subject::Walker(w), date(), t("08:00"), 1.0, None).await;
        assert!(after.is_ok());
        assert!(before.is_ok());
    }

    #[tokio::test]
    async fn overlap_names_the_taken_window() {
        let store = InMemoryStore::new();
        let policy = SchedulingPolicy::default();
        let w = walker(&store, "Ana");
        let existing = book(&store, w, Ulid::new(), "09:00", 1.0, Status::Scheduled);

        let err = check_availability(&store, &policy, Subject::Walker(w), date(), t("09:30"), 1.0, None)
            .await
            .unwrap_err();
        match err {
            EngineError::SchedulingConflict(c) => {
                assert_eq!(c.subject, SubjectKind::Walker);
                assert_eq!(c.appointment_id, existing);
                assert_eq!(c.start.to_string(), "09:00");
                assert_eq!(c.end.to_string(), "10:00");
                assert_eq!(c.walker_name, None);
            }
            other => panic!("expected SchedulingConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pet_conflict_resolves_other_walker() {
        let store = InMemoryStore::new();
        let policy = SchedulingPolicy::default();
        let w1 = walker(&store, "Ana");
        let pet = Ulid::new();
        book(&store, w1, pet, "09:00", 1.0, Status::InProgress);

        let err = check_availability(&store, &policy, Subject::Pet(pet), date(), t("09:15"), 0.5, None)
            .await
            .unwrap_err();
        match err {
            EngineError::SchedulingConflict(c) => {
                assert_eq!(c.subject, SubjectKind::Pet);
                assert_eq!(c.walker_name.as_deref(), Some("Ana"));
            }
            other => panic!("expected SchedulingConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn finished_walks_do_not_block() {
        let store = InMemoryStore::new();
        let policy = SchedulingPolicy::default();
        let w = walker(&store, "Ana");
        book(&store, w, Ulid::new(), "09:00", 2.0, Status::Completed);
        book(&store, w, Ulid::new(), "09:00", 2.0, Status::Cancelled);

        let r = check_availability(&store, &policy, Subject::Walker(w), date(), t("09:30"), 1.0, None).await;
        assert!(r.is_ok());
    }

    #[tokio::test]
    async fn excluded_appointment_is_ignored() {
        let store = InMemoryStore::new();
        let policy = SchedulingPolicy::default();
        let w = walker(&store, "Ana");
        let own = book(&store, w, Ulid::new(), "09:00", 1.0, Status::Scheduled);

        let r = check_availability(&store, &policy, Subject::Walker(w), date(), t("09:00"), 1.0, Some(own)).await;
        assert!(r.is_ok());
    }

    #[tokio::test]
    async fn other_dates_do_not_block() {
        let store = InMemoryStore::new();
        let policy = SchedulingPolicy::default();
        let w = walker(&store, "Ana");
        book(&store, w, Ulid::new(), "09:00", 1.0, Status::Scheduled);

        let next_day = date().succ_opt().unwrap();
        let r = check_availability(&store, &policy, Subject::Walker(w), next_day, t("09:00"), 1.0, None).await;
        assert!(r.is_ok());
    }

    #[tokio::test]
    async fn walker_checked_before_pet() {
        let store = InMemoryStore::new();
        let policy = SchedulingPolicy::default();
        let w = walker(&store, "Ana");
        let pet = Ulid::new();
        book(&store, w, pet, "09:00", 1.0, Status::Scheduled);

        let err = check_walker_and_pet(&store, &policy, w, pet, date(), t("09:00"), 1.0, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::SchedulingConflict(Conflict { subject: SubjectKind::Walker, .. })
        ));
    }
}
