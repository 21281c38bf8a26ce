use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "walkbook_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "walkbook_query_duration_seconds";

/// Counter: commands that hit the request timeout.
pub const REQUEST_TIMEOUTS_TOTAL: &str = "walkbook_request_timeouts_total";

/// Counter: bookings rejected for overlapping another walk. Labels: subject.
pub const SCHEDULING_CONFLICTS_TOTAL: &str = "walkbook_scheduling_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "walkbook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "walkbook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "walkbook_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "walkbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "walkbook_wal_flush_batch_size";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "walkbook_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertOwner { .. } => "insert_owner",
        Command::UpdateOwner { .. } => "update_owner",
        Command::DeleteOwner { .. } => "delete_owner",
        Command::SelectOwners { .. } => "select_owners",
        Command::InsertWalker { .. } => "insert_walker",
        Command::UpdateWalker { .. } => "update_walker",
        Command::DeleteWalker { .. } => "delete_walker",
        Command::SelectWalkers { .. } => "select_walkers",
        Command::InsertPet { .. } => "insert_pet",
        Command::UpdatePet { .. } => "update_pet",
        Command::DeletePet { .. } => "delete_pet",
        Command::SelectPets { .. } => "select_pets",
        Command::InsertAppointment { .. } => "insert_appointment",
        Command::UpdateAppointment { .. } => "update_appointment",
        Command::UpdateAppointmentStatus { .. } => "update_appointment_status",
        Command::DeleteAppointment { .. } => "delete_appointment",
        Command::SelectAppointments { .. } => "select_appointments",
    }
}
