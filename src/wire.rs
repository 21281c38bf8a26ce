use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::auth::WalkbookAuthSource;
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, Filter, SqlError, Table};

pub struct WalkbookHandler {
    engine: Arc<Engine>,
    request_timeout: Duration,
    query_parser: Arc<WalkbookQueryParser>,
}

impl WalkbookHandler {
    pub fn new(engine: Arc<Engine>, request_timeout: Duration) -> Self {
        Self {
            engine,
            request_timeout,
            query_parser: Arc::new(WalkbookQueryParser),
        }
    }

    /// Run one command under the request timeout. The command runs on its own
    /// task and still completes after a timeout; only the reply is abandoned.
    async fn run(&self, sql: &str) -> PgWireResult<Vec<Response>> {
        let cmd = sql::parse_sql(sql).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();

        let engine = self.engine.clone();
        let task = tokio::spawn(async move { execute_command(&engine, cmd).await });
        let result = within_deadline(task, self.request_timeout).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());

        let rows = result.map_err(|e| {
            tracing::debug!("{label} failed: {e}");
            engine_err(e)
        })?;
        rows.into_response()
    }
}

/// Wait for a command task. A timeout or a failed task is `Unavailable`, so
/// the client sees a retryable error and never a scheduling conflict.
async fn within_deadline<T>(task: JoinHandle<Result<T, EngineError>>, timeout: Duration) -> Result<T, EngineError> {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(EngineError::Unavailable(format!("command task failed: {join}"))),
        Err(_) => {
            metrics::counter!(observability::REQUEST_TIMEOUTS_TOTAL).increment(1);
            Err(EngineError::Unavailable(format!(
                "request timed out after {} ms",
                timeout.as_millis()
            )))
        }
    }
}

/// What a command produced, before row encoding.
enum Outcome {
    Done(&'static str),
    Owners(Vec<Owner>),
    Walkers(Vec<Walker>),
    Pets(Vec<PetView>),
    Appointments(Vec<AppointmentView>),
}

impl Outcome {
    fn into_response(self) -> PgWireResult<Vec<Response>> {
        let response = match self {
            Outcome::Done(tag) => Response::Execution(Tag::new(tag).with_rows(1)),
            Outcome::Owners(owners) => rows_response(Table::Owners, owners, encode_owner)?,
            Outcome::Walkers(walkers) => rows_response(Table::Walkers, walkers, encode_walker)?,
            Outcome::Pets(pets) => rows_response(Table::Pets, pets, encode_pet)?,
            Outcome::Appointments(appointments) => {
                rows_response(Table::Appointments, appointments, encode_appointment)?
            }
        };
        Ok(vec![response])
    }
}

async fn execute_command(engine: &Engine, cmd: Command) -> Result<Outcome, EngineError> {
    Ok(match cmd {
        Command::InsertOwner { id, input } => {
            engine.create_owner(id, &input).await?;
            Outcome::Done("INSERT")
        }
        Command::UpdateOwner { id, input } => {
            engine.update_owner(id, &input).await?;
            Outcome::Done("UPDATE")
        }
        Command::DeleteOwner { id } => {
            engine.delete_owner(id).await?;
            Outcome::Done("DELETE")
        }
        Command::SelectOwners { filter } => Outcome::Owners(match filter {
            None => engine.list_owners(),
            Some(Filter::Id(id)) => vec![engine.get_owner(&id)?],
            Some(other) => return Err(unsupported(Table::Owners, &other)),
        }),

        Command::InsertWalker { id, input } => {
            engine.create_walker(id, &input).await?;
            Outcome::Done("INSERT")
        }
        Command::UpdateWalker { id, input } => {
            engine.update_walker(id, &input).await?;
            Outcome::Done("UPDATE")
        }
        Command::DeleteWalker { id } => {
            engine.delete_walker(id).await?;
            Outcome::Done("DELETE")
        }
        Command::SelectWalkers { filter } => Outcome::Walkers(match filter {
            None => engine.list_walkers(),
            Some(Filter::Id(id)) => vec![engine.get_walker(&id)?],
            Some(other) => return Err(unsupported(Table::Walkers, &other)),
        }),

        Command::InsertPet { id, input } => {
            engine.create_pet(id, &input).await?;
            Outcome::Done("INSERT")
        }
        Command::UpdatePet { id, input } => {
            engine.update_pet(id, &input).await?;
            Outcome::Done("UPDATE")
        }
        Command::DeletePet { id } => {
            engine.delete_pet(id).await?;
            Outcome::Done("DELETE")
        }
        Command::SelectPets { filter } => Outcome::Pets(match filter {
            None => engine.list_pets(),
            Some(Filter::Id(id)) => vec![engine.get_pet(&id)?],
            Some(Filter::OwnerId(owner_id)) => engine.pets_by_owner(&owner_id)?,
            Some(other) => return Err(unsupported(Table::Pets, &other)),
        }),

        Command::InsertAppointment { id, input } => {
            engine.create_appointment(id, &input).await?;
            Outcome::Done("INSERT")
        }
        Command::UpdateAppointment { id, input } => {
            engine.update_appointment(id, &input).await?;
            Outcome::Done("UPDATE")
        }
        Command::UpdateAppointmentStatus { id, status } => {
            engine.change_status(id, &status).await?;
            Outcome::Done("UPDATE")
        }
        Command::DeleteAppointment { id } => {
            engine.delete_appointment(id).await?;
            Outcome::Done("DELETE")
        }
        Command::SelectAppointments { filter } => Outcome::Appointments(match filter {
            None => engine.list_appointments(),
            Some(Filter::Id(id)) => vec![engine.get_appointment(&id)?],
            Some(Filter::Date(date)) => engine.appointments_by_date(&date)?,
            Some(Filter::PetId(pet_id)) => engine.appointments_by_pet(&pet_id)?,
            Some(Filter::WalkerId(walker_id)) => engine.appointments_by_walker(&walker_id)?,
            Some(other) => return Err(unsupported(Table::Appointments, &other)),
        }),
    })
}

/// The parser only builds filters a table supports; this covers hand-built commands.
fn unsupported(table: Table, filter: &Filter) -> EngineError {
    EngineError::InvalidEnum {
        field: "filter",
        value: format!("{filter:?}"),
        allowed: match table {
            Table::Owners | Table::Walkers => "id",
            Table::Pets => "id, owner_id",
            Table::Appointments => "id, date, pet_id, walker_id",
        },
    }
}

// ── Row schemas ──────────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn text_fields(names: &[&str]) -> Vec<FieldInfo> {
    names.iter().map(|name| field(name, Type::VARCHAR)).collect()
}

fn owner_schema() -> Vec<FieldInfo> {
    text_fields(&["id", "name", "phone", "address", "email"])
}

fn walker_schema() -> Vec<FieldInfo> {
    let mut schema = text_fields(&[
        "id",
        "name",
        "id_type",
        "id_number",
        "phone",
        "email",
        "company_phone",
        "company_address",
        "address",
    ]);
    schema.push(field("rate", Type::FLOAT8));
    schema.push(field("rating", Type::INT4));
    schema
}

fn pet_schema() -> Vec<FieldInfo> {
    let mut schema = text_fields(&["id", "owner_id", "owner_name", "name", "species", "breed"]);
    schema.push(field("age", Type::INT8));
    schema.extend(text_fields(&["gender", "special_recommendations"]));
    schema
}

fn appointment_schema() -> Vec<FieldInfo> {
    let mut schema = text_fields(&["id", "date", "start_time", "end_time"]);
    schema.push(field("duration_hours", Type::FLOAT8));
    schema.extend(text_fields(&[
        "pet_id",
        "pet_name",
        "walker_id",
        "walker_name",
        "notes",
        "admin_notes",
        "status",
    ]));
    schema.push(field("created_at", Type::INT8));
    schema.push(field("updated_at", Type::INT8));
    schema
}

fn schema_for(table: Table) -> Vec<FieldInfo> {
    match table {
        Table::Owners => owner_schema(),
        Table::Walkers => walker_schema(),
        Table::Pets => pet_schema(),
        Table::Appointments => appointment_schema(),
    }
}

/// Result columns for a statement, empty unless it reads a table.
fn describe(sql: &str) -> Vec<FieldInfo> {
    sql::query_table(sql).map(schema_for).unwrap_or_default()
}

// ── Row encoding ─────────────────────────────────────────────────

fn rows_response<T>(
    table: Table,
    items: Vec<T>,
    encode: fn(&mut DataRowEncoder, &T) -> PgWireResult<()>,
) -> PgWireResult<Response> {
    let schema = Arc::new(schema_for(table));
    let rows: Vec<PgWireResult<_>> = items
        .iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

fn encode_owner(encoder: &mut DataRowEncoder, owner: &Owner) -> PgWireResult<()> {
    encoder.encode_field(&owner.id.to_string())?;
    encoder.encode_field(&owner.name)?;
    encoder.encode_field(&owner.phone)?;
    encoder.encode_field(&owner.address)?;
    encoder.encode_field(&owner.email)
}

fn encode_walker(encoder: &mut DataRowEncoder, walker: &Walker) -> PgWireResult<()> {
    encoder.encode_field(&walker.id.to_string())?;
    encoder.encode_field(&walker.name)?;
    encoder.encode_field(&walker.id_type.as_str())?;
    encoder.encode_field(&walker.id_number)?;
    encoder.encode_field(&walker.phone)?;
    encoder.encode_field(&walker.email)?;
    encoder.encode_field(&walker.company_phone)?;
    encoder.encode_field(&walker.company_address)?;
    encoder.encode_field(&walker.address)?;
    encoder.encode_field(&walker.rate)?;
    encoder.encode_field(&i32::from(walker.rating))
}

fn encode_pet(encoder: &mut DataRowEncoder, view: &PetView) -> PgWireResult<()> {
    let pet = &view.pet;
    encoder.encode_field(&pet.id.to_string())?;
    encoder.encode_field(&pet.owner_id.to_string())?;
    encoder.encode_field(&view.owner.as_ref().map(|o| o.name.clone()))?;
    encoder.encode_field(&pet.name)?;
    encoder.encode_field(&pet.species)?;
    encoder.encode_field(&pet.breed)?;
    encoder.encode_field(&i64::from(pet.age))?;
    encoder.encode_field(&pet.gender.as_str())?;
    encoder.encode_field(&pet.special_recommendations)
}

fn encode_appointment(encoder: &mut DataRowEncoder, view: &AppointmentView) -> PgWireResult<()> {
    let a = &view.appointment;
    encoder.encode_field(&a.id.to_string())?;
    encoder.encode_field(&a.date.to_string())?;
    encoder.encode_field(&a.start_time.to_string())?;
    encoder.encode_field(&a.end_time.to_string())?;
    encoder.encode_field(&a.duration_hours)?;
    encoder.encode_field(&a.pet_id.to_string())?;
    encoder.encode_field(&view.pet.as_ref().map(|p| p.name.clone()))?;
    encoder.encode_field(&a.walker_id.to_string())?;
    encoder.encode_field(&view.walker.as_ref().map(|w| w.name.clone()))?;
    encoder.encode_field(&a.notes)?;
    encoder.encode_field(&a.admin_notes)?;
    encoder.encode_field(&a.status.as_str())?;
    encoder.encode_field(&a.created_at)?;
    encoder.encode_field(&a.updated_at)
}

#[async_trait]
impl SimpleQueryHandler for WalkbookHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.run(query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct WalkbookQueryParser;

#[async_trait]
impl QueryParser for WalkbookQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(describe(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for WalkbookHandler {
    type Statement = String;
    type QueryParser = WalkbookQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let mut responses = self.run(&sql).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(param_types, describe(&target.statement)))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(describe(&target.statement.statement)))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    max = max.max(n);
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let values: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|param| param.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    bind_params(&portal.statement.statement, &values)
}

/// Highest index first, so `$1` never clobbers the prefix of `$10`.
fn bind_params(sql: &str, values: &[Option<String>]) -> String {
    let mut result = sql.to_string();
    for (i, value) in values.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let literal = match value {
            Some(text) => format!("'{}'", text.replace('\'', "''")),
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &literal);
    }
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct WalkbookFactory {
    handler: Arc<WalkbookHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<WalkbookAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl WalkbookFactory {
    pub fn new(engine: Arc<Engine>, password: String, request_timeout: Duration) -> Self {
        let auth_source = WalkbookAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(WalkbookHandler::new(engine, request_timeout)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for WalkbookFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    password: String,
    tls: Option<TlsAcceptor>,
    request_timeout: Duration,
) -> std::io::Result<()> {
    let factory = Arc::new(WalkbookFactory::new(engine, password, request_timeout));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        e.sqlstate().into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RegistryDefaults, SchedulingPolicy};

    #[test]
    fn count_params_finds_highest() {
        assert_eq!(count_params("SELECT * FROM pets"), 0);
        assert_eq!(count_params("SELECT * FROM pets WHERE owner_id = $1"), 1);
        assert_eq!(count_params("UPDATE owners SET name = $2, email = $10 WHERE id = $1"), 10);
    }

    #[test]
    fn bind_params_quotes_and_nulls() {
        let sql = "UPDATE owners SET name = $2, email = $3 WHERE id = $1";
        let bound = bind_params(sql, &[Some("01ARZ3NDEKTSV4RRFFQ69G5FAV".into()), Some("O'Hara".into()), None]);
        assert_eq!(
            bound,
            "UPDATE owners SET name = 'O''Hara', email = NULL WHERE id = '01ARZ3NDEKTSV4RRFFQ69G5FAV'"
        );
    }

    #[test]
    fn describe_matches_table() {
        assert_eq!(describe("SELECT * FROM owners").len(), 5);
        assert_eq!(describe("SELECT * FROM appointments WHERE date = $1").len(), 14);
        assert_eq!(describe("SELECT * FROM walkers").len(), 11);
        assert_eq!(describe("SELECT * FROM pets").len(), 9);
        assert!(describe("DELETE FROM owners WHERE id = $1").is_empty());
        assert!(describe("SELECT * FROM cats").is_empty());
    }

    #[test]
    fn unsupported_filter_names_allowed_columns() {
        let err = unsupported(Table::Pets, &Filter::Date("2030-05-12".into()));
        assert!(matches!(err, EngineError::InvalidEnum { allowed: "id, owner_id", .. }));
    }

    #[tokio::test]
    async fn stalled_command_times_out_as_unavailable() {
        let task = tokio::spawn(std::future::pending::<Result<Outcome, EngineError>>());
        let err = within_deadline(task, Duration::from_millis(20)).await.err().unwrap();
        assert!(matches!(err, EngineError::Unavailable(_)));
        assert_eq!(err.sqlstate(), "58030");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn panicked_command_is_unavailable() {
        let task = tokio::spawn(async {
            if std::hint::black_box(true) {
                panic!("command panicked");
            }
            Ok::<_, EngineError>(Outcome::Done("INSERT"))
        });
        let err = within_deadline(task, Duration::from_secs(5)).await.err().unwrap();
        assert_eq!(err.sqlstate(), "58030");
    }

    /// An engine whose WAL writer task is already gone: its runtime is
    /// dropped on another thread before the engine is handed back.
    fn engine_without_wal_writer(name: &str) -> Engine {
        let dir = std::env::temp_dir().join("walkbook_test_wire");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async { Engine::new(path, SchedulingPolicy::default(), RegistryDefaults::default()) })
                .unwrap()
        })
        .join()
        .unwrap()
    }

    #[tokio::test]
    async fn wal_failure_reports_unavailable_sqlstate() {
        let engine = Arc::new(engine_without_wal_writer("dead_writer.wal"));
        let handler = WalkbookHandler::new(engine.clone(), Duration::from_secs(5));

        let result = handler
            .run("INSERT INTO owners (name, phone, address, email) VALUES ('Ana', '3001112233', 'Calle 1', 'ana@example.com')")
            .await;
        let Err(PgWireError::UserError(info)) = result else {
            panic!("expected a user error when the WAL writer is gone");
        };
        assert_eq!(info.code, "58030");
        assert!(engine.list_owners().is_empty());
    }

    #[tokio::test]
    async fn zero_timeout_never_reports_a_conflict() {
        let engine = Arc::new(engine_without_wal_writer("zero_timeout.wal"));
        let handler = WalkbookHandler::new(engine, Duration::ZERO);

        let result = handler
            .run("INSERT INTO owners (name, phone, address, email) VALUES ('Ana', '3001112233', 'Calle 1', 'ana@example.com')")
            .await;
        let Err(PgWireError::UserError(info)) = result else {
            panic!("expected a user error under a zero request timeout");
        };
        assert_eq!(info.code, "58030");
        assert_ne!(info.code, "23P01");
    }
}
