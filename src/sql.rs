use std::collections::HashMap;

use sqlparser::ast::{
    self, Assignment, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, TableWithJoins, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::limits::MAX_SQL_LEN;
use crate::model::*;

/// The four virtual tables exposed over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Owners,
    Walkers,
    Pets,
    Appointments,
}

impl Table {
    fn from_name(name: String) -> Result<Self, SqlError> {
        match name.as_str() {
            "owners" => Ok(Table::Owners),
            "walkers" => Ok(Table::Walkers),
            "pets" => Ok(Table::Pets),
            "appointments" => Ok(Table::Appointments),
            _ => Err(SqlError::UnknownTable(name)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Table::Owners => "owners",
            Table::Walkers => "walkers",
            Table::Pets => "pets",
            Table::Appointments => "appointments",
        }
    }
}

/// A single `column = value` filter on a SELECT. Values stay raw text so the
/// engine reports malformed ids and dates the same way it does everywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Id(String),
    Date(String),
    PetId(String),
    WalkerId(String),
    OwnerId(String),
}

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertOwner { id: Ulid, input: OwnerInput },
    UpdateOwner { id: Ulid, input: OwnerInput },
    DeleteOwner { id: Ulid },
    SelectOwners { filter: Option<Filter> },

    InsertWalker { id: Ulid, input: WalkerInput },
    UpdateWalker { id: Ulid, input: WalkerInput },
    DeleteWalker { id: Ulid },
    SelectWalkers { filter: Option<Filter> },

    InsertPet { id: Ulid, input: PetInput },
    UpdatePet { id: Ulid, input: PetInput },
    DeletePet { id: Ulid },
    SelectPets { filter: Option<Filter> },

    InsertAppointment { id: Ulid, input: AppointmentInput },
    UpdateAppointment { id: Ulid, input: AppointmentInput },
    /// `UPDATE appointments SET status = ...` with no other column.
    UpdateAppointmentStatus { id: Ulid, status: String },
    DeleteAppointment { id: Ulid },
    SelectAppointments { filter: Option<Filter> },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    if sql.len() > MAX_SQL_LEN {
        return Err(SqlError::TooLong(sql.len()));
    }
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Table read by a SELECT, without looking at its filter. Used to describe
/// result columns for prepared statements whose parameters are unbound.
pub fn query_table(sql: &str) -> Option<Table> {
    let stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql).ok()?;
    let Some(Statement::Query(query)) = stmts.first() else {
        return None;
    };
    let SetExpr::Select(select) = query.body.as_ref() else {
        return None;
    };
    let from = select.from.first()?;
    table_factor_name(&from.relation).ok().and_then(|t| Table::from_name(t).ok())
}

// ── Column values ────────────────────────────────────────────────

/// Column → value pairs of one INSERT row or UPDATE SET list.
/// Every column must be consumed by [`Fields::take`] before [`Fields::finish`].
struct Fields {
    table: Table,
    values: HashMap<String, Option<String>>,
}

impl Fields {
    fn new(table: Table) -> Self {
        Self {
            table,
            values: HashMap::new(),
        }
    }

    fn insert(&mut self, column: String, value: Option<String>) -> Result<(), SqlError> {
        if self.values.insert(column.clone(), value).is_some() {
            return Err(SqlError::Parse(format!("column {column} given twice")));
        }
        Ok(())
    }

    /// Remove a column; absent and NULL both read as `None`.
    fn take(&mut self, column: &str) -> Option<String> {
        self.values.remove(column).flatten()
    }

    fn take_id(&mut self) -> Result<Option<Ulid>, SqlError> {
        self.take("id")
            .map(|s| Ulid::from_string(s.trim()).map_err(|e| SqlError::Parse(format!("bad ULID: {e}"))))
            .transpose()
    }

    fn only(&self, column: &str) -> bool {
        self.values.len() == 1 && self.values.contains_key(column)
    }

    fn finish(self) -> Result<(), SqlError> {
        let mut leftover: Vec<String> = self.values.into_keys().collect();
        leftover.sort();
        match leftover.into_iter().next() {
            Some(column) => Err(SqlError::UnknownColumn(self.table.as_str(), column)),
            None => Ok(()),
        }
    }

    fn owner_input(&mut self) -> OwnerInput {
        OwnerInput {
            name: self.take("name"),
            phone: self.take("phone"),
            address: self.take("address"),
            email: self.take("email"),
        }
    }

    fn walker_input(&mut self) -> WalkerInput {
        WalkerInput {
            name: self.take("name"),
            id_type: self.take("id_type"),
            id_number: self.take("id_number"),
            phone: self.take("phone"),
            email: self.take("email"),
            company_phone: self.take("company_phone"),
            company_address: self.take("company_address"),
            address: self.take("address"),
            rate: self.take("rate"),
            rating: self.take("rating"),
        }
    }

    fn pet_input(&mut self) -> PetInput {
        PetInput {
            owner_id: self.take("owner_id"),
            name: self.take("name"),
            species: self.take("species"),
            breed: self.take("breed"),
            age: self.take("age"),
            gender: self.take("gender"),
            special_recommendations: self.take("special_recommendations"),
        }
    }

    fn appointment_input(&mut self) -> AppointmentInput {
        AppointmentInput {
            date: self.take("date"),
            start_time: self.take("start_time"),
            duration_hours: self.take("duration_hours"),
            pet_id: self.take("pet_id"),
            walker_id: self.take("walker_id"),
            notes: self.take("notes"),
            status: self.take("status"),
            admin_notes: self.take("admin_notes"),
        }
    }
}

// ── Statements ───────────────────────────────────────────────────

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = Table::from_name(insert_table_name(insert)?)?;
    if insert.columns.is_empty() {
        return Err(SqlError::Unsupported("INSERT needs an explicit column list".into()));
    }
    let row = extract_insert_values(insert)?;
    if row.len() != insert.columns.len() {
        return Err(SqlError::WrongArity(table.as_str(), insert.columns.len(), row.len()));
    }

    let mut fields = Fields::new(table);
    for (column, expr) in insert.columns.iter().zip(&row) {
        fields.insert(column.value.to_lowercase(), expr_text(expr)?)?;
    }
    let id = fields.take_id()?.unwrap_or_else(Ulid::new);

    let cmd = match table {
        Table::Owners => Command::InsertOwner {
            id,
            input: fields.owner_input(),
        },
        Table::Walkers => Command::InsertWalker {
            id,
            input: fields.walker_input(),
        },
        Table::Pets => Command::InsertPet {
            id,
            input: fields.pet_input(),
        },
        Table::Appointments => Command::InsertAppointment {
            id,
            input: fields.appointment_input(),
        },
    };
    fields.finish()?;
    Ok(cmd)
}

fn parse_update(
    table: &TableWithJoins,
    assignments: &[Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = Table::from_name(table_factor_name(&table.relation)?)?;
    let id = extract_where_id(selection)?;

    let mut fields = Fields::new(table);
    for assignment in assignments {
        let column = match &assignment.target {
            AssignmentTarget::ColumnName(name) => {
                object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))?
            }
            AssignmentTarget::Tuple(_) => {
                return Err(SqlError::Unsupported("tuple assignment".into()));
            }
        };
        if column == "id" {
            return Err(SqlError::Unsupported("id cannot be updated".into()));
        }
        fields.insert(column, expr_text(&assignment.value)?)?;
    }

    if table == Table::Appointments && fields.only("status") {
        let status = fields.take("status").unwrap_or_default();
        return Ok(Command::UpdateAppointmentStatus { id, status });
    }

    let cmd = match table {
        Table::Owners => Command::UpdateOwner {
            id,
            input: fields.owner_input(),
        },
        Table::Walkers => Command::UpdateWalker {
            id,
            input: fields.walker_input(),
        },
        Table::Pets => Command::UpdatePet {
            id,
            input: fields.pet_input(),
        },
        Table::Appointments => Command::UpdateAppointment {
            id,
            input: fields.appointment_input(),
        },
    };
    fields.finish()?;
    Ok(cmd)
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = Table::from_name(delete_table_name(delete)?)?;
    let id = extract_where_id(&delete.selection)?;
    Ok(match table {
        Table::Owners => Command::DeleteOwner { id },
        Table::Walkers => Command::DeleteWalker { id },
        Table::Pets => Command::DeletePet { id },
        Table::Appointments => Command::DeleteAppointment { id },
    })
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = Table::from_name(table_factor_name(&select.from[0].relation)?)?;
    let filter = extract_filter(table, &select.selection)?;

    Ok(match table {
        Table::Owners => Command::SelectOwners { filter },
        Table::Walkers => Command::SelectWalkers { filter },
        Table::Pets => Command::SelectPets { filter },
        Table::Appointments => Command::SelectAppointments { filter },
    })
}

fn extract_filter(table: Table, selection: &Option<Expr>) -> Result<Option<Filter>, SqlError> {
    let Some(sel) = selection else {
        return Ok(None);
    };
    let Expr::BinaryOp {
        left,
        op: ast::BinaryOperator::Eq,
        right,
    } = sel
    else {
        return Err(SqlError::Unsupported("only a single `column = value` filter".into()));
    };
    let column = expr_column_name(left).ok_or_else(|| SqlError::Parse(format!("expected column, got {left}")))?;
    let value = expr_text(right)?.ok_or_else(|| SqlError::Unsupported(format!("NULL filter on {column}")))?;

    let filter = match (table, column.as_str()) {
        (_, "id") => Filter::Id(value),
        (Table::Appointments, "date") => Filter::Date(value),
        (Table::Appointments, "pet_id") => Filter::PetId(value),
        (Table::Appointments, "walker_id") => Filter::WalkerId(value),
        (Table::Pets, "owner_id") => Filter::OwnerId(value),
        _ => {
            return Err(SqlError::Unsupported(format!("filter on {}.{column}", table.as_str())));
        }
    };
    Ok(Some(filter))
}

// ── Helpers ──────────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => {
            let raw = expr_text(right)?.ok_or(SqlError::MissingFilter("id"))?;
            Ulid::from_string(raw.trim()).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

/// A literal as the text a form would have submitted. NULL is `None`.
fn expr_text(expr: &Expr) -> Result<Option<String>, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return Ok(expr_text(expr)?.map(|s| format!("-{s}")));
    }
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) | Value::Number(s, _)) => {
            Ok(Some(s.clone()))
        }
        Some(Value::Boolean(b)) => Ok(Some(b.to_string())),
        Some(Value::Null) => Ok(None),
        Some(other) => Err(SqlError::Parse(format!("unsupported literal {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    TooLong(usize),
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(&'static str, String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::TooLong(len) => write!(f, "query too long: {len} bytes (max {MAX_SQL_LEN})"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(t, c) => write!(f, "unknown column {c} in {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const OTHER: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    #[test]
    fn parse_insert_appointment() {
        let sql = format!(
            "INSERT INTO appointments (id, date, start_time, duration_hours, pet_id, walker_id, notes) \
             VALUES ('{ID}', '2030-05-12', '09:30', 1.5, '{OTHER}', '{OTHER}', 'Park loop')"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::InsertAppointment { id, input } => {
                assert_eq!(id.to_string(), ID);
                assert_eq!(input.date.as_deref(), Some("2030-05-12"));
                assert_eq!(input.start_time.as_deref(), Some("09:30"));
                assert_eq!(input.duration_hours.as_deref(), Some("1.5"));
                assert_eq!(input.pet_id.as_deref(), Some(OTHER));
                assert_eq!(input.notes.as_deref(), Some("Park loop"));
                assert_eq!(input.status, None);
                assert_eq!(input.admin_notes, None);
            }
            _ => panic!("expected InsertAppointment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_without_id_generates_one() {
        let a = parse_sql("INSERT INTO owners (name) VALUES ('Ana')").unwrap();
        let b = parse_sql("INSERT INTO owners (name) VALUES ('Ana')").unwrap();
        match (a, b) {
            (Command::InsertOwner { id: a, input }, Command::InsertOwner { id: b, .. }) => {
                assert_ne!(a, b);
                assert_eq!(input.name.as_deref(), Some("Ana"));
                assert_eq!(input.email, None);
            }
            other => panic!("expected two InsertOwner, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_null_and_negative() {
        let sql = "INSERT INTO walkers (name, rate, rating) VALUES ('Wil', -5, NULL)";
        match parse_sql(sql).unwrap() {
            Command::InsertWalker { input, .. } => {
                assert_eq!(input.rate.as_deref(), Some("-5"));
                assert_eq!(input.rating, None);
            }
            cmd => panic!("expected InsertWalker, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_pet() {
        let sql = format!("INSERT INTO pets (owner_id, name, age, gender) VALUES ('{OTHER}', 'Rex', 4, 'male')");
        match parse_sql(&sql).unwrap() {
            Command::InsertPet { input, .. } => {
                assert_eq!(input.owner_id.as_deref(), Some(OTHER));
                assert_eq!(input.age.as_deref(), Some("4"));
                assert_eq!(input.gender.as_deref(), Some("male"));
            }
            cmd => panic!("expected InsertPet, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_rejects_unknown_column() {
        let err = parse_sql("INSERT INTO owners (name, shoe_size) VALUES ('Ana', 38)").unwrap_err();
        assert!(matches!(err, SqlError::UnknownColumn("owners", ref c) if c == "shoe_size"), "{err}");
    }

    #[test]
    fn parse_insert_wrong_arity() {
        let err = parse_sql("INSERT INTO owners (name, phone) VALUES ('Ana')").unwrap_err();
        assert!(matches!(err, SqlError::WrongArity("owners", 2, 1)), "{err}");
    }

    #[test]
    fn parse_insert_bad_id() {
        let err = parse_sql("INSERT INTO owners (id, name) VALUES ('nope', 'Ana')").unwrap_err();
        assert!(matches!(err, SqlError::Parse(_)), "{err}");
    }

    #[test]
    fn parse_update_appointment() {
        let sql = format!(
            "UPDATE appointments SET date = '2030-05-12', start_time = '10:00', duration_hours = 2, \
             pet_id = '{OTHER}', walker_id = '{OTHER}', notes = 'Longer', status = 'cancelled' WHERE id = '{ID}'"
        );
        match parse_sql(&sql).unwrap() {
            Command::UpdateAppointment { id, input } => {
                assert_eq!(id.to_string(), ID);
                assert_eq!(input.duration_hours.as_deref(), Some("2"));
                assert_eq!(input.status.as_deref(), Some("cancelled"));
            }
            cmd => panic!("expected UpdateAppointment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_status_only_update() {
        let sql = format!("UPDATE appointments SET status = 'in_progress' WHERE id = '{ID}'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::UpdateAppointmentStatus {
                id: Ulid::from_string(ID).unwrap(),
                status: "in_progress".into(),
            }
        );
    }

    #[test]
    fn parse_update_requires_id_filter() {
        let err = parse_sql("UPDATE owners SET name = 'Ana'").unwrap_err();
        assert!(matches!(err, SqlError::MissingFilter("id")), "{err}");
        let err = parse_sql("UPDATE owners SET name = 'Ana' WHERE email = 'a@b.co'").unwrap_err();
        assert!(matches!(err, SqlError::MissingFilter("id")), "{err}");
    }

    #[test]
    fn parse_update_cannot_change_id() {
        let sql = format!("UPDATE pets SET id = '{OTHER}' WHERE id = '{ID}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_deletes() {
        let id = Ulid::from_string(ID).unwrap();
        for (table, expected) in [
            ("owners", Command::DeleteOwner { id }),
            ("walkers", Command::DeleteWalker { id }),
            ("pets", Command::DeletePet { id }),
            ("appointments", Command::DeleteAppointment { id }),
        ] {
            let sql = format!("DELETE FROM {table} WHERE id = '{ID}'");
            assert_eq!(parse_sql(&sql).unwrap(), expected);
        }
    }

    #[test]
    fn parse_selects_with_filters() {
        assert_eq!(
            parse_sql("SELECT * FROM appointments").unwrap(),
            Command::SelectAppointments { filter: None }
        );
        assert_eq!(
            parse_sql("SELECT * FROM appointments WHERE date = '2030-05-12'").unwrap(),
            Command::SelectAppointments {
                filter: Some(Filter::Date("2030-05-12".into()))
            }
        );
        assert_eq!(
            parse_sql(&format!("SELECT * FROM appointments WHERE walker_id = '{ID}'")).unwrap(),
            Command::SelectAppointments {
                filter: Some(Filter::WalkerId(ID.into()))
            }
        );
        assert_eq!(
            parse_sql(&format!("SELECT * FROM pets WHERE owner_id = '{ID}'")).unwrap(),
            Command::SelectPets {
                filter: Some(Filter::OwnerId(ID.into()))
            }
        );
        assert_eq!(
            parse_sql("SELECT * FROM walkers WHERE id = 'whatever'").unwrap(),
            Command::SelectWalkers {
                filter: Some(Filter::Id("whatever".into()))
            }
        );
    }

    #[test]
    fn parse_select_rejects_unsupported_filters() {
        assert!(matches!(
            parse_sql("SELECT * FROM owners WHERE owner_id = 'x'"),
            Err(SqlError::Unsupported(_))
        ));
        assert!(matches!(
            parse_sql("SELECT * FROM appointments WHERE date = '2030-05-12' AND pet_id = 'x'"),
            Err(SqlError::Unsupported(_))
        ));
    }

    #[test]
    fn query_table_ignores_placeholders() {
        assert_eq!(query_table("SELECT * FROM pets WHERE owner_id = $1"), Some(Table::Pets));
        assert_eq!(query_table("DELETE FROM pets WHERE id = $1"), None);
    }

    #[test]
    fn parse_unknown_table_errors() {
        let err = parse_sql("SELECT * FROM cats").unwrap_err();
        assert!(matches!(err, SqlError::UnknownTable(ref t) if t == "cats"));
    }

    #[test]
    fn parse_too_long_errors() {
        let sql = format!("SELECT * FROM owners WHERE id = '{}'", "x".repeat(MAX_SQL_LEN));
        assert!(matches!(parse_sql(&sql), Err(SqlError::TooLong(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
