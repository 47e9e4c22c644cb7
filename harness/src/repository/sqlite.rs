//! Relational store: one SQLite table per entity type.
//!
//! Ids are 16-byte BLOB primary keys. Results reference athletes and events
//! through foreign keys that cascade on delete, and foreign-key enforcement
//! is switched on for every connection.

use athletics_core::types::{Athlete, Entity, Event, RaceResult};
use chrono::NaiveTime;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use super::{BackingStore, Repository};
use crate::error::StoreError;

pub const DATABASE_NAME: &str = "SQLite";

/// `SQLITE_MAX_VARIABLE_NUMBER` of the bundled library.
pub const MAX_BOUND_PARAMETERS: usize = 32_766;

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS Athletes (
        Id BLOB PRIMARY KEY,
        Name TEXT,
        Sex TEXT,
        Country TEXT
    );

    CREATE TABLE IF NOT EXISTS Events (
        Id BLOB PRIMARY KEY,
        Name TEXT,
        EventTime TEXT,
        Sex TEXT,
        Round TEXT,
        StartListUrl TEXT,
        ResultsUrl TEXT,
        SummaryUrl TEXT,
        PointsUrl TEXT
    );

    CREATE TABLE IF NOT EXISTS Results (
        Id BLOB PRIMARY KEY,
        AthleteId BLOB REFERENCES Athletes(Id) ON DELETE CASCADE,
        EventId BLOB REFERENCES Events(Id) ON DELETE CASCADE,
        Position INTEGER,
        Bib INTEGER,
        Mark TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_results_athlete ON Results(AthleteId);
    CREATE INDEX IF NOT EXISTS idx_results_event ON Results(EventId);
";

const DROP_TABLES: &str = "
    DROP TABLE IF EXISTS Results;
    DROP TABLE IF EXISTS Events;
    DROP TABLE IF EXISTS Athletes;
";

/// Mapping between an entity and its table row. `COLUMNS[0]` is the id.
pub trait SqlEntity: Entity {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    /// Column values in `COLUMNS` order.
    fn to_values(&self) -> Vec<Value>;

    /// Build the entity from a row selected with `COLUMNS`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

impl SqlEntity for Athlete {
    const TABLE: &'static str = "Athletes";
    const COLUMNS: &'static [&'static str] = &["Id", "Name", "Sex", "Country"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            uuid_value(self.id),
            optional(self.name.clone()),
            optional(self.sex.clone()),
            optional(self.country.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Athlete {
            id: row.get(0)?,
            name: row.get(1)?,
            sex: row.get(2)?,
            country: row.get(3)?,
        })
    }
}

impl SqlEntity for Event {
    const TABLE: &'static str = "Events";
    const COLUMNS: &'static [&'static str] = &[
        "Id",
        "Name",
        "EventTime",
        "Sex",
        "Round",
        "StartListUrl",
        "ResultsUrl",
        "SummaryUrl",
        "PointsUrl",
    ];

    fn to_values(&self) -> Vec<Value> {
        vec![
            uuid_value(self.id),
            optional(self.name.clone()),
            time_value(self.event_time),
            optional(self.sex.clone()),
            optional(self.round.clone()),
            optional(self.start_list_url.clone()),
            optional(self.results_url.clone()),
            optional(self.summary_url.clone()),
            optional(self.points_url.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Event {
            id: row.get(0)?,
            name: row.get(1)?,
            event_time: row.get(2)?,
            sex: row.get(3)?,
            round: row.get(4)?,
            start_list_url: row.get(5)?,
            results_url: row.get(6)?,
            summary_url: row.get(7)?,
            points_url: row.get(8)?,
        })
    }
}

impl SqlEntity for RaceResult {
    const TABLE: &'static str = "Results";
    const COLUMNS: &'static [&'static str] =
        &["Id", "AthleteId", "EventId", "Position", "Bib", "Mark"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            uuid_value(self.id),
            self.athlete_id.map_or(Value::Null, uuid_value),
            self.event_id.map_or(Value::Null, uuid_value),
            optional(self.position),
            optional(self.bib),
            time_value(self.mark),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RaceResult {
            id: row.get(0)?,
            athlete_id: row.get(1)?,
            event_id: row.get(2)?,
            position: row.get(3)?,
            bib: row.get(4)?,
            mark: row.get(5)?,
            ..Default::default()
        })
    }
}

fn uuid_value(id: Uuid) -> Value {
    Value::Blob(id.as_bytes().to_vec())
}

fn optional<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}

fn time_value(time: Option<NaiveTime>) -> Value {
    match time {
        Some(t) => Value::Text(t.format("%H:%M:%S%.f").to_string()),
        None => Value::Null,
    }
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

/// `INSERT INTO table (cols) VALUES (?, ...), ...` for `rows` rows.
fn insert_sql(table: &str, columns: &[&str], rows: usize) -> String {
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let mut sql = format!("INSERT INTO {table} ({}) VALUES ", columns.join(", "));
    sql.reserve(rows * (placeholders.len() + 2));
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&placeholders);
    }
    sql
}

fn select_sql(table: &str, columns: &[&str]) -> String {
    format!("SELECT {} FROM {table}", columns.join(", "))
}

/// Configure a connection for the benchmark.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -65536;
         PRAGMA temp_store = MEMORY;",
    )
}

/// SQLite database holding the Athletes, Events and Results tables.
pub struct SqliteStore {
    conn: Connection,
    max_parameters: usize,
}

impl SqliteStore {
    /// Open (or create) the database at `path`; `:memory:` opens a private
    /// in-memory database.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        configure_connection(&conn)?;
        Ok(Self {
            conn,
            max_parameters: MAX_BOUND_PARAMETERS,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    /// Lower the bound-parameter budget per statement, so that chunking can
    /// be exercised with small batches.
    pub fn with_max_parameters(mut self, max_parameters: usize) -> Self {
        self.max_parameters = max_parameters.max(1);
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn rows_per_statement<T: SqlEntity>(&self) -> usize {
        (self.max_parameters / T::COLUMNS.len()).max(1)
    }
}

/// Insert rows one statement at a time, skipping foreign-key violations.
fn insert_each<T: SqlEntity>(conn: &Connection, entities: &[T]) -> Result<usize, StoreError> {
    let mut stmt = conn.prepare_cached(&insert_sql(T::TABLE, T::COLUMNS, 1))?;
    let mut inserted = 0;
    for entity in entities {
        match stmt.execute(params_from_iter(entity.to_values())) {
            Ok(n) => inserted += n,
            Err(e) if is_foreign_key_violation(&e) => {
                log::warn!(
                    "Skipping {} {}: invalid foreign key",
                    T::TYPE_NAME,
                    entity.id()
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(inserted)
}

impl<T: SqlEntity> Repository<T> for SqliteStore {
    fn database_name(&self) -> &str {
        DATABASE_NAME
    }

    fn add_one(&mut self, entity: &T) -> Result<Option<Uuid>, StoreError> {
        let inserted = insert_each(&self.conn, std::slice::from_ref(entity))?;
        Ok((inserted > 0).then(|| entity.id()))
    }

    fn add_many(&mut self, entities: &[T]) -> Result<usize, StoreError> {
        if entities.is_empty() {
            return Ok(0);
        }

        let rows_per_statement = self.rows_per_statement::<T>();
        let mut tx = self.conn.transaction()?;
        let mut inserted = 0;

        for chunk in entities.chunks(rows_per_statement) {
            let outcome = {
                let mut savepoint = tx.savepoint()?;
                let sql = insert_sql(T::TABLE, T::COLUMNS, chunk.len());
                let values = chunk.iter().flat_map(SqlEntity::to_values);
                match savepoint.execute(&sql, params_from_iter(values)) {
                    Ok(n) => {
                        savepoint.commit()?;
                        Ok(n)
                    }
                    Err(e) => {
                        savepoint.rollback()?;
                        Err(e)
                    }
                }
            };

            match outcome {
                Ok(n) => inserted += n,
                Err(e) if is_foreign_key_violation(&e) => {
                    log::warn!(
                        "{} chunk of {} rows rejected by a foreign key, retrying row by row",
                        T::TYPE_NAME,
                        chunk.len()
                    );
                    inserted += insert_each(&tx, chunk)?;
                }
                // Dropping `tx` rolls back every chunk inserted so far.
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn get_by_id(&mut self, id: Uuid) -> Result<Option<T>, StoreError> {
        let sql = format!("{} WHERE Id = ?1", select_sql(T::TABLE, T::COLUMNS));
        let entity = self
            .conn
            .query_row(&sql, params![id], |row| T::from_row(row))
            .optional()?;
        Ok(entity)
    }

    fn get_all(&mut self) -> Result<Vec<T>, StoreError> {
        let mut stmt = self.conn.prepare(&select_sql(T::TABLE, T::COLUMNS))?;
        let rows = stmt.query_map([], |row| T::from_row(row))?;
        let entities = rows.collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(entities)
    }

    fn update(&mut self, entity: &T) -> Result<bool, StoreError> {
        let assignments: Vec<String> = T::COLUMNS[1..]
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE Id = ?",
            T::TABLE,
            assignments.join(", ")
        );

        let mut values = entity.to_values();
        let id = values.remove(0);
        values.push(id);

        match self.conn.execute(&sql, params_from_iter(values)) {
            Ok(changed) => Ok(changed > 0),
            Err(e) if is_foreign_key_violation(&e) => {
                log::warn!(
                    "Not updating {} {}: invalid foreign key",
                    T::TYPE_NAME,
                    entity.id()
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete_one(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE Id = ?1", T::TABLE);
        Ok(self.conn.execute(&sql, params![id])? > 0)
    }

    fn delete_all(&mut self) -> Result<usize, StoreError> {
        Ok(self.conn.execute(&format!("DELETE FROM {}", T::TABLE), [])?)
    }
}

impl BackingStore for SqliteStore {
    fn label(&self) -> &str {
        DATABASE_NAME
    }

    fn initialize(&mut self, reset: bool) -> Result<(), StoreError> {
        if reset {
            self.conn.execute_batch(DROP_TABLES)?;
        }
        self.conn.execute_batch(CREATE_TABLES)?;
        log::info!("SQLite tables ready (reset: {reset})");
        Ok(())
    }
}
