//! The CRUD contract every backing store implements, and the stores.
//!
//! A store implements [`Repository`] once per entity type and [`BackingStore`]
//! on top. The runner and the monitor only ever see these two traits.

pub mod keydb;
pub mod memory;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use athletics_core::types::{Athlete, Entity, Event, RaceResult};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{ConfigError, StoreError};

/// CRUD operations on one entity type in one backing store.
pub trait Repository<T: Entity> {
    /// Label of the backing store, as written to the metric log.
    fn database_name(&self) -> &str;

    /// Insert one entity and return the id it is stored under, or `None` if
    /// the insert was skipped for a referential-integrity violation.
    fn add_one(&mut self, entity: &T) -> Result<Option<Uuid>, StoreError>;

    /// Insert a batch and return how many entities were stored.
    fn add_many(&mut self, entities: &[T]) -> Result<usize, StoreError>;

    fn get_by_id(&mut self, id: Uuid) -> Result<Option<T>, StoreError>;

    /// Every stored entity, in no particular order.
    fn get_all(&mut self) -> Result<Vec<T>, StoreError>;

    /// Replace the stored entity with `entity`'s id. Returns whether a record
    /// was affected.
    fn update(&mut self, entity: &T) -> Result<bool, StoreError>;

    /// Returns whether a record was removed.
    fn delete_one(&mut self, id: Uuid) -> Result<bool, StoreError>;

    /// Remove every entity of this type and return how many were removed.
    fn delete_all(&mut self) -> Result<usize, StoreError>;
}

/// A store holding all three entity types.
pub trait BackingStore: Repository<Athlete> + Repository<Event> + Repository<RaceResult> {
    fn label(&self) -> &str;

    /// Prepare tables/collections. With `reset`, existing data is dropped first.
    fn initialize(&mut self, reset: bool) -> Result<(), StoreError>;
}

/// The store implementations that can be selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sqlite,
    KeyDb,
    Memory,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Sqlite => "sqlite",
            StoreKind::KeyDb => "keydb",
            StoreKind::Memory => "memory",
        }
    }

    /// Parse a comma-separated list such as `sqlite,keydb`.
    pub fn parse_list(raw: &str) -> Result<Vec<StoreKind>, ConfigError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreKind::Sqlite),
            "keydb" => Ok(StoreKind::KeyDb),
            "memory" => Ok(StoreKind::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: "store".to_string(),
                value: s.to_string(),
                expected: "one of sqlite, keydb, memory",
            }),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connect to the store of `kind` described by `settings`.
pub fn open_store(
    kind: StoreKind,
    settings: &Settings,
) -> Result<Box<dyn BackingStore>, StoreError> {
    let store: Box<dyn BackingStore> = match kind {
        StoreKind::Sqlite => Box::new(sqlite::SqliteStore::open(&settings.sqlite.path)?),
        StoreKind::KeyDb => {
            let config = &settings.keydb;
            Box::new(keydb::KeyDbStore::open(&config.url(), &config.namespace)?)
        }
        StoreKind::Memory => Box::new(memory::MemoryStore::new()),
    };
    log::info!("Opened {} store", store.label());
    Ok(store)
}
