//! Document store: every entity is a JSON document in KeyDB.
//!
//! Key schema, with `{ns}` the configured namespace:
//! - `{ns}:{Type}:{id}`  JSON document of one entity
//! - `{ns}:{Type}:ids`   set of every stored id of that type
//!
//! KeyDB has no foreign keys, so results are stored whether or not the
//! athlete and event they reference exist.

use athletics_core::types::{Athlete, Entity, Event, RaceResult};
use redis::{Connection, pipe};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{BackingStore, Repository};
use crate::error::StoreError;

pub const DATABASE_NAME: &str = "KeyDB";

/// Number of keys to batch in a single pipeline round-trip.
const PIPELINE_BATCH_SIZE: usize = 4096;

pub struct KeyDbStore {
    client: redis::Client,
    namespace: String,
}

impl KeyDbStore {
    /// Validate `url` and remember it. Connections are opened per operation.
    pub fn open(url: &str, namespace: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            namespace: namespace.to_string(),
        })
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Ok(self.client.get_connection()?)
    }

    fn entity_key(&self, collection: &str, id: Uuid) -> String {
        format!("{}:{collection}:{id}", self.namespace)
    }

    fn ids_key(&self, collection: &str) -> String {
        format!("{}:{collection}:ids", self.namespace)
    }

    /// Delete every document of `collection` and its id set. Returns how
    /// many ids the set held.
    fn drop_collection(
        &self,
        conn: &mut Connection,
        collection: &str,
    ) -> Result<usize, StoreError> {
        let ids_key = self.ids_key(collection);
        let ids: Vec<String> = redis::cmd("SMEMBERS").arg(&ids_key).query(conn)?;

        for batch in ids.chunks(PIPELINE_BATCH_SIZE) {
            let keys: Vec<String> = batch
                .iter()
                .map(|id| format!("{}:{collection}:{id}", self.namespace))
                .collect();
            redis::cmd("DEL").arg(keys).query::<()>(conn)?;
        }
        redis::cmd("DEL").arg(&ids_key).query::<()>(conn)?;
        Ok(ids.len())
    }
}

impl<T> Repository<T> for KeyDbStore
where
    T: Entity + Serialize + DeserializeOwned,
{
    fn database_name(&self) -> &str {
        DATABASE_NAME
    }

    fn add_one(&mut self, entity: &T) -> Result<Option<Uuid>, StoreError> {
        let mut con = self.connect()?;
        let json = serde_json::to_string(entity)?;
        pipe()
            .atomic()
            .cmd("SET")
            .arg(self.entity_key(T::TYPE_NAME, entity.id()))
            .arg(json)
            .ignore()
            .cmd("SADD")
            .arg(self.ids_key(T::TYPE_NAME))
            .arg(entity.id().to_string())
            .ignore()
            .query::<()>(&mut con)?;
        Ok(Some(entity.id()))
    }

    fn add_many(&mut self, entities: &[T]) -> Result<usize, StoreError> {
        let mut con = self.connect()?;
        let ids_key = self.ids_key(T::TYPE_NAME);

        for batch in entities.chunks(PIPELINE_BATCH_SIZE) {
            let mut pipeline = pipe();
            pipeline.atomic();
            for entity in batch {
                let json = serde_json::to_string(entity)?;
                pipeline
                    .cmd("SET")
                    .arg(self.entity_key(T::TYPE_NAME, entity.id()))
                    .arg(json)
                    .ignore()
                    .cmd("SADD")
                    .arg(&ids_key)
                    .arg(entity.id().to_string())
                    .ignore();
            }
            pipeline.query::<()>(&mut con)?;
        }
        Ok(entities.len())
    }

    fn get_by_id(&mut self, id: Uuid) -> Result<Option<T>, StoreError> {
        let mut con = self.connect()?;
        let json: Option<String> = redis::cmd("GET")
            .arg(self.entity_key(T::TYPE_NAME, id))
            .query(&mut con)?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn get_all(&mut self) -> Result<Vec<T>, StoreError> {
        let mut con = self.connect()?;
        let ids: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.ids_key(T::TYPE_NAME))
            .query(&mut con)?;
        let mut entities = Vec::with_capacity(ids.len());

        for batch in ids.chunks(PIPELINE_BATCH_SIZE) {
            let mut pipeline = pipe();
            for id in batch {
                pipeline
                    .cmd("GET")
                    .arg(format!("{}:{}:{id}", self.namespace, T::TYPE_NAME));
            }
            let documents: Vec<Option<String>> = pipeline.query(&mut con)?;
            // An id whose document is gone was deleted between the two reads.
            for json in documents.into_iter().flatten() {
                entities.push(serde_json::from_str(&json)?);
            }
        }
        Ok(entities)
    }

    fn update(&mut self, entity: &T) -> Result<bool, StoreError> {
        let mut con = self.connect()?;
        let json = serde_json::to_string(entity)?;
        // SET ... XX only overwrites an existing key.
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.entity_key(T::TYPE_NAME, entity.id()))
            .arg(json)
            .arg("XX")
            .query(&mut con)?;
        Ok(reply.is_some())
    }

    fn delete_one(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let mut con = self.connect()?;
        let (removed, _): (usize, usize) = pipe()
            .atomic()
            .cmd("DEL")
            .arg(self.entity_key(T::TYPE_NAME, id))
            .cmd("SREM")
            .arg(self.ids_key(T::TYPE_NAME))
            .arg(id.to_string())
            .query(&mut con)?;
        Ok(removed > 0)
    }

    fn delete_all(&mut self) -> Result<usize, StoreError> {
        let mut con = self.connect()?;
        self.drop_collection(&mut con, T::TYPE_NAME)
    }
}

impl BackingStore for KeyDbStore {
    fn label(&self) -> &str {
        DATABASE_NAME
    }

    fn initialize(&mut self, reset: bool) -> Result<(), StoreError> {
        let mut con = self.connect()?;
        redis::cmd("PING").query::<String>(&mut con)?;
        if reset {
            for collection in [RaceResult::TYPE_NAME, Event::TYPE_NAME, Athlete::TYPE_NAME] {
                let dropped = self.drop_collection(&mut con, collection)?;
                log::debug!("Dropped {dropped} {collection} documents");
            }
        }
        log::info!(
            "KeyDB namespace '{}' ready (reset: {reset})",
            self.namespace
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_collection() {
        let store = KeyDbStore::open("redis://127.0.0.1:6379/0", "bench").unwrap();
        let id = Uuid::nil();
        assert_eq!(
            store.entity_key(Athlete::TYPE_NAME, id),
            "bench:Athlete:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(store.ids_key(RaceResult::TYPE_NAME), "bench:Result:ids");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(KeyDbStore::open("not a url", "bench").is_err());
    }
}
