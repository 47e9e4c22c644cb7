//! In-process store keeping each collection in an insertion-ordered map.
//!
//! Behaves like the relational store where it matters to the benchmark:
//! results must reference stored athletes and events, and deleting an
//! athlete or event deletes the results that reference it.

use std::collections::HashSet;

use athletics_core::types::{Athlete, Entity, Event, RaceResult};
use indexmap::IndexMap;
use uuid::Uuid;

use super::{BackingStore, Repository};
use crate::error::StoreError;

pub const DATABASE_NAME: &str = "Memory";

#[derive(Debug, Default)]
pub struct MemoryStore {
    athletes: IndexMap<Uuid, Athlete>,
    events: IndexMap<Uuid, Event>,
    results: IndexMap<Uuid, RaceResult>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn references_resolve(&self, result: &RaceResult) -> bool {
        resolves(&self.athletes, result.athlete_id) && resolves(&self.events, result.event_id)
    }
}

fn resolves<T>(table: &IndexMap<Uuid, T>, id: Option<Uuid>) -> bool {
    id.is_none_or(|id| table.contains_key(&id))
}

/// Collection access and integrity rules per entity type.
pub trait MemoryEntity: Entity {
    fn table(store: &MemoryStore) -> &IndexMap<Uuid, Self>;
    fn table_mut(store: &mut MemoryStore) -> &mut IndexMap<Uuid, Self>;

    /// Whether the entity may be stored given the current contents.
    fn admissible(&self, _store: &MemoryStore) -> bool {
        true
    }

    /// Normalise an entity before it is stored.
    fn stored(&self) -> Self {
        self.clone()
    }

    /// Remove whatever depends on the entities in `ids`.
    fn cascade(_store: &mut MemoryStore, _ids: &HashSet<Uuid>) {}
}

impl MemoryEntity for Athlete {
    fn table(store: &MemoryStore) -> &IndexMap<Uuid, Self> {
        &store.athletes
    }

    fn table_mut(store: &mut MemoryStore) -> &mut IndexMap<Uuid, Self> {
        &mut store.athletes
    }

    fn cascade(store: &mut MemoryStore, ids: &HashSet<Uuid>) {
        store
            .results
            .retain(|_, r| !r.athlete_id.is_some_and(|id| ids.contains(&id)));
    }
}

impl MemoryEntity for Event {
    fn table(store: &MemoryStore) -> &IndexMap<Uuid, Self> {
        &store.events
    }

    fn table_mut(store: &mut MemoryStore) -> &mut IndexMap<Uuid, Self> {
        &mut store.events
    }

    fn cascade(store: &mut MemoryStore, ids: &HashSet<Uuid>) {
        store
            .results
            .retain(|_, r| !r.event_id.is_some_and(|id| ids.contains(&id)));
    }
}

impl MemoryEntity for RaceResult {
    fn table(store: &MemoryStore) -> &IndexMap<Uuid, Self> {
        &store.results
    }

    fn table_mut(store: &mut MemoryStore) -> &mut IndexMap<Uuid, Self> {
        &mut store.results
    }

    fn admissible(&self, store: &MemoryStore) -> bool {
        store.references_resolve(self)
    }

    // Handles index the caller's dataset, not this store.
    fn stored(&self) -> Self {
        self.detached()
    }
}

impl MemoryStore {
    fn insert<T: MemoryEntity>(&mut self, entity: &T) -> Result<bool, StoreError> {
        if T::table(self).contains_key(&entity.id()) {
            return Err(StoreError::DuplicateId {
                entity: T::TYPE_NAME,
                id: entity.id(),
            });
        }
        if !entity.admissible(self) {
            log::warn!(
                "Skipping {} {}: invalid foreign key",
                T::TYPE_NAME,
                entity.id()
            );
            return Ok(false);
        }
        T::table_mut(self).insert(entity.id(), entity.stored());
        Ok(true)
    }
}

impl<T: MemoryEntity> Repository<T> for MemoryStore {
    fn database_name(&self) -> &str {
        DATABASE_NAME
    }

    fn add_one(&mut self, entity: &T) -> Result<Option<Uuid>, StoreError> {
        Ok(self.insert(entity)?.then(|| entity.id()))
    }

    fn add_many(&mut self, entities: &[T]) -> Result<usize, StoreError> {
        // A duplicate id aborts the whole batch, so check before inserting.
        let table = T::table(self);
        let mut seen = HashSet::with_capacity(entities.len());
        if let Some(dup) = entities
            .iter()
            .find(|e| table.contains_key(&e.id()) || !seen.insert(e.id()))
        {
            return Err(StoreError::DuplicateId {
                entity: T::TYPE_NAME,
                id: dup.id(),
            });
        }

        let mut inserted = 0;
        for entity in entities {
            if self.insert(entity)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn get_by_id(&mut self, id: Uuid) -> Result<Option<T>, StoreError> {
        Ok(T::table(self).get(&id).cloned())
    }

    fn get_all(&mut self) -> Result<Vec<T>, StoreError> {
        Ok(T::table(self).values().cloned().collect())
    }

    fn update(&mut self, entity: &T) -> Result<bool, StoreError> {
        if !T::table(self).contains_key(&entity.id()) {
            return Ok(false);
        }
        if !entity.admissible(self) {
            log::warn!(
                "Not updating {} {}: invalid foreign key",
                T::TYPE_NAME,
                entity.id()
            );
            return Ok(false);
        }
        T::table_mut(self).insert(entity.id(), entity.stored());
        Ok(true)
    }

    fn delete_one(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let removed = T::table_mut(self).shift_remove(&id).is_some();
        if removed {
            T::cascade(self, &HashSet::from([id]));
        }
        Ok(removed)
    }

    fn delete_all(&mut self) -> Result<usize, StoreError> {
        let ids: HashSet<Uuid> = T::table(self).keys().copied().collect();
        T::table_mut(self).clear();
        T::cascade(self, &ids);
        Ok(ids.len())
    }
}

impl BackingStore for MemoryStore {
    fn label(&self) -> &str {
        DATABASE_NAME
    }

    fn initialize(&mut self, reset: bool) -> Result<(), StoreError> {
        if reset {
            self.athletes.clear();
            self.events.clear();
            self.results.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MemoryStore, Athlete, Event) {
        let mut store = MemoryStore::new();
        let athlete = Athlete::new("Jane Doe", "F", "USA");
        let event = Event::new("100 Metres", "F", "Final");
        Repository::<Athlete>::add_one(&mut store, &athlete).unwrap();
        Repository::<Event>::add_one(&mut store, &event).unwrap();
        (store, athlete, event)
    }

    #[test]
    fn result_with_unknown_athlete_is_skipped() {
        let (mut store, _, event) = seeded();
        let stranger = Athlete::new("Nobody", "M", "XXX");
        let orphan = RaceResult::linked(&stranger, 0, &event, 0);

        assert_eq!(store.add_one(&orphan).unwrap(), None);
        let all: Vec<RaceResult> = store.get_all().unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn add_many_skips_only_violating_rows() {
        let (mut store, athlete, event) = seeded();
        let stranger = Athlete::new("Nobody", "M", "XXX");
        let batch = vec![
            RaceResult::linked(&athlete, 0, &event, 0),
            RaceResult::linked(&stranger, 1, &event, 0),
            RaceResult::linked(&athlete, 0, &event, 0),
        ];
        assert_eq!(store.add_many(&batch[..]).unwrap(), 2);
    }

    #[test]
    fn duplicate_id_rejects_batch() {
        let (mut store, athlete, _) = seeded();
        let fresh = Athlete::new("Ana Silva", "F", "BRA");
        let batch = [fresh.clone(), athlete];
        let err = Repository::<Athlete>::add_many(&mut store, &batch).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { .. }));
        assert!(err.to_string().starts_with("Athlete "));
        let stored: Option<Athlete> = store.get_by_id(fresh.id).unwrap();
        assert!(stored.is_none());
    }

    #[test]
    fn deleting_event_cascades_to_results() {
        let (mut store, athlete, event) = seeded();
        let result = RaceResult::linked(&athlete, 0, &event, 0);
        store.add_one(&result).unwrap();

        assert!(Repository::<Event>::delete_one(&mut store, event.id).unwrap());
        let remaining: Option<RaceResult> = store.get_by_id(result.id).unwrap();
        assert!(remaining.is_none());
    }

    #[test]
    fn stored_results_drop_handles() {
        let (mut store, athlete, event) = seeded();
        let result = RaceResult::linked(&athlete, 5, &event, 9);
        store.add_one(&result).unwrap();
        let stored: RaceResult = store.get_by_id(result.id).unwrap().unwrap();
        assert_eq!(stored.athlete, None);
        assert_eq!(stored.event, None);
    }

    #[test]
    fn update_of_missing_entity_reports_false() {
        let (mut store, _, _) = seeded();
        let ghost = Athlete::new("Ghost", "F", "XXX");
        assert!(!store.update(&ghost).unwrap());
    }

    #[test]
    fn get_all_keeps_insertion_order() {
        let mut store = MemoryStore::new();
        let athletes: Vec<Athlete> = (0..5)
            .map(|i| Athlete::new(&format!("athlete_{i}"), "F", "USA"))
            .collect();
        store.add_many(&athletes[..]).unwrap();
        let all: Vec<Athlete> = store.get_all().unwrap();
        assert_eq!(all, athletes);
    }
}
