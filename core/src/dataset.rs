//! The three entity collections a benchmark run seeds into every store.

use std::collections::HashMap;

use uuid::Uuid;

use crate::types::{Athlete, Entity, Event, RaceResult};

/// Cardinalities of the unscaled input. Generation `g` of a scaled dataset
/// occupies `g * base..(g + 1) * base` of each vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseCounts {
    pub events: usize,
    pub athletes: usize,
    pub results: usize,
}

/// Events, athletes and results, with result handles indexing into the
/// `events` and `athletes` vectors of the same dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub events: Vec<Event>,
    pub athletes: Vec<Athlete>,
    pub results: Vec<RaceResult>,
    base: BaseCounts,
}

impl Dataset {
    /// Wrap freshly parsed collections. They form generation 0.
    pub fn new(events: Vec<Event>, athletes: Vec<Athlete>, results: Vec<RaceResult>) -> Self {
        let base = BaseCounts {
            events: events.len(),
            athletes: athletes.len(),
            results: results.len(),
        };
        Self {
            events,
            athletes,
            results,
            base,
        }
    }

    pub(crate) fn with_base(
        events: Vec<Event>,
        athletes: Vec<Athlete>,
        results: Vec<RaceResult>,
        base: BaseCounts,
    ) -> Self {
        Self {
            events,
            athletes,
            results,
            base,
        }
    }

    /// Number of generations held, counting the unscaled input as one.
    pub fn generations(&self) -> usize {
        if self.base.events > 0 {
            self.events.len() / self.base.events
        } else if self.base.athletes > 0 {
            self.athletes.len() / self.base.athletes
        } else if self.base.results > 0 {
            self.results.len() / self.base.results
        } else {
            1
        }
    }

    pub fn event_generation(&self, idx: usize) -> usize {
        generation_of(idx, self.base.events)
    }

    pub fn athlete_generation(&self, idx: usize) -> usize {
        generation_of(idx, self.base.athletes)
    }

    pub fn result_generation(&self, idx: usize) -> usize {
        generation_of(idx, self.base.results)
    }

    /// Total number of entities across all three collections.
    pub fn len(&self) -> usize {
        self.events.len() + self.athletes.len() + self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The athlete a result's handle points at, if it has one.
    pub fn athlete_of(&self, result: &RaceResult) -> Option<&Athlete> {
        result.athlete.and_then(|idx| self.athletes.get(idx))
    }

    /// The event a result's handle points at, if it has one.
    pub fn event_of(&self, result: &RaceResult) -> Option<&Event> {
        result.event.and_then(|idx| self.events.get(idx))
    }

    /// Recompute every result handle from its persisted id.
    ///
    /// Used after loading results that carry ids only. Ids that do not match
    /// any athlete/event leave the handle empty.
    pub fn resolve_handles(&mut self) {
        let athletes_by_id = index_by_id(&self.athletes);
        let events_by_id = index_by_id(&self.events);
        for result in &mut self.results {
            result.athlete = result
                .athlete_id
                .and_then(|id| athletes_by_id.get(&id).copied());
            result.event = result
                .event_id
                .and_then(|id| events_by_id.get(&id).copied());
        }
    }
}

fn generation_of(idx: usize, base: usize) -> usize {
    if base == 0 { 0 } else { idx / base }
}

pub(crate) fn index_by_id<T: Entity>(entities: &[T]) -> HashMap<Uuid, usize> {
    entities
        .iter()
        .enumerate()
        .map(|(idx, entity)| (entity.id(), idx))
        .collect()
}
