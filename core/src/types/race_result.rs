use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Athlete, Entity, Event};

/// A single athlete's placing in a single event.
///
/// `athlete` and `event` are resolved handles: indexes into the vectors of the
/// [`Dataset`](crate::dataset::Dataset) that owns this result. They are a cache
/// of `athlete_id`/`event_id`, never persisted, and ignored by `==`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RaceResult {
    pub id: Uuid,
    pub athlete_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub position: Option<i32>,
    pub bib: Option<i32>,
    pub mark: Option<NaiveTime>,
    #[serde(skip)]
    pub athlete: Option<usize>,
    #[serde(skip)]
    pub event: Option<usize>,
}

impl RaceResult {
    /// A result referencing `athlete` (at `athlete_idx`) and `event` (at `event_idx`).
    pub fn linked(athlete: &Athlete, athlete_idx: usize, event: &Event, event_idx: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            athlete_id: Some(athlete.id),
            event_id: Some(event.id),
            athlete: Some(athlete_idx),
            event: Some(event_idx),
            ..Default::default()
        }
    }

    /// Drop the in-memory handles, keeping only the persisted references.
    pub fn detached(&self) -> Self {
        Self {
            athlete: None,
            event: None,
            ..self.clone()
        }
    }
}

impl PartialEq for RaceResult {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.athlete_id == other.athlete_id
            && self.event_id == other.event_id
            && self.position == other.position
            && self.bib == other.bib
            && self.mark == other.mark
    }
}

impl Eq for RaceResult {}

impl Entity for RaceResult {
    const TYPE_NAME: &'static str = "Result";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_handles() {
        let athlete = Athlete::new("Jane Doe", "F", "USA");
        let event = Event::new("100 Metres", "F", "Final");
        let linked = RaceResult::linked(&athlete, 3, &event, 7);

        assert_eq!(linked, linked.detached());
        assert_eq!(linked.detached().athlete, None);
    }

    #[test]
    fn clone_with_fresh_id_keeps_references() {
        let athlete = Athlete::new("Jane Doe", "F", "USA");
        let event = Event::new("100 Metres", "F", "Final");
        let original = RaceResult {
            position: Some(1),
            bib: Some(1234),
            ..RaceResult::linked(&athlete, 0, &event, 0)
        };

        let copy = original.clone_with_fresh_id();
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.athlete_id, original.athlete_id);
        assert_eq!(copy.event_id, original.event_id);
        assert_eq!(copy.position, Some(1));
        assert_eq!(copy.bib, Some(1234));
    }
}
