//! Dataset scaling: grow the input N-fold while keeping every result linked
//! to athletes and events of its own generation.
//!
//! Generation 0 is the input itself. Each further generation clones every
//! event, athlete and result with fresh ids, and rewrites the clones' result
//! references through id maps that live only while that generation is built.

use std::collections::{HashMap, HashSet};
use std::fmt;

use uuid::Uuid;

use crate::dataset::{BaseCounts, Dataset, index_by_id};
use crate::types::{Athlete, Entity, Event, RaceResult};

/// Grow `original` to `factor` generations.
///
/// A factor of 1 returns the input unchanged. A factor of 0 is not a valid
/// scale and is treated as 1.
pub fn scale_dataset(original: Dataset, factor: u32) -> Dataset {
    let factor = if factor == 0 {
        log::warn!("Scale factor 0 is not valid, using 1");
        1
    } else {
        factor
    };
    if factor == 1 {
        return original;
    }

    let generations = factor as usize;
    let base = BaseCounts {
        events: original.events.len(),
        athletes: original.athletes.len(),
        results: original.results.len(),
    };

    let mut events = Vec::with_capacity(base.events * generations);
    let mut athletes = Vec::with_capacity(base.athletes * generations);
    let mut results = Vec::with_capacity(base.results * generations);
    events.extend_from_slice(&original.events);
    athletes.extend_from_slice(&original.athletes);
    results.extend_from_slice(&original.results);

    for generation in 1..generations {
        let event_map = clone_generation(&original.events, &mut events);
        let athlete_map = clone_generation(&original.athletes, &mut athletes);

        for source in &original.results {
            results.push(clone_result(source, &athlete_map, &event_map));
        }

        log::debug!(
            "Built generation {generation}: {} events, {} athletes, {} results",
            base.events,
            base.athletes,
            base.results
        );
    }

    log::info!(
        "Scaled dataset x{factor}: {} events, {} athletes, {} results",
        events.len(),
        athletes.len(),
        results.len()
    );

    Dataset::with_base(events, athletes, results, base)
}

/// Where the clone of an entity ended up: its new id and its index.
type CloneMap = HashMap<Uuid, (Uuid, usize)>;

fn clone_generation<T: Entity>(originals: &[T], out: &mut Vec<T>) -> CloneMap {
    let mut map = HashMap::with_capacity(originals.len());
    for original in originals {
        let copy = original.clone_with_fresh_id();
        map.insert(original.id(), (copy.id(), out.len()));
        out.push(copy);
    }
    map
}

fn clone_result(source: &RaceResult, athletes: &CloneMap, events: &CloneMap) -> RaceResult {
    let mut copy = source.clone_with_fresh_id();

    // A reference missing from this generation's map stays as on the source.
    if let Some(&(id, idx)) = source.athlete_id.and_then(|id| athletes.get(&id)) {
        copy.athlete_id = Some(id);
        if copy.athlete.is_some() {
            copy.athlete = Some(idx);
        }
    }
    if let Some(&(id, idx)) = source.event_id.and_then(|id| events.get(&id)) {
        copy.event_id = Some(id);
        if copy.event.is_some() {
            copy.event = Some(idx);
        }
    }
    copy
}

/// A broken invariant found by [`verify_generations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DuplicateId {
        entity: &'static str,
        id: Uuid,
    },
    DanglingReference {
        result: Uuid,
        target: &'static str,
        id: Uuid,
    },
    CrossGeneration {
        result: Uuid,
        target: &'static str,
        result_generation: usize,
        target_generation: usize,
    },
    HandleMismatch {
        result: Uuid,
        target: &'static str,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateId { entity, id } => write!(f, "duplicate {entity} id {id}"),
            Violation::DanglingReference { result, target, id } => {
                write!(f, "result {result} references missing {target} {id}")
            }
            Violation::CrossGeneration {
                result,
                target,
                result_generation,
                target_generation,
            } => write!(
                f,
                "result {result} in generation {result_generation} references a {target} \
                 in generation {target_generation}"
            ),
            Violation::HandleMismatch { result, target } => write!(
                f,
                "result {result} has a {target} handle that disagrees with its id"
            ),
        }
    }
}

/// Check the invariants a scaled dataset must hold: ids are unique across
/// all generations, and every result reference resolves to an entity of the
/// result's own generation. Returns every violation found.
pub fn verify_generations(dataset: &Dataset) -> Vec<Violation> {
    let mut violations = Vec::new();
    collect_duplicates(&dataset.events, &mut violations);
    collect_duplicates(&dataset.athletes, &mut violations);
    collect_duplicates(&dataset.results, &mut violations);

    let event_index = index_by_id(&dataset.events);
    let athlete_index = index_by_id(&dataset.athletes);

    for (idx, result) in dataset.results.iter().enumerate() {
        let generation = dataset.result_generation(idx);

        if let Some(id) = result.athlete_id {
            check_reference(
                result,
                Athlete::TYPE_NAME,
                id,
                result.athlete,
                athlete_index.get(&id).copied(),
                generation,
                |i| dataset.athlete_generation(i),
                &mut violations,
            );
        }
        if let Some(id) = result.event_id {
            check_reference(
                result,
                Event::TYPE_NAME,
                id,
                result.event,
                event_index.get(&id).copied(),
                generation,
                |i| dataset.event_generation(i),
                &mut violations,
            );
        }
    }

    violations
}

#[allow(clippy::too_many_arguments)]
fn check_reference(
    result: &RaceResult,
    target: &'static str,
    id: Uuid,
    handle: Option<usize>,
    found: Option<usize>,
    result_generation: usize,
    generation_of: impl Fn(usize) -> usize,
    violations: &mut Vec<Violation>,
) {
    let Some(found) = found else {
        violations.push(Violation::DanglingReference {
            result: result.id,
            target,
            id,
        });
        return;
    };

    let target_generation = generation_of(found);
    if target_generation != result_generation {
        violations.push(Violation::CrossGeneration {
            result: result.id,
            target,
            result_generation,
            target_generation,
        });
    }
    if handle.is_some_and(|h| h != found) {
        violations.push(Violation::HandleMismatch {
            result: result.id,
            target,
        });
    }
}

fn collect_duplicates<T: Entity>(entities: &[T], violations: &mut Vec<Violation>) {
    let mut seen = HashSet::with_capacity(entities.len());
    for entity in entities {
        if !seen.insert(entity.id()) {
            violations.push(Violation::DuplicateId {
                entity: T::TYPE_NAME,
                id: entity.id(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_dataset() -> Dataset {
        let events = vec![
            Event::new("100 Metres", "F", "Final"),
            Event::new("Long Jump", "M", "Qualification"),
        ];
        let athletes = vec![
            Athlete::new("Jane Doe", "F", "USA"),
            Athlete::new("Ana Silva", "F", "BRA"),
            Athlete::new("Kofi Mensah", "M", "GHA"),
        ];
        let results = vec![
            RaceResult::linked(&athletes[0], 0, &events[0], 0),
            RaceResult::linked(&athletes[1], 1, &events[0], 0),
            RaceResult::linked(&athletes[2], 2, &events[1], 1),
            RaceResult {
                athlete: None,
                event: None,
                ..RaceResult::linked(&athletes[0], 0, &events[1], 1)
            },
            RaceResult::default(),
        ];
        Dataset::new(events, athletes, results)
    }

    #[test]
    fn factor_one_is_identity() {
        let original = small_dataset();
        let scaled = scale_dataset(original.clone(), 1);
        assert_eq!(scaled, original);
    }

    #[test]
    fn factor_zero_is_treated_as_one() {
        let original = small_dataset();
        let scaled = scale_dataset(original.clone(), 0);
        assert_eq!(scaled, original);
    }

    #[test]
    fn factor_three_multiplies_every_collection() {
        let scaled = scale_dataset(small_dataset(), 3);
        assert_eq!(scaled.events.len(), 6);
        assert_eq!(scaled.athletes.len(), 9);
        assert_eq!(scaled.results.len(), 15);
        assert_eq!(scaled.generations(), 3);
        assert!(verify_generations(&scaled).is_empty());
    }

    #[test]
    fn clones_keep_values_but_not_ids() {
        let scaled = scale_dataset(small_dataset(), 2);
        let original = &scaled.athletes[1];
        let clone = &scaled.athletes[4];
        assert_ne!(original.id, clone.id);
        assert_eq!(original.name, clone.name);
        assert_eq!(original.country, clone.country);
    }

    #[test]
    fn handles_follow_rewritten_ids() {
        let scaled = scale_dataset(small_dataset(), 2);
        let clone = &scaled.results[5 + 2];
        assert_eq!(clone.athlete, Some(3 + 2));
        assert_eq!(clone.event, Some(2 + 1));
        assert_eq!(scaled.athlete_of(clone).map(|a| a.id), clone.athlete_id);
        assert_eq!(scaled.event_of(clone).map(|e| e.id), clone.event_id);
    }

    #[test]
    fn results_without_handles_stay_without_handles() {
        let scaled = scale_dataset(small_dataset(), 2);
        let clone = &scaled.results[5 + 3];
        assert_eq!(clone.athlete, None);
        assert_eq!(clone.athlete_id, Some(scaled.athletes[3].id));
        assert_eq!(clone.event_id, Some(scaled.events[3].id));
    }

    #[test]
    fn empty_input_scales_to_empty() {
        let scaled = scale_dataset(Dataset::default(), 5);
        assert!(scaled.is_empty());
        assert!(verify_generations(&scaled).is_empty());
    }

    #[test]
    fn verify_reports_cross_generation_reference() {
        let mut scaled = scale_dataset(small_dataset(), 2);
        scaled.results[5].athlete_id = Some(scaled.athletes[0].id);
        scaled.results[5].athlete = Some(0);

        let violations = verify_generations(&scaled);
        assert_eq!(
            violations,
            vec![Violation::CrossGeneration {
                result: scaled.results[5].id,
                target: "Athlete",
                result_generation: 1,
                target_generation: 0,
            }]
        );
    }

    #[test]
    fn verify_reports_handle_that_disagrees_with_id() {
        let mut scaled = scale_dataset(small_dataset(), 2);
        // Still generation 0, but the id resolves to athlete 1.
        scaled.results[1].athlete = Some(2);

        let violations = verify_generations(&scaled);
        assert_eq!(
            violations,
            vec![Violation::HandleMismatch {
                result: scaled.results[1].id,
                target: "Athlete",
            }]
        );
    }

    #[test]
    fn verify_reports_duplicates_and_dangling_references() {
        let mut scaled = scale_dataset(small_dataset(), 2);
        scaled.events[2].id = scaled.events[0].id;
        let missing = Uuid::new_v4();
        scaled.results[6].athlete_id = Some(missing);

        let violations = verify_generations(&scaled);
        assert!(violations.contains(&Violation::DuplicateId {
            entity: "Event",
            id: scaled.events[0].id,
        }));
        assert!(violations.contains(&Violation::DanglingReference {
            result: scaled.results[6].id,
            target: "Athlete",
            id: missing,
        }));
    }
}
