//! Synthetic datasets with the same shape as the CSV input.
//!
//! Uses a fixed seed so that every run of a test or benchmark sees the same
//! values (ids are still fresh UUIDs on every call).

use chrono::NaiveTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::types::{Athlete, Event, RaceResult};

const COUNTRIES: [&str; 8] = ["USA", "JAM", "KEN", "ETH", "GBR", "BRA", "JPN", "NOR"];
const DISCIPLINES: [&str; 6] = [
    "100 Metres",
    "400 Metres",
    "1500 Metres",
    "Long Jump",
    "High Jump",
    "Marathon",
];
const ROUNDS: [&str; 3] = ["Heats", "Semi-Final", "Final"];
const SEXES: [&str; 2] = ["F", "M"];

/// Size of a synthetic dataset.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticParams {
    pub events: usize,
    pub athletes: usize,
    pub results: usize,
}

impl SyntheticParams {
    /// Roughly the size of one championship's results file.
    pub fn championship() -> Self {
        Self {
            events: 140,
            athletes: 2_000,
            results: 5_000,
        }
    }
}

/// Generate a linked dataset. Results reference athletes and events of the
/// dataset itself, handles included; with no events or no athletes, results
/// carry no references.
pub fn generate_synthetic(params: &SyntheticParams) -> Dataset {
    let mut rng = StdRng::seed_from_u64(0xA7_1E7E_C5);

    let events: Vec<Event> = (0..params.events)
        .map(|i| {
            let discipline = DISCIPLINES[i % DISCIPLINES.len()];
            let round = ROUNDS[(i / DISCIPLINES.len()) % ROUNDS.len()];
            let sex = SEXES[rng.gen_range(0..SEXES.len())];
            let hour = rng.gen_range(9..22);
            let minute = rng.gen_range(0..12) * 5;
            Event {
                id: Uuid::new_v4(),
                name: Some(discipline.to_string()),
                event_time: NaiveTime::from_hms_opt(hour, minute, 0),
                sex: Some(sex.to_string()),
                round: Some(round.to_string()),
                start_list_url: Some(format!("https://results.example/{i}/startlist")),
                results_url: Some(format!("https://results.example/{i}/results")),
                summary_url: None,
                points_url: None,
            }
        })
        .collect();

    let athletes: Vec<Athlete> = (0..params.athletes)
        .map(|i| Athlete {
            id: Uuid::new_v4(),
            name: Some(format!("athlete_{i:05}")),
            sex: Some(SEXES[i % SEXES.len()].to_string()),
            country: Some(COUNTRIES[rng.gen_range(0..COUNTRIES.len())].to_string()),
        })
        .collect();

    let results: Vec<RaceResult> = (0..params.results)
        .map(|i| {
            let mark_millis = rng.gen_range(9_500..600_000u32);
            let mark = NaiveTime::from_num_seconds_from_midnight_opt(
                mark_millis / 1000,
                (mark_millis % 1000) * 1_000_000,
            );
            let base = RaceResult {
                id: Uuid::new_v4(),
                position: Some((i % 8) as i32 + 1),
                bib: Some(rng.gen_range(1..9_999)),
                mark,
                ..Default::default()
            };
            if events.is_empty() || athletes.is_empty() {
                return base;
            }
            let athlete_idx = rng.gen_range(0..athletes.len());
            let event_idx = rng.gen_range(0..events.len());
            RaceResult {
                athlete_id: Some(athletes[athlete_idx].id),
                event_id: Some(events[event_idx].id),
                athlete: Some(athlete_idx),
                event: Some(event_idx),
                ..base
            }
        })
        .collect();

    Dataset::new(events, athletes, results)
}
