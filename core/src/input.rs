//! CSV input: `events.csv` and `results.csv` from the input directory.
//!
//! Every column is optional. Blank cells, unknown columns and unreadable
//! numbers or times become absent values; only an unreadable file or a row
//! the CSV reader cannot split is an error.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::dataset::Dataset;
use crate::time_of_day::{parse_local_time, parse_mark};
use crate::types::{Athlete, Event, RaceResult};

pub const EVENTS_FILE: &str = "events.csv";
pub const RESULTS_FILE: &str = "results.csv";

#[derive(Debug, Deserialize)]
struct EventRow {
    #[serde(default)]
    local_time: Option<String>,
    #[serde(default)]
    sex: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    round: Option<String>,
    #[serde(default)]
    startlist_url: Option<String>,
    #[serde(default)]
    results_url: Option<String>,
    #[serde(default)]
    summary_url: Option<String>,
    #[serde(default)]
    points_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    sex: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    round: Option<String>,
    #[serde(default)]
    pos: Option<String>,
    #[serde(default)]
    bib: Option<String>,
    #[serde(default)]
    mark: Option<String>,
}

type EventKey<'a> = (Option<&'a str>, Option<&'a str>, Option<&'a str>);
type AthleteKey = (String, Option<String>);

/// Load both input files from `input_dir` and link results to their
/// athletes and events.
pub fn load_dataset(input_dir: &Path) -> Result<Dataset> {
    let events_path = input_dir.join(EVENTS_FILE);
    let results_path = input_dir.join(RESULTS_FILE);

    let events_file = File::open(&events_path)
        .with_context(|| format!("Failed to open {}", events_path.display()))?;
    let events = parse_events(events_file)
        .with_context(|| format!("Failed to parse {}", events_path.display()))?;

    let results_file = File::open(&results_path)
        .with_context(|| format!("Failed to open {}", results_path.display()))?;
    let (athletes, results) = parse_results(results_file, &events)
        .with_context(|| format!("Failed to parse {}", results_path.display()))?;

    log::info!(
        "Loaded {} events, {} athletes, {} results from {}",
        events.len(),
        athletes.len(),
        results.len(),
        input_dir.display()
    );

    Ok(Dataset::new(events, athletes, results))
}

/// Parse an events file. Every row becomes an event with a fresh id.
pub fn parse_events<R: Read>(reader: R) -> Result<Vec<Event>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut events = Vec::new();
    for (row_idx, row) in csv_reader.deserialize::<EventRow>().enumerate() {
        let row = row.with_context(|| format!("Malformed event row {}", row_idx + 1))?;
        events.push(Event {
            id: uuid::Uuid::new_v4(),
            name: non_blank(row.event),
            event_time: row.local_time.as_deref().and_then(parse_local_time),
            sex: non_blank(row.sex),
            round: non_blank(row.round),
            start_list_url: non_blank(row.startlist_url),
            results_url: non_blank(row.results_url),
            summary_url: non_blank(row.summary_url),
            points_url: non_blank(row.points_url),
        });
    }
    Ok(events)
}

/// Parse a results file against the already parsed `events`.
///
/// Athletes are de-duplicated by name and country. Rows without an athlete
/// name or event name are skipped; rows whose `(event, sex, round)` matches
/// no event still register the athlete but produce no result. Returned
/// results carry handles into the returned athletes and into `events`.
pub fn parse_results<R: Read>(
    reader: R,
    events: &[Event],
) -> Result<(Vec<Athlete>, Vec<RaceResult>)> {
    let mut event_lookup: HashMap<EventKey<'_>, usize> = HashMap::with_capacity(events.len());
    for (idx, event) in events.iter().enumerate() {
        event_lookup.entry(event.lookup_key()).or_insert(idx);
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut athletes: Vec<Athlete> = Vec::new();
    let mut athlete_lookup: HashMap<AthleteKey, usize> = HashMap::new();
    let mut results = Vec::new();
    let mut unmatched = 0usize;

    for (row_idx, row) in csv_reader.deserialize::<ResultRow>().enumerate() {
        let row = row.with_context(|| format!("Malformed result row {}", row_idx + 1))?;

        let (Some(name), Some(event)) = (non_blank(row.name), non_blank(row.event)) else {
            continue;
        };
        let country = non_blank(row.country);
        let sex = non_blank(row.sex);

        let athlete_idx = *athlete_lookup
            .entry((name.clone(), country.clone()))
            .or_insert_with(|| {
                athletes.push(Athlete {
                    id: uuid::Uuid::new_v4(),
                    name: Some(name),
                    sex: sex.clone(),
                    country,
                });
                athletes.len() - 1
            });

        let round = non_blank(row.round);
        let key = (Some(event.as_str()), sex.as_deref(), round.as_deref());
        let Some(&event_idx) = event_lookup.get(&key) else {
            unmatched += 1;
            continue;
        };

        results.push(RaceResult {
            position: row.pos.as_deref().and_then(parse_whole_number),
            bib: row.bib.as_deref().and_then(parse_whole_number),
            mark: row.mark.as_deref().and_then(parse_mark),
            ..RaceResult::linked(
                &athletes[athlete_idx],
                athlete_idx,
                &events[event_idx],
                event_idx,
            )
        });
    }

    if unmatched > 0 {
        log::debug!("{unmatched} result rows matched no event and were skipped");
    }

    Ok((athletes, results))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Numbers arrive as `3`, `3.0` or `1234.`; fractions are truncated.
fn parse_whole_number(raw: &str) -> Option<i32> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return None;
    }
    Some(value.trunc() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    const EVENTS_CSV: &str = "\
local_time,sex,event,round,startlist_url,results_url,summary_url,points_url
10:05,F,100 Metres,Heats,http://a/start,http://a/results,,
19:40,F,100 Metres,Final,,,,
TBC,M,Long Jump,Qualification,,,,
";

    const RESULTS_CSV: &str = "\
name,country,sex,event,round,pos,bib,mark
Jane Doe,USA,F,100 Metres,Heats,1,1234,10.85
Jane Doe,USA,F,100 Metres,Final,2.0,1234,10.79 PB
Ana Silva,BRA,F,100 Metres,Final,x,,DNF
,GHA,M,Long Jump,Qualification,1,77,8.01
Kofi Mensah,GHA,M,Long Jump,Final,1,77,8.01
";

    #[test]
    fn events_are_parsed_with_optional_fields() {
        let events = parse_events(EVENTS_CSV.as_bytes()).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].name.as_deref(), Some("100 Metres"));
        assert_eq!(events[0].event_time, NaiveTime::from_hms_opt(10, 5, 0));
        assert_eq!(events[0].start_list_url.as_deref(), Some("http://a/start"));
        assert_eq!(events[0].summary_url, None);
        assert_eq!(events[2].event_time, None);
    }

    #[test]
    fn results_link_to_athletes_and_events() {
        let events = parse_events(EVENTS_CSV.as_bytes()).unwrap();
        let (athletes, results) = parse_results(RESULTS_CSV.as_bytes(), &events).unwrap();

        // Jane twice, Ana once, Kofi registered even though his round is unknown.
        assert_eq!(athletes.len(), 3);
        assert_eq!(results.len(), 3);

        assert_eq!(results[0].athlete_id, Some(athletes[0].id));
        assert_eq!(results[0].event_id, Some(events[0].id));
        assert_eq!(results[1].event_id, Some(events[1].id));
        assert_eq!(results[1].position, Some(2));
        assert_eq!(results[1].athlete, Some(0));
        assert_eq!(results[1].event, Some(1));
        assert_eq!(
            results[1].mark,
            NaiveTime::from_hms_milli_opt(0, 0, 10, 790)
        );
    }

    #[test]
    fn unreadable_numbers_and_marks_are_absent() {
        let events = parse_events(EVENTS_CSV.as_bytes()).unwrap();
        let (_, results) = parse_results(RESULTS_CSV.as_bytes(), &events).unwrap();
        let ana = &results[2];
        assert_eq!(ana.position, None);
        assert_eq!(ana.bib, None);
        assert_eq!(ana.mark, None);
    }

    #[test]
    fn missing_columns_are_absent() {
        let events = parse_events("event,sex\n100 Metres,F\n".as_bytes()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].round, None);
        assert_eq!(events[0].event_time, None);
    }

    #[test]
    fn whole_numbers_truncate() {
        assert_eq!(parse_whole_number("3"), Some(3));
        assert_eq!(parse_whole_number("3.9"), Some(3));
        assert_eq!(parse_whole_number("1e10"), None);
        assert_eq!(parse_whole_number("NaN"), None);
    }
}
