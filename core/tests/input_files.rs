//! Loading the input directory from disk.

use std::fs;

use athletics_core::input::{EVENTS_FILE, RESULTS_FILE, load_dataset};
use athletics_core::scale::verify_generations;

#[test]
fn loads_linked_dataset_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(EVENTS_FILE),
        "local_time,sex,event,round,startlist_url,results_url,summary_url,points_url\n\
         10:05,F,100 Metres,Final,,,,\n",
    )
    .unwrap();
    fs::write(
        dir.path().join(RESULTS_FILE),
        "name,country,sex,event,round,pos,bib,mark\n\
         Jane Doe,USA,F,100 Metres,Final,1,12,10.85\n\
         Ana Silva,BRA,F,100 Metres,Final,2,13,10.91\n",
    )
    .unwrap();

    let dataset = load_dataset(dir.path()).unwrap();
    assert_eq!(dataset.events.len(), 1);
    assert_eq!(dataset.athletes.len(), 2);
    assert_eq!(dataset.results.len(), 2);
    assert!(verify_generations(&dataset).is_empty());
}

#[test]
fn missing_file_is_reported_by_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(EVENTS_FILE), "event\n100 Metres\n").unwrap();

    let err = load_dataset(dir.path()).unwrap_err();
    assert!(format!("{err:#}").contains(RESULTS_FILE));
}

#[test]
fn malformed_row_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    // Not UTF-8, so the row cannot be read as text.
    fs::write(dir.path().join(EVENTS_FILE), b"event,sex\n\xff\xfe,F\n").unwrap();
    fs::write(dir.path().join(RESULTS_FILE), "name\n").unwrap();

    assert!(load_dataset(dir.path()).is_err());
}
