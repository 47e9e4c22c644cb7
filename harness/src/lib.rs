//! CRUD benchmark harness for athletics data.
//!
//! Loads events and results from CSV, scales the dataset, seeds every
//! configured backing store and times each repository operation into an
//! append-only metrics CSV.

pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod repository;
pub mod runner;
