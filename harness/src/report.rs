//! Report module: summarises a metrics CSV per operation and store.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};

use crate::metrics::{MetricRow, Operation};

/// Every sample of one `(Operation, EntityType, Scale, Database)` cell.
#[derive(Debug, Clone)]
pub struct MetricSummary {
    pub operation: Operation,
    pub entity_type: String,
    pub scale: u32,
    pub database: String,
    pub elapsed_us: Vec<u64>,
    /// Entities handled per sample, summed.
    pub entity_total: usize,
}

impl MetricSummary {
    pub fn count(&self) -> usize {
        self.elapsed_us.len()
    }

    pub fn mean_us(&self) -> f64 {
        if self.elapsed_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.elapsed_us.iter().map(|&us| us as f64).sum();
        sum / self.elapsed_us.len() as f64
    }

    /// Nearest-rank percentile.
    pub fn percentile_us(&self, pct: f64) -> u64 {
        if self.elapsed_us.is_empty() {
            return 0;
        }
        let mut sorted = self.elapsed_us.clone();
        sorted.sort_unstable();
        let idx = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    pub fn max_us(&self) -> u64 {
        self.elapsed_us.iter().copied().max().unwrap_or(0)
    }

    /// Mean time per entity, for operations touching more than one.
    pub fn mean_us_per_entity(&self) -> f64 {
        if self.entity_total == 0 {
            return 0.0;
        }
        self.elapsed_us.iter().sum::<u64>() as f64 / self.entity_total as f64
    }
}

/// How one store's mean compares with the fastest store for the same cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub operation: Operation,
    pub entity_type: String,
    pub scale: u32,
    pub database: String,
    pub mean_us: f64,
    pub fastest: String,
    /// `mean_us` over the fastest store's mean; 1.0 for the fastest itself.
    pub ratio: f64,
}

/// Read a metrics CSV written by [`MetricLog`](crate::metrics::MetricLog).
pub fn load_metrics(path: &Path) -> Result<Vec<MetricRow>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut rows = Vec::new();
    for (idx, row) in reader.deserialize::<MetricRow>().enumerate() {
        // Line 1 is the header.
        let line = idx + 2;
        let row = row.with_context(|| format!("{}: malformed line {line}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

type CellKey = (Operation, String, u32, String);

/// Group rows by operation, entity type, scale and database, in that order.
pub fn summarize(rows: &[MetricRow]) -> Vec<MetricSummary> {
    let mut cells: BTreeMap<CellKey, MetricSummary> = BTreeMap::new();
    for row in rows {
        let key = (
            row.operation,
            row.entity_type.clone(),
            row.scale,
            row.database.clone(),
        );
        let cell = cells.entry(key).or_insert_with(|| MetricSummary {
            operation: row.operation,
            entity_type: row.entity_type.clone(),
            scale: row.scale,
            database: row.database.clone(),
            elapsed_us: Vec::new(),
            entity_total: 0,
        });
        cell.elapsed_us.push(row.elapsed_us);
        cell.entity_total += row.entity_count;
    }
    cells.into_values().collect()
}

/// Compare stores within every `(Operation, EntityType, Scale)` measured on
/// more than one store.
pub fn compare(summaries: &[MetricSummary]) -> Vec<Comparison> {
    let mut groups: BTreeMap<(Operation, &str, u32), Vec<&MetricSummary>> = BTreeMap::new();
    for summary in summaries {
        let key = (
            summary.operation,
            summary.entity_type.as_str(),
            summary.scale,
        );
        groups.entry(key).or_default().push(summary);
    }

    let mut comparisons = Vec::new();
    for ((operation, entity_type, scale), cells) in groups {
        if cells.len() < 2 {
            continue;
        }
        let Some(fastest) = cells
            .iter()
            .min_by(|a, b| a.mean_us().total_cmp(&b.mean_us()))
        else {
            continue;
        };
        let base = fastest.mean_us();
        for cell in &cells {
            let mean = cell.mean_us();
            let ratio = if base > 0.0 { mean / base } else { 1.0 };
            comparisons.push(Comparison {
                operation,
                entity_type: entity_type.to_string(),
                scale,
                database: cell.database.clone(),
                mean_us: mean,
                fastest: fastest.database.clone(),
                ratio,
            });
        }
    }
    comparisons
}

/// Print the per-cell latency table, whose last column is the mean cost of
/// one entity, then the store comparison.
pub fn print_report(summaries: &[MetricSummary]) {
    println!("\n{}", "=".repeat(106));
    println!("  CRUD Benchmark Report (times in µs)");
    println!("{}", "=".repeat(106));
    println!(
        "  {:10} {:8} {:>6} {:10} {:>6} {:>12} {:>10} {:>10} {:>10} {:>10}",
        "Operation", "Entity", "Scale", "Database", "Runs", "Mean", "p50", "p95", "Max", "Each"
    );
    println!("  {}", "-".repeat(102));
    for s in summaries {
        println!(
            "  {:10} {:8} {:>6} {:10} {:>6} {:>12.0} {:>10} {:>10} {:>10} {:>10.2}",
            s.operation.as_str(),
            s.entity_type,
            s.scale,
            s.database,
            s.count(),
            s.mean_us(),
            s.percentile_us(50.0),
            s.percentile_us(95.0),
            s.max_us(),
            s.mean_us_per_entity()
        );
    }

    let comparisons = compare(summaries);
    if comparisons.is_empty() {
        println!("\n  Only one store measured; no comparison.");
        return;
    }

    println!("\n  Store comparison (mean relative to fastest):");
    println!(
        "  {:10} {:8} {:>6} {:10} {:>12} {:>8}",
        "Operation", "Entity", "Scale", "Database", "Mean", "x"
    );
    println!("  {}", "-".repeat(60));
    for c in &comparisons {
        let marker = if c.database == c.fastest { "*" } else { "" };
        println!(
            "  {:10} {:8} {:>6} {:10} {:>12.0} {:>7.2}{}",
            c.operation.as_str(),
            c.entity_type,
            c.scale,
            c.database,
            c.mean_us,
            c.ratio,
            marker
        );
    }
    println!("{}", "=".repeat(106));
}
