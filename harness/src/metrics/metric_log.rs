use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use super::MetricRow;
use crate::error::MetricLogError;

pub const METRICS_FILE: &str = "metrics.csv";

/// Header line of the metrics CSV, written once per file.
pub const HEADER: [&str; 6] = [
    "Operation",
    "Database",
    "ElapsedUs",
    "EntityType",
    "EntityCount",
    "Scale",
];

/// Append-only CSV of [`MetricRow`]s. Each row is flushed as it is recorded,
/// so the file is complete up to the last measured operation even if the run
/// aborts.
pub struct MetricLog<W: Write = File> {
    writer: csv::Writer<W>,
    rows_written: usize,
}

impl MetricLog<File> {
    /// Open `path` for appending, creating parent directories as needed.
    ///
    /// With `reset`, an existing file is deleted first. The header is written
    /// only when the file is new or empty.
    pub fn open(path: &Path, reset: bool) -> Result<Self, MetricLogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        if reset && path.exists() {
            fs::remove_file(path)?;
            log::info!("Removed previous metrics at {}", path.display());
        }

        let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut log = Self::from_writer(file);
        if needs_header {
            log.write_header()?;
        }
        Ok(log)
    }
}

impl<W: Write> MetricLog<W> {
    /// A log over `writer` that writes no header of its own.
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(writer),
            rows_written: 0,
        }
    }

    pub fn write_header(&mut self) -> Result<(), MetricLogError> {
        self.writer.write_record(HEADER)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn record(&mut self, row: &MetricRow) -> Result<(), MetricLogError> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    /// Rows recorded through this handle.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and hand back the underlying writer.
    pub fn close(self) -> Result<W, MetricLogError> {
        self.writer
            .into_inner()
            .map_err(|e| MetricLogError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Operation;

    fn row(operation: Operation, elapsed_us: u64) -> MetricRow {
        MetricRow {
            operation,
            database: "SQLite".to_string(),
            elapsed_us,
            entity_type: "Athlete".to_string(),
            entity_count: 1,
            scale: 2,
        }
    }

    #[test]
    fn rows_are_written_in_column_order() {
        let mut log = MetricLog::from_writer(Vec::new());
        log.write_header().unwrap();
        log.record(&row(Operation::GetById, 42)).unwrap();
        let out = String::from_utf8(log.close().unwrap()).unwrap();
        assert_eq!(
            out,
            "Operation,Database,ElapsedUs,EntityType,EntityCount,Scale\n\
             GetById,SQLite,42,Athlete,1,2\n"
        );
    }

    #[test]
    fn header_is_written_once_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join(METRICS_FILE);

        let mut first = MetricLog::open(&path, false).unwrap();
        first.record(&row(Operation::AddOne, 1)).unwrap();
        drop(first);

        let mut second = MetricLog::open(&path, false).unwrap();
        second.record(&row(Operation::AddOne, 2)).unwrap();
        assert_eq!(second.rows_written(), 1);
        drop(second);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert_eq!(contents.matches("Operation,Database").count(), 1);
    }

    #[test]
    fn reset_discards_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METRICS_FILE);

        let mut log = MetricLog::open(&path, false).unwrap();
        log.record(&row(Operation::Update, 7)).unwrap();
        drop(log);

        let log = MetricLog::open(&path, true).unwrap();
        drop(log);
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
