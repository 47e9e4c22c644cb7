//! Timing and metric recording.
//!
//! Every measured repository call produces one [`MetricRow`], appended to the
//! metrics CSV by a [`MetricLog`]. [`PerformanceMonitor`] wraps the calls.

mod metric_log;
mod monitor;

pub use metric_log::{HEADER, METRICS_FILE, MetricLog};
pub use monitor::PerformanceMonitor;

use std::fmt;

use serde::{Deserialize, Serialize};

/// The CRUD operation a metric row was recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operation {
    AddOne,
    AddMany,
    GetById,
    GetAll,
    Update,
    Delete,
    DeleteAll,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::AddOne,
        Operation::AddMany,
        Operation::GetById,
        Operation::GetAll,
        Operation::Update,
        Operation::Delete,
        Operation::DeleteAll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::AddOne => "AddOne",
            Operation::AddMany => "AddMany",
            Operation::GetById => "GetById",
            Operation::GetAll => "GetAll",
            Operation::Update => "Update",
            Operation::Delete => "Delete",
            Operation::DeleteAll => "DeleteAll",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the metrics CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricRow {
    pub operation: Operation,
    pub database: String,
    pub elapsed_us: u64,
    pub entity_type: String,
    pub entity_count: usize,
    pub scale: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_match_serialized_form() {
        for op in Operation::ALL {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
        }
    }
}
