//! The benchmark: parse, scale, seed the stores and time the CRUD matrix.

use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use athletics_core::dataset::Dataset;
use athletics_core::input::load_dataset;
use athletics_core::scale::{scale_dataset, verify_generations};
use athletics_core::types::{Athlete, Entity, Event, RaceResult};

use crate::config::Settings;
use crate::error::MonitorError;
use crate::metrics::{MetricLog, PerformanceMonitor};
use crate::repository::{BackingStore, Repository, open_store};

/// Metric rows one repetition records per store.
pub const ROWS_PER_STORE: usize = 18;

/// Runs the operation matrix over a scaled dataset.
///
/// Within one repetition every phase visits each store in turn before the
/// next phase starts: bulk add, point lookup of the first entity, full scan,
/// update of the first entity, delete of the first entity, delete all.
pub struct BenchmarkRunner {
    dataset: Dataset,
    scale: u32,
    repetitions: u32,
}

impl BenchmarkRunner {
    pub fn new(dataset: Dataset, scale: u32, repetitions: u32) -> Self {
        Self {
            dataset,
            scale,
            repetitions,
        }
    }

    /// Run every repetition against `stores`, recording into `metrics`.
    pub fn run<W: Write>(
        &self,
        stores: &mut [Box<dyn BackingStore>],
        metrics: &mut MetricLog<W>,
    ) -> Result<(), MonitorError> {
        let data = &self.dataset;
        let mut monitor = PerformanceMonitor::new(metrics, self.scale);

        for repetition in 1..=self.repetitions {
            log::info!(
                "Repetition {repetition}/{} over {} stores",
                self.repetitions,
                stores.len()
            );
            let started = Instant::now();

            add_all(&mut monitor, stores, &data.athletes)?;
            add_all(&mut monitor, stores, &data.events)?;
            add_all(&mut monitor, stores, &data.results)?;

            get_first(&mut monitor, stores, &data.athletes)?;
            get_first(&mut monitor, stores, &data.events)?;
            get_first(&mut monitor, stores, &data.results)?;

            get_all::<Athlete, _>(&mut monitor, stores)?;
            get_all::<Event, _>(&mut monitor, stores)?;
            get_all::<RaceResult, _>(&mut monitor, stores)?;

            update_first(&mut monitor, stores, &data.athletes)?;
            update_first(&mut monitor, stores, &data.events)?;
            update_first(&mut monitor, stores, &data.results)?;

            // Results first: deleting an athlete or event cascades in the
            // relational store.
            delete_first(&mut monitor, stores, &data.results)?;
            delete_first(&mut monitor, stores, &data.athletes)?;
            delete_first(&mut monitor, stores, &data.events)?;

            delete_all::<RaceResult, _>(&mut monitor, stores)?;
            delete_all::<Athlete, _>(&mut monitor, stores)?;
            delete_all::<Event, _>(&mut monitor, stores)?;

            log::info!(
                "Repetition {repetition} finished in {:.2?}",
                started.elapsed()
            );
        }
        Ok(())
    }
}

fn add_all<T, W>(
    monitor: &mut PerformanceMonitor<'_, W>,
    stores: &mut [Box<dyn BackingStore>],
    entities: &[T],
) -> Result<(), MonitorError>
where
    T: Entity,
    W: Write,
    dyn BackingStore: Repository<T>,
{
    for store in stores.iter_mut() {
        let stored = monitor.measure_add_many(store.as_mut(), entities)?;
        if stored < entities.len() {
            log::warn!(
                "{}: stored {stored} of {} {} entities",
                store.label(),
                entities.len(),
                T::TYPE_NAME
            );
        }
    }
    Ok(())
}

fn get_first<T, W>(
    monitor: &mut PerformanceMonitor<'_, W>,
    stores: &mut [Box<dyn BackingStore>],
    entities: &[T],
) -> Result<(), MonitorError>
where
    T: Entity,
    W: Write,
    dyn BackingStore: Repository<T>,
{
    let Some(first) = entities.first() else {
        log::debug!("No {} to look up", T::TYPE_NAME);
        return Ok(());
    };
    for store in stores.iter_mut() {
        let found = monitor.measure_get_by_id::<T, _>(store.as_mut(), first.id())?;
        if found.is_none() {
            log::warn!(
                "{}: {} {} not found",
                store.label(),
                T::TYPE_NAME,
                first.id()
            );
        }
    }
    Ok(())
}

fn get_all<T, W>(
    monitor: &mut PerformanceMonitor<'_, W>,
    stores: &mut [Box<dyn BackingStore>],
) -> Result<(), MonitorError>
where
    T: Entity,
    W: Write,
    dyn BackingStore: Repository<T>,
{
    for store in stores.iter_mut() {
        let all = monitor.measure_get_all::<T, _>(store.as_mut())?;
        log::debug!(
            "{}: read {} {} entities",
            store.label(),
            all.len(),
            T::TYPE_NAME
        );
    }
    Ok(())
}

fn update_first<T, W>(
    monitor: &mut PerformanceMonitor<'_, W>,
    stores: &mut [Box<dyn BackingStore>],
    entities: &[T],
) -> Result<(), MonitorError>
where
    T: Entity,
    W: Write,
    dyn BackingStore: Repository<T>,
{
    let Some(first) = entities.first() else {
        return Ok(());
    };
    for store in stores.iter_mut() {
        if !monitor.measure_update(store.as_mut(), first)? {
            log::warn!(
                "{}: update of {} {} changed nothing",
                store.label(),
                T::TYPE_NAME,
                first.id()
            );
        }
    }
    Ok(())
}

fn delete_first<T, W>(
    monitor: &mut PerformanceMonitor<'_, W>,
    stores: &mut [Box<dyn BackingStore>],
    entities: &[T],
) -> Result<(), MonitorError>
where
    T: Entity,
    W: Write,
    dyn BackingStore: Repository<T>,
{
    let Some(first) = entities.first() else {
        return Ok(());
    };
    for store in stores.iter_mut() {
        if !monitor.measure_delete::<T, _>(store.as_mut(), first.id())? {
            log::warn!(
                "{}: {} {} was not deleted",
                store.label(),
                T::TYPE_NAME,
                first.id()
            );
        }
    }
    Ok(())
}

fn delete_all<T, W>(
    monitor: &mut PerformanceMonitor<'_, W>,
    stores: &mut [Box<dyn BackingStore>],
) -> Result<(), MonitorError>
where
    T: Entity,
    W: Write,
    dyn BackingStore: Repository<T>,
{
    for store in stores.iter_mut() {
        let removed = monitor.measure_delete_all::<T, _>(store.as_mut())?;
        log::debug!(
            "{}: removed {removed} {} entities",
            store.label(),
            T::TYPE_NAME
        );
    }
    Ok(())
}

/// Load the input and scale it, refusing to continue if the scaled dataset
/// breaks generation closure.
pub fn prepare_dataset(settings: &Settings) -> Result<Dataset> {
    let original = load_dataset(&settings.input_dir)?;
    let scaled = scale_dataset(original, settings.scale);

    let violations = verify_generations(&scaled);
    if !violations.is_empty() {
        for violation in violations.iter().take(20) {
            log::error!("{violation}");
        }
        bail!(
            "Scaled dataset has {} referential violations",
            violations.len()
        );
    }
    Ok(scaled)
}

/// The whole run as configured: prepare the dataset, open and initialise
/// every store, and time the matrix into the metrics CSV.
pub fn execute(settings: &Settings) -> Result<()> {
    let dataset = prepare_dataset(settings)?;

    let mut stores = Vec::with_capacity(settings.stores.len());
    for &kind in &settings.stores {
        let mut store =
            open_store(kind, settings).with_context(|| format!("Failed to open {kind} store"))?;
        store
            .initialize(settings.reset_stores)
            .with_context(|| format!("Failed to initialize {kind} store"))?;
        stores.push(store);
    }

    let metrics_path = settings.metrics_path();
    let mut metrics = MetricLog::open(&metrics_path, settings.reset_metrics)
        .with_context(|| format!("Failed to open {}", metrics_path.display()))?;

    let runner = BenchmarkRunner::new(dataset, settings.scale.max(1), settings.repetitions);
    runner
        .run(&mut stores, &mut metrics)
        .context("Benchmark run failed")?;

    let rows = metrics.rows_written();
    metrics.close()?;
    log::info!("Wrote {rows} metric rows to {}", metrics_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricRow, Operation};
    use crate::repository::memory::MemoryStore;
    use athletics_core::populate::{SyntheticParams, generate_synthetic};

    fn rows(log: MetricLog<Vec<u8>>) -> Vec<MetricRow> {
        let bytes = log.close().unwrap();
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes.as_slice())
            .deserialize()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn matrix_visits_every_store_per_phase() {
        let dataset = generate_synthetic(&SyntheticParams {
            events: 3,
            athletes: 5,
            results: 8,
        });
        let runner = BenchmarkRunner::new(dataset, 1, 2);
        let mut stores: Vec<Box<dyn BackingStore>> =
            vec![Box::new(MemoryStore::new()), Box::new(MemoryStore::new())];
        let mut log = MetricLog::from_writer(Vec::new());

        runner.run(&mut stores, &mut log).unwrap();
        let rows = rows(log);

        assert_eq!(rows.len(), ROWS_PER_STORE * 2 * 2);
        let first: Vec<(Operation, &str)> = rows[..6]
            .iter()
            .map(|r| (r.operation, r.entity_type.as_str()))
            .collect();
        assert_eq!(
            first,
            vec![
                (Operation::AddMany, "Athlete"),
                (Operation::AddMany, "Athlete"),
                (Operation::AddMany, "Event"),
                (Operation::AddMany, "Event"),
                (Operation::AddMany, "Result"),
                (Operation::AddMany, "Result"),
            ]
        );
        let last = &rows[ROWS_PER_STORE * 2 - 1];
        assert_eq!(last.operation, Operation::DeleteAll);
        assert_eq!(last.entity_type, "Event");
    }

    #[test]
    fn empty_dataset_skips_single_entity_operations() {
        let runner = BenchmarkRunner::new(Dataset::default(), 1, 1);
        let mut stores: Vec<Box<dyn BackingStore>> = vec![Box::new(MemoryStore::new())];
        let mut log = MetricLog::from_writer(Vec::new());

        runner.run(&mut stores, &mut log).unwrap();
        let ops: Vec<Operation> = rows(log).into_iter().map(|r| r.operation).collect();
        assert_eq!(ops.len(), 9);
        assert!(!ops.contains(&Operation::GetById));
        assert!(!ops.contains(&Operation::Update));
        assert!(!ops.contains(&Operation::Delete));
    }
}
