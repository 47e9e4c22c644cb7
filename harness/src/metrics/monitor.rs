use std::io::Write;
use std::time::{Duration, Instant};

use athletics_core::types::Entity;
use uuid::Uuid;

use super::{MetricLog, MetricRow, Operation};
use crate::error::{MonitorError, StoreError};
use crate::repository::Repository;

/// Times repository calls and records one metric row per call.
///
/// Only the repository call itself is inside the timed region. A call that
/// fails records nothing and its error is returned.
pub struct PerformanceMonitor<'a, W: Write> {
    log: &'a mut MetricLog<W>,
    scale: u32,
}

impl<'a, W: Write> PerformanceMonitor<'a, W> {
    pub fn new(log: &'a mut MetricLog<W>, scale: u32) -> Self {
        Self { log, scale }
    }

    /// Run `op` against `repo`, then record `operation` with the count
    /// derived from its output.
    fn measure<T, R, O>(
        &mut self,
        operation: Operation,
        repo: &mut R,
        op: impl FnOnce(&mut R) -> Result<O, StoreError>,
        count: impl FnOnce(&O) -> usize,
    ) -> Result<O, MonitorError>
    where
        T: Entity,
        R: Repository<T> + ?Sized,
    {
        let start = Instant::now();
        let output = op(&mut *repo)?;
        let elapsed = start.elapsed();

        let row = MetricRow {
            operation,
            database: repo.database_name().to_string(),
            elapsed_us: micros(elapsed),
            entity_type: T::TYPE_NAME.to_string(),
            entity_count: count(&output),
            scale: self.scale,
        };
        log::debug!(
            "{} {} x{} on {}: {}us",
            row.operation,
            row.entity_type,
            row.entity_count,
            row.database,
            row.elapsed_us
        );
        self.log.record(&row)?;
        Ok(output)
    }

    pub fn measure_add_one<T, R>(
        &mut self,
        repo: &mut R,
        entity: &T,
    ) -> Result<Option<Uuid>, MonitorError>
    where
        T: Entity,
        R: Repository<T> + ?Sized,
    {
        self.measure::<T, R, _>(Operation::AddOne, repo, |r| r.add_one(entity), |_| 1)
    }

    pub fn measure_add_many<T, R>(
        &mut self,
        repo: &mut R,
        entities: &[T],
    ) -> Result<usize, MonitorError>
    where
        T: Entity,
        R: Repository<T> + ?Sized,
    {
        self.measure::<T, R, _>(
            Operation::AddMany,
            repo,
            |r| r.add_many(entities),
            |_| entities.len(),
        )
    }

    pub fn measure_get_by_id<T, R>(
        &mut self,
        repo: &mut R,
        id: Uuid,
    ) -> Result<Option<T>, MonitorError>
    where
        T: Entity,
        R: Repository<T> + ?Sized,
    {
        self.measure::<T, R, _>(Operation::GetById, repo, |r| r.get_by_id(id), |_| 1)
    }

    pub fn measure_get_all<T, R>(&mut self, repo: &mut R) -> Result<Vec<T>, MonitorError>
    where
        T: Entity,
        R: Repository<T> + ?Sized,
    {
        self.measure::<T, R, _>(Operation::GetAll, repo, |r| r.get_all(), Vec::len)
    }

    pub fn measure_update<T, R>(&mut self, repo: &mut R, entity: &T) -> Result<bool, MonitorError>
    where
        T: Entity,
        R: Repository<T> + ?Sized,
    {
        self.measure::<T, R, _>(Operation::Update, repo, |r| r.update(entity), |_| 1)
    }

    pub fn measure_delete<T, R>(&mut self, repo: &mut R, id: Uuid) -> Result<bool, MonitorError>
    where
        T: Entity,
        R: Repository<T> + ?Sized,
    {
        self.measure::<T, R, _>(Operation::Delete, repo, |r| r.delete_one(id), |_| 1)
    }

    pub fn measure_delete_all<T, R>(&mut self, repo: &mut R) -> Result<usize, MonitorError>
    where
        T: Entity,
        R: Repository<T> + ?Sized,
    {
        self.measure::<T, R, _>(Operation::DeleteAll, repo, |r| r.delete_all(), |n| *n)
    }
}

fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}
