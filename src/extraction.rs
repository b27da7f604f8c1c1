//! Period dispatch and persistence of extraction results
//!
//! The merged units are processed one period per task. With zero or one worker
//! the periods run sequentially on the calling thread, otherwise on a dedicated
//! rayon pool. The processing callback and the CSV options are bundled once in a
//! [`TaskContext`] shared read-only by every task.

use crate::blocks::{build_blocks, build_blocks_in_place, merge_blocks, Block, MergedUnit};
use crate::errors::{ExtractError, Result};
use crate::metadata::{ColumnMapping, MetadataTable};
use crate::netcdf_io::{
    write_metadata_block, CsvOptions, DataBlockWriter, CSV_FILE_EXTENSION, NETCDF_FILE_EXTENSION,
};
use crate::parallel::ParallelConfig;
use crate::time::{Period, TimeResolution};
use ndarray::ArrayD;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Output of a processing callback for one period
#[derive(Debug, Clone)]
pub struct ProcessedPeriod {
    /// Directory under which `{label}/{period}.*` files are written
    pub output_prefix: PathBuf,
    /// Extracted array per label
    pub data_blocks: Vec<(String, ArrayD<f32>)>,
}

/// Files written for one (period, label)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub metadata_block: PathBuf,
    pub data_block: PathBuf,
}

pub type ExtractionResults = BTreeMap<Period, BTreeMap<String, ExtractionResult>>;

/// Read-only state shared by every period task
pub struct TaskContext<'a, F> {
    processor: &'a F,
    csv_options: &'a CsvOptions,
}

impl<'a, F> TaskContext<'a, F>
where
    F: Fn(&Period, &MergedUnit) -> Result<ProcessedPeriod> + Sync,
{
    pub fn new(processor: &'a F, csv_options: &'a CsvOptions) -> Self {
        Self {
            processor,
            csv_options,
        }
    }

    /// Runs the callback for one period and persists its blocks.
    pub fn process(
        &self,
        period: &Period,
        unit: &MergedUnit,
    ) -> Result<(Period, BTreeMap<String, ExtractionResult>)> {
        debug!(period = %period, labels = unit.len(), "processing period");
        let processed = (self.processor)(period, unit).map_err(|e| {
            error!(period = %period, error = %e, "extraction failed");
            e
        })?;

        let mut results = BTreeMap::new();
        for (label_id, data) in &processed.data_blocks {
            let block = unit.get(label_id).ok_or_else(|| ExtractError::MissingBlock {
                label: label_id.clone(),
                period: period.to_string(),
            })?;
            let result = self
                .persist(&processed.output_prefix, period, label_id, block, data)
                .map_err(|e| {
                    error!(period = %period, label = %label_id, error = %e, "persistence failed");
                    e
                })?;
            results.insert(label_id.clone(), result);
        }

        Ok((period.clone(), results))
    }

    fn persist(
        &self,
        output_prefix: &Path,
        period: &Period,
        label_id: &str,
        block: &Block,
        data: &ArrayD<f32>,
    ) -> Result<ExtractionResult> {
        let (metadata_block, data_block) = block_file_paths(output_prefix, label_id, period);
        if let Some(parent) = metadata_block.parent() {
            fs::create_dir_all(parent)?;
        }

        write_metadata_block(&metadata_block, block, self.csv_options)?;

        let period_name = period.to_string();
        DataBlockWriter::new(&data_block)
            .with_attribute("label", label_id)
            .with_attribute("period", period_name)
            .write(data)?;

        Ok(ExtractionResult {
            metadata_block,
            data_block,
        })
    }
}

/// Paths of the metadata and data files of a (period, label)
pub fn block_file_paths(output_prefix: &Path, label_id: &str, period: &Period) -> (PathBuf, PathBuf) {
    let stem = output_prefix.join(label_id).join(period.to_string());
    (
        stem.with_extension(CSV_FILE_EXTENSION),
        stem.with_extension(NETCDF_FILE_EXTENSION),
    )
}

/// Calls `processor` once per period and writes its results.
///
/// Zero or one worker runs the periods sequentially on the calling thread.
/// Any failure aborts the whole dispatch; files already written for the failed
/// period are left in place and must not be trusted.
pub fn dispatch<F>(
    processor: F,
    merged: &BTreeMap<Period, MergedUnit>,
    nb_workers: usize,
    csv_options: &CsvOptions,
) -> Result<ExtractionResults>
where
    F: Fn(&Period, &MergedUnit) -> Result<ProcessedPeriod> + Sync,
{
    let pool = ParallelConfig::with_threads(nb_workers).pool()?;
    let units: Vec<(&Period, &MergedUnit)> = merged.iter().collect();
    dispatch_units(processor, &units, pool.as_ref(), csv_options)
}

/// [`dispatch`] over a subset of the merged units, on `pool` or sequentially without one.
pub fn dispatch_units<F>(
    processor: F,
    units: &[(&Period, &MergedUnit)],
    pool: Option<&ThreadPool>,
    csv_options: &CsvOptions,
) -> Result<ExtractionResults>
where
    F: Fn(&Period, &MergedUnit) -> Result<ProcessedPeriod> + Sync,
{
    let csv_options = csv_options.normalized()?;
    let context = TaskContext::new(&processor, &csv_options);

    let results: Vec<(Period, BTreeMap<String, ExtractionResult>)> = match pool {
        None => {
            info!(periods = units.len(), "dispatching periods sequentially");
            units
                .iter()
                .map(|&(period, unit)| context.process(period, unit))
                .collect::<Result<_>>()?
        }
        Some(pool) => {
            info!(
                periods = units.len(),
                workers = pool.current_num_threads(),
                "dispatching periods in parallel"
            );
            pool.install(|| {
                units
                    .par_iter()
                    .with_max_len(1)
                    .map(|&(period, unit)| context.process(period, unit))
                    .collect::<Result<_>>()
            })?
        }
    };

    Ok(results.into_iter().collect())
}

/// Partitions the label tables, merges them and dispatches the periods.
pub fn extract<F>(
    processor: F,
    tables: &mut BTreeMap<String, MetadataTable>,
    mappings: &BTreeMap<String, ColumnMapping>,
    file_time_resolution: TimeResolution,
    nb_workers: usize,
    in_place: bool,
    csv_options: &CsvOptions,
) -> Result<ExtractionResults>
where
    F: Fn(&Period, &MergedUnit) -> Result<ProcessedPeriod> + Sync,
{
    let merged = merge_tables(tables, mappings, file_time_resolution, in_place)?;
    dispatch(processor, &merged, nb_workers, csv_options)
}

/// Partitions every label table and merges the blocks period by period.
pub fn merge_tables(
    tables: &mut BTreeMap<String, MetadataTable>,
    mappings: &BTreeMap<String, ColumnMapping>,
    file_time_resolution: TimeResolution,
    in_place: bool,
) -> Result<BTreeMap<Period, MergedUnit>> {
    let mut structures = BTreeMap::new();
    for (label_id, table) in tables.iter_mut() {
        let mapping = mappings.get(label_id).ok_or_else(|| {
            ExtractError::Configuration(format!("no column mapping for label '{}'", label_id))
        })?;
        let blocks = if in_place {
            build_blocks_in_place(table, mapping, file_time_resolution)?
        } else {
            build_blocks(table, mapping, file_time_resolution)?
        };
        structures.insert(label_id.clone(), blocks);
    }

    Ok(merge_blocks(structures))
}
