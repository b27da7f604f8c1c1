//! Channel extraction pipeline
//!
//! A channel is the stack of regions of one variable around every sample of a
//! label. For each variable the periods are dispatched in batches; each period
//! opens the variable's source files once and extracts all its samples.

use crate::blocks::MergedUnit;
use crate::config::ExtractionConfig;
use crate::coordinates::HalfExtents;
use crate::errors::Result;
use crate::extraction::{dispatch_units, merge_tables, ExtractionResults, ProcessedPeriod};
use crate::metadata::{ColumnMapping, MetadataTable};
use crate::time::Period;
use crate::time_series::{ExtractionParams, Region, TimeSeries};
use crate::variable::Variable;
use ndarray::{stack, ArrayView2, Axis};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const INDEX_FILE_NAME: &str = "index.json";

/// Processing callback extracting one variable for every sample of a period
#[derive(Debug, Clone)]
pub struct ChannelProcessor<'a> {
    variable: &'a Variable,
    half_extents: HalfExtents,
    channel_dir: &'a Path,
    round: bool,
}

impl<'a> ChannelProcessor<'a> {
    pub fn new(variable: &'a Variable, half_extents: HalfExtents, channel_dir: &'a Path) -> Self {
        Self {
            variable,
            half_extents,
            channel_dir,
            round: true,
        }
    }

    pub fn with_rounding(mut self, round: bool) -> Self {
        self.round = round;
        self
    }

    pub fn output_prefix(&self) -> PathBuf {
        self.channel_dir.join(self.variable.id())
    }

    /// Extracts and stacks the regions of every label of the unit.
    ///
    /// The resulting arrays have shape `(samples, lat, lon)`, samples in block order.
    pub fn process(&self, period: &Period, unit: &MergedUnit) -> Result<ProcessedPeriod> {
        let mut processed = ProcessedPeriod {
            output_prefix: self.output_prefix(),
            data_blocks: Vec::with_capacity(unit.len()),
        };

        // Every sample of the period lives in the same source files.
        let first = match unit.values().find_map(|block| block.samples().first()) {
            Some(sample) => sample,
            None => return Ok(processed),
        };
        let time_series = TimeSeries::open(self.variable, &first.time)?;

        for (label_id, block) in unit {
            let mut regions: Vec<Region> = Vec::with_capacity(block.len());
            for sample in block.samples() {
                let mut params =
                    ExtractionParams::new(sample.time, sample.lat, sample.lon, self.half_extents);
                params.round = self.round;
                let region = time_series.extract(self.variable, &params).map_err(|e| {
                    error!(
                        period = %period,
                        label = %label_id,
                        variable = self.variable.id(),
                        index = sample.index,
                        error = %e,
                        "region extraction failed"
                    );
                    e
                })?;
                regions.push(region);
            }

            let views: Vec<ArrayView2<f32>> = regions.iter().map(|r| r.view()).collect();
            let stacked = stack(Axis(0), &views)?;
            processed
                .data_blocks
                .push((label_id.clone(), stacked.into_dyn()));
        }

        time_series.close();
        Ok(processed)
    }
}

/// Loads the label tables of the job and merges them period by period.
pub fn plan(config: &ExtractionConfig) -> Result<BTreeMap<Period, MergedUnit>> {
    let mut tables = BTreeMap::new();
    let mut mappings: BTreeMap<String, ColumnMapping> = BTreeMap::new();
    for label in &config.labels {
        info!(label = %label.id, path = %label.db_file_path.display(), "loading label table");
        let table = MetadataTable::from_path(&label.db_file_path, label.db_separator)?;
        tables.insert(label.id.clone(), table);
        mappings.insert(label.id.clone(), label.db_mapping.clone());
    }

    merge_tables(&mut tables, &mappings, config.file_time_resolution, true)
}

/// Runs the whole job: one channel per variable, written under `channel_dir`.
///
/// Returns the extraction results keyed by variable id. Each variable's
/// results are also saved as `{channel_dir}/{variable}/index.json`.
pub fn extract_channels(config: &ExtractionConfig) -> Result<BTreeMap<String, ExtractionResults>> {
    config.validate()?;
    let merged = plan(config)?;
    let units: Vec<(&Period, &MergedUnit)> = merged.iter().collect();
    let pool = config.parallel_config().pool()?;

    let mut all_results = BTreeMap::new();
    for variable in &config.variables {
        info!(
            variable = variable.id(),
            periods = units.len(),
            batch_size = config.batch_size,
            "extracting channel"
        );
        let processor = ChannelProcessor::new(variable, config.half_extents, &config.channel_dir)
            .with_rounding(config.round_coordinates);

        let mut results = ExtractionResults::new();
        for (batch_index, batch) in units.chunks(config.batch_size).enumerate() {
            info!(
                variable = variable.id(),
                batch = batch_index,
                periods = batch.len(),
                "dispatching batch"
            );
            let batch_results = dispatch_units(
                |period: &Period, unit: &MergedUnit| processor.process(period, unit),
                batch,
                pool.as_ref(),
                &config.csv_options,
            )?;
            results.extend(batch_results);
        }

        write_index(&processor.output_prefix(), &results)?;
        all_results.insert(variable.id().to_string(), results);
    }

    Ok(all_results)
}

fn write_index(output_prefix: &Path, results: &ExtractionResults) -> Result<()> {
    fs::create_dir_all(output_prefix)?;
    let index_path = output_prefix.join(INDEX_FILE_NAME);
    let json = serde_json::to_string_pretty(results)?;
    fs::write(&index_path, json)?;
    info!(path = %index_path.display(), "wrote extraction index");
    Ok(())
}
