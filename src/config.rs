//! Extraction job descriptors
//!
//! Jobs are described in JSON: the ordered variables to extract, the labels
//! with the location and layout of their metadata tables, the output
//! directories and the parallelism settings.

use crate::coordinates::HalfExtents;
use crate::errors::{ExtractError, Result};
use crate::metadata::ColumnMapping;
use crate::netcdf_io::CsvOptions;
use crate::parallel::ParallelConfig;
use crate::time::TimeResolution;
use crate::variable::Variable;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

fn default_db_separator() -> char {
    ','
}

fn default_batch_size() -> usize {
    12
}

fn default_round_coordinates() -> bool {
    true
}

/// A classification label and its metadata table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    pub id: String,
    /// Numerical value encoding the label in tensors
    pub num_id: f64,
    pub display_name: String,
    pub db_file_path: PathBuf,
    #[serde(default = "default_db_separator")]
    pub db_separator: char,
    #[serde(default)]
    pub db_mapping: ColumnMapping,
}

/// A whole extraction job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub id: String,
    /// Ordered: one channel per variable
    pub variables: Vec<Variable>,
    pub labels: Vec<LabelConfig>,
    /// Period covered by one source file
    pub file_time_resolution: TimeResolution,
    pub half_extents: HalfExtents,
    pub channel_dir: PathBuf,
    pub tensor_dir: PathBuf,
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,
    /// Number of periods dispatched per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 0 or 1: sequential
    #[serde(default)]
    pub nb_workers: usize,
    #[serde(default)]
    pub csv_options: CsvOptions,
    #[serde(default = "default_round_coordinates")]
    pub round_coordinates: bool,
}

impl ExtractionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn parallel_config(&self) -> ParallelConfig {
        ParallelConfig::with_threads(self.nb_workers)
    }

    /// Checks the job is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            return Err(config_error(format!("job '{}' has no variable", self.id)));
        }
        if self.labels.is_empty() {
            return Err(config_error(format!("job '{}' has no label", self.id)));
        }
        if self.batch_size == 0 {
            return Err(config_error("batch_size must be positive"));
        }
        if !(self.half_extents.lat > 0.0 && self.half_extents.lon > 0.0) {
            return Err(config_error(format!(
                "half extents must be positive, got {:?}",
                self.half_extents
            )));
        }
        self.csv_options.normalized()?;

        let mut label_ids = HashSet::new();
        for label in &self.labels {
            if !label_ids.insert(label.id.as_str()) {
                return Err(config_error(format!("duplicated label '{}'", label.id)));
            }
        }

        let mut variable_ids = HashSet::new();
        for variable in &self.variables {
            variable.validate()?;
            if !variable_ids.insert(variable.id()) {
                return Err(config_error(format!("duplicated variable '{}'", variable.id())));
            }
            let common = variable.common();
            for (half_extent, coordinate) in [
                (self.half_extents.lat, &common.lat),
                (self.half_extents.lon, &common.lon),
            ] {
                let cells = 2.0 * half_extent / coordinate.resolution;
                if (cells - cells.round()).abs() > 1e-6 {
                    return Err(config_error(format!(
                        "variable '{}': half extent {} is not a multiple of half the resolution {} of '{}'",
                        common.id, half_extent, coordinate.resolution, coordinate.attribute_name
                    )));
                }
            }
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> ExtractError {
    ExtractError::Configuration(message.into())
}
