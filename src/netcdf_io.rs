//! Persistence of extraction blocks
//!
//! Each (period, label) pair produces two files: the metadata block as
//! delimited text and the stacked regions as a NetCDF array.

use crate::blocks::Block;
use crate::errors::{ExtractError, Result};
use chrono::Utc;
use ndarray::ArrayD;
use netcdf::{create, AttributeValue};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const CSV_FILE_EXTENSION: &str = "csv";
pub const NETCDF_FILE_EXTENSION: &str = "nc";
pub const DATA_VARIABLE_NAME: &str = "data";

const METADATA_HEADER: [&str; 7] = ["index", "year", "month", "day", "hour", "lat", "lon"];

fn default_separator() -> char {
    ','
}

fn default_encoding() -> String {
    "utf8".to_string()
}

fn default_line_terminator() -> String {
    "\n".to_string()
}

/// Options of the metadata block files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvOptions {
    #[serde(default = "default_separator")]
    pub separator: char,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_line_terminator")]
    pub line_terminator: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            encoding: default_encoding(),
            line_terminator: default_line_terminator(),
        }
    }
}

impl CsvOptions {
    /// Checks the encoding and turns escaped terminators (`\\n`, `\\r\\n`) into real ones.
    pub fn normalized(&self) -> Result<Self> {
        match self.encoding.to_ascii_lowercase().replace('-', "").as_str() {
            "utf8" => {}
            other => {
                return Err(ExtractError::Configuration(format!(
                    "unsupported metadata encoding '{}' (only utf8 is supported)",
                    other
                )))
            }
        }

        let line_terminator = self
            .line_terminator
            .replace("\\r", "\r")
            .replace("\\n", "\n");
        if line_terminator.is_empty() {
            return Err(ExtractError::Configuration(
                "empty metadata line terminator".to_string(),
            ));
        }

        Ok(Self {
            separator: self.separator,
            encoding: self.encoding.clone(),
            line_terminator,
        })
    }
}

/// Writes the samples of `block` as a delimited text file.
pub fn write_metadata_block(path: &Path, block: &Block, options: &CsvOptions) -> Result<()> {
    let separator = options.separator.to_string();
    let mut writer = BufWriter::new(fs::File::create(path)?);

    write!(writer, "{}{}", METADATA_HEADER.join(&separator), options.line_terminator)?;
    for sample in block.samples() {
        let cells = [
            sample.index.to_string(),
            sample.time.year.to_string(),
            sample.time.month.to_string(),
            sample.time.day.to_string(),
            sample.time.hour.to_string(),
            sample.lat.to_string(),
            sample.lon.to_string(),
        ];
        write!(writer, "{}{}", cells.join(&separator), options.line_terminator)?;
    }
    writer.flush()?;

    Ok(())
}

/// NetCDF writer for stacked region arrays
pub struct DataBlockWriter<'a> {
    output_path: &'a Path,
    attributes: Vec<(&'a str, String)>,
}

impl<'a> DataBlockWriter<'a> {
    pub fn new(output_path: &'a Path) -> Self {
        Self {
            output_path,
            attributes: Vec::new(),
        }
    }

    /// Adds a global string attribute (label, period, variable, ...)
    pub fn with_attribute(mut self, name: &'a str, value: impl Into<String>) -> Self {
        self.attributes.push((name, value.into()));
        self
    }

    /// Dimension names: `sample, lat, lon` for stacked regions, `dim_N` otherwise
    fn dimension_names(ndim: usize) -> Vec<String> {
        match ndim {
            2 => vec!["lat".to_string(), "lon".to_string()],
            3 => vec!["sample".to_string(), "lat".to_string(), "lon".to_string()],
            _ => (0..ndim).map(|i| format!("dim_{}", i)).collect(),
        }
    }

    pub fn write(&self, data: &ArrayD<f32>) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }

        let mut file = create(self.output_path)?;

        let dim_names = Self::dimension_names(data.ndim());
        for (dim_name, &dim_len) in dim_names.iter().zip(data.shape()) {
            file.add_dimension(dim_name, dim_len)?;
        }

        let dim_refs: Vec<&str> = dim_names.iter().map(|s| s.as_str()).collect();
        let mut var = file.add_variable::<f32>(DATA_VARIABLE_NAME, &dim_refs)?;
        var.put_attribute("_FillValue", f32::NAN)?;
        if !data.is_empty() {
            var.put(data.view(), ..)?;
        }

        for (name, value) in &self.attributes {
            file.add_attribute(name, value.as_str())?;
        }
        file.add_attribute(
            "history",
            format!("Created by gridchannel on {}", Utc::now().to_rfc3339()),
        )?;

        Ok(())
    }
}

/// Reads back an array written by [`DataBlockWriter`].
pub fn read_data_block(path: &Path) -> Result<ArrayD<f32>> {
    let file = netcdf::open(path)?;
    let var = file
        .variable(DATA_VARIABLE_NAME)
        .ok_or_else(|| ExtractError::VariableNotFound {
            var: DATA_VARIABLE_NAME.to_string(),
            paths: vec![path.to_path_buf()],
        })?;

    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    if shape.iter().any(|&len| len == 0) {
        return Ok(ArrayD::zeros(shape));
    }
    let values = var.get_values::<f32, _>(..)?;
    Ok(ArrayD::from_shape_vec(shape, values)?)
}

/// Global string attribute of a data block file
pub fn read_data_block_attribute(path: &Path, name: &str) -> Result<Option<String>> {
    let file = netcdf::open(path)?;
    let value = file.attribute(name).and_then(|attr| match attr.value().ok()? {
        AttributeValue::Str(value) => Some(value),
        _ => None,
    });
    Ok(value)
}
