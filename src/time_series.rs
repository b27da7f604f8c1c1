//! Region extraction from NetCDF time series
//!
//! A [`TimeSeries`] holds the open source files of one variable for one period.
//! It is opened once and reused for every sample of the period, then dropped,
//! which closes the underlying NetCDF handles. Coordinate and time axes are
//! read from a file the first time a sample needs them.

use crate::computed;
use crate::coordinates::{
    expected_cells, find_index, is_descending, round_nearest, select_range, BoundingBox,
    HalfExtents,
};
use crate::errors::{ExtractError, Result};
use crate::time::{parse_timestamp, render_template, TimeAxis, TimeKey};
use crate::variable::{Variable, VariableCommon};
use ndarray::Array2;
use netcdf::{AttributeValue, File};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

/// Extracted sub-array (latitude x longitude), without coordinate labels
pub type Region = Array2<f32>;

/// Where and how to extract one region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionParams {
    pub time: TimeKey,
    pub lat: f64,
    pub lon: f64,
    pub half_extents: HalfExtents,
    /// Snap the center to the variable's grid before computing the window
    pub round: bool,
}

impl ExtractionParams {
    pub fn new(time: TimeKey, lat: f64, lon: f64, half_extents: HalfExtents) -> Self {
        Self {
            time,
            lat,
            lon,
            half_extents,
            round: true,
        }
    }

    pub fn without_rounding(mut self) -> Self {
        self.round = false;
        self
    }
}

struct SourceFile {
    path: PathBuf,
    file: File,
}

/// Coordinate values read once per open series
#[derive(Default)]
struct AxisCache {
    /// Keyed by (source index, coordinate variable name)
    coordinates: HashMap<(usize, String), Rc<[f64]>>,
    /// Time axis and its raw values, keyed like `coordinates`
    times: HashMap<(usize, String), Rc<(TimeAxis, Vec<f64>)>>,
}

/// Open NetCDF source files of a variable, possibly spread over several files
pub struct TimeSeries {
    variable_id: String,
    sources: Vec<SourceFile>,
    axes: RefCell<AxisCache>,
}

impl std::fmt::Debug for TimeSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSeries")
            .field("variable_id", &self.variable_id)
            .field("paths", &self.paths())
            .finish()
    }
}

impl TimeSeries {
    /// Opens the files holding `variable` for the period of `time`.
    pub fn open(variable: &Variable, time: &TimeKey) -> Result<Self> {
        let paths = variable.source_paths(time)?;
        Self::open_paths(variable.id(), paths)
    }

    pub fn open_paths(variable_id: &str, paths: Vec<PathBuf>) -> Result<Self> {
        if paths.is_empty() {
            return Err(ExtractError::SourceUnavailable {
                paths,
                message: format!("no source file for variable '{}'", variable_id),
            });
        }

        info!(variable = variable_id, paths = ?paths, "opening netcdf files");
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            // Handles opened so far are dropped with `sources` on failure.
            let file = netcdf::open(&path).map_err(|e| ExtractError::SourceUnavailable {
                paths: vec![path.clone()],
                message: e.to_string(),
            })?;
            sources.push(SourceFile { path, file });
        }

        Ok(Self {
            variable_id: variable_id.to_string(),
            sources,
            axes: RefCell::new(AxisCache::default()),
        })
    }

    pub fn variable_id(&self) -> &str {
        &self.variable_id
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.sources.iter().map(|s| s.path.as_path()).collect()
    }

    /// Closes the source files.
    pub fn close(self) {
        debug!(variable = %self.variable_id, "closing netcdf files");
    }

    /// Extracts the region centered on (`lat`, `lon`), rounding the center to the grid.
    pub fn extract_region(
        &self,
        variable: &Variable,
        time: &TimeKey,
        lat: f64,
        lon: f64,
        half_extents: HalfExtents,
    ) -> Result<Region> {
        self.extract(variable, &ExtractionParams::new(*time, lat, lon, half_extents))
    }

    /// Extracts the region of any kind of variable.
    pub fn extract(&self, variable: &Variable, params: &ExtractionParams) -> Result<Region> {
        debug!(
            variable = variable.id(),
            kind = variable.kind(),
            lat = params.lat,
            lon = params.lon,
            "extracting subregion"
        );
        match variable {
            Variable::SingleLevel(_) | Variable::MultiLevel(_) => {
                self.extract_direct(variable, params)
            }
            Variable::Computed(computed) => computed::evaluate(self, computed, params),
        }
    }

    /// Extracts a single-level or multi-level variable from its source field.
    pub(crate) fn extract_direct(
        &self,
        variable: &Variable,
        params: &ExtractionParams,
    ) -> Result<Region> {
        let (common, field, level) = match variable {
            Variable::SingleLevel(v) => (&v.common, v.netcdf_attribute_name.as_str(), None),
            Variable::MultiLevel(v) => (
                &v.common,
                v.netcdf_attribute_name.as_str(),
                Some((v.level, v.level_attribute_name.as_str())),
            ),
            Variable::Computed(v) => {
                return Err(ExtractError::Configuration(format!(
                    "unsupported direct extraction for computed variable '{}'",
                    v.common.id
                )))
            }
        };

        let (source_index, var) = self.find_field(field)?;
        let lat_axis = self.coordinate_axis(source_index, common, &common.lat.attribute_name)?;
        let lon_axis = self.coordinate_axis(source_index, common, &common.lon.attribute_name)?;

        let (lat, lon) = if params.round {
            (
                round_nearest(params.lat, common.lat.resolution, common.lat.nb_decimal),
                round_nearest(params.lon, common.lon.resolution, common.lon.nb_decimal),
            )
        } else {
            (params.lat, params.lon)
        };

        let bbox = BoundingBox::around(
            lat,
            lon,
            params.half_extents,
            common.lat.resolution,
            common.lon.resolution,
        );
        let expected = (
            expected_cells(params.half_extents.lat, common.lat.resolution),
            expected_cells(params.half_extents.lon, common.lon.resolution),
        );
        let incomplete = |actual: (usize, usize)| ExtractError::IncompleteRegion {
            var: common.id.clone(),
            lat,
            lon,
            expected,
            actual,
        };

        let lat_descending = is_descending(&lat_axis);
        if lat_descending {
            debug!("switching lat min and max");
        }
        let (lat_start, lat_stop) = bbox.lat_selection(lat_descending);
        let (lon_start, lon_stop) = bbox.lon_selection(is_descending(&lon_axis));
        let lat_range = select_range(&lat_axis, lat_start, lat_stop, common.lat.resolution * 1e-3)
            .unwrap_or(0..0);
        let lon_range = select_range(&lon_axis, lon_start, lon_stop, common.lon.resolution * 1e-3)
            .unwrap_or(0..0);
        if (lat_range.len(), lon_range.len()) != expected {
            return Err(incomplete((lat_range.len(), lon_range.len())));
        }

        let time_index = self.time_index(source_index, common, &params.time)?;
        let level_index = match level {
            Some((value, name)) => {
                let levels = self.coordinate_axis(source_index, common, name)?;
                Some(
                    find_index(&levels, value, 1e-6).ok_or_else(|| ExtractError::LevelNotFound {
                        var: common.id.clone(),
                        level: value,
                    })?,
                )
            }
            None => None,
        };

        let mut ranges: Vec<Range<usize>> = Vec::new();
        let mut lat_position = None;
        let mut lon_position = None;
        for (i, dim) in var.dimensions().iter().enumerate() {
            let name = dim.name();
            let range = if name == common.lat.attribute_name {
                lat_position = Some(i);
                lat_range.clone()
            } else if name == common.lon.attribute_name {
                lon_position = Some(i);
                lon_range.clone()
            } else if name == common.time_attribute_name {
                time_index..time_index + 1
            } else if let (Some(index), Some((_, level_name))) = (level_index, level) {
                if name != level_name {
                    return Err(unexpected_dimension(common, &name));
                }
                index..index + 1
            } else if dim.len() == 1 {
                0..1
            } else {
                return Err(unexpected_dimension(common, &name));
            };
            ranges.push(range);
        }

        let (lat_position, lon_position) = match (lat_position, lon_position) {
            (Some(lat_pos), Some(lon_pos)) => (lat_pos, lon_pos),
            _ => {
                return Err(ExtractError::CoordinateNotFound {
                    var: common.id.clone(),
                    name: format!(
                        "{}/{}",
                        common.lat.attribute_name, common.lon.attribute_name
                    ),
                    message: format!("'{}' is not defined over both axes", field),
                })
            }
        };

        let mut values = read_hyperslab(&var, &ranges)?;
        unpack(&var, &mut values);

        let region = if lat_position < lon_position {
            Array2::from_shape_vec(expected, values)?
        } else {
            Array2::from_shape_vec((expected.1, expected.0), values)?
                .reversed_axes()
                .as_standard_layout()
                .into_owned()
        };

        Ok(region)
    }

    fn find_field(&self, field: &str) -> Result<(usize, netcdf::Variable<'_>)> {
        self.sources
            .iter()
            .enumerate()
            .find_map(|(i, source)| source.file.variable(field).map(|var| (i, var)))
            .ok_or_else(|| ExtractError::VariableNotFound {
                var: field.to_string(),
                paths: self.sources.iter().map(|s| s.path.clone()).collect(),
            })
    }

    fn coordinate_axis(
        &self,
        source_index: usize,
        common: &VariableCommon,
        name: &str,
    ) -> Result<Rc<[f64]>> {
        let key = (source_index, name.to_string());
        let cached = self.axes.borrow().coordinates.get(&key).map(Rc::clone);
        if let Some(axis) = cached {
            return Ok(axis);
        }

        let axis: Rc<[f64]> = read_axis(&self.sources[source_index].file, common, name)?.into();
        self.axes
            .borrow_mut()
            .coordinates
            .insert(key, Rc::clone(&axis));
        Ok(axis)
    }

    fn time_index(
        &self,
        source_index: usize,
        common: &VariableCommon,
        time: &TimeKey,
    ) -> Result<usize> {
        let date = render_template(&common.date_template, time)?;
        let target = parse_timestamp(&date).ok_or_else(|| {
            ExtractError::Configuration(format!(
                "date template '{}' renders to unparsable date '{}'",
                common.date_template, date
            ))
        })?;

        let key = (source_index, common.time_attribute_name.clone());
        let cached = self.axes.borrow().times.get(&key).map(Rc::clone);
        let steps = match cached {
            Some(steps) => steps,
            None => {
                let steps = Rc::new(read_time_axis(&self.sources[source_index].file, common)?);
                self.axes.borrow_mut().times.insert(key, Rc::clone(&steps));
                steps
            }
        };

        let (axis, values) = steps.as_ref();
        axis.position(values, target)
            .ok_or_else(|| ExtractError::TimeNotFound {
                var: common.id.clone(),
                date,
            })
    }
}

fn unexpected_dimension(common: &VariableCommon, name: &str) -> ExtractError {
    ExtractError::CoordinateNotFound {
        var: common.id.clone(),
        name: name.to_string(),
        message: "unexpected dimension".to_string(),
    }
}

fn read_axis(file: &File, common: &VariableCommon, name: &str) -> Result<Vec<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| ExtractError::CoordinateNotFound {
            var: common.id.clone(),
            name: name.to_string(),
            message: "missing coordinate variable".to_string(),
        })?;
    Ok(var.get_values::<f64, _>(..)?)
}

fn read_time_axis(file: &File, common: &VariableCommon) -> Result<(TimeAxis, Vec<f64>)> {
    let var = file
        .variable(&common.time_attribute_name)
        .ok_or_else(|| ExtractError::CoordinateNotFound {
            var: common.id.clone(),
            name: common.time_attribute_name.clone(),
            message: "missing time variable".to_string(),
        })?;
    let units = var
        .attribute("units")
        .and_then(|attr| match attr.value().ok()? {
            AttributeValue::Str(units) => Some(units),
            _ => None,
        })
        .ok_or_else(|| ExtractError::CoordinateNotFound {
            var: common.id.clone(),
            name: common.time_attribute_name.clone(),
            message: "missing units attribute".to_string(),
        })?;

    let axis = TimeAxis::from_units(&units)?;
    let values = var.get_values::<f64, _>(..)?;
    Ok((axis, values))
}

fn read_hyperslab(var: &netcdf::Variable, ranges: &[Range<usize>]) -> Result<Vec<f32>> {
    let values = match ranges {
        [a, b] => var.get_values::<f32, _>((a.clone(), b.clone()))?,
        [a, b, c] => var.get_values::<f32, _>((a.clone(), b.clone(), c.clone()))?,
        [a, b, c, d] => {
            var.get_values::<f32, _>((a.clone(), b.clone(), c.clone(), d.clone()))?
        }
        _ => {
            return Err(ExtractError::Configuration(format!(
                "unsupported number of dimensions for extraction: {}",
                ranges.len()
            )))
        }
    };
    Ok(values)
}

fn numeric_attribute(var: &netcdf::Variable, name: &str) -> Option<f32> {
    var.attribute(name).and_then(|attr| match attr.value().ok()? {
        AttributeValue::Float(v) => Some(v),
        AttributeValue::Double(v) => Some(v as f32),
        AttributeValue::Short(v) => Some(v as f32),
        AttributeValue::Int(v) => Some(v as f32),
        _ => None,
    })
}

/// Applies `scale_factor`/`add_offset` and turns fill values into NaN.
fn unpack(var: &netcdf::Variable, values: &mut [f32]) {
    let fill_values: Vec<f32> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| numeric_attribute(var, name))
        .collect();
    let scale = numeric_attribute(var, "scale_factor").unwrap_or(1.0);
    let offset = numeric_attribute(var, "add_offset").unwrap_or(0.0);

    for value in values.iter_mut() {
        *value = if fill_values.contains(value) {
            f32::NAN
        } else {
            *value * scale + offset
        };
    }
}
