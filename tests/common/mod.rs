//! Shared fixtures: small NetCDF grids and variable descriptors.
#![allow(dead_code)]

use gridchannel::variable::{
    ComputedVariable, CoordinateMetadata, MultiLevelVariable, SingleLevelVariable, Variable,
    VariableCommon,
};
use ndarray::{Array1, Array3, Array4};
use netcdf::create;
use std::path::{Path, PathBuf};

pub const TIME_UNITS: &str = "hours since 2000-10-01 00:00:00";
pub const TIME_STEPS: [f64; 2] = [0.0, 6.0];
pub const LEVELS: [f64; 2] = [200.0, 500.0];

/// Latitudes 20..-20 (descending) or -20..20 (ascending), step 1
pub fn latitudes(descending: bool) -> Vec<f64> {
    let ascending: Vec<f64> = (-20..=20).map(|v| v as f64).collect();
    if descending {
        ascending.into_iter().rev().collect()
    } else {
        ascending
    }
}

/// Longitudes 0..40, step 1
pub fn longitudes() -> Vec<f64> {
    (0..=40).map(|v| v as f64).collect()
}

/// Value stored at a grid point: encodes time step, latitude and longitude.
pub fn cell_value(time_index: usize, lat: f64, lon: f64) -> f32 {
    (time_index as f64 * 10_000.0 + lat * 100.0 + lon) as f32
}

fn add_coordinates(file: &mut netcdf::FileMut, descending: bool) -> netcdf::Result<()> {
    let lats = latitudes(descending);
    let lons = longitudes();

    file.add_dimension("time", TIME_STEPS.len())?;
    file.add_dimension("latitude", lats.len())?;
    file.add_dimension("longitude", lons.len())?;

    let mut time_var = file.add_variable::<f64>("time", &["time"])?;
    time_var.put_attribute("units", TIME_UNITS)?;
    time_var.put(Array1::from(TIME_STEPS.to_vec()).view(), ..)?;

    let mut lat_var = file.add_variable::<f64>("latitude", &["latitude"])?;
    lat_var.put_attribute("units", "degrees_north")?;
    lat_var.put(Array1::from(lats).view(), ..)?;

    let mut lon_var = file.add_variable::<f64>("longitude", &["longitude"])?;
    lon_var.put_attribute("units", "degrees_east")?;
    lon_var.put(Array1::from(lons).view(), ..)?;

    Ok(())
}

/// Single-level field `msl` over (time, latitude, longitude)
pub fn create_single_level_file(path: &Path, descending: bool) -> netcdf::Result<()> {
    let lats = latitudes(descending);
    let lons = longitudes();

    let mut file = create(path)?;
    add_coordinates(&mut file, descending)?;

    let data = Array3::from_shape_fn((TIME_STEPS.len(), lats.len(), lons.len()), |(t, j, i)| {
        cell_value(t, lats[j], lons[i])
    });
    let mut var = file.add_variable::<f32>("msl", &["time", "latitude", "longitude"])?;
    var.put_attribute("units", "Pa")?;
    var.put(data.view(), ..)?;

    Ok(())
}

/// Multi-level field `ta` over (time, level, latitude, longitude); level adds its value
pub fn create_multi_level_file(path: &Path, descending: bool) -> netcdf::Result<()> {
    let lats = latitudes(descending);
    let lons = longitudes();

    let mut file = create(path)?;
    add_coordinates(&mut file, descending)?;
    file.add_dimension("level", LEVELS.len())?;

    let mut level_var = file.add_variable::<f64>("level", &["level"])?;
    level_var.put(Array1::from(LEVELS.to_vec()).view(), ..)?;

    let data = Array4::from_shape_fn(
        (TIME_STEPS.len(), LEVELS.len(), lats.len(), lons.len()),
        |(t, l, j, i)| cell_value(t, lats[j], lons[i]) + LEVELS[l] as f32,
    );
    let mut var = file.add_variable::<f32>("ta", &["time", "level", "latitude", "longitude"])?;
    var.put(data.view(), ..)?;

    Ok(())
}

pub const PACKED_SCALE: f32 = 0.5;
pub const PACKED_OFFSET: f32 = 1000.0;
pub const PACKED_FILL: i16 = -32767;

/// Packed value before `scale_factor`/`add_offset`
pub fn packed_value(time_index: usize, lat: f64, lon: f64) -> i16 {
    (time_index as f64 * 1000.0 + lat * 10.0 + lon) as i16
}

/// Packed `i16` field `sp` with scale, offset and a fill value at (t=1, lat=4, lon=6)
pub fn create_packed_file(path: &Path) -> netcdf::Result<()> {
    let lats = latitudes(true);
    let lons = longitudes();

    let mut file = create(path)?;
    add_coordinates(&mut file, true)?;

    let data = Array3::from_shape_fn((TIME_STEPS.len(), lats.len(), lons.len()), |(t, j, i)| {
        if t == 1 && lats[j] == 4.0 && lons[i] == 6.0 {
            PACKED_FILL
        } else {
            packed_value(t, lats[j], lons[i])
        }
    });
    let mut var = file.add_variable::<i16>("sp", &["time", "latitude", "longitude"])?;
    var.put_attribute("_FillValue", PACKED_FILL)?;
    var.put_attribute("scale_factor", PACKED_SCALE)?;
    var.put_attribute("add_offset", PACKED_OFFSET)?;
    var.put(data.view(), ..)?;

    Ok(())
}

/// Field `u10` stored (time, longitude, latitude)
pub fn create_lon_first_file(path: &Path) -> netcdf::Result<()> {
    let lats = latitudes(true);
    let lons = longitudes();

    let mut file = create(path)?;
    add_coordinates(&mut file, true)?;

    let data = Array3::from_shape_fn((TIME_STEPS.len(), lons.len(), lats.len()), |(t, i, j)| {
        cell_value(t, lats[j], lons[i])
    });
    let mut var = file.add_variable::<f32>("u10", &["time", "longitude", "latitude"])?;
    var.put(data.view(), ..)?;

    Ok(())
}

pub fn common(id: &str) -> VariableCommon {
    VariableCommon {
        id: id.to_string(),
        lat: CoordinateMetadata {
            attribute_name: "latitude".to_string(),
            resolution: 1.0,
            nb_decimal: 0,
        },
        lon: CoordinateMetadata {
            attribute_name: "longitude".to_string(),
            resolution: 1.0,
            nb_decimal: 0,
        },
        time_attribute_name: "time".to_string(),
        date_template: "{year}-{month2d}-{day2d}T{hour2d}".to_string(),
    }
}

pub fn single_level(field: &str, path: &Path) -> Variable {
    Variable::SingleLevel(SingleLevelVariable {
        common: common(field),
        netcdf_attribute_name: field.to_string(),
        path_template: path.display().to_string(),
    })
}

pub fn msl(path: &Path) -> Variable {
    single_level("msl", path)
}

pub fn ta(path: &Path, level: f64) -> Variable {
    Variable::MultiLevel(MultiLevelVariable {
        common: common(&format!("ta{}", level)),
        netcdf_attribute_name: "ta".to_string(),
        path_template: path.display().to_string(),
        level,
        level_attribute_name: "level".to_string(),
    })
}

pub fn computed(id: &str, expression: &str, operands: Vec<Variable>) -> Variable {
    Variable::Computed(ComputedVariable {
        common: common(id),
        expression: expression.to_string(),
        operands,
    })
}

/// Fixture directory holding `msl.nc` (descending latitudes) and `ta.nc`
pub struct Grids {
    pub dir: tempfile::TempDir,
    pub msl_path: PathBuf,
    pub ta_path: PathBuf,
}

pub fn grids() -> Grids {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let msl_path = dir.path().join("msl.nc");
    let ta_path = dir.path().join("ta.nc");
    create_single_level_file(&msl_path, true).expect("Failed to create msl file");
    create_multi_level_file(&ta_path, true).expect("Failed to create ta file");
    Grids {
        dir,
        msl_path,
        ta_path,
    }
}
