//! Coordinate rounding and bounding-box arithmetic
//!
//! Grid coordinates are snapped to the nearest sample of the variable's grid
//! before a window is computed around them. Windows use inclusive bounds on
//! both ends, so the box is shifted by one resolution step on one side to
//! produce exactly `2h / r` cells per axis.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Rounds `value` to the nearest multiple of `resolution`, keeping `nb_decimal` decimals.
///
/// The decimal rounding removes the floating point noise left by the
/// multiplication (e.g. `39.750000000001`).
pub fn round_nearest(value: f64, resolution: f64, nb_decimal: u32) -> f64 {
    let snapped = (value / resolution).round() * resolution;
    round_decimals(snapped, nb_decimal)
}

fn round_decimals(value: f64, nb_decimal: u32) -> f64 {
    let factor = 10f64.powi(nb_decimal as i32);
    (value * factor).round() / factor
}

/// Number of grid cells covered by a window of half-extent `half_extent`.
pub fn expected_cells(half_extent: f64, resolution: f64) -> usize {
    (2.0 * half_extent / resolution).round() as usize
}

/// Half height and half width of an extraction window, in coordinate units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HalfExtents {
    pub lat: f64,
    pub lon: f64,
}

impl HalfExtents {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Square window: same half-extent on both axes
    pub fn square(half_extent: f64) -> Self {
        Self {
            lat: half_extent,
            lon: half_extent,
        }
    }

    pub fn is_square(&self) -> bool {
        self.lat == self.lon
    }
}

/// Inclusive bounds of an extraction window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Window centered on (`lat`, `lon`).
    ///
    /// The upper latitude bound and the lower longitude bound are kept, the
    /// opposite bounds are moved inward by one resolution step.
    pub fn around(
        lat: f64,
        lon: f64,
        half_extents: HalfExtents,
        lat_resolution: f64,
        lon_resolution: f64,
    ) -> Self {
        Self {
            lat_min: lat - half_extents.lat + lat_resolution,
            lat_max: lat + half_extents.lat,
            lon_min: lon - half_extents.lon,
            lon_max: lon + half_extents.lon - lon_resolution,
        }
    }

    /// Latitude selection bounds in the axis orientation: (start, stop).
    pub fn lat_selection(&self, descending: bool) -> (f64, f64) {
        if descending {
            (self.lat_max, self.lat_min)
        } else {
            (self.lat_min, self.lat_max)
        }
    }

    /// Longitude selection bounds in the axis orientation: (start, stop).
    pub fn lon_selection(&self, descending: bool) -> (f64, f64) {
        if descending {
            (self.lon_max, self.lon_min)
        } else {
            (self.lon_min, self.lon_max)
        }
    }
}

/// True when the axis values decrease from first to last element.
pub fn is_descending(axis: &[f64]) -> bool {
    match (axis.first(), axis.last()) {
        (Some(first), Some(last)) => first > last,
        _ => false,
    }
}

/// Inclusive label-based selection on a monotonic axis.
///
/// `start` and `stop` are given in the axis orientation (`start <= stop` for an
/// ascending axis, `start >= stop` for a descending one). Returns the index range
/// of the selected values, or `None` if no value falls between the bounds.
pub fn select_range(axis: &[f64], start: f64, stop: f64, tolerance: f64) -> Option<Range<usize>> {
    let descending = is_descending(axis);
    let inside = |value: f64| {
        if descending {
            value <= start + tolerance && value >= stop - tolerance
        } else {
            value >= start - tolerance && value <= stop + tolerance
        }
    };

    let first = axis.iter().position(|&v| inside(v))?;
    let len = axis[first..].iter().take_while(|&&v| inside(v)).count();
    Some(first..first + len)
}

/// Index of the axis value matching `value` within `tolerance`.
pub fn find_index(axis: &[f64], value: f64, tolerance: f64) -> Option<usize> {
    axis.iter().position(|&v| (v - value).abs() <= tolerance)
}
