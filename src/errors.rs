//! Centralized error handling for gridchannel
//!
//! Every fallible operation of the crate returns [`Result`], whose error type
//! [`ExtractError`] covers configuration mistakes, source file problems,
//! expression evaluation failures and persistence errors.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for extraction operations
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Unrecognized or inconsistent configuration (time resolution, options, descriptors)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// Source data file(s) missing or impossible to open
    #[error("Unable to open source file(s) {paths:?}: {message}")]
    SourceUnavailable { paths: Vec<PathBuf>, message: String },

    /// Variable not present in any of the opened source files
    #[error("Variable '{var}' not found in {paths:?}")]
    VariableNotFound { var: String, paths: Vec<PathBuf> },

    /// Coordinate variable missing or unusable
    #[error("Coordinate '{name}' unusable for variable '{var}': {message}")]
    CoordinateNotFound {
        var: String,
        name: String,
        message: String,
    },

    /// No time step matches the rendered date template
    #[error("Time '{date}' not found for variable '{var}'")]
    TimeNotFound { var: String, date: String },

    /// No vertical level matches the requested one
    #[error("Level {level} not found for variable '{var}'")]
    LevelNotFound { var: String, level: f64 },

    /// Extraction window leaves the grid
    #[error(
        "Incomplete region for variable '{var}' at ({lat}, {lon}): expected {expected:?}, got {actual:?}"
    )]
    IncompleteRegion {
        var: String,
        lat: f64,
        lon: f64,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Malformed computed variable expression
    #[error("Evaluation error in expression '{expression}': {message}")]
    Evaluation { expression: String, message: String },

    /// Malformed label metadata table
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// A processing callback produced data for a label without block in the period
    #[error("No metadata block for label '{label}' in period {period}")]
    MissingBlock { label: String, period: String },

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    Array(#[from] ndarray::ShapeError),

    /// Descriptor or index (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl ExtractError {
    pub(crate) fn evaluation(expression: &str, message: impl Into<String>) -> Self {
        ExtractError::Evaluation {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;
