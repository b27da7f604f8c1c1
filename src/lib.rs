//! gridchannel: channel extraction from labeled NetCDF time series
//!
//! gridchannel extracts fixed-size, georeferenced sub-regions ("channels") from
//! large gridded time series (e.g. atmospheric reanalysis fields) around labeled
//! samples, groups them into per-variable, per-period tensors, and writes them
//! next to the metadata rows they come from.
//!
//! ## Key Features
//!
//! - **Period Blocks**: samples are grouped by the period covered by one source file,
//!   so every file is opened exactly once per variable
//! - **Parallel Dispatch**: periods are processed on a dedicated Rayon pool
//! - **Region Extraction**: inclusive bounding boxes, coordinate rounding and
//!   descending latitude axes
//! - **Computed Variables**: postfix expressions over other variables
//!
//! ## Module Organization
//!
//! - [`coordinates`]: coordinate rounding and bounding boxes
//! - [`time`]: time keys, periods, date templates and CF time axes
//! - [`variable`]: variable descriptors
//! - [`metadata`]: label metadata tables and samples
//! - [`blocks`]: period partitioning and cross-label merging
//! - [`time_series`]: region extraction from NetCDF files
//! - [`computed`]: computed variable evaluation
//! - [`extraction`]: period dispatch and persistence
//! - [`channel`]: the per-variable channel extraction pipeline
//! - [`netcdf_io`]: metadata and data block files
//! - [`config`]: extraction job descriptors
//! - [`parallel`]: worker pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gridchannel::prelude::*;
//!
//! let config = ExtractionConfig::from_json_file("2000_10_extraction_config.json").unwrap();
//! let results = gridchannel::channel::extract_channels(&config).unwrap();
//! for (variable, periods) in &results {
//!     println!("{}: {} periods", variable, periods.len());
//! }
//! ```

pub mod blocks;
pub mod channel;
pub mod computed;
pub mod config;
pub mod coordinates;
pub mod errors;
pub mod extraction;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod time;
pub mod time_series;
pub mod variable;

pub use errors::{ExtractError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::blocks::{build_blocks, build_blocks_in_place, merge_blocks, Block, MergedUnit};
    pub use crate::channel::{extract_channels, ChannelProcessor};
    pub use crate::config::{ExtractionConfig, LabelConfig};
    pub use crate::coordinates::{HalfExtents, BoundingBox};
    pub use crate::errors::{ExtractError, Result};
    pub use crate::extraction::{dispatch, extract, ExtractionResult, ExtractionResults, ProcessedPeriod};
    pub use crate::metadata::{ColumnMapping, MetadataTable, Sample};
    pub use crate::netcdf_io::CsvOptions;
    pub use crate::parallel::ParallelConfig;
    pub use crate::time::{Period, TimeKey, TimeResolution};
    pub use crate::time_series::{ExtractionParams, Region, TimeSeries};
    pub use crate::variable::{ComputedVariable, MultiLevelVariable, SingleLevelVariable, Variable};
}
