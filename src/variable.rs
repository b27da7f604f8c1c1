//! Variable descriptors
//!
//! A variable is either read directly from a field of the source files
//! (single-level or multi-level) or computed from other variables with a
//! postfix arithmetic expression. The set of kinds is closed: every operation
//! matches on [`Variable`] exhaustively.

use crate::computed::RpnToken;
use crate::errors::{ExtractError, Result};
use crate::time::{render_template, TimeKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

fn default_time_attribute_name() -> String {
    "time".to_string()
}

fn default_level_attribute_name() -> String {
    "level".to_string()
}

/// How to find and round one coordinate of a variable's grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateMetadata {
    /// Name of the coordinate variable (and dimension) in the source files
    pub attribute_name: String,
    /// Grid spacing in coordinate units
    pub resolution: f64,
    /// Decimal precision used when rounding to the grid
    pub nb_decimal: u32,
}

/// Attributes shared by every kind of variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableCommon {
    pub id: String,
    pub lat: CoordinateMetadata,
    pub lon: CoordinateMetadata,
    #[serde(default = "default_time_attribute_name")]
    pub time_attribute_name: String,
    /// Rendered with the sample time key to select the time step, e.g. `{year}-{month2d}-{day2d}T{hour2d}`
    pub date_template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleLevelVariable {
    #[serde(flatten)]
    pub common: VariableCommon,
    pub netcdf_attribute_name: String,
    /// Source file path, rendered with the sample time key
    pub path_template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLevelVariable {
    #[serde(flatten)]
    pub common: VariableCommon,
    pub netcdf_attribute_name: String,
    pub path_template: String,
    pub level: f64,
    #[serde(default = "default_level_attribute_name")]
    pub level_attribute_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedVariable {
    #[serde(flatten)]
    pub common: VariableCommon,
    /// Postfix expression over operand ids, e.g. `u10 2 ^ v10 2 ^ + 0.5 ^`
    pub expression: String,
    pub operands: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Variable {
    SingleLevel(SingleLevelVariable),
    MultiLevel(MultiLevelVariable),
    Computed(ComputedVariable),
}

impl Variable {
    pub fn common(&self) -> &VariableCommon {
        match self {
            Variable::SingleLevel(v) => &v.common,
            Variable::MultiLevel(v) => &v.common,
            Variable::Computed(v) => &v.common,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Variable::SingleLevel(_) => "single_level",
            Variable::MultiLevel(_) => "multi_level",
            Variable::Computed(_) => "computed",
        }
    }

    /// Source files holding the data of this variable for the given time key.
    ///
    /// A computed variable needs the files of all its operands; duplicates are
    /// removed, first occurrence order is kept.
    pub fn source_paths(&self, time: &TimeKey) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        self.collect_source_paths(time, &mut paths)?;
        Ok(paths)
    }

    fn collect_source_paths(&self, time: &TimeKey, paths: &mut Vec<PathBuf>) -> Result<()> {
        match self {
            Variable::SingleLevel(v) => push_unique(paths, render_template(&v.path_template, time)?),
            Variable::MultiLevel(v) => push_unique(paths, render_template(&v.path_template, time)?),
            Variable::Computed(v) => {
                for operand in &v.operands {
                    operand.collect_source_paths(time, paths)?;
                }
            }
        }
        Ok(())
    }

    /// Checks resolutions and, for computed variables, the expression's identifiers.
    pub fn validate(&self) -> Result<()> {
        let common = self.common();
        for coordinate in [&common.lat, &common.lon] {
            if !(coordinate.resolution > 0.0) {
                return Err(ExtractError::Configuration(format!(
                    "variable '{}': resolution of '{}' must be positive",
                    common.id, coordinate.attribute_name
                )));
            }
        }

        if let Variable::Computed(computed) = self {
            let mut ids = HashSet::new();
            for operand in &computed.operands {
                operand.validate()?;
                if !ids.insert(operand.id()) {
                    return Err(ExtractError::Configuration(format!(
                        "variable '{}': duplicated operand '{}'",
                        common.id,
                        operand.id()
                    )));
                }
            }
            for token in RpnToken::parse_expression(&computed.expression)? {
                if let RpnToken::Operand(id) = token {
                    if !ids.contains(id) {
                        return Err(ExtractError::evaluation(
                            &computed.expression,
                            format!("'{}' is not an operand of '{}'", id, common.id),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn push_unique(paths: &mut Vec<PathBuf>, rendered: String) {
    let path = PathBuf::from(rendered);
    if !paths.contains(&path) {
        paths.push(path);
    }
}
