//! Label metadata tables and the samples read from them
//!
//! A label table is a delimited text file with one row per sample. Its column
//! names vary from one label source to another, so a [`ColumnMapping`] tells
//! which column holds each canonical field (year, month, day, hour, lat, lon).

use crate::errors::{ExtractError, Result};
use crate::time::TimeKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

pub const YEAR_KEY: &str = "year";
pub const MONTH_KEY: &str = "month";
pub const DAY_KEY: &str = "day";
pub const HOUR_KEY: &str = "hour";
pub const LAT_KEY: &str = "lat";
pub const LON_KEY: &str = "lon";

/// Canonical field name to actual column name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub year: String,
    pub month: String,
    pub day: String,
    pub hour: String,
    pub lat: String,
    pub lon: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self::canonical()
    }
}

impl ColumnMapping {
    /// Identity mapping: every column already carries its canonical name
    pub fn canonical() -> Self {
        Self {
            year: YEAR_KEY.to_string(),
            month: MONTH_KEY.to_string(),
            day: DAY_KEY.to_string(),
            hour: HOUR_KEY.to_string(),
            lat: LAT_KEY.to_string(),
            lon: LON_KEY.to_string(),
        }
    }

    /// (canonical, actual) pairs in canonical order
    pub fn pairs(&self) -> [(&'static str, &str); 6] {
        [
            (YEAR_KEY, self.year.as_str()),
            (MONTH_KEY, self.month.as_str()),
            (DAY_KEY, self.day.as_str()),
            (HOUR_KEY, self.hour.as_str()),
            (LAT_KEY, self.lat.as_str()),
            (LON_KEY, self.lon.as_str()),
        ]
    }
}

/// One row of label metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Row position in the source table
    pub index: usize,
    pub time: TimeKey,
    pub lat: f64,
    pub lon: f64,
}

/// In-memory delimited table with text cells
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MetadataTable {
    /// Builds a table, checking every row has one cell per column.
    pub fn from_records(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ExtractError::InvalidMetadata(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Reads a delimited table whose first line is the header.
    ///
    /// Quoted cells may hold the separator; blank lines are skipped.
    pub fn from_reader<R: Read>(reader: R, separator: char) -> Result<Self> {
        let delimiter = u8::try_from(separator).map_err(|_| {
            ExtractError::Configuration(format!(
                "separator '{}' is not a single-byte character",
                separator
            ))
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .headers()
            .map_err(metadata_error)?
            .iter()
            .map(str::to_string)
            .collect();
        if columns.is_empty() {
            return Err(ExtractError::InvalidMetadata("empty table".to_string()));
        }

        let rows = reader
            .records()
            .map(|record| {
                record
                    .map(|r| r.iter().map(str::to_string).collect::<Vec<String>>())
                    .map_err(metadata_error)
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_records(columns, rows)
    }

    pub fn from_path(path: impl AsRef<Path>, separator: char) -> Result<Self> {
        let file = fs::File::open(path.as_ref())?;
        Self::from_reader(file, separator)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Renames columns according to `renames` (old name to new name).
    pub fn rename_columns(&mut self, renames: &HashMap<String, String>) {
        for column in self.columns.iter_mut() {
            if let Some(new_name) = renames.get(column.as_str()) {
                *column = new_name.clone();
            }
        }
    }

    /// Renames the mapped columns to their canonical names.
    pub fn rename_to_canonical(&mut self, mapping: &ColumnMapping) {
        let renames: HashMap<String, String> = mapping
            .pairs()
            .iter()
            .map(|(canonical, actual)| (actual.to_string(), canonical.to_string()))
            .collect();
        self.rename_columns(&renames);
    }

    /// Reads every row as a [`Sample`].
    pub fn samples(&self, mapping: &ColumnMapping) -> Result<Vec<Sample>> {
        let columns = SampleColumns::resolve(self, mapping)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| columns.read(index, row))
            .collect()
    }
}

fn metadata_error(err: csv::Error) -> ExtractError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => ExtractError::Io(e),
        kind => ExtractError::InvalidMetadata(format!("{:?}", kind)),
    }
}

struct SampleColumns<'a> {
    names: [(&'static str, &'a str); 6],
    positions: [usize; 6],
}

impl<'a> SampleColumns<'a> {
    fn resolve(table: &MetadataTable, mapping: &'a ColumnMapping) -> Result<Self> {
        let names = mapping.pairs();
        let mut positions = [0usize; 6];
        for (slot, (canonical, actual)) in positions.iter_mut().zip(names.iter()) {
            *slot = table.column_index(actual).ok_or_else(|| {
                ExtractError::InvalidMetadata(format!(
                    "missing column '{}' (mapped to '{}')",
                    actual, canonical
                ))
            })?;
        }
        Ok(Self { names, positions })
    }

    fn read(&self, index: usize, row: &[String]) -> Result<Sample> {
        let year: i32 = self.integer(index, row, 0)?;
        let month: u32 = self.integer(index, row, 1)?;
        let day: u32 = self.integer(index, row, 2)?;
        let hour: u32 = self.integer(index, row, 3)?;

        Ok(Sample {
            index,
            time: TimeKey::new(year, month, day, hour),
            lat: self.number(index, row, 4)?,
            lon: self.number(index, row, 5)?,
        })
    }

    fn number(&self, index: usize, row: &[String], field: usize) -> Result<f64> {
        let cell = &row[self.positions[field]];
        cell.parse::<f64>().map_err(|_| {
            ExtractError::InvalidMetadata(format!(
                "row {}: column '{}' holds '{}', expected a number",
                index, self.names[field].1, cell
            ))
        })
    }

    // Tables exported from dataframes often carry integral floats ("2000.0").
    fn integer<T: TryFrom<i64>>(&self, index: usize, row: &[String], field: usize) -> Result<T> {
        let value = self.number(index, row, field)?;
        let invalid = || {
            ExtractError::InvalidMetadata(format!(
                "row {}: column '{}' holds {}, expected a non-negative integer in range",
                index, self.names[field].1, value
            ))
        };
        if value.fract() != 0.0 || value < 0.0 || value > i64::MAX as f64 {
            return Err(invalid());
        }
        T::try_from(value as i64).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "yr,mo,dd,hh,latitude,longitude,name\n\
                         2000,9,30,18,12.5,300.0,a\n\
                         2000.0,10,1,0,13.25,301.5,b\n";

    fn mapping() -> ColumnMapping {
        ColumnMapping {
            year: "yr".to_string(),
            month: "mo".to_string(),
            day: "dd".to_string(),
            hour: "hh".to_string(),
            lat: "latitude".to_string(),
            lon: "longitude".to_string(),
        }
    }

    #[test]
    fn test_read_samples() {
        let table = MetadataTable::from_reader(TABLE.as_bytes(), ',').unwrap();
        assert_eq!(table.len(), 2);

        let samples = table.samples(&mapping()).unwrap();
        assert_eq!(samples[0].index, 0);
        assert_eq!(samples[0].time, TimeKey::new(2000, 9, 30, 18));
        assert_eq!(samples[1].time, TimeKey::new(2000, 10, 1, 0));
        assert_eq!(samples[1].lat, 13.25);
        assert_eq!(samples[1].lon, 301.5);
    }

    #[test]
    fn test_rename_to_canonical() {
        let mut table = MetadataTable::from_reader(TABLE.as_bytes(), ',').unwrap();
        table.rename_to_canonical(&mapping());
        assert_eq!(
            table.columns(),
            &["year", "month", "day", "hour", "lat", "lon", "name"]
        );
        assert_eq!(table.samples(&ColumnMapping::canonical()).unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_rows() {
        let table = MetadataTable::from_reader(TABLE.as_bytes(), ',').unwrap();
        let err = table.samples(&ColumnMapping::canonical()).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidMetadata(_)));

        let bad = "year,month,day,hour,lat,lon\n2000,9.5,1,0,1,2\n";
        let table = MetadataTable::from_reader(bad.as_bytes(), ',').unwrap();
        assert!(table.samples(&ColumnMapping::canonical()).is_err());

        let ragged = "year,month\n2000\n";
        assert!(MetadataTable::from_reader(ragged.as_bytes(), ',').is_err());
    }

    #[test]
    fn test_out_of_range_fields() {
        let huge_year = "year,month,day,hour,lat,lon\n1e10,10,1,0,1,2\n";
        let table = MetadataTable::from_reader(huge_year.as_bytes(), ',').unwrap();
        assert!(matches!(
            table.samples(&ColumnMapping::canonical()),
            Err(ExtractError::InvalidMetadata(_))
        ));

        let huge_hour = "year,month,day,hour,lat,lon\n2000,10,1,5e9,1,2\n";
        let table = MetadataTable::from_reader(huge_hour.as_bytes(), ',').unwrap();
        assert!(table.samples(&ColumnMapping::canonical()).is_err());
    }

    #[test]
    fn test_quoted_cells_keep_separator() {
        let text = "year,month,day,hour,lat,lon,name\n\
                    2000,10,1,0,12.5,300.0,\"Nadine, storm\"\n";
        let table = MetadataTable::from_reader(text.as_bytes(), ',').unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.columns().len(), 7);

        let samples = table.samples(&ColumnMapping::canonical()).unwrap();
        assert_eq!(samples[0].lon, 300.0);
    }

    #[test]
    fn test_custom_separator_and_blank_lines() {
        let text = "year;month;day;hour;lat;lon\n\n2000;10;1;6;-3.5;12\n\n";
        let table = MetadataTable::from_reader(text.as_bytes(), ';').unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.samples(&ColumnMapping::canonical()).unwrap()[0].time,
            TimeKey::new(2000, 10, 1, 6)
        );
        assert!(matches!(
            MetadataTable::from_reader(text.as_bytes(), '§'),
            Err(ExtractError::Configuration(_))
        ));
    }
}
