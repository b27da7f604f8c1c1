//! Time keys, periods and CF time axis decoding

use crate::errors::{ExtractError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Granularity of the source data files, ordered from coarsest to finest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeResolution {
    Year,
    Month,
    Day,
    Hour,
}

impl TimeResolution {
    /// All supported resolutions, coarsest first.
    pub const ALL: [TimeResolution; 4] = [
        TimeResolution::Year,
        TimeResolution::Month,
        TimeResolution::Day,
        TimeResolution::Hour,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeResolution::Year => "year",
            TimeResolution::Month => "month",
            TimeResolution::Day => "day",
            TimeResolution::Hour => "hour",
        }
    }

    /// Number of leading time fields that make up a period at this resolution.
    pub fn degree(&self) -> usize {
        match self {
            TimeResolution::Year => 1,
            TimeResolution::Month => 2,
            TimeResolution::Day => 3,
            TimeResolution::Hour => 4,
        }
    }

    pub fn truncate(&self, time: &TimeKey) -> Period {
        let values = [
            time.year,
            time.month as i32,
            time.day as i32,
            time.hour as i32,
        ];
        Period(values[..self.degree()].to_vec())
    }
}

impl fmt::Display for TimeResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeResolution {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(TimeResolution::Year),
            "month" => Ok(TimeResolution::Month),
            "day" => Ok(TimeResolution::Day),
            "hour" => Ok(TimeResolution::Hour),
            _ => Err(ExtractError::Configuration(format!(
                "'{}' is not a known time resolution (expected one of year, month, day, hour)",
                s
            ))),
        }
    }
}

impl TryFrom<String> for TimeResolution {
    type Error = ExtractError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeResolution> for String {
    fn from(value: TimeResolution) -> Self {
        value.as_str().to_string()
    }
}

/// Time fields of a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl TimeKey {
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
        }
    }

    pub fn month2d(&self) -> String {
        format!("{:02}", self.month)
    }

    pub fn day2d(&self) -> String {
        format!("{:02}", self.day)
    }

    pub fn hour2d(&self) -> String {
        format!("{:02}", self.hour)
    }

    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?.and_hms_opt(self.hour, 0, 0)
    }
}

/// Time key truncated to a resolution, e.g. `(2000, 10)` for monthly files
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period(pub Vec<i32>);

impl Period {
    pub fn values(&self) -> &[i32] {
        &self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        f.write_str(&parts.join("_"))
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<Vec<i32>> for Period {
    fn from(values: Vec<i32>) -> Self {
        Period(values)
    }
}

/// Renders a `{field}` template with the given time key.
///
/// Supported placeholders: `year`, `month`, `day`, `hour`, `month2d`, `day2d`, `hour2d`.
pub fn render_template(template: &str, time: &TimeKey) -> Result<String> {
    let mut rendered = String::with_capacity(template.len() + 8);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            ExtractError::Configuration(format!("unclosed placeholder in template '{}'", template))
        })?;
        let value = match &after[..close] {
            "year" => time.year.to_string(),
            "month" => time.month.to_string(),
            "day" => time.day.to_string(),
            "hour" => time.hour.to_string(),
            "month2d" => time.month2d(),
            "day2d" => time.day2d(),
            "hour2d" => time.hour2d(),
            other => {
                return Err(ExtractError::Configuration(format!(
                    "unknown placeholder '{{{}}}' in template '{}'",
                    other, template
                )))
            }
        };
        rendered.push_str(&value);
        rest = &after[close + 1..];
    }
    rendered.push_str(rest);

    Ok(rendered)
}

/// Parses a timestamp made of year, month, day, hour, minute, second fields.
///
/// Any non-digit character separates fields; missing trailing fields default to
/// the start of the period (`2000-10` is the first of October at midnight).
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let fields: Vec<u32> = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .take(6)
        .map(|part| part.parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;

    let year = *fields.first()? as i32;
    let field = |i: usize, default: u32| fields.get(i).copied().unwrap_or(default);

    NaiveDate::from_ymd_opt(year, field(1, 1), field(2, 1))?.and_hms_opt(
        field(3, 0),
        field(4, 0),
        field(5, 0),
    )
}

/// CF convention time axis: `<unit> since <reference>`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAxis {
    seconds_per_unit: f64,
    reference: NaiveDateTime,
}

impl TimeAxis {
    pub fn from_units(units: &str) -> Result<Self> {
        let (unit, reference) = units.split_once(" since ").ok_or_else(|| {
            ExtractError::Configuration(format!("unsupported time units '{}'", units))
        })?;

        let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
            "seconds" | "second" | "s" => 1.0,
            "minutes" | "minute" | "min" => 60.0,
            "hours" | "hour" | "h" => 3600.0,
            "days" | "day" | "d" => 86400.0,
            other => {
                return Err(ExtractError::Configuration(format!(
                    "unsupported time unit '{}' in '{}'",
                    other, units
                )))
            }
        };

        let reference = parse_timestamp(reference).ok_or_else(|| {
            ExtractError::Configuration(format!("unparsable reference date in '{}'", units))
        })?;

        Ok(Self {
            seconds_per_unit,
            reference,
        })
    }

    /// Date of a time value, `None` for fill values or values outside chrono's range.
    pub fn decode(&self, value: f64) -> Option<NaiveDateTime> {
        let seconds = (value * self.seconds_per_unit).round();
        if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
            return None;
        }
        let delta = Duration::try_seconds(seconds as i64)?;
        self.reference.checked_add_signed(delta)
    }

    /// Index of the time step equal to `target`; undecodable steps are skipped.
    pub fn position(&self, values: &[f64], target: NaiveDateTime) -> Option<usize> {
        values.iter().position(|&v| self.decode(v) == Some(target))
    }
}
