//! Partitioning of label metadata into period blocks
//!
//! Source files cover a fixed period of time (a year, a month, ...). Grouping
//! the samples of each label by that period, then merging the labels period by
//! period, lets the extraction open each source file exactly once.
//!
//! ```text
//! (2000, 1)
//!     - row 6
//!     - row 19
//! (2000, 2)
//!     - row 2
//!     - row 7
//! ```

use crate::errors::Result;
use crate::metadata::{ColumnMapping, MetadataTable, Sample};
use crate::time::{Period, TimeResolution};
use std::collections::BTreeMap;
use tracing::debug;

/// Samples of one label sharing one period, in source table order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    samples: Vec<Sample>,
}

impl Block {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Row positions in the source table
    pub fn indices(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.index).collect()
    }

    fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }
}

/// Blocks of every label for one period, keyed by label id
pub type MergedUnit = BTreeMap<String, Block>;

/// Groups the rows of `table` by the period they fall in.
///
/// Only the time fields at or above `resolution` make the key: with
/// [`TimeResolution::Month`] a period is `(year, month)`.
pub fn build_blocks(
    table: &MetadataTable,
    mapping: &ColumnMapping,
    resolution: TimeResolution,
) -> Result<BTreeMap<Period, Block>> {
    let samples = table.samples(mapping)?;
    let mut blocks: BTreeMap<Period, Block> = BTreeMap::new();

    for sample in samples {
        blocks
            .entry(resolution.truncate(&sample.time))
            .or_default()
            .push(sample);
    }

    debug!(
        rows = table.len(),
        periods = blocks.len(),
        resolution = %resolution,
        "built blocks"
    );
    Ok(blocks)
}

/// Same as [`build_blocks`], renaming the caller's columns to canonical names first.
pub fn build_blocks_in_place(
    table: &mut MetadataTable,
    mapping: &ColumnMapping,
    resolution: TimeResolution,
) -> Result<BTreeMap<Period, Block>> {
    table.rename_to_canonical(mapping);
    build_blocks(table, &ColumnMapping::canonical(), resolution)
}

/// Merges per-label blocks into per-period units.
///
/// The periods are the union over all labels; a label without samples in a
/// period is absent from that period's unit.
pub fn merge_blocks(
    structures: BTreeMap<String, BTreeMap<Period, Block>>,
) -> BTreeMap<Period, MergedUnit> {
    let mut merged: BTreeMap<Period, MergedUnit> = BTreeMap::new();

    for (label_id, blocks) in structures {
        for (period, block) in blocks {
            merged
                .entry(period)
                .or_default()
                .insert(label_id.clone(), block);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimeKey;

    fn table(rows: &[(i32, u32, u32, u32)]) -> MetadataTable {
        let columns = ["year", "month", "day", "hour", "lat", "lon"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, (y, m, d, h))| {
                vec![
                    y.to_string(),
                    m.to_string(),
                    d.to_string(),
                    h.to_string(),
                    (10.0 + i as f64).to_string(),
                    (300.0 + i as f64).to_string(),
                ]
            })
            .collect();
        MetadataTable::from_records(columns, rows).unwrap()
    }

    #[test]
    fn test_blocks_conserve_rows() {
        let rows = [
            (2000, 10, 2, 0),
            (2000, 9, 30, 18),
            (2000, 10, 1, 6),
            (2001, 1, 1, 0),
            (2000, 9, 1, 0),
        ];
        let t = table(&rows);

        for resolution in TimeResolution::ALL {
            let blocks = build_blocks(&t, &ColumnMapping::canonical(), resolution).unwrap();
            let mut indices: Vec<usize> = blocks.values().flat_map(|b| b.indices()).collect();
            indices.sort();
            assert_eq!(indices, vec![0, 1, 2, 3, 4]);

            for (period, block) in &blocks {
                assert!(block
                    .samples()
                    .iter()
                    .all(|s| &resolution.truncate(&s.time) == period));
            }
        }
    }

    #[test]
    fn test_block_preserves_row_order() {
        let t = table(&[(2000, 10, 5, 0), (2000, 10, 1, 0), (2000, 10, 3, 0)]);
        let blocks = build_blocks(&t, &ColumnMapping::canonical(), TimeResolution::Month).unwrap();
        let block = &blocks[&Period(vec![2000, 10])];
        assert_eq!(block.indices(), vec![0, 1, 2]);
        assert_eq!(block.samples()[1].time, TimeKey::new(2000, 10, 1, 0));
    }

    #[test]
    fn test_monthly_periods() {
        let t = table(&[(2000, 9, 1, 0), (2000, 10, 1, 0), (2000, 9, 12, 6)]);
        let blocks = build_blocks(&t, &ColumnMapping::canonical(), TimeResolution::Month).unwrap();
        let periods: Vec<&Period> = blocks.keys().collect();
        assert_eq!(periods, vec![&Period(vec![2000, 9]), &Period(vec![2000, 10])]);
        assert_eq!(blocks[&Period(vec![2000, 9])].len(), 2);
    }

    #[test]
    fn test_merge_is_outer_join() {
        let cyclone = table(&[(2000, 10, 1, 0), (2000, 10, 2, 0)]);
        let no_cyclone = table(&[(2000, 9, 1, 0), (2000, 10, 3, 0)]);

        let mut structures = BTreeMap::new();
        for (label, t) in [("cyclone", &cyclone), ("no_cyclone", &no_cyclone)] {
            let blocks =
                build_blocks(t, &ColumnMapping::canonical(), TimeResolution::Month).unwrap();
            structures.insert(label.to_string(), blocks);
        }

        let merged = merge_blocks(structures);
        let september = &merged[&Period(vec![2000, 9])];
        assert!(!september.contains_key("cyclone"));
        assert_eq!(september["no_cyclone"].len(), 1);

        let october = &merged[&Period(vec![2000, 10])];
        assert_eq!(october["cyclone"].len(), 2);
        assert_eq!(october["no_cyclone"].len(), 1);
    }
}
