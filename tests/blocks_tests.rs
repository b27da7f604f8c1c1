//! Period partitioning and cross-label merging of metadata tables.

use gridchannel::blocks::{build_blocks, build_blocks_in_place, merge_blocks};
use gridchannel::errors::ExtractError;
use gridchannel::metadata::{ColumnMapping, MetadataTable};
use gridchannel::time::{Period, TimeResolution};
use std::collections::BTreeMap;

fn table(dates: &[(i32, u32, u32, u32)]) -> MetadataTable {
    let columns = ["year", "month", "day", "hour", "lat", "lon"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let rows = dates
        .iter()
        .enumerate()
        .map(|(i, (y, m, d, h))| {
            vec![
                y.to_string(),
                m.to_string(),
                d.to_string(),
                h.to_string(),
                format!("{}.5", i % 10),
                "10.25".to_string(),
            ]
        })
        .collect();
    MetadataTable::from_records(columns, rows).unwrap()
}

fn cyclone_table() -> MetadataTable {
    table(&[(2000, 10, 3, 0), (2000, 10, 12, 6), (2000, 10, 30, 18)])
}

fn no_cyclone_table() -> MetadataTable {
    let mut dates: Vec<(i32, u32, u32, u32)> = (0..47)
        .map(|i| (2000, 9, 1 + (i % 30), 6 * (i % 4)))
        .collect();
    dates.extend([(2000, 10, 1, 0), (2000, 10, 2, 12)]);
    table(&dates)
}

#[test]
fn test_month_partition() {
    let blocks = build_blocks(
        &no_cyclone_table(),
        &ColumnMapping::canonical(),
        TimeResolution::Month,
    )
    .unwrap();

    let periods: Vec<&Period> = blocks.keys().collect();
    assert_eq!(periods, vec![&Period(vec![2000, 9]), &Period(vec![2000, 10])]);
    assert_eq!(blocks[&Period(vec![2000, 9])].len(), 47);
    assert_eq!(blocks[&Period(vec![2000, 10])].indices(), vec![47, 48]);
}

#[test]
fn test_merge_with_label_missing_a_period() {
    let mapping = ColumnMapping::canonical();
    let mut structures = BTreeMap::new();
    structures.insert(
        "cyclone".to_string(),
        build_blocks(&cyclone_table(), &mapping, TimeResolution::Month).unwrap(),
    );
    structures.insert(
        "no_cyclone".to_string(),
        build_blocks(&no_cyclone_table(), &mapping, TimeResolution::Month).unwrap(),
    );

    let merged = merge_blocks(structures);
    assert_eq!(merged.len(), 2);

    let september = &merged[&Period(vec![2000, 9])];
    assert_eq!(september.keys().collect::<Vec<_>>(), vec!["no_cyclone"]);
    assert_eq!(september["no_cyclone"].len(), 47);

    let october = &merged[&Period(vec![2000, 10])];
    assert_eq!(october["cyclone"].len(), 3);
    assert_eq!(october["no_cyclone"].len(), 2);
}

#[test]
fn test_merge_is_insensitive_to_label_order() {
    let mapping = ColumnMapping::canonical();
    let cyclone = build_blocks(&cyclone_table(), &mapping, TimeResolution::Day).unwrap();
    let no_cyclone = build_blocks(&no_cyclone_table(), &mapping, TimeResolution::Day).unwrap();

    let mut forward = BTreeMap::new();
    forward.insert("cyclone".to_string(), cyclone.clone());
    forward.insert("no_cyclone".to_string(), no_cyclone.clone());

    let mut backward = BTreeMap::new();
    backward.insert("no_cyclone".to_string(), no_cyclone);
    backward.insert("cyclone".to_string(), cyclone);

    assert_eq!(merge_blocks(forward), merge_blocks(backward));
}

#[test]
fn test_unsupported_resolution() {
    let err = "week".parse::<TimeResolution>().unwrap_err();
    assert!(matches!(err, ExtractError::Configuration(_)));
    assert!(err.to_string().contains("week"));
}

#[test]
fn test_custom_mapping_in_place() {
    let mut table = MetadataTable::from_records(
        ["yr", "mo", "dy", "hr", "latitude", "longitude"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        vec![vec![
            "2000".into(),
            "10".into(),
            "1".into(),
            "6".into(),
            "1.5".into(),
            "10.0".into(),
        ]],
    )
    .unwrap();
    let mapping = ColumnMapping {
        year: "yr".into(),
        month: "mo".into(),
        day: "dy".into(),
        hour: "hr".into(),
        lat: "latitude".into(),
        lon: "longitude".into(),
    };

    let blocks = build_blocks_in_place(&mut table, &mapping, TimeResolution::Year).unwrap();
    assert_eq!(blocks[&Period(vec![2000])].samples()[0].lat, 1.5);
    assert!(table.column_index("year").is_some());
    assert!(table.column_index("yr").is_none());
}

#[test]
fn test_missing_column() {
    let table = cyclone_table();
    let mapping = ColumnMapping {
        hour: "time_of_day".into(),
        ..ColumnMapping::canonical()
    };
    assert!(matches!(
        build_blocks(&table, &mapping, TimeResolution::Month),
        Err(ExtractError::InvalidMetadata(_))
    ));
}
