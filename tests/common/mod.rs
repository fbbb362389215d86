//! Shared fixtures for report integration tests.
#![allow(dead_code)]

use area_report::types::{AttributeDescriptor, AttributeType};
use area_report::{FeatureRecord, MemoryDataset, MemoryStore};
use chrono::NaiveDate;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn base_schema() -> Vec<AttributeDescriptor> {
    vec![
        AttributeDescriptor::new("id", AttributeType::Double),
        AttributeDescriptor::new("a_plannaam", AttributeType::String).with_alias("Terrein"),
        AttributeDescriptor::new("naam", AttributeType::String),
        AttributeDescriptor::new("vvr_naam", AttributeType::String),
        AttributeDescriptor::new("oppervlakte", AttributeType::Double)
            .with_alias("Oppervlakte (ha)"),
        AttributeDescriptor::new("kavels", AttributeType::Double),
        AttributeDescriptor::new("status", AttributeType::String),
    ]
}

pub fn related_schema() -> Vec<AttributeDescriptor> {
    vec![
        AttributeDescriptor::new("kavelid", AttributeType::Double),
        AttributeDescriptor::new("terreinid", AttributeType::Double),
        AttributeDescriptor::new("opp_geometrie", AttributeType::Double),
        AttributeDescriptor::new("datumuitgifte", AttributeType::Date),
        AttributeDescriptor::new("terreinnaam", AttributeType::String),
        AttributeDescriptor::new("gemeentenaam", AttributeType::String),
        AttributeDescriptor::new("regionaam", AttributeType::String),
    ]
}

fn terrein(id: f64, plan: &str, gemeente: &str, regio: &str, opp: f64, kavels: f64) -> FeatureRecord {
    FeatureRecord::new()
        .with("id", id)
        .with("a_plannaam", plan)
        .with("naam", gemeente)
        .with("vvr_naam", regio)
        .with("oppervlakte", opp)
        .with("kavels", kavels)
        .with("status", "actief")
}

pub fn kavel(
    id: f64,
    terreinid: f64,
    opp: f64,
    date: NaiveDate,
    plan: &str,
    gemeente: &str,
    regio: &str,
) -> FeatureRecord {
    FeatureRecord::new()
        .with("kavelid", id)
        .with("terreinid", terreinid)
        .with("opp_geometrie", opp)
        .with("datumuitgifte", date)
        .with("terreinnaam", plan)
        .with("gemeentenaam", gemeente)
        .with("regionaam", regio)
}

/// Parcels T1, T2 in Delft and T3 in Gouda, with lots issued in early 2023.
pub fn store() -> MemoryStore {
    let mut s = MemoryStore::new();
    s.insert(
        "terreinen",
        MemoryDataset {
            schema: base_schema(),
            rows: vec![
                terrein(1.0, "T1", "Delft", "Haaglanden", 10.0, 2.0),
                terrein(2.0, "T1", "Delft", "Haaglanden", 5.5, 1.0),
                terrein(3.0, "T2", "Delft", "Haaglanden", 20.0, 4.0),
                terrein(4.0, "T3", "Gouda", "Midden-Holland", 7.0, 3.0),
            ],
            related: None,
        },
    );
    s.insert(
        "kavels",
        MemoryDataset {
            schema: related_schema(),
            rows: vec![
                kavel(1.0, 1.0, 100.0, d(2023, 1, 10), "T1", "Delft", "Haaglanden"),
                kavel(2.0, 2.0, 50.0, d(2023, 2, 5), "T1", "Delft", "Haaglanden"),
                kavel(3.0, 3.0, 30.0, d(2023, 1, 20), "T2", "Delft", "Haaglanden"),
                kavel(4.0, 3.0, 12.0, d(2023, 3, 15), "T2", "Delft", "Haaglanden"),
                kavel(5.0, 4.0, 8.0, d(2023, 2, 1), "T3", "Gouda", "Midden-Holland"),
                kavel(6.0, 3.0, 4.0, d(2023, 3, 5), "T2", "Delft", "Haaglanden"),
            ],
            related: None,
        },
    );
    s.relate("terreinen", "kavels");
    s
}
