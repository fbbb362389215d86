//! Pre-allocated result rows.
//!
//! Every area (and every month of the range, for monthly reports) gets a
//! zero-valued row before any source row is read, so the output has no gaps.
//! Buckets live in a `BTreeMap`, which fixes the output order by key.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::{DateRange, FeatureRecord, Value};
use crate::util::{months_between, YearMonth};

/// Fields of a synthesized aggregate row.
pub const KEY_FIELD: &str = "id";
pub const GEOM_FIELD: &str = "geom";
pub const MONTH_FIELD: &str = "maand";
pub const SURFACE_FIELD: &str = "oppervlakte";
pub const AREA_FIELD: &str = "gebied";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketKey {
    Area(String),
    AreaMonth(String, YearMonth),
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Area(name) => f.write_str(name),
            BucketKey::AreaMonth(name, month) => write!(f, "{name}{month}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketSpace {
    buckets: BTreeMap<String, FeatureRecord>,
}

impl BucketSpace {
    /// One bucket per area name.
    pub fn by_area<'a, I, F>(names: I, template: F) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        F: Fn(&BucketKey, &str) -> FeatureRecord,
    {
        let mut buckets = BTreeMap::new();
        for name in names {
            let key = BucketKey::Area(name.to_string());
            buckets.insert(key.to_string(), template(&key, name));
        }
        Self { buckets }
    }

    /// One bucket per area name per calendar month in `range`.
    ///
    /// The month count is `months_between(from, to)`; the first bucket is
    /// the month of `from`.
    pub fn by_area_and_month<'a, I, F>(names: I, range: &DateRange, template: F) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        F: Fn(&BucketKey, &str, YearMonth) -> FeatureRecord,
    {
        let months = months_between(range.from, range.to);
        let mut buckets = BTreeMap::new();
        for name in names {
            let mut month = YearMonth::of(range.from);
            for _ in 0..months {
                let key = BucketKey::AreaMonth(name.to_string(), month);
                buckets.insert(key.to_string(), template(&key, name, month));
                month = month.next();
            }
        }
        Self { buckets }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut FeatureRecord> {
        self.buckets.get_mut(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn into_ascending(self) -> Vec<FeatureRecord> {
        self.buckets.into_values().collect()
    }

    pub fn into_descending(self) -> Vec<FeatureRecord> {
        self.buckets.into_values().rev().collect()
    }
}

/// Zero row of the issue report: `id, geom, maand, oppervlakte, gebied`.
pub fn issue_bucket(key: &BucketKey, area: &str, month: Option<YearMonth>) -> FeatureRecord {
    FeatureRecord::new()
        .with(KEY_FIELD, key.to_string())
        .with(GEOM_FIELD, Value::Null)
        .with(MONTH_FIELD, month.map(|m| m.to_string()))
        .with(SURFACE_FIELD, 0.0)
        .with(AREA_FIELD, area)
}

/// Zero row of the aggregated report: `gebied` plus one 0.0 per measure.
pub fn field_bucket(area: &str, measures: &[String]) -> FeatureRecord {
    measures
        .iter()
        .fold(FeatureRecord::new().with(AREA_FIELD, area), |row, m| {
            row.with(m, 0.0)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monthly_space_is_full_cross_product_in_key_order() {
        let range = DateRange::new(d(2022, 11, 15), d(2023, 2, 10));
        let space = BucketSpace::by_area_and_month(["B", "A"], &range, |k, a, m| {
            issue_bucket(k, a, Some(m))
        });
        let keys: Vec<&str> = space.keys().collect();
        assert_eq!(
            keys,
            vec![
                "A2022.11", "A2022.12", "A2023.01", "B2022.11", "B2022.12", "B2023.01"
            ]
        );
        let rows = space.into_ascending();
        assert_eq!(rows[2].get(MONTH_FIELD), Some(&Value::from("2023.01")));
        assert_eq!(rows[2].get(SURFACE_FIELD), Some(&Value::Double(0.0)));
        assert_eq!(rows[2].get(GEOM_FIELD), Some(&Value::Null));
        assert_eq!(rows[2].get(AREA_FIELD), Some(&Value::from("A")));
    }

    #[test]
    fn month_count_follows_calendar_not_days() {
        let range = DateRange::new(d(2023, 1, 15), d(2023, 4, 10));
        let space = BucketSpace::by_area_and_month(["T1"], &range, |k, a, m| {
            issue_bucket(k, a, Some(m))
        });
        assert_eq!(space.len(), 3);
    }

    #[test]
    fn area_space_has_null_month_and_can_reverse() {
        let space = BucketSpace::by_area(["A", "C", "B"], |k, a| issue_bucket(k, a, None));
        let rows = space.into_descending();
        let areas: Vec<&Value> = rows.iter().filter_map(|r| r.get(AREA_FIELD)).collect();
        assert_eq!(areas, vec![&Value::from("C"), &Value::from("B"), &Value::from("A")]);
        assert_eq!(rows[0].get(MONTH_FIELD), Some(&Value::Null));
        assert_eq!(rows[0].get(KEY_FIELD), Some(&Value::from("C")));
    }

    #[test]
    fn no_areas_means_no_buckets() {
        let space = BucketSpace::by_area(std::iter::empty(), |k, a| issue_bucket(k, a, None));
        assert!(space.is_empty());
    }

    #[test]
    fn field_bucket_zeroes_every_measure() {
        let row = field_bucket("Delft", &["a".to_string(), "b".to_string()]);
        assert_eq!(row.get(AREA_FIELD), Some(&Value::from("Delft")));
        assert_eq!(row.get("a"), Some(&Value::Double(0.0)));
        assert_eq!(row.get("b"), Some(&Value::Double(0.0)));
    }
}
