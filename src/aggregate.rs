//! Folding source rows into pre-built buckets.
//!
//! Accumulation only ever adds to a bucket's measures. A source row whose key
//! has no bucket is an anomaly: it is rejected and counted, or, in strict
//! mode, fails the report.

use log::{debug, warn};

use crate::buckets::{BucketKey, BucketSpace, SURFACE_FIELD};
use crate::error::{ReportError, Result};
use crate::types::{FeatureRecord, Value};
use crate::util::YearMonth;

/// A source row that could not be folded.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    /// Bucket key the row pointed at, when one could be computed
    pub key: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub rows: Vec<FeatureRecord>,
    pub rejected: Vec<Anomaly>,
}

impl Aggregation {
    /// One line per rejected row, for the envelope.
    pub fn warnings(&self) -> Vec<String> {
        self.rejected
            .iter()
            .map(|a| match &a.key {
                Some(key) => format!("Row rejected for bucket '{key}': {}", a.reason),
                None => format!("Row rejected: {}", a.reason),
            })
            .collect()
    }
}

struct Folder {
    space: BucketSpace,
    rejected: Vec<Anomaly>,
    strict: bool,
}

impl Folder {
    fn new(space: BucketSpace, strict: bool) -> Self {
        Self {
            space,
            rejected: Vec::new(),
            strict,
        }
    }

    fn reject(&mut self, key: Option<String>, reason: String) -> Result<()> {
        let anomaly = Anomaly { key, reason };
        if self.strict {
            return Err(ReportError::DataIntegrity(match &anomaly.key {
                Some(key) => format!("{} (bucket '{key}')", anomaly.reason),
                None => anomaly.reason,
            }));
        }
        warn!("rejected source row: {:?}", anomaly);
        self.rejected.push(anomaly);
        Ok(())
    }

    /// Add `source[measure]` to `bucket[target]` for each `(measure, target)`.
    fn fold(&mut self, key: String, source: &FeatureRecord, pairs: &[(&str, &str)]) -> Result<()> {
        let mut increments = Vec::with_capacity(pairs.len());
        for (measure, target) in pairs {
            match source.get(measure) {
                Some(Value::Double(v)) => increments.push((*target, *v)),
                None | Some(Value::Null) => {}
                Some(other) => {
                    return self.reject(
                        Some(key),
                        format!("measure '{measure}' is not numeric: {other:?}"),
                    );
                }
            }
        }
        match self.space.get_mut(&key) {
            Some(bucket) => {
                for (target, inc) in increments {
                    let current = bucket.get(target).and_then(Value::as_f64).unwrap_or(0.0);
                    bucket.set(target, current + inc);
                }
                Ok(())
            }
            None => self.reject(Some(key), "no such bucket".to_string()),
        }
    }

    fn finish(self, descending: bool) -> Aggregation {
        let rows = if descending {
            self.space.into_descending()
        } else {
            self.space.into_ascending()
        };
        debug!(
            "aggregated into {} buckets, {} rows rejected",
            rows.len(),
            self.rejected.len()
        );
        Aggregation {
            rows,
            rejected: self.rejected,
        }
    }
}

fn area_name<'r>(row: &'r FeatureRecord, area_field: &str) -> Option<&'r str> {
    row.get(area_field).and_then(Value::as_str)
}

/// Sum `measure_field` per area into the buckets' surface field.
///
/// Result is in descending key order.
pub fn by_area(
    space: BucketSpace,
    rows: &[FeatureRecord],
    area_field: &str,
    measure_field: &str,
    strict: bool,
) -> Result<Aggregation> {
    let mut folder = Folder::new(space, strict);
    for row in rows {
        let Some(area) = area_name(row, area_field) else {
            folder.reject(None, format!("no value for '{area_field}'"))?;
            continue;
        };
        let key = BucketKey::Area(area.to_string()).to_string();
        folder.fold(key, row, &[(measure_field, SURFACE_FIELD)])?;
    }
    Ok(folder.finish(true))
}

/// Sum `measure_field` per area and per month of `date_field`.
///
/// Result is in ascending key order.
pub fn by_area_and_month(
    space: BucketSpace,
    rows: &[FeatureRecord],
    area_field: &str,
    date_field: &str,
    measure_field: &str,
    strict: bool,
) -> Result<Aggregation> {
    let mut folder = Folder::new(space, strict);
    for row in rows {
        let Some(area) = area_name(row, area_field) else {
            folder.reject(None, format!("no value for '{area_field}'"))?;
            continue;
        };
        let Some(date) = row.get(date_field).and_then(Value::as_date) else {
            folder.reject(None, format!("no date in '{date_field}' for area '{area}'"))?;
            continue;
        };
        let key = BucketKey::AreaMonth(area.to_string(), YearMonth::of(date)).to_string();
        folder.fold(key, row, &[(measure_field, SURFACE_FIELD)])?;
    }
    Ok(folder.finish(false))
}

/// Sum each of `measures` per area, into same-named bucket fields.
///
/// Result is in ascending key order.
pub fn by_fields(
    space: BucketSpace,
    rows: &[FeatureRecord],
    area_field: &str,
    measures: &[String],
    strict: bool,
) -> Result<Aggregation> {
    let pairs: Vec<(&str, &str)> = measures.iter().map(|m| (m.as_str(), m.as_str())).collect();
    let mut folder = Folder::new(space, strict);
    for row in rows {
        let Some(area) = area_name(row, area_field) else {
            folder.reject(None, format!("no value for '{area_field}'"))?;
            continue;
        };
        let key = BucketKey::Area(area.to_string()).to_string();
        folder.fold(key, row, &pairs)?;
    }
    Ok(folder.finish(false))
}
