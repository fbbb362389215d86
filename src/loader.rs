use crate::error::{ReportError, Result};
use crate::store::MemoryDataset;
use crate::types::{AttributeDescriptor, AttributeType, FeatureRecord, Value};
use crate::util::{parse_date_safe, parse_f64_safe};
use csv::{ReaderBuilder, StringRecord};
use log::{debug, info};
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
}

/// Parse a header cell of the form `name[:TYPE[:alias]]`.
///
/// The type defaults to STRING.
fn parse_header(cell: &str, ordinal: u64) -> Result<AttributeDescriptor> {
    let mut parts = cell.splitn(3, ':');
    let name = parts.next().unwrap_or("").trim();
    if name.is_empty() {
        return Err(ReportError::SchemaMismatch(format!(
            "empty column name in header cell {ordinal}"
        )));
    }
    let kind = match parts.next().map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => AttributeType::parse(t).ok_or_else(|| {
            ReportError::SchemaMismatch(format!("unknown type '{t}' for column '{name}'"))
        })?,
        None => AttributeType::String,
    };
    let mut attr = AttributeDescriptor::new(name, kind).with_id(ordinal);
    if let Some(alias) = parts.next().map(str::trim).filter(|a| !a.is_empty()) {
        attr = attr.with_alias(alias);
    }
    Ok(attr)
}

/// Convert one CSV cell to a typed value. Empty cells are null; cells that
/// do not parse as their column type are an error.
fn parse_cell(raw: Option<&str>, kind: AttributeType) -> Option<Value> {
    let raw = raw.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Some(Value::Null);
    }
    match kind {
        AttributeType::String => Some(Value::String(raw.to_string())),
        AttributeType::Double => parse_f64_safe(Some(raw)).map(Value::Double),
        AttributeType::Date => parse_date_safe(Some(raw)).map(Value::Date),
    }
}

fn parse_row(row: &StringRecord, schema: &[AttributeDescriptor]) -> Option<FeatureRecord> {
    let mut record = FeatureRecord::new();
    for (i, attr) in schema.iter().enumerate() {
        record.set(&attr.name, parse_cell(row.get(i), attr.kind)?);
    }
    Some(record)
}

/// Load a dataset from any CSV source. The header row declares the schema.
pub fn load_from_reader<R: Read>(reader: R) -> Result<(MemoryDataset, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let schema = rdr
        .headers()?
        .iter()
        .zip(1u64..)
        .map(|(cell, ordinal)| parse_header(cell, ordinal))
        .collect::<Result<Vec<_>>>()?;

    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut rows = Vec::new();
    for result in rdr.records() {
        total_rows += 1;
        let parsed = match result {
            Ok(r) => parse_row(&r, &schema),
            Err(e) => {
                debug!("unreadable CSV row {total_rows}: {e}");
                None
            }
        };
        match parsed {
            Some(record) => rows.push(record),
            None => parse_errors += 1,
        }
    }

    let report = LoadReport {
        total_rows,
        loaded_rows: rows.len(),
        parse_errors,
    };
    let dataset = MemoryDataset {
        schema,
        rows,
        related: None,
    };
    Ok((dataset, report))
}

pub fn load_dataset(path: &Path) -> Result<(MemoryDataset, LoadReport)> {
    let file = File::open(path)?;
    let (dataset, report) = load_from_reader(file)?;
    info!(
        "loaded {} of {} rows from {} ({} skipped)",
        report.loaded_rows,
        report.total_rows,
        path.display(),
        report.parse_errors
    );
    Ok((dataset, report))
}
