use serde::Serialize;
use serde_json::{Map, Value as Json};
use tabled::{builder::Builder, settings::Style};

use crate::error::Result;
use crate::schema::{ColumnMeta, FieldMeta, GridSchema};
use crate::types::{AttributeDescriptor, FeatureRecord};
use crate::util::format_number;

pub type RowObject = Map<String, Json>;

/// Grid reader configuration plus the derived fields and columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    root: &'static str,
    #[serde(rename = "totalProperty")]
    total_property: &'static str,
    #[serde(rename = "successProperty")]
    success_property: &'static str,
    #[serde(rename = "messageProperty")]
    message_property: &'static str,
    fields: Vec<FieldMeta>,
    columns: Vec<ColumnMeta>,
}

impl Metadata {
    fn new(schema: GridSchema) -> Self {
        Self {
            root: "data",
            total_property: "total",
            success_property: "success",
            message_property: "message",
            fields: schema.fields,
            columns: schema.columns,
        }
    }
}

/// The report response. Same shape for success and failure; `total` is
/// always the length of `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "metaData")]
    metadata: Metadata,
    data: Vec<RowObject>,
    total: usize,
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl Envelope {
    /// Serialize `rows`, keeping only the attributes named by `descriptors`,
    /// in descriptor order. Attributes a row lacks are written as `null`.
    pub fn success(
        schema: GridSchema,
        descriptors: &[AttributeDescriptor],
        rows: &[FeatureRecord],
        message: &str,
        warnings: Vec<String>,
    ) -> Self {
        let data: Vec<RowObject> = rows.iter().map(|r| row_object(r, descriptors)).collect();
        Self {
            metadata: Metadata::new(schema),
            total: data.len(),
            data,
            success: true,
            message: message.to_string(),
            warnings,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            metadata: Metadata::new(GridSchema::default()),
            data: Vec::new(),
            total: 0,
            success: false,
            message: message.into(),
            warnings: Vec::new(),
        }
    }

    pub fn success_flag(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn data(&self) -> &[RowObject] {
        &self.data
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.metadata.fields
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.metadata.columns
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

fn row_object(record: &FeatureRecord, descriptors: &[AttributeDescriptor]) -> RowObject {
    descriptors
        .iter()
        .map(|attr| {
            let value = record
                .get(&attr.name)
                .and_then(|v| serde_json::to_value(v).ok())
                .unwrap_or(Json::Null);
            (attr.name.clone(), value)
        })
        .collect()
}

fn cell(value: Option<&Json>) -> String {
    match value {
        None | Some(Json::Null) => String::new(),
        Some(Json::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Like [`cell`], with thousands separators and two decimals on numbers.
fn preview_cell(value: Option<&Json>) -> String {
    match value.and_then(Json::as_f64) {
        Some(n) => format_number(n, 2),
        None => cell(value),
    }
}

/// Write the grid columns of the envelope's rows as CSV, headed by the
/// column labels.
pub fn write_csv(path: &str, envelope: &Envelope) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(envelope.columns().iter().map(|c| c.text.as_str()))?;
    for row in envelope.data() {
        wtr.write_record(
            envelope
                .columns()
                .iter()
                .map(|c| cell(row.get(&c.data_index))),
        )?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Markdown table of the first `max_rows` rows, grid columns only.
pub fn preview_table(envelope: &Envelope, max_rows: usize) -> Option<String> {
    if envelope.data().is_empty() {
        return None;
    }
    let mut builder = Builder::default();
    builder.push_record(envelope.columns().iter().map(|c| c.text.clone()));
    for row in envelope.data().iter().take(max_rows) {
        builder.push_record(
            envelope
                .columns()
                .iter()
                .map(|c| preview_cell(row.get(&c.data_index))),
        );
    }
    Some(builder.build().with(Style::markdown()).to_string())
}

pub fn preview_table_rows(envelope: &Envelope, max_rows: usize) {
    match preview_table(envelope, max_rows) {
        Some(table_str) => println!("{}\n", table_str),
        None => println!("(no rows)\n"),
    }
}
