//! Grid metadata: field types and column labels of a report.
//!
//! Metadata comes from the first row only. Descriptors are kept when their
//! name is both projected and carried by that row; later rows are assumed
//! to look the same.

use serde::Serialize;

use crate::config::ReportConfig;
use crate::types::{AttributeDescriptor, AttributeType, FeatureRecord, ReportKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "dateFormat", skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMeta {
    pub text: String,
    #[serde(rename = "dataIndex")]
    pub data_index: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridSchema {
    pub fields: Vec<FieldMeta>,
    pub columns: Vec<ColumnMeta>,
}

impl GridSchema {
    fn push(&mut self, report: ReportKind, attr: &AttributeDescriptor, config: &ReportConfig) {
        let date_format = (report == ReportKind::Issue && attr.kind == AttributeType::Date)
            .then(|| config.issue_date_format.clone());
        self.fields.push(FieldMeta {
            name: attr.name.clone(),
            kind: attr.kind.grid_type(),
            date_format,
        });
        self.columns.push(ColumnMeta {
            text: attr.label().to_string(),
            data_index: attr.name.clone(),
        });
    }
}

/// Derive grid metadata for `descriptors`, restricted to `projection`.
///
/// Without a first row the projection list itself is used, in projection
/// order, typed from the matching descriptor or as a string.
pub fn derive(
    report: ReportKind,
    descriptors: &[AttributeDescriptor],
    projection: &[String],
    first_row: Option<&FeatureRecord>,
    config: &ReportConfig,
) -> GridSchema {
    let mut schema = GridSchema::default();
    match first_row {
        Some(row) => {
            for attr in descriptors
                .iter()
                .filter(|a| projection.contains(&a.name) && row.contains(&a.name))
            {
                schema.push(report, attr, config);
            }
        }
        None => {
            for name in projection {
                let fallback;
                let attr = match descriptors.iter().find(|a| &a.name == name) {
                    Some(a) => a,
                    None => {
                        fallback = AttributeDescriptor::new(name, AttributeType::String);
                        &fallback
                    }
                };
                schema.push(report, attr, config);
            }
        }
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue_descriptors() -> Vec<AttributeDescriptor> {
        vec![
            AttributeDescriptor::new("maand", AttributeType::Date).with_id(1),
            AttributeDescriptor::new("oppervlakte", AttributeType::Double).with_id(2),
            AttributeDescriptor::new("gebied", AttributeType::String)
                .with_alias("gebiedsnaam")
                .with_id(3),
        ]
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn issue_dates_get_format_hint() {
        let row = FeatureRecord::new()
            .with("maand", "2023.01")
            .with("oppervlakte", 1.0)
            .with("gebied", "T1");
        let s = derive(
            ReportKind::Issue,
            &issue_descriptors(),
            &names(&["maand", "oppervlakte", "gebied"]),
            Some(&row),
            &ReportConfig::default(),
        );
        let json = serde_json::to_value(&s.fields).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"name": "maand", "type": "date", "dateFormat": "Y-m"},
                {"name": "oppervlakte", "type": "float"},
                {"name": "gebied", "type": "string"}
            ])
        );
        assert_eq!(s.columns[2].text, "gebiedsnaam");
        assert_eq!(s.columns[2].data_index, "gebied");
    }

    #[test]
    fn non_issue_reports_never_get_format_hint() {
        let descriptors = vec![AttributeDescriptor::new("datum", AttributeType::Date)];
        let row = FeatureRecord::new().with("datum", chrono::NaiveDate::MIN);
        let s = derive(
            ReportKind::Individual,
            &descriptors,
            &names(&["datum"]),
            Some(&row),
            &ReportConfig::default(),
        );
        assert_eq!(s.fields[0].date_format, None);
    }

    #[test]
    fn first_row_and_projection_both_restrict() {
        let row = FeatureRecord::new().with("oppervlakte", 1.0).with("gebied", "T1");
        let s = derive(
            ReportKind::Issue,
            &issue_descriptors(),
            &names(&["maand", "oppervlakte"]),
            Some(&row),
            &ReportConfig::default(),
        );
        let got: Vec<&str> = s.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(got, vec!["oppervlakte"]);
    }

    #[test]
    fn empty_report_falls_back_to_projection() {
        let s = derive(
            ReportKind::Issue,
            &issue_descriptors(),
            &names(&["gebied", "onbekend"]),
            None,
            &ReportConfig::default(),
        );
        assert_eq!(
            s.columns,
            vec![
                ColumnMeta {
                    text: "gebiedsnaam".into(),
                    data_index: "gebied".into()
                },
                ColumnMeta {
                    text: "onbekend".into(),
                    data_index: "onbekend".into()
                },
            ]
        );
        assert_eq!(s.fields[1].kind, "string");
    }
}
