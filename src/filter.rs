//! Parameterized filter expressions for feature queries.
//!
//! Values travel as typed literals; collaborators evaluate them with
//! [`Filter::matches`] or translate them to their own query language. The
//! `Display` form is for logs and quotes string literals with `''`
//! escaping, so an area name can never change the shape of the predicate.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;

use crate::types::{FeatureRecord, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals a literal value
    Eq(String, Value),

    /// Field is one of a set of values
    In(String, Vec<Value>),

    /// Date field falls in `[from, to)`
    During {
        field: String,
        from: NaiveDate,
        to: NaiveDate,
    },

    /// Logical AND of filters
    And(Vec<Filter>),

    /// Always evaluates to true
    IncludeAll,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Eq(field.to_string(), value.into())
    }

    pub fn is_in(field: &str, values: Vec<Value>) -> Self {
        Self::In(field.to_string(), values)
    }

    pub fn during(field: &str, from: NaiveDate, to: NaiveDate) -> Self {
        Self::During {
            field: field.to_string(),
            from,
            to,
        }
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            Self::IncludeAll => other,
            first => Self::And(vec![first, other]),
        }
    }

    /// Evaluate against one record. A missing attribute never matches.
    pub fn matches(&self, record: &FeatureRecord) -> bool {
        match self {
            Self::Eq(field, value) => record.get(field).is_some_and(|v| v == value),
            Self::In(field, values) => record
                .get(field)
                .is_some_and(|v| !v.is_null() && values.contains(v)),
            Self::During { field, from, to } => record
                .get(field)
                .and_then(Value::as_date)
                .is_some_and(|d| *from <= d && d < *to),
            Self::And(filters) => filters.iter().all(|f| f.matches(record)),
            Self::IncludeAll => true,
        }
    }

    /// All field names the filter reads.
    pub fn required_fields(&self) -> BTreeSet<&str> {
        let mut fields = BTreeSet::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, fields: &mut BTreeSet<&'a str>) {
        match self {
            Self::Eq(field, _) | Self::In(field, _) | Self::During { field, .. } => {
                fields.insert(field);
            }
            Self::And(filters) => {
                for f in filters {
                    f.collect_fields(fields);
                }
            }
            Self::IncludeAll => {}
        }
    }
}

fn fmt_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("NULL"),
        Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Value::Double(v) => write!(f, "{v}"),
        Value::Date(d) => write!(f, "'{}'", d.format("%Y-%m-%d")),
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(field, value) => {
                write!(f, "{field} = ")?;
                fmt_literal(f, value)
            }
            Self::In(field, values) => {
                write!(f, "{field} IN (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    fmt_literal(f, v)?;
                }
                f.write_str(")")
            }
            Self::During { field, from, to } => write!(
                f,
                "{field} DURING {}/{}",
                from.format("%Y-%m-%d"),
                to.format("%Y-%m-%d")
            ),
            Self::And(filters) => {
                for (i, filter) in filters.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    write!(f, "{filter}")?;
                }
                Ok(())
            }
            Self::IncludeAll => f.write_str("INCLUDE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn quotes_are_escaped_in_rendering_and_matched_literally() {
        let f = Filter::eq("a_plannaam", "x' OR '1'='1");
        assert_eq!(f.to_string(), "a_plannaam = 'x'' OR ''1''=''1'");

        let hit = FeatureRecord::new().with("a_plannaam", "x' OR '1'='1");
        let miss = FeatureRecord::new().with("a_plannaam", "T1");
        assert!(f.matches(&hit));
        assert!(!f.matches(&miss));
    }

    #[test]
    fn in_and_during_compose() {
        let f = Filter::is_in("terreinid", vec![Value::from(1.0), Value::from(2.0)])
            .and(Filter::during("datumuitgifte", d(2023, 1, 1), d(2023, 3, 1)));
        assert_eq!(
            f.to_string(),
            "terreinid IN (1,2) AND datumuitgifte DURING 2023-01-01/2023-03-01"
        );
        let row = |id: f64, date: NaiveDate| {
            FeatureRecord::new()
                .with("terreinid", id)
                .with("datumuitgifte", date)
        };
        assert!(f.matches(&row(1.0, d(2023, 1, 1))));
        assert!(!f.matches(&row(3.0, d(2023, 1, 1))));
        assert!(!f.matches(&row(2.0, d(2023, 3, 1))));
        assert_eq!(
            f.required_fields().into_iter().collect::<Vec<_>>(),
            vec!["datumuitgifte", "terreinid"]
        );
    }

    #[test]
    fn missing_attribute_never_matches() {
        let f = Filter::eq("naam", "Delft");
        assert!(!f.matches(&FeatureRecord::new()));
        assert!(Filter::IncludeAll.matches(&FeatureRecord::new()));
    }
}
