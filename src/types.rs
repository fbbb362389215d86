use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// A single attribute value as returned by a feature query.
///
/// Serializes untagged so a row object reads like plain JSON: strings,
/// numbers, `YYYY-MM-DD` dates and `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    String(String),
    Double(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(s) => write!(f, "{s}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Ordered attribute name -> value mapping for one feature.
///
/// Attribute order is the order the query (or the bucket builder) produced
/// them in. Lookups are linear; rows carry a handful of attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRecord {
    attributes: Vec<(String, Value)>,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used by tests and the bucket builder.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Attribute value, or `None` when the record does not carry `name` at all.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

pub type FeatureCollection = Vec<FeatureRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Double,
    Date,
}

impl AttributeType {
    /// Type tag understood by the data grid.
    pub fn grid_type(self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Double => "float",
            AttributeType::Date => "date",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STRING" => Some(AttributeType::String),
            "DOUBLE" => Some(AttributeType::Double),
            "DATE" => Some(AttributeType::Date),
            _ => None,
        }
    }
}

/// One exposed column of a dataset or of a synthesized aggregate row.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub alias: Option<String>,
    pub kind: AttributeType,
    pub id: Option<u64>,
}

impl AttributeDescriptor {
    pub fn new(name: &str, kind: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
            kind,
            id: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Column label; the alias when one is set.
    pub fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Individual,
    Aggregated,
    Issue,
}

impl ReportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INDIVIDUAL" => Some(ReportKind::Individual),
            "AGGREGATED" => Some(ReportKind::Aggregated),
            "ISSUE" => Some(ReportKind::Issue),
            _ => None,
        }
    }
}

/// Area granularity a report is scoped to and aggregated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaKind {
    Region,
    Municipality,
    Parcel,
}

impl AreaKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REGION" => Some(AreaKind::Region),
            "MUNICIPALITY" => Some(AreaKind::Municipality),
            "PARCEL" => Some(AreaKind::Parcel),
            _ => None,
        }
    }
}

impl fmt::Display for AreaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AreaKind::Region => "REGION",
            AreaKind::Municipality => "MUNICIPALITY",
            AreaKind::Parcel => "PARCEL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateGranularity {
    #[default]
    None,
    Month,
}

impl DateGranularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" | "" => Some(DateGranularity::None),
            "MONTH" => Some(DateGranularity::Month),
            _ => None,
        }
    }
}

/// The three mutually exclusive area names a request can carry.
///
/// Kept as three options so an invalid combination survives until
/// validation and can be reported instead of being unrepresentable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaSelector {
    pub region: Option<String>,
    pub municipality: Option<String>,
    pub parcel: Option<String>,
}

impl AreaSelector {
    pub fn region(name: &str) -> Self {
        Self {
            region: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn municipality(name: &str) -> Self {
        Self {
            municipality: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn parcel(name: &str) -> Self {
        Self {
            parcel: Some(name.to_string()),
            ..Self::default()
        }
    }
}

/// Half open date range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date < self.to
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    /// Base dataset the report runs against.
    pub dataset: Option<String>,
    /// Precomputed by the caller; the engine only reports it.
    pub authorized: bool,
    pub kind: Option<ReportKind>,
    pub area: AreaSelector,
    pub range: Option<DateRange>,
    /// Aggregation level; falls back to the kind of the selected area.
    pub level: Option<AreaKind>,
    pub granularity: DateGranularity,
    pub attr_names: Vec<String>,
}

impl ReportRequest {
    pub fn new(dataset: &str, kind: ReportKind, area: AreaSelector) -> Self {
        Self {
            dataset: Some(dataset.to_string()),
            authorized: true,
            kind: Some(kind),
            area,
            range: None,
            level: None,
            granularity: DateGranularity::None,
            attr_names: Vec::new(),
        }
    }

    pub fn with_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.range = Some(DateRange::new(from, to));
        self
    }

    pub fn with_level(mut self, level: AreaKind) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_granularity(mut self, granularity: DateGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_attr_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attr_names = names.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_insertion_order_and_overwrites_in_place() {
        let mut r = FeatureRecord::new().with("b", 1.0).with("a", "x");
        r.set("b", 2.0);
        let names: Vec<&str> = r.attributes().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(r.get("b"), Some(&Value::Double(2.0)));
        assert!(r.get("c").is_none());
    }

    #[test]
    fn values_serialize_as_plain_json() {
        let d = NaiveDate::from_ymd_opt(2023, 1, 10).unwrap();
        let json = serde_json::to_string(&vec![
            Value::Null,
            Value::from("T1"),
            Value::from(1.5),
            Value::from(d),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,"T1",1.5,"2023-01-10"]"#);
    }

    #[test]
    fn half_open_range() {
        let r = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
        );
        assert!(r.contains(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()));
        assert!(r.contains(NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()));
        assert!(!r.contains(NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()));
    }
}
