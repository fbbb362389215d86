//! Feature store collaborators.
//!
//! The engine only needs a schema lookup, a one-to-many relation lookup and
//! a row query. Sources are opened per query and released by
//! [`DatasetHandle`] when it goes out of scope, whatever the outcome.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::{ReportError, Result};
use crate::filter::Filter;
use crate::types::{AttributeDescriptor, FeatureCollection, FeatureRecord, Value};

pub type DatasetId = String;

/// A row query against one dataset.
#[derive(Debug, Clone)]
pub struct Query {
    pub dataset: DatasetId,
    /// Attributes to return, in order
    pub fields: Vec<String>,
    pub filter: Filter,
    pub max_rows: usize,
    /// Label used by backends in their own logs
    pub handle: String,
}

impl Query {
    pub fn new(dataset: &str, handle: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            fields: Vec::new(),
            filter: Filter::IncludeAll,
            max_rows: usize::MAX,
            handle: handle.to_string(),
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }
}

/// An open, queryable dataset.
pub trait FeatureSource {
    fn query(&self, query: &Query) -> Result<FeatureCollection>;

    /// Release backend resources. Called exactly once by [`DatasetHandle`].
    fn dispose(&mut self);
}

/// Catalog of datasets the report engine reads from.
pub trait FeatureStore {
    fn schema(&self, dataset: &str) -> Result<Vec<AttributeDescriptor>>;

    /// The foreign dataset of the first one-to-many relation, if any.
    fn related_dataset(&self, dataset: &str) -> Option<DatasetId>;

    fn open_source(&self, dataset: &str) -> Result<Box<dyn FeatureSource + '_>>;

    fn open(&self, dataset: &str) -> Result<DatasetHandle<'_>> {
        let source = self.open_source(dataset)?;
        debug!("opened dataset {dataset}");
        Ok(DatasetHandle {
            dataset: dataset.to_string(),
            source,
        })
    }
}

/// Scoped access to an open source; disposes it on drop.
pub struct DatasetHandle<'a> {
    dataset: DatasetId,
    source: Box<dyn FeatureSource + 'a>,
}

impl DatasetHandle<'_> {
    pub fn query(&self, query: &Query) -> Result<FeatureCollection> {
        debug!(
            "query {} on {}: fields {:?}, filter {}",
            query.handle, self.dataset, query.fields, query.filter
        );
        self.source.query(query)
    }
}

impl Drop for DatasetHandle<'_> {
    fn drop(&mut self) {
        self.source.dispose();
        debug!("released dataset {}", self.dataset);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    pub schema: Vec<AttributeDescriptor>,
    pub rows: FeatureCollection,
    pub related: Option<DatasetId>,
}

/// In-memory store used by the CLI and by tests.
///
/// Keeps counters of opened/released sources and executed queries so callers
/// can check that every handle was returned.
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: HashMap<DatasetId, MemoryDataset>,
    failing: HashSet<DatasetId>,
    stats: StoreStats,
}

#[derive(Debug, Default)]
pub struct StoreStats {
    opened: Cell<usize>,
    released: Cell<usize>,
    queries: Cell<usize>,
}

impl StoreStats {
    pub fn opened(&self) -> usize {
        self.opened.get()
    }

    pub fn released(&self) -> usize {
        self.released.get()
    }

    pub fn queries(&self) -> usize {
        self.queries.get()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, dataset: MemoryDataset) {
        self.datasets.insert(name.to_string(), dataset);
    }

    /// Relate `base` one-to-many to `related`.
    pub fn relate(&mut self, base: &str, related: &str) {
        if let Some(ds) = self.datasets.get_mut(base) {
            ds.related = Some(related.to_string());
        }
    }

    /// Make every query against `dataset` fail with a backend error.
    pub fn fail_queries(&mut self, dataset: &str) {
        self.failing.insert(dataset.to_string());
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    fn get(&self, name: &str) -> Result<&MemoryDataset> {
        self.datasets
            .get(name)
            .ok_or_else(|| ReportError::query(name, "unknown dataset"))
    }
}

impl FeatureStore for MemoryStore {
    fn schema(&self, dataset: &str) -> Result<Vec<AttributeDescriptor>> {
        Ok(self.get(dataset)?.schema.clone())
    }

    fn related_dataset(&self, dataset: &str) -> Option<DatasetId> {
        self.datasets.get(dataset).and_then(|ds| ds.related.clone())
    }

    fn open_source(&self, dataset: &str) -> Result<Box<dyn FeatureSource + '_>> {
        let data = self.get(dataset)?;
        self.stats.opened.set(self.stats.opened.get() + 1);
        Ok(Box::new(MemorySource {
            name: dataset.to_string(),
            data,
            failing: self.failing.contains(dataset),
            stats: &self.stats,
        }))
    }
}

struct MemorySource<'a> {
    name: String,
    data: &'a MemoryDataset,
    failing: bool,
    stats: &'a StoreStats,
}

impl FeatureSource for MemorySource<'_> {
    fn query(&self, query: &Query) -> Result<FeatureCollection> {
        self.stats.queries.set(self.stats.queries.get() + 1);
        if self.failing {
            return Err(ReportError::query(&self.name, "backend unavailable"));
        }
        let filter_fields = query.filter.required_fields();
        if let Some(unknown) = query
            .fields
            .iter()
            .map(String::as_str)
            .chain(filter_fields)
            .find(|f| !self.data.schema.iter().any(|a| a.name == *f))
        {
            return Err(ReportError::query(
                &self.name,
                format!("unknown property '{unknown}'"),
            ));
        }
        let rows = self
            .data
            .rows
            .iter()
            .filter(|r| query.filter.matches(r))
            .take(query.max_rows)
            .map(|r| project(r, &query.fields))
            .collect();
        Ok(rows)
    }

    fn dispose(&mut self) {
        self.stats.released.set(self.stats.released.get() + 1);
    }
}

fn project(record: &FeatureRecord, fields: &[String]) -> FeatureRecord {
    if fields.is_empty() {
        return record.clone();
    }
    let mut out = FeatureRecord::new();
    for f in fields {
        out.set(f, record.get(f).cloned().unwrap_or(Value::Null));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeType;

    fn store() -> MemoryStore {
        let mut s = MemoryStore::new();
        s.insert(
            "base",
            MemoryDataset {
                schema: vec![
                    AttributeDescriptor::new("id", AttributeType::Double),
                    AttributeDescriptor::new("naam", AttributeType::String),
                ],
                rows: vec![
                    FeatureRecord::new().with("id", 1.0).with("naam", "Delft"),
                    FeatureRecord::new().with("id", 2.0).with("naam", "Gouda"),
                    FeatureRecord::new().with("id", 3.0).with("naam", "Delft"),
                ],
                related: None,
            },
        );
        s
    }

    #[test]
    fn handle_is_released_after_query() {
        let s = store();
        {
            let h = s.open("base").unwrap();
            let rows = h
                .query(
                    &Query::new("base", "t")
                        .fields(["naam"])
                        .filter(Filter::eq("naam", "Delft"))
                        .max_rows(1),
                )
                .unwrap();
            assert_eq!(rows, vec![FeatureRecord::new().with("naam", "Delft")]);
            assert_eq!(s.stats().released(), 0);
        }
        assert_eq!(s.stats().opened(), 1);
        assert_eq!(s.stats().released(), 1);
    }

    #[test]
    fn handle_outlives_the_requested_name() {
        let s = store();
        let h = {
            let name = String::from("base");
            s.open(&name).unwrap()
        };
        assert_eq!(h.query(&Query::new("base", "t")).unwrap().len(), 3);
    }

    #[test]
    fn failing_and_unknown_fields_are_query_errors() {
        let mut s = store();
        let h = s.open("base").unwrap();
        let err = h
            .query(&Query::new("base", "t").fields(["missing"]))
            .unwrap_err();
        assert!(matches!(err, ReportError::Query { .. }));
        let err = h
            .query(&Query::new("base", "t").filter(Filter::eq("gemeente", "Delft")))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Query error on base: unknown property 'gemeente'"
        );
        drop(h);

        s.fail_queries("base");
        let h = s.open("base").unwrap();
        assert!(h.query(&Query::new("base", "t")).is_err());
        drop(h);
        assert_eq!(s.stats().released(), 2);
    }
}
