//! Area report engine.
//!
//! Groups feature records by area (and optionally by calendar month), sums
//! their measures into a gap-free set of buckets and serializes the result
//! as a self-describing grid payload.

pub mod aggregate;
pub mod area;
pub mod buckets;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod reports;
pub mod schema;
pub mod store;
pub mod types;
pub mod util;

pub use config::ReportConfig;
pub use error::{ReportError, Result};
pub use output::Envelope;
pub use reports::run_report;
pub use store::{FeatureStore, MemoryDataset, MemoryStore};
pub use types::{
    AreaKind, AreaSelector, DateGranularity, FeatureRecord, ReportKind, ReportRequest, Value,
};
