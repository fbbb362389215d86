//! Error handling for report generation.
//!
//! Every failure a report can hit ends up in the envelope `message`; the
//! variants below only decide how that message reads and how it is logged.

use std::io;

/// Errors raised while validating, querying or aggregating a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Missing or conflicting request parameters
    #[error("{0}")]
    InvalidRequest(String),

    /// The caller was not allowed to read the dataset
    #[error("Not authorized.")]
    Unauthorized,

    /// Backend fault while fetching rows
    #[error("Query error on {dataset}: {message}")]
    Query { dataset: String, message: String },

    /// A source row points at a bucket that was never built
    #[error("Data integrity fault: {0}")]
    DataIntegrity(String),

    /// Requested attributes do not fit the dataset schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// IO error while reading or writing files
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV error in the loader or row export
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error while writing the envelope
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn query(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            dataset: dataset.into(),
            message: message.into(),
        }
    }
}

/// Result type for report operations
pub type Result<T> = std::result::Result<T, ReportError>;
