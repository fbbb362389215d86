//! Configuration for report generation.

/// Knobs for a report run. `Default` matches what the grid client expects.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Row cap passed to every feature query
    pub max_rows: usize,
    /// Envelope message on success
    pub success_message: String,
    /// Date format hint attached to DATE fields of issue reports
    pub issue_date_format: String,
    /// Fail the whole report when a source row matches no bucket, instead of
    /// rejecting the row and reporting a warning
    pub strict_integrity: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_rows: 1000,
            success_message: "OK".to_string(),
            issue_date_format: "Y-m".to_string(),
            strict_integrity: false,
        }
    }
}

impl ReportConfig {
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_strict_integrity(mut self, strict: bool) -> Self {
        self.strict_integrity = strict;
        self
    }
}
