//! Warning, error, and statistics collection for conversions.
//!
//! Mappers record every degradation here instead of failing; the finished
//! [`ConversionResult`] is handed to the caller even when it carries errors.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use dochub_shared::DocHubError;

/// Block counts for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStatistics {
    /// Source nodes visited.
    pub total_blocks: usize,
    /// Target nodes emitted.
    pub converted_blocks: usize,
    /// Source nodes dropped under the `ignore` policy.
    pub skipped_blocks: usize,
    /// Source nodes omitted because of an error.
    pub error_blocks: usize,
    /// Distinct unsupported construct names, in first-seen order.
    pub unsupported_blocks: Vec<String>,
}

/// Outcome of a conversion: the content plus everything that went wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult<T> {
    pub content: T,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub statistics: ConversionStatistics,
}

impl<T> ConversionResult<T> {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        let s = &self.statistics;
        format!(
            "converted {} of {} blocks ({} skipped, {} errors), {} warnings",
            s.converted_blocks,
            s.total_blocks,
            s.skipped_blocks,
            self.errors.len(),
            self.warnings.len()
        )
    }
}

/// Outcome of validating markdown without converting it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Top-level block nodes found.
    pub block_count: usize,
}

/// Accumulates warnings, errors, and counts while a mapper runs.
#[derive(Debug, Default)]
pub(crate) struct Collector {
    warnings: Vec<String>,
    errors: Vec<String>,
    stats: ConversionStatistics,
}

impl Collector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "conversion warning");
        self.warnings.push(message);
    }

    /// Record an error for a source node that is omitted from the output.
    pub(crate) fn error(&mut self, err: DocHubError) {
        warn!(error = %err, "conversion error");
        self.errors.push(err.to_string());
        self.stats.error_blocks += 1;
    }

    pub(crate) fn visited(&mut self) {
        self.stats.total_blocks += 1;
    }

    pub(crate) fn converted(&mut self, count: usize) {
        self.stats.converted_blocks += count;
    }

    pub(crate) fn skipped(&mut self) {
        self.stats.skipped_blocks += 1;
    }

    pub(crate) fn unsupported(&mut self, kind: &str) {
        if !self.stats.unsupported_blocks.iter().any(|k| k == kind) {
            self.stats.unsupported_blocks.push(kind.to_string());
        }
    }

    pub(crate) fn finish<T>(self, content: T) -> ConversionResult<T> {
        ConversionResult {
            content,
            warnings: self.warnings,
            errors: self.errors,
            statistics: self.stats,
        }
    }
}
