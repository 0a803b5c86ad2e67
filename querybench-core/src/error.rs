// SPDX-License-Identifier: Apache-2.0

//! Custom error types for the benchmark engine.
//!
//! All errors are explicit enum variants - no `Box<dyn Error>`, no
//! `anyhow::Result`. Aggregation-engine guards (`DivisionByZero`, unit
//! mismatches, unsupported conversions) are checked conditions, not caught
//! generically; close failures never appear here because they are logged
//! and swallowed at the point of closing.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StrategyKind;
use crate::unit::TimeUnit;

/// Top-level error type for the benchmark engine.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("aggregation error: {0}")]
    Stats(#[from] StatsError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("report error: {0}")]
    Report(#[from] crate::report::ReportError),
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

/// Guard conditions raised by the latency aggregation engine.
///
/// These are programmer-error-class checks: every one of them is verified
/// explicitly before the arithmetic that would otherwise misbehave.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("cannot compute a percentage against a zero denominator")]
    DivisionByZero,

    #[error("cannot reduce an empty collection of aggregates: no unit to infer")]
    EmptyReduce,

    #[error("aggregate unit mismatch: expected {expected}, found {found}")]
    UnitMismatch { expected: TimeUnit, found: TimeUnit },

    #[error("unsupported unit conversion from {from} to {to}: only finer-to-coarser is allowed")]
    UnsupportedConversion { from: TimeUnit, to: TimeUnit },
}

/// Failure reported by a connection handle or connection provider.
///
/// Carried as an opaque context/message pair so the retry engine stays
/// independent of any particular database driver.
#[derive(Debug, Clone, Error)]
#[error("{context}: {message}")]
pub struct HandleError {
    pub context: &'static str,
    pub message: String,
}

impl HandleError {
    pub fn new(context: &'static str, message: impl Into<String>) -> Self {
        Self {
            context,
            message: message.into(),
        }
    }
}

/// Errors from the resilient statement acquisition layer.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The strict final attempt failed; retries are exhausted.
    #[error("statement acquisition failed after {attempts} attempts")]
    StatementAcquisition {
        attempts: u32,
        #[source]
        source: HandleError,
    },

    /// The connection provider could not supply a replacement handle.
    #[error("could not obtain a fresh connection")]
    Connect(#[source] HandleError),
}

/// Errors from the record stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error("failed to execute {operation}")]
    Query {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A row came back but could not be decoded into a record. The sample
    /// for the run in progress is lost; the run is reported as failed.
    #[error("failed to extract a row during {operation}: {detail}")]
    RowExtraction {
        operation: &'static str,
        detail: String,
    },

    #[error("failed to check a connection out of the pool")]
    PoolCheckout(#[from] r2d2::Error),

    #[error("failed to open the database at {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

/// Errors from a single probe run.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("the id table is empty: nothing to probe")]
    EmptyDataset,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the benchmark scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A strategy kept failing until its per-loop attempt budget ran out.
    /// Failed runs do not advance the completed-run counter, so the cap is
    /// what prevents an endlessly failing strategy from looping forever.
    #[error("strategy {strategy} exhausted its attempt budget ({attempts} attempts)")]
    AttemptBudgetExhausted {
        strategy: StrategyKind,
        attempts: u32,
        #[source]
        last: Box<ProbeError>,
    },
}

/// Configuration loading and validation errors. Validation is fail-fast:
/// an invalid field prevents startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("configuration parse error: {message}")]
    Parse { message: String },

    #[error("invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_error_display_names_units() {
        let err = StatsError::UnsupportedConversion {
            from: TimeUnit::Seconds,
            to: TimeUnit::Nanos,
        };
        assert!(err.to_string().contains('s'));
        assert!(err.to_string().contains("ns"));
    }

    #[test]
    fn acquire_error_folds_into_store_error() {
        let err = AcquireError::StatementAcquisition {
            attempts: 3,
            source: HandleError::new("prepare", "no such table"),
        };
        let store_err: StoreError = err.into();
        assert!(matches!(store_err, StoreError::Acquire(_)));
    }

    #[test]
    fn invalid_field_display() {
        let err = ConfigError::InvalidFieldValue {
            field: "benchmark.times",
            value: "0".to_string(),
            reason: "must be at least 1",
        };
        assert!(err.to_string().contains("benchmark.times"));
        assert!(err.to_string().contains("at least 1"));
    }
}
