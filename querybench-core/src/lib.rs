// SPDX-License-Identifier: Apache-2.0

//! querybench core library
//!
//! Benchmarks two strategies for issuing a fixed sequence of SQL queries -
//! a hand-managed, reused raw connection versus a pooled checkout per
//! operation - and reports comparative latency statistics.
//!
//! # Components
//!
//! - [`aggregate::LatencyAggregate`]: accumulates timing samples, tracks
//!   min/max/total/average, merges aggregates and re-expresses them in
//!   coarser time units
//! - [`acquire::StatementSource`]: resilient statement acquisition with a
//!   bounded lenient/strict retry loop and conditional connection refresh
//! - [`probe::QueryProbe`]: one probe run = the fixed representative query
//!   sequence = one latency sample
//! - [`scheduler::BenchmarkScheduler`]: fair random interleaving of the two
//!   strategies across repeated runs and main loops

pub mod acquire;
pub mod aggregate;
pub mod config;
pub mod error;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod unit;

pub use aggregate::{percentage_of, LatencyAggregate};
pub use config::Config;
pub use error::{BenchError, BenchResult};
pub use report::ComparisonReport;
pub use scheduler::BenchmarkScheduler;
pub use store::StrategyKind;
pub use unit::TimeUnit;
