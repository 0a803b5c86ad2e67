// SPDX-License-Identifier: Apache-2.0

//! Comparison reporting: the per-strategy statistics re-expressed in every
//! unit tier, the reuse-as-percentage-of-pooled comparison, tracing output
//! and timestamped JSON files.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::aggregate::{percentage_of, LatencyAggregate};
use crate::error::StatsError;
use crate::unit::TimeUnit;

/// Errors that can occur while writing report files.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write the report file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize the report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One strategy's statistics in one unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitView {
    pub unit: TimeUnit,
    pub min: Decimal,
    pub max: Decimal,
    pub average: Decimal,
    pub total: Decimal,
}

impl UnitView {
    fn from_aggregate(aggregate: &LatencyAggregate) -> Self {
        Self {
            unit: aggregate.unit(),
            min: aggregate.min().unwrap_or(Decimal::ZERO),
            max: aggregate.max().unwrap_or(Decimal::ZERO),
            average: aggregate.average(),
            total: aggregate.total(),
        }
    }
}

/// One strategy's statistics across all three unit tiers.
#[derive(Debug, Clone, Serialize)]
pub struct StrategySummary {
    pub runs: usize,
    pub nanos: UnitView,
    pub millis: UnitView,
    pub seconds: UnitView,
}

impl StrategySummary {
    fn build(aggregate: &LatencyAggregate) -> Result<Self, StatsError> {
        let millis = aggregate.to_unit(TimeUnit::Millis)?;
        let seconds = aggregate.to_unit(TimeUnit::Seconds)?;
        Ok(Self {
            runs: aggregate.count(),
            nanos: UnitView::from_aggregate(aggregate),
            millis: UnitView::from_aggregate(&millis),
            seconds: UnitView::from_aggregate(&seconds),
        })
    }
}

/// Connection-reuse statistics as a percentage of the pooled strategy's.
#[derive(Debug, Clone, Serialize)]
pub struct PercentageComparison {
    pub min: Decimal,
    pub max: Decimal,
    pub average: Decimal,
}

/// Full comparison of the two strategies, immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub timestamp: DateTime<Utc>,
    pub loops: u32,
    pub times: u32,
    pub delay_ms: u64,
    pub connection_reuse: StrategySummary,
    pub pooled_template: StrategySummary,
    pub reuse_percent_of_pooled: PercentageComparison,
}

impl ComparisonReport {
    /// Build the comparison from the two nanosecond-denominated aggregates.
    pub fn build(
        loops: u32,
        times: u32,
        delay: Duration,
        reuse: &LatencyAggregate,
        pooled: &LatencyAggregate,
    ) -> Result<Self, StatsError> {
        let percentages = PercentageComparison {
            min: percentage_of(
                reuse.min().unwrap_or(Decimal::ZERO),
                pooled.min().unwrap_or(Decimal::ZERO),
            )?,
            max: percentage_of(
                reuse.max().unwrap_or(Decimal::ZERO),
                pooled.max().unwrap_or(Decimal::ZERO),
            )?,
            average: percentage_of(reuse.average(), pooled.average())?,
        };

        Ok(Self {
            timestamp: Utc::now(),
            loops,
            times,
            delay_ms: delay.as_millis() as u64,
            connection_reuse: StrategySummary::build(reuse)?,
            pooled_template: StrategySummary::build(pooled)?,
            reuse_percent_of_pooled: percentages,
        })
    }

    /// Log the comparison the way the per-loop summary reads.
    pub fn log(&self) {
        if self.times > 1 && self.delay_ms > 0 {
            info!(
                "ran the query sequence {} times with a {} millisecond sleep delay between runs",
                self.times, self.delay_ms
            );
        } else if self.times > 1 {
            info!("ran the query sequence {} times", self.times);
        } else {
            info!("ran the query sequence once");
        }

        for (name, summary) in [
            ("connection re-use", &self.connection_reuse),
            ("pooled template", &self.pooled_template),
        ] {
            info!(
                "{name} minimum time: {} ns, {} ms, {} s",
                summary.nanos.min, summary.millis.min, summary.seconds.min
            );
            info!(
                "{name} maximum time: {} ns, {} ms, {} s",
                summary.nanos.max, summary.millis.max, summary.seconds.max
            );
            info!(
                "{name} average time: {} ns, {} ms, {} s",
                summary.nanos.average, summary.millis.average, summary.seconds.average
            );
        }

        info!(
            "connection re-use as percentage of pooled template, min: {}, max: {}, average: {}",
            self.reuse_percent_of_pooled.min,
            self.reuse_percent_of_pooled.max,
            self.reuse_percent_of_pooled.average
        );
    }
}

/// Writes comparison reports to timestamped JSON files.
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ReportError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Save a report, returning the path to the created file.
    pub fn save(&self, report: &ComparisonReport) -> Result<PathBuf, ReportError> {
        let timestamp = report.timestamp.format("%Y-%m-%dT%H-%M-%SZ");
        let filepath = self.output_dir.join(format!("comparison_{timestamp}.json"));

        let file = File::create(&filepath)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, report)?;

        Ok(filepath)
    }
}
