// SPDX-License-Identifier: Apache-2.0

//! Latency aggregation: accumulate timing samples, track min/max/total and
//! average, merge aggregates and re-express them in coarser time units.
//!
//! All statistics are `Decimal` so the fixed 4-decimal round-half-up
//! contract holds exactly. Whenever an aggregate holds at least one sample,
//! `min <= average <= max`.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::StatsError;
use crate::unit::TimeUnit;

/// Decimal places used for averages, conversions and percentages.
const SCALE: u32 = 4;

fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Accumulated statistics over a set of latency samples in one time unit.
///
/// Samples are kept in insertion order for auditability; the derived
/// statistics are order-independent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyAggregate {
    unit: TimeUnit,
    samples: Vec<Decimal>,
    min: Option<Decimal>,
    max: Option<Decimal>,
    total: Decimal,
}

impl LatencyAggregate {
    /// Create an empty aggregate denominated in `unit`.
    pub fn new(unit: TimeUnit) -> Self {
        Self {
            unit,
            samples: Vec::new(),
            min: None,
            max: None,
            total: Decimal::ZERO,
        }
    }

    /// Create an aggregate from an initial sample collection.
    pub fn from_samples(unit: TimeUnit, samples: impl IntoIterator<Item = Decimal>) -> Self {
        let mut aggregate = Self::new(unit);
        aggregate.add_samples(samples);
        aggregate
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn samples(&self) -> &[Decimal] {
        &self.samples
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn min(&self) -> Option<Decimal> {
        self.min
    }

    pub fn max(&self) -> Option<Decimal> {
        self.max
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Average of all samples, rounded half-up to 4 decimal places.
    /// Zero by convention when the aggregate is empty.
    pub fn average(&self) -> Decimal {
        if self.samples.is_empty() {
            return Decimal::ZERO;
        }

        round_half_up(self.total / Decimal::from(self.samples.len() as u64))
    }

    /// Append one sample and update min/max/total.
    pub fn add_sample(&mut self, sample: Decimal) {
        self.samples.push(sample);
        self.min = Some(self.min.map_or(sample, |m| m.min(sample)));
        self.max = Some(self.max.map_or(sample, |m| m.max(sample)));
        self.total += sample;
    }

    /// Append a sample that may be absent. An absent sample is ignored
    /// rather than propagated into min/max.
    pub fn add_optional(&mut self, sample: Option<Decimal>) {
        if let Some(sample) = sample {
            self.add_sample(sample);
        }
    }

    pub fn add_samples(&mut self, samples: impl IntoIterator<Item = Decimal>) {
        for sample in samples {
            self.add_sample(sample);
        }
    }

    /// Merge another aggregate into this one. Equivalent to adding the
    /// other's samples one by one; min/max/total are order-independent.
    pub fn merge(&mut self, other: &LatencyAggregate) -> Result<(), StatsError> {
        if other.unit != self.unit {
            return Err(StatsError::UnitMismatch {
                expected: self.unit,
                found: other.unit,
            });
        }

        self.add_samples(other.samples.iter().copied());
        Ok(())
    }

    /// Fold a collection of aggregates sharing one unit into a single
    /// aggregate. The unit is inferred from the first element, so an empty
    /// collection is an error, as is any mixed-unit collection.
    pub fn reduce<'a>(
        aggregates: impl IntoIterator<Item = &'a LatencyAggregate>,
    ) -> Result<LatencyAggregate, StatsError> {
        let mut iter = aggregates.into_iter();
        let first = iter.next().ok_or(StatsError::EmptyReduce)?;

        let mut result = LatencyAggregate::new(first.unit);
        result.merge(first)?;
        for aggregate in iter {
            result.merge(aggregate)?;
        }

        Ok(result)
    }

    /// Re-express this aggregate in a coarser unit, producing a new
    /// aggregate with every sample divided by the conversion factor and
    /// rounded half-up to 4 decimal places.
    ///
    /// Converting to the same unit returns an equivalent copy. Any
    /// coarser-to-finer request is rejected.
    pub fn to_unit(&self, target: TimeUnit) -> Result<LatencyAggregate, StatsError> {
        if target == self.unit {
            return Ok(self.clone());
        }

        let factor = self
            .unit
            .factor_to(target)
            .ok_or(StatsError::UnsupportedConversion {
                from: self.unit,
                to: target,
            })?;

        let converted = self.samples.iter().map(|sample| round_half_up(*sample / factor));
        Ok(LatencyAggregate::from_samples(target, converted))
    }
}

/// `(numerator / denominator) * 100`, rounded half-up to 4 decimal places.
///
/// The zero denominator is checked explicitly rather than trapped, so the
/// caller never sees infinity or NaN-like behavior.
pub fn percentage_of(numerator: Decimal, denominator: Decimal) -> Result<Decimal, StatsError> {
    if denominator.is_zero() {
        return Err(StatsError::DivisionByZero);
    }

    Ok(round_half_up(numerator * Decimal::from(100_u32) / denominator))
}
