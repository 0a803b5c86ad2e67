// SPDX-License-Identifier: Apache-2.0

//! Fair interleaving of the two strategies across repeated probe runs.
//!
//! The alternation rule guarantees exact fairness at completion: both
//! strategies finish with exactly `times` completed runs, while the order
//! in which they run is random. Tests therefore treat the sequence as
//! non-deterministic but the final counts as deterministic.
//!
//! A failed probe run does not advance the completed-run counter; a
//! per-strategy attempt budget of `4 x times` per loop bounds the retries.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::aggregate::LatencyAggregate;
use crate::error::{BenchResult, SchedulerError};
use crate::probe::QueryProbe;
use crate::store::{RecordStore, StrategyKind};
use crate::unit::TimeUnit;

/// Per-strategy completed-run (or attempt) counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    connection_reuse: u32,
    pooled_template: u32,
}

impl RunCounts {
    pub fn of(&self, kind: StrategyKind) -> u32 {
        match kind {
            StrategyKind::ConnectionReuse => self.connection_reuse,
            StrategyKind::PooledTemplate => self.pooled_template,
        }
    }

    fn bump(&mut self, kind: StrategyKind) {
        match kind {
            StrategyKind::ConnectionReuse => self.connection_reuse += 1,
            StrategyKind::PooledTemplate => self.pooled_template += 1,
        }
    }

    fn all_done(&self, target: u32) -> bool {
        self.connection_reuse >= target && self.pooled_template >= target
    }
}

/// Decide which strategy runs next.
///
/// Both counters at the target means the run is over. One finished counter
/// forces the unfinished strategy; otherwise the choice is a fair coin.
pub fn next_strategy(
    counts: &RunCounts,
    target: u32,
    rng: &mut impl Rng,
) -> Option<StrategyKind> {
    let reuse = counts.of(StrategyKind::ConnectionReuse);
    let pooled = counts.of(StrategyKind::PooledTemplate);

    if reuse >= target && pooled >= target {
        return None;
    }
    if pooled >= target {
        return Some(StrategyKind::ConnectionReuse);
    }
    if reuse >= target {
        return Some(StrategyKind::PooledTemplate);
    }

    Some(if rng.gen_bool(0.5) {
        StrategyKind::ConnectionReuse
    } else {
        StrategyKind::PooledTemplate
    })
}

/// Results of a full benchmark: one aggregate per strategy per loop, plus
/// the reduction of all loops per strategy.
pub struct BenchmarkOutcome {
    pub per_loop: Vec<HashMap<StrategyKind, LatencyAggregate>>,
    pub overall: HashMap<StrategyKind, LatencyAggregate>,
}

pub struct BenchmarkScheduler {
    times: u32,
    delay: Duration,
    loops: u32,
    probe: QueryProbe,
    attempt_cap: u32,
}

impl BenchmarkScheduler {
    pub fn new(times: u32, delay: Duration, loops: u32, probe: QueryProbe) -> Self {
        Self {
            times,
            delay,
            loops,
            probe,
            attempt_cap: times.saturating_mul(4),
        }
    }

    pub fn times(&self) -> u32 {
        self.times
    }

    pub fn loops(&self) -> u32 {
        self.loops
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run one main loop: interleave probe runs until both strategies have
    /// completed exactly `times` runs, producing one nanosecond-denominated
    /// aggregate per strategy.
    pub fn run_loop(
        &self,
        reuse: &mut dyn RecordStore,
        pooled: &mut dyn RecordStore,
        rng: &mut impl Rng,
    ) -> Result<HashMap<StrategyKind, LatencyAggregate>, SchedulerError> {
        let mut counts = RunCounts::default();
        let mut attempts = RunCounts::default();
        let mut aggregates: HashMap<StrategyKind, LatencyAggregate> = HashMap::from([
            (StrategyKind::ConnectionReuse, LatencyAggregate::new(TimeUnit::Nanos)),
            (StrategyKind::PooledTemplate, LatencyAggregate::new(TimeUnit::Nanos)),
        ]);

        while let Some(kind) = next_strategy(&counts, self.times, rng) {
            let store: &mut dyn RecordStore = match kind {
                StrategyKind::ConnectionReuse => &mut *reuse,
                StrategyKind::PooledTemplate => &mut *pooled,
            };

            attempts.bump(kind);
            info!(strategy = %kind, run = counts.of(kind), "probe run");

            match self.probe.run(store) {
                Ok(sample) => {
                    if let Some(aggregate) = aggregates.get_mut(&kind) {
                        aggregate.add_sample(sample);
                    }
                    counts.bump(kind);
                }
                Err(e) => {
                    warn!(strategy = %kind, error = %e, "probe run failed, not counting it");
                    if attempts.of(kind) >= self.attempt_cap {
                        return Err(SchedulerError::AttemptBudgetExhausted {
                            strategy: kind,
                            attempts: attempts.of(kind),
                            last: Box::new(e),
                        });
                    }
                }
            }

            if !self.delay.is_zero() && !counts.all_done(self.times) {
                info!("not all runs are done, sleeping to introduce arbitrary separation");
                thread::sleep(self.delay);
            }
        }

        Ok(aggregates)
    }

    /// Run every main loop and reduce the per-loop aggregates into one
    /// overall aggregate per strategy.
    pub fn run(
        &self,
        reuse: &mut dyn RecordStore,
        pooled: &mut dyn RecordStore,
        rng: &mut impl Rng,
    ) -> BenchResult<BenchmarkOutcome> {
        let mut per_loop = Vec::with_capacity(self.loops as usize);

        info!(loops = self.loops, times = self.times, "beginning runs");
        for index in 0..self.loops {
            info!(iteration = index, "starting main loop");
            per_loop.push(self.run_loop(reuse, pooled, rng)?);
        }
        info!("done with runs");

        let mut overall = HashMap::new();
        for kind in [StrategyKind::ConnectionReuse, StrategyKind::PooledTemplate] {
            let loops = per_loop.iter().filter_map(|results| results.get(&kind));
            overall.insert(kind, LatencyAggregate::reduce(loops)?);
        }

        Ok(BenchmarkOutcome { per_loop, overall })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::probe::tests::StubStore;

    fn counts(reuse: u32, pooled: u32) -> RunCounts {
        RunCounts {
            connection_reuse: reuse,
            pooled_template: pooled,
        }
    }

    #[test]
    fn both_finished_means_no_next_strategy() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(next_strategy(&counts(5, 5), 5, &mut rng), None);
    }

    #[test]
    fn the_unfinished_strategy_is_forced() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            next_strategy(&counts(5, 3), 5, &mut rng),
            Some(StrategyKind::PooledTemplate)
        );
        assert_eq!(
            next_strategy(&counts(2, 5), 5, &mut rng),
            Some(StrategyKind::ConnectionReuse)
        );
    }

    #[test]
    fn unfinished_pair_picks_one_of_the_two() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            assert!(next_strategy(&counts(0, 0), 5, &mut rng).is_some());
        }
    }

    #[test]
    fn five_runs_each_with_no_delay_completes_exactly() {
        let mut reuse = StubStore::with_rows(StrategyKind::ConnectionReuse, 6);
        let mut pooled = StubStore::with_rows(StrategyKind::PooledTemplate, 6);
        let scheduler =
            BenchmarkScheduler::new(5, Duration::ZERO, 1, QueryProbe::new(3));
        let mut rng = StdRng::seed_from_u64(42);

        let results = scheduler.run_loop(&mut reuse, &mut pooled, &mut rng).unwrap();

        let reuse_agg = &results[&StrategyKind::ConnectionReuse];
        let pooled_agg = &results[&StrategyKind::PooledTemplate];
        assert_eq!(reuse_agg.count(), 5);
        assert_eq!(pooled_agg.count(), 5);
        assert_eq!(reuse_agg.count() + pooled_agg.count(), 10);
    }

    #[test]
    fn failed_runs_are_retried_without_advancing_the_counter() {
        let mut reuse = StubStore::with_rows(StrategyKind::ConnectionReuse, 6);
        reuse.fail_runs = 2;
        let mut pooled = StubStore::with_rows(StrategyKind::PooledTemplate, 6);
        let scheduler =
            BenchmarkScheduler::new(3, Duration::ZERO, 1, QueryProbe::new(3));
        let mut rng = StdRng::seed_from_u64(9);

        let results = scheduler.run_loop(&mut reuse, &mut pooled, &mut rng).unwrap();

        // Both strategies still complete exactly the target despite the
        // two lost samples.
        assert_eq!(results[&StrategyKind::ConnectionReuse].count(), 3);
        assert_eq!(results[&StrategyKind::PooledTemplate].count(), 3);
    }

    #[test]
    fn a_persistently_failing_strategy_exhausts_its_budget() {
        let mut reuse = StubStore::with_rows(StrategyKind::ConnectionReuse, 6);
        reuse.fail_runs = u32::MAX;
        let mut pooled = StubStore::with_rows(StrategyKind::PooledTemplate, 6);
        let scheduler =
            BenchmarkScheduler::new(2, Duration::ZERO, 1, QueryProbe::new(3));
        let mut rng = StdRng::seed_from_u64(11);

        let err = scheduler
            .run_loop(&mut reuse, &mut pooled, &mut rng)
            .unwrap_err();

        match err {
            SchedulerError::AttemptBudgetExhausted { strategy, attempts, .. } => {
                assert_eq!(strategy, StrategyKind::ConnectionReuse);
                assert_eq!(attempts, 8);
            }
        }
    }

    #[test]
    fn loops_reduce_into_one_overall_aggregate_per_strategy() {
        let mut reuse = StubStore::with_rows(StrategyKind::ConnectionReuse, 6);
        let mut pooled = StubStore::with_rows(StrategyKind::PooledTemplate, 6);
        let scheduler =
            BenchmarkScheduler::new(2, Duration::ZERO, 3, QueryProbe::new(3));
        let mut rng = StdRng::seed_from_u64(5);

        let outcome = scheduler.run(&mut reuse, &mut pooled, &mut rng).unwrap();

        assert_eq!(outcome.per_loop.len(), 3);
        for kind in [StrategyKind::ConnectionReuse, StrategyKind::PooledTemplate] {
            let overall = &outcome.overall[&kind];
            assert_eq!(overall.count(), 6);
            let min = overall.min().unwrap();
            let max = overall.max().unwrap();
            assert!(min <= overall.average() && overall.average() <= max);
        }
    }
}
