// SPDX-License-Identifier: Apache-2.0

//! The `run` command: build both strategies from configuration, drive the
//! scheduler and log per-loop and overall comparisons.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use querybench_core::probe::QueryProbe;
use querybench_core::report::JsonReporter;
use querybench_core::scheduler::BenchmarkScheduler;
use querybench_core::store::pooled::PooledStore;
use querybench_core::store::raw::{ReusedConnectionStore, SqliteProvider};
use querybench_core::store::StrategyKind;
use querybench_core::{BenchResult, ComparisonReport, Config};

pub fn execute(config_path: &str) -> BenchResult<()> {
    let config = Config::load(config_path)?;
    let bench = &config.benchmark;

    let provider = SqliteProvider::new(&config.database.path, config.database.fetch_size);
    let mut reuse = ReusedConnectionStore::open(provider, bench.prepare_retries)?;
    let mut pooled = PooledStore::open(
        &config.database.path,
        config.database.pool_size,
        config.database.fetch_size,
    )?;

    let scheduler = BenchmarkScheduler::new(
        bench.times,
        bench.delay,
        bench.loops,
        QueryProbe::new(bench.batch_size),
    );
    let mut rng = StdRng::from_entropy();

    let outcome = scheduler.run(&mut reuse, &mut pooled, &mut rng)?;

    for (index, results) in outcome.per_loop.iter().enumerate() {
        info!(iteration = index, "finished a main loop");
        let report = ComparisonReport::build(
            1,
            bench.times,
            bench.delay,
            &results[&StrategyKind::ConnectionReuse],
            &results[&StrategyKind::PooledTemplate],
        )?;
        report.log();
    }

    info!(
        loops = bench.loops,
        times = bench.times,
        delay_ms = bench.delay.as_millis() as u64,
        "overall results across all main loops"
    );
    let overall = ComparisonReport::build(
        bench.loops,
        bench.times,
        bench.delay,
        &outcome.overall[&StrategyKind::ConnectionReuse],
        &outcome.overall[&StrategyKind::PooledTemplate],
    )?;
    overall.log();

    if let Some(dir) = &bench.report_dir {
        let path = JsonReporter::new(dir)?.save(&overall)?;
        info!(path = %path.display(), "wrote comparison report");
    }

    Ok(())
}
