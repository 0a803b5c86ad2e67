// SPDX-License-Identifier: Apache-2.0

//! The `validate` command: load a configuration file and report whether it
//! passes the fail-fast checks.

use tracing::info;

use querybench_core::{BenchResult, Config};

pub fn execute(file: &str) -> BenchResult<()> {
    let config = Config::load(file)?;

    info!(
        database = %config.database.path.display(),
        times = config.benchmark.times,
        loops = config.benchmark.loops,
        "configuration is valid"
    );
    Ok(())
}
