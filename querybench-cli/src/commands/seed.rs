// SPDX-License-Identifier: Apache-2.0

//! The `seed` command: create the benchmark tables and fill them with a
//! deterministic dataset.

use rusqlite::Connection;
use tracing::info;

use querybench_core::error::StoreError;
use querybench_core::store::schema;
use querybench_core::{BenchResult, Config};

pub fn execute(config_path: &str, rows: u32) -> BenchResult<()> {
    let config = Config::load(config_path)?;
    let path = &config.database.path;

    let mut conn = Connection::open(path).map_err(|e| StoreError::Open {
        path: path.clone(),
        source: e,
    })?;

    schema::init(&conn)?;
    schema::seed(&mut conn, rows)?;

    info!(database = %path.display(), rows, "seeded benchmark dataset");
    Ok(())
}
