// SPDX-License-Identifier: Apache-2.0

//! The pooled strategy: every operation checks a connection out of an r2d2
//! pool, runs its statement and hands the connection straight back.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use chrono::NaiveDateTime;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, OptionalExtension, Statement};

use crate::error::StoreError;
use crate::store::{
    classify, data_record_from_row, log_runtime, meta_record_from_row, sql, DataRecord,
    MetaRecord, RecordStore, StrategyKind,
};

/// Record store backed by a connection pool.
pub struct PooledStore {
    pool: Pool<SqliteConnectionManager>,
}

impl PooledStore {
    /// Build the pool. The fetch-size pragma is applied once per pooled
    /// connection through the manager's init hook.
    pub fn open(
        path: impl AsRef<Path>,
        pool_size: u32,
        fetch_size: i64,
    ) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(move |conn| conn.pragma_update(None, "cache_size", fetch_size));
        let pool = Pool::builder().max_size(pool_size).build(manager)?;
        Ok(Self { pool })
    }

    fn query<T>(
        &self,
        sql: &str,
        operation: &'static str,
        run: impl FnOnce(&mut Statement<'_>) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let started = Instant::now();
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql).map_err(|e| classify(operation, e))?;
        let result = run(&mut stmt).map_err(|e| classify(operation, e))?;
        log_runtime(started, operation);
        Ok(result)
    }
}

impl RecordStore for PooledStore {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PooledTemplate
    }

    fn ids(&mut self) -> Result<Vec<i64>, StoreError> {
        self.query(sql::IDS, "ids", |stmt| {
            stmt.query_map([], |row| row.get(0))?.collect()
        })
    }

    fn record_by_id(&mut self, id: i64) -> Result<Option<DataRecord>, StoreError> {
        self.query(&sql::record_by_id(), "record_by_id", |stmt| {
            stmt.query_row(params![id], data_record_from_row).optional()
        })
    }

    fn meta_by_id(&mut self, id: i64) -> Result<Option<MetaRecord>, StoreError> {
        self.query(&sql::meta_by_id(), "meta_by_id", |stmt| {
            stmt.query_row(params![id], meta_record_from_row).optional()
        })
    }

    fn records_by_ids(&mut self, ids: &[i64]) -> Result<HashMap<i64, DataRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.query(&sql::records_by_ids(ids.len()), "records_by_ids", |stmt| {
            stmt.query_map(params_from_iter(ids.iter()), data_record_from_row)?
                .map(|row| row.map(|record| (record.id, record)))
                .collect()
        })
    }

    fn metas_by_ids(&mut self, ids: &[i64]) -> Result<HashMap<i64, MetaRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.query(&sql::metas_by_ids(ids.len()), "metas_by_ids", |stmt| {
            stmt.query_map(params_from_iter(ids.iter()), meta_record_from_row)?
                .map(|row| row.map(|meta| (meta.id, meta)))
                .collect()
        })
    }

    fn records_with_generated(&mut self, generated: bool) -> Result<Vec<DataRecord>, StoreError> {
        self.query(
            &sql::records_with_generated(),
            "records_with_generated",
            |stmt| {
                stmt.query_map(params![generated], data_record_from_row)?
                    .collect()
            },
        )
    }

    fn records_with_created(
        &mut self,
        created: NaiveDateTime,
    ) -> Result<Vec<DataRecord>, StoreError> {
        self.query(
            &sql::records_with_created(),
            "records_with_created",
            |stmt| {
                stmt.query_map(params![created], data_record_from_row)?
                    .collect()
            },
        )
    }

    fn records_by_created(
        &mut self,
    ) -> Result<HashMap<NaiveDateTime, Vec<DataRecord>>, StoreError> {
        self.query(sql::RECORD_COLUMNS, "records_by_created", |stmt| {
            let mut groups: HashMap<NaiveDateTime, Vec<DataRecord>> = HashMap::new();
            for row in stmt.query_map([], data_record_from_row)? {
                let record = row?;
                groups.entry(record.created).or_default().push(record);
            }
            Ok(groups)
        })
    }

    fn records_by_generated(&mut self) -> Result<HashMap<bool, Vec<DataRecord>>, StoreError> {
        self.query(sql::RECORD_COLUMNS, "records_by_generated", |stmt| {
            let mut groups: HashMap<bool, Vec<DataRecord>> = HashMap::new();
            for row in stmt.query_map([], data_record_from_row)? {
                let record = row?;
                groups.entry(record.generated).or_default().push(record);
            }
            Ok(groups)
        })
    }
}
