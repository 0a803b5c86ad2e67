// SPDX-License-Identifier: Apache-2.0

//! The reused-connection strategy: one hand-managed sqlite connection,
//! every statement prepared through the resilient acquisition layer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Statement};

use crate::acquire::{ConnectionProvider, ManagedConnection, StatementSource};
use crate::error::{AcquireError, HandleError, StoreError};
use crate::store::{
    classify, data_record_from_row, log_runtime, meta_record_from_row, sql, DataRecord,
    MetaRecord, RecordStore, StrategyKind,
};

/// Mints sqlite connections for the reused-connection strategy, applying
/// the configured fetch size (as a page-cache pragma) to each fresh one.
pub struct SqliteProvider {
    path: PathBuf,
    fetch_size: i64,
}

impl SqliteProvider {
    pub fn new(path: impl Into<PathBuf>, fetch_size: i64) -> Self {
        Self {
            path: path.into(),
            fetch_size,
        }
    }
}

impl ConnectionProvider for SqliteProvider {
    type Handle = SqliteHandle;

    fn connect(&mut self) -> Result<SqliteHandle, HandleError> {
        let conn = Connection::open(&self.path)
            .map_err(|e| HandleError::new("connect", e.to_string()))?;
        conn.pragma_update(None, "cache_size", self.fetch_size)
            .map_err(|e| HandleError::new("configure", e.to_string()))?;
        Ok(SqliteHandle { conn: Some(conn) })
    }
}

/// One sqlite connection as a managed handle. `None` means closed.
pub struct SqliteHandle {
    conn: Option<Connection>,
}

impl SqliteHandle {
    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }
}

impl ManagedConnection for SqliteHandle {
    fn try_prepare(&mut self, sql: &str) -> Result<(), HandleError> {
        match &self.conn {
            Some(conn) => conn
                .prepare(sql)
                .map(|_| ())
                .map_err(|e| HandleError::new("prepare", e.to_string())),
            None => Err(HandleError::new("prepare", "connection already closed")),
        }
    }

    fn is_closed(&mut self) -> Result<bool, HandleError> {
        // sqlite has no closed flag on an owned connection; a liveness ping
        // stands in for the diagnostic.
        match &self.conn {
            Some(conn) => conn
                .query_row("SELECT 1", [], |_| Ok(()))
                .map(|_| false)
                .map_err(|e| HandleError::new("diagnostic", e.to_string())),
            None => Ok(true),
        }
    }

    fn close(&mut self) -> Result<(), HandleError> {
        match self.conn.take() {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| HandleError::new("close", e.to_string())),
            None => Ok(()),
        }
    }
}

/// Record store backed by a single reused connection.
pub struct ReusedConnectionStore {
    source: StatementSource<SqliteProvider>,
}

impl ReusedConnectionStore {
    pub fn open(provider: SqliteProvider, max_retries: u32) -> Result<Self, StoreError> {
        let source = StatementSource::open(provider, max_retries)?;
        Ok(Self { source })
    }

    fn query<T>(
        &mut self,
        sql: &str,
        operation: &'static str,
        run: impl FnOnce(&mut Statement<'_>) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let started = Instant::now();
        self.source.ensure_ready(sql)?;

        let conn = self.source.handle().connection().ok_or_else(|| {
            StoreError::Acquire(AcquireError::Connect(HandleError::new(
                "connection",
                "handle is closed",
            )))
        })?;
        let mut stmt = conn.prepare(sql).map_err(|e| classify(operation, e))?;
        let result = run(&mut stmt).map_err(|e| classify(operation, e))?;

        log_runtime(started, operation);
        Ok(result)
    }
}

impl RecordStore for ReusedConnectionStore {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ConnectionReuse
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
