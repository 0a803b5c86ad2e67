// SPDX-License-Identifier: Apache-2.0

//! Record stores: the two interchangeable query-execution strategies.
//!
//! Both strategies answer the same capability set - list ids, point lookup,
//! meta lookup, bounded batch lookups and a predicate scan - against the
//! same two tables. [`raw::ReusedConnectionStore`] drives one hand-managed
//! connection through the resilient acquisition layer;
//! [`pooled::PooledStore`] checks a connection out of an r2d2 pool per
//! operation.

pub mod pooled;
pub mod raw;
pub mod schema;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::Row;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::StoreError;

/// The two benchmarked strategies. Equality by value; used as map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ConnectionReuse,
    PooledTemplate,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::ConnectionReuse => write!(f, "connection-reuse"),
            StrategyKind::PooledTemplate => write!(f, "pooled-template"),
        }
    }
}

/// One row of `sufficient_ids`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataRecord {
    pub id: i64,
    pub created: NaiveDateTime,
    pub value: Decimal,
    pub generated: bool,
}

/// One row of `sufficient_meta`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaRecord {
    pub id: i64,
    pub canonical_name: String,
    pub description: Option<String>,
    pub access_restricted: bool,
    pub last_accessed: NaiveDateTime,
}

/// Query-execution capability shared by both strategies.
///
/// "No row found" for the point lookups is a valid non-error result,
/// distinct from a genuine failure.
pub trait RecordStore {
    fn kind(&self) -> StrategyKind;

    /// All record ids.
    fn ids(&mut self) -> Result<Vec<i64>, StoreError>;

    fn record_by_id(&mut self, id: i64) -> Result<Option<DataRecord>, StoreError>;

    fn meta_by_id(&mut self, id: i64) -> Result<Option<MetaRecord>, StoreError>;

    fn records_by_ids(&mut self, ids: &[i64]) -> Result<HashMap<i64, DataRecord>, StoreError>;

    fn metas_by_ids(&mut self, ids: &[i64]) -> Result<HashMap<i64, MetaRecord>, StoreError>;

    /// Predicate scan on the `generated` flag.
    fn records_with_generated(&mut self, generated: bool) -> Result<Vec<DataRecord>, StoreError>;

    fn records_with_created(&mut self, created: NaiveDateTime)
        -> Result<Vec<DataRecord>, StoreError>;

    /// All records grouped by creation timestamp.
    fn records_by_created(
        &mut self,
    ) -> Result<HashMap<NaiveDateTime, Vec<DataRecord>>, StoreError>;

    /// All records grouped by the `generated` flag.
    fn records_by_generated(&mut self) -> Result<HashMap<bool, Vec<DataRecord>>, StoreError>;
}

/// SQL text shared by both strategies.
pub(crate) mod sql {
    pub const IDS: &str = "SELECT id FROM sufficient_ids";

    pub const RECORD_COLUMNS: &str = "SELECT id, created, value, generated FROM sufficient_ids";

    pub const META_COLUMNS: &str = "SELECT other_id AS id, canonical_name, description, \
                                    access_restricted, last_accessed FROM sufficient_meta";

    pub fn record_by_id() -> String {
        format!("{RECORD_COLUMNS} WHERE id = ?1")
    }

    pub fn meta_by_id() -> String {
        format!("{META_COLUMNS} WHERE other_id = ?1")
    }

    pub fn records_by_ids(count: usize) -> String {
        format!("{RECORD_COLUMNS} WHERE id IN ({})", placeholders(count))
    }

    pub fn metas_by_ids(count: usize) -> String {
        format!("{META_COLUMNS} WHERE other_id IN ({})", placeholders(count))
    }

    pub fn records_with_generated() -> String {
        format!("{RECORD_COLUMNS} WHERE generated = ?1")
    }

    pub fn records_with_created() -> String {
        format!("{RECORD_COLUMNS} WHERE created = ?1")
    }

    fn placeholders(count: usize) -> String {
        let mut list = String::new();
        for i in 1..=count {
            if i > 1 {
                list.push_str(", ");
            }
            list.push('?');
            list.push_str(&i.to_string());
        }
        list
    }
}

/// Decode one `sufficient_ids` row. The value column is stored as text and
/// parsed into a `Decimal`; a malformed value surfaces as a conversion
/// failure so it can be classified as a row-extraction error.
pub(crate) fn data_record_from_row(row: &Row<'_>) -> rusqlite::Result<DataRecord> {
    let raw_value: String = row.get(2)?;
    let value = Decimal::from_str(&raw_value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
    })?;

    Ok(DataRecord {
        id: row.get(0)?,
        created: row.get(1)?,
        value,
        generated: row.get(3)?,
    })
}

pub(crate) fn meta_record_from_row(row: &Row<'_>) -> rusqlite::Result<MetaRecord> {
    Ok(MetaRecord {
        id: row.get(0)?,
        canonical_name: row.get(1)?,
        description: row.get(2)?,
        access_restricted: row.get(3)?,
        last_accessed: row.get(4)?,
    })
}

/// Per-operation runtime logging, millisecond-denominated once an
/// operation crosses the millisecond mark.
pub(crate) fn log_runtime(started: std::time::Instant, operation: &str) {
    let nanos = started.elapsed().as_nanos();
    if nanos >= 1_000_000 {
        tracing::debug!(operation, millis = nanos / 1_000_000, "operation finished");
    } else {
        tracing::debug!(operation, nanos, "operation finished");
    }
}

/// Classify a rusqlite error: decode problems are row-extraction failures,
/// everything else is a query failure.
pub(crate) fn classify(operation: &'static str, error: rusqlite::Error) -> StoreError {
    match error {
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => StoreError::RowExtraction {
            operation,
            detail: error.to_string(),
        },
        other => StoreError::Query {
            operation,
            source: other,
        },
    }
}
