// SPDX-License-Identifier: Apache-2.0

//! Table definitions and deterministic seeding for the benchmark dataset.
//!
//! Metas exist only for even ids, so point lookups against odd ids exercise
//! the tolerated "not found" outcome.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::error::StoreError;

const DDL: &str = "\
CREATE TABLE IF NOT EXISTS sufficient_ids (
    id        INTEGER PRIMARY KEY,
    created   TEXT    NOT NULL,
    value     TEXT    NOT NULL,
    generated INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS sufficient_meta (
    other_id          INTEGER PRIMARY KEY,
    canonical_name    TEXT    NOT NULL,
    description       TEXT,
    access_restricted INTEGER NOT NULL,
    last_accessed     TEXT    NOT NULL
);";

/// Create both tables if they do not exist yet.
pub fn init(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(DDL).map_err(|e| super::classify("init_schema", e))
}

/// Populate both tables with `rows` deterministic records, replacing any
/// previous contents.
pub fn seed(conn: &mut Connection, rows: u32) -> Result<(), StoreError> {
    let tx = conn
        .transaction()
        .map_err(|e| super::classify("seed", e))?;

    tx.execute_batch("DELETE FROM sufficient_meta; DELETE FROM sufficient_ids;")
        .map_err(|e| super::classify("seed", e))?;

    let base = NaiveDateTime::default();
    for i in 1..=i64::from(rows) {
        let created = base + Duration::seconds(i);
        let value = Decimal::new(i * 25, 2);
        let generated = i % 2 == 0;

        tx.execute(
            "INSERT INTO sufficient_ids (id, created, value, generated) VALUES (?1, ?2, ?3, ?4)",
            params![i, created, value.to_string(), generated],
        )
        .map_err(|e| super::classify("seed", e))?;

        if i % 2 == 0 {
            tx.execute(
                "INSERT INTO sufficient_meta (other_id, canonical_name, description, \
                 access_restricted, last_accessed) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    i,
                    format!("record-{i}"),
                    if i % 4 == 0 { Some("generated batch") } else { None },
                    i % 3 == 0,
                    base + Duration::seconds(i * 2),
                ],
            )
            .map_err(|e| super::classify("seed", e))?;
        }
    }

    tx.commit().map_err(|e| super::classify("seed", e))
}
