// SPDX-License-Identifier: Apache-2.0

//! One probe invocation = one latency sample.
//!
//! The probe runs a fixed sequence of representative operations against
//! whichever strategy it is handed: list all ids, fetch the first record,
//! fetch its meta (absence tolerated), fetch a bounded batch of records and
//! metas by id list, then a predicate scan. The elapsed wall-clock time for
//! the whole sequence is the sample.

use std::time::Instant;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::ProbeError;
use crate::store::RecordStore;

pub struct QueryProbe {
    batch_size: usize,
}

impl QueryProbe {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    /// Run the fixed query sequence once and return the elapsed
    /// nanoseconds as a single sample.
    pub fn run(&self, store: &mut dyn RecordStore) -> Result<Decimal, ProbeError> {
        let started = Instant::now();

        let ids = store.ids()?;
        let first = *ids.first().ok_or(ProbeError::EmptyDataset)?;

        let record = store.record_by_id(first)?;
        debug!(id = first, found = record.is_some(), "point lookup");

        match store.meta_by_id(first)? {
            Some(meta) => debug!(id = first, name = %meta.canonical_name, "meta lookup"),
            None => debug!(id = first, "no meta record found"),
        }

        let batch = &ids[..ids.len().min(self.batch_size)];
        let records = store.records_by_ids(batch)?;
        info!(requested = batch.len(), retrieved = records.len(), "batch record lookup");

        let metas = store.metas_by_ids(batch)?;
        info!(requested = batch.len(), retrieved = metas.len(), "batch meta lookup");

        let scanned = store.records_with_generated(false)?;
        info!(retrieved = scanned.len(), "predicate scan");

        Ok(Decimal::from(started.elapsed().as_nanos() as u64))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDateTime;
    use rust_decimal::Decimal;

    use super::*;
    use crate::error::StoreError;
    use crate::store::{DataRecord, MetaRecord, StrategyKind};

    /// In-memory store double recording which operations ran. While
    /// `fail_runs` is positive the opening `ids` call fails, consuming one
    /// failure per probe run.
    pub(crate) struct StubStore {
        pub kind: StrategyKind,
        pub rows: Vec<DataRecord>,
        pub calls: Vec<&'static str>,
        pub fail_runs: u32,
    }

    impl StubStore {
        pub(crate) fn with_rows(kind: StrategyKind, count: i64) -> Self {
            let rows = (1..=count)
                .map(|id| DataRecord {
                    id,
                    created: NaiveDateTime::default(),
                    value: Decimal::from(id),
                    generated: id % 2 == 0,
                })
                .collect();
            Self {
                kind,
                rows,
                calls: Vec::new(),
                fail_runs: 0,
            }
        }

        fn check(&mut self, call: &'static str) -> Result<(), StoreError> {
            self.calls.push(call);
            if call == "ids" && self.fail_runs > 0 {
                self.fail_runs -= 1;
                Err(StoreError::RowExtraction {
                    operation: call,
                    detail: "stubbed failure".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl RecordStore for StubStore {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn ids(&mut self) -> Result<Vec<i64>, StoreError> {
            self.check("ids")?;
            Ok(self.rows.iter().map(|r| r.id).collect())
        }

        fn record_by_id(&mut self, id: i64) -> Result<Option<DataRecord>, StoreError> {
            self.check("record_by_id")?;
            Ok(self.rows.iter().find(|r| r.id == id).cloned())
        }

        fn meta_by_id(&mut self, _id: i64) -> Result<Option<MetaRecord>, StoreError> {
            self.check("meta_by_id")?;
            Ok(None)
        }

        fn records_by_ids(
            &mut self,
            ids: &[i64],
        ) -> Result<HashMap<i64, DataRecord>, StoreError> {
            self.check("records_by_ids")?;
            Ok(self
                .rows
                .iter()
                .filter(|r| ids.contains(&r.id))
                .map(|r| (r.id, r.clone()))
                .collect())
        }

        fn metas_by_ids(&mut self, _ids: &[i64]) -> Result<HashMap<i64, MetaRecord>, StoreError> {
            self.check("metas_by_ids")?;
            Ok(HashMap::new())
        }

        fn records_with_generated(
            &mut self,
            generated: bool,
        ) -> Result<Vec<DataRecord>, StoreError> {
            self.check("records_with_generated")?;
            Ok(self
                .rows
                .iter()
                .filter(|r| r.generated == generated)
                .cloned()
                .collect())
        }

        fn records_with_created(
            &mut self,
            _created: NaiveDateTime,
        ) -> Result<Vec<DataRecord>, StoreError> {
            self.check("records_with_created")?;
            Ok(Vec::new())
        }

        fn records_by_created(
            &mut self,
        ) -> Result<HashMap<NaiveDateTime, Vec<DataRecord>>, StoreError> {
            self.check("records_by_created")?;
            Ok(HashMap::new())
        }

        fn records_by_generated(&mut self) -> Result<HashMap<bool, Vec<DataRecord>>, StoreError> {
            self.check("records_by_generated")?;
            Ok(HashMap::new())
        }
    }

    #[test]
    fn one_run_covers_the_fixed_sequence_in_order() {
        let mut store = StubStore::with_rows(StrategyKind::ConnectionReuse, 8);
        let sample = QueryProbe::new(5).run(&mut store).unwrap();

        assert!(sample > Decimal::ZERO);
        assert_eq!(
            store.calls,
            vec![
                "ids",
                "record_by_id",
                "meta_by_id",
                "records_by_ids",
                "metas_by_ids",
                "records_with_generated",
            ]
        );
    }

    #[test]
    fn batch_is_bounded_by_the_available_ids() {
        let mut store = StubStore::with_rows(StrategyKind::PooledTemplate, 2);
        // Batch size larger than the table must not panic.
        QueryProbe::new(1000).run(&mut store).unwrap();
    }

    #[test]
    fn empty_dataset_is_a_probe_error_not_a_panic() {
        let mut store = StubStore::with_rows(StrategyKind::ConnectionReuse, 0);
        let err = QueryProbe::new(10).run(&mut store).unwrap_err();
        assert!(matches!(err, ProbeError::EmptyDataset));
    }

    #[test]
    fn store_failures_propagate_and_lose_the_sample() {
        let mut store = StubStore::with_rows(StrategyKind::ConnectionReuse, 4);
        store.fail_runs = 1;

        let err = QueryProbe::new(10).run(&mut store).unwrap_err();
        assert!(matches!(err, ProbeError::Store(_)));
    }
}
