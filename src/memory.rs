//! Thread-safe in-memory implementation of the document-store contract.
//!
//! Useful for tests and development where no real partitioned database is
//! available. Tables are `BTreeMap`s keyed by `(aggregate_id, version)`, so
//! partition queries come back in ascending version order for free. All
//! reads are trivially consistent; the `consistent` flags are accepted and
//! ignored.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::backend::{DocumentStore, PutCondition, ScanFilter};
use crate::errors::BackendError;
use crate::record::EventRecord;
use crate::types::{AggregateId, EventType, EventVersion, TableName};

type Table = BTreeMap<(AggregateId, u64), EventRecord>;

/// In-memory document store. Cloning shares the underlying storage.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    tables: Arc<RwLock<HashMap<TableName, Table>>>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store with no tables.
    pub fn new() -> Self {
        Self::default()
    }
}

fn record_key(record: &EventRecord) -> (AggregateId, u64) {
    (record.aggregate_id, record.version.into())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put_item(
        &self,
        table: &TableName,
        record: EventRecord,
        condition: PutCondition,
    ) -> Result<(), BackendError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let items = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::TableNotFound(table.clone()))?;

        let key = record_key(&record);
        let occupied = items.contains_key(&key);
        match condition {
            PutCondition::SlotVacant if occupied => return Err(BackendError::PreconditionFailed),
            PutCondition::SlotOccupied if !occupied => {
                return Err(BackendError::PreconditionFailed)
            }
            _ => {}
        }

        items.insert(key, record);
        Ok(())
    }

    async fn query_partition(
        &self,
        table: &TableName,
        aggregate_id: AggregateId,
        _consistent: bool,
    ) -> Result<Vec<EventRecord>, BackendError> {
        let tables = self.tables.read().expect("lock poisoned");
        let items = tables
            .get(table)
            .ok_or_else(|| BackendError::TableNotFound(table.clone()))?;

        Ok(items
            .range((aggregate_id, u64::MIN)..=(aggregate_id, u64::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn count_partition(
        &self,
        table: &TableName,
        aggregate_id: AggregateId,
        _consistent: bool,
    ) -> Result<usize, BackendError> {
        let tables = self.tables.read().expect("lock poisoned");
        let items = tables
            .get(table)
            .ok_or_else(|| BackendError::TableNotFound(table.clone()))?;

        Ok(items
            .range((aggregate_id, u64::MIN)..=(aggregate_id, u64::MAX))
            .count())
    }

    async fn scan(
        &self,
        table: &TableName,
        filter: Option<ScanFilter>,
        _consistent: bool,
    ) -> Result<Vec<EventRecord>, BackendError> {
        let tables = self.tables.read().expect("lock poisoned");
        let items = tables
            .get(table)
            .ok_or_else(|| BackendError::TableNotFound(table.clone()))?;

        Ok(items
            .values()
            .filter(|record| match &filter {
                Some(ScanFilter::EventTypeEquals(tag)) => &record.event_type == tag,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn update_event_type(
        &self,
        table: &TableName,
        aggregate_id: AggregateId,
        version: EventVersion,
        from: &EventType,
        to: &EventType,
    ) -> Result<(), BackendError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let items = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::TableNotFound(table.clone()))?;

        let record = items
            .get_mut(&(aggregate_id, version.into()))
            .filter(|record| &record.event_type == from)
            .ok_or(BackendError::PreconditionFailed)?;

        record.event_type = to.clone();
        Ok(())
    }

    async fn create_table(&self, table: &TableName) -> Result<(), BackendError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        if tables.contains_key(table) {
            return Err(BackendError::TableExists(table.clone()));
        }
        tables.insert(table.clone(), Table::new());
        Ok(())
    }

    async fn delete_table(&self, table: &TableName) -> Result<(), BackendError> {
        let mut tables = self.tables.write().expect("lock poisoned");
        tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| BackendError::TableNotFound(table.clone()))
    }
}
