//! Conditional write gate.
//!
//! Persists single event records through the backend's conditional put and
//! translates precondition failures into the store's error taxonomy: a lost
//! append race is a concurrency conflict, a replace against an empty slot is
//! a logical invalid-event. The per-item conditional append is what gives a
//! whole save batch its optimistic-concurrency guarantee; there is no
//! multi-item transaction behind it.

use tracing::warn;

use crate::backend::{DocumentStore, PutCondition};
use crate::errors::{BackendError, ErrorKind, EventStoreError, EventStoreResult};
use crate::record::EventRecord;
use crate::types::{Namespace, TableName};

pub(crate) struct WriteGate<'a, D: DocumentStore> {
    backend: &'a D,
    table: &'a TableName,
    namespace: &'a Namespace,
}

impl<'a, D: DocumentStore> WriteGate<'a, D> {
    pub(crate) const fn new(
        backend: &'a D,
        table: &'a TableName,
        namespace: &'a Namespace,
    ) -> Self {
        Self {
            backend,
            table,
            namespace,
        }
    }

    /// Writes the record only if its `(aggregate, version)` slot is empty.
    /// A taken slot means another writer won the race.
    pub(crate) async fn append_if_absent(&self, record: EventRecord) -> EventStoreResult<()> {
        let aggregate_id = record.aggregate_id;
        let version = record.version;

        match self
            .backend
            .put_item(self.table, record, PutCondition::SlotVacant)
            .await
        {
            Ok(()) => Ok(()),
            Err(BackendError::PreconditionFailed) => {
                warn!(
                    table = %self.table,
                    aggregate_id = %aggregate_id,
                    version = %version,
                    "[gate.append] version slot already taken"
                );
                Err(EventStoreError::with_source(
                    ErrorKind::ConcurrencyConflict {
                        aggregate_id,
                        version,
                    },
                    self.namespace.clone(),
                    BackendError::PreconditionFailed,
                ))
            }
            Err(source) => Err(EventStoreError::with_source(
                ErrorKind::Storage,
                self.namespace.clone(),
                source,
            )),
        }
    }

    /// Writes the record only if its slot already exists. An empty slot is
    /// not a race but a logical precondition violation by the caller.
    pub(crate) async fn replace_if_present(&self, record: EventRecord) -> EventStoreResult<()> {
        let aggregate_id = record.aggregate_id;
        let version = record.version;

        match self
            .backend
            .put_item(self.table, record, PutCondition::SlotOccupied)
            .await
        {
            Ok(()) => Ok(()),
            Err(BackendError::PreconditionFailed) => Err(EventStoreError::with_source(
                ErrorKind::ReplaceTargetMissing {
                    aggregate_id,
                    version,
                },
                self.namespace.clone(),
                BackendError::PreconditionFailed,
            )),
            Err(source) => Err(EventStoreError::with_source(
                ErrorKind::Storage,
                self.namespace.clone(),
                source,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DocumentStore;
    use crate::memory::InMemoryDocumentStore;
    use crate::types::{AggregateId, AggregateType, EventType, EventVersion, Timestamp};

    fn record(aggregate_id: AggregateId, version: u64) -> EventRecord {
        EventRecord {
            aggregate_id,
            version: EventVersion::try_new(version).unwrap(),
            event_type: EventType::try_new("OrderCreated").unwrap(),
            payload: None,
            timestamp: Timestamp::now(),
            aggregate_type: AggregateType::try_new("Order").unwrap(),
            metadata: crate::record::Metadata::new(),
        }
    }

    #[tokio::test]
    async fn append_race_maps_to_concurrency_conflict() {
        let backend = InMemoryDocumentStore::new();
        let table = TableName::try_new("events_default").unwrap();
        backend.create_table(&table).await.unwrap();
        let namespace = Namespace::default_namespace();
        let gate = WriteGate::new(&backend, &table, &namespace);

        let id = AggregateId::generate();
        gate.append_if_absent(record(id, 1)).await.unwrap();

        let err = gate.append_if_absent(record(id, 1)).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ConcurrencyConflict { .. }));
        assert_eq!(err.namespace, namespace);
    }

    #[tokio::test]
    async fn replace_of_empty_slot_is_not_a_conflict() {
        let backend = InMemoryDocumentStore::new();
        let table = TableName::try_new("events_default").unwrap();
        backend.create_table(&table).await.unwrap();
        let namespace = Namespace::default_namespace();
        let gate = WriteGate::new(&backend, &table, &namespace);

        let err = gate
            .replace_if_present(record(AggregateId::generate(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ReplaceTargetMissing { .. }));
    }

    #[tokio::test]
    async fn missing_table_is_a_storage_error() {
        let backend = InMemoryDocumentStore::new();
        let table = TableName::try_new("events_default").unwrap();
        let namespace = Namespace::default_namespace();
        let gate = WriteGate::new(&backend, &table, &namespace);

        let err = gate
            .append_if_absent(record(AggregateId::generate(), 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
        assert!(err.source.is_some());
    }
}
