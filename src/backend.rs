//! The backing document-store contract.
//!
//! The event store consumes its backing database through this trait: a
//! partitioned table keyed by `(aggregate_id, version)` offering single-item
//! conditional writes, strongly-consistent partition reads, filtered scans,
//! a single-attribute conditional update and asynchronous table lifecycle.
//! There are no multi-item transactions; the per-item conditional put is the
//! only serialization point the whole design relies on.
//!
//! Every method is a network call in a real backend and therefore a suspend
//! point. Cancellation is cooperative: dropping the future abandons the
//! call, but a write the store already accepted is not rolled back.

use async_trait::async_trait;

use crate::errors::BackendError;
use crate::record::EventRecord;
use crate::types::{AggregateId, EventType, EventVersion, TableName};

/// Precondition attached to a conditional put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutCondition {
    /// The `(aggregate_id, version)` slot must not exist yet (append).
    SlotVacant,
    /// The slot must already exist (replace).
    SlotOccupied,
}

/// Filter applied to a full-table scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFilter {
    /// Only records whose type tag equals the given tag.
    EventTypeEquals(EventType),
}

/// A partitioned document table holding event records.
///
/// Implementations must be thread-safe; the store issues calls from any
/// number of concurrent tasks without client-side locking.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes one record, guarded by the given precondition.
    ///
    /// A violated precondition is reported as
    /// [`BackendError::PreconditionFailed`], distinct from transport
    /// failures, so the caller can tell a lost race from a broken store.
    async fn put_item(
        &self,
        table: &TableName,
        record: EventRecord,
        condition: PutCondition,
    ) -> Result<(), BackendError>;

    /// Reads all records of one aggregate partition, ascending by version.
    ///
    /// `consistent` requests a strongly-consistent read where the backend
    /// distinguishes one.
    async fn query_partition(
        &self,
        table: &TableName,
        aggregate_id: AggregateId,
        consistent: bool,
    ) -> Result<Vec<EventRecord>, BackendError>;

    /// Counts the records of one aggregate partition.
    async fn count_partition(
        &self,
        table: &TableName,
        aggregate_id: AggregateId,
        consistent: bool,
    ) -> Result<usize, BackendError>;

    /// Scans the whole table, optionally filtered.
    async fn scan(
        &self,
        table: &TableName,
        filter: Option<ScanFilter>,
        consistent: bool,
    ) -> Result<Vec<EventRecord>, BackendError>;

    /// Rewrites the type tag of one record, guarded by the tag still holding
    /// its expected current value. A guard failure is
    /// [`BackendError::PreconditionFailed`].
    async fn update_event_type(
        &self,
        table: &TableName,
        aggregate_id: AggregateId,
        version: EventVersion,
        from: &EventType,
        to: &EventType,
    ) -> Result<(), BackendError>;

    /// Creates the table and resolves once it is ready to serve requests.
    async fn create_table(&self, table: &TableName) -> Result<(), BackendError>;

    /// Deletes the table and resolves once it is gone. Deleting a missing
    /// table is [`BackendError::TableNotFound`]; the store treats that as
    /// success.
    async fn delete_table(&self, table: &TableName) -> Result<(), BackendError>;
}
