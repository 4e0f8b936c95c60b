//! The event store orchestrator.
//!
//! Composes the sequencer, codec and write gate into the save/load/replace/
//! rename protocol over a [`DocumentStore`] backend, routes every call to a
//! per-tenant table, and invokes the optional downstream handler after a
//! successful save.
//!
//! A multi-event save is **not** atomic: the backing store offers only
//! single-item conditional writes, so if event N of a batch loses its slot
//! race, events 1..N-1 stay persisted. Callers that hit a
//! [`ErrorKind::ConcurrencyConflict`] must re-read the stream and retry with
//! a fresh batch; the store never retries on its own.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::backend::{DocumentStore, ScanFilter};
use crate::codec::RecordCodec;
use crate::context::{RequestContext, TableNaming};
use crate::errors::{BackendError, ErrorKind, EventStoreError, EventStoreResult};
use crate::record::{Event, EventRecord};
use crate::registry::EventDataRegistry;
use crate::sequencer;
use crate::types::{AggregateId, EventType, TableName, TablePrefix};

/// Error type returned by downstream event handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Downstream hook invoked once per event, in save order, after the whole
/// batch has been durably persisted. A typical implementation publishes the
/// event on a bus. A handler failure is reported to the caller but does not
/// roll back storage.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one freshly persisted event.
    async fn handle(&self, ctx: &RequestContext, event: &Event) -> Result<(), HandlerError>;
}

/// Configuration for an [`EventStore`], validated once at construction.
///
/// This replaces the option-function setters of the ancestral design with
/// named fields and builder-style `with_*` methods.
#[derive(Clone)]
pub struct EventStoreConfig {
    /// Table name prefix shared by all tenants.
    pub table_prefix: TablePrefix,
    /// How `(prefix, context)` resolves to a physical table name.
    pub naming: TableNaming,
    /// Payload-constructor registry used when decoding loaded records.
    pub registry: Arc<EventDataRegistry>,
    /// Optional downstream handler invoked after each successful save.
    pub handler: Option<Arc<dyn EventHandler>>,
    /// Upper bound on table create/delete readiness waits.
    pub lifecycle_timeout: Duration,
}

impl EventStoreConfig {
    /// Creates a configuration with namespace-suffixed naming, an empty
    /// registry, no handler and a 30 second lifecycle timeout.
    pub fn new(table_prefix: TablePrefix) -> Self {
        Self {
            table_prefix,
            naming: TableNaming::default(),
            registry: Arc::new(EventDataRegistry::new()),
            handler: None,
            lifecycle_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the table naming strategy.
    #[must_use]
    pub fn with_naming(mut self, naming: TableNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Sets the payload registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<EventDataRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the downstream event handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the lifecycle wait bound.
    #[must_use]
    pub const fn with_lifecycle_timeout(mut self, timeout: Duration) -> Self {
        self.lifecycle_timeout = timeout;
        self
    }
}

impl fmt::Debug for EventStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStoreConfig")
            .field("table_prefix", &self.table_prefix)
            .field("naming", &self.naming)
            .field("registry", &self.registry)
            .field("handler", &self.handler.as_ref().map(|_| "<handler>"))
            .field("lifecycle_timeout", &self.lifecycle_timeout)
            .finish()
    }
}

/// Append-only event store over a partitioned document table.
///
/// Stateless and thread-safe: all methods take `&self` and hold no per-call
/// state, so one store may be shared across any number of concurrent tasks.
/// All mutual exclusion is delegated to the backend's per-item conditional
/// write.
pub struct EventStore<D: DocumentStore> {
    backend: D,
    config: EventStoreConfig,
}

impl<D: DocumentStore> EventStore<D> {
    /// Creates a store over the given backend.
    pub const fn new(backend: D, config: EventStoreConfig) -> Self {
        Self { backend, config }
    }

    fn resolve_table(&self, ctx: &RequestContext) -> TableName {
        self.config.naming.resolve(&self.config.table_prefix, ctx)
    }

    fn storage_error(&self, ctx: &RequestContext, source: BackendError) -> EventStoreError {
        EventStoreError::with_source(ErrorKind::Storage, ctx.namespace().clone(), source)
    }

    /// Appends a batch of events for one aggregate.
    ///
    /// `original_version` is the stream version the caller last observed;
    /// the batch must carry versions `original_version + 1, + 2, ...` in
    /// order. The whole batch is validated before any write. Writes are then
    /// issued one slot at a time in ascending version order; on the first
    /// conflict, encoding error or storage failure the loop stops and prior
    /// writes of this batch remain persisted. After a fully successful batch
    /// the configured handler runs once per event, in order.
    #[instrument(skip_all, fields(namespace = %ctx.namespace(), events = events.len()))]
    pub async fn save(
        &self,
        ctx: &RequestContext,
        events: Vec<Event>,
        original_version: u64,
    ) -> EventStoreResult<()> {
        let namespace = ctx.namespace().clone();
        let aggregate_id = sequencer::validate_batch(&events, original_version)
            .map_err(|kind| EventStoreError::new(kind, namespace.clone()))?;

        let table = self.resolve_table(ctx);
        debug!(
            table = %table,
            aggregate_id = %aggregate_id,
            base_version = original_version,
            "[store.save] appending batch"
        );

        let codec = RecordCodec::new(&self.config.registry);
        let gate = crate::gate::WriteGate::new(&self.backend, &table, ctx.namespace());

        for event in &events {
            let record = codec.encode(event).map_err(|err| {
                EventStoreError::new(
                    ErrorKind::SerializationFailed(err.to_string()),
                    namespace.clone(),
                )
            })?;
            gate.append_if_absent(record).await?;
        }

        if let Some(handler) = &self.config.handler {
            for event in &events {
                handler.handle(ctx, event).await.map_err(|err| {
                    EventStoreError::new(
                        ErrorKind::HandlerFailed {
                            event_type: event.event_type().clone(),
                            version: event.version(),
                            detail: err.to_string(),
                        },
                        namespace.clone(),
                    )
                })?;
            }
        }

        info!(
            table = %table,
            aggregate_id = %aggregate_id,
            events = events.len(),
            "[store.save] batch persisted"
        );
        Ok(())
    }

    /// Loads the full event stream of one aggregate, ascending by version.
    ///
    /// Uses a strongly-consistent read. A missing table (or an aggregate
    /// with no events) yields an empty vec, not an error.
    #[instrument(skip_all, fields(namespace = %ctx.namespace(), aggregate_id = %aggregate_id))]
    pub async fn load(
        &self,
        ctx: &RequestContext,
        aggregate_id: AggregateId,
    ) -> EventStoreResult<Vec<Event>> {
        let table = self.resolve_table(ctx);
        let records = match self
            .backend
            .query_partition(&table, aggregate_id, true)
            .await
        {
            Ok(records) => records,
            Err(BackendError::TableNotFound(_)) => return Ok(Vec::new()),
            Err(source) => return Err(self.storage_error(ctx, source)),
        };

        debug!(table = %table, records = records.len(), "[store.load] decoding stream");
        self.decode_records(ctx, records)
    }

    /// Loads every event in the tenant's table, across all aggregates.
    /// Useful for replays; no ordering is guaranteed across aggregates.
    #[instrument(skip_all, fields(namespace = %ctx.namespace()))]
    pub async fn load_all(&self, ctx: &RequestContext) -> EventStoreResult<Vec<Event>> {
        let table = self.resolve_table(ctx);
        let records = self
            .backend
            .scan(&table, None, true)
            .await
            .map_err(|source| self.storage_error(ctx, source))?;

        debug!(table = %table, records = records.len(), "[store.load_all] decoding scan");
        self.decode_records(ctx, records)
    }

    /// Overwrites a single existing event in place: same
    /// `(aggregate, version)` identity, new payload, metadata and timestamp.
    ///
    /// Fails with [`ErrorKind::AggregateNotFound`] when the aggregate has no
    /// events at all, and with [`ErrorKind::ReplaceTargetMissing`] when the
    /// slot vanished between the count check and the write.
    #[instrument(skip_all, fields(namespace = %ctx.namespace(), event = %event))]
    pub async fn replace(&self, ctx: &RequestContext, event: &Event) -> EventStoreResult<()> {
        let namespace = ctx.namespace().clone();
        let table = self.resolve_table(ctx);

        let count = self
            .backend
            .count_partition(&table, event.aggregate_id(), true)
            .await
            .map_err(|source| self.storage_error(ctx, source))?;
        if count == 0 {
            return Err(EventStoreError::new(
                ErrorKind::AggregateNotFound(event.aggregate_id()),
                namespace,
            ));
        }

        let codec = RecordCodec::new(&self.config.registry);
        let record = codec.encode(event).map_err(|err| {
            EventStoreError::new(
                ErrorKind::SerializationFailed(err.to_string()),
                namespace.clone(),
            )
        })?;

        let gate = crate::gate::WriteGate::new(&self.backend, &table, ctx.namespace());
        gate.replace_if_present(record).await
    }

    /// Renames every record tagged `from` to `to`, preserving versions and
    /// payloads.
    ///
    /// Best-effort and non-atomic: a crash mid-scan leaves some records
    /// renamed and others not, but re-running with the same `from` simply
    /// finds the remainder. Each individual update is guarded by the tag
    /// still holding `from`; a concurrent change of the tag is reported as a
    /// storage error rather than silently skipped.
    #[instrument(skip_all, fields(namespace = %ctx.namespace(), from = %from, to = %to))]
    pub async fn rename_event(
        &self,
        ctx: &RequestContext,
        from: &EventType,
        to: &EventType,
    ) -> EventStoreResult<()> {
        let table = self.resolve_table(ctx);
        let records = self
            .backend
            .scan(
                &table,
                Some(ScanFilter::EventTypeEquals(from.clone())),
                true,
            )
            .await
            .map_err(|source| self.storage_error(ctx, source))?;

        info!(
            table = %table,
            matches = records.len(),
            "[store.rename_event] rewriting type tags"
        );

        for record in records {
            self.backend
                .update_event_type(&table, record.aggregate_id, record.version, from, to)
                .await
                .map_err(|source| self.storage_error(ctx, source))?;
        }

        Ok(())
    }

    /// Creates the tenant's table and waits until it is ready, bounded by
    /// the configured lifecycle timeout. The timeout surfaces as the
    /// retryable [`ErrorKind::Timeout`].
    #[instrument(skip_all, fields(namespace = %ctx.namespace()))]
    pub async fn create_table(&self, ctx: &RequestContext) -> EventStoreResult<()> {
        let table = self.resolve_table(ctx);
        self.lifecycle(ctx, self.backend.create_table(&table)).await
    }

    /// Deletes the tenant's table and waits until it is gone. Deleting a
    /// table that does not exist succeeds, making the operation idempotent.
    #[instrument(skip_all, fields(namespace = %ctx.namespace()))]
    pub async fn delete_table(&self, ctx: &RequestContext) -> EventStoreResult<()> {
        let table = self.resolve_table(ctx);
        match self.lifecycle(ctx, self.backend.delete_table(&table)).await {
            Err(EventStoreError {
                source: Some(BackendError::TableNotFound(_)),
                ..
            }) => Ok(()),
            other => other,
        }
    }

    async fn lifecycle(
        &self,
        ctx: &RequestContext,
        op: impl std::future::Future<Output = Result<(), BackendError>> + Send,
    ) -> EventStoreResult<()> {
        let bound = self.config.lifecycle_timeout;
        match tokio::time::timeout(bound, op).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(BackendError::Timeout(elapsed))) => Err(EventStoreError::with_source(
                ErrorKind::Timeout(elapsed),
                ctx.namespace().clone(),
                BackendError::Timeout(elapsed),
            )),
            Ok(Err(source)) => Err(self.storage_error(ctx, source)),
            Err(_) => Err(EventStoreError::new(
                ErrorKind::Timeout(bound),
                ctx.namespace().clone(),
            )),
        }
    }

    fn decode_records(
        &self,
        ctx: &RequestContext,
        records: Vec<EventRecord>,
    ) -> EventStoreResult<Vec<Event>> {
        let codec = RecordCodec::new(&self.config.registry);
        records
            .into_iter()
            .map(|record| {
                codec.decode(record).map_err(|err| {
                    EventStoreError::new(
                        ErrorKind::DeserializationFailed(err.to_string()),
                        ctx.namespace().clone(),
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_sets_every_field() {
        let prefix = TablePrefix::try_new("events").unwrap();
        let registry = Arc::new(EventDataRegistry::new());
        let config = EventStoreConfig::new(prefix.clone())
            .with_naming(TableNaming::BarePrefix)
            .with_registry(Arc::clone(&registry))
            .with_lifecycle_timeout(Duration::from_secs(5));

        assert_eq!(config.table_prefix, prefix);
        assert!(matches!(config.naming, TableNaming::BarePrefix));
        assert_eq!(config.lifecycle_timeout, Duration::from_secs(5));
        assert!(config.handler.is_none());
    }

    #[test]
    fn config_debug_does_not_require_debug_handler() {
        let config = EventStoreConfig::new(TablePrefix::try_new("events").unwrap());
        let rendered = format!("{config:?}");
        assert!(rendered.contains("table_prefix"));
    }
}
