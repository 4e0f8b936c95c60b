//! `DynaStore` - an append-only event store over a partitioned document
//! database.
//!
//! Aggregates write batches of versioned events through an optimistic
//! concurrency gate built on per-item conditional writes; no multi-item
//! transactions are assumed of the backend. Event streams are loaded in
//! version order with strongly-consistent reads, tenants are isolated by
//! namespace-suffixed tables, and a pluggable registry decodes stored
//! payloads back into typed event data.
//!
//! The storage side is abstracted behind [`DocumentStore`]; the bundled
//! [`InMemoryDocumentStore`] implements the same contract for tests and
//! development. A small read-model repository lives in [`repo`] for keyed
//! projections alongside the event streams.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod codec;
pub mod context;
pub mod errors;
mod gate;
pub mod memory;
pub mod record;
pub mod registry;
pub mod repo;
mod sequencer;
pub mod store;
pub mod types;

pub use backend::{DocumentStore, PutCondition, ScanFilter};
pub use codec::{CodecError, EventData, RecordCodec};
pub use context::{RequestContext, TableNaming};
pub use errors::{BackendError, ErrorKind, EventStoreError, EventStoreResult};
pub use memory::InMemoryDocumentStore;
pub use record::{Attributes, Event, EventRecord, Metadata};
pub use registry::{EventDataRegistry, RegistryError};
pub use repo::{Entity, Filter, InMemoryRepo, IndexDescriptor, ReadRepository, RepoError};
pub use store::{EventHandler, EventStore, EventStoreConfig, HandlerError};
pub use types::{
    AggregateId, AggregateType, EventType, EventVersion, Namespace, TableName, TablePrefix,
    Timestamp,
};
