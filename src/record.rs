//! The durable event record and its caller-facing projection.
//!
//! An [`EventRecord`] is the unit stored in the backing table: structured
//! metadata fields plus an opaque, type-tagged payload in the generic
//! attribute encoding. An [`Event`] is the in-memory, read-only projection a
//! caller works with; it is always translated to and from an `EventRecord`
//! at the store boundary and never persisted directly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::EventData;
use crate::types::{AggregateId, AggregateType, EventType, EventVersion, Timestamp};

/// The generic attribute encoding: a self-describing map of scalar and
/// structured values. This is the only representation in which domain
/// payloads cross into storage.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Arbitrary per-event metadata. Insertion order is irrelevant.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The durable unit persisted in the event table.
///
/// `(aggregate_id, version)` is the partition/sort key pair and the only
/// identity a record needs. Records are created exactly once per slot by a
/// save, may have their `event_type` rewritten by a rename, and may be
/// wholesale overwritten by a replace. They are never deleted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Partition key: the owning aggregate.
    pub aggregate_id: AggregateId,
    /// Sort key: position within the aggregate stream, starting at 1.
    pub version: EventVersion,
    /// The logical type tag of the payload.
    pub event_type: EventType,
    /// The payload in the generic attribute encoding. Omitted entirely when
    /// the event carries no data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Attributes>,
    /// When the event was created.
    pub timestamp: Timestamp,
    /// The logical type tag of the owning aggregate.
    pub aggregate_type: AggregateType,
    /// Arbitrary per-event metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A domain event: an immutable fact about a state change to one aggregate.
///
/// The payload is decoded through the registry by its type tag; an event
/// whose tag has no registered constructor carries no payload.
#[derive(Debug)]
pub struct Event {
    aggregate_id: AggregateId,
    aggregate_type: AggregateType,
    event_type: EventType,
    version: EventVersion,
    timestamp: Timestamp,
    data: Option<Box<dyn EventData>>,
    metadata: Metadata,
}

impl Event {
    /// Creates an event with no payload, an empty metadata map and the
    /// current time as its timestamp.
    pub fn new(
        aggregate_type: AggregateType,
        event_type: EventType,
        aggregate_id: AggregateId,
        version: EventVersion,
    ) -> Self {
        Self {
            aggregate_id,
            aggregate_type,
            event_type,
            version,
            timestamp: Timestamp::now(),
            data: None,
            metadata: Metadata::new(),
        }
    }

    /// Creates an event from all of its parts. This is the decode path's
    /// constructor; `new` plus the `with_*` builders is the save path's.
    pub fn from_parts(
        aggregate_id: AggregateId,
        aggregate_type: AggregateType,
        event_type: EventType,
        version: EventVersion,
        timestamp: Timestamp,
        data: Option<Box<dyn EventData>>,
        metadata: Metadata,
    ) -> Self {
        Self {
            aggregate_id,
            aggregate_type,
            event_type,
            version,
            timestamp,
            data,
            metadata,
        }
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_data<T: EventData>(mut self, data: T) -> Self {
        self.data = Some(Box::new(data));
        self
    }

    /// Replaces the metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Overrides the creation timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The owning aggregate's identifier.
    pub const fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    /// The owning aggregate's type tag.
    pub const fn aggregate_type(&self) -> &AggregateType {
        &self.aggregate_type
    }

    /// The payload's type tag.
    pub const fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// The event's position within its aggregate stream.
    pub const fn version(&self) -> EventVersion {
        self.version
    }

    /// When the event was created.
    pub const fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The decoded payload, if the event carries one.
    pub fn data(&self) -> Option<&dyn EventData> {
        self.data.as_deref()
    }

    /// Downcasts the payload to a concrete type.
    pub fn data_as<T: EventData>(&self) -> Option<&T> {
        self.data.as_deref()?.as_any().downcast_ref::<T>()
    }

    /// The event's metadata map.
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.event_type, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ordered {
        sku: String,
        quantity: u32,
    }

    fn sample_event() -> Event {
        Event::new(
            AggregateType::try_new("Order").unwrap(),
            EventType::try_new("OrderCreated").unwrap(),
            AggregateId::generate(),
            EventVersion::first(),
        )
    }

    #[test]
    fn display_is_type_at_version() {
        let event = sample_event();
        assert_eq!(event.to_string(), "OrderCreated@1");
    }

    #[test]
    fn data_downcasts_to_concrete_type() {
        let event = sample_event().with_data(Ordered {
            sku: "widget".to_string(),
            quantity: 3,
        });
        let data = event.data_as::<Ordered>().expect("payload should downcast");
        assert_eq!(data.quantity, 3);
        assert!(event.data_as::<String>().is_none());
    }

    #[test]
    fn event_without_data_has_none() {
        let event = sample_event();
        assert!(event.data().is_none());
    }

    #[test]
    fn record_omits_absent_payload_when_serialized() {
        let record = EventRecord {
            aggregate_id: AggregateId::generate(),
            version: EventVersion::first(),
            event_type: EventType::try_new("OrderCreated").unwrap(),
            payload: None,
            timestamp: Timestamp::now(),
            aggregate_type: AggregateType::try_new("Order").unwrap(),
            metadata: Metadata::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("payload").is_none());
    }
}
