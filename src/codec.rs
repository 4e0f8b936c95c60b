//! Conversion between domain events and durable event records.
//!
//! The codec is the only place domain payloads cross into the storage-native
//! attribute encoding. Encoding serializes the payload into a self-describing
//! attribute map (or omits it when the event carries none). Decoding
//! dispatches on the record's type tag through the payload registry: a
//! registered tag with malformed bytes is a hard failure, an unregistered
//! tag degrades to an event with no payload so that old records referencing
//! retired types still load.

use std::any::Any;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::record::{Attributes, Event, EventRecord};
use crate::registry::EventDataRegistry;
use crate::types::EventType;

/// An event payload.
///
/// Implemented automatically for every serde-serializable type via the
/// blanket impl below; callers never implement this by hand. The `Any`
/// escape hatch is what lets a loaded [`Event`] be downcast back to the
/// concrete payload type.
pub trait EventData: fmt::Debug + Send + Sync + 'static {
    /// Upcasts to `Any` for downcasting to the concrete payload type.
    fn as_any(&self) -> &dyn Any;

    /// Serializes the payload into the generic attribute encoding.
    fn to_attributes(&self) -> Result<Attributes, CodecError>;
}

impl<T> EventData for T
where
    T: Serialize + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_attributes(&self) -> Result<Attributes, CodecError> {
        match serde_json::to_value(self).map_err(CodecError::Serialize)? {
            Value::Object(map) => Ok(map),
            other => Err(CodecError::NotAMap {
                kind: value_kind(&other),
            }),
        }
    }
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Errors produced while encoding or decoding event payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload serialized to a value kind the attribute encoding cannot
    /// hold at the top level.
    #[error("event payload must encode to a map, got {kind}")]
    NotAMap {
        /// The value kind the payload actually serialized to.
        kind: &'static str,
    },

    /// The payload could not be serialized at all.
    #[error("could not marshal event payload: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A stored payload did not match the shape of its registered type.
    #[error("could not unmarshal payload of type '{event_type}': {source}")]
    Decode {
        /// The type tag whose registered shape was violated.
        event_type: EventType,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Translates between [`Event`] and [`EventRecord`], dispatching payload
/// decoding through a payload registry.
pub struct RecordCodec<'a> {
    registry: &'a EventDataRegistry,
}

impl<'a> RecordCodec<'a> {
    /// Creates a codec over the given registry.
    pub const fn new(registry: &'a EventDataRegistry) -> Self {
        Self { registry }
    }

    /// Encodes a domain event into a durable record.
    ///
    /// The payload field is omitted entirely when the event carries no data.
    pub fn encode(&self, event: &Event) -> Result<EventRecord, CodecError> {
        let payload = event.data().map(|data| data.to_attributes()).transpose()?;

        Ok(EventRecord {
            aggregate_id: event.aggregate_id(),
            version: event.version(),
            event_type: event.event_type().clone(),
            payload,
            timestamp: event.timestamp(),
            aggregate_type: event.aggregate_type().clone(),
            metadata: event.metadata().clone(),
        })
    }

    /// Decodes a durable record back into a domain event.
    ///
    /// An unregistered type tag yields an event with no payload rather than
    /// an error; malformed bytes for a registered tag fail with
    /// [`CodecError::Decode`].
    pub fn decode(&self, record: EventRecord) -> Result<Event, CodecError> {
        let EventRecord {
            aggregate_id,
            version,
            event_type,
            payload,
            timestamp,
            aggregate_type,
            metadata,
        } = record;

        let data = match (payload, self.registry.decoder(&event_type)) {
            (Some(attributes), Some(decoder)) => Some(decoder(attributes)?),
            _ => None,
        };

        Ok(Event::from_parts(
            aggregate_id,
            aggregate_type,
            event_type,
            version,
            timestamp,
            data,
            metadata,
        ))
    }
}
