//! Payload-constructor registry.
//!
//! Maps event type tags to decoders producing a blank instance of the
//! matching payload type from stored attributes. The registry is populated
//! once at configuration time and handed to the store; the codec dispatches
//! through it instead of any ambient global lookup. Tags with no registered
//! constructor are tolerated at decode time, which is what keeps old records
//! referencing retired types loadable.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::codec::{CodecError, EventData};
use crate::record::Attributes;
use crate::types::EventType;

type Decoder = Arc<dyn Fn(Attributes) -> Result<Box<dyn EventData>, CodecError> + Send + Sync>;

/// Errors raised while populating the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The tag is already bound to a payload type.
    #[error("event type '{0}' is already registered")]
    DuplicateTag(EventType),
}

/// Registry of payload constructors keyed by event type tag.
#[derive(Clone, Default)]
pub struct EventDataRegistry {
    decoders: HashMap<EventType, Decoder>,
}

impl EventDataRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a payload type to an event type tag.
    ///
    /// Registering the same tag twice is an error; re-binding a tag to a
    /// different shape would silently change how historical records decode.
    pub fn register<T>(&mut self, event_type: EventType) -> Result<(), RegistryError>
    where
        T: DeserializeOwned + EventData,
    {
        if self.decoders.contains_key(&event_type) {
            return Err(RegistryError::DuplicateTag(event_type));
        }

        let tag = event_type.clone();
        let decoder: Decoder = Arc::new(move |attributes| {
            let data: T =
                serde_json::from_value(Value::Object(attributes)).map_err(|source| {
                    CodecError::Decode {
                        event_type: tag.clone(),
                        source,
                    }
                })?;
            Ok(Box::new(data))
        });

        self.decoders.insert(event_type, decoder);
        Ok(())
    }

    /// Looks up the decoder for a tag, if one is registered.
    pub(crate) fn decoder(&self, event_type: &EventType) -> Option<&Decoder> {
        self.decoders.get(event_type)
    }

    /// Whether the tag has a registered constructor.
    pub fn contains(&self, event_type: &EventType) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// All registered tags, in no particular order.
    pub fn registered_types(&self) -> Vec<&EventType> {
        self.decoders.keys().collect()
    }
}

impl std::fmt::Debug for EventDataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDataRegistry")
            .field("types", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}
