//! Error types for the event store.
//!
//! Every error surfaced by a store operation carries the namespace the
//! operation resolved, so that a multi-tenant caller can tell which tenant's
//! table misbehaved, and chains the underlying backend error where one
//! exists. Concurrency conflicts are a distinct kind from generic storage
//! failures: they are the expected, retryable outcome of optimistic
//! concurrency control.

use std::time::Duration;

use thiserror::Error;

use crate::types::{AggregateId, EventType, EventVersion, Namespace, TableName};

/// An error raised by an event store operation.
#[derive(Debug, Error)]
#[error("{kind} (namespace: {namespace})")]
pub struct EventStoreError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// The tenant namespace the failing operation resolved.
    pub namespace: Namespace,
    /// The underlying collaborator error, if any.
    #[source]
    pub source: Option<BackendError>,
}

impl EventStoreError {
    /// Creates an error with no underlying backend cause.
    pub const fn new(kind: ErrorKind, namespace: Namespace) -> Self {
        Self {
            kind,
            namespace,
            source: None,
        }
    }

    /// Creates an error caused by a backend failure.
    pub const fn with_source(kind: ErrorKind, namespace: Namespace, source: BackendError) -> Self {
        Self {
            kind,
            namespace,
            source: Some(source),
        }
    }
}

/// The kinds of failure an event store operation can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// A save was attempted with an empty batch.
    #[error("no events to append")]
    NoEvents,

    /// A batch contained events for more than one aggregate.
    #[error("event for aggregate {actual} in a batch for aggregate {expected}")]
    MismatchedAggregate {
        /// The aggregate id of the first event in the batch.
        expected: AggregateId,
        /// The offending aggregate id.
        actual: AggregateId,
    },

    /// A batch was not a gapless continuation of the base version.
    #[error("incorrect event version: expected {expected}, got {actual}")]
    IncorrectVersion {
        /// The version the batch position required.
        expected: u64,
        /// The version the event carried.
        actual: u64,
    },

    /// Another writer already occupied the `(aggregate, version)` slot.
    /// Recoverable: re-read the current version and retry with a fresh batch.
    #[error("concurrency conflict on aggregate {aggregate_id} at version {version}")]
    ConcurrencyConflict {
        /// The aggregate being appended to.
        aggregate_id: AggregateId,
        /// The version slot that was already taken.
        version: EventVersion,
    },

    /// A replace targeted an aggregate with no events at all.
    #[error("aggregate {0} not found")]
    AggregateNotFound(AggregateId),

    /// A replace targeted a `(aggregate, version)` slot that does not exist.
    /// A logical precondition violation, not a race.
    #[error("replace target missing: aggregate {aggregate_id} at version {version}")]
    ReplaceTargetMissing {
        /// The aggregate the replace targeted.
        aggregate_id: AggregateId,
        /// The version slot that was empty.
        version: EventVersion,
    },

    /// An event payload could not be marshaled into the attribute encoding.
    #[error("could not marshal event: {0}")]
    SerializationFailed(String),

    /// A stored payload did not match the shape of its registered type.
    #[error("could not unmarshal event: {0}")]
    DeserializationFailed(String),

    /// The downstream handler failed for an already-persisted event.
    /// The event remains durably stored.
    #[error("event handler failed on {event_type}@{version}: {detail}")]
    HandlerFailed {
        /// The type tag of the event the handler rejected.
        event_type: EventType,
        /// The version of the event the handler rejected.
        version: EventVersion,
        /// The handler's own failure message.
        detail: String,
    },

    /// A table lifecycle wait did not complete in time. Retryable.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A transport or storage failure in the backing store.
    #[error("storage operation failed")]
    Storage,
}

/// Errors reported by the backing document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// A conditional write's precondition did not hold.
    #[error("conditional check failed")]
    PreconditionFailed,

    /// The target table does not exist.
    #[error("table '{0}' not found")]
    TableNotFound(TableName),

    /// A table with this name already exists.
    #[error("table '{0}' already exists")]
    TableExists(TableName),

    /// The store did not respond in time.
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    /// The store is unreachable or rejected the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Type alias for event store results.
pub type EventStoreResult<T> = Result<T, EventStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_namespace() {
        let err = EventStoreError::new(ErrorKind::NoEvents, Namespace::try_new("tenant-a").unwrap());
        assert_eq!(err.to_string(), "no events to append (namespace: tenant-a)");
    }

    #[test]
    fn conflict_is_distinct_from_storage() {
        let id = AggregateId::generate();
        let kind = ErrorKind::ConcurrencyConflict {
            aggregate_id: id,
            version: EventVersion::first(),
        };
        assert_ne!(kind, ErrorKind::Storage);
        assert!(kind.to_string().contains("concurrency conflict"));
    }

    #[test]
    fn storage_error_chains_backend_source() {
        let table = TableName::try_new("events_default").unwrap();
        let err = EventStoreError::with_source(
            ErrorKind::Storage,
            Namespace::default_namespace(),
            BackendError::TableNotFound(table),
        );
        let source = std::error::Error::source(&err).expect("source should be set");
        assert!(source.to_string().contains("events_default"));
    }

    #[test]
    fn incorrect_version_message_names_both_versions() {
        let kind = ErrorKind::IncorrectVersion {
            expected: 4,
            actual: 6,
        };
        assert_eq!(
            kind.to_string(),
            "incorrect event version: expected 4, got 6"
        );
    }
}
