//! Core domain types.
//!
//! All types use smart constructors so that a value, once built, is valid
//! for the rest of its life. Strings are trimmed and bounded; versions are
//! one-based by construction.

use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The identity of one aggregate. Events for the same aggregate share one
/// partition and one contiguous version sequence.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsRef,
    Deref,
    Display,
    Serialize,
    Deserialize
))]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Generates a fresh random identity.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// The position of an event within its aggregate's stream.
///
/// Versions start at 1 and increment by one per event. Zero is not a
/// version; it only appears as a caller's "no events observed yet" base.
#[nutype(
    validate(greater_or_equal = 1),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct EventVersion(u64);

impl EventVersion {
    /// The version of the first event in any stream (1).
    pub fn first() -> Self {
        Self::try_new(1).expect("1 is always a valid version")
    }

    /// Returns the next version after this one.
    #[must_use]
    pub fn next(self) -> Self {
        let current: u64 = self.into();
        Self::try_new(current + 1).expect("a version plus one is always a valid version")
    }
}

/// The tag naming what kind of event a record holds.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct EventType(String);

/// The kind of aggregate a stream belongs to.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct AggregateType(String);

/// A tenant namespace. Each namespace resolves to its own physical table.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct Namespace(String);

impl Namespace {
    /// The namespace used when a request carries none.
    pub fn default_namespace() -> Self {
        Self::try_new("default").expect("'default' is a valid namespace")
    }
}

/// The fixed stem of physical table names, set once per store.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct TablePrefix(String);

/// A fully resolved physical table name.
#[nutype(
    sanitize(trim),
    validate(not_empty),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct TableName(String);

/// A UTC wall-clock instant stamped on each event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Captures the current instant.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wraps an explicit instant.
    pub const fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// Returns the wrapped instant.
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}
