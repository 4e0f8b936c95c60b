//! Batch version validation.
//!
//! A save batch is only acceptable when every event belongs to the same
//! aggregate and the versions form a gapless continuation of the base
//! version: `base + 1, base + 2, ...`. The whole batch is validated before
//! any write is attempted, so a rejected batch persists nothing.

use crate::errors::ErrorKind;
use crate::record::Event;
use crate::types::AggregateId;

/// Validates a save batch against its base version.
///
/// Returns the aggregate id shared by the whole batch on success, or the
/// first violation found: [`ErrorKind::NoEvents`] for an empty batch,
/// [`ErrorKind::MismatchedAggregate`] for a foreign event,
/// [`ErrorKind::IncorrectVersion`] for the first version gap or
/// out-of-order entry.
pub(crate) fn validate_batch(
    events: &[Event],
    base_version: u64,
) -> Result<AggregateId, ErrorKind> {
    let first = events.first().ok_or(ErrorKind::NoEvents)?;
    let aggregate_id = first.aggregate_id();

    let mut expected = base_version;
    for event in events {
        if event.aggregate_id() != aggregate_id {
            return Err(ErrorKind::MismatchedAggregate {
                expected: aggregate_id,
                actual: event.aggregate_id(),
            });
        }

        expected += 1;
        let actual: u64 = event.version().into();
        if actual != expected {
            return Err(ErrorKind::IncorrectVersion { expected, actual });
        }
    }

    Ok(aggregate_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AggregateType, EventType, EventVersion};
    use proptest::prelude::*;

    fn event(aggregate_id: AggregateId, version: u64) -> Event {
        Event::new(
            AggregateType::try_new("Order").unwrap(),
            EventType::try_new("OrderCreated").unwrap(),
            aggregate_id,
            EventVersion::try_new(version).unwrap(),
        )
    }

    fn batch(aggregate_id: AggregateId, versions: &[u64]) -> Vec<Event> {
        versions.iter().map(|v| event(aggregate_id, *v)).collect()
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert_eq!(validate_batch(&[], 0), Err(ErrorKind::NoEvents));
    }

    #[test]
    fn contiguous_batch_from_base_is_accepted() {
        let id = AggregateId::generate();
        let events = batch(id, &[4, 5, 6]);
        assert_eq!(validate_batch(&events, 3), Ok(id));
    }

    #[test]
    fn gap_is_rejected_at_first_mismatch() {
        let id = AggregateId::generate();
        let events = batch(id, &[1, 3]);
        assert_eq!(
            validate_batch(&events, 0),
            Err(ErrorKind::IncorrectVersion {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn wrong_base_is_rejected_on_first_event() {
        let id = AggregateId::generate();
        let events = batch(id, &[1]);
        assert_eq!(
            validate_batch(&events, 3),
            Err(ErrorKind::IncorrectVersion {
                expected: 4,
                actual: 1
            })
        );
    }

    #[test]
    fn foreign_aggregate_is_rejected() {
        let id = AggregateId::generate();
        let stranger = AggregateId::generate();
        let mut events = batch(id, &[1]);
        events.push(event(stranger, 2));
        assert_eq!(
            validate_batch(&events, 0),
            Err(ErrorKind::MismatchedAggregate {
                expected: id,
                actual: stranger
            })
        );
    }

    proptest! {
        #[test]
        fn any_contiguous_batch_is_accepted(base in 0u64..1_000_000, len in 1usize..32) {
            let id = AggregateId::generate();
            let versions: Vec<u64> = (1..=len as u64).map(|i| base + i).collect();
            let events = batch(id, &versions);
            prop_assert_eq!(validate_batch(&events, base), Ok(id));
        }

        #[test]
        fn any_shifted_batch_is_rejected(base in 0u64..1_000_000, shift in 1u64..100, len in 1usize..16) {
            let id = AggregateId::generate();
            let versions: Vec<u64> = (1..=len as u64).map(|i| base + shift + i).collect();
            let events = batch(id, &versions);
            prop_assert!(validate_batch(&events, base).is_err());
        }
    }
}
