//! Supertype ("friend") discovery for fired events

use crate::event::{Event, EventType, Supertype};
use dashmap::DashMap;
use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Resolves which supertypes of a concrete event type have listeners of their own.
///
/// The ancestry of a type never changes, so it is walked once per type and cached. Whether an
/// ancestor is a *friend* depends on the live registry and is decided on every query, so a
/// subscription made before the query is always taken into account.
#[derive(Default)]
pub struct EventTypeTracker {
    /// `EventType` of `T` -> `Vec<Supertype<T>>`
    ancestry: DashMap<EventType, Arc<dyn Any + Send + Sync>>,
}

impl EventTypeTracker {
    /// Creates a tracker with an empty ancestry cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every supertype of `T`, transitively, nearest first and without duplicates.
    ///
    /// `T` itself is never part of its own ancestry, even if the hierarchy loops back to it.
    pub fn ancestors_of<T: ?Sized + Event>(&self) -> Arc<Vec<Supertype<T>>> {
        let key = EventType::of::<T>();
        let cached = self
            .ancestry
            .get(&key)
            .and_then(|entry| Arc::clone(entry.value()).downcast::<Vec<Supertype<T>>>().ok());
        if let Some(ancestors) = cached {
            return ancestors;
        }

        let ancestors = Arc::new(walk_ancestry::<T>());
        self.ancestry.insert(key, Arc::clone(&ancestors) as Arc<dyn Any + Send + Sync>);
        ancestors
    }

    /// The supertypes of `T` for which `is_registered` holds.
    pub fn friends_of<T, F>(&self, is_registered: F) -> Vec<Supertype<T>>
    where
        T: ?Sized + Event,
        F: Fn(&EventType) -> bool,
    {
        self.ancestors_of::<T>()
            .iter()
            .filter(|supertype| is_registered(&supertype.event_type()))
            .cloned()
            .collect()
    }
}

fn walk_ancestry<T: ?Sized + Event>() -> Vec<Supertype<T>> {
    let mut seen = HashSet::from([EventType::of::<T>()]);
    let mut pending: VecDeque<Supertype<T>> = T::supertypes().into();
    let mut ancestors = Vec::new();

    while let Some(supertype) = pending.pop_front() {
        if !seen.insert(supertype.event_type()) {
            continue;
        }
        pending.extend(supertype.parents());
        ancestors.push(supertype);
    }

    ancestors
}

#[cfg(test)]
mod tests {
    use super::*;

    // Diamond: Gift -> {Credit, Notice}, Credit -> Ledger, Notice -> Ledger
    trait Ledger: Send + Sync {}
    trait Credit: Ledger {
        fn as_ledger(self: Arc<Self>) -> Arc<dyn Ledger>;
    }
    trait Notice: Ledger {
        fn as_ledger(self: Arc<Self>) -> Arc<dyn Ledger>;
    }

    impl Event for dyn Ledger {}

    impl Event for dyn Credit {
        fn supertypes() -> Vec<Supertype<Self>> {
            vec![Supertype::of(|credit: Arc<dyn Credit>| credit.as_ledger())]
        }
    }

    impl Event for dyn Notice {
        fn supertypes() -> Vec<Supertype<Self>> {
            vec![Supertype::of(|notice: Arc<dyn Notice>| notice.as_ledger())]
        }
    }

    struct Gift;

    impl Ledger for Gift {}

    impl Credit for Gift {
        fn as_ledger(self: Arc<Self>) -> Arc<dyn Ledger> {
            self
        }
    }

    impl Notice for Gift {
        fn as_ledger(self: Arc<Self>) -> Arc<dyn Ledger> {
            self
        }
    }

    impl Event for Gift {
        fn supertypes() -> Vec<Supertype<Self>> {
            vec![
                Supertype::of(|gift: Arc<Gift>| gift as Arc<dyn Credit>),
                Supertype::of(|gift: Arc<Gift>| gift as Arc<dyn Notice>),
            ]
        }
    }

    struct Plain;

    impl Event for Plain {}

    fn types_of<T: ?Sized + 'static>(supertypes: &[Supertype<T>]) -> Vec<EventType> {
        supertypes.iter().map(Supertype::event_type).collect()
    }

    #[test]
    fn test_ancestry_is_transitive_and_deduplicated() {
        let tracker = EventTypeTracker::new();
        let ancestors = tracker.ancestors_of::<Gift>();

        assert_eq!(
            types_of(&ancestors),
            vec![
                EventType::of::<dyn Credit>(),
                EventType::of::<dyn Notice>(),
                EventType::of::<dyn Ledger>(),
            ]
        );
    }

    #[test]
    fn test_ancestry_is_cached() {
        let tracker = EventTypeTracker::new();
        let first = tracker.ancestors_of::<Gift>();
        let second = tracker.ancestors_of::<Gift>();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_type_without_supertypes_has_no_friends() {
        let tracker = EventTypeTracker::new();
        assert!(tracker.ancestors_of::<Plain>().is_empty());
        assert!(tracker.friends_of::<Plain, _>(|_| true).is_empty());
    }

    #[test]
    fn test_friends_are_filtered_by_registration() {
        let tracker = EventTypeTracker::new();
        let registered = [EventType::of::<dyn Ledger>()];

        let friends = tracker.friends_of::<Gift, _>(|event_type| registered.contains(event_type));
        assert_eq!(types_of(&friends), vec![EventType::of::<dyn Ledger>()]);

        let ledger = friends[0].upcast(Arc::new(Gift));
        assert!(ledger.downcast::<dyn Ledger>().is_some());
    }

    #[test]
    fn test_friends_reflect_later_registrations() {
        let tracker = EventTypeTracker::new();
        let registered = std::sync::Mutex::new(Vec::new());

        let is_registered = |event_type: &EventType| registered.lock().unwrap().contains(event_type);
        assert!(tracker.friends_of::<Gift, _>(is_registered).is_empty());

        registered.lock().unwrap().push(EventType::of::<dyn Notice>());
        let friends = tracker.friends_of::<Gift, _>(is_registered);
        assert_eq!(types_of(&friends), vec![EventType::of::<dyn Notice>()]);
    }
}
