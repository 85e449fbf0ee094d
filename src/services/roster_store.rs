use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::models::{Activity, ActivityDescriptor};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("activity '{activity}' lists {participants} participants but only has room for {capacity}")]
    OverCapacity {
        activity: String,
        participants: usize,
        capacity: u32,
    },
}

/// In-memory mirror of every activity, in the order the registry listed them.
///
/// Every method is synchronous and keeps `participants <= capacity` for each
/// activity whatever order the calls arrive in.
#[derive(Debug, Default)]
pub struct RosterStore {
    activities: IndexMap<String, Activity>,
    loaded: bool,
    generation: u64,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole roster. Nothing is changed when any descriptor is
    /// inconsistent.
    pub fn replace_all(
        &mut self,
        descriptors: IndexMap<String, ActivityDescriptor>,
    ) -> Result<usize, RosterError> {
        let mut next = IndexMap::with_capacity(descriptors.len());
        for (name, d) in descriptors {
            let participants: IndexSet<String> = d.participants.into_iter().collect();
            if participants.len() > d.max_participants as usize {
                return Err(RosterError::OverCapacity {
                    activity: name,
                    participants: participants.len(),
                    capacity: d.max_participants,
                });
            }
            let activity = Activity::new(
                name.clone(),
                d.description,
                d.schedule,
                d.max_participants,
                participants,
            );
            next.insert(name, activity);
        }

        self.activities = next;
        self.loaded = true;
        self.generation += 1;
        Ok(self.activities.len())
    }

    /// Adds `email` unless the activity is unknown, full, or already has it.
    pub fn add_participant(&mut self, activity: &str, email: &str) -> bool {
        self.activities
            .get_mut(activity)
            .is_some_and(|a| a.insert(email))
    }

    pub fn remove_participant(&mut self, activity: &str, email: &str) -> bool {
        self.activities
            .get_mut(activity)
            .is_some_and(|a| a.remove(email))
    }

    pub fn snapshot(&self, activity: &str) -> Option<Activity> {
        self.activities.get(activity).cloned()
    }

    /// Display position of the activity in roster order.
    pub fn position(&self, activity: &str) -> Option<usize> {
        self.activities.get_index_of(activity)
    }

    pub fn get(&self, activity: &str) -> Option<&Activity> {
        self.activities.get(activity)
    }

    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Bumped by every successful `replace_all`.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The session's one roster, handed to the engine and the binder.
///
/// The lock is only ever taken for synchronous store calls and never held
/// across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedRoster(Arc<Mutex<RosterStore>>);

impl SharedRoster {
    pub fn new(store: RosterStore) -> Self {
        Self(Arc::new(Mutex::new(store)))
    }

    pub fn lock(&self) -> MutexGuard<'_, RosterStore> {
        // the store has no partially-applied states, so a poisoned lock is still usable
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn descriptor(max: u32, participants: &[&str]) -> ActivityDescriptor {
        ActivityDescriptor {
            description: "Stretch and breathe".to_string(),
            schedule: "Mondays, 7:00 AM".to_string(),
            max_participants: max,
            participants: participants.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn yoga_store() -> RosterStore {
        let mut store = RosterStore::new();
        let mut d = IndexMap::new();
        d.insert("Yoga".to_string(), descriptor(2, &["a@x.com"]));
        store.replace_all(d).unwrap();
        store
    }

    #[test]
    fn load_derives_spots_left() {
        let store = yoga_store();
        let yoga = store.get("Yoga").unwrap();
        assert_eq!(yoga.spots_left(), 1);
        assert_eq!(yoga.participants().collect::<Vec<_>>(), vec!["a@x.com"]);
        assert!(store.is_loaded());
        assert_eq!(store.generation(), 1);
        assert_eq!(store.position("Yoga"), Some(0));
    }

    #[test]
    fn add_rejects_duplicates_and_full_activities() {
        let mut store = yoga_store();
        assert!(!store.add_participant("Yoga", "a@x.com"));
        assert!(store.add_participant("Yoga", "b@x.com"));
        assert_eq!(store.get("Yoga").unwrap().spots_left(), 0);
        assert!(!store.add_participant("Yoga", "c@x.com"));
        assert_eq!(store.get("Yoga").unwrap().participant_count(), 2);
    }

    #[test]
    fn unknown_activity_is_a_no_op() {
        let mut store = yoga_store();
        assert!(!store.add_participant("Chess Club", "a@x.com"));
        assert!(!store.remove_participant("Chess Club", "a@x.com"));
        assert!(store.snapshot("Chess Club").is_none());
    }

    #[test]
    fn remove_requires_membership() {
        let mut store = yoga_store();
        assert!(!store.remove_participant("Yoga", "z@x.com"));
        assert!(store.remove_participant("Yoga", "a@x.com"));
        assert_eq!(store.get("Yoga").unwrap().spots_left(), 2);
    }

    #[test]
    fn snapshot_is_detached_from_the_store() {
        let mut store = yoga_store();
        let before = store.snapshot("Yoga").unwrap();
        store.add_participant("Yoga", "b@x.com");
        assert_eq!(before.participant_count(), 1);
        assert_eq!(store.get("Yoga").unwrap().participant_count(), 2);
    }

    #[test]
    fn failed_replace_keeps_previous_roster() {
        let mut store = yoga_store();
        let mut bad = IndexMap::new();
        bad.insert("Chess Club".to_string(), descriptor(12, &[]));
        bad.insert("Tiny".to_string(), descriptor(1, &["a@x.com", "b@x.com"]));

        let err = store.replace_all(bad).unwrap_err();
        assert!(matches!(err, RosterError::OverCapacity { ref activity, .. } if activity == "Tiny"));
        assert_eq!(store.activities().map(|a| a.name.as_str()).collect::<Vec<_>>(), vec!["Yoga"]);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn replace_collapses_duplicate_emails_and_keeps_order() {
        let mut store = RosterStore::new();
        let mut d = IndexMap::new();
        d.insert("Programming Class".to_string(), descriptor(3, &["a@x.com", "a@x.com"]));
        d.insert("Chess Club".to_string(), descriptor(12, &[]));
        d.insert("Art Club".to_string(), descriptor(0, &[]));
        assert_eq!(store.replace_all(d).unwrap(), 3);

        assert_eq!(
            store.activities().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            vec!["Programming Class", "Chess Club", "Art Club"]
        );
        assert_eq!(store.get("Programming Class").unwrap().spots_left(), 2);
        assert!(!store.add_participant("Art Club", "a@x.com"));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize, usize),
        Remove(usize, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 0..6usize).prop_map(|(a, e)| Op::Add(a, e)),
            (0..3usize, 0..6usize).prop_map(|(a, e)| Op::Remove(a, e)),
        ]
    }

    proptest! {
        #[test]
        fn capacity_invariant_holds_for_any_sequence(
            caps in proptest::collection::vec(0u32..4, 3),
            ops in proptest::collection::vec(op(), 0..64),
        ) {
            let mut store = RosterStore::new();
            let mut d = IndexMap::new();
            for (i, cap) in caps.iter().enumerate() {
                d.insert(format!("activity-{i}"), descriptor(*cap, &[]));
            }
            store.replace_all(d).unwrap();

            for op in ops {
                let before: Vec<usize> = store.activities().map(|a| a.participant_count()).collect();
                let (idx, changed) = match op {
                    Op::Add(a, e) => (a, store.add_participant(&format!("activity-{a}"), &format!("p{e}@x.com"))),
                    Op::Remove(a, e) => (a, store.remove_participant(&format!("activity-{a}"), &format!("p{e}@x.com"))),
                };
                for a in store.activities() {
                    prop_assert!(a.participant_count() <= a.capacity() as usize);
                    prop_assert_eq!(a.spots_left() as usize, a.capacity() as usize - a.participant_count());
                }
                let after: Vec<usize> = store.activities().map(|a| a.participant_count()).collect();
                for (i, (b, a)) in before.iter().zip(after.iter()).enumerate() {
                    if i != idx || !changed {
                        prop_assert_eq!(b, a);
                    }
                }
            }
        }
    }
}
