use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Activity as the remote registry describes it on `GET /activities`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDescriptor {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schedule: String,
    pub max_participants: u32,
    #[serde(default)]
    pub participants: Vec<String>,
}

/// Local mirror of one activity. Only the roster store builds and mutates these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub name: String,
    pub description: String,
    pub schedule: String,
    capacity: u32,
    participants: IndexSet<String>,
}

impl Activity {
    pub(crate) fn new(
        name: String,
        description: String,
        schedule: String,
        capacity: u32,
        participants: IndexSet<String>,
    ) -> Self {
        Self {
            name,
            description,
            schedule,
            capacity,
            participants,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.participants.iter().map(String::as_str)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.participants.contains(email)
    }

    pub fn spots_left(&self) -> u32 {
        let taken = u32::try_from(self.participants.len()).unwrap_or(u32::MAX);
        self.capacity.saturating_sub(taken)
    }

    pub fn is_full(&self) -> bool {
        self.spots_left() == 0
    }

    pub(crate) fn insert(&mut self, email: &str) -> bool {
        if self.is_full() || self.contains(email) {
            return false;
        }
        self.participants.insert(email.to_string())
    }

    pub(crate) fn remove(&mut self, email: &str) -> bool {
        // shift_remove keeps the display order of the remaining participants
        self.participants.shift_remove(email)
    }
}
