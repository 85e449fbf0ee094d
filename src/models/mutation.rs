use std::fmt;

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Signup,
    Unregister,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Signup => "signup",
            MutationKind::Unregister => "unregister",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user intent before it has touched the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub kind: MutationKind,
    pub activity: String,
    pub email: String,
}

impl Intent {
    pub fn signup(activity: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Signup,
            activity: activity.into(),
            email: email.into(),
        }
    }

    pub fn unregister(activity: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Unregister,
            activity: activity.into(),
            email: email.into(),
        }
    }
}

/// An intent whose remote call has not settled yet.
///
/// `applied` records whether the optimistic delta actually landed in the
/// roster; together with `kind` it is all that is needed to undo it.
/// `generation` is the roster load the delta was applied to. The activity is
/// referenced by name only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub id: Uuid,
    pub kind: MutationKind,
    pub activity: String,
    pub email: String,
    pub applied: bool,
    pub generation: u64,
}

impl PendingMutation {
    pub(crate) fn new(intent: Intent, applied: bool, generation: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: intent.kind,
            activity: intent.activity,
            email: intent.email,
            applied,
            generation,
        }
    }

    /// The kind of store operation that reverses this mutation's delta.
    pub fn inverse(&self) -> MutationKind {
        match self.kind {
            MutationKind::Signup => MutationKind::Unregister,
            MutationKind::Unregister => MutationKind::Signup,
        }
    }
}
