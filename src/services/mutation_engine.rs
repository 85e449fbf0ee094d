use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Intent, MutationKind, PendingMutation};
use crate::services::remote_authority_service::{
    Ack, RemoteAuthority, RemoteError, GENERIC_REJECTION,
};
use crate::services::roster_store::{RosterError, SharedRoster};

/// How far the local capacity/duplicate check is trusted before asking the
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecheckPolicy {
    /// A failed local check only means no optimistic delta is applied; the
    /// registry is still asked and has the final word.
    #[default]
    Advisory,
    /// A failed local check rejects the intent without any remote call.
    Enforce,
}

impl PrecheckPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "advisory" => Some(Self::Advisory),
            "enforce" => Some(Self::Enforce),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    CapacityExceeded,
    DuplicateParticipant,
    NotAParticipant,
    UnknownActivity,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Precondition::CapacityExceeded => "Activity is full",
            Precondition::DuplicateParticipant => "Student is already signed up",
            Precondition::NotAParticipant => "Student is not signed up for this activity",
            Precondition::UnknownActivity => "Activity not found",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("{0}")]
    Network(String),
    #[error("{}", .detail.as_deref().unwrap_or(GENERIC_REJECTION))]
    Rejected { detail: Option<String> },
    #[error("{0}")]
    LocalPrecondition(Precondition),
    #[error(transparent)]
    Load(#[from] RosterError),
}

impl From<RemoteError> for MutationError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Network { reason, .. } => MutationError::Network(reason),
            RemoteError::Rejected { detail, .. } => MutationError::Rejected { detail },
        }
    }
}

/// What settling a pending mutation did to the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Committed,
    RolledBack,
    /// The local roster no longer agrees with the registry and must be reloaded.
    Resync,
}

pub struct MutationEngine<R> {
    roster: SharedRoster,
    remote: R,
    precheck: PrecheckPolicy,
}

impl<R: RemoteAuthority> MutationEngine<R> {
    pub fn new(roster: SharedRoster, remote: R, precheck: PrecheckPolicy) -> Self {
        Self {
            roster,
            remote,
            precheck,
        }
    }

    pub fn roster(&self) -> &SharedRoster {
        &self.roster
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Fetches the full roster and swaps it in. A failed load leaves the
    /// current roster untouched.
    pub async fn reload(&self) -> Result<usize, MutationError> {
        let descriptors = self.remote.load_all().await?;
        let count = self.roster.lock().replace_all(descriptors).inspect_err(|e| {
            warn!(error = %e, "📋 registry sent an inconsistent roster, keeping the old one");
        })?;
        info!(activities = count, "📋 roster loaded");
        Ok(count)
    }

    /// Applies the intent's optimistic delta in one critical section.
    pub fn begin(&self, intent: Intent) -> Result<PendingMutation, MutationError> {
        let mut store = self.roster.lock();
        let before = store.snapshot(&intent.activity);
        let generation = store.generation();

        let applied = match intent.kind {
            MutationKind::Signup => store.add_participant(&intent.activity, &intent.email),
            MutationKind::Unregister => store.remove_participant(&intent.activity, &intent.email),
        };
        drop(store);

        if !applied {
            let reason = match (&before, intent.kind) {
                (None, _) => Precondition::UnknownActivity,
                (Some(a), MutationKind::Signup) if a.contains(&intent.email) => {
                    Precondition::DuplicateParticipant
                }
                (Some(_), MutationKind::Signup) => Precondition::CapacityExceeded,
                (Some(_), MutationKind::Unregister) => Precondition::NotAParticipant,
            };
            if self.precheck == PrecheckPolicy::Enforce {
                info!(
                    kind = %intent.kind,
                    activity = %intent.activity,
                    email = %intent.email,
                    %reason,
                    "📋 rejected locally"
                );
                return Err(MutationError::LocalPrecondition(reason));
            }
            debug!(
                kind = %intent.kind,
                activity = %intent.activity,
                %reason,
                "📋 local check failed, deferring to registry"
            );
        }

        let pending = PendingMutation::new(intent, applied, generation);
        debug!(id = %pending.id, kind = %pending.kind, applied, "📋 optimistic mutation begun");
        Ok(pending)
    }

    pub async fn dispatch(&self, pending: &PendingMutation) -> Result<Ack, RemoteError> {
        match pending.kind {
            MutationKind::Signup => self.remote.signup(&pending.activity, &pending.email).await,
            MutationKind::Unregister => {
                self.remote
                    .unregister(&pending.activity, &pending.email)
                    .await
            }
        }
    }

    /// Commits or undoes exactly this mutation's delta. Other mutations'
    /// effects on the same activity are left alone.
    pub fn settle<T>(&self, pending: &PendingMutation, outcome: &Result<T, RemoteError>) -> Settlement {
        let mut store = self.roster.lock();
        if store.generation() != pending.generation {
            // a reload replaced the roster this delta was applied to
            return match outcome {
                Ok(_) => {
                    let holds = match pending.kind {
                        MutationKind::Signup => {
                            store.add_participant(&pending.activity, &pending.email)
                                || store
                                    .get(&pending.activity)
                                    .is_some_and(|a| a.contains(&pending.email))
                        }
                        MutationKind::Unregister => {
                            store.remove_participant(&pending.activity, &pending.email)
                                || store
                                    .get(&pending.activity)
                                    .is_some_and(|a| !a.contains(&pending.email))
                        }
                    };
                    drop(store);
                    if holds {
                        info!(id = %pending.id, kind = %pending.kind, activity = %pending.activity, "📋 mutation committed onto reloaded roster");
                        Settlement::Committed
                    } else {
                        warn!(id = %pending.id, kind = %pending.kind, activity = %pending.activity, "📋 reloaded roster cannot take an accepted mutation");
                        Settlement::Resync
                    }
                }
                Err(err) => {
                    debug!(id = %pending.id, kind = %pending.kind, error = %err, "📋 mutation failed, reload already dropped its delta");
                    Settlement::RolledBack
                }
            };
        }

        match outcome {
            Ok(_) if pending.applied => {
                info!(id = %pending.id, kind = %pending.kind, activity = %pending.activity, "📋 mutation committed");
                Settlement::Committed
            }
            Ok(_) => {
                warn!(
                    id = %pending.id,
                    kind = %pending.kind,
                    activity = %pending.activity,
                    "📋 registry accepted a mutation the local roster refused"
                );
                Settlement::Resync
            }
            Err(_) if !pending.applied => Settlement::RolledBack,
            Err(err) => {
                let undone = match pending.inverse() {
                    MutationKind::Signup => store.add_participant(&pending.activity, &pending.email),
                    MutationKind::Unregister => {
                        store.remove_participant(&pending.activity, &pending.email)
                    }
                };
                drop(store);

                if undone {
                    warn!(id = %pending.id, kind = %pending.kind, activity = %pending.activity, error = %err, "📋 mutation rolled back");
                    Settlement::RolledBack
                } else {
                    // A concurrent mutation took the slot (or the entry) this one freed.
                    warn!(id = %pending.id, kind = %pending.kind, activity = %pending.activity, error = %err, "📋 rollback blocked, roster is stale");
                    Settlement::Resync
                }
            }
        }
    }

    /// Runs one intent end to end. `on_applied` fires right after the
    /// optimistic delta lands and before the remote call is made.
    pub async fn submit<F>(&self, intent: Intent, on_applied: F) -> Result<Ack, MutationError>
    where
        F: FnOnce(&PendingMutation),
    {
        let pending = self.begin(intent)?;
        on_applied(&pending);

        let outcome = self.dispatch(&pending).await;
        if self.settle(&pending, &outcome) == Settlement::Resync {
            if let Err(e) = self.reload().await {
                warn!(id = %pending.id, error = %e, "📋 resync after {} failed", pending.kind);
            }
        }
        outcome.map_err(MutationError::from)
    }
}
