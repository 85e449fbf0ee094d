pub mod activity;
pub mod mutation;

pub use activity::{Activity, ActivityDescriptor};
pub use mutation::{Intent, MutationKind, PendingMutation};
