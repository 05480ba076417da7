//! Reconciliation between the local store and the remote store.
//!
//! - [`SyncService::pull`] hydrates a resumable remote session into an empty
//!   local store.
//! - [`PushService::push_pending`] uploads rows flagged `is_synced = 0`.

mod pull;
mod push;

pub use pull::{SyncOutcome, SyncService, SyncStep};
pub use push::{PushReport, PushService};
