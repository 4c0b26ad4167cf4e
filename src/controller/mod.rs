//! Reconciliation for `SopsSecret` resources.

mod context;
mod error_policy;
mod reconciler;

pub use context::{BackoffState, Context};
pub use error_policy::error_policy;
pub use reconciler::{reconcile, ReconcileError};
