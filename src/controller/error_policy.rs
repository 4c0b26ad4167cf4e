//! # Error Policy
//!
//! Classifies whatever `reconcile` returns as `Err` into a requeue action.
//! Only genuine infrastructure errors ever reach this function: validation
//! and decrypt failures are absorbed into status inside `reconcile` and
//! returned as `Ok`, so everything here is a transient API problem or a
//! construction failure worth retrying with backoff (§7).
//!
//! Backoff grows per resource instead of using a flat delay: a resource
//! stuck in a crash loop backs off further on every consecutive failure,
//! while a resource that fails once and then recovers starts back at the
//! short delay next time. State is keyed by `namespace/name` in `Context`
//! so failures on one resource never perturb another's schedule.

use super::context::BackoffState;
use super::reconciler::ReconcileError;
use super::Context;
use crate::crd::SopsSecret;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

const MIN_BACKOFF_SECS: u64 = 5;
const MAX_BACKOFF_SECS: u64 = 300;
const OWNER_REFERENCE_FAILED_BACKOFF_SECS: u64 = MAX_BACKOFF_SECS;

/// Doubles the delay on every consecutive failure, starting at
/// `MIN_BACKOFF_SECS` and capping at `MAX_BACKOFF_SECS`. `error_count` is
/// the number of consecutive failures observed so far for this resource
/// (0 on the first failure).
fn classify_backoff(error: &ReconcileError, error_count: u32) -> Duration {
    if matches!(error, ReconcileError::OwnerReferenceFailed) {
        return Duration::from_secs(OWNER_REFERENCE_FAILED_BACKOFF_SECS);
    }

    let factor = 1u64.checked_shl(error_count).unwrap_or(u64::MAX);
    let secs = MIN_BACKOFF_SECS.saturating_mul(factor).min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

pub fn error_policy(object: Arc<SopsSecret>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    error!(%error, "reconciliation failed, requeuing with backoff");
    metrics::increment_reconcile_errors();
    metrics::increment_requeues("error-backoff");

    let key = format!("{}/{}", object.namespace().unwrap_or_default(), object.name_any());
    let error_count = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(key).or_insert_with(BackoffState::default);
            let count = state.error_count;
            state.error_count = state.error_count.saturating_add(1);
            count
        }
        Err(_) => 0,
    };

    Action::requeue(classify_backoff(error, error_count))
}
