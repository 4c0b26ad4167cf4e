//! Shared state threaded through every reconciliation (§4.G wiring).

use crate::keys::KeyLoader;
use crate::sops::Decryptor;
use kube::runtime::events::Reporter;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Per-resource retry state for the error-policy backoff (§7). Keyed by
/// `namespace/name` so one resource stuck failing never perturbs another's
/// backoff schedule.
#[derive(Debug, Default)]
pub struct BackoffState {
    pub error_count: u32,
}

/// Per-process context handed to `reconcile` by `kube_runtime::Controller`.
/// Cheap to clone: everything behind it is either `Clone` itself or an
/// `Arc`. `reporter` identifies this controller to the events API; a fresh
/// `Recorder` bound to the reconciled object's reference is built per call
/// (the `Recorder` type carries an object reference, so it can't be shared
/// across objects).
pub struct Context {
    pub client: Client,
    pub keys: Arc<KeyLoader>,
    pub decryptor: Arc<dyn Decryptor>,
    pub reporter: Reporter,
    /// Cancelled once the process receives a shutdown signal; a child token
    /// derived from this is handed to every decrypt call so an in-flight
    /// `sops` subprocess is killed instead of outliving the controller.
    pub shutdown: CancellationToken,
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl Context {
    pub fn new(
        client: Client,
        keys: Arc<KeyLoader>,
        decryptor: Arc<dyn Decryptor>,
        reporter: Reporter,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            keys,
            decryptor,
            reporter,
            shutdown,
            backoff_states: Mutex::new(HashMap::new()),
        })
    }
}
