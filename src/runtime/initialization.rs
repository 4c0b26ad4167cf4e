//! # Initialization
//!
//! Startup sequence: rustls crypto provider, tracing, metrics, health server
//! (with a readiness gate), Kubernetes client, then the reconciler's own
//! context. A process-wide shutdown token is created here and handed to
//! `Context`; `main` spawns the signal listener that cancels it, so every
//! in-flight decrypt sees the same cancellation source (§5).

use crate::constants::{DEFAULT_DECRYPT_TIMEOUT_SECS, DEFAULT_METRICS_PORT, DEFAULT_SOPS_BINARY, OPERATOR_ID};
use crate::controller::Context;
use crate::crd::SopsSecret;
use crate::keys::KeyLoader;
use crate::observability::{logging, metrics};
use crate::server::{start_server, ServerState};
use crate::sops::{Decryptor, SopsProcessDriver};
use anyhow::{bail, Context as _, Result};
use kube::api::{Api, ListParams};
use kube::runtime::events::Reporter;
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SERVER_STARTUP_TIMEOUT_SECS: u64 = 30;
const SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Whether the controller participates in leader election across replicas.
/// Only `Disabled` is implemented end-to-end today; `Enabled` is a
/// documented extension point rather than a silent no-op (§9 Open
/// Question resolution).
#[derive(Debug, Clone)]
pub enum LeaderElection {
    Disabled,
    Enabled { lease_name: String },
}

pub struct InitializationResult {
    pub client: Client,
    pub sops_secrets: Api<SopsSecret>,
    pub context: Arc<Context>,
    pub server_state: ServerState,
    /// Cancel this to trigger a graceful shutdown; `Context::shutdown` is a
    /// clone of the same token, so cancelling it here also cancels every
    /// in-flight decrypt.
    pub shutdown: CancellationToken,
}

pub async fn initialize(leader_election: LeaderElection) -> Result<InitializationResult> {
    if let LeaderElection::Enabled { lease_name } = &leader_election {
        bail!("leader election is not implemented yet (requested lease {lease_name})");
    }

    // Must run before any other rustls-dependent operation.
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    logging::init_tracing();
    info!("starting sops-secret-operator");

    metrics::register_metrics().context("failed to register metrics")?;

    let server_state = ServerState::new();
    let server_port = std::env::var("METRICS_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(DEFAULT_METRICS_PORT);

    let server_state_for_task = server_state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(error) = start_server(server_port, server_state_for_task).await {
            error!(%error, "health/metrics server exited with an error");
        }
    });

    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default().await.context("failed to create kubernetes client")?;
    let sops_secrets: Api<SopsSecret> = Api::all(client.clone());

    check_crd_queryable(&sops_secrets).await?;

    let keys = Arc::new(KeyLoader::from_env().context("failed to load SOPS keys")?);

    let timeout_secs = std::env::var("DECRYPT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_DECRYPT_TIMEOUT_SECS);
    let binary = std::env::var("SOPS_BINARY").unwrap_or_else(|_| DEFAULT_SOPS_BINARY.to_string());

    let decryptor: Arc<dyn Decryptor> = Arc::new(
        SopsProcessDriver::new(keys.clone())
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_binary(binary),
    );

    let reporter = Reporter {
        controller: OPERATOR_ID.to_string(),
        instance: std::env::var("POD_NAME").ok(),
    };

    let shutdown = CancellationToken::new();
    let context = Context::new(client.clone(), keys, decryptor, reporter, shutdown.clone());

    info!("initialization complete, handing off to the controller run loop");

    Ok(InitializationResult {
        client,
        sops_secrets,
        context,
        server_state,
        shutdown,
    })
}

async fn wait_for_server_ready(server_state: &ServerState, server_handle: &tokio::task::JoinHandle<()>) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(SERVER_STARTUP_TIMEOUT_SECS);

    loop {
        if server_handle.is_finished() {
            bail!("health/metrics server task exited before becoming ready");
        }
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("health/metrics server is ready");
            return Ok(());
        }
        if Instant::now() > deadline {
            bail!("health/metrics server did not become ready within {SERVER_STARTUP_TIMEOUT_SECS}s");
        }
        tokio::time::sleep(Duration::from_millis(SERVER_POLL_INTERVAL_MS)).await;
    }
}

/// Confirm the `SopsSecret` CRD is registered and queryable before the
/// controller starts its watch, so the readiness gate reflects reality
/// rather than a client that will fail its first list call.
async fn check_crd_queryable(api: &Api<SopsSecret>) -> Result<()> {
    let list = api
        .list(&ListParams::default().limit(1))
        .await
        .context("SopsSecret CRD is not queryable; is it installed?")?;
    info!(existing = list.items.len(), "SopsSecret CRD is queryable");
    Ok(())
}
