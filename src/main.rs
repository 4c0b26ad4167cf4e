//! # SOPS Secret Operator
//!
//! Watches `SopsSecret` custom resources and the `Secret` objects they own,
//! decrypting each resource's SOPS payload and keeping a derived `Secret`
//! in sync with it.

use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::runtime::controller::Controller;
use kube::runtime::watcher;
use sops_secret_operator::controller::{error_policy, reconcile};
use sops_secret_operator::runtime::{initialize, LeaderElection};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize(LeaderElection::Disabled).await?;

    let secrets: Api<Secret> = Api::all(init.client.clone());

    let shutdown = init.shutdown.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        info!("shutdown signal received, cancelling in-flight decrypts");
        shutdown.cancel();
    });

    info!("starting controller run loop");

    Controller::new(init.sops_secrets, watcher::Config::default())
        .owns(secrets, watcher::Config::default())
        .run(reconcile, error_policy, init.context)
        .for_each(|result| async move {
            match result {
                Ok((object_ref, action)) => {
                    info!(name = %object_ref.name, ?action, "reconciled");
                }
                Err(error) => error!(%error, "reconcile failed"),
            }
        })
        .await;

    Ok(())
}
