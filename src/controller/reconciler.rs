//! # Reconciler
//!
//! The ten-step state machine from §4.F: fetch, deletion branch, finalizer
//! branch, suspension check, digest skip, validate, decrypt, derive/apply,
//! status commit. Finalizers are added and removed via merge-patch, and the
//! derived `Secret` carries an owner reference back to the `SopsSecret` that
//! produced it, so deleting the owner cleans up the owned object through
//! garbage collection as well as the explicit deletion branch below.

use super::Context;
use crate::constants::{
    DEFAULT_REQUEUE_SECS, FINALIZER, FINALIZER_REQUEUE_SECS, OPERATOR_ID,
};
use crate::crd::{upsert_condition, Condition, ConditionStatus, ConditionType, SopsSecret};
use crate::derive::{derive_secret, to_k8s_secret};
use crate::observability::metrics;
use crate::sops;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::{Event, EventType, Recorder};
use kube::{Resource, ResourceExt};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Error kinds that reach `error_policy` (§7). Failures already absorbed
/// into status (`ValidationFailed`, `DecryptFailed`) are never constructed
/// here — `reconcile` short-circuits those to `Ok` after writing status.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("kubernetes api error: {0}")]
    TransientApi(String),
    #[error("owner reference could not be constructed; is the CRD registered with the API server?")]
    OwnerReferenceFailed,
}

impl From<kube::Error> for ReconcileError {
    fn from(err: kube::Error) -> Self {
        ReconcileError::TransientApi(err.to_string())
    }
}

pub async fn reconcile(obj: Arc<SopsSecret>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    metrics::increment_reconciliations();

    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let api: Api<SopsSecret> = Api::namespaced(ctx.client.clone(), &namespace);
    let recorder = Recorder::new(ctx.client.clone(), ctx.reporter.clone(), obj.object_ref(&()));

    // 2. Deletion branch.
    if obj.meta().deletion_timestamp.is_some() {
        return handle_deletion(&obj, &ctx, &api, &recorder, &namespace, &name).await;
    }

    // 3. Finalizer branch.
    if !has_finalizer(&obj) {
        add_finalizer(&api, &name).await?;
        return Ok(Action::requeue(Duration::from_secs(FINALIZER_REQUEUE_SECS)));
    }

    // 4. Suspension check.
    if obj.spec.suspend {
        return Ok(Action::await_change());
    }

    // 5. Digest skip.
    let digest = sha256_hex(obj.spec.encrypted_payload.as_bytes());
    if unchanged_since_last_reconcile(&obj, &digest) {
        let secret_name = derive_secret_name(&obj);
        let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);
        if secrets.get_opt(&secret_name).await?.is_some() {
            return Ok(Action::requeue(Duration::from_secs(DEFAULT_REQUEUE_SECS)));
        }
        // Derived Secret vanished out from under us (§3 invariant 1); fall
        // through to a full reconciliation to recreate it.
    }

    // 6. Validate.
    if let Err(validation_error) = sops::validate(obj.spec.encrypted_payload.as_bytes()) {
        warn!(%validation_error, "payload failed structural validation");
        emit(
            &recorder,
            EventType::Warning,
            validation_error.reason(),
            validation_error.to_string(),
        )
        .await;
        let condition = Condition::new(
            ConditionType::Ready,
            ConditionStatus::False,
            validation_error.reason(),
            validation_error.to_string(),
            obj.meta().generation,
        );
        commit_failure_conditions(&api, &obj, &name, condition).await?;
        return Ok(Action::requeue(Duration::from_secs(DEFAULT_REQUEUE_SECS)));
    }

    // 7. Decrypt. The token is a child of the process-wide shutdown token
    // (§5), so a SIGTERM/Ctrl-C during an in-flight decrypt cancels the
    // `sops` subprocess instead of leaving it to outlive the controller.
    let decrypt_started = std::time::Instant::now();
    let decrypt_result = ctx
        .decryptor
        .decrypt(&obj.spec.encrypted_payload, ctx.shutdown.child_token())
        .await;
    metrics::observe_decrypt_duration(decrypt_started.elapsed().as_secs_f64());
    let payload = match decrypt_result {
        Ok(payload) => payload,
        Err(sops_error) => {
            metrics::increment_decrypt_failures();
            warn!(%sops_error, "decryption failed");
            emit(&recorder, EventType::Warning, sops_error.reason(), sops_error.to_string()).await;
            let condition = Condition::new(
                ConditionType::Ready,
                ConditionStatus::False,
                sops_error.reason(),
                sops_error.to_string(),
                obj.meta().generation,
            );
            commit_failure_conditions(&api, &obj, &name, condition).await?;
            return Ok(Action::requeue(Duration::from_secs(DEFAULT_REQUEUE_SECS)));
        }
    };

    // 8. Decrypted=True.
    emit(&recorder, EventType::Normal, "Decrypted", "payload decrypted successfully".to_string()).await;
    let mut conditions = obj.status.as_ref().map(|s| s.conditions.clone()).unwrap_or_default();
    upsert_condition(
        &mut conditions,
        Condition::new(ConditionType::Decrypted, ConditionStatus::True, "Success", "payload decrypted successfully", obj.meta().generation),
    );

    // 9. Derive and apply.
    let derived = derive_secret(&obj, &payload);
    let secret = to_k8s_secret(&derived, &obj).ok_or(ReconcileError::OwnerReferenceFailed)?;
    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);

    match secrets.get_opt(&derived.name).await? {
        None => {
            secrets.create(&Default::default(), &secret).await?;
            info!(secret = %derived.name, "created derived secret");
            emit(
                &recorder,
                EventType::Normal,
                "SecretCreated",
                format!("created Secret {}/{}", derived.namespace, derived.name),
            )
            .await;
        }
        Some(_) => {
            secrets
                .patch(
                    &derived.name,
                    &PatchParams::apply(OPERATOR_ID).force(),
                    &Patch::Apply(&secret),
                )
                .await?;
            info!(secret = %derived.name, "updated derived secret");
            emit(
                &recorder,
                EventType::Normal,
                "SecretUpdated",
                format!("updated Secret {}/{}", derived.namespace, derived.name),
            )
            .await;
        }
    }

    // 10. Status commit.
    upsert_condition(
        &mut conditions,
        Condition::new(ConditionType::Ready, ConditionStatus::True, "Success", "reconciled successfully", obj.meta().generation),
    );
    let status = serde_json::json!({
        "status": {
            "derivedSecretName": derived.name,
            "lastInputDigest": digest,
            "lastDecryptedTimestamp": chrono::Utc::now().to_rfc3339(),
            "observedGeneration": obj.meta().generation,
            "conditions": conditions,
        }
    });
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&status)).await?;

    if let Ok(mut states) = ctx.backoff_states.lock() {
        states.remove(&format!("{namespace}/{name}"));
    }

    Ok(Action::requeue(Duration::from_secs(DEFAULT_REQUEUE_SECS)))
}

async fn handle_deletion(
    obj: &SopsSecret,
    ctx: &Context,
    api: &Api<SopsSecret>,
    recorder: &Recorder,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcileError> {
    if has_finalizer(obj) {
        let secret_name = derive_secret_name(obj);
        let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), namespace);
        if let Some(secret) = secrets.get_opt(&secret_name).await? {
            if owned_by(&secret, obj) {
                secrets.delete(&secret_name, &Default::default()).await?;
                emit(
                    recorder,
                    EventType::Normal,
                    "SecretDeleted",
                    format!("deleted Secret {namespace}/{secret_name}"),
                )
                .await;
            }
        }
        remove_finalizer(api, name).await?;
    }
    Ok(Action::await_change())
}

fn has_finalizer(obj: &SopsSecret) -> bool {
    obj.finalizers().iter().any(|f| f == FINALIZER)
}

fn owned_by(secret: &Secret, obj: &SopsSecret) -> bool {
    secret
        .metadata
        .owner_references
        .as_ref()
        .is_some_and(|owners| owners.iter().any(|o| o.uid == obj.uid().unwrap_or_default()))
}

async fn add_finalizer(api: &Api<SopsSecret>, name: &str) -> Result<(), kube::Error> {
    let patch = serde_json::json!({ "metadata": { "finalizers": [FINALIZER] } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
    Ok(())
}

async fn remove_finalizer(api: &Api<SopsSecret>, name: &str) -> Result<(), kube::Error> {
    let patch = serde_json::json!({ "metadata": { "finalizers": [] } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
    Ok(())
}

fn derive_secret_name(obj: &SopsSecret) -> String {
    obj.spec
        .secret_name
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| obj.name_any())
}

fn unchanged_since_last_reconcile(obj: &SopsSecret, digest: &str) -> bool {
    obj.status.as_ref().is_some_and(|status| {
        status.last_input_digest.as_deref() == Some(digest) && status.observed_generation == obj.meta().generation
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

async fn commit_failure_conditions(
    api: &Api<SopsSecret>,
    obj: &SopsSecret,
    name: &str,
    ready_condition: Condition,
) -> Result<(), kube::Error> {
    let mut conditions = obj.status.as_ref().map(|s| s.conditions.clone()).unwrap_or_default();
    upsert_condition(
        &mut conditions,
        Condition::new(
            ConditionType::Decrypted,
            ConditionStatus::False,
            ready_condition.reason.clone().unwrap_or_default(),
            ready_condition.message.clone().unwrap_or_default(),
            obj.meta().generation,
        ),
    );
    upsert_condition(&mut conditions, ready_condition);

    let status = failure_status_patch(&conditions);
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&status)).await?;
    Ok(())
}

/// Builds the merge-patch body for a failed reconciliation. Deliberately
/// omits `observedGeneration` (§3 invariant 2): that field only ever
/// advances on the success path, so its equality with `metadata.generation`
/// always means the current spec was last observed by a successful
/// reconciliation, never a permanently failing one.
fn failure_status_patch(conditions: &[Condition]) -> serde_json::Value {
    serde_json::json!({
        "status": {
            "conditions": conditions,
        }
    })
}

async fn emit(recorder: &Recorder, type_: EventType, reason: impl Into<String>, note: String) {
    let result = recorder
        .publish(&Event {
            type_,
            reason: reason.into(),
            note: Some(note),
            action: "Reconcile".to_string(),
            secondary: None,
        })
        .await;
    if let Err(error) = result {
        warn!(%error, "failed to publish event");
    }
}
