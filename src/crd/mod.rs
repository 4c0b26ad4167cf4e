//! # Custom Resource Definition
//!
//! The `SopsSecret` custom resource: a SOPS-encrypted payload plus
//! derivation hints for the `Secret` the operator maintains from it.

mod condition;

pub use condition::{upsert_condition, Condition, ConditionStatus, ConditionType};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SOPS-encrypted secret source, reconciled into a native `Secret`.
///
/// # Example
///
/// ```yaml
/// apiVersion: sops-operator.example.com/v1alpha1
/// kind: SopsSecret
/// metadata:
///   name: app
///   namespace: default
/// spec:
///   encryptedPayload: |
///     username: ENC[AES256_GCM,data:...,type:str]
///     sops:
///         mac: ENC[AES256_GCM,data:...,type:str]
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "SopsSecret",
    group = "sops-operator.example.com",
    version = "v1alpha1",
    namespaced,
    status = "SopsSecretStatus",
    shortname = "sopssecret",
    printcolumn = r#"{"name":"Secret", "type":"string", "jsonPath":".status.derivedSecretName"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SopsSecretSpec {
    /// The full SOPS YAML document, encrypted leaves and `sops:` metadata
    /// block included verbatim.
    pub encrypted_payload: String,
    /// Name of the derived `Secret`. Defaults to the `SopsSecret`'s own
    /// name when unset.
    #[serde(default)]
    pub secret_name: Option<String>,
    /// Type of the derived `Secret`. Defaults to `Opaque` when unset.
    #[serde(default)]
    pub secret_type: Option<String>,
    /// Extra labels merged onto the derived `Secret`. Operator-managed
    /// label keys cannot be overridden.
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    /// Extra annotations merged onto the derived `Secret`. Operator-managed
    /// annotation keys cannot be overridden.
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
    /// When true, the operator skips reconciliation entirely: no decrypt,
    /// no status write.
    #[serde(default)]
    pub suspend: bool,
}

/// Status of a `SopsSecret`.
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SopsSecretStatus {
    /// Name of the `Secret` last derived from this resource.
    #[serde(default)]
    pub derived_secret_name: Option<String>,
    /// Hex-encoded SHA-256 of `spec.encryptedPayload` as of the last
    /// successful reconciliation.
    #[serde(default)]
    pub last_input_digest: Option<String>,
    /// RFC3339 timestamp of the last successful decryption.
    #[serde(default)]
    pub last_decrypted_timestamp: Option<String>,
    /// `metadata.generation` observed by the last successful
    /// reconciliation.
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// At most one entry per condition type.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
