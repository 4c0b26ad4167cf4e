//! # Derivation Function
//!
//! Pure transformation from a `SopsSecret` plus its decrypted payload into
//! the `Secret` the operator maintains (§4.E). No I/O, no Kubernetes client
//! — the reconciler owns applying the result.

use crate::constants::{DEFAULT_SECRET_TYPE, MANAGED_BY_LABEL, OPERATOR_ID, SOURCE_LABEL, SOURCE_REF_ANNOTATION};
use crate::crd::SopsSecret;
use crate::sops::DecryptedPayload;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Plain-data description of the `Secret` to maintain. Kept distinct from
/// `k8s_openapi::api::core::v1::Secret` so the pure derivation step can be
/// unit tested without constructing API types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedSecret {
    pub name: String,
    pub namespace: String,
    pub secret_type: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub data: BTreeMap<String, Vec<u8>>,
}

/// Build the `DerivedSecret` for `source`. Fixed (operator-managed) label
/// and annotation keys always win; user-supplied keys are merged in only
/// where they don't collide with a fixed key (§4.E collision policy).
pub fn derive_secret(source: &SopsSecret, payload: &DecryptedPayload) -> DerivedSecret {
    let name = source
        .spec
        .secret_name
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| source.name_any());

    let namespace = source.namespace().unwrap_or_default();

    let secret_type = source
        .spec
        .secret_type
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SECRET_TYPE.to_string());

    let mut labels = BTreeMap::new();
    if let Some(user_labels) = &source.spec.labels {
        labels.extend(user_labels.clone());
    }
    labels.insert(MANAGED_BY_LABEL.to_string(), OPERATOR_ID.to_string());
    labels.insert(SOURCE_LABEL.to_string(), source.name_any());

    let mut annotations = BTreeMap::new();
    if let Some(user_annotations) = &source.spec.annotations {
        annotations.extend(user_annotations.clone());
    }
    annotations.insert(
        SOURCE_REF_ANNOTATION.to_string(),
        format!("{namespace}/{}", source.name_any()),
    );

    DerivedSecret {
        name,
        namespace,
        secret_type,
        labels,
        annotations,
        data: payload.byte_view(),
    }
}

/// Render a `DerivedSecret` into the `k8s_openapi` type ready to be
/// created/updated, with a single controller owner reference back to
/// `source`. Returns `None` only if `source` cannot produce an owner
/// reference (no UID set yet), which the reconciler treats as fatal.
pub fn to_k8s_secret(derived: &DerivedSecret, source: &SopsSecret) -> Option<Secret> {
    let owner_reference: OwnerReference = source.controller_owner_ref(&())?;

    Some(Secret {
        metadata: ObjectMeta {
            name: Some(derived.name.clone()),
            namespace: Some(derived.namespace.clone()),
            labels: Some(derived.labels.clone()),
            annotations: Some(derived.annotations.clone()),
            owner_references: Some(vec![owner_reference]),
            ..Default::default()
        },
        type_: Some(derived.secret_type.clone()),
        data: Some(
            derived
                .data
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect(),
        ),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SopsSecretSpec;
    use kube::core::ObjectMeta as CoreObjectMeta;

    fn source(spec: SopsSecretSpec) -> SopsSecret {
        SopsSecret {
            metadata: CoreObjectMeta {
                name: Some("app".to_string()),
                namespace: Some("default".to_string()),
                uid: Some("11111111-1111-1111-1111-111111111111".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    fn empty_spec() -> SopsSecretSpec {
        SopsSecretSpec {
            encrypted_payload: String::new(),
            secret_name: None,
            secret_type: None,
            labels: None,
            annotations: None,
            suspend: false,
        }
    }

    fn payload() -> DecryptedPayload {
        DecryptedPayload::parse(b"username: admin\nsops:\n  mac: abc\n").unwrap()
    }

    #[test]
    fn defaults_name_to_source_name_and_type_to_opaque() {
        let derived = derive_secret(&source(empty_spec()), &payload());
        assert_eq!(derived.name, "app");
        assert_eq!(derived.secret_type, "Opaque");
    }

    #[test]
    fn explicit_secret_name_and_type_override_defaults() {
        let mut spec = empty_spec();
        spec.secret_name = Some("custom-name".to_string());
        spec.secret_type = Some("kubernetes.io/tls".to_string());
        let derived = derive_secret(&source(spec), &payload());
        assert_eq!(derived.name, "custom-name");
        assert_eq!(derived.secret_type, "kubernetes.io/tls");
    }

    #[test]
    fn fixed_labels_cannot_be_overridden_by_user_labels() {
        let mut spec = empty_spec();
        let mut user_labels = BTreeMap::new();
        user_labels.insert(MANAGED_BY_LABEL.to_string(), "someone-else".to_string());
        user_labels.insert("team".to_string(), "payments".to_string());
        spec.labels = Some(user_labels);

        let derived = derive_secret(&source(spec), &payload());
        assert_eq!(derived.labels.get(MANAGED_BY_LABEL).unwrap(), OPERATOR_ID);
        assert_eq!(derived.labels.get("team").unwrap(), "payments");
    }

    #[test]
    fn fixed_annotation_cannot_be_overridden_by_user_annotation() {
        let mut spec = empty_spec();
        let mut user_annotations = BTreeMap::new();
        user_annotations.insert(SOURCE_REF_ANNOTATION.to_string(), "tampered".to_string());
        spec.annotations = Some(user_annotations);

        let derived = derive_secret(&source(spec), &payload());
        assert_eq!(derived.annotations.get(SOURCE_REF_ANNOTATION).unwrap(), "default/app");
    }

    #[test]
    fn data_equals_payload_byte_view() {
        let derived = derive_secret(&source(empty_spec()), &payload());
        assert_eq!(derived.data.get("username").unwrap(), b"admin");
    }

    #[test]
    fn to_k8s_secret_carries_single_owner_reference() {
        let src = source(empty_spec());
        let derived = derive_secret(&src, &payload());
        let secret = to_k8s_secret(&derived, &src).expect("owner ref available");
        let owners = secret.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].name, "app");
        assert!(owners[0].controller.unwrap_or(false));
    }

    #[test]
    fn to_k8s_secret_is_none_without_uid() {
        let mut src = source(empty_spec());
        src.metadata.uid = None;
        let derived = derive_secret(&src, &payload());
        assert!(to_k8s_secret(&derived, &src).is_none());
    }
}
