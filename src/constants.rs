//! Well-known names shared across modules: finalizer, managed labels,
//! default ports and timeouts.

/// Finalizer placed on every `SopsSecret` while the operator still owns a
/// derived `Secret` for it.
pub const FINALIZER: &str = "sops-operator.example.com/finalizer";

/// Operator identity used in the `app.kubernetes.io/managed-by` label, the
/// field manager for server-side status patches, and the event reporter.
pub const OPERATOR_ID: &str = "sops-secret-operator";

/// Fixed label key pointing at the operator that owns a derived `Secret`.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Fixed label key pointing at the `SopsSecret` name that produced a derived
/// `Secret`.
pub const SOURCE_LABEL: &str = "sops-operator.example.com/source";

/// Fixed annotation key carrying `<namespace>/<name>` of the source
/// `SopsSecret`.
pub const SOURCE_REF_ANNOTATION: &str = "sops-operator.example.com/source-ref";

/// Default decrypt subprocess deadline, per spec ("default 30s").
pub const DEFAULT_DECRYPT_TIMEOUT_SECS: u64 = 30;

/// Default periodic requeue interval once a resource is `Ready=True`, and
/// the requeue used after absorbing a validation or decrypt failure.
pub const DEFAULT_REQUEUE_SECS: u64 = 300;

/// Short requeue used after adding the finalizer, so the next pass observes
/// the updated object immediately.
pub const FINALIZER_REQUEUE_SECS: u64 = 1;

/// Default port for the health/readiness/metrics HTTP server.
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Generic opaque Kubernetes Secret type, used when `spec.secretType` is
/// unset.
pub const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// Name of the `sops` binary resolved on `PATH` unless overridden by
/// `SOPS_BINARY`.
pub const DEFAULT_SOPS_BINARY: &str = "sops";
