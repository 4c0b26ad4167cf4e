//! Tracing subscriber setup. Plain `tracing-subscriber` carries the ambient
//! logging requirement on its own; there is no span-export backend wired
//! up, so pulling in the heavier `opentelemetry` stack would buy no real
//! behavior over a `fmt` layer.

/// Install a `tracing-subscriber` `fmt` layer honoring `RUST_LOG`, falling
/// back to `info` for this crate when unset.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sops_secret_operator=info,kube=info".into());

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
