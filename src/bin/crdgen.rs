//! Emits the `SopsSecret` CustomResourceDefinition as YAML on stdout.
//!
//! ```sh
//! cargo run --bin crdgen > config/crd/sopssecret.yaml
//! ```

use kube::CustomResourceExt;
use sops_secret_operator::SopsSecret;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&SopsSecret::crd())?);
    Ok(())
}
