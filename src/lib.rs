//! # SOPS Secret Operator
//!
//! A Kubernetes controller that reconciles SOPS-encrypted `SopsSecret`
//! custom resources into native `Secret` objects.

pub mod constants;
pub mod controller;
pub mod crd;
pub mod derive;
pub mod keys;
pub mod observability;
pub mod runtime;
pub mod server;
pub mod sops;

pub use crd::SopsSecret;
pub use derive::DerivedSecret;
