//! Error kinds for the SOPS validator and decryption driver.

use thiserror::Error;

/// Structural validation failure (§4.C). Carries a fixed reason code so
/// callers can surface it verbatim as a condition reason.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payload is not a YAML mapping")]
    NotAMapping,
    #[error("payload has no top-level `sops` key")]
    MissingSopsKey,
    #[error("`sops` value is not a mapping")]
    SopsKeyNotAMapping,
    #[error("`sops.mac` is missing or empty")]
    MissingMac,
    #[error("payload is not valid YAML: {0}")]
    InvalidYaml(String),
}

impl ValidationError {
    /// Fixed reason code surfaced on the `Decrypted`/`Ready` conditions and
    /// the associated warning event.
    pub fn reason(&self) -> &'static str {
        "ValidationFailed"
    }
}

/// Decryption/subprocess failure (§4.B, §7).
#[derive(Debug, Error)]
pub enum SopsError {
    #[error("sops binary not found on PATH (searched for '{0}')")]
    BinaryNotFound(String),
    #[error("decryption deadline exceeded")]
    Timeout,
    #[error("decryption was canceled")]
    Canceled,
    #[error("sops exited with status {exit_code:?}: {stderr}")]
    SubprocessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("decrypted output is not valid YAML: {0}")]
    ParseFailed(String),
    #[error("decrypted output root is not a mapping")]
    UnexpectedShape,
    #[error("i/o error driving the sops subprocess: {0}")]
    Io(#[from] std::io::Error),
}

impl SopsError {
    /// Fixed reason code for the `Decrypted`/`Ready` conditions and the
    /// associated warning event. All decrypt-side failures share the
    /// `DecryptFailed` reason per §7; the distinct `SopsError` variant is
    /// still preserved in the log line and event message for diagnosis.
    pub fn reason(&self) -> &'static str {
        match self {
            SopsError::Timeout => "DecryptFailed",
            SopsError::Canceled => "DecryptFailed",
            SopsError::SubprocessFailed { .. } => "DecryptFailed",
            SopsError::ParseFailed(_) => "DecryptFailed",
            SopsError::UnexpectedShape => "DecryptFailed",
            SopsError::BinaryNotFound(_) => "DecryptFailed",
            SopsError::Io(_) => "DecryptFailed",
        }
    }
}
