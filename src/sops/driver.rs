//! # Decryption Driver
//!
//! Drives the `sops` binary as a subprocess (§4.B, §6): the encrypted
//! payload is written to a restrictively-permissioned temp file, `sops -d`
//! is run against it with the key-loader's environment forwarded, and the
//! run is bounded by both a timeout and an external cancellation token. The
//! temp file is removed on every exit path.

use super::error::SopsError;
use super::payload::DecryptedPayload;
use crate::keys::KeyLoader;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Behavior required of anything that can turn an encrypted SOPS document
/// into decrypted output. Abstracted so the reconciler can be tested
/// against a fake without shelling out (§8 test tooling).
///
/// `decrypt_raw` is the primitive every driver implements: plain decrypted
/// bytes, however `sops -d` happened to produce them. `decrypt` is the
/// typed convenience callers actually want (§4.B); it parses `decrypt_raw`'s
/// output into a `DecryptedPayload` and only needs overriding if a driver
/// can produce the typed payload more directly than by parsing bytes.
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt_raw(
        &self,
        encrypted: &str,
        cancellation: CancellationToken,
    ) -> Result<Vec<u8>, SopsError>;

    async fn decrypt(
        &self,
        encrypted: &str,
        cancellation: CancellationToken,
    ) -> Result<DecryptedPayload, SopsError> {
        let bytes = self.decrypt_raw(encrypted, cancellation).await?;
        DecryptedPayload::parse(&bytes)
    }
}

/// Decrypts by spawning the real `sops` binary found on `PATH`.
pub struct SopsProcessDriver {
    keys: Arc<KeyLoader>,
    timeout: Duration,
    binary: String,
}

impl SopsProcessDriver {
    pub fn new(keys: Arc<KeyLoader>) -> Self {
        Self {
            keys,
            timeout: Duration::from_secs(crate::constants::DEFAULT_DECRYPT_TIMEOUT_SECS),
            binary: crate::constants::DEFAULT_SOPS_BINARY.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, encrypted: &str) -> Result<Vec<u8>, SopsError> {
        let sops_path = which::which(&self.binary)
            .map_err(|_| SopsError::BinaryNotFound(self.binary.clone()))?;

        let mut file = tempfile::Builder::new()
            .prefix("sops-secret-")
            .suffix(".yaml")
            .tempfile()
            .map_err(SopsError::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = file.as_file().metadata().map_err(SopsError::Io)?.permissions();
            permissions.set_mode(0o600);
            file.as_file().set_permissions(permissions).map_err(SopsError::Io)?;
        }

        file.write_all(encrypted.as_bytes()).map_err(SopsError::Io)?;
        file.flush().map_err(SopsError::Io)?;

        let mut command = Command::new(sops_path);
        command
            .arg("-d")
            .arg(file.path())
            .envs(self.keys.env_pairs())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let output = command.output().await.map_err(SopsError::Io)?;

        // Dropping `file` removes the temp file on every path below,
        // including the early returns.
        drop(file);

        if !output.status.success() {
            return Err(SopsError::SubprocessFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl Decryptor for SopsProcessDriver {
    async fn decrypt_raw(
        &self,
        encrypted: &str,
        cancellation: CancellationToken,
    ) -> Result<Vec<u8>, SopsError> {
        tokio::select! {
            result = tokio::time::timeout(self.timeout, self.run(encrypted)) => {
                result.map_err(|_| SopsError::Timeout)?
            }
            () = cancellation.cancelled() => Err(SopsError::Canceled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;

    #[async_trait]
    impl Decryptor for AlwaysFails {
        async fn decrypt_raw(
            &self,
            _encrypted: &str,
            _cancellation: CancellationToken,
        ) -> Result<Vec<u8>, SopsError> {
            Err(SopsError::SubprocessFailed {
                exit_code: Some(1),
                stderr: "boom".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn missing_binary_is_reported_without_spawning() {
        let loader = Arc::new(KeyLoader::new(Some("key".to_string()), None).unwrap());
        let driver = SopsProcessDriver::new(loader).with_binary("definitely-not-a-real-binary");
        let err = driver.decrypt_raw("payload", CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SopsError::BinaryNotFound(_)));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_completion() {
        let loader = Arc::new(KeyLoader::new(Some("key".to_string()), None).unwrap());
        let driver = SopsProcessDriver::new(loader).with_binary("sleep");
        let token = CancellationToken::new();
        token.cancel();
        let err = driver.decrypt_raw("payload", token).await.unwrap_err();
        assert!(matches!(err, SopsError::Canceled));
    }

    #[tokio::test]
    async fn fake_decryptor_surfaces_configured_error() {
        let err = AlwaysFails
            .decrypt_raw("payload", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SopsError::SubprocessFailed { .. }));
    }

    #[tokio::test]
    async fn default_decrypt_method_parses_raw_bytes_into_a_typed_payload() {
        struct Echo(&'static str);

        #[async_trait]
        impl Decryptor for Echo {
            async fn decrypt_raw(
                &self,
                _encrypted: &str,
                _cancellation: CancellationToken,
            ) -> Result<Vec<u8>, SopsError> {
                Ok(self.0.as_bytes().to_vec())
            }
        }

        let payload = Echo("key: value\n")
            .decrypt("ignored", CancellationToken::new())
            .await
            .expect("valid yaml parses into a payload");
        assert!(payload.get("key").is_some());
    }
}
