//! # Payload Validator
//!
//! Pure structural check (§4.C) run on decrypted bytes before they're
//! converted into a [`super::payload::DecryptedPayload`]: the document must
//! be a YAML mapping carrying a `sops` block with a non-empty `mac`. This
//! catches truncated or non-SOPS input before it reaches conversion.

use super::error::ValidationError;

/// Validate that `bytes` is a YAML document shaped like a SOPS file.
pub fn validate(bytes: &[u8]) -> Result<(), ValidationError> {
    let value: serde_yaml::Value =
        serde_yaml::from_slice(bytes).map_err(|e| ValidationError::InvalidYaml(e.to_string()))?;

    let serde_yaml::Value::Mapping(root) = value else {
        return Err(ValidationError::NotAMapping);
    };

    let sops_value = root
        .get(serde_yaml::Value::String("sops".to_string()))
        .ok_or(ValidationError::MissingSopsKey)?;

    let serde_yaml::Value::Mapping(sops) = sops_value else {
        return Err(ValidationError::SopsKeyNotAMapping);
    };

    let mac = sops.get(serde_yaml::Value::String("mac".to_string()));
    match mac {
        Some(serde_yaml::Value::String(s)) if !s.is_empty() => Ok(()),
        _ => Err(ValidationError::MissingMac),
    }
}
