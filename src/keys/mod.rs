//! # Key Loader
//!
//! Assembles SOPS private-key material from `INLINE_KEY` (a value) and/or
//! `KEY_FILE` (a path), normalizes it, and exposes the environment
//! variables the `sops` subprocess expects to see forwarded.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("no usable SOPS key found in INLINE_KEY or KEY_FILE")]
    MissingKey,
    #[error("KEY_FILE path {path} could not be read: {source}")]
    KeyFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Ordered, deduplicated list of private keys plus the raw inputs needed to
/// reconstruct the subprocess environment.
#[derive(Debug, Clone)]
pub struct KeyLoader {
    keys: Vec<String>,
    inline_key: Option<String>,
    key_file_path: Option<PathBuf>,
}

impl KeyLoader {
    /// Build a `KeyLoader` from `INLINE_KEY` and `KEY_FILE` in the process
    /// environment. Fails with [`KeyError::MissingKey`] if both sources
    /// yield zero usable keys, or [`KeyError::KeyFileUnreadable`] if
    /// `KEY_FILE` names a path that can't be read.
    pub fn from_env() -> Result<Self, KeyError> {
        let inline_key = std::env::var("INLINE_KEY").ok().filter(|s| !s.is_empty());
        let key_file_path = std::env::var("KEY_FILE").ok().filter(|s| !s.is_empty()).map(PathBuf::from);
        Self::new(inline_key, key_file_path)
    }

    /// Build a `KeyLoader` from explicit values, bypassing the environment.
    /// Used directly by tests.
    pub fn new(inline_key: Option<String>, key_file_path: Option<PathBuf>) -> Result<Self, KeyError> {
        let mut keys = Vec::new();

        if let Some(inline) = &inline_key {
            keys.extend(parse_keys(inline));
        }

        if let Some(path) = &key_file_path {
            let contents = std::fs::read_to_string(path).map_err(|source| KeyError::KeyFileUnreadable {
                path: path.display().to_string(),
                source,
            })?;
            keys.extend(parse_keys(&contents));
        }

        let keys = dedupe_preserve_order(keys);

        if keys.is_empty() {
            return Err(KeyError::MissingKey);
        }

        Ok(Self {
            keys,
            inline_key,
            key_file_path,
        })
    }

    /// The ordered, deduplicated keys. Never empty.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Environment variable pairs to forward to the `sops` subprocess, per
    /// the subprocess contract in §6: the same variables the operator read
    /// at construction, passed through verbatim.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(inline) = &self.inline_key {
            pairs.push(("INLINE_KEY".to_string(), inline.clone()));
        }
        if let Some(path) = &self.key_file_path {
            pairs.push(("KEY_FILE".to_string(), path.display().to_string()));
        }
        pairs
    }
}

/// Split on newlines, trim whitespace, drop empty lines and `#` comments.
fn parse_keys(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn dedupe_preserve_order(keys: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_both_sources_fails() {
        let result = KeyLoader::new(None, None);
        assert!(matches!(result, Err(KeyError::MissingKey)));
    }

    #[test]
    fn blank_inline_key_fails() {
        let result = KeyLoader::new(Some("\n\n  \n".to_string()), None);
        assert!(matches!(result, Err(KeyError::MissingKey)));
    }

    #[test]
    fn inline_key_drops_comments_and_blanks() {
        let loader = KeyLoader::new(
            Some("# comment\nkey-one\n\n  key-two  \n# another\n".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(loader.keys(), &["key-one".to_string(), "key-two".to_string()]);
    }

    #[test]
    fn dedupes_across_inline_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        std::fs::write(&path, "key-one\nkey-three\n").unwrap();

        let loader = KeyLoader::new(Some("key-one\nkey-two\n".to_string()), Some(path)).unwrap();
        assert_eq!(
            loader.keys(),
            &["key-one".to_string(), "key-two".to_string(), "key-three".to_string()]
        );
    }

    #[test]
    fn unreadable_key_file_fails() {
        let path = PathBuf::from("/nonexistent/path/to/keys.txt");
        let result = KeyLoader::new(None, Some(path));
        assert!(matches!(result, Err(KeyError::KeyFileUnreadable { .. })));
    }

    #[test]
    fn env_pairs_passes_through_raw_inputs() {
        let loader = KeyLoader::new(Some("key-one".to_string()), None).unwrap();
        let pairs = loader.env_pairs();
        assert_eq!(pairs, vec![("INLINE_KEY".to_string(), "key-one".to_string())]);
    }
}
