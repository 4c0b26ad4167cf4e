//! Decrypted payload representation and the YAML → byte/string conversion
//! rules from §4.B.

use super::error::SopsError;
use std::collections::BTreeMap;
use std::fmt;

/// One decrypted value, carrying both views required by §3's invariant:
/// both are derived from the same underlying value by the same
/// deterministic rule.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedValue {
    bytes: Vec<u8>,
    string: String,
}

impl DecryptedValue {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_str(&self) -> &str {
        &self.string
    }
}

/// Redacted: never prints the decrypted contents, only the byte length, so
/// an accidental `{:?}` on a payload or a log line built from one can never
/// leak plaintext (§3 invariant 5, §8 redaction property).
impl fmt::Debug for DecryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedValue")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A fully decrypted payload: a map of top-level key to its converted
/// value. Transient — this type is never persisted and never appears in a
/// `Serialize` impl.
#[derive(Clone, Default)]
pub struct DecryptedPayload {
    entries: BTreeMap<String, DecryptedValue>,
}

impl fmt::Debug for DecryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedPayload")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DecryptedPayload {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&DecryptedValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Byte-view data map, as consumed by the derivation function (§4.E)
    /// and written into the derived `Secret`'s `data`.
    pub fn byte_view(&self) -> BTreeMap<String, Vec<u8>> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.bytes.clone()))
            .collect()
    }

    /// Parse decrypted SOPS output (a YAML mapping at the document root)
    /// into a `DecryptedPayload` following the §4.B conversion table.
    pub fn parse(decrypted_yaml: &[u8]) -> Result<Self, SopsError> {
        let value: serde_yaml::Value = serde_yaml::from_slice(decrypted_yaml)
            .map_err(|e| SopsError::ParseFailed(e.to_string()))?;

        let serde_yaml::Value::Mapping(mapping) = value else {
            return Err(SopsError::UnexpectedShape);
        };

        let mut entries = BTreeMap::new();
        for (key, value) in mapping {
            let serde_yaml::Value::String(key) = key else {
                return Err(SopsError::UnexpectedShape);
            };
            if key == "sops" {
                continue;
            }
            let (bytes, string) = convert_value(&value)?;
            entries.insert(key, DecryptedValue { bytes, string });
        }

        Ok(Self { entries })
    }
}

/// Convert one top-level YAML value per the §4.B rules. Both returned views
/// are built from the same intermediate string so they can never diverge.
fn convert_value(value: &serde_yaml::Value) -> Result<(Vec<u8>, String), SopsError> {
    let string = match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{}", f as i64)
                } else {
                    format_shortest_roundtrip(f)
                }
            } else {
                return Err(SopsError::UnexpectedShape);
            }
        }
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Mapping(_) | serde_yaml::Value::Sequence(_) => {
            let mut rendered =
                serde_yaml::to_string(value).map_err(|e| SopsError::ParseFailed(e.to_string()))?;
            while rendered.ends_with('\n') {
                rendered.pop();
            }
            rendered
        }
        serde_yaml::Value::Tagged(tagged) => {
            let mut rendered = serde_yaml::to_string(&tagged.value)
                .map_err(|e| SopsError::ParseFailed(e.to_string()))?;
            while rendered.ends_with('\n') {
                rendered.pop();
            }
            rendered
        }
    };

    Ok((string.clone().into_bytes(), string))
}

/// Shortest round-trip decimal representation for a non-integral float.
fn format_shortest_roundtrip(f: f64) -> String {
    let mut s = format!("{f}");
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        s.push_str(".0");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> DecryptedPayload {
        DecryptedPayload::parse(yaml.as_bytes()).expect("valid payload")
    }

    #[test]
    fn drops_sops_metadata_key() {
        let payload = parse("username: admin\nsops:\n  mac: abc\n");
        assert_eq!(payload.len(), 1);
        assert!(payload.get("sops").is_none());
    }

    #[test]
    fn string_converts_verbatim() {
        let payload = parse("username: admin\n");
        let v = payload.get("username").unwrap();
        assert_eq!(v.as_str(), "admin");
        assert_eq!(v.bytes(), b"admin");
    }

    #[test]
    fn integer_converts_to_decimal_ascii() {
        let payload = parse("port: 5432\n");
        let v = payload.get("port").unwrap();
        assert_eq!(v.as_str(), "5432");
    }

    #[test]
    fn integral_float_converts_to_integer_form() {
        let payload = parse("ratio: 2.0\n");
        let v = payload.get("ratio").unwrap();
        assert_eq!(v.as_str(), "2");
    }

    #[test]
    fn non_integral_float_round_trips() {
        let payload = parse("ratio: 2.5\n");
        let v = payload.get("ratio").unwrap();
        assert_eq!(v.as_str(), "2.5");
    }

    #[test]
    fn boolean_converts_to_literal() {
        let payload = parse("enabled: true\n");
        assert_eq!(payload.get("enabled").unwrap().as_str(), "true");
    }

    #[test]
    fn null_converts_to_empty_string() {
        let payload = parse("optional: null\n");
        assert_eq!(payload.get("optional").unwrap().as_str(), "");
    }

    #[test]
    fn mapping_converts_to_canonical_yaml_without_trailing_newline() {
        let payload = parse("config:\n  nested: value\n");
        let v = payload.get("config").unwrap();
        assert!(!v.as_str().ends_with('\n'));
        assert!(v.as_str().contains("nested: value"));
    }

    #[test]
    fn sequence_converts_to_canonical_yaml() {
        let payload = parse("items:\n  - a\n  - b\n");
        let v = payload.get("items").unwrap();
        assert!(v.as_str().contains("- a"));
        assert!(v.as_str().contains("- b"));
    }

    #[test]
    fn byte_and_string_views_agree() {
        let payload = parse("username: admin\nport: 10\n");
        for key in payload.keys() {
            let v = payload.get(key).unwrap();
            assert_eq!(v.bytes(), v.as_str().as_bytes());
        }
    }

    #[test]
    fn non_mapping_root_is_unexpected_shape() {
        let err = DecryptedPayload::parse(b"- a\n- b\n").unwrap_err();
        assert!(matches!(err, SopsError::UnexpectedShape));
    }

    #[test]
    fn malformed_yaml_is_parse_failed() {
        let err = DecryptedPayload::parse(b"key: [unterminated\n").unwrap_err();
        assert!(matches!(err, SopsError::ParseFailed(_)));
    }

    #[test]
    fn debug_impl_never_prints_value_contents() {
        let payload = parse("password: hunter2\n");
        let rendered = format!("{payload:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
