// Login identity verification: Telegram login widget signatures.
//
// Telegram signs the widget payload with HMAC-SHA256 keyed by SHA256(bot_token).
// The signed message is every field except `hash`, sorted by key and rendered as
// `key=value` lines joined with '\n'.

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Name of the assertion field carrying the provider signature.
pub const SIGNATURE_FIELD: &str = "hash";

/// Whether login signatures are checked. Chosen once from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    /// A shared secret is configured; forged assertions are rejected.
    Enforced,
    /// No shared secret; every assertion is accepted as-is.
    Disabled,
}

impl std::fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationMode::Enforced => write!(f, "enforced"),
            VerificationMode::Disabled => write!(f, "disabled"),
        }
    }
}

/// Render one assertion value exactly as the provider does before signing.
/// Returns `None` for values that have no flat text form.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Build the canonical signing payload: all non-signature fields, sorted by
/// key, as `key=value` lines joined by a single newline.
pub fn canonical_payload(assertion: &Map<String, Value>) -> Option<String> {
    let mut fields: Vec<(&String, &Value)> = assertion
        .iter()
        .filter(|(key, _)| key.as_str() != SIGNATURE_FIELD)
        .collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let mut lines = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        lines.push(format!("{key}={}", render_value(value)?));
    }
    Some(lines.join("\n"))
}

/// Derive the HMAC key from the shared secret (SHA-256 of its raw bytes).
pub fn signing_key(secret: &str) -> Vec<u8> {
    Sha256::digest(secret.as_bytes()).to_vec()
}

/// Compute the lowercase hex signature the provider would attach to `assertion`.
pub fn sign(assertion: &Map<String, Value>, secret: &str) -> Option<String> {
    let payload = canonical_payload(assertion)?;
    let mut mac = HmacSha256::new_from_slice(&signing_key(secret)).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Check an assertion's signature against the shared secret.
///
/// Fails closed: a missing or empty signature, a non-string signature, or a
/// field that cannot be canonicalized all reject.
pub fn verify_signature(assertion: &Map<String, Value>, secret: &str) -> bool {
    let Some(supplied) = assertion.get(SIGNATURE_FIELD).and_then(Value::as_str) else {
        return false;
    };
    if supplied.is_empty() {
        return false;
    }
    let Some(expected) = sign(assertion, secret) else {
        return false;
    };
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// Verifier for Telegram login assertions.
#[derive(Debug, Clone)]
pub struct TelegramVerifier {
    secret: Option<String>,
}

impl TelegramVerifier {
    /// An absent or empty secret selects [`VerificationMode::Disabled`].
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn mode(&self) -> VerificationMode {
        if self.secret.is_some() {
            VerificationMode::Enforced
        } else {
            VerificationMode::Disabled
        }
    }

    /// Accept or reject an assertion. Always accepts in `Disabled` mode.
    pub fn verify(&self, assertion: &Map<String, Value>) -> bool {
        match &self.secret {
            Some(secret) => verify_signature(assertion, secret),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assertion(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("assertion must be an object"),
        }
    }

    fn signed(value: Value, secret: &str) -> Map<String, Value> {
        let mut map = assertion(value);
        let hash = sign(&map, secret).unwrap();
        map.insert(SIGNATURE_FIELD.to_string(), Value::String(hash));
        map
    }

    #[test]
    fn test_canonical_payload_sorted_and_unquoted() {
        let map = assertion(json!({
            "id": 12345,
            "first_name": "Ann",
            "auth_date": 1000,
            "hash": "ignored"
        }));
        assert_eq!(
            canonical_payload(&map).unwrap(),
            "auth_date=1000\nfirst_name=Ann\nid=12345"
        );
    }

    #[test]
    fn test_sign_matches_manual_hmac() {
        let map = assertion(json!({"id": 12345, "first_name": "Ann", "auth_date": 1000}));

        let key = Sha256::digest(b"BOTTOKEN");
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(b"auth_date=1000\nfirst_name=Ann\nid=12345");
        let manual = hex::encode(mac.finalize().into_bytes());

        assert_eq!(sign(&map, "BOTTOKEN").unwrap(), manual);
        assert_eq!(manual.len(), 64);
        assert_eq!(manual, manual.to_lowercase());
    }

    #[test]
    fn test_signed_assertion_verifies() {
        let map = signed(json!({"id": 12345, "first_name": "Ann", "auth_date": 1000}), "BOTTOKEN");
        assert!(verify_signature(&map, "BOTTOKEN"));
        // Deterministic
        assert_eq!(
            verify_signature(&map, "BOTTOKEN"),
            verify_signature(&map, "BOTTOKEN")
        );
    }

    #[test]
    fn test_tampered_field_rejected() {
        let mut map =
            signed(json!({"id": 12345, "first_name": "Ann", "auth_date": 1000}), "BOTTOKEN");
        map.insert("first_name".into(), json!("Bob"));
        assert!(!verify_signature(&map, "BOTTOKEN"));
    }

    #[test]
    fn test_added_field_rejected() {
        let mut map = signed(json!({"id": 12345, "auth_date": 1000}), "BOTTOKEN");
        map.insert("username".into(), json!("mallory"));
        assert!(!verify_signature(&map, "BOTTOKEN"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let map = signed(json!({"id": 12345, "auth_date": 1000}), "BOTTOKEN");
        assert!(!verify_signature(&map, "OTHERTOKEN"));
    }

    #[test]
    fn test_missing_or_empty_signature_rejected() {
        let map = assertion(json!({"id": 12345, "auth_date": 1000}));
        assert!(!verify_signature(&map, "BOTTOKEN"));

        let map = assertion(json!({"id": 12345, "auth_date": 1000, "hash": ""}));
        assert!(!verify_signature(&map, "BOTTOKEN"));

        let map = assertion(json!({"id": 12345, "auth_date": 1000, "hash": 42}));
        assert!(!verify_signature(&map, "BOTTOKEN"));
    }

    #[test]
    fn test_uppercase_signature_rejected() {
        let mut map = signed(json!({"id": 12345, "auth_date": 1000}), "BOTTOKEN");
        let upper = map[SIGNATURE_FIELD].as_str().unwrap().to_uppercase();
        map.insert(SIGNATURE_FIELD.into(), Value::String(upper));
        assert!(!verify_signature(&map, "BOTTOKEN"));
    }

    #[test]
    fn test_string_and_integer_ids_sign_identically() {
        // The provider renders numbers bare, so "12345" and 12345 share a payload.
        let as_int = assertion(json!({"id": 12345}));
        let as_str = assertion(json!({"id": "12345"}));
        assert_eq!(sign(&as_int, "k"), sign(&as_str, "k"));
    }

    #[test]
    fn test_nested_value_rejected() {
        let mut map = assertion(json!({"id": 12345, "extra": {"a": 1}}));
        map.insert(SIGNATURE_FIELD.into(), json!("00"));
        assert!(canonical_payload(&map).is_none());
        assert!(!verify_signature(&map, "BOTTOKEN"));
    }

    #[test]
    fn test_verifier_modes() {
        assert_eq!(
            TelegramVerifier::new(Some("BOTTOKEN".into())).mode(),
            VerificationMode::Enforced
        );
        assert_eq!(TelegramVerifier::new(None).mode(), VerificationMode::Disabled);
        assert_eq!(
            TelegramVerifier::new(Some(String::new())).mode(),
            VerificationMode::Disabled
        );
    }

    #[test]
    fn test_disabled_verifier_accepts_anything() {
        let verifier = TelegramVerifier::new(None);
        let map = assertion(json!({"id": 1, "hash": ""}));
        assert!(verifier.verify(&map));
        let map = assertion(json!({"id": 1, "hash": "deadbeef"}));
        assert!(verifier.verify(&map));
    }

    #[test]
    fn test_enforced_verifier() {
        let verifier = TelegramVerifier::new(Some("BOTTOKEN".into()));
        let map = signed(json!({"id": 12345, "first_name": "Ann", "auth_date": 1000}), "BOTTOKEN");
        assert!(verifier.verify(&map));
        let map = assertion(json!({"id": 12345, "hash": "deadbeef"}));
        assert!(!verifier.verify(&map));
    }
}
