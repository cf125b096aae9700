use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use tracing::warn;

/// A VAPID identity (RFC 8292): an EC P-256 key pair, base64url-encoded the
/// way `web_push::VapidSignatureBuilder::from_base64` expects.
#[derive(Debug, Clone)]
pub struct VapidKeyPair {
    pub public_key_b64: String,
    pub private_key_b64: String,
}

impl VapidKeyPair {
    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_point = signing_key.verifying_key().to_encoded_point(false);
        Self {
            public_key_b64: URL_SAFE_NO_PAD.encode(public_point.as_bytes()),
            private_key_b64: URL_SAFE_NO_PAD.encode(signing_key.to_bytes()),
        }
    }

    /// Generates a fresh key pair. Used when no persistent key is
    /// configured (spec §4.7: "if no persistent key pair is configured, an
    /// ephemeral one is generated at startup and logged with a warning").
    /// Ephemeral means every process restart invalidates every browser's
    /// existing subscription — acceptable for this core, but callers
    /// should configure a real pair for anything long-lived.
    pub fn generate_ephemeral() -> Self {
        warn!(
            "no persistent VAPID key pair configured, generating an ephemeral one for this process \
             (existing push subscriptions will need to re-subscribe after restart)"
        );
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Loads a persistent pair from configuration (spec §6 config keys
    /// `vapidPublicKey`/`vapidPrivateKey`).
    pub fn from_configured(public_key_b64: String, private_key_b64: String) -> Self {
        Self { public_key_b64, private_key_b64 }
    }

    pub fn resolve(configured_public: Option<String>, configured_private: Option<String>) -> Self {
        match (configured_public, configured_private) {
            (Some(public_key_b64), Some(private_key_b64)) => {
                Self::from_configured(public_key_b64, private_key_b64)
            }
            _ => Self::generate_ephemeral(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_generation_produces_distinct_keys_each_call() {
        let a = VapidKeyPair::generate_ephemeral();
        let b = VapidKeyPair::generate_ephemeral();
        assert_ne!(a.private_key_b64, b.private_key_b64);
    }

    #[test]
    fn configured_pair_is_used_verbatim() {
        let pair = VapidKeyPair::resolve(Some("pub".to_string()), Some("priv".to_string()));
        assert_eq!(pair.public_key_b64, "pub");
        assert_eq!(pair.private_key_b64, "priv");
    }

    #[test]
    fn partial_configuration_falls_back_to_ephemeral() {
        let pair = VapidKeyPair::resolve(Some("pub".to_string()), None);
        assert_ne!(pair.public_key_b64, "pub");
    }
}
