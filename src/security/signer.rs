use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};

use crate::error::UpstreamError;

// keccak256("\x19Ethereum Signed Message:\n" + len + msg) → secp256k1 r||s||v, hex

/// Signs identity-provider challenges with the client's private key.
pub struct ChallengeSigner {
    key: SigningKey,
}

impl ChallengeSigner {
    /// Accepts a 32-byte hex key with or without the `0x` prefix.
    pub fn from_hex(key: &str) -> Result<Self, UpstreamError> {
        let trimmed = key.trim();
        let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = decode_hex(raw)
            .ok_or_else(|| UpstreamError::Signing("private key is not valid hex".into()))?;
        let key = SigningKey::from_slice(&bytes).map_err(|_| {
            UpstreamError::Signing("private key is not a valid secp256k1 scalar".into())
        })?;
        Ok(Self { key })
    }

    /// Checksum-free, lowercase `0x` address derived from the public key.
    pub fn address(&self) -> String {
        let point = self.key.verifying_key().to_encoded_point(false);
        let hash = Keccak256::digest(&point.as_bytes()[1..]);
        format!("0x{}", encode_hex(&hash[12..]))
    }

    pub fn sign_personal_message(&self, message: &str) -> Result<String, UpstreamError> {
        let digest = personal_message_hash(message.as_bytes());
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| UpstreamError::Signing(e.to_string()))?;

        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&signature.to_bytes());
        out.push(27 + recovery_id.to_byte());
        Ok(format!("0x{}", encode_hex(&out)))
    }
}

pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() || !s.len().is_multiple_of(2) {
        return None;
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for i in (0..s.len()).step_by(2) {
        let hi = (bytes[i] as char).to_digit(16)? as u8;
        let lo = (bytes[i + 1] as char).to_digit(16)? as u8;
        out.push((hi << 4) | lo);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    // Well-known test key; never funded.
    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn derives_expected_address() {
        let signer = ChallengeSigner::from_hex(TEST_KEY).unwrap();
        assert_eq!(signer.address(), "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23");
    }

    #[test]
    fn accepts_key_without_prefix() {
        let a = ChallengeSigner::from_hex(TEST_KEY).unwrap();
        let b = ChallengeSigner::from_hex(TEST_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn signature_recovers_to_signing_key() {
        let signer = ChallengeSigner::from_hex(TEST_KEY).unwrap();
        let message = "Sign in to the platform. Nonce: 42";
        let sig_hex = signer.sign_personal_message(message).unwrap();

        assert!(sig_hex.starts_with("0x"));
        assert_eq!(sig_hex.len(), 2 + 130);

        let bytes = decode_hex(&sig_hex[2..]).unwrap();
        let v = bytes[64];
        assert!(v == 27 || v == 28);

        let signature = Signature::from_slice(&bytes[..64]).unwrap();
        let recovery_id = RecoveryId::from_byte(v - 27).unwrap();
        let digest = personal_message_hash(message.as_bytes());
        let recovered =
            VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id).unwrap();
        assert_eq!(&recovered, signer.key.verifying_key());
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = ChallengeSigner::from_hex(TEST_KEY).unwrap();
        assert_eq!(
            signer.sign_personal_message("challenge").unwrap(),
            signer.sign_personal_message("challenge").unwrap()
        );
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(ChallengeSigner::from_hex("not-hex").is_err());
        assert!(ChallengeSigner::from_hex("0xabc").is_err());
        assert!(ChallengeSigner::from_hex("").is_err());
        // zero is not a valid scalar
        assert!(ChallengeSigner::from_hex(&"0".repeat(64)).is_err());
    }
}
