//! Fixed-width key, signature and secret encodings.
//!
//! Certificates carry raw P-256 coordinates (`x || y`, 64 bytes) and
//! signatures as `r || s` (64 bytes); these newtypes convert between the wire
//! form and the `p256` types.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

pub const PUBLIC_KEY_LENGTH: usize = 64;
pub const SIGNATURE_LENGTH: usize = 64;
pub const SHARED_SECRET_LENGTH: usize = 32;

/// Uncompressed P-256 public key without the SEC1 tag byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyBytes(pub [u8; PUBLIC_KEY_LENGTH]);

impl PublicKeyBytes {
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let raw: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let mut raw = [0u8; PUBLIC_KEY_LENGTH];
        // skip the 0x04 tag
        raw.copy_from_slice(&point.as_bytes()[1..]);
        Self(raw)
    }

    fn sec1(&self) -> [u8; PUBLIC_KEY_LENGTH + 1] {
        let mut sec1 = [0u8; PUBLIC_KEY_LENGTH + 1];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(&self.0);
        sec1
    }

    pub fn to_verifying_key(&self) -> CryptoResult<VerifyingKey> {
        VerifyingKey::from_sec1_bytes(&self.sec1())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn to_public_key(&self) -> CryptoResult<p256::PublicKey> {
        p256::PublicKey::from_sec1_bytes(&self.sec1())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyBytes({}..)", hex::encode(&self.0[..8]))
    }
}

/// ECDSA signature in fixed-width `r || s` form.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBytes(pub [u8; SIGNATURE_LENGTH]);

impl SignatureBytes {
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let raw: [u8; SIGNATURE_LENGTH] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSignature(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    pub fn to_signature(&self) -> CryptoResult<Signature> {
        Signature::from_slice(&self.0).map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }
}

impl From<Signature> for SignatureBytes {
    fn from(sig: Signature) -> Self {
        let mut raw = [0u8; SIGNATURE_LENGTH];
        raw.copy_from_slice(&sig.to_bytes());
        Self(raw)
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({}..)", hex::encode(&self.0[..8]))
    }
}

/// Raw ECDH output. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_LENGTH]);

impl SharedSecret {
    pub fn new(bytes: [u8; SHARED_SECRET_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Synchronous signing, for issuers that hold a key outside any backend.
pub fn sign_with(key: &SigningKey, message: &[u8]) -> SignatureBytes {
    let signature: Signature = key.sign(message);
    SignatureBytes::from(signature)
}

/// Synchronous verification of a raw `r || s` signature.
pub fn verify_with(
    public_key: &PublicKeyBytes,
    message: &[u8],
    signature: &SignatureBytes,
) -> CryptoResult<()> {
    let verifying_key = public_key.to_verifying_key()?;
    let signature = signature.to_signature()?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_public_key_conversion() {
        let sk = SigningKey::random(&mut OsRng);
        let pk = PublicKeyBytes::from_verifying_key(sk.verifying_key());
        let back = pk.to_verifying_key().unwrap();
        assert_eq!(&back, sk.verifying_key());
    }

    #[test]
    fn test_sign_verify_and_tamper() {
        let sk = SigningKey::random(&mut OsRng);
        let pk = PublicKeyBytes::from_verifying_key(sk.verifying_key());
        let sig = sign_with(&sk, b"certificate body");

        assert!(verify_with(&pk, b"certificate body", &sig).is_ok());
        assert_eq!(
            verify_with(&pk, b"certificate bodY", &sig),
            Err(CryptoError::VerificationFailed)
        );
    }

    #[test]
    fn test_off_curve_key_rejected() {
        let pk = PublicKeyBytes([0x11; PUBLIC_KEY_LENGTH]);
        assert!(matches!(pk.to_verifying_key(), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_wrong_lengths_rejected() {
        assert!(PublicKeyBytes::from_slice(&[0u8; 65]).is_err());
        assert!(SignatureBytes::from_slice(&[0u8; 63]).is_err());
    }

    #[test]
    fn test_shared_secret_debug_redacted() {
        let secret = SharedSecret::new([7u8; SHARED_SECRET_LENGTH]);
        assert!(!format!("{:?}", secret).contains('7'));
    }
}
