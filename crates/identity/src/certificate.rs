//! Root-signed peer certificates.
//!
//! Certificates are flat: a subject identity, its P-256 public key and a
//! capability tag set, signed directly by the network root. There is no
//! chain and no revocation.

use edgetrust_core::{Eui64, EUI64_LENGTH};
use edgetrust_crypto::{
    sign_with, verify_with, PublicKeyBytes, SignatureBytes, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH,
};
use p256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use std::fmt;

use crate::error::{IdentityError, Result};

/// Length of the signed part of a certificate record.
pub const TBS_CERTIFICATE_LENGTH: usize = EUI64_LENGTH + PUBLIC_KEY_LENGTH + 4;
/// Length of a full certificate record including the root signature.
pub const CERTIFICATE_LENGTH: usize = TBS_CERTIFICATE_LENGTH + SIGNATURE_LENGTH;

/// Capability tag bit set declared by the root for a subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CertificateTags(pub u32);

impl CertificateTags {
    pub const NONE: Self = Self(0);
    pub const EDGE: Self = Self(1 << 0);
    pub const ROOT: Self = Self(1 << 1);

    pub fn contains(&self, other: CertificateTags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for CertificateTags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for CertificateTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// A peer identity certified by the root.
///
/// Immutable once received. The signature covers
/// `subject || public_key || tags` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub subject: Eui64,
    pub public_key: PublicKeyBytes,
    pub tags: CertificateTags,
    pub signature: SignatureBytes,
}

impl Certificate {
    /// Encode the signed payload.
    pub fn encode_tbs(&self) -> [u8; TBS_CERTIFICATE_LENGTH] {
        encode_tbs(&self.subject, &self.public_key, self.tags)
    }

    /// Encode the full record, signature last.
    pub fn to_bytes(&self) -> [u8; CERTIFICATE_LENGTH] {
        let mut out = [0u8; CERTIFICATE_LENGTH];
        out[..TBS_CERTIFICATE_LENGTH].copy_from_slice(&self.encode_tbs());
        out[TBS_CERTIFICATE_LENGTH..].copy_from_slice(self.signature.as_bytes());
        out
    }

    /// Decode a full record. Trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CERTIFICATE_LENGTH {
            return Err(IdentityError::Encoding(format!(
                "certificate record must be {} bytes, got {}",
                CERTIFICATE_LENGTH,
                bytes.len()
            )));
        }

        let mut subject = [0u8; EUI64_LENGTH];
        subject.copy_from_slice(&bytes[..EUI64_LENGTH]);

        let key_end = EUI64_LENGTH + PUBLIC_KEY_LENGTH;
        let public_key = PublicKeyBytes::from_slice(&bytes[EUI64_LENGTH..key_end])
            .map_err(|e| IdentityError::Encoding(e.to_string()))?;

        let mut tags = [0u8; 4];
        tags.copy_from_slice(&bytes[key_end..TBS_CERTIFICATE_LENGTH]);

        let signature = SignatureBytes::from_slice(&bytes[TBS_CERTIFICATE_LENGTH..])
            .map_err(|e| IdentityError::Encoding(e.to_string()))?;

        Ok(Self {
            subject: Eui64(subject),
            public_key,
            tags: CertificateTags(u32::from_be_bytes(tags)),
            signature,
        })
    }

    /// Synchronous check against the root key, for tooling.
    ///
    /// Nodes verify through the asynchronous pipeline instead.
    pub fn verify(&self, root_public_key: &PublicKeyBytes) -> Result<()> {
        verify_with(root_public_key, &self.encode_tbs(), &self.signature)?;
        Ok(())
    }
}

fn encode_tbs(
    subject: &Eui64,
    public_key: &PublicKeyBytes,
    tags: CertificateTags,
) -> [u8; TBS_CERTIFICATE_LENGTH] {
    let mut out = [0u8; TBS_CERTIFICATE_LENGTH];
    let key_end = EUI64_LENGTH + PUBLIC_KEY_LENGTH;
    out[..EUI64_LENGTH].copy_from_slice(subject.as_bytes());
    out[EUI64_LENGTH..key_end].copy_from_slice(public_key.as_bytes());
    out[key_end..].copy_from_slice(&tags.0.to_be_bytes());
    out
}

/// The network root: issues certificates and signs key-server responses.
pub struct RootAuthority {
    subject: Eui64,
    signing_key: SigningKey,
}

impl RootAuthority {
    pub fn new(subject: Eui64, signing_key: SigningKey) -> Self {
        Self {
            subject,
            signing_key,
        }
    }

    pub fn generate(subject: Eui64) -> Self {
        Self::new(subject, SigningKey::random(&mut OsRng))
    }

    pub fn subject(&self) -> Eui64 {
        self.subject
    }

    pub fn public_key(&self) -> PublicKeyBytes {
        PublicKeyBytes::from_verifying_key(self.signing_key.verifying_key())
    }

    /// Issue a certificate binding `subject` to `public_key`.
    pub fn issue(
        &self,
        subject: Eui64,
        public_key: PublicKeyBytes,
        tags: CertificateTags,
    ) -> Certificate {
        let tbs = encode_tbs(&subject, &public_key, tags);
        Certificate {
            subject,
            public_key,
            tags,
            signature: sign_with(&self.signing_key, &tbs),
        }
    }

    /// Key-server response body: `record || root signature over record`.
    pub fn sign_response(&self, certificate: &Certificate) -> Vec<u8> {
        let record = certificate.to_bytes();
        let signature = sign_with(&self.signing_key, &record);
        let mut out = Vec::with_capacity(CERTIFICATE_LENGTH + SIGNATURE_LENGTH);
        out.extend_from_slice(&record);
        out.extend_from_slice(signature.as_bytes());
        out
    }
}

impl fmt::Debug for RootAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootAuthority")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}
