//! Asynchronous crypto backend.
//!
//! Every call hands the job to the backend and suspends the caller until the
//! result is ready. Callers must not hold keystore locks across these awaits.

use async_trait::async_trait;
use p256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{
    sign_with, verify_with, PublicKeyBytes, SharedSecret, SignatureBytes, SHARED_SECRET_LENGTH,
};

/// Signature and key agreement engine owned by the local node.
#[async_trait]
pub trait CryptoBackend: Send + Sync {
    /// Public half of the node's own key pair.
    fn local_public_key(&self) -> PublicKeyBytes;

    /// ECDSA-SHA256 signature over `message` with the node's private key.
    async fn sign(&self, message: Vec<u8>) -> CryptoResult<SignatureBytes>;

    /// Verify `signature` over `message` under `public_key`.
    async fn verify_signature(
        &self,
        message: Vec<u8>,
        signature: SignatureBytes,
        public_key: PublicKeyBytes,
    ) -> CryptoResult<()>;

    /// ECDH between the node's private key and `peer_public_key`.
    async fn ecdh_combine(&self, peer_public_key: PublicKeyBytes) -> CryptoResult<SharedSecret>;
}

/// P-256 backend running each job on the blocking thread pool.
#[derive(Clone)]
pub struct SoftwareCrypto {
    signing_key: Arc<SigningKey>,
    public_key: PublicKeyBytes,
}

impl SoftwareCrypto {
    pub fn new(signing_key: SigningKey) -> Self {
        let public_key = PublicKeyBytes::from_verifying_key(signing_key.verifying_key());
        Self {
            signing_key: Arc::new(signing_key),
            public_key,
        }
    }

    /// Backend with a fresh random key.
    pub fn generate() -> Self {
        Self::new(SigningKey::random(&mut OsRng))
    }

    /// Backend from a hex encoded 32-byte private scalar.
    pub fn from_private_key_hex(s: &str) -> CryptoResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(s.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
        );
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self::new(signing_key))
    }

    async fn run<T, F>(&self, job: F) -> CryptoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SigningKey) -> CryptoResult<T> + Send + 'static,
    {
        let key = Arc::clone(&self.signing_key);
        tokio::task::spawn_blocking(move || job(&key))
            .await
            .map_err(|e| {
                warn!(error = %e, "crypto job did not complete");
                CryptoError::Backend(e.to_string())
            })?
    }
}

#[async_trait]
impl CryptoBackend for SoftwareCrypto {
    fn local_public_key(&self) -> PublicKeyBytes {
        self.public_key
    }

    async fn sign(&self, message: Vec<u8>) -> CryptoResult<SignatureBytes> {
        self.run(move |key| Ok(sign_with(key, &message))).await
    }

    async fn verify_signature(
        &self,
        message: Vec<u8>,
        signature: SignatureBytes,
        public_key: PublicKeyBytes,
    ) -> CryptoResult<()> {
        let result = self
            .run(move |_| verify_with(&public_key, &message, &signature))
            .await;
        if let Err(e) = &result {
            debug!(error = %e, "signature rejected");
        }
        result
    }

    async fn ecdh_combine(&self, peer_public_key: PublicKeyBytes) -> CryptoResult<SharedSecret> {
        self.run(move |key| {
            let peer = peer_public_key
                .to_public_key()
                .map_err(|e| CryptoError::KeyAgreement(e.to_string()))?;
            let shared = p256::ecdh::diffie_hellman(key.as_nonzero_scalar(), peer.as_affine());
            let mut raw = [0u8; SHARED_SECRET_LENGTH];
            raw.copy_from_slice(shared.raw_secret_bytes());
            Ok(SharedSecret::new(raw))
        })
        .await
    }
}
