//! Cryptographic primitives for EdgeTrust nodes.
//!
//! Signature verification, signing and ECDH on constrained nodes run on a
//! hardware accelerator and complete asynchronously. [`CryptoBackend`] models
//! that accelerator: every operation is a suspension point for the calling
//! task. [`SoftwareCrypto`] is the P-256 implementation used on hosts and in
//! tests.
//!
//! # Supported Algorithms
//!
//! - **Signatures**: ECDSA P-256 with SHA-256, fixed-width `r || s` encoding
//! - **Key Exchange**: ECDH over P-256, 32-byte raw shared secret
//!
//! Secrets are zeroized on drop and never logged.

pub mod backend;
pub mod error;
pub mod keys;

pub use backend::{CryptoBackend, SoftwareCrypto};
pub use error::{CryptoError, CryptoResult};
pub use keys::{
    sign_with, verify_with, PublicKeyBytes, SharedSecret, SignatureBytes, PUBLIC_KEY_LENGTH,
    SHARED_SECRET_LENGTH, SIGNATURE_LENGTH,
};
