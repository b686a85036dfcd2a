//! Peer identity for EdgeTrust nodes.
//!
//! This crate owns everything between "a certificate arrived" and "we share a
//! security context with that peer":
//!
//! - [`certificate`]: root-signed certificate records and the issuing root
//! - [`keystore`]: fixed-capacity certificate store with pin-guarded reclamation
//! - [`verifier`]: asynchronous, one-at-a-time signature verification pipeline
//! - [`key_exchange`]: ECDH and security-context derivation
//! - [`key_request`]: public-key requests to the key server
//! - [`timed_lock`]: self-expiring lock guarding the outstanding request
//!
//! # Example
//!
//! ```no_run
//! use edgetrust_identity::{CertificateOrigin, KeyStore, KeyStoreHandle, VerificationPipeline};
//! use edgetrust_crypto::SoftwareCrypto;
//! use std::sync::Arc;
//!
//! # async fn example(root_key: edgetrust_crypto::PublicKeyBytes, cert: edgetrust_identity::Certificate) {
//! let store = KeyStoreHandle::new(KeyStore::new(8, "fd00::1".parse().unwrap(), root_key));
//! let backend = Arc::new(SoftwareCrypto::generate());
//! let pipeline = VerificationPipeline::new(store.clone(), backend, "00124b0000000001".parse().unwrap());
//! tokio::spawn(pipeline.run());
//!
//! store.add(cert, CertificateOrigin::Unsolicited).unwrap();
//! # }
//! ```

pub mod certificate;
pub mod error;
pub mod key_exchange;
pub mod key_request;
pub mod keystore;
pub mod timed_lock;
pub mod verifier;

pub use certificate::{
    Certificate, CertificateTags, RootAuthority, CERTIFICATE_LENGTH, TBS_CERTIFICATE_LENGTH,
};
pub use error::{IdentityError, KeyRequestError, Result, TransportError};
pub use key_exchange::SecurityContext;
pub use key_request::{KeyRequester, RequestOutcome, Transport, TransportResponse};
pub use keystore::{
    AddOutcome, CertificateOrigin, EntryId, EntryState, KeyStore, KeyStoreEntry, KeyStoreHandle,
    PinGuard,
};
pub use timed_lock::{LockToken, TimedLock};
pub use verifier::{VerificationOutcome, VerificationPipeline};
