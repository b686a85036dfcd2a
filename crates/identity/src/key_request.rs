//! Public-key request protocol.
//!
//! When a message arrives from a peer we hold no certificate for, the node
//! asks the key server (the root endpoint) for it. Only one request may be
//! outstanding; the [`TimedLock`] guarding it lapses after the request
//! timeout so a lost response cannot block requests forever.
//!
//! Request payload: `address (16) || signature over address (64)`.
//! Response payload on `2.05`: `certificate record || root signature over record`.

use async_trait::async_trait;
use edgetrust_core::{Eui64, ResponseCode};
use edgetrust_crypto::{CryptoBackend, SignatureBytes, SIGNATURE_LENGTH};
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::certificate::{Certificate, CERTIFICATE_LENGTH};
use crate::error::{IdentityError, KeyRequestError, TransportError};
use crate::key_exchange;
use crate::keystore::{AddOutcome, CertificateOrigin, KeyStoreHandle};
use crate::timed_lock::{LockToken, TimedLock};

/// Largest response body accepted from the key server.
pub const KEY_RESPONSE_LENGTH: usize = CERTIFICATE_LENGTH + SIGNATURE_LENGTH;

/// Response from the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub code: ResponseCode,
    pub payload: Vec<u8>,
}

/// Request/response transport towards the key server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_signed_request(
        &self,
        endpoint: Ipv6Addr,
        payload: Vec<u8>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Result of [`KeyRequester::request_public_key`].
#[derive(Debug)]
pub enum RequestOutcome {
    /// A verified certificate for the address is already held
    AlreadyKnown,
    /// Another request is outstanding
    Busy,
    /// Request task spawned; resolves once the response has been handled
    Sent(JoinHandle<Result<AddOutcome, KeyRequestError>>),
    /// Peer verified but without a context; key exchange task spawned
    KeyExchange(JoinHandle<Result<(), IdentityError>>),
}

pub struct KeyRequester<B: ?Sized, T: ?Sized> {
    store: KeyStoreHandle,
    backend: Arc<B>,
    transport: Arc<T>,
    lock: Arc<TimedLock>,
    local_subject: Eui64,
}

impl<B: ?Sized, T: ?Sized> Clone for KeyRequester<B, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            backend: Arc::clone(&self.backend),
            transport: Arc::clone(&self.transport),
            lock: Arc::clone(&self.lock),
            local_subject: self.local_subject,
        }
    }
}

impl<B, T> KeyRequester<B, T>
where
    B: CryptoBackend + ?Sized + 'static,
    T: Transport + ?Sized + 'static,
{
    pub fn new(
        store: KeyStoreHandle,
        backend: Arc<B>,
        transport: Arc<T>,
        local_subject: Eui64,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            backend,
            transport,
            lock: Arc::new(TimedLock::new("keystore", timeout)),
            local_subject,
        }
    }

    pub fn is_requesting(&self) -> bool {
        self.lock.is_locked()
    }

    /// Ask the key server for the certificate of the peer at `address`.
    pub fn request_public_key(&self, address: Ipv6Addr) -> RequestOutcome {
        if self.store.find_by_address(&address).is_some() {
            return RequestOutcome::AlreadyKnown;
        }

        let Some(token) = self.lock.try_lock() else {
            warn!(address = %address, "public key request already outstanding");
            return RequestOutcome::Busy;
        };

        debug!(address = %address, "requesting public key");
        let this = self.clone();
        RequestOutcome::Sent(tokio::spawn(async move { this.complete(token, address).await }))
    }

    /// Transport hook for a secured message from a sender without a context.
    ///
    /// A verified peer that never went through key exchange (it arrived
    /// unsolicited) gets one now; an unknown peer is requested from the key
    /// server.
    pub fn on_missing_security_context(&self, source: Ipv6Addr) -> RequestOutcome {
        info!(source = %source, "missing security context");
        if let Some(id) = self.store.find_by_address(&source) {
            let has_context = self
                .store
                .read(|s| s.get(id).map(|e| e.security_context().is_some()))
                .unwrap_or(false);
            if !has_context {
                match self.store.pin(id) {
                    Ok(pin) => {
                        debug!(source = %source, "verified peer without context, running key exchange");
                        let this = self.clone();
                        return RequestOutcome::KeyExchange(tokio::spawn(async move {
                            key_exchange::establish(
                                &this.store,
                                this.backend.as_ref(),
                                &this.local_subject,
                                pin,
                            )
                            .await
                        }));
                    }
                    Err(e) => warn!(source = %source, error = %e, "cannot pin peer for key exchange"),
                }
            }
        }
        self.request_public_key(source)
    }

    async fn complete(
        &self,
        token: LockToken,
        address: Ipv6Addr,
    ) -> Result<AddOutcome, KeyRequestError> {
        let result = self.exchange(address).await;
        match &result {
            Ok(outcome) => info!(address = %address, outcome = ?outcome, "public key response handled"),
            Err(e) => error!(address = %address, error = %e, "public key request failed"),
        }
        if !self.lock.unlock(token) {
            debug!("request lock already expired");
        }
        result
    }

    async fn exchange(&self, address: Ipv6Addr) -> Result<AddOutcome, KeyRequestError> {
        let octets = address.octets();
        let signature = self.backend.sign(octets.to_vec()).await?;

        let mut payload = Vec::with_capacity(octets.len() + SIGNATURE_LENGTH);
        payload.extend_from_slice(&octets);
        payload.extend_from_slice(signature.as_bytes());

        let root_address = self.store.read(|s| s.root_address());
        let response = self.transport.send_signed_request(root_address, payload).await?;
        info!(code = %response.code, len = response.payload.len(), "key server responded");

        if response.code != ResponseCode::CONTENT {
            return Err(KeyRequestError::Status(response.code));
        }
        if response.payload.len() > KEY_RESPONSE_LENGTH {
            return Err(KeyRequestError::Protocol(format!(
                "response of {} bytes exceeds {}",
                response.payload.len(),
                KEY_RESPONSE_LENGTH
            )));
        }
        if response.payload.len() < KEY_RESPONSE_LENGTH {
            return Err(KeyRequestError::Protocol(format!(
                "truncated response of {} bytes",
                response.payload.len()
            )));
        }

        let (record, root_signature) = response.payload.split_at(CERTIFICATE_LENGTH);
        let root_signature = SignatureBytes::from_slice(root_signature)?;
        let root_public_key = self.store.read(|s| s.root_public_key());
        self.backend
            .verify_signature(record.to_vec(), root_signature, root_public_key)
            .await?;

        let certificate = Certificate::from_bytes(record)?;
        Ok(self.store.add(certificate, CertificateOrigin::Requested)?)
    }
}
