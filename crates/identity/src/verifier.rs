//! Asynchronous certificate verification pipeline.
//!
//! Takes the head of the pending queue, checks the root signature on the
//! crypto backend, then promotes or drops the entry. A single-permit
//! semaphore keeps exactly one crypto job in flight; the entry under
//! verification is pinned so it cannot be reclaimed mid-check.

use edgetrust_core::Eui64;
use edgetrust_crypto::{CryptoBackend, CryptoError};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::key_exchange;
use crate::keystore::{CertificateOrigin, EntryId, KeyStoreHandle};

/// What happened to one pending entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified {
        id: EntryId,
        subject: Eui64,
        context_established: bool,
    },
    Rejected {
        subject: Eui64,
        reason: CryptoError,
    },
}

pub struct VerificationPipeline<B: ?Sized> {
    store: KeyStoreHandle,
    backend: Arc<B>,
    busy: Arc<Semaphore>,
    local_subject: Eui64,
    derive_for_unsolicited: bool,
}

impl<B: ?Sized> Clone for VerificationPipeline<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            backend: Arc::clone(&self.backend),
            busy: Arc::clone(&self.busy),
            local_subject: self.local_subject,
            derive_for_unsolicited: self.derive_for_unsolicited,
        }
    }
}

impl<B> VerificationPipeline<B>
where
    B: CryptoBackend + ?Sized + 'static,
{
    pub fn new(store: KeyStoreHandle, backend: Arc<B>, local_subject: Eui64) -> Self {
        Self {
            store,
            backend,
            busy: Arc::new(Semaphore::new(1)),
            local_subject,
            derive_for_unsolicited: false,
        }
    }

    /// Also run key exchange for certificates we did not ask for.
    pub fn derive_for_unsolicited(mut self, enabled: bool) -> Self {
        self.derive_for_unsolicited = enabled;
        self
    }

    /// Whether a verification is currently running.
    pub fn is_busy(&self) -> bool {
        self.busy.available_permits() == 0
    }

    /// Verify the current head of the pending queue.
    ///
    /// Returns `None` when there is nothing pending.
    pub async fn process_next(&self) -> Option<VerificationOutcome> {
        let _permit = self.busy.acquire().await.ok()?;

        let id = self.store.read(|s| s.pending_head())?;
        let pin = match self.store.pin(id) {
            Ok(pin) => pin,
            Err(e) => {
                warn!(error = %e, "pending head vanished before verification");
                return None;
            }
        };
        let (certificate, root_public_key) = self
            .store
            .read(|s| s.get(id).map(|e| (e.certificate().clone(), s.root_public_key())))?;

        debug!(subject = %certificate.subject, "verifying certificate");
        let result = self
            .backend
            .verify_signature(
                certificate.encode_tbs().to_vec(),
                certificate.signature,
                root_public_key,
            )
            .await;
        drop(pin);

        let subject = certificate.subject;
        if let Err(reason) = result {
            error!(subject = %subject, error = %reason, "certificate signature verification failed");
            if let Err(e) = self.store.write(|s| s.discard(id)) {
                warn!(subject = %subject, error = %e, "could not free rejected entry");
            }
            return Some(VerificationOutcome::Rejected { subject, reason });
        }

        let origin = match self.store.write(|s| s.promote(id).map(|_| s.get(id).map(|e| e.origin()))) {
            Ok(Some(origin)) => origin,
            Ok(None) | Err(_) => {
                warn!(subject = %subject, "verified entry disappeared before promotion");
                return None;
            }
        };

        let context_established =
            if origin == CertificateOrigin::Requested || self.derive_for_unsolicited {
                self.exchange_keys(id, &subject).await
            } else {
                false
            };

        Some(VerificationOutcome::Verified {
            id,
            subject,
            context_established,
        })
    }

    async fn exchange_keys(&self, id: EntryId, subject: &Eui64) -> bool {
        let pin = match self.store.pin(id) {
            Ok(pin) => pin,
            Err(e) => {
                warn!(subject = %subject, error = %e, "cannot pin entry for key exchange");
                return false;
            }
        };
        key_exchange::establish(&self.store, self.backend.as_ref(), &self.local_subject, pin)
            .await
            .is_ok()
    }

    /// Process pending entries until the queue is empty.
    pub async fn drain(&self) -> Vec<VerificationOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.process_next().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Serve the pipeline forever, waking whenever the store gains pending work.
    pub async fn run(self) {
        loop {
            self.drain().await;
            self.store.wait_for_work().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::{Certificate, CertificateTags, RootAuthority};
    use crate::keystore::{AddOutcome, EntryState, KeyStore};
    use async_trait::async_trait;
    use edgetrust_crypto::{CryptoResult, PublicKeyBytes, SharedSecret, SignatureBytes, SoftwareCrypto};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn eui(last: u8) -> Eui64 {
        Eui64([0x00, 0x12, 0x4b, 0x00, 0x00, 0x00, 0x00, last])
    }

    struct Fixture {
        root: RootAuthority,
        store: KeyStoreHandle,
        local: Arc<SoftwareCrypto>,
    }

    fn fixture(capacity: usize) -> Fixture {
        let root = RootAuthority::generate(eui(1));
        let store = KeyStoreHandle::new(KeyStore::new(
            capacity,
            "fd00::1".parse().unwrap(),
            root.public_key(),
        ));
        Fixture {
            root,
            store,
            local: Arc::new(SoftwareCrypto::generate()),
        }
    }

    impl Fixture {
        fn peer_cert(&self, last: u8) -> Certificate {
            let peer = SoftwareCrypto::generate();
            self.root.issue(eui(last), peer.local_public_key(), CertificateTags::EDGE)
        }

        fn forged_cert(&self, last: u8) -> Certificate {
            let rogue = RootAuthority::generate(eui(66));
            rogue.issue(eui(last), rogue.public_key(), CertificateTags::EDGE)
        }
    }

    #[tokio::test]
    async fn test_valid_certificate_promoted() {
        let fx = fixture(2);
        let pipeline = VerificationPipeline::new(fx.store.clone(), fx.local.clone(), eui(10));
        let id = fx.store.add(fx.peer_cert(2), CertificateOrigin::Unsolicited).unwrap().id();

        let outcome = pipeline.process_next().await.unwrap();
        assert_eq!(
            outcome,
            VerificationOutcome::Verified { id, subject: eui(2), context_established: false }
        );
        fx.store.read(|s| {
            assert_eq!(s.get(id).unwrap().state(), EntryState::Verified);
            assert_eq!(s.pending_count(), 0);
            assert_eq!(s.verified_count(), 1);
            assert!(s.get(id).unwrap().security_context().is_none());
        });
        assert!(!fx.store.is_pinned(id));
    }

    #[tokio::test]
    async fn test_forged_certificate_dropped_and_slot_reused() {
        let fx = fixture(1);
        let pipeline = VerificationPipeline::new(fx.store.clone(), fx.local.clone(), eui(10));
        fx.store.add(fx.forged_cert(2), CertificateOrigin::Unsolicited).unwrap();

        let outcome = pipeline.process_next().await.unwrap();
        assert!(matches!(
            outcome,
            VerificationOutcome::Rejected { reason: CryptoError::VerificationFailed, .. }
        ));
        assert!(fx.store.read(|s| s.is_empty()));

        let next = fx.store.add(fx.peer_cert(3), CertificateOrigin::Unsolicited).unwrap();
        assert!(matches!(next, AddOutcome::Enqueued(_)));
    }

    #[tokio::test]
    async fn test_requested_certificate_gets_security_context() {
        let fx = fixture(2);
        let pipeline = VerificationPipeline::new(fx.store.clone(), fx.local.clone(), eui(10));
        let id = fx.store.add(fx.peer_cert(2), CertificateOrigin::Requested).unwrap().id();

        let outcome = pipeline.process_next().await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::Verified { context_established: true, .. }));
        fx.store.read(|s| assert!(s.get(id).unwrap().security_context().is_some()));
        assert!(!fx.store.is_pinned(id));
    }

    #[tokio::test]
    async fn test_unsolicited_key_exchange_when_enabled() {
        let fx = fixture(2);
        let pipeline = VerificationPipeline::new(fx.store.clone(), fx.local.clone(), eui(10))
            .derive_for_unsolicited(true);
        fx.store.add(fx.peer_cert(2), CertificateOrigin::Unsolicited).unwrap();

        let outcome = pipeline.process_next().await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::Verified { context_established: true, .. }));
    }

    #[tokio::test]
    async fn test_drain_handles_mixed_queue() {
        let fx = fixture(4);
        let pipeline = VerificationPipeline::new(fx.store.clone(), fx.local.clone(), eui(10));
        fx.store.add(fx.peer_cert(2), CertificateOrigin::Unsolicited).unwrap();
        fx.store.add(fx.forged_cert(3), CertificateOrigin::Unsolicited).unwrap();
        fx.store.add(fx.peer_cert(4), CertificateOrigin::Unsolicited).unwrap();

        let outcomes = pipeline.drain().await;
        assert_eq!(outcomes.len(), 3);
        fx.store.read(|s| {
            assert_eq!(s.verified_count(), 2);
            assert!(s.find(&eui(3)).is_none());
        });
        assert!(pipeline.process_next().await.is_none());
    }

    #[tokio::test]
    async fn test_run_wakes_on_add() {
        let fx = fixture(2);
        let pipeline = VerificationPipeline::new(fx.store.clone(), fx.local.clone(), eui(10));
        let task = tokio::spawn(pipeline.run());

        fx.store.add(fx.peer_cert(2), CertificateOrigin::Unsolicited).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while fx.store.find(&eui(2)).is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pipeline did not verify certificate");
        task.abort();
    }

    /// Backend that records how many verifications overlap.
    struct SlowBackend {
        inner: SoftwareCrypto,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl CryptoBackend for SlowBackend {
        fn local_public_key(&self) -> PublicKeyBytes {
            self.inner.local_public_key()
        }

        async fn sign(&self, message: Vec<u8>) -> CryptoResult<SignatureBytes> {
            self.inner.sign(message).await
        }

        async fn verify_signature(
            &self,
            message: Vec<u8>,
            signature: SignatureBytes,
            public_key: PublicKeyBytes,
        ) -> CryptoResult<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.verify_signature(message, signature, public_key).await
        }

        async fn ecdh_combine(&self, peer_public_key: PublicKeyBytes) -> CryptoResult<SharedSecret> {
            self.inner.ecdh_combine(peer_public_key).await
        }
    }

    #[tokio::test]
    async fn test_single_verification_in_flight() {
        let fx = fixture(4);
        let backend = Arc::new(SlowBackend {
            inner: SoftwareCrypto::generate(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let pipeline = VerificationPipeline::new(fx.store.clone(), backend.clone(), eui(10));
        for last in 2..5 {
            fx.store.add(fx.peer_cert(last), CertificateOrigin::Unsolicited).unwrap();
        }

        let a = pipeline.clone();
        let b = pipeline.clone();
        let (ra, rb) = tokio::join!(a.drain(), b.drain());

        assert_eq!(ra.len() + rb.len(), 3);
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(fx.store.read(|s| s.verified_count()), 3);
    }
}
