//! Fixtures shared by the end-to-end tests

use async_trait::async_trait;
use edgetrust_core::{eui64_from_address, Eui64, ResponseCode};
use edgetrust_crypto::{CryptoBackend, SoftwareCrypto};
use edgetrust_identity::{
    Certificate, CertificateTags, EntryId, KeyRequester, KeyStore, KeyStoreHandle, RootAuthority,
    Transport, TransportError, TransportResponse, VerificationPipeline,
};
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ROOT_ADDRESS: &str = "fd00::1";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn root_address() -> Ipv6Addr {
    ROOT_ADDRESS.parse().unwrap()
}

pub fn root_authority() -> RootAuthority {
    RootAuthority::generate("0000000000000001".parse().unwrap())
}

/// One node's identity stack, keyed to a shared root.
pub struct TestNode {
    pub address: Ipv6Addr,
    pub subject: Eui64,
    pub backend: Arc<SoftwareCrypto>,
    pub store: KeyStoreHandle,
    pub pipeline: VerificationPipeline<SoftwareCrypto>,
}

impl TestNode {
    pub fn new(root: &RootAuthority, address: &str, capacity: usize) -> Self {
        let address: Ipv6Addr = address.parse().unwrap();
        let subject = eui64_from_address(&address);
        let backend = Arc::new(SoftwareCrypto::generate());
        let store = KeyStoreHandle::new(KeyStore::new(capacity, root_address(), root.public_key()));
        let pipeline = VerificationPipeline::new(store.clone(), backend.clone(), subject);
        Self {
            address,
            subject,
            backend,
            store,
            pipeline,
        }
    }

    /// Also derive contexts for certificates pushed to us.
    pub fn accepting_unsolicited(mut self) -> Self {
        self.pipeline = self.pipeline.clone().derive_for_unsolicited(true);
        self
    }

    pub fn certificate(&self, root: &RootAuthority, tags: CertificateTags) -> Certificate {
        root.issue(self.subject, self.backend.local_public_key(), tags)
    }

    pub fn requester<T: Transport + 'static>(&self, transport: Arc<T>) -> KeyRequester<SoftwareCrypto, T> {
        KeyRequester::new(
            self.store.clone(),
            self.backend.clone(),
            transport,
            self.subject,
            REQUEST_TIMEOUT,
        )
    }

    pub fn entry_for(&self, peer: &TestNode) -> Option<EntryId> {
        self.store.find(&peer.subject)
    }

    /// `(sender_key, recipient_key)` of the context shared with `peer`.
    pub fn context_keys(&self, peer: &TestNode) -> Option<([u8; 16], [u8; 16])> {
        let id = self.entry_for(peer)?;
        self.store.read(|s| {
            s.get(id)
                .and_then(|e| e.security_context())
                .map(|c| (*c.sender_key(), *c.recipient_key()))
        })
    }
}

/// Key server double backed by a root authority and a directory of enrolled nodes.
pub struct KeyServer {
    root: RootAuthority,
    directory: Mutex<HashMap<Ipv6Addr, Certificate>>,
    requests: AtomicUsize,
}

impl KeyServer {
    pub fn new(root: RootAuthority) -> Self {
        Self {
            root,
            directory: Mutex::new(HashMap::new()),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> &RootAuthority {
        &self.root
    }

    pub fn enroll(&self, node: &TestNode, tags: CertificateTags) -> Certificate {
        let cert = node.certificate(&self.root, tags);
        self.directory.lock().unwrap().insert(node.address, cert.clone());
        cert
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for KeyServer {
    async fn send_signed_request(
        &self,
        endpoint: Ipv6Addr,
        payload: Vec<u8>,
    ) -> Result<TransportResponse, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if endpoint != root_address() {
            return Err(TransportError::SendFailed(format!("no route to {}", endpoint)));
        }
        let Ok(octets) = <[u8; 16]>::try_from(payload.get(..16).unwrap_or_default()) else {
            return Ok(TransportResponse {
                code: ResponseCode::BAD_REQUEST,
                payload: Vec::new(),
            });
        };
        let requested = Ipv6Addr::from(octets);
        let response = match self.directory.lock().unwrap().get(&requested) {
            Some(cert) => TransportResponse {
                code: ResponseCode::CONTENT,
                payload: self.root.sign_response(cert),
            },
            None => TransportResponse {
                code: ResponseCode::NOT_FOUND,
                payload: Vec::new(),
            },
        };
        Ok(response)
    }
}

/// Poll until `condition` holds, yielding to spawned tasks in between.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
