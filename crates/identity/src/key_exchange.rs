//! Pairwise security-context derivation.
//!
//! After a peer's certificate is verified, ECDH with the peer's public key
//! gives a shared secret from which both sides derive the same pair of
//! directional keys. Context identifiers are the trailing bytes of each
//! subject, so the sender id on one side is the recipient id on the other.

use edgetrust_core::Eui64;
use edgetrust_crypto::{CryptoBackend, SharedSecret};
use std::fmt;
use tracing::{debug, error, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{IdentityError, Result};
use crate::keystore::{KeyStoreHandle, PinGuard};

pub const CONTEXT_ID_LENGTH: usize = 6;
pub const CONTEXT_KEY_LENGTH: usize = 16;
pub const COMMON_IV_LENGTH: usize = 13;

const KEY_CONTEXT: &str = "edgetrust 2024-01-01 security context key";
const IV_CONTEXT: &str = "edgetrust 2024-01-01 security context iv";

/// Directional keys and identifiers for talking to one peer.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecurityContext {
    sender_id: [u8; CONTEXT_ID_LENGTH],
    recipient_id: [u8; CONTEXT_ID_LENGTH],
    sender_key: [u8; CONTEXT_KEY_LENGTH],
    recipient_key: [u8; CONTEXT_KEY_LENGTH],
    common_iv: [u8; COMMON_IV_LENGTH],
}

impl SecurityContext {
    /// Derive the context `local` uses with `peer`.
    pub fn derive(shared_secret: &SharedSecret, local: &Eui64, peer: &Eui64) -> Self {
        let sender_id = context_id(local);
        let recipient_id = context_id(peer);

        let mut common_iv = [0u8; COMMON_IV_LENGTH];
        let mut iv_hasher = blake3::Hasher::new_derive_key(IV_CONTEXT);
        iv_hasher.update(shared_secret.as_bytes());
        iv_hasher.finalize_xof().fill(&mut common_iv);

        Self {
            sender_key: directional_key(shared_secret, &sender_id),
            recipient_key: directional_key(shared_secret, &recipient_id),
            sender_id,
            recipient_id,
            common_iv,
        }
    }

    pub fn sender_id(&self) -> &[u8; CONTEXT_ID_LENGTH] {
        &self.sender_id
    }

    pub fn recipient_id(&self) -> &[u8; CONTEXT_ID_LENGTH] {
        &self.recipient_id
    }

    pub fn sender_key(&self) -> &[u8; CONTEXT_KEY_LENGTH] {
        &self.sender_key
    }

    pub fn recipient_key(&self) -> &[u8; CONTEXT_KEY_LENGTH] {
        &self.recipient_key
    }

    pub fn common_iv(&self) -> &[u8; COMMON_IV_LENGTH] {
        &self.common_iv
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("sender_id", &hex::encode(self.sender_id))
            .field("recipient_id", &hex::encode(self.recipient_id))
            .finish_non_exhaustive()
    }
}

fn context_id(subject: &Eui64) -> [u8; CONTEXT_ID_LENGTH] {
    let mut id = [0u8; CONTEXT_ID_LENGTH];
    id.copy_from_slice(subject.suffix(CONTEXT_ID_LENGTH));
    id
}

fn directional_key(
    shared_secret: &SharedSecret,
    owner_id: &[u8; CONTEXT_ID_LENGTH],
) -> [u8; CONTEXT_KEY_LENGTH] {
    let mut hasher = blake3::Hasher::new_derive_key(KEY_CONTEXT);
    hasher.update(shared_secret.as_bytes());
    hasher.update(owner_id);
    let mut key = [0u8; CONTEXT_KEY_LENGTH];
    hasher.finalize_xof().fill(&mut key);
    key
}

/// Run ECDH with the pinned entry's key and store the derived context.
///
/// `pin` keeps the entry alive across the backend await; it is released on
/// return whatever the outcome.
pub async fn establish<B>(
    store: &KeyStoreHandle,
    backend: &B,
    local_subject: &Eui64,
    pin: PinGuard,
) -> Result<()>
where
    B: CryptoBackend + ?Sized,
{
    let id = pin.id();
    let (peer, peer_key) = store
        .read(|s| s.get(id).map(|e| (e.certificate().subject, e.certificate().public_key)))
        .ok_or_else(|| IdentityError::NotFound(format!("{:?}", id)))?;

    let shared_secret = match backend.ecdh_combine(peer_key).await {
        Ok(secret) => secret,
        Err(e) => {
            error!(peer = %peer, error = %e, "key exchange failed");
            return Err(e.into());
        }
    };

    let context = SecurityContext::derive(&shared_secret, local_subject, &peer);
    debug!(
        peer = %peer,
        sender_id = %hex::encode(context.sender_id()),
        recipient_id = %hex::encode(context.recipient_id()),
        "derived security context"
    );

    store.write(|s| s.set_security_context(id, shared_secret, context))?;
    info!(peer = %peer, "security context established");
    drop(pin);
    Ok(())
}
