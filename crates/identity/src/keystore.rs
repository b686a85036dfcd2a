//! Certificate store.
//!
//! A fixed-capacity slab of certificate entries. Entries start pending, are
//! promoted to verified by the verification pipeline, and are reclaimed only
//! while unpinned. At most one entry exists per subject across both states.

use edgetrust_core::{current_timestamp_ms, eui64_from_address, normalise_address, Eui64};
use edgetrust_crypto::{PublicKeyBytes, SharedSecret};
use std::collections::VecDeque;
use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::certificate::{Certificate, CertificateTags};
use crate::error::{IdentityError, Result};
use crate::key_exchange::SecurityContext;

/// Stable handle to a store slot. Stale ids (slot since reused) never resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    index: u32,
    generation: u32,
}

/// How a certificate reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateOrigin {
    /// Pushed by the peer or overheard
    Unsolicited,
    /// Response to our own public-key request
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Verified,
}

/// Result of a successful [`KeyStore::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New pending entry
    Enqueued(EntryId),
    /// Subject already waiting for verification
    AlreadyPending(EntryId),
    /// Subject already verified, nothing to do
    AlreadyVerified(EntryId),
}

impl AddOutcome {
    pub fn id(&self) -> EntryId {
        match self {
            Self::Enqueued(id) | Self::AlreadyPending(id) | Self::AlreadyVerified(id) => *id,
        }
    }

    /// Whether the verification pipeline has work to look at.
    fn wakes_pipeline(&self) -> bool {
        !matches!(self, Self::AlreadyVerified(_))
    }
}

#[derive(Debug)]
pub struct KeyStoreEntry {
    certificate: Certificate,
    origin: CertificateOrigin,
    state: EntryState,
    pin_count: u32,
    added_at_ms: u64,
    shared_secret: Option<SharedSecret>,
    security_context: Option<SecurityContext>,
}

impl KeyStoreEntry {
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn origin(&self) -> CertificateOrigin {
        self.origin
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    /// Milliseconds since the entry was created.
    pub fn age_ms(&self) -> u64 {
        current_timestamp_ms().saturating_sub(self.added_at_ms)
    }

    pub fn shared_secret(&self) -> Option<&SharedSecret> {
        self.shared_secret.as_ref()
    }

    pub fn security_context(&self) -> Option<&SecurityContext> {
        self.security_context.as_ref()
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<KeyStoreEntry>,
}

/// The certificate store proper. Shared through [`KeyStoreHandle`].
#[derive(Debug)]
pub struct KeyStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    verified: Vec<EntryId>,
    pending: VecDeque<EntryId>,
    root_address: Ipv6Addr,
    root_public_key: PublicKeyBytes,
}

impl KeyStore {
    pub fn new(capacity: usize, root_address: Ipv6Addr, root_public_key: PublicKeyBytes) -> Self {
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        // pop() hands out low indices first
        let free = (0..capacity as u32).rev().collect();
        Self {
            slots,
            free,
            verified: Vec::with_capacity(capacity),
            pending: VecDeque::with_capacity(capacity),
            root_address: normalise_address(&root_address),
            root_public_key,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn verified_count(&self) -> usize {
        self.verified.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn root_public_key(&self) -> PublicKeyBytes {
        self.root_public_key
    }

    pub fn root_address(&self) -> Ipv6Addr {
        self.root_address
    }

    /// Insert a certificate for verification.
    ///
    /// Never creates a second entry for a subject that is already pending or
    /// verified. A pending entry re-added as `Requested` takes that origin.
    pub fn add(&mut self, certificate: Certificate, origin: CertificateOrigin) -> Result<AddOutcome> {
        if let Some(id) = self.find(&certificate.subject) {
            return Ok(AddOutcome::AlreadyVerified(id));
        }

        if let Some(id) = self.find_pending(&certificate.subject) {
            if origin == CertificateOrigin::Requested {
                if let Some(entry) = self.get_mut(id) {
                    entry.origin = origin;
                }
            }
            return Ok(AddOutcome::AlreadyPending(id));
        }

        let Some(index) = self.free.pop() else {
            warn!(
                subject = %certificate.subject,
                capacity = self.capacity(),
                "certificate store exhausted"
            );
            return Err(IdentityError::ResourceExhausted {
                capacity: self.capacity(),
            });
        };

        let slot = &mut self.slots[index as usize];
        slot.entry = Some(KeyStoreEntry {
            certificate,
            origin,
            state: EntryState::Pending,
            pin_count: 0,
            added_at_ms: current_timestamp_ms(),
            shared_secret: None,
            security_context: None,
        });
        let id = EntryId {
            index,
            generation: slot.generation,
        };
        self.pending.push_back(id);
        Ok(AddOutcome::Enqueued(id))
    }

    pub fn get(&self, id: EntryId) -> Option<&KeyStoreEntry> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn get_mut(&mut self, id: EntryId) -> Option<&mut KeyStoreEntry> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn entry_or_not_found(&mut self, id: EntryId) -> Result<&mut KeyStoreEntry> {
        self.get_mut(id)
            .ok_or_else(|| IdentityError::NotFound(format!("{:?}", id)))
    }

    fn lookup(&self, ids: impl IntoIterator<Item = EntryId>, subject: &Eui64) -> Option<EntryId> {
        ids.into_iter()
            .find(|id| matches!(self.get(*id), Some(e) if e.certificate.subject == *subject))
    }

    /// Verified entry for `subject`.
    pub fn find(&self, subject: &Eui64) -> Option<EntryId> {
        self.lookup(self.verified.iter().copied(), subject)
    }

    /// Pending entry for `subject`.
    pub fn find_pending(&self, subject: &Eui64) -> Option<EntryId> {
        self.lookup(self.pending.iter().copied(), subject)
    }

    /// Verified entry for the peer at `address` (link-local or global form).
    pub fn find_by_address(&self, address: &Ipv6Addr) -> Option<EntryId> {
        let address = normalise_address(address);
        self.find(&eui64_from_address(&address))
    }

    /// Public key to verify messages from `address`: the root's own key for
    /// the root endpoint, otherwise the verified peer key.
    pub fn find_public_key(&self, address: &Ipv6Addr) -> Option<PublicKeyBytes> {
        if normalise_address(address) == self.root_address {
            return Some(self.root_public_key);
        }
        let id = self.find_by_address(address)?;
        self.get(id).map(|e| e.certificate.public_key)
    }

    /// Tags of the verified certificate for `address`, used for stereotype lookup.
    pub fn tags_for_address(&self, address: &Ipv6Addr) -> Option<CertificateTags> {
        let id = self.find_by_address(address)?;
        self.get(id).map(|e| e.certificate.tags)
    }

    pub fn pin(&mut self, id: EntryId) -> Result<u32> {
        let entry = self.entry_or_not_found(id)?;
        entry.pin_count += 1;
        debug!(subject = %entry.certificate.subject, pins = entry.pin_count, "pinned");
        Ok(entry.pin_count)
    }

    /// Release one pin.
    ///
    /// # Panics
    ///
    /// Panics if the entry is not pinned; that is a reference counting defect
    /// in the caller.
    pub fn unpin(&mut self, id: EntryId) -> Result<u32> {
        let entry = self.entry_or_not_found(id)?;
        assert!(
            entry.pin_count > 0,
            "unpin of {} with zero pin count",
            entry.certificate.subject
        );
        entry.pin_count -= 1;
        debug!(subject = %entry.certificate.subject, pins = entry.pin_count, "unpinned");
        Ok(entry.pin_count)
    }

    pub fn is_pinned(&self, id: EntryId) -> bool {
        self.get(id).map(|e| e.pin_count > 0).unwrap_or(false)
    }

    /// Oldest entry still awaiting verification.
    pub fn pending_head(&self) -> Option<EntryId> {
        self.pending.front().copied()
    }

    /// Move a pending entry to the verified set.
    pub fn promote(&mut self, id: EntryId) -> Result<()> {
        let entry = self.entry_or_not_found(id)?;
        entry.state = EntryState::Verified;
        info!(subject = %entry.certificate.subject, origin = ?entry.origin, "certificate verified");
        self.pending.retain(|p| *p != id);
        self.verified.push(id);
        Ok(())
    }

    /// Drop a pending entry that failed verification and free its slot.
    ///
    /// Refused while pinned; the entry then stays queued.
    pub fn discard(&mut self, id: EntryId) -> Result<Certificate> {
        let certificate = self.release_slot(id)?;
        self.pending.retain(|p| *p != id);
        Ok(certificate)
    }

    /// Reclaim a verified entry. Refused while pinned.
    pub fn remove(&mut self, subject: &Eui64) -> Result<Certificate> {
        let id = self
            .find(subject)
            .ok_or_else(|| IdentityError::NotFound(subject.to_string()))?;
        let certificate = self.release_slot(id)?;
        self.verified.retain(|v| *v != id);
        info!(subject = %subject, "certificate removed");
        Ok(certificate)
    }

    fn release_slot(&mut self, id: EntryId) -> Result<Certificate> {
        let entry = self.entry_or_not_found(id)?;
        if entry.pin_count > 0 {
            return Err(IdentityError::Pinned {
                subject: entry.certificate.subject,
                pins: entry.pin_count,
            });
        }

        let slot = &mut self.slots[id.index as usize];
        let entry = slot
            .entry
            .take()
            .ok_or_else(|| IdentityError::NotFound(format!("{:?}", id)))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Ok(entry.certificate)
    }

    /// Attach key-exchange results to a verified entry.
    pub fn set_security_context(
        &mut self,
        id: EntryId,
        shared_secret: SharedSecret,
        context: SecurityContext,
    ) -> Result<()> {
        let entry = self.entry_or_not_found(id)?;
        entry.shared_secret = Some(shared_secret);
        entry.security_context = Some(context);
        Ok(())
    }

    /// Verified entries in promotion order.
    pub fn iter_verified(&self) -> impl Iterator<Item = (EntryId, &KeyStoreEntry)> + '_ {
        self.verified
            .iter()
            .filter_map(move |id| self.get(*id).map(|e| (*id, e)))
    }
}

/// Shared, cloneable access to a [`KeyStore`] plus the pipeline wake-up signal.
///
/// The mutex is never held across an await.
#[derive(Debug, Clone)]
pub struct KeyStoreHandle {
    inner: Arc<Mutex<KeyStore>>,
    wake: Arc<Notify>,
}

impl KeyStoreHandle {
    pub fn new(store: KeyStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
            wake: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, KeyStore> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with shared access to the store.
    pub fn read<R>(&self, f: impl FnOnce(&KeyStore) -> R) -> R {
        f(&self.lock())
    }

    /// Run `f` with exclusive access to the store.
    pub fn write<R>(&self, f: impl FnOnce(&mut KeyStore) -> R) -> R {
        f(&mut self.lock())
    }

    /// Add a certificate and wake the pipeline if there is pending work.
    pub fn add(&self, certificate: Certificate, origin: CertificateOrigin) -> Result<AddOutcome> {
        let outcome = self.lock().add(certificate, origin)?;
        if outcome.wakes_pipeline() {
            self.wake.notify_one();
        }
        Ok(outcome)
    }

    pub fn find(&self, subject: &Eui64) -> Option<EntryId> {
        self.lock().find(subject)
    }

    pub fn find_by_address(&self, address: &Ipv6Addr) -> Option<EntryId> {
        self.lock().find_by_address(address)
    }

    pub fn find_public_key(&self, address: &Ipv6Addr) -> Option<PublicKeyBytes> {
        self.lock().find_public_key(address)
    }

    pub fn tags_for_address(&self, address: &Ipv6Addr) -> Option<CertificateTags> {
        self.lock().tags_for_address(address)
    }

    /// Pin `id` until the returned guard is dropped.
    pub fn pin(&self, id: EntryId) -> Result<PinGuard> {
        self.lock().pin(id)?;
        Ok(PinGuard {
            store: self.clone(),
            id,
        })
    }

    pub fn is_pinned(&self, id: EntryId) -> bool {
        self.lock().is_pinned(id)
    }

    pub fn remove(&self, subject: &Eui64) -> Result<Certificate> {
        self.lock().remove(subject)
    }

    pub(crate) async fn wait_for_work(&self) {
        self.wake.notified().await
    }
}

/// Holds one pin on an entry, released on drop.
#[derive(Debug)]
pub struct PinGuard {
    store: KeyStoreHandle,
    id: EntryId,
}

impl PinGuard {
    pub fn id(&self) -> EntryId {
        self.id
    }
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        let _ = self.store.lock().unpin(self.id);
    }
}
