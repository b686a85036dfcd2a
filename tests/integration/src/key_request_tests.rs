//! Public-key requests through a key server, into verification and key exchange

use crate::test_utils::*;
use edgetrust_core::ResponseCode;
use edgetrust_crypto::CryptoBackend;
use edgetrust_identity::{
    AddOutcome, CertificateOrigin, CertificateTags, EntryState, KeyRequestError, RequestOutcome,
    VerificationOutcome,
};
use std::sync::Arc;

const NODE_A: &str = "fd00::212:4b00:0:a";
const NODE_B: &str = "fd00::212:4b00:0:b";

async fn sent(outcome: RequestOutcome) -> Result<AddOutcome, KeyRequestError> {
    match outcome {
        RequestOutcome::Sent(handle) => handle.await.unwrap(),
        other => panic!("expected request to be sent, got {:?}", other),
    }
}

#[tokio::test]
async fn test_both_peers_share_matching_context() {
    let server = Arc::new(KeyServer::new(root_authority()));
    let a = TestNode::new(server.root(), NODE_A, 4);
    let b = TestNode::new(server.root(), NODE_B, 4).accepting_unsolicited();
    server.enroll(&b, CertificateTags::EDGE);
    let cert_a = server.enroll(&a, CertificateTags::EDGE);

    // A sees a secured message from B without a context
    let requester = a.requester(server.clone());
    let added = sent(requester.on_missing_security_context(b.address)).await.unwrap();
    assert!(matches!(added, AddOutcome::Enqueued(_)));

    let outcome = a.pipeline.process_next().await.unwrap();
    assert!(matches!(
        outcome,
        VerificationOutcome::Verified { context_established: true, .. }
    ));

    // B receives A's certificate unsolicited
    b.store.add(cert_a, CertificateOrigin::Unsolicited).unwrap();
    let outcome = b.pipeline.process_next().await.unwrap();
    assert!(matches!(
        outcome,
        VerificationOutcome::Verified { context_established: true, .. }
    ));

    let (a_sender, a_recipient) = a.context_keys(&b).unwrap();
    let (b_sender, b_recipient) = b.context_keys(&a).unwrap();
    assert_eq!(a_sender, b_recipient);
    assert_eq!(a_recipient, b_sender);
    assert_ne!(a_sender, a_recipient);
}

#[tokio::test]
async fn test_running_pipeline_picks_up_requested_certificate() {
    let server = Arc::new(KeyServer::new(root_authority()));
    let a = TestNode::new(server.root(), NODE_A, 4);
    let b = TestNode::new(server.root(), NODE_B, 4);
    server.enroll(&b, CertificateTags::EDGE);

    let worker = tokio::spawn(a.pipeline.clone().run());
    let requester = a.requester(server.clone());
    sent(requester.request_public_key(b.address)).await.unwrap();

    assert!(eventually(|| a.context_keys(&b).is_some()).await);
    assert_eq!(
        a.store.find_public_key(&b.address),
        Some(b.backend.local_public_key())
    );

    // known peers are not requested again
    assert!(matches!(
        requester.request_public_key(b.address),
        RequestOutcome::AlreadyKnown
    ));
    assert_eq!(server.request_count(), 1);
    worker.abort();
}

#[tokio::test]
async fn test_link_local_sender_resolves_to_same_peer() {
    let server = Arc::new(KeyServer::new(root_authority()));
    let a = TestNode::new(server.root(), NODE_A, 4);
    let b = TestNode::new(server.root(), NODE_B, 4);
    server.enroll(&b, CertificateTags::EDGE);

    let requester = a.requester(server.clone());
    sent(requester.request_public_key(b.address)).await.unwrap();
    a.pipeline.drain().await;

    let link_local = "fe80::212:4b00:0:b".parse().unwrap();
    assert!(a.store.find_by_address(&link_local).is_some());
    assert!(matches!(
        requester.on_missing_security_context(link_local),
        RequestOutcome::AlreadyKnown
    ));
}

#[tokio::test]
async fn test_unknown_peer_releases_lock() {
    let server = Arc::new(KeyServer::new(root_authority()));
    let a = TestNode::new(server.root(), NODE_A, 4);
    let requester = a.requester(server.clone());

    let err = sent(requester.request_public_key(NODE_B.parse().unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(err, KeyRequestError::Status(code) if code == ResponseCode::NOT_FOUND));
    assert!(!requester.is_requesting());
    assert!(a.store.read(|s| s.is_empty()));
}

#[tokio::test]
async fn test_foreign_root_response_dropped() {
    let server = Arc::new(KeyServer::new(root_authority()));
    // A trusts a different root than the one signing the server's responses
    let a = TestNode::new(&root_authority(), NODE_A, 4);
    let b = TestNode::new(server.root(), NODE_B, 4);
    server.enroll(&b, CertificateTags::EDGE);

    let requester = a.requester(server.clone());
    let err = sent(requester.request_public_key(b.address)).await.unwrap_err();
    assert!(matches!(err, KeyRequestError::Crypto(_)));
    assert!(a.store.read(|s| s.is_empty()));
    assert!(!requester.is_requesting());
}

#[tokio::test]
async fn test_forged_unsolicited_certificate_rejected_and_freed() {
    let server = Arc::new(KeyServer::new(root_authority()));
    let rogue = root_authority();
    let a = TestNode::new(server.root(), NODE_A, 1);
    let b = TestNode::new(server.root(), NODE_B, 1);

    a.store
        .add(b.certificate(&rogue, CertificateTags::EDGE), CertificateOrigin::Unsolicited)
        .unwrap();
    let outcome = a.pipeline.process_next().await.unwrap();
    assert!(matches!(outcome, VerificationOutcome::Rejected { .. }));

    // the single slot is free again for the genuine certificate
    let id = a
        .store
        .add(b.certificate(server.root(), CertificateTags::EDGE), CertificateOrigin::Unsolicited)
        .unwrap()
        .id();
    a.pipeline.drain().await;
    let state = a.store.read(|s| s.get(id).map(|e| e.state()));
    assert_eq!(state, Some(EntryState::Verified));
    // unsolicited and no policy: verified without a context
    assert!(a.context_keys(&b).is_none());
}

#[tokio::test]
async fn test_unsolicited_peer_keyed_when_message_arrives() {
    let server = Arc::new(KeyServer::new(root_authority()));
    let a = TestNode::new(server.root(), NODE_A, 4);
    let b = TestNode::new(server.root(), NODE_B, 4);

    a.store
        .add(b.certificate(server.root(), CertificateTags::EDGE), CertificateOrigin::Unsolicited)
        .unwrap();
    a.pipeline.drain().await;
    assert!(a.entry_for(&b).is_some());
    assert!(a.context_keys(&b).is_none());

    let requester = a.requester(server.clone());
    match requester.on_missing_security_context(b.address) {
        RequestOutcome::KeyExchange(handle) => handle.await.unwrap().unwrap(),
        other => panic!("expected key exchange, got {:?}", other),
    }
    assert!(a.context_keys(&b).is_some());
    assert_eq!(server.request_count(), 0);
}
