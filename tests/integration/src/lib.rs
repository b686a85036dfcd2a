//! End-to-end tests across the identity, registry and trust crates
//!
//! This test suite validates:
//! - public-key requests against a scripted key server
//! - verification and key exchange on both ends of a peer relationship
//! - trust computation seeded by certificate-tag stereotypes

pub mod test_utils;

#[cfg(test)]
mod key_request_tests;

#[cfg(test)]
mod trust_flow_tests;
