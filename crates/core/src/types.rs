//! Identity and address primitives shared across the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::CoreError;

/// Length of an EUI-64 subject identity in bytes.
pub const EUI64_LENGTH: usize = 8;

/// Longest accepted capability (application) name, in bytes.
pub const MAX_CAPABILITY_NAME_LENGTH: usize = 16;

/// Globally unique device identity used as a certificate subject.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Eui64(pub [u8; EUI64_LENGTH]);

impl Eui64 {
    /// Raw bytes of the identity.
    pub fn as_bytes(&self) -> &[u8; EUI64_LENGTH] {
        &self.0
    }

    /// The last `n` bytes, used as short context identifiers.
    pub fn suffix(&self, n: usize) -> &[u8] {
        &self.0[EUI64_LENGTH - n.min(EUI64_LENGTH)..]
    }
}

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Eui64({})", hex::encode(self.0))
    }
}

impl FromStr for Eui64 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidEncoding(e.to_string()))?;
        let bytes: [u8; EUI64_LENGTH] = bytes.try_into().map_err(|v: Vec<u8>| {
            CoreError::InvalidEncoding(format!(
                "EUI-64 must be {} bytes, got {}",
                EUI64_LENGTH,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

/// Rewrite a link-local (`fe80::/10`) address to its canonical global (`fd00::/16`) form.
///
/// The same peer is observed under either form depending on which interface
/// the packet arrived on, so every address lookup goes through this first.
pub fn normalise_address(addr: &Ipv6Addr) -> Ipv6Addr {
    let mut octets = addr.octets();
    if octets[0] == 0xfe && (octets[1] & 0xc0) == 0x80 {
        octets[0] = 0xfd;
        octets[1] = 0x00;
    }
    Ipv6Addr::from(octets)
}

/// Recover the EUI-64 from a SLAAC-style interface identifier.
pub fn eui64_from_address(addr: &Ipv6Addr) -> Eui64 {
    let octets = addr.octets();
    let mut eui = [0u8; EUI64_LENGTH];
    eui.copy_from_slice(&octets[8..]);
    // universal/local bit
    eui[0] ^= 0x02;
    Eui64(eui)
}

/// Request/response status code in `class.detail` form (e.g. `2.05`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseCode {
    pub class: u8,
    pub detail: u8,
}

impl ResponseCode {
    pub const CONTENT: Self = Self::new(2, 5);
    pub const CHANGED: Self = Self::new(2, 4);
    pub const BAD_REQUEST: Self = Self::new(4, 0);
    pub const NOT_FOUND: Self = Self::new(4, 4);
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(5, 0);
    pub const SERVICE_UNAVAILABLE: Self = Self::new(5, 3);

    pub const fn new(class: u8, detail: u8) -> Self {
        Self { class, detail }
    }

    pub fn is_success(&self) -> bool {
        self.class == 2
    }

    pub fn is_client_error(&self) -> bool {
        self.class == 4
    }

    pub fn is_server_error(&self) -> bool {
        self.class == 5
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class, self.detail)
    }
}

/// Get current timestamp in milliseconds since Unix epoch
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
