//! Request authentication.
//!
//! # Data Flow
//! ```text
//! built request (gzipped body, caller headers)
//!     → Authenticator::sign
//!         Hmac: signer.rs (canonical request → HMAC-SHA256 chain → Authorization)
//!         Air:  air.rs (sha256 over token/body/tenant/ts/nonce → Tenant-* headers)
//!     → signed request, ready to send
//! ```
//!
//! # Design Decisions
//! - The two modes are mutually exclusive and chosen once per client
//! - Signing sees the exact bytes that go on the wire (after compression)
//! - Pure apart from the clock and the nonce, both injectable for tests

pub mod air;
pub mod credential;
pub mod signer;

use reqwest::Request;
use thiserror::Error;

pub use air::AirAuth;
pub use credential::Credential;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("request url has no host")]
    MissingHost,

    #[error("x-date header is not a signing timestamp")]
    BadTimestamp,

    #[error("invalid signing key")]
    InvalidKey,

    #[error("invalid header value for {0}")]
    InvalidHeaderValue(String),
}

/// Signing mode of a client.
#[derive(Debug, Clone)]
pub enum Authenticator {
    Hmac(Credential),
    Air(AirAuth),
}

impl Authenticator {
    /// Sign `request` in place.
    pub fn sign(&self, request: &mut Request) -> Result<(), AuthError> {
        match self {
            Authenticator::Hmac(credential) => signer::sign(request, credential),
            Authenticator::Air(air) => {
                let body = request
                    .body()
                    .and_then(|b| b.as_bytes())
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default();
                air.sign(request.headers_mut(), &body)
            }
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Authenticator::Hmac(_) => "hmac",
            Authenticator::Air(_) => "air",
        }
    }
}
