//! Token based "air" authentication.
//!
//! signature = sha256_hex(token ‖ body ‖ tenant_id ‖ ts ‖ nonce), where `ts` is
//! the current unix second and `nonce` an 8 character random string. The
//! server rejects a `ts` more than a few seconds old, so sign right before
//! sending.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

use crate::auth::AuthError;

const TENANT_TS: HeaderName = HeaderName::from_static("tenant-ts");
const TENANT_NONCE: HeaderName = HeaderName::from_static("tenant-nonce");
const TENANT_SIGNATURE: HeaderName = HeaderName::from_static("tenant-signature");

/// Shared-token signer for one tenant.
#[derive(Clone)]
pub struct AirAuth {
    token: String,
    tenant_id: String,
}

impl AirAuth {
    /// Create a new air auth signer.
    pub fn new(token: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            tenant_id: tenant_id.into(),
        }
    }

    /// Sign `body` now and write the `Tenant-*` headers.
    pub fn sign(&self, headers: &mut HeaderMap, body: &[u8]) -> Result<(), AuthError> {
        let ts = chrono::Utc::now().timestamp().to_string();
        let nonce = new_nonce();
        self.sign_with(headers, body, &ts, &nonce)
    }

    /// Sign with an explicit timestamp and nonce.
    pub fn sign_with(
        &self,
        headers: &mut HeaderMap,
        body: &[u8],
        ts: &str,
        nonce: &str,
    ) -> Result<(), AuthError> {
        let signature = signature(&self.token, body, &self.tenant_id, ts, nonce);
        for (name, value) in [
            (TENANT_TS, ts),
            (TENANT_NONCE, nonce),
            (TENANT_SIGNATURE, signature.as_str()),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|_| AuthError::InvalidHeaderValue(name.as_str().to_string()))?;
            headers.insert(name, value);
        }
        Ok(())
    }
}

impl std::fmt::Debug for AirAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirAuth")
            .field("tenant_id", &self.tenant_id)
            .field("token", &"***")
            .finish()
    }
}

/// Air auth signature over the five parts, in this exact order.
pub fn signature(token: &str, body: &[u8], tenant_id: &str, ts: &str, nonce: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(body);
    hasher.update(tenant_id.as_bytes());
    hasher.update(ts.as_bytes());
    hasher.update(nonce.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn new_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
