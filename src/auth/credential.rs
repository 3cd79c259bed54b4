//! Signing credentials.

use std::fmt;

/// Access key credentials for HMAC signing. Immutable once built.
#[derive(Clone)]
pub struct Credential {
    pub access_key_id: String,
    pub secret_key: String,
    pub region: String,
    pub service: String,
    pub session_token: Option<String>,
}

impl Credential {
    /// Create a new credential without a session token.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_key: secret_key.into(),
            region: region.into(),
            service: service.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

// Keep secrets out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .field("service", &self.service)
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let cred = Credential::new("ak", "very-secret", "cn-north-1", "air")
            .with_session_token("session");
        let rendered = format!("{cred:?}");
        assert!(rendered.contains("ak"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("session\""));
    }
}
