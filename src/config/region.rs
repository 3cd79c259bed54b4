//! Region defaults.
//!
//! A region table maps a region name to its default hosts and the credential
//! region used when signing. The table belongs to one configuration and is
//! never shared between clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while filling a region table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("region '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Defaults applied when a client names this region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Hosts used when the client lists none, best first.
    pub hosts: Vec<String>,

    /// Region placed in the HMAC signing scope; empty means the region name.
    pub credential_region: String,
}

impl RegionConfig {
    pub fn new<I, S>(hosts: I, credential_region: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            credential_region: credential_region.into(),
        }
    }
}

/// Region name to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RegionTable(BTreeMap<String, RegionConfig>);

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region. A name may be registered once.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        config: RegionConfig,
    ) -> Result<(), RegionError> {
        let name = name.into();
        if self.0.contains_key(&name) {
            return Err(RegionError::AlreadyRegistered(name));
        }
        self.0.insert(name, config);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegionConfig> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Registered hosts of `region`; empty when the region is unknown.
    pub fn hosts(&self, region: &str) -> &[String] {
        self.get(region).map(|r| r.hosts.as_slice()).unwrap_or(&[])
    }

    /// Credential region of `region`, falling back to the name itself.
    pub fn credential_region<'a>(&'a self, region: &'a str) -> &'a str {
        match self.get(region) {
            Some(r) if !r.credential_region.is_empty() => &r.credential_region,
            _ => region,
        }
    }
}
