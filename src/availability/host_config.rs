//! Path to host mapping.
//!
//! # Responsibilities
//! - Hold the ordered host list of every path, best first
//! - Guarantee a non-empty `"*"` entry
//! - Derive reordered copies from a scoring pass
//!
//! # Design Decisions
//! - Never mutated in place; the manager swaps whole snapshots
//! - `BTreeMap` keeps iteration and debug output deterministic
//! - Reordering uses a stable sort so equal scores keep their prior order

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::availability::error::AvailabilityError;
use crate::health::HostScore;

/// Wildcard path whose hosts serve every path without an override.
pub const DEFAULT_PATH: &str = "*";

/// Immutable snapshot of path → hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    paths: BTreeMap<String, Vec<String>>,
}

impl HostConfig {
    /// Create a new host config. Fails if `"*"` is missing or empty.
    pub fn new<I>(paths: I) -> Result<Self, AvailabilityError>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let paths: BTreeMap<_, _> = paths.into_iter().collect();
        match paths.get(DEFAULT_PATH) {
            Some(hosts) if !hosts.is_empty() => Ok(Self { paths }),
            _ => Err(AvailabilityError::MissingDefaultPath),
        }
    }

    /// Config whose only entry is `"*"` → `hosts`.
    pub fn from_default_hosts(hosts: Vec<String>) -> Result<Self, AvailabilityError> {
        if hosts.is_empty() {
            return Err(AvailabilityError::EmptyHosts);
        }
        Self::new([(DEFAULT_PATH.to_string(), hosts)])
    }

    /// Best host for `path`, falling back to the best `"*"` host.
    pub fn get_host(&self, path: &str) -> &str {
        self.paths
            .get(path)
            .and_then(|hosts| hosts.first())
            .or_else(|| self.default_hosts().first())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn default_hosts(&self) -> &[String] {
        self.paths
            .get(DEFAULT_PATH)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn hosts_for(&self, path: &str) -> Option<&[String]> {
        self.paths.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> &BTreeMap<String, Vec<String>> {
        &self.paths
    }

    /// Every host across all paths, each once, in first-seen order.
    pub fn distinct_hosts(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.paths
            .values()
            .flatten()
            .filter(|host| seen.insert(host.as_str()))
            .cloned()
            .collect()
    }

    /// Copy with every path's hosts sorted by descending score.
    ///
    /// Hosts missing from `scores` count as 0. Hosts are only reordered, never
    /// dropped, so a fully degraded pass still serves the whole set.
    pub fn sorted_by_scores(&self, scores: &[HostScore]) -> HostConfig {
        let index: HashMap<&str, f64> = scores
            .iter()
            .map(|s| (s.host.as_str(), s.score))
            .collect();
        let score_of = |host: &String| index.get(host.as_str()).copied().unwrap_or(0.0);

        let paths = self
            .paths
            .iter()
            .map(|(path, hosts)| {
                let mut sorted = hosts.clone();
                sorted.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));
                (path.clone(), sorted)
            })
            .collect();
        HostConfig { paths }
    }

    /// Return true if both configs have the same paths and, per path, the same
    /// set of hosts regardless of order.
    pub fn same_host_sets(&self, other: &HostConfig) -> bool {
        if self.paths.len() != other.paths.len() {
            return false;
        }
        self.paths.iter().all(|(path, hosts)| match other.paths.get(path) {
            Some(other_hosts) if other_hosts.len() == hosts.len() => {
                let set: HashSet<&String> = hosts.iter().collect();
                other_hosts.iter().all(|h| set.contains(h))
            }
            _ => false,
        })
    }
}
