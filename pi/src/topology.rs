//! Topology files for the `pi` driver
//!
//! A topology lists peers in registration order. A peer may only depend on
//! peers listed before it, mirroring how ids are handed out by `register`.
//!
//! ```yaml
//! own-origin: https://app.example.com
//! timeout-ms: 5000
//! peers:
//!   - name: auth
//!     origin: https://auth.example.com
//!     loaded-after-ms: 50
//!     ready-after-ms: 100
//!   - name: billing
//!     origin: https://billing.example.com
//!     depends-on: [auth]
//!     ready-after-ms: 20
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coordinator::validate_origin;

/// Problems found while checking a topology
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Invalid origin for {name}: {origin:?}")]
    InvalidOrigin { name: String, origin: String },

    #[error("Duplicate peer name: {name}")]
    DuplicateName { name: String },

    #[error("Duplicate origin: {origin}")]
    DuplicateOrigin { origin: String },

    #[error("Peer {peer} depends on unknown peer {dependency}")]
    UnknownDependency { peer: String, dependency: String },

    #[error("Peer {peer} depends on {dependency}, which is listed after it")]
    LaterDependency { peer: String, dependency: String },
}

/// A set of peers to bring up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(rename = "own-origin")]
    pub own_origin: String,

    /// Overrides the configured coordinator timeout
    #[serde(rename = "timeout-ms", default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub peers: Vec<PeerSpec>,
}

/// One peer and its simulated behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSpec {
    pub name: String,

    pub origin: String,

    #[serde(rename = "depends-on", default)]
    pub depends_on: Vec<String>,

    /// Delay before the peer sends LOADED
    #[serde(rename = "loaded-after-ms", default)]
    pub loaded_after_ms: u64,

    /// Delay between REGISTER_ORIGIN and READY; absent means never ready
    #[serde(rename = "ready-after-ms", default)]
    pub ready_after_ms: Option<u64>,
}

impl Topology {
    /// Load and check a topology file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .context(format!("Failed to read topology file {}", path.as_ref().display()))?;
        let topology: Self = serde_yaml::from_str(&content).context("Failed to parse topology file")?;
        topology.validate()?;
        tracing::info!(peers = topology.peers.len(), "Loaded topology from: {}", path.as_ref().display());
        Ok(topology)
    }

    /// Check names, origins and dependency order
    pub fn validate(&self) -> Result<(), TopologyError> {
        if validate_origin(&self.own_origin).is_err() {
            return Err(TopologyError::InvalidOrigin {
                name: "own-origin".to_string(),
                origin: self.own_origin.clone(),
            });
        }

        let all_names: HashSet<&str> = self.peers.iter().map(|p| p.name.as_str()).collect();
        let mut seen_names: HashSet<&str> = HashSet::new();
        let mut seen_origins: HashSet<&str> = HashSet::new();

        for peer in &self.peers {
            if validate_origin(&peer.origin).is_err() {
                return Err(TopologyError::InvalidOrigin {
                    name: peer.name.clone(),
                    origin: peer.origin.clone(),
                });
            }
            for dep in &peer.depends_on {
                if seen_names.contains(dep.as_str()) {
                    continue;
                }
                if all_names.contains(dep.as_str()) {
                    return Err(TopologyError::LaterDependency {
                        peer: peer.name.clone(),
                        dependency: dep.clone(),
                    });
                }
                return Err(TopologyError::UnknownDependency {
                    peer: peer.name.clone(),
                    dependency: dep.clone(),
                });
            }
            if !seen_names.insert(peer.name.as_str()) {
                return Err(TopologyError::DuplicateName {
                    name: peer.name.clone(),
                });
            }
            if !seen_origins.insert(peer.origin.as_str()) {
                return Err(TopologyError::DuplicateOrigin {
                    origin: peer.origin.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn peer(&self, name: &str) -> Option<&PeerSpec> {
        self.peers.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
own-origin: https://app.example.com
timeout-ms: 5000
peers:
  - name: auth
    origin: https://auth.example.com
    loaded-after-ms: 50
    ready-after-ms: 100
  - name: billing
    origin: https://billing.example.com
    depends-on: [auth]
"#;

    fn peer(name: &str, deps: &[&str]) -> PeerSpec {
        PeerSpec {
            name: name.to_string(),
            origin: format!("https://{}.example.com", name),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            loaded_after_ms: 0,
            ready_after_ms: Some(0),
        }
    }

    fn topology(peers: Vec<PeerSpec>) -> Topology {
        Topology {
            own_origin: "https://app.example.com".to_string(),
            timeout_ms: None,
            peers,
        }
    }

    #[test]
    fn test_parse_sample() {
        let topology: Topology = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(topology.timeout_ms, Some(5000));
        assert_eq!(topology.peers.len(), 2);

        let billing = topology.peer("billing").unwrap();
        assert_eq!(billing.depends_on, vec!["auth".to_string()]);
        assert_eq!(billing.loaded_after_ms, 0);
        assert_eq!(billing.ready_after_ms, None);
        assert!(topology.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("topology.yml");
        fs::write(&path, SAMPLE).unwrap();

        let topology = Topology::load(&path).unwrap();
        assert_eq!(topology.peer("auth").unwrap().ready_after_ms, Some(100));
    }

    #[test]
    fn test_forward_dependency_rejected() {
        let t = topology(vec![peer("a", &["b"]), peer("b", &[])]);
        assert_eq!(
            t.validate(),
            Err(TopologyError::LaterDependency {
                peer: "a".to_string(),
                dependency: "b".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let t = topology(vec![peer("a", &["ghost"])]);
        assert!(matches!(t.validate(), Err(TopologyError::UnknownDependency { .. })));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let t = topology(vec![peer("a", &["a"])]);
        assert!(matches!(t.validate(), Err(TopologyError::LaterDependency { .. })));
    }

    #[test]
    fn test_duplicates_rejected() {
        let t = topology(vec![peer("a", &[]), peer("a", &[])]);
        assert!(matches!(t.validate(), Err(TopologyError::DuplicateName { .. })));

        let mut second = peer("b", &[]);
        second.origin = "https://a.example.com".to_string();
        let t = topology(vec![peer("a", &[]), second]);
        assert!(matches!(t.validate(), Err(TopologyError::DuplicateOrigin { .. })));
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let mut bad = peer("a", &[]);
        bad.origin = "localhost".to_string();
        assert!(matches!(
            topology(vec![bad]).validate(),
            Err(TopologyError::InvalidOrigin { .. })
        ));

        let mut t = topology(vec![]);
        t.own_origin = String::new();
        assert!(t.validate().is_err());
    }
}
