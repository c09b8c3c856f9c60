//! Dependency graph between peers
//!
//! Edges are only created at registration time and every dependency must
//! already exist, so the graph is a DAG by construction.

use std::collections::HashMap;

use super::table::PeerId;

/// Direct dependencies and dependents of every peer
#[derive(Debug, Default)]
pub struct DependencyGraph {
    dependencies: HashMap<PeerId, Vec<PeerId>>,
    /// Insertion ordered; notification follows registration order
    dependents: HashMap<PeerId, Vec<PeerId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a peer and its direct dependencies
    pub fn add_peer(&mut self, id: PeerId, dependencies: &[PeerId]) {
        let mut deps: Vec<PeerId> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if !deps.contains(dep) {
                deps.push(*dep);
            }
        }
        self.dependencies.insert(id, deps);
    }

    /// Note that `dependent` waits on `dependency`
    pub fn add_dependent(&mut self, dependency: PeerId, dependent: PeerId) {
        let list = self.dependents.entry(dependency).or_default();
        if !list.contains(&dependent) {
            list.push(dependent);
        }
    }

    pub fn dependencies(&self, id: PeerId) -> &[PeerId] {
        self.dependencies.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dependents(&self, id: PeerId) -> &[PeerId] {
        self.dependents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drop a node's outgoing lists, returning its dependents
    pub fn remove(&mut self, id: PeerId) -> Vec<PeerId> {
        self.dependencies.remove(&id);
        self.dependents.remove(&id).unwrap_or_default()
    }
}
