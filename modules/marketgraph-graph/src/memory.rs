//! In-process `GraphStore` with Neo4j MERGE semantics, for tests.
//!
//! Stateful: nodes keyed by (label, key), a set of edges, and the declared
//! constraints. Faults can be injected per market key to exercise the
//! importer's skip-and-continue path without a database.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::store::{GraphStore, NodeKey, NodeLabel, PropValue, RelType};

pub type Properties = BTreeMap<String, PropValue>;

#[derive(Default)]
struct State {
    nodes: BTreeMap<NodeKey, Properties>,
    edges: BTreeSet<(NodeKey, RelType, NodeKey)>,
    constraints: BTreeSet<NodeLabel>,
    failing_keys: HashSet<String>,
    reject_constraints: bool,
    unreachable: bool,
}

#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory graph lock poisoned")
    }

    /// Make every write touching this key (as node or edge source) fail.
    pub fn fail_writes_for(&self, key: &str) {
        self.lock().failing_keys.insert(key.to_string());
    }

    pub fn reject_constraints(&self, reject: bool) {
        self.lock().reject_constraints = reject;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Insert a node directly, bypassing fault injection. For pre-existing data.
    pub fn seed(&self, node: NodeKey) {
        self.lock().nodes.entry(node).or_default();
    }

    pub fn node(&self, node: &NodeKey) -> Option<Properties> {
        self.lock().nodes.get(node).cloned()
    }

    pub fn has_edge(&self, from: &NodeKey, rel: RelType, to: &NodeKey) -> bool {
        self.lock()
            .edges
            .contains(&(from.clone(), rel, to.clone()))
    }

    pub fn node_count(&self, label: NodeLabel) -> usize {
        self.lock().nodes.keys().filter(|k| k.label == label).count()
    }

    pub fn edge_count(&self) -> usize {
        self.lock().edges.len()
    }

    pub fn constraints(&self) -> Vec<NodeLabel> {
        self.lock().constraints.iter().copied().collect()
    }

    fn check_reachable(state: &State) -> Result<()> {
        if state.unreachable {
            bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn ping(&self) -> Result<()> {
        Self::check_reachable(&self.lock())
    }

    async fn create_unique_constraint(&self, label: NodeLabel) -> Result<()> {
        let mut state = self.lock();
        Self::check_reachable(&state)?;
        if state.reject_constraints {
            bail!("Invalid input 'IF': constraint syntax not supported");
        }
        state.constraints.insert(label);
        Ok(())
    }

    async fn merge_node(&self, node: &NodeKey, props: &[(&'static str, PropValue)]) -> Result<()> {
        let mut state = self.lock();
        Self::check_reachable(&state)?;
        if state.failing_keys.contains(&node.key) {
            bail!("write rejected for {node}");
        }
        let entry = state.nodes.entry(node.clone()).or_default();
        for (name, value) in props {
            match value {
                PropValue::Null => {
                    entry.remove(*name);
                }
                v => {
                    entry.insert(name.to_string(), v.clone());
                }
            }
        }
        Ok(())
    }

    async fn merge_edge(&self, from: &NodeKey, rel: RelType, to: &NodeKey) -> Result<bool> {
        let mut state = self.lock();
        Self::check_reachable(&state)?;
        if state.failing_keys.contains(&from.key) {
            bail!("write rejected for {from}-[:{rel}]->{to}");
        }
        if !state.nodes.contains_key(from) {
            return Ok(false);
        }
        state.nodes.entry(to.clone()).or_default();
        state.edges.insert((from.clone(), rel, to.clone()));
        Ok(true)
    }

    async fn prune_edges(&self, from: &NodeKey, rel: RelType, keep: Option<&str>) -> Result<i64> {
        let mut state = self.lock();
        Self::check_reachable(&state)?;
        if state.failing_keys.contains(&from.key) {
            bail!("write rejected for {from}-[:{rel}]->()");
        }
        let before = state.edges.len();
        state
            .edges
            .retain(|(f, r, to)| !(f == from && *r == rel && Some(to.key.as_str()) != keep));
        Ok((before - state.edges.len()) as i64)
    }

    async fn count_nodes(&self, label: Option<NodeLabel>) -> Result<i64> {
        let state = self.lock();
        Self::check_reachable(&state)?;
        let n = match label {
            Some(label) => state.nodes.keys().filter(|k| k.label == label).count(),
            None => state.nodes.len(),
        };
        Ok(n as i64)
    }

    async fn count_relationships(&self) -> Result<i64> {
        let state = self.lock();
        Self::check_reachable(&state)?;
        Ok(state.edges.len() as i64)
    }

    async fn delete_all(&self) -> Result<()> {
        let mut state = self.lock();
        Self::check_reachable(&state)?;
        state.nodes.clear();
        state.edges.clear();
        Ok(())
    }
}
