//! The graph-store seam. Everything the importer needs from the target
//! database, expressed as a handful of idempotent primitives.
//!
//! `GraphClient` implements this over bolt; `MemoryGraph` implements it
//! in-process for tests. No domain logic lives here: which labels, keys and
//! relationship types get written is decided by `GraphWriter`.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Node labels materialized by the importer. Each has one unique key property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeLabel {
    Market,
    Category,
    Series,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 3] = [NodeLabel::Market, NodeLabel::Category, NodeLabel::Series];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeLabel::Market => "Market",
            NodeLabel::Category => "Category",
            NodeLabel::Series => "Series",
        }
    }

    /// The property that identifies a node of this label.
    pub fn key_property(self) -> &'static str {
        match self {
            NodeLabel::Market => "id",
            NodeLabel::Category => "name",
            NodeLabel::Series => "slug",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types. Edges carry no properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RelType {
    /// Market -> Category
    BelongsTo,
    /// Market -> Series
    InSeries,
}

impl RelType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelType::BelongsTo => "BELONGS_TO",
            RelType::InSeries => "IN_SERIES",
        }
    }

    pub fn target(self) -> NodeLabel {
        match self {
            RelType::BelongsTo => NodeLabel::Category,
            RelType::InSeries => NodeLabel::Series,
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a node: its label plus the value of the label's key property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeKey {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }

    pub fn market(id: impl Into<String>) -> Self {
        Self::new(NodeLabel::Market, id)
    }

    pub fn category(name: impl Into<String>) -> Self {
        Self::new(NodeLabel::Category, name)
    }

    pub fn series(slug: impl Into<String>) -> Self {
        Self::new(NodeLabel::Series, slug)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{}={:?})", self.label, self.label.key_property(), self.key)
    }
}

/// A scalar node property. `Null` removes the property on write.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    Float(f64),
    Int(i64),
    Null,
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_string())
    }
}

impl From<f64> for PropValue {
    fn from(f: f64) -> Self {
        PropValue::Float(f)
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        PropValue::Int(i)
    }
}

impl From<Option<&str>> for PropValue {
    fn from(s: Option<&str>) -> Self {
        s.map(PropValue::from).unwrap_or(PropValue::Null)
    }
}

/// Target collaborator primitives. Every write is match-or-create, so
/// repeating any call with the same arguments leaves the graph unchanged.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Cheap round trip proving the session is usable.
    async fn ping(&self) -> Result<()>;

    /// Declare uniqueness of `label`'s key property. Already-present
    /// constraints are not an error.
    async fn create_unique_constraint(&self, label: NodeLabel) -> Result<()>;

    /// Match-or-create the node by key, then overwrite the given properties.
    async fn merge_node(&self, node: &NodeKey, props: &[(&'static str, PropValue)]) -> Result<()>;

    /// Match `from` (which must already exist), match-or-create `to` by key,
    /// then match-or-create the `rel` edge between them. Returns `false`
    /// without writing anything when `from` does not exist.
    async fn merge_edge(&self, from: &NodeKey, rel: RelType, to: &NodeKey) -> Result<bool>;

    /// Delete `from`'s outgoing `rel` edges whose target key is not `keep`,
    /// or all of them when `keep` is `None`. Target nodes stay. Returns how
    /// many edges were removed.
    async fn prune_edges(&self, from: &NodeKey, rel: RelType, keep: Option<&str>) -> Result<i64>;

    /// Count nodes with `label`, or all nodes when `None`.
    async fn count_nodes(&self, label: Option<NodeLabel>) -> Result<i64>;

    /// Count all relationships in the graph.
    async fn count_relationships(&self) -> Result<i64>;

    /// Remove every node and relationship.
    async fn delete_all(&self) -> Result<()>;
}
