use anyhow::Result;
use serde::Serialize;

use crate::store::{GraphStore, NodeLabel};

/// Authoritative counts read back from the graph after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphTotals {
    pub markets: i64,
    pub categories: i64,
    pub series: i64,
    pub relationships: i64,
}

impl GraphTotals {
    pub async fn read(store: &dyn GraphStore) -> Result<Self> {
        Ok(Self {
            markets: store.count_nodes(Some(NodeLabel::Market)).await?,
            categories: store.count_nodes(Some(NodeLabel::Category)).await?,
            series: store.count_nodes(Some(NodeLabel::Series)).await?,
            relationships: store.count_relationships().await?,
        })
    }
}

impl std::fmt::Display for GraphTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Market nodes:       {}", self.markets)?;
        writeln!(f, "Category nodes:     {}", self.categories)?;
        writeln!(f, "Series nodes:       {}", self.series)?;
        write!(f, "Relationships:      {}", self.relationships)
    }
}
