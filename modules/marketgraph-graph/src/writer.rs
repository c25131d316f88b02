use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, info};

use marketgraph_common::MarketRecord;

use crate::store::{GraphStore, NodeKey, PropValue, RelType};

/// Write-side wrapper for the graph. Every operation is an upsert, so the
/// importer can be re-run over the same source without creating duplicates.
#[derive(Clone)]
pub struct GraphWriter {
    store: Arc<dyn GraphStore>,
}

impl GraphWriter {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Create or refresh the Market node for `record`. MERGE on id; every
    /// other property is overwritten with the record's current value
    /// (last write wins). Returns the market id for the link calls.
    pub async fn upsert_market(&self, record: &MarketRecord) -> Result<String> {
        if record.id.is_empty() {
            bail!("market {:?} has no identifier", record.label());
        }
        let node = NodeKey::market(record.id.as_str());
        self.store
            .merge_node(&node, &market_properties(record))
            .await?;
        debug!(market_id = record.id.as_str(), "Upserted market");
        Ok(record.id.clone())
    }

    /// Link a market to its category, creating the Category node on first
    /// reference. Any BELONGS_TO edge to a different category is removed, so
    /// an empty name leaves the market with none. Returns whether an edge is
    /// now in place.
    pub async fn link_category(&self, market_id: &str, category: &str) -> Result<bool> {
        self.link(market_id, RelType::BelongsTo, category).await
    }

    /// Link a market to its series, creating the Series node on first
    /// reference. Same replacement rule as `link_category`.
    pub async fn link_series(&self, market_id: &str, series_slug: &str) -> Result<bool> {
        self.link(market_id, RelType::InSeries, series_slug).await
    }

    /// A market keeps at most one edge per relationship type: the one named
    /// by its latest document.
    async fn link(&self, market_id: &str, rel: RelType, target_key: &str) -> Result<bool> {
        let from = NodeKey::market(market_id);
        let current = (!target_key.is_empty()).then_some(target_key);

        let linked = match current {
            Some(key) => {
                let to = NodeKey::new(rel.target(), key);
                let linked = self.store.merge_edge(&from, rel, &to).await?;
                if !linked {
                    debug!(market_id, rel = rel.as_str(), "Market not found, edge skipped");
                }
                linked
            }
            None => false,
        };

        let pruned = self.store.prune_edges(&from, rel, current).await?;
        if pruned > 0 {
            debug!(market_id, rel = rel.as_str(), pruned, "Removed stale edges");
        }
        Ok(linked)
    }

    /// Number of nodes currently in the graph, any label.
    pub async fn node_count(&self) -> Result<i64> {
        self.store.count_nodes(None).await
    }

    /// Delete every node and relationship. Returns how many nodes were removed.
    pub async fn clear(&self) -> Result<i64> {
        let existing = self.store.count_nodes(None).await?;
        self.store.delete_all().await?;
        info!(deleted = existing, "Graph cleared");
        Ok(existing)
    }
}

/// Market node properties, key excluded. Absent timestamps map to `Null`
/// so a refreshed node does not keep a stale date.
pub fn market_properties(r: &MarketRecord) -> Vec<(&'static str, PropValue)> {
    vec![
        ("title", r.title.as_str().into()),
        ("description", r.description.as_str().into()),
        ("slug", r.slug.as_str().into()),
        ("ticker", r.ticker.as_str().into()),
        ("volume", r.volume.into()),
        ("commentCount", r.comment_count.into()),
        ("image", r.image.as_str().into()),
        ("icon", r.icon.as_str().into()),
        ("resolutionSource", r.resolution_source.as_str().into()),
        ("publishedAt", r.published_at.as_str().into()),
        ("updatedAt", r.updated_at.as_str().into()),
        ("startDate", r.start_date.as_deref().into()),
        ("endDate", r.end_date.as_deref().into()),
        ("createdAt", r.created_at.as_deref().into()),
        ("closedTime", r.closed_time.as_deref().into()),
    ]
}
