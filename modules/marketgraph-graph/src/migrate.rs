use neo4rs::query;
use tracing::{debug, info, warn};

use crate::store::{GraphStore, NodeLabel};

/// Declare a uniqueness constraint on every label's key property.
///
/// Idempotent. Constraints only speed up and guard the MERGE-based upserts,
/// which stay correct without them, so a failure is logged and the
/// remaining labels are still attempted. Returns how many were declared.
pub async fn migrate(store: &dyn GraphStore) -> usize {
    info!("Creating constraints...");

    let mut declared = 0;
    for label in NodeLabel::ALL {
        match store.create_unique_constraint(label).await {
            Ok(()) => declared += 1,
            Err(e) => warn!(
                label = label.as_str(),
                property = label.key_property(),
                error = %e,
                "Could not create uniqueness constraint (non-fatal)"
            ),
        }
    }

    if declared == NodeLabel::ALL.len() {
        info!("Constraints created");
    } else {
        warn!(declared, total = NodeLabel::ALL.len(), "Some constraints are missing");
    }
    declared
}

/// Neo4j side of `GraphStore::create_unique_constraint`.
///
/// Tries the Neo4j 4.4+/5 `IF NOT EXISTS` form first and falls back to the
/// legacy `ASSERT` form understood by older servers and Memgraph.
pub(crate) async fn declare_unique(
    g: &neo4rs::Graph,
    label: NodeLabel,
) -> Result<(), neo4rs::Error> {
    let property = label.key_property();
    let name = format!("{}_{}", label.as_str().to_lowercase(), property);

    let modern = format!(
        "CREATE CONSTRAINT {name} IF NOT EXISTS FOR (n:{label}) REQUIRE n.{property} IS UNIQUE"
    );
    match run_ignoring_exists(g, &modern).await {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(error = %e, "IF NOT EXISTS constraint syntax rejected, trying legacy form");
            let legacy = format!("CREATE CONSTRAINT ON (n:{label}) ASSERT n.{property} IS UNIQUE");
            run_ignoring_exists(g, &legacy).await
        }
    }
}

/// Run a Cypher statement, ignoring errors that indicate the constraint/index already exists.
async fn run_ignoring_exists(
    g: &neo4rs::Graph,
    cypher: &str,
) -> Result<(), neo4rs::Error> {
    match g.run(query(cypher)).await {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("already exists") || msg.contains("equivalent") {
                debug!("Already exists (skipped): {}", cypher.chars().take(80).collect::<String>());
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}
