use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use marketgraph_common::Config;
use marketgraph_graph::{GraphClient, GraphStore};

use crate::source::MongoSource;
use crate::traits::DocumentSource;

/// Opens store sessions. A single call is one connection attempt; the
/// orchestrator wraps it in its retry policy.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn source(&self, config: &Config) -> Result<Box<dyn DocumentSource>>;
    async fn target(&self, config: &Config) -> Result<Arc<dyn GraphStore>>;
}

/// MongoDB + Neo4j.
pub struct LiveConnector;

#[async_trait]
impl StoreConnector for LiveConnector {
    async fn source(&self, config: &Config) -> Result<Box<dyn DocumentSource>> {
        let source = MongoSource::connect(&config.mongo_uri, &config.mongo_db, &config.mongo_collection).await?;
        Ok(Box::new(source))
    }

    async fn target(&self, config: &Config) -> Result<Arc<dyn GraphStore>> {
        let client = GraphClient::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password).await?;
        Ok(Arc::new(client))
    }
}
