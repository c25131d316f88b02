use anyhow::Result;
use async_trait::async_trait;
use neo4rs::{query, BoltNull, BoltType, ConfigBuilder, Graph};

use crate::migrate::declare_unique;
use crate::store::{GraphStore, NodeKey, NodeLabel, PropValue, RelType};

/// Thin wrapper around neo4rs::Graph providing connection setup.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given credentials and check the session answers.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, neo4rs::Error> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(500)
            .max_connections(10)
            .build()?;
        let graph = Graph::connect(config).await?;
        let client = Self { graph };
        client.check_session().await?;
        Ok(client)
    }

    /// Get a reference to the underlying neo4rs Graph.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }

    async fn check_session(&self) -> Result<(), neo4rs::Error> {
        let mut stream = self.graph.execute(query("RETURN 1 AS ping")).await?;
        while stream.next().await?.is_some() {}
        Ok(())
    }

    async fn single_count(&self, cypher: &str) -> Result<i64> {
        let mut stream = self.graph.execute(query(cypher)).await?;
        let count: i64 = match stream.next().await? {
            Some(row) => row.get("count")?,
            None => 0,
        };
        Ok(count)
    }
}

fn to_bolt(value: &PropValue) -> BoltType {
    match value {
        PropValue::Str(s) => s.clone().into(),
        PropValue::Float(f) => (*f).into(),
        PropValue::Int(i) => (*i).into(),
        PropValue::Null => BoltType::Null(BoltNull),
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn ping(&self) -> Result<()> {
        Ok(self.check_session().await?)
    }

    async fn create_unique_constraint(&self, label: NodeLabel) -> Result<()> {
        Ok(declare_unique(&self.graph, label).await?)
    }

    async fn merge_node(&self, node: &NodeKey, props: &[(&'static str, PropValue)]) -> Result<()> {
        // Labels and property names are static; values go through params.
        let mut cypher = format!(
            "MERGE (n:{label} {{{key}: $key}})",
            label = node.label,
            key = node.label.key_property()
        );
        if !props.is_empty() {
            let assignments: Vec<String> = props
                .iter()
                .map(|(name, _)| format!("n.{name} = $p_{name}"))
                .collect();
            cypher.push_str(" SET ");
            cypher.push_str(&assignments.join(", "));
        }

        let mut q = query(&cypher).param("key", node.key.as_str());
        for (name, value) in props {
            q = q.param(&format!("p_{name}"), to_bolt(value));
        }
        self.graph.run(q).await?;
        Ok(())
    }

    async fn merge_edge(&self, from: &NodeKey, rel: RelType, to: &NodeKey) -> Result<bool> {
        let cypher = format!(
            "MATCH (a:{from_label} {{{from_key}: $from}})
             MERGE (b:{to_label} {{{to_key}: $to}})
             MERGE (a)-[:{rel}]->(b)
             RETURN count(a) AS count",
            from_label = from.label,
            from_key = from.label.key_property(),
            to_label = to.label,
            to_key = to.label.key_property(),
        );
        let q = query(&cypher)
            .param("from", from.key.as_str())
            .param("to", to.key.as_str());
        let mut stream = self.graph.execute(q).await?;
        let matched: i64 = match stream.next().await? {
            Some(row) => row.get("count")?,
            None => 0,
        };
        Ok(matched > 0)
    }

    async fn prune_edges(&self, from: &NodeKey, rel: RelType, keep: Option<&str>) -> Result<i64> {
        let target = rel.target();
        let cypher = format!(
            "MATCH (a:{from_label} {{{from_key}: $from}})-[r:{rel}]->(b:{to_label})
             WHERE $keep IS NULL OR b.{to_key} <> $keep
             DELETE r
             RETURN count(r) AS count",
            from_label = from.label,
            from_key = from.label.key_property(),
            to_label = target,
            to_key = target.key_property(),
        );
        let q = query(&cypher)
            .param("from", from.key.as_str())
            .param("keep", to_bolt(&PropValue::from(keep)));
        let mut stream = self.graph.execute(q).await?;
        let removed: i64 = match stream.next().await? {
            Some(row) => row.get("count")?,
            None => 0,
        };
        Ok(removed)
    }

    async fn count_nodes(&self, label: Option<NodeLabel>) -> Result<i64> {
        match label {
            Some(label) => {
                self.single_count(&format!("MATCH (n:{label}) RETURN count(n) AS count"))
                    .await
            }
            None => self.single_count("MATCH (n) RETURN count(n) AS count").await,
        }
    }

    async fn count_relationships(&self) -> Result<i64> {
        self.single_count("MATCH ()-[r]->() RETURN count(r) AS count")
            .await
    }

    async fn delete_all(&self) -> Result<()> {
        self.graph.run(query("MATCH (n) DETACH DELETE n")).await?;
        Ok(())
    }
}
