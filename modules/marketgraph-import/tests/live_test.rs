//! Full runs against real stores in containers.
//! Run with: cargo test -p marketgraph-import --test live_test -- --ignored

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

use marketgraph_common::Config;
use marketgraph_graph::testutil::{neo4j_container, NEO4J_TEST_PASSWORD, NEO4J_TEST_USER};
use marketgraph_graph::{GraphClient, GraphStore, GraphTotals};
use marketgraph_import::confirm::ClearConfirm;
use marketgraph_import::connect::{LiveConnector, StoreConnector};
use marketgraph_import::source::MongoSource;
use marketgraph_import::testing::{linked_doc, market_doc, MockSource, ScriptedConfirm};
use marketgraph_import::{DocumentSource, Orchestrator};

async fn mongo_container() -> (ContainerAsync<GenericImage>, String) {
    let container = GenericImage::new("mongo", "7.0")
        .with_exposed_port(ContainerPort::Tcp(27017))
        .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"))
        .start()
        .await
        .expect("Failed to start MongoDB container");
    let port = container
        .get_host_port_ipv4(27017)
        .await
        .expect("Failed to get MongoDB host port");
    (container, format!("mongodb://127.0.0.1:{port}"))
}

/// Mock documents into a real Neo4j.
struct MockToNeo4j {
    source: MockSource,
    client: GraphClient,
}

#[async_trait]
impl StoreConnector for MockToNeo4j {
    async fn source(&self, _config: &Config) -> Result<Box<dyn DocumentSource>> {
        Ok(Box::new(self.source.clone()))
    }

    async fn target(&self, _config: &Config) -> Result<Arc<dyn GraphStore>> {
        let store: Arc<dyn GraphStore> = Arc::new(self.client.clone());
        Ok(store)
    }
}

fn confirm() -> Box<dyn ClearConfirm> {
    Box::new(ScriptedConfirm::answering(false))
}

fn env_for(mongo_uri: &str, neo4j_uri: &str) -> impl Fn(&str) -> Option<String> {
    let mongo_uri = mongo_uri.to_string();
    let neo4j_uri = neo4j_uri.to_string();
    move |key: &str| match key {
        "MONGO_URI" => Some(mongo_uri.clone()),
        "MONGO_DB" => Some("polymarket".into()),
        "NEO4J_URI" => Some(neo4j_uri.clone()),
        "NEO4J_USER" => Some(NEO4J_TEST_USER.into()),
        "NEO4J_PASSWORD" => Some(NEO4J_TEST_PASSWORD.into()),
        "IMPORT_MAX_ATTEMPTS" => Some("5".into()),
        "IMPORT_RETRY_DELAY_SECS" => Some("1".into()),
        _ => None,
    }
}

#[tokio::test]
#[ignore] // requires Docker
async fn repeated_import_into_neo4j_is_idempotent() {
    let (_neo4j, uri, client) = neo4j_container().await;
    let docs = vec![
        linked_doc("1", "Sports", Some("nfl")),
        linked_doc("2", "Sports", Some("nfl")),
        market_doc("3"),
    ];
    let connector = MockToNeo4j {
        source: MockSource::new(docs),
        client: client.clone(),
    };
    let orchestrator = Orchestrator::new(Box::new(connector), confirm())
        .with_clear_override(Some(marketgraph_common::ClearMode::Never));

    let first = orchestrator.run(env_for("mongodb://unused", &uri)).await;
    let second = orchestrator.run(env_for("mongodb://unused", &uri)).await;

    let expected = GraphTotals {
        markets: 3,
        categories: 1,
        series: 1,
        relationships: 4,
    };
    assert_eq!(first.result.unwrap().totals, Some(expected));
    assert_eq!(second.result.unwrap().totals, Some(expected));
}

#[tokio::test]
#[ignore] // requires Docker
async fn mongo_source_streams_relaxed_extended_json() {
    let (_mongo, mongo_uri) = mongo_container().await;

    let client = mongodb::Client::with_uri_str(&mongo_uri).await.unwrap();
    let collection = client.database("polymarket").collection::<mongodb::bson::Document>("cleaned");
    collection
        .insert_many([
            doc! { "id": "a", "volume": f64::INFINITY, "category": "Sports" },
            doc! { "title": "no explicit id" },
        ])
        .await
        .unwrap();

    let source = MongoSource::connect(&mongo_uri, "polymarket", "cleaned").await.unwrap();
    assert_eq!(source.count().await.unwrap(), 2);

    let docs: Vec<_> = source.documents().await.unwrap().try_collect().await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["volume"]["$numberDouble"], "Infinity");
    assert!(docs[1]["_id"]["$oid"].is_string());
    source.close().await;
}

#[tokio::test]
#[ignore] // requires Docker
async fn mongo_to_neo4j_end_to_end() {
    let (_mongo, mongo_uri) = mongo_container().await;
    let (_neo4j, neo4j_uri, _client) = neo4j_container().await;

    let client = mongodb::Client::with_uri_str(&mongo_uri).await.unwrap();
    client
        .database("polymarket")
        .collection::<mongodb::bson::Document>("cleaned")
        .insert_many([
            doc! { "id": "1", "title": "A", "category": "Sports", "seriesSlug": "nba" },
            doc! { "id": "2", "title": "B", "category": "Sports" },
            doc! { "title": "orphan" },
        ])
        .await
        .unwrap();

    let outcome = Orchestrator::new(Box::new(LiveConnector), confirm())
        .run(env_for(&mongo_uri, &neo4j_uri))
        .await;

    assert_eq!(outcome.exit_code(), 0);
    let report = outcome.result.unwrap();
    // The orphan gets its ObjectId as key
    assert_eq!(report.stats.documents_processed, 3);
    assert_eq!(
        report.totals,
        Some(GraphTotals {
            markets: 3,
            categories: 1,
            series: 1,
            relationships: 3,
        })
    );
}
