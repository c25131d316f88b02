// Test mocks for the import pipeline.
//
// One mock per trait boundary:
// - MockSource (DocumentSource): fixed document list, optional mid-stream failure
// - MockConnector (StoreConnector): hands out MockSource + MemoryGraph, can
//   refuse the first N attempts per store
// - ScriptedConfirm (ClearConfirm): fixed answer, records prompts
// - RecordingSleeper (Sleeper): fake clock, records requested delays
//
// All mocks are Clone and share state through Arc so a test can keep a
// handle after moving one into the Orchestrator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde_json::{json, Value};

use marketgraph_common::{Config, Sleeper};
use marketgraph_graph::memory::MemoryGraph;
use marketgraph_graph::GraphStore;

use crate::confirm::ClearConfirm;
use crate::connect::StoreConnector;
use crate::traits::{Document, DocumentSource, DocumentStream};

// ---------------------------------------------------------------------------
// Documents and environment
// ---------------------------------------------------------------------------

/// Minimal market document.
pub fn market_doc(id: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Market {id}"),
        "slug": format!("market-{id}"),
        "volume": 10.0,
    })
}

/// Market document linked to a category and optionally a series.
pub fn linked_doc(id: &str, category: &str, series_slug: Option<&str>) -> Value {
    let mut doc = market_doc(id);
    doc["category"] = json!(category);
    if let Some(slug) = series_slug {
        doc["seriesSlug"] = json!(slug);
    }
    doc
}

/// A complete, valid environment for `Config::from_lookup`.
pub fn test_env() -> HashMap<String, String> {
    [
        ("MONGO_URI", "mongodb://localhost:27017"),
        ("MONGO_DB", "polymarket"),
        ("NEO4J_URI", "bolt://localhost:7687"),
        ("NEO4J_USER", "neo4j"),
        ("NEO4J_PASSWORD", "secret"),
        ("IMPORT_MAX_ATTEMPTS", "3"),
        ("IMPORT_RETRY_DELAY_SECS", "2"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Turn an environment map into a lookup closure.
pub fn lookup(env: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
    move |key: &str| env.get(key).cloned()
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// In-memory document source. `fail_after(n)` makes the stream yield an
/// error after `n` documents, simulating a dropped cursor.
#[derive(Clone, Default)]
pub struct MockSource {
    docs: Arc<Vec<Document>>,
    fail_after: Option<usize>,
    closed: Arc<AtomicBool>,
}

impl MockSource {
    pub fn new(docs: Vec<Document>) -> Self {
        Self {
            docs: Arc::new(docs),
            ..Default::default()
        }
    }

    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for MockSource {
    fn describe(&self) -> String {
        "mock.cleaned".to_string()
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.docs.len() as u64)
    }

    async fn documents(&self) -> Result<DocumentStream> {
        let mut items: Vec<Result<Document>> = self.docs.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(anyhow!("cursor id 42 not found")));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MockConnector
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Attempts {
    source_failures: AtomicU32,
    target_failures: AtomicU32,
    source_attempts: AtomicU32,
    target_attempts: AtomicU32,
}

/// Hands out a shared `MockSource` and `MemoryGraph`. The first N attempts
/// per store can be refused to exercise the retry policy.
#[derive(Clone)]
pub struct MockConnector {
    pub source: MockSource,
    pub graph: Arc<MemoryGraph>,
    attempts: Arc<Attempts>,
}

impl MockConnector {
    pub fn new(source: MockSource) -> Self {
        Self::with_graph(source, Arc::new(MemoryGraph::new()))
    }

    /// Reuse an existing graph, e.g. to run the importer twice.
    pub fn with_graph(source: MockSource, graph: Arc<MemoryGraph>) -> Self {
        Self {
            source,
            graph,
            attempts: Arc::default(),
        }
    }

    /// Refuse the first `n` source connection attempts. `u32::MAX` never connects.
    pub fn refuse_source(self, n: u32) -> Self {
        self.attempts.source_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Refuse the first `n` target connection attempts.
    pub fn refuse_target(self, n: u32) -> Self {
        self.attempts.target_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn source_attempts(&self) -> u32 {
        self.attempts.source_attempts.load(Ordering::SeqCst)
    }

    pub fn target_attempts(&self) -> u32 {
        self.attempts.target_attempts.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl StoreConnector for MockConnector {
    async fn source(&self, _config: &Config) -> Result<Box<dyn DocumentSource>> {
        self.attempts.source_attempts.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.attempts.source_failures) {
            bail!("server selection timeout: connection refused");
        }
        Ok(Box::new(self.source.clone()))
    }

    async fn target(&self, _config: &Config) -> Result<Arc<dyn GraphStore>> {
        self.attempts.target_attempts.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.attempts.target_failures) {
            bail!("Connection refused (os error 111)");
        }
        let store: Arc<dyn GraphStore> = self.graph.clone();
        Ok(store)
    }
}

// ---------------------------------------------------------------------------
// ScriptedConfirm
// ---------------------------------------------------------------------------

/// Fixed answer to every clear prompt. Records the node counts it was asked about.
#[derive(Clone, Default)]
pub struct ScriptedConfirm {
    answer: bool,
    asked: Arc<Mutex<Vec<i64>>>,
}

impl ScriptedConfirm {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<i64> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClearConfirm for ScriptedConfirm {
    async fn confirm_clear(&self, existing_nodes: i64) -> bool {
        self.asked.lock().unwrap().push(existing_nodes);
        self.answer
    }
}

// ---------------------------------------------------------------------------
// RecordingSleeper
// ---------------------------------------------------------------------------

/// Fake clock. Returns immediately and records each requested delay.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
