// Trait abstraction for the source document store.
//
// DocumentSource: a finite, forward-only stream of raw documents plus a
//   total count for progress reporting. Filtering and pagination are the
//   store's business; the importer consumes whatever the stream yields.
//
// MongoSource implements it for real runs, MockSource (testing.rs) for tests.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// One raw source document, as relaxed Extended JSON.
pub type Document = serde_json::Value;

/// Single-pass document stream. Not restartable.
pub type DocumentStream = BoxStream<'static, Result<Document>>;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Human-readable location, e.g. `polymarket.cleaned`.
    fn describe(&self) -> String;

    /// Total number of documents the stream is expected to yield.
    async fn count(&self) -> Result<u64>;

    /// Open the document stream.
    async fn documents(&self) -> Result<DocumentStream>;

    /// Release the underlying connection. Safe to call more than once.
    async fn close(&self);
}
