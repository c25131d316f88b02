use futures::StreamExt;
use tracing::{error, info, warn};

use marketgraph_common::{normalize, MarketRecord};
use marketgraph_graph::GraphWriter;

use crate::pipeline::stats::ImportStats;
use crate::traits::{Document, DocumentStream};

/// Why a single document was skipped.
#[derive(Debug, thiserror::Error)]
enum DocumentError {
    #[error("no extractable identifier")]
    MissingId,

    #[error("graph write failed: {0:#}")]
    Write(#[from] anyhow::Error),
}

/// Drives documents through normalize -> upsert -> link, one at a time,
/// grouped into batches for progress reporting.
///
/// A failing document is logged and skipped; it never stops the run.
pub struct BatchCoordinator {
    writer: GraphWriter,
    batch_size: usize,
}

impl BatchCoordinator {
    pub fn new(writer: GraphWriter, batch_size: usize) -> Self {
        Self {
            writer,
            batch_size: batch_size.max(1),
        }
    }

    /// Consume the whole stream. `total` is only used for progress output.
    pub async fn run(&self, documents: DocumentStream, total: Option<u64>) -> ImportStats {
        let mut stats = ImportStats {
            total_expected: total,
            ..Default::default()
        };

        info!(batch_size = self.batch_size, "Processing documents in batches...");

        let mut batches = documents.chunks(self.batch_size);
        'batches: while let Some(batch) = batches.next().await {
            stats.batches += 1;
            for item in batch {
                let doc = match item {
                    Ok(doc) => doc,
                    Err(e) => {
                        error!(error = %format!("{e:#}"), after = stats.documents_seen, "Source stream failed, stopping import");
                        stats.interrupted = true;
                        log_progress(&stats);
                        break 'batches;
                    }
                };
                stats.documents_seen += 1;
                self.process(&doc, &mut stats).await;
            }
            log_progress(&stats);
        }

        if stats.documents_seen == 0 && !stats.interrupted {
            warn!("No documents found in source");
        }
        stats
    }

    async fn process(&self, doc: &Document, stats: &mut ImportStats) {
        let record = normalize(doc);
        match self.write(&record, stats).await {
            Ok(()) => stats.documents_processed += 1,
            Err(DocumentError::MissingId) => {
                stats.documents_rejected += 1;
                warn!(document = record.label(), "Skipping document: no extractable identifier");
            }
            Err(e) => {
                stats.documents_failed += 1;
                warn!(market_id = record.label(), error = %e, "Skipping document");
            }
        }
    }

    /// Counters are bumped per applied write, so a document that fails half
    /// way still accounts for what did land in the graph.
    async fn write(&self, record: &MarketRecord, stats: &mut ImportStats) -> Result<(), DocumentError> {
        if record.id.is_empty() {
            return Err(DocumentError::MissingId);
        }

        let market_id = self.writer.upsert_market(record).await?;
        stats.markets_upserted += 1;

        // Called even when the field is absent so an edge from an earlier
        // import of this market is dropped.
        let category = record.category.as_deref().unwrap_or_default();
        if self.writer.link_category(&market_id, category).await? {
            stats.categories_linked += 1;
        }

        let series_slug = record.series_slug.as_deref().unwrap_or_default();
        if self.writer.link_series(&market_id, series_slug).await? {
            stats.series_linked += 1;
        }

        Ok(())
    }
}

fn log_progress(stats: &ImportStats) {
    match stats.total_expected {
        Some(total) => info!(
            batch = stats.batches,
            "Processed {}/{} documents",
            stats.documents_processed,
            total
        ),
        None => info!(
            batch = stats.batches,
            "Processed {} documents",
            stats.documents_processed
        ),
    }
}
