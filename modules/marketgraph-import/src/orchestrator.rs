//! Import run state machine.
//!
//! ```text
//! Init -> EnvCheck -> ConnectSource -> ConnectTarget -> Bootstrap
//!      -> [ClearTarget] -> Import -> Report -> Closed
//! ```
//!
//! `Aborted` is reachable only from `EnvCheck`, `ConnectSource` and
//! `ConnectTarget`. Once both sessions are open every later failure is
//! absorbed and the run ends in `Closed`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use marketgraph_common::{ClearMode, Config, RetryPolicy, Sleeper, TokioSleeper};
use marketgraph_graph::migrate::migrate;
use marketgraph_graph::{GraphStore, GraphTotals, GraphWriter};

use crate::confirm::{resolve_clear_mode, ClearConfirm};
use crate::connect::StoreConnector;
use crate::error::ImportError;
use crate::pipeline::{BatchCoordinator, ImportStats};
use crate::traits::DocumentSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Init,
    EnvCheck,
    ConnectSource,
    ConnectTarget,
    Bootstrap,
    ClearTarget,
    Import,
    Report,
    Closed,
    Aborted,
}

/// Final summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub stats: ImportStats,
    /// Read back from the graph. `None` when the count queries failed.
    pub totals: Option<GraphTotals>,
    /// Nodes deleted by the clear step, if it ran.
    pub cleared_nodes: Option<i64>,
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Import Summary ===")?;
        if let Some(cleared) = self.cleared_nodes {
            writeln!(f, "Cleared before import: {cleared} nodes")?;
        }
        writeln!(f, "{}", self.stats)?;
        writeln!(f, "--- Graph totals ---")?;
        match &self.totals {
            Some(totals) => write!(f, "{totals}"),
            None => write!(f, "Graph totals unavailable"),
        }
    }
}

/// Visited phases plus the run's result.
#[derive(Debug)]
pub struct RunOutcome {
    pub phases: Vec<Phase>,
    pub result: Result<ImportReport, ImportError>,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self.result {
            Ok(_) => 0,
            Err(_) => 1,
        }
    }
}

pub struct Orchestrator {
    connector: Box<dyn StoreConnector>,
    confirm: Box<dyn ClearConfirm>,
    sleeper: Box<dyn Sleeper>,
    clear_override: Option<ClearMode>,
    interactive: bool,
}

impl Orchestrator {
    pub fn new(connector: Box<dyn StoreConnector>, confirm: Box<dyn ClearConfirm>) -> Self {
        Self {
            connector,
            confirm,
            sleeper: Box::new(TokioSleeper),
            clear_override: None,
            interactive: false,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Command-line choice; takes precedence over `IMPORT_AUTO_CLEAR`.
    pub fn with_clear_override(mut self, mode: Option<ClearMode>) -> Self {
        self.clear_override = mode;
        self
    }

    /// Whether an operator is attached to stdin.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Run one import. `lookup` resolves configuration keys, normally
    /// `std::env::var`.
    pub async fn run<F>(&self, lookup: F) -> RunOutcome
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut phases = vec![Phase::Init, Phase::EnvCheck];

        let config = match Config::from_lookup(lookup) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "Configuration check failed");
                phases.push(Phase::Aborted);
                return RunOutcome {
                    phases,
                    result: Err(e.into()),
                };
            }
        };
        config.log_redacted();

        let policy = RetryPolicy::new(config.max_attempts, config.retry_delay);
        let connector = self.connector.as_ref();
        let sleeper = self.sleeper.as_ref();
        let cfg = &config;

        phases.push(Phase::ConnectSource);
        let source = match policy
            .run(sleeper, "MongoDB connection", |attempt| {
                debug!(attempt, "Connecting to MongoDB");
                connector.source(cfg)
            })
            .await
        {
            Ok(source) => source,
            Err(e) => {
                error!(attempts = e.attempts, error = %format!("{:#}", e.last), "Giving up on MongoDB");
                phases.push(Phase::Aborted);
                return RunOutcome {
                    phases,
                    result: Err(ImportError::SourceConnect {
                        attempts: e.attempts,
                        message: format!("{:#}", e.last),
                    }),
                };
            }
        };

        phases.push(Phase::ConnectTarget);
        let store = match policy
            .run(sleeper, "Neo4j connection", |attempt| {
                debug!(attempt, "Connecting to Neo4j");
                connector.target(cfg)
            })
            .await
        {
            Ok(store) => store,
            Err(e) => {
                error!(attempts = e.attempts, error = %format!("{:#}", e.last), "Giving up on Neo4j");
                source.close().await;
                phases.push(Phase::Aborted);
                return RunOutcome {
                    phases,
                    result: Err(ImportError::TargetConnect {
                        attempts: e.attempts,
                        message: format!("{:#}", e.last),
                    }),
                };
            }
        };
        info!(source = source.describe().as_str(), "Both stores connected");

        let report = self.import(&config, source.as_ref(), store, &mut phases).await;

        source.close().await;
        phases.push(Phase::Closed);
        RunOutcome {
            phases,
            result: Ok(report),
        }
    }

    /// Bootstrap through Report. Never fails; problems degrade the report.
    async fn import(
        &self,
        config: &Config,
        source: &dyn DocumentSource,
        store: Arc<dyn GraphStore>,
        phases: &mut Vec<Phase>,
    ) -> ImportReport {
        phases.push(Phase::Bootstrap);
        migrate(store.as_ref()).await;

        let writer = GraphWriter::new(store.clone());
        let cleared_nodes = self.maybe_clear(config, &writer, phases).await;

        phases.push(Phase::Import);
        let total = match source.count().await {
            Ok(n) => {
                info!(total = n, source = source.describe().as_str(), "Found documents to import");
                Some(n)
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Could not count source documents");
                None
            }
        };

        let stats = match source.documents().await {
            Ok(documents) => {
                BatchCoordinator::new(writer, config.batch_size)
                    .run(documents, total)
                    .await
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "Could not open source cursor");
                ImportStats {
                    total_expected: total,
                    interrupted: true,
                    ..Default::default()
                }
            }
        };

        phases.push(Phase::Report);
        let totals = match GraphTotals::read(store.as_ref()).await {
            Ok(totals) => Some(totals),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Could not read graph totals");
                None
            }
        };

        info!(
            processed = stats.documents_processed,
            skipped = stats.skipped(),
            markets = stats.markets_upserted,
            relationships = stats.relationships_linked(),
            interrupted = stats.interrupted,
            "Import complete"
        );

        ImportReport {
            stats,
            totals,
            cleared_nodes,
        }
    }

    /// Enter ClearTarget only when the graph already has nodes and the
    /// resolved mode says so. A failed clear falls back to appending.
    async fn maybe_clear(&self, config: &Config, writer: &GraphWriter, phases: &mut Vec<Phase>) -> Option<i64> {
        let existing = match writer.node_count().await {
            Ok(0) => return None,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Could not count existing nodes, appending");
                return None;
            }
        };

        let mode = resolve_clear_mode(
            self.clear_override.unwrap_or(config.clear_mode),
            self.interactive,
            config.targets_container_host(),
        );
        let clear = match mode {
            ClearMode::Auto => {
                info!(existing, "Target has data, auto-clearing");
                true
            }
            ClearMode::Ask => self.confirm.confirm_clear(existing).await,
            ClearMode::Never | ClearMode::Infer => false,
        };
        if !clear {
            info!(existing, "Appending to existing graph data");
            return None;
        }

        phases.push(Phase::ClearTarget);
        match writer.clear().await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Clear failed, appending");
                None
            }
        }
    }
}
