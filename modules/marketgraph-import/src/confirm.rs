// Clear-before-import confirmation.
//
// Attended and unattended runs share one code path; they differ only in the
// ClearConfirm implementation handed to the orchestrator and the resolved
// ClearMode.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use marketgraph_common::ClearMode;
use tracing::warn;

#[async_trait]
pub trait ClearConfirm: Send + Sync {
    /// Ask whether the `existing_nodes` already in the graph should be
    /// deleted. `false` means append.
    async fn confirm_clear(&self, existing_nodes: i64) -> bool;
}

/// y/N prompt on the controlling terminal.
pub struct StdinConfirm;

#[async_trait]
impl ClearConfirm for StdinConfirm {
    async fn confirm_clear(&self, existing_nodes: i64) -> bool {
        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut out = std::io::stdout();
            write!(out, "Neo4j already contains {existing_nodes} nodes. Clear before import? [y/N] ")?;
            out.flush()?;
            let mut line = String::new();
            // EOF reads zero bytes and leaves the line empty
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_yes(&line),
            Ok(Err(e)) => {
                warn!(error = %e, "Could not read confirmation, appending");
                false
            }
            Err(e) => {
                warn!(error = %e, "Confirmation prompt failed, appending");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Settle `Infer` into a concrete mode. Explicit modes pass through.
///
/// Unattended when stdin is not a terminal or when the target is the
/// container-network host; those runs clear so re-runs stay repeatable.
pub fn resolve_clear_mode(configured: ClearMode, interactive: bool, container_target: bool) -> ClearMode {
    match configured {
        ClearMode::Infer if !interactive || container_target => ClearMode::Auto,
        ClearMode::Infer => ClearMode::Ask,
        explicit => explicit,
    }
}
