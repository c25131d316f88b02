use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Instrument};
use tracing_subscriber::EnvFilter;

use marketgraph_common::{ClearMode, Config};
use marketgraph_import::confirm::StdinConfirm;
use marketgraph_import::connect::LiveConnector;
use marketgraph_import::Orchestrator;

#[derive(Parser)]
#[command(name = "marketgraph-import", about = "Import market documents from MongoDB into Neo4j")]
struct Cli {
    /// Load variables from this .env file (existing variables win)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Clear existing graph data without asking
    #[arg(long, conflicts_with = "no_clear")]
    auto_clear: bool,

    /// Never clear; always append to existing graph data
    #[arg(long)]
    no_clear: bool,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "IMPORT_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn clear_override(&self) -> Option<ClearMode> {
        if self.no_clear {
            Some(ClearMode::Never)
        } else if self.auto_clear {
            Some(ClearMode::Auto)
        } else {
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays parseable
    let filter = EnvFilter::from_default_env().add_directive("marketgraph=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match Config::load_dotenv(cli.env_file.as_deref()) {
        Ok(Some(path)) => info!(path = %path.display(), "Loaded environment file"),
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Configuration check failed");
            eprintln!("Import aborted: {e}");
            return Ok(ExitCode::from(1));
        }
    }

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("import", %run_id);

    let orchestrator = Orchestrator::new(Box::new(LiveConnector), Box::new(StdinConfirm))
        .with_clear_override(cli.clear_override())
        .interactive(std::io::stdin().is_terminal());

    let outcome = orchestrator
        .run(|key| std::env::var(key).ok())
        .instrument(span)
        .await;

    match &outcome.result {
        Ok(report) if cli.json => println!("{}", serde_json::to_string_pretty(report)?),
        Ok(report) => println!("{report}"),
        Err(e) => eprintln!("Import aborted: {e}"),
    }

    Ok(ExitCode::from(outcome.exit_code()))
}
