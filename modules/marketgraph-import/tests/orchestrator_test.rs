//! State machine behaviour: phase traces, aborts, retry timing, clear step.

use std::collections::HashMap;
use std::time::Duration;

use marketgraph_common::{ClearMode, ConfigError};
use marketgraph_graph::{NodeKey, NodeLabel};
use marketgraph_import::testing::{
    lookup, market_doc, test_env, MockConnector, MockSource, RecordingSleeper, ScriptedConfirm,
};
use marketgraph_import::{ImportError, Orchestrator, Phase, RunOutcome};

use Phase::*;

struct Harness {
    connector: MockConnector,
    confirm: ScriptedConfirm,
    sleeper: RecordingSleeper,
    env: HashMap<String, String>,
    clear: Option<ClearMode>,
    interactive: bool,
}

impl Harness {
    fn new(docs: Vec<serde_json::Value>) -> Self {
        Self {
            connector: MockConnector::new(MockSource::new(docs)),
            confirm: ScriptedConfirm::answering(false),
            sleeper: RecordingSleeper::default(),
            env: test_env(),
            clear: None,
            interactive: false,
        }
    }

    fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    async fn run(&self) -> RunOutcome {
        Orchestrator::new(Box::new(self.connector.clone()), Box::new(self.confirm.clone()))
            .with_sleeper(Box::new(self.sleeper.clone()))
            .with_clear_override(self.clear)
            .interactive(self.interactive)
            .run(lookup(&self.env))
            .await
    }
}

const HAPPY_PATH: [Phase; 8] = [Init, EnvCheck, ConnectSource, ConnectTarget, Bootstrap, Import, Report, Closed];

#[tokio::test]
async fn successful_run_visits_every_phase_in_order() {
    let h = Harness::new(vec![market_doc("1")]);

    let outcome = h.run().await;

    assert_eq!(outcome.phases, HAPPY_PATH);
    assert_eq!(outcome.exit_code(), 0);
    assert!(h.sleeper.delays().is_empty());
}

#[tokio::test]
async fn missing_configuration_aborts_before_connecting() {
    let mut h = Harness::new(vec![market_doc("1")]);
    h.env.remove("MONGO_URI");
    h.env.remove("NEO4J_PASSWORD");

    let outcome = h.run().await;

    assert_eq!(outcome.phases, [Init, EnvCheck, Aborted]);
    assert_eq!(outcome.exit_code(), 1);
    match outcome.result {
        Err(ImportError::Config(ConfigError::Missing(keys))) => {
            assert_eq!(keys, ["MONGO_URI", "NEO4J_PASSWORD"]);
        }
        other => panic!("expected missing config, got {other:?}"),
    }
    assert_eq!(h.connector.source_attempts(), 0);
    assert_eq!(h.connector.target_attempts(), 0);
}

#[tokio::test]
async fn unreachable_source_aborts_after_bounded_retries() {
    let mut h = Harness::new(vec![market_doc("1")]);
    h.connector = h.connector.clone().refuse_source(u32::MAX);

    let outcome = h.run().await;

    assert_eq!(outcome.phases, [Init, EnvCheck, ConnectSource, Aborted]);
    assert!(matches!(outcome.result, Err(ImportError::SourceConnect { attempts: 3, .. })));
    assert_eq!(h.connector.source_attempts(), 3);
    assert_eq!(h.connector.target_attempts(), 0);
    // No wait after the final attempt
    assert_eq!(h.sleeper.delays(), [Duration::from_secs(2); 2]);
}

#[tokio::test]
async fn source_that_comes_up_late_is_retried_into_a_normal_run() {
    let mut h = Harness::new(vec![market_doc("1")]);
    h.connector = h.connector.clone().refuse_source(2);

    let outcome = h.run().await;

    assert_eq!(outcome.phases, HAPPY_PATH);
    assert_eq!(h.connector.source_attempts(), 3);
    assert_eq!(h.sleeper.delays().len(), 2);
    assert_eq!(h.connector.graph.node_count(NodeLabel::Market), 1);
}

#[tokio::test]
async fn unreachable_target_aborts_and_releases_the_source() {
    let mut h = Harness::new(vec![market_doc("1")]).env("IMPORT_MAX_ATTEMPTS", "5").env("IMPORT_RETRY_DELAY_SECS", "1");
    h.connector = h.connector.clone().refuse_target(u32::MAX);

    let outcome = h.run().await;

    assert_eq!(outcome.phases, [Init, EnvCheck, ConnectSource, ConnectTarget, Aborted]);
    match &outcome.result {
        Err(e @ ImportError::TargetConnect { attempts, .. }) => {
            assert_eq!(*attempts, 5);
            assert!(e.to_string().contains("after 5 attempts"));
        }
        other => panic!("expected target connect failure, got {other:?}"),
    }
    assert_eq!(h.sleeper.delays(), [Duration::from_secs(1); 4]);
    assert!(h.connector.source.is_closed());
    assert_eq!(h.connector.graph.node_count(NodeLabel::Market), 0);
}

#[tokio::test]
async fn source_is_closed_after_a_successful_run() {
    let h = Harness::new(vec![market_doc("1")]);
    h.run().await;
    assert!(h.connector.source.is_closed());
}

#[tokio::test]
async fn bootstrap_declares_all_three_constraints() {
    let h = Harness::new(vec![]);
    h.run().await;
    assert_eq!(
        h.connector.graph.constraints(),
        [NodeLabel::Market, NodeLabel::Category, NodeLabel::Series]
    );
}

#[tokio::test]
async fn rejected_constraints_do_not_stop_the_import() {
    let h = Harness::new(vec![market_doc("1")]);
    h.connector.graph.reject_constraints(true);

    let outcome = h.run().await;

    assert_eq!(outcome.phases, HAPPY_PATH);
    assert_eq!(h.connector.graph.node_count(NodeLabel::Market), 1);
}

#[tokio::test]
async fn empty_target_never_prompts_or_clears() {
    let mut h = Harness::new(vec![market_doc("1")]);
    h.interactive = true;

    let outcome = h.run().await;

    assert!(!outcome.phases.contains(&ClearTarget));
    assert!(h.confirm.prompts().is_empty());
}

#[tokio::test]
async fn auto_clear_flag_clears_existing_data() {
    let h = Harness::new(vec![market_doc("new")]).env("IMPORT_AUTO_CLEAR", "true");
    h.connector.graph.seed(NodeKey::market("stale"));

    let outcome = h.run().await;

    assert!(outcome.phases.contains(&ClearTarget));
    assert!(h.connector.graph.node(&NodeKey::market("stale")).is_none());
    assert_eq!(outcome.result.as_ref().map(|r| r.cleared_nodes).ok(), Some(Some(1)));
    assert!(h.confirm.prompts().is_empty());
}

#[tokio::test]
async fn declined_confirmation_appends() {
    let h = Harness::new(vec![market_doc("new")]).env("IMPORT_AUTO_CLEAR", "false");
    h.connector.graph.seed(NodeKey::market("stale"));
    h.connector.graph.seed(NodeKey::category("Old"));

    let outcome = h.run().await;

    assert!(!outcome.phases.contains(&ClearTarget));
    assert_eq!(h.confirm.prompts(), [2]);
    assert!(h.connector.graph.node(&NodeKey::market("stale")).is_some());
    assert_eq!(h.connector.graph.node_count(NodeLabel::Market), 2);
}

#[tokio::test]
async fn accepted_confirmation_clears() {
    let mut h = Harness::new(vec![market_doc("new")]).env("IMPORT_AUTO_CLEAR", "false");
    h.confirm = ScriptedConfirm::answering(true);
    h.connector.graph.seed(NodeKey::market("stale"));

    let outcome = h.run().await;

    assert!(outcome.phases.contains(&ClearTarget));
    assert_eq!(h.confirm.prompts(), [1]);
    assert_eq!(h.connector.graph.node_count(NodeLabel::Market), 1);
}

#[tokio::test]
async fn unattended_run_infers_auto_clear() {
    let h = Harness::new(vec![market_doc("new")]);
    h.connector.graph.seed(NodeKey::market("stale"));

    let outcome = h.run().await;

    assert!(outcome.phases.contains(&ClearTarget));
    assert!(h.confirm.prompts().is_empty());
}

#[tokio::test]
async fn attended_run_asks_unless_targeting_the_container_host() {
    let mut local = Harness::new(vec![market_doc("new")]);
    local.interactive = true;
    local.connector.graph.seed(NodeKey::market("stale"));
    local.run().await;
    assert_eq!(local.confirm.prompts(), [1]);

    let mut compose = Harness::new(vec![market_doc("new")]).env("NEO4J_URI", "bolt://neo4j:7687");
    compose.interactive = true;
    compose.connector.graph.seed(NodeKey::market("stale"));
    let outcome = compose.run().await;
    assert!(outcome.phases.contains(&ClearTarget));
    assert!(compose.confirm.prompts().is_empty());
}

#[tokio::test]
async fn no_clear_override_beats_environment() {
    let mut h = Harness::new(vec![market_doc("new")]).env("IMPORT_AUTO_CLEAR", "true");
    h.clear = Some(ClearMode::Never);
    h.connector.graph.seed(NodeKey::market("stale"));

    let outcome = h.run().await;

    assert_eq!(outcome.phases, HAPPY_PATH);
    assert!(h.connector.graph.node(&NodeKey::market("stale")).is_some());
}

#[tokio::test]
async fn graph_failures_after_connect_are_absorbed() {
    let h = Harness::new(vec![market_doc("1"), market_doc("2")]);
    h.connector.graph.set_unreachable(true);

    let outcome = h.run().await;

    assert_eq!(outcome.phases, HAPPY_PATH);
    assert_eq!(outcome.exit_code(), 0);
    let report = outcome.result.expect("run completes");
    assert_eq!(report.stats.documents_failed, 2);
    assert_eq!(report.totals, None);
    assert!(report.to_string().contains("Graph totals unavailable"));
}
