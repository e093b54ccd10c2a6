//! End-to-end initialization scenarios.

use initflow::prelude::*;
use initflow::testing::{
    assert_all_complete, assert_node_state, assert_order, assert_summary_counts, init_test_tracing,
    CountingLoader, ExecutionLog, FlakyLoader, TestHarness,
};
use pretty_assertions::assert_eq;

fn ok(id: &str) -> Node {
    Node::new(id, id.to_uppercase(), || Ok(1))
}

#[test]
fn every_node_runs_after_its_dependencies() {
    init_test_tracing();
    let h = TestHarness::new();
    let log = ExecutionLog::new();
    let graph: &[(&str, &[&str])] = &[
        ("ui", &["fonts", "textures", "config"]),
        ("fonts", &["config"]),
        ("textures", &["config", "gpu"]),
        ("gpu", &[]),
        ("config", &[]),
        ("audio", &["config"]),
    ];
    for (id, deps) in graph {
        h.orchestrator
            .add_node(
                Node::new(*id, *id, log.loader(*id, 1)).with_dependencies(deps.iter().copied()),
            )
            .unwrap();
    }

    let summary = h.orchestrator.execute();

    assert!(summary.all_succeeded());
    assert_eq!(summary.total, graph.len());
    let order = log.entries();
    for (id, deps) in graph {
        for dep in *deps {
            assert_order(&order, dep, id);
        }
    }
}

#[test]
fn cycle_is_detected_without_hanging() {
    let h = TestHarness::new();
    h.orchestrator.add_node(ok("a").depends_on("b")).unwrap();
    h.orchestrator.add_node(ok("b").depends_on("a")).unwrap();
    h.orchestrator.add_node(ok("c").depends_on("a")).unwrap();

    let summary = h.orchestrator.execute();

    assert_all_complete(&h.orchestrator);
    assert_eq!(summary.completed, 3);
    assert_eq!(h.diagnostics.of_kind(DiagnosticKind::CycleDetected).len(), 1);
}

#[test]
fn execute_twice_returns_same_summary() {
    let h = TestHarness::linear(4);
    let first = h.orchestrator.execute();
    let second = h.orchestrator.execute();
    assert_eq!(first, second);
    assert_eq!(h.events.node_events_of(NodeEventKind::Started).len(), 4);
}

#[test]
fn missing_dependency_isolated_from_independent_nodes() {
    let h = TestHarness::new();
    h.orchestrator.add_node(ok("needs_ghost").depends_on("ghost")).unwrap();
    h.orchestrator.add_node(ok("independent")).unwrap();

    h.orchestrator.execute();

    assert_node_state(&h.orchestrator, "needs_ghost", NodeState::Pending);
    assert_node_state(&h.orchestrator, "independent", NodeState::Complete);
}

#[test]
fn failed_chain_summary() {
    let h = TestHarness::new();
    h.orchestrator
        .add_node(Node::new("a", "Alpha", || anyhow::bail!("corrupt archive")))
        .unwrap();
    h.orchestrator.add_node(ok("b").depends_on("a")).unwrap();
    h.orchestrator.add_node(ok("c").depends_on("b")).unwrap();

    let summary = h.orchestrator.execute();

    assert_summary_counts(&summary, 0, 1, 2);
    assert!(!summary.all_succeeded());
    assert_eq!(
        summary.failures,
        vec![FailureRecord::new("a", "Alpha", "corrupt archive")]
    );
    assert!(summary.to_string().contains("1 failure:"));
}

#[test]
fn error_context_chain_is_captured() {
    use anyhow::Context;
    let h = TestHarness::new();
    h.orchestrator
        .add_node(Node::new("cfg", "Config", || {
            let raw: Result<usize, std::num::ParseIntError> = "x".parse();
            let n = raw.context("parsing item count")?;
            Ok(n)
        }))
        .unwrap();

    h.orchestrator.execute();

    let error = h.orchestrator.node("cfg").unwrap().last_error().unwrap();
    assert_eq!(error.kind, LoadErrorKind::Failed);
    assert_eq!(error.message, "parsing item count");
    assert_eq!(error.causes.len(), 1);
}

#[test]
fn reload_cascades_to_single_dependent() {
    let h = TestHarness::new();
    let textures = CountingLoader::new(64);
    let atlas = CountingLoader::new(4);
    h.orchestrator
        .add_node(Node::new("textures", "Textures", textures.loader()).reloadable())
        .unwrap();
    h.orchestrator
        .add_node(
            Node::new("atlas", "Atlas", atlas.loader())
                .depends_on("textures")
                .reloadable(),
        )
        .unwrap();
    h.orchestrator.execute();

    assert!(h.orchestrator.reload("textures"));

    assert_eq!(
        h.events.node_trace()[4..].to_vec(),
        vec![
            ("node.stale".to_string(), "atlas".to_string()),
            ("node.reload_started".to_string(), "textures".to_string()),
            ("node.reload_completed".to_string(), "textures".to_string()),
            ("node.reload_started".to_string(), "atlas".to_string()),
            ("node.reload_completed".to_string(), "atlas".to_string()),
        ]
    );
    assert_eq!((textures.calls(), atlas.calls()), (2, 2));
    assert_all_complete(&h.orchestrator);
}

#[test]
fn reload_is_rejected_without_side_effects() {
    let h = TestHarness::new();
    h.orchestrator.add_node(ok("static")).unwrap();
    h.orchestrator.execute();
    let before = h.orchestrator.summary();

    assert!(!h.orchestrator.reload("static"));
    assert!(!h.orchestrator.reload("unknown"));

    assert_eq!(h.orchestrator.summary(), before);
}

#[test]
fn core_failure_skips_field_stage() {
    let h = TestHarness::new();
    let mut core = Stage::new("core", "Core");
    core.add(Node::new("registry", "Registry", || anyhow::bail!("registry offline")))
        .add(ok("settings"));
    let mut field = Stage::new("field", "Field");
    field
        .add(ok("terrain").depends_on("registry"))
        .add(ok("weather"))
        .depends_on_stage(&core);
    h.orchestrator.add_stage(core).unwrap();
    h.orchestrator.add_stage(field).unwrap();

    let summary = h.orchestrator.execute();

    assert_summary_counts(&summary, 1, 1, 2);
    assert_node_state(&h.orchestrator, "terrain", NodeState::Pending);
    assert_node_state(&h.orchestrator, "weather", NodeState::Pending);
    let field = h.orchestrator.stage("field").unwrap();
    assert_eq!(field.state(), StageState::Pending);
    assert!(field.progress().abs() < f64::EPSILON);
}

#[test]
fn stage_progress_never_decreases() {
    let h = TestHarness::new();
    let mut stage = Stage::new("boot", "Boot");
    for i in 0..5 {
        stage.add(ok(&format!("n{i}")));
    }
    stage.add(Node::new("bad", "Bad", || anyhow::bail!("nope")));
    h.orchestrator.add_stage(stage).unwrap();

    h.orchestrator.execute();

    let progress: Vec<f64> = h.events.stage_events().iter().map(|e| e.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert!((progress[progress.len() - 1] - 1.0).abs() < f64::EPSILON);
    assert_eq!(h.orchestrator.stage("boot").unwrap().state(), StageState::Failed);
}

#[test]
fn empty_stage_is_complete_with_full_progress() {
    let h = TestHarness::new();
    h.orchestrator.add_stage(Stage::new("empty", "Empty")).unwrap();

    h.orchestrator.execute();

    let stage = h.orchestrator.stage("empty").unwrap();
    assert!(stage.is_complete());
    assert!((stage.progress() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn duplicate_id_keeps_first_node() {
    let h = TestHarness::new();
    let first = CountingLoader::new(1);
    let second = CountingLoader::new(2);
    h.orchestrator.add_node(Node::new("db", "Database", first.loader())).unwrap();
    let rejected = h.orchestrator.add_node(Node::new("db", "Impostor", second.loader()));

    assert_eq!(
        rejected.unwrap_err(),
        RegistrationError::DuplicateNode("db".to_string())
    );
    h.orchestrator.execute();
    assert_eq!((first.calls(), second.calls()), (1, 0));
}

#[test]
fn resume_recovers_after_transient_failure() {
    let h = TestHarness::new();
    let network = FlakyLoader::new(1, "timeout");
    h.orchestrator
        .add_node(Node::new("network", "Network", network.loader()).reloadable())
        .unwrap();
    h.orchestrator.add_node(ok("session").depends_on("network")).unwrap();
    assert_summary_counts(&h.orchestrator.execute(), 0, 1, 1);

    assert!(h.orchestrator.reload("network"));
    let summary = h.orchestrator.resume();

    assert!(summary.all_succeeded());
    assert_eq!(network.calls(), 2);
}

#[test]
fn config_from_json_drives_orchestrator() {
    let config =
        OrchestratorConfig::from_json(r#"{"name": "server", "cascade_reloads": false}"#)
            .unwrap();
    let h = TestHarness::with_config(config);
    let dependent = CountingLoader::new(1);
    h.orchestrator.add_node(ok("a").reloadable()).unwrap();
    h.orchestrator
        .add_node(Node::new("b", "B", dependent.loader()).depends_on("a").reloadable())
        .unwrap();
    h.orchestrator.execute();

    assert!(h.orchestrator.reload("a"));

    assert_eq!(h.store().name(), "server");
    assert_eq!(dependent.calls(), 1);
    assert_node_state(&h.orchestrator, "b", NodeState::Stale);
}
