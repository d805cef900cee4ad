//! End-to-end pipeline scenarios over real source input.

use std::sync::atomic::AtomicBool;

use codeatlas_ir::features::data_flow::domain::Variable;
use codeatlas_ir::features::flow_graph::domain::{BlockKind, CfgEdgeKind};
use codeatlas_ir::features::query_engine::{TaintConfig, TaintTracer, UnifiedGraph};
use codeatlas_ir::pipeline::{SnapshotBuilder, SourceFile};

fn file(path: &str, content: &str) -> SourceFile {
    SourceFile {
        path: path.to_string(),
        content: content.to_string(),
    }
}

fn build(files: &[SourceFile]) -> codeatlas_ir::pipeline::SnapshotBuild {
    SnapshotBuilder::new("repo", "snap1")
        .build(files, &AtomicBool::new(false))
        .expect("snapshot build")
}

#[test]
fn scc_detection_three_file_cycle() {
    // a imports b, b imports c, c imports a: one cycle {a, b, c}
    let build = build(&[
        file("a.py", "import b\n"),
        file("b.py", "import c\n"),
        file("c.py", "import a\n"),
    ]);

    let cycles = build.dependency_graph.detect_cycles();
    assert_eq!(cycles.len(), 1);
    let cycle: std::collections::HashSet<String> = cycles[0].iter().cloned().collect();
    let expected: std::collections::HashSet<String> =
        ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    assert_eq!(cycle, expected);
}

#[test]
fn taint_via_field_is_field_sensitive() {
    // user.id receives the tainted input; the query reads user.name.
    // Field sensitivity means source → query has zero paths.
    let build = build(&[file(
        "svc.py",
        "def handle(user):\n    user.id = input()\n    query = f\"select {user.name}\"\n",
    )]);

    let mut graph = UnifiedGraph::build(
        &build.documents,
        &build.dfgs,
        &build.cfgs,
        &build.inter_proc,
    );
    graph.tag_source(&Variable::make_id("svc.handle", "user.id"), "PII");
    graph.tag_sink(&Variable::make_id("svc.handle", "query"), "PII");

    let result = TaintTracer::new(&graph).trace(&TaintConfig::default());
    assert!(result.paths.is_empty());
    assert!(!result.truncated);
}

#[test]
fn taint_flows_through_matching_field() {
    let build = build(&[file(
        "svc.py",
        "def handle(user):\n    query = f\"select {user.name}\"\n",
    )]);

    let mut graph = UnifiedGraph::build(
        &build.documents,
        &build.dfgs,
        &build.cfgs,
        &build.inter_proc,
    );
    graph.tag_source(&Variable::make_id("svc.handle", "user.name"), "PII");
    graph.tag_sink(&Variable::make_id("svc.handle", "query"), "PII");

    let result = TaintTracer::new(&graph).trace(&TaintConfig::default());
    assert_eq!(result.paths.len(), 1);
}

#[test]
fn async_suspend_inside_try_has_exact_edges() {
    // try: await fetch() with a catch handler: exactly one Normal edge
    // SUSPEND→RESUME and one Exception edge SUSPEND→CATCH.
    let build = build(&[file(
        "aio.py",
        "async def go():\n    try:\n        await fetch()\n    except Exception:\n        pass\n",
    )]);

    let cfg = &build.cfgs[0];
    let suspend = &cfg.blocks_of_kind(BlockKind::Suspend)[0].id;
    let resume = &cfg.blocks_of_kind(BlockKind::Resume)[0].id;
    let catch = &cfg.blocks_of_kind(BlockKind::Catch)[0].id;

    let from_suspend = cfg.edges_from(suspend);
    let normals: Vec<_> = from_suspend
        .iter()
        .filter(|e| e.kind == CfgEdgeKind::Normal)
        .collect();
    let exceptions: Vec<_> = from_suspend
        .iter()
        .filter(|e| e.kind == CfgEdgeKind::Exception)
        .collect();

    assert_eq!(normals.len(), 1);
    assert_eq!(&normals[0].target_block_id, resume);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(&exceptions[0].target_block_id, catch);
}

#[test]
fn every_function_has_one_entry_and_one_exit() {
    let build = build(&[file(
        "m.py",
        "def a():\n    pass\n\ndef b(x):\n    if x:\n        return 1\n    return 2\n\nclass C:\n    def m(self):\n        while True:\n            break\n",
    )]);

    assert_eq!(build.cfgs.len(), 3);
    for cfg in &build.cfgs {
        assert_eq!(cfg.blocks_of_kind(BlockKind::Entry).len(), 1);
        assert_eq!(cfg.blocks_of_kind(BlockKind::Exit).len(), 1);
    }
}

#[test]
fn loop_header_branch_invariants_hold() {
    let build = build(&[file(
        "m.py",
        "def f(xs):\n    for x in xs:\n        y = x\n    return 0\n",
    )]);

    let cfg = &build.cfgs[0];
    let headers = cfg.blocks_of_kind(BlockKind::LoopHeader);
    assert_eq!(headers.len(), 1);
    let from_header = cfg.edges_from(&headers[0].id);
    assert_eq!(
        from_header
            .iter()
            .filter(|e| e.kind == CfgEdgeKind::TrueBranch)
            .count(),
        1
    );
    assert_eq!(
        from_header
            .iter()
            .filter(|e| e.kind == CfgEdgeKind::FalseBranch)
            .count(),
        1
    );
    assert!(cfg.edges_of_kind(CfgEdgeKind::LoopBack).len() <= 1);
}

#[test]
fn impact_analysis_diamond_scenario() {
    // Dependency graph {A→B, B→C, D→C}; changing C directly affects
    // {B, D}, transitively {A}, max depth 2.
    let build = build(&[
        file("A.py", "import B\n"),
        file("B.py", "import C\n"),
        file("D.py", "import C\n"),
        file("C.py", "x = 1\n"),
    ]);

    let analyzer = codeatlas_ir::ImpactAnalyzer::new(&build.dependency_graph);
    let report = analyzer.analyze(&["C".to_string()], None);

    assert_eq!(
        report.directly_affected,
        vec!["B".to_string(), "D".to_string()]
    );
    assert_eq!(report.transitively_affected, vec!["A".to_string()]);
    assert_eq!(report.max_depth, 2);
}

#[test]
fn recursive_function_taint_terminates() {
    let build = build(&[file(
        "rec.py",
        "def loop(v):\n    out = loop(v)\n    return out\n",
    )]);

    let mut graph = UnifiedGraph::build(
        &build.documents,
        &build.dfgs,
        &build.cfgs,
        &build.inter_proc,
    );
    graph.tag_source(&Variable::make_id("rec.loop", "v"), "PII");
    graph.tag_sink(&Variable::make_id("rec.loop", "out"), "PII");

    let config = TaintConfig {
        max_depth: 10,
        max_paths: 5,
        ..Default::default()
    };
    let result = TaintTracer::new(&graph).trace(&config);
    // Terminates; whether a path exists depends on arg wiring, the cap
    // guarantees boundedness
    assert!(result.paths.len() <= 5);
}
