// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).
use std::collections::BTreeSet;
use std::path::PathBuf;

use hashing::Fingerprint;
use maplit::btreeset;

use crate::{
    ChangedNodes, DeclAspect, DependencyKey, Designator, IntegrationResult, ModuleDepGraph, Node,
    NodeFinder, Provider, Summary, SummaryDef,
};

fn top_level(name: &str) -> DependencyKey {
    DependencyKey::new(
        DeclAspect::Interface,
        Designator::TopLevel {
            name: name.to_owned(),
        },
    )
}

fn src(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}.swift"))
}

fn prov(name: &str) -> Provider {
    Provider::new(format!("{name}.deps.yaml"))
}

fn def(name: &str, fingerprint: &str) -> SummaryDef {
    SummaryDef {
        key: top_level(name),
        fingerprint: Some(Fingerprint::of_bytes(fingerprint.as_bytes())),
    }
}

/// A summary as a compile would write it, with the file's own def listed explicitly.
fn file_summary(name: &str, defines: Vec<SummaryDef>, uses: Vec<DependencyKey>) -> Summary {
    let mut all = vec![SummaryDef {
        key: DependencyKey::source_file(src(name)),
        fingerprint: None,
    }];
    all.extend(defines);
    Summary { defines: all, uses }
}

fn integrate(graph: &mut ModuleDepGraph, name: &str, summary: &Summary) -> ChangedNodes {
    graph.integrate(&prov(name), &src(name), summary).unwrap()
}

fn dump(graph: &ModuleDepGraph) -> (BTreeSet<String>, BTreeSet<String>) {
    let nodes = graph
        .finder
        .iter()
        .map(|(_, node)| format!("{node} {:?}", node.fingerprint()))
        .collect();
    let edges = graph
        .finder
        .use_edges()
        .map(|(key, user)| format!("{key} <- {}", graph.finder.node(user)))
        .collect();
    (nodes, edges)
}

#[test]
fn insert_rejects_duplicate_key_and_provider() {
    let mut finder = NodeFinder::new();
    let node = Node::new(top_level("a"), None, Some(prov("A")));
    finder.insert(node.clone()).unwrap();
    finder.insert(node).expect_err("Want err");

    let expectation = Node::expectation(top_level("a"));
    finder.insert(expectation.clone()).unwrap();
    finder.insert(expectation).expect_err("Want err");
    finder.verify().unwrap();
}

#[test]
fn integrating_a_fresh_summary_adds_its_defs() {
    let mut graph = ModuleDepGraph::new();
    let summary = file_summary("A", vec![def("a", "1")], vec![]);
    let changed = integrate(&mut graph, "A", &summary);
    assert_eq!(
        changed.stats(),
        IntegrationResult {
            added: 2,
            changed: 0,
            removed: 0
        }
    );

    // The provider's nodes are exactly the defs the summary listed.
    let keys: BTreeSet<_> = graph.finder.nodes_for(&prov("A")).into_keys().collect();
    let expected: BTreeSet<_> = summary.defines.iter().map(|d| d.key.clone()).collect();
    assert_eq!(keys, expected);
    graph.verify().unwrap();
}

#[test]
fn reintegrating_an_identical_summary_changes_nothing() {
    let mut graph = ModuleDepGraph::new();
    let summary = Summary {
        defines: vec![def("a", "1")],
        uses: vec![top_level("b")],
    };
    integrate(&mut graph, "A", &summary);
    let changed = integrate(&mut graph, "A", &summary);
    assert!(changed.is_empty(), "{changed:?}");
    graph.verify().unwrap();
}

#[test]
fn integration_reports_fingerprint_changes_and_removals() {
    let mut graph = ModuleDepGraph::new();
    integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "1"), def("b", "1")],
            uses: vec![],
        },
    );
    let changed = integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "2")],
            uses: vec![],
        },
    );
    assert_eq!(
        changed.stats(),
        IntegrationResult {
            added: 0,
            changed: 1,
            removed: 1
        }
    );
    assert!(graph.find_node(&top_level("a"), Some(&prov("A"))).is_some());
    assert!(graph.find_node(&top_level("b"), Some(&prov("A"))).is_none());
    graph.verify().unwrap();
}

#[test]
fn uses_create_expectation_nodes() {
    let mut graph = ModuleDepGraph::new();
    integrate(
        &mut graph,
        "main",
        &Summary {
            defines: vec![],
            uses: vec![top_level("a")],
        },
    );
    let expectation = graph.find_node(&top_level("a"), None).unwrap();
    assert!(graph.node(expectation).is_expectation());
    graph.verify().unwrap();
}

#[test]
fn external_uses_are_tracked() {
    let mut graph = ModuleDepGraph::new();
    integrate(
        &mut graph,
        "B",
        &Summary {
            defines: vec![def("b", "1")],
            uses: vec![DependencyKey::external("Other.module")],
        },
    );
    let externals: Vec<_> = graph.external_dependencies().cloned().collect();
    assert_eq!(externals, vec![PathBuf::from("Other.module")]);
}

fn three_file_module() -> ModuleDepGraph {
    let mut graph = ModuleDepGraph::new();
    integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "1")],
            uses: vec![],
        },
    );
    integrate(
        &mut graph,
        "B",
        &Summary {
            defines: vec![def("b", "1")],
            uses: vec![top_level("a")],
        },
    );
    integrate(
        &mut graph,
        "C",
        &Summary {
            defines: vec![],
            uses: vec![top_level("b")],
        },
    );
    graph
}

#[test]
fn tracing_reaches_transitive_users_in_declared_order() {
    let mut graph = three_file_module();
    // Refingerprint `a`; B uses it directly and C uses it through `b`.
    let changed = integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "2")],
            uses: vec![],
        },
    );
    let users = graph.find_untraced_users(&changed);
    let providers: Vec<_> = users
        .iter()
        .filter_map(|&id| graph.node(id).provider().cloned())
        .collect();
    assert_eq!(providers, vec![prov("A"), prov("B"), prov("B"), prov("C")]);
    assert_eq!(
        graph.providers_of(&users),
        btreeset![prov("A"), prov("B"), prov("C")]
    );
    graph.verify().unwrap();
}

#[test]
fn tracing_is_idempotent() {
    let mut graph = three_file_module();
    let changed = integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "2")],
            uses: vec![],
        },
    );
    assert!(!graph.find_untraced_users(&changed).is_empty());
    // Everything reachable is now traced: tracing the same set again finds no new work.
    assert!(graph.find_untraced_users(&changed).is_empty());
}

#[test]
fn tracing_breaks_cycles() {
    let mut graph = ModuleDepGraph::new();
    integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "1")],
            uses: vec![top_level("b")],
        },
    );
    integrate(
        &mut graph,
        "B",
        &Summary {
            defines: vec![def("b", "1")],
            uses: vec![top_level("a")],
        },
    );
    let changed = integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "2")],
            uses: vec![top_level("b")],
        },
    );
    assert_eq!(
        graph.find_sources_to_recompile(&changed),
        btreeset![prov("A"), prov("B")]
    );
}

#[test]
fn a_changed_def_untraces_its_users_but_not_itself() {
    let mut graph = ModuleDepGraph::new();
    integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "1")],
            uses: vec![],
        },
    );
    integrate(
        &mut graph,
        "B",
        &Summary {
            defines: vec![],
            uses: vec![top_level("a")],
        },
    );
    let changed = integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "2")],
            uses: vec![],
        },
    );
    graph.find_untraced_users(&changed);

    let a_def = graph.find_node(&top_level("a"), Some(&prov("A"))).unwrap();
    let b_anchor = graph
        .find_node(&DependencyKey::source_file(src("B")), Some(&prov("B")))
        .unwrap();
    assert!(graph.is_traced(a_def));
    assert!(graph.is_traced(b_anchor));

    // Changing `a` again re-opens its users, but the def itself stays traced: the work its
    // earlier trace implied was already scheduled.
    let changed = integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "3")],
            uses: vec![],
        },
    );
    assert!(graph.is_traced(a_def));
    assert!(!graph.is_traced(b_anchor));
    assert!(graph.find_untraced_users(&changed).is_empty());
    graph.verify().unwrap();
}

#[test]
fn removed_defs_seed_their_users() {
    let mut graph = ModuleDepGraph::new();
    integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "1")],
            uses: vec![],
        },
    );
    integrate(
        &mut graph,
        "B",
        &Summary {
            defines: vec![],
            uses: vec![top_level("a")],
        },
    );
    let changed = integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![],
            uses: vec![],
        },
    );
    assert_eq!(changed.stats().removed, 1);
    assert_eq!(
        graph.find_sources_to_recompile(&changed),
        btreeset![prov("B")]
    );
    graph.verify().unwrap();
}

#[test]
fn integration_order_is_commutative() {
    let summaries = [
        (
            "A",
            Summary {
                defines: vec![def("a", "1")],
                uses: vec![top_level("b")],
            },
        ),
        (
            "B",
            Summary {
                defines: vec![def("b", "1")],
                uses: vec![DependencyKey::external("Other.module")],
            },
        ),
        (
            "main",
            Summary {
                defines: vec![],
                uses: vec![top_level("a"), top_level("b")],
            },
        ),
    ];

    let mut forward = ModuleDepGraph::new();
    for (name, summary) in &summaries {
        integrate(&mut forward, name, summary);
    }
    let mut backward = ModuleDepGraph::new();
    for (name, summary) in summaries.iter().rev() {
        integrate(&mut backward, name, summary);
    }

    assert_eq!(dump(&forward), dump(&backward));
    forward.verify().unwrap();
    backward.verify().unwrap();
}

#[test]
fn summary_yaml_fixture_parses() {
    let summary = Summary::parse(
        r#"
defines:
  - key:
      aspect: interface
      designator: !top-level
        name: a
    fingerprint: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa
uses:
  - aspect: implementation
    designator: !member
      context: S
      name: m
"#,
    )
    .unwrap();

    assert_eq!(summary.defines.len(), 1);
    assert_eq!(summary.defines[0].key, top_level("a"));
    assert_eq!(
        summary.uses,
        vec![DependencyKey::new(
            DeclAspect::Implementation,
            Designator::Member {
                context: "S".to_owned(),
                name: "m".to_owned(),
            },
        )]
    );
}

#[test]
fn summary_round_trips_through_a_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("A.deps.yaml");
    let summary = file_summary(
        "A",
        vec![def("a", "1")],
        vec![top_level("b"), DependencyKey::external("Other.module")],
    );
    summary.write(&path).unwrap();
    assert_eq!(Summary::read(&path).unwrap(), summary);
}

#[test]
fn summary_parse_rejects_garbage() {
    Summary::parse("defines: 3").expect_err("Want err");
    Summary::parse("defines:\n  - key: 7\n").expect_err("Want err");
}

#[test]
fn dot_rendering_includes_nodes() {
    let mut graph = three_file_module();
    let changed = integrate(
        &mut graph,
        "A",
        &Summary {
            defines: vec![def("a", "2")],
            uses: vec![],
        },
    );
    graph.find_untraced_users(&changed);

    let mut out = Vec::new();
    graph.emit_dot(&mut out).unwrap();
    let rendered = String::from_utf8(out).unwrap();
    assert!(rendered.starts_with("digraph"), "{rendered}");
    assert!(rendered.contains("top-level a"), "{rendered}");
    assert!(rendered.contains("(traced)"), "{rendered}");
}
