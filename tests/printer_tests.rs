//! Integration tests for the plan printers.

use std::sync::Arc;
use std::time::Duration;

use search_job::job::{Job, ScriptedJob};
use search_job::permissions::AllowAll;
use search_job::printer::{Explain, format_duration, mermaid, pretty_sexp, sexp, sexp_format};

fn leaf(name: &str) -> Job {
    Job::leaf(ScriptedJob::new(name))
}

/// One of every node kind, nested.
fn kitchen_sink() -> Job {
    Job::filter(
        Arc::new(AllowAll),
        Job::limit(
            25,
            Job::parallel([
                Job::and([leaf("a"), leaf("b")]),
                Job::or([leaf("c"), Job::noop()]),
                Job::priority(
                    leaf("d"),
                    Job::timeout(Duration::from_millis(1500), leaf("e")),
                ),
            ]),
        )
        .unwrap(),
    )
}

fn count_priorities(job: &Job) -> usize {
    let own = usize::from(matches!(job, Job::Priority(_)));
    own + job.children().into_iter().map(count_priorities).sum::<usize>()
}

fn count_combinators(job: &Job) -> usize {
    let own = usize::from(job.is_combinator());
    own + job.children().into_iter().map(count_combinators).sum::<usize>()
}

/// Nodes with a scalar parameter rendered as its own diagram node.
fn count_parameters(job: &Job) -> usize {
    let own = usize::from(matches!(job, Job::Timeout(_) | Job::Limit(_) | Job::Filter(_)));
    own + job.children().into_iter().map(count_parameters).sum::<usize>()
}

#[test]
fn priority_with_timeout_renders_exactly() {
    let job = Job::priority(
        leaf("textsearch"),
        Job::timeout(Duration::from_millis(50), leaf("symbolsearch")),
    );
    assert_eq!(
        sexp(&job),
        "(PRIORITY (REQUIRED textsearch) (OPTIONAL (TIMEOUT 50ms symbolsearch)))"
    );
}

#[test]
fn limit_over_parallel_diagram_counts() {
    let job = Job::limit(3, Job::parallel([leaf("a"), leaf("b")])).unwrap();
    let diagram = mermaid(&job);
    let lines: Vec<&str> = diagram.lines().map(str::trim).collect();

    assert_eq!(lines[0], "flowchart TB");
    let nodes: Vec<&str> = lines[1..].iter().copied().filter(|l| !l.contains("---")).collect();
    let edges: Vec<&str> = lines[1..].iter().copied().filter(|l| l.contains("---")).collect();

    assert_eq!(nodes, vec!["0([LIMIT])", "1[3]", "2([PARALLEL])", "3([a])", "4([b])"]);
    assert_eq!(edges, vec!["0---1", "0---2", "2---3", "2---4"]);
}

#[test]
fn parentheses_balance_for_every_kind() {
    let job = kitchen_sink();
    for rendered in [sexp(&job), pretty_sexp(&job), sexp_format(&job, "|", "\t")] {
        let mut depth = 0i32;
        let mut opens = 0usize;
        for ch in rendered.chars() {
            match ch {
                '(' => {
                    depth += 1;
                    opens += 1;
                }
                ')' => {
                    depth -= 1;
                    assert!(depth >= 0, "unbalanced: {rendered}");
                }
                _ => {}
            }
        }
        assert_eq!(depth, 0);
        // PRIORITY adds a REQUIRED and an OPTIONAL group.
        assert_eq!(opens, count_combinators(&job) + 2 * count_priorities(&job));
    }
}

#[test]
fn every_kind_appears_in_renderings() {
    let job = kitchen_sink();
    let text = sexp(&job);
    let diagram = mermaid(&job);
    for keyword in [
        "FILTER", "LIMIT", "PARALLEL", "AND", "OR", "PRIORITY", "REQUIRED", "OPTIONAL", "TIMEOUT",
        "NoopJob", "SubRepoPermissions", "25", "1.5s",
    ] {
        assert!(text.contains(keyword), "sexp missing {keyword}: {text}");
        assert!(diagram.contains(keyword), "diagram missing {keyword}");
    }
}

#[test]
fn diagram_ids_are_preorder() {
    let job = kitchen_sink();
    let diagram = mermaid(&job);

    let node_ids: Vec<usize> = diagram
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.contains("---"))
        .map(|l| l[..l.find(['(', '[']).unwrap()].parse().unwrap())
        .collect();
    let expected: Vec<usize> = (0..node_ids.len()).collect();
    assert_eq!(node_ids, expected);

    for edge in diagram.lines().map(str::trim).filter(|l| l.contains("---")) {
        let (from, to) = edge.split_once("---").unwrap();
        let (from, to): (usize, usize) = (from.parse().unwrap(), to.parse().unwrap());
        assert!(from < to, "edge {edge} points backwards");
    }
}

#[test]
fn diagram_has_one_edge_per_non_root_node() {
    let job = kitchen_sink();
    let diagram = mermaid(&job);
    let nodes = diagram.lines().skip(1).filter(|l| !l.contains("---")).count();
    let edges = diagram.lines().filter(|l| l.contains("---")).count();

    // Job nodes, one parameter node per TIMEOUT/LIMIT/FILTER, and the two
    // branch labels of every PRIORITY.
    let expected = job.node_count() + count_parameters(&job) + 2 * count_priorities(&job);
    assert_eq!(nodes, expected);
    assert_eq!(edges, nodes - 1);
}

#[test]
fn pretty_form_indents_by_depth() {
    let job = Job::and([leaf("a"), Job::or([leaf("b"), leaf("c")])]);
    assert_eq!(pretty_sexp(&job), "(AND\n  a\n  (OR\n    b\n    c))");
}

#[test]
fn explain_matches_individual_printers() {
    let job = kitchen_sink();
    let explain = Explain::new(&job);
    assert_eq!(explain.sexp, sexp(&job));
    assert_eq!(explain.pretty_sexp, pretty_sexp(&job));
    assert_eq!(explain.mermaid, mermaid(&job));
    assert_eq!(job.to_string(), explain.sexp);
}

#[test]
fn durations_use_compact_units() {
    assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
    assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
    assert_eq!(format_duration(Duration::ZERO), "0s");
}
