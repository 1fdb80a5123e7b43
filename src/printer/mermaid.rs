//! Flow-diagram rendering in Mermaid flowchart syntax.
//!
//! Node identifiers are handed out in strict pre-order: each node's id is
//! reserved just before the node is visited, so a parent always has a
//! smaller id than everything beneath it. Scalar parameters (a timeout, a
//! limit, the filter's check) become rectangular nodes of their own hanging
//! off the combinator. Lines are indented two spaces per level.

use crate::job::{Job, OPTIONAL_LABEL, REQUIRED_LABEL, SUB_REPO_PERMISSIONS_LABEL};
use crate::printer::{IdAllocator, format_duration};

#[derive(Debug, Clone, Copy)]
enum Shape {
    Rounded,
    Rect,
}

/// Render `job` as a Mermaid flowchart. See <https://mermaid.js.org>.
pub fn mermaid(job: &Job) -> String {
    let mut writer = DiagramWriter {
        out: String::from("flowchart TB\n"),
        ids: IdAllocator::new(),
        depth: 0,
    };
    let root = writer.ids.allocate();
    writer.write(job, root);
    writer.out
}

struct DiagramWriter {
    out: String,
    ids: IdAllocator,
    depth: usize,
}

impl DiagramWriter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn node(&mut self, id: usize, shape: Shape, label: &str) {
        match shape {
            Shape::Rounded => self.line(&format!("{id}([{label}])")),
            Shape::Rect => self.line(&format!("{id}[{label}]")),
        }
    }

    fn edge(&mut self, from: usize, to: usize) {
        self.line(&format!("{from}---{to}"));
    }

    /// Emit a child job under `parent`.
    fn child(&mut self, parent: usize, job: &Job) {
        let id = self.ids.allocate();
        self.edge(parent, id);
        self.write(job, id);
    }

    /// Emit a scalar parameter node under `parent`.
    fn value(&mut self, parent: usize, label: &str) {
        let id = self.ids.allocate();
        self.edge(parent, id);
        self.node(id, Shape::Rect, label);
    }

    /// Emit a rounded label node under `parent` with `job` beneath it.
    fn labelled(&mut self, parent: usize, label: &str, job: &Job) {
        let id = self.ids.allocate();
        self.edge(parent, id);
        self.node(id, Shape::Rounded, label);
        self.child(id, job);
    }

    fn fan_out(&mut self, id: usize, keyword: &str, children: &[Job]) {
        self.node(id, Shape::Rounded, keyword);
        self.depth += 1;
        for child in children {
            self.child(id, child);
        }
        self.depth -= 1;
    }

    fn write(&mut self, job: &Job, id: usize) {
        match job {
            Job::Leaf(_) | Job::NoOp => self.node(id, Shape::Rounded, job.name()),
            Job::And(and) => self.fan_out(id, job.name(), and.children()),
            Job::Or(or) => self.fan_out(id, job.name(), or.children()),
            Job::Parallel(parallel) => self.fan_out(id, job.name(), parallel.children()),
            Job::Priority(priority) => {
                self.node(id, Shape::Rounded, job.name());
                self.depth += 1;
                self.labelled(id, REQUIRED_LABEL, priority.required());
                self.labelled(id, OPTIONAL_LABEL, priority.optional());
                self.depth -= 1;
            }
            Job::Timeout(timeout) => {
                self.node(id, Shape::Rounded, job.name());
                self.depth += 1;
                self.value(id, &format_duration(timeout.duration()));
                self.child(id, timeout.child());
                self.depth -= 1;
            }
            Job::Limit(limit) => {
                self.node(id, Shape::Rounded, job.name());
                self.depth += 1;
                self.value(id, &limit.limit().to_string());
                self.child(id, limit.child());
                self.depth -= 1;
            }
            Job::Filter(filter) => {
                self.node(id, Shape::Rounded, job.name());
                self.depth += 1;
                self.value(id, SUB_REPO_PERMISSIONS_LABEL);
                self.child(id, filter.child());
                self.depth -= 1;
            }
        }
    }
}
