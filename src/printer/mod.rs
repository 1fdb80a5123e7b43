//! Human-readable renderings of a search plan.
//!
//! All printers are pure functions of a [`Job`] tree and never look at
//! execution state. Every printer matches on the full set of node kinds, so a
//! new kind of node cannot be added without teaching the printers about it.

mod duration;
mod mermaid;
mod sexp;

use serde::Serialize;

use crate::job::Job;

pub use duration::format_duration;
pub use mermaid::mermaid;
pub use sexp::{pretty_sexp, sexp, sexp_format};

/// Hands out node identifiers in the order they are requested.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: usize,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next unused identifier.
    pub fn allocate(&mut self) -> usize {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Every rendering of one plan, for explain-plan views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explain {
    pub sexp: String,
    pub pretty_sexp: String,
    pub mermaid: String,
}

impl Explain {
    pub fn new(job: &Job) -> Self {
        Self {
            sexp: sexp(job),
            pretty_sexp: pretty_sexp(job),
            mermaid: mermaid(job),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ScriptedJob;

    #[test]
    fn ids_are_sequential() {
        let mut ids = IdAllocator::new();
        assert_eq!((ids.allocate(), ids.allocate(), ids.allocate()), (0, 1, 2));
    }

    #[test]
    fn explain_bundles_all_renderings() {
        let job = Job::and([
            Job::leaf(ScriptedJob::new("a")),
            Job::leaf(ScriptedJob::new("b")),
        ]);
        let explain = Explain::new(&job);
        assert_eq!(explain.sexp, "(AND a b)");
        assert_eq!(explain.pretty_sexp, "(AND\n  a\n  b)");
        assert!(explain.mermaid.starts_with("flowchart TB\n"));

        let json = serde_json::to_value(&explain).unwrap();
        assert_eq!(json["sexp"], "(AND a b)");
    }
}
