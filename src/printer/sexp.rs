//! S-expression rendering.
//!
//! Terminals render as their name; combinators as `(KEYWORD term...)`.
//! `TIMEOUT` and `LIMIT` put their parameter before the child, `FILTER` names
//! the permission check, and `PRIORITY` wraps its branches in `(REQUIRED ...)`
//! and `(OPTIONAL ...)` groups.

use crate::job::{Job, OPTIONAL_LABEL, REQUIRED_LABEL, SUB_REPO_PERMISSIONS_LABEL};
use crate::printer::format_duration;

/// Render `job` with `sep` between terms. When `indent` is non-empty it is
/// repeated once per nesting level after every separator.
pub fn sexp_format(job: &Job, sep: &str, indent: &str) -> String {
    let mut writer = SexpWriter {
        out: String::new(),
        sep,
        indent,
        depth: 0,
    };
    writer.write(job);
    writer.out
}

/// Single-line form: `(AND a b)`.
pub fn sexp(job: &Job) -> String {
    sexp_format(job, " ", "")
}

/// Multi-line form with two spaces of indentation per level.
pub fn pretty_sexp(job: &Job) -> String {
    sexp_format(job, "\n", "  ")
}

struct SexpWriter<'a> {
    out: String,
    sep: &'a str,
    indent: &'a str,
    depth: usize,
}

impl SexpWriter<'_> {
    fn separator(&mut self) {
        self.out.push_str(self.sep);
        if !self.indent.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(self.indent);
            }
        }
    }

    fn open(&mut self, keyword: &str) {
        self.out.push('(');
        self.out.push_str(keyword);
        self.depth += 1;
    }

    fn close(&mut self) {
        self.out.push(')');
        self.depth -= 1;
    }

    fn term(&mut self, text: &str) {
        self.separator();
        self.out.push_str(text);
    }

    fn child(&mut self, job: &Job) {
        self.separator();
        self.write(job);
    }

    fn group(&mut self, keyword: &str, children: &[Job]) {
        self.open(keyword);
        for child in children {
            self.child(child);
        }
        self.close();
    }

    fn labelled(&mut self, label: &str, job: &Job) {
        self.separator();
        self.open(label);
        self.child(job);
        self.close();
    }

    fn write(&mut self, job: &Job) {
        match job {
            Job::Leaf(_) | Job::NoOp => self.out.push_str(job.name()),
            Job::And(and) => self.group(job.name(), and.children()),
            Job::Or(or) => self.group(job.name(), or.children()),
            Job::Parallel(parallel) => self.group(job.name(), parallel.children()),
            Job::Priority(priority) => {
                self.open(job.name());
                self.labelled(REQUIRED_LABEL, priority.required());
                self.labelled(OPTIONAL_LABEL, priority.optional());
                self.close();
            }
            Job::Timeout(timeout) => {
                self.open(job.name());
                self.term(&format_duration(timeout.duration()));
                self.child(timeout.child());
                self.close();
            }
            Job::Limit(limit) => {
                self.open(job.name());
                self.term(&limit.limit().to_string());
                self.child(limit.child());
                self.close();
            }
            Job::Filter(filter) => {
                self.open(job.name());
                self.term(SUB_REPO_PERMISSIONS_LABEL);
                self.child(filter.child());
                self.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::job::ScriptedJob;
    use crate::permissions::AllowAll;

    fn leaf(name: &str) -> Job {
        Job::leaf(ScriptedJob::new(name))
    }

    fn priority_plan() -> Job {
        Job::priority(
            leaf("textsearch"),
            Job::timeout(Duration::from_millis(50), leaf("symbolsearch")),
        )
    }

    #[test]
    fn single_line_priority() {
        assert_eq!(
            sexp(&priority_plan()),
            "(PRIORITY (REQUIRED textsearch) (OPTIONAL (TIMEOUT 50ms symbolsearch)))"
        );
    }

    #[test]
    fn pretty_priority() {
        let expected = "(PRIORITY\n  (REQUIRED\n    textsearch)\n  (OPTIONAL\n    (TIMEOUT\n      50ms\n      symbolsearch)))";
        assert_eq!(pretty_sexp(&priority_plan()), expected);
    }

    #[test]
    fn limit_and_filter_parameters() {
        let job = Job::filter(
            Arc::new(AllowAll),
            Job::limit(3, Job::parallel([leaf("a"), leaf("b")])).unwrap(),
        );
        assert_eq!(
            sexp(&job),
            "(FILTER SubRepoPermissions (LIMIT 3 (PARALLEL a b)))"
        );
    }

    #[test]
    fn terminals_render_bare() {
        assert_eq!(sexp(&Job::noop()), "NoopJob");
        assert_eq!(sexp(&leaf("commitsearch")), "commitsearch");
    }

    #[test]
    fn custom_separator_without_indent() {
        let job = Job::or([leaf("a"), Job::and([leaf("b"), leaf("c")])]);
        assert_eq!(sexp_format(&job, ",", ""), "(OR,a,(AND,b,c))");
    }
}
