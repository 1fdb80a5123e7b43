//! Search job trees.
//!
//! A [`Job`] is an immutable tree of combinators over leaf searches. Trees are
//! built once by a query planner, then executed by
//! [`Executor`](crate::execution::Executor) and rendered by the
//! [`printer`](crate::printer) functions. Nodes are owned by exactly one
//! parent, so a tree can never contain a cycle.
//!
//! - `leaf`: the [`SearchJob`] capability every terminal search implements
//! - `scripted`: an in-memory leaf that replays a fixed script

pub mod leaf;
pub mod scripted;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PlanError;
use crate::permissions::PermissionChecker;

pub use leaf::SearchJob;
pub use scripted::{ScriptProbe, ScriptedJob};

/// Name reported by [`Job::NoOp`].
pub const NOOP_NAME: &str = "NoopJob";
/// Branch label for the required side of a `PRIORITY` node.
pub const REQUIRED_LABEL: &str = "REQUIRED";
/// Branch label for the optional side of a `PRIORITY` node.
pub const OPTIONAL_LABEL: &str = "OPTIONAL";
/// Label identifying the permission check performed by `FILTER` nodes.
pub const SUB_REPO_PERMISSIONS_LABEL: &str = "SubRepoPermissions";

/// One node of a search plan.
pub enum Job {
    /// A terminal search against a backend.
    Leaf(Arc<dyn SearchJob>),
    /// A terminal placeholder that succeeds without results.
    NoOp,
    And(AndJob),
    Or(OrJob),
    Priority(PriorityJob),
    Parallel(ParallelJob),
    Timeout(TimeoutJob),
    Limit(LimitJob),
    Filter(FilterJob),
}

/// All children must succeed.
pub struct AndJob {
    children: Vec<Job>,
}

/// At least one child must succeed.
pub struct OrJob {
    children: Vec<Job>,
}

/// `required` decides the outcome; `optional` is best-effort.
pub struct PriorityJob {
    required: Box<Job>,
    optional: Box<Job>,
}

/// Independent children with no success coupling.
pub struct ParallelJob {
    children: Vec<Job>,
}

/// Bounds the wall-clock time of `child`.
pub struct TimeoutJob {
    duration: Duration,
    child: Box<Job>,
}

/// Bounds the number of matches `child` may contribute.
pub struct LimitJob {
    limit: NonZeroUsize,
    child: Box<Job>,
}

/// Hides matches the viewer may not see.
pub struct FilterJob {
    checker: Arc<dyn PermissionChecker>,
    child: Box<Job>,
}

impl AndJob {
    pub fn children(&self) -> &[Job] {
        &self.children
    }
}

impl OrJob {
    pub fn children(&self) -> &[Job] {
        &self.children
    }
}

impl ParallelJob {
    pub fn children(&self) -> &[Job] {
        &self.children
    }
}

impl PriorityJob {
    pub fn required(&self) -> &Job {
        &self.required
    }

    pub fn optional(&self) -> &Job {
        &self.optional
    }
}

impl TimeoutJob {
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn child(&self) -> &Job {
        &self.child
    }
}

impl LimitJob {
    pub fn limit(&self) -> usize {
        self.limit.get()
    }

    pub fn child(&self) -> &Job {
        &self.child
    }
}

impl FilterJob {
    pub fn checker(&self) -> &dyn PermissionChecker {
        self.checker.as_ref()
    }

    pub fn child(&self) -> &Job {
        &self.child
    }
}

impl Job {
    /// Wrap a leaf search.
    pub fn leaf(job: impl SearchJob + 'static) -> Self {
        Self::Leaf(Arc::new(job))
    }

    pub fn noop() -> Self {
        Self::NoOp
    }

    /// Conjunction of `children`. Zero children collapse to `NoOp` and a
    /// single child is returned as-is.
    pub fn and(children: impl IntoIterator<Item = Job>) -> Self {
        simplify(children.into_iter().collect(), |children| {
            Self::And(AndJob { children })
        })
    }

    /// Disjunction of `children`, collapsing like [`Job::and`].
    pub fn or(children: impl IntoIterator<Item = Job>) -> Self {
        simplify(children.into_iter().collect(), |children| {
            Self::Or(OrJob { children })
        })
    }

    /// Independent fan-out over `children`, collapsing like [`Job::and`].
    pub fn parallel(children: impl IntoIterator<Item = Job>) -> Self {
        simplify(children.into_iter().collect(), |children| {
            Self::Parallel(ParallelJob { children })
        })
    }

    /// Strict conjunction: always an `AND` node, rejecting no children.
    pub fn try_and(children: impl IntoIterator<Item = Job>) -> Result<Self, PlanError> {
        let children = non_empty("AND", children)?;
        Ok(Self::And(AndJob { children }))
    }

    /// Strict disjunction: always an `OR` node, rejecting no children.
    pub fn try_or(children: impl IntoIterator<Item = Job>) -> Result<Self, PlanError> {
        let children = non_empty("OR", children)?;
        Ok(Self::Or(OrJob { children }))
    }

    /// Strict fan-out: always a `PARALLEL` node, rejecting no children.
    pub fn try_parallel(children: impl IntoIterator<Item = Job>) -> Result<Self, PlanError> {
        let children = non_empty("PARALLEL", children)?;
        Ok(Self::Parallel(ParallelJob { children }))
    }

    pub fn priority(required: Job, optional: Job) -> Self {
        Self::Priority(PriorityJob {
            required: Box::new(required),
            optional: Box::new(optional),
        })
    }

    pub fn timeout(duration: Duration, child: Job) -> Self {
        Self::Timeout(TimeoutJob {
            duration,
            child: Box::new(child),
        })
    }

    pub fn limit(limit: usize, child: Job) -> Result<Self, PlanError> {
        let limit = NonZeroUsize::new(limit).ok_or(PlanError::ZeroLimit)?;
        Ok(Self::Limit(LimitJob {
            limit,
            child: Box::new(child),
        }))
    }

    pub fn filter(checker: Arc<dyn PermissionChecker>, child: Job) -> Self {
        Self::Filter(FilterJob {
            checker,
            child: Box::new(child),
        })
    }

    /// Stable name used in logs and printers. Combinators report their
    /// keyword, leaves their own name.
    pub fn name(&self) -> &str {
        match self {
            Self::Leaf(leaf) => leaf.name(),
            Self::NoOp => NOOP_NAME,
            Self::And(_) => "AND",
            Self::Or(_) => "OR",
            Self::Priority(_) => "PRIORITY",
            Self::Parallel(_) => "PARALLEL",
            Self::Timeout(_) => "TIMEOUT",
            Self::Limit(_) => "LIMIT",
            Self::Filter(_) => "FILTER",
        }
    }

    /// Whether this node is a combinator rather than a terminal.
    pub fn is_combinator(&self) -> bool {
        !matches!(self, Self::Leaf(_) | Self::NoOp)
    }

    /// Direct children in insertion order (`required` before `optional`).
    pub fn children(&self) -> Vec<&Job> {
        match self {
            Self::Leaf(_) | Self::NoOp => Vec::new(),
            Self::And(j) => j.children.iter().collect(),
            Self::Or(j) => j.children.iter().collect(),
            Self::Parallel(j) => j.children.iter().collect(),
            Self::Priority(j) => vec![&*j.required, &*j.optional],
            Self::Timeout(j) => vec![&*j.child],
            Self::Limit(j) => vec![&*j.child],
            Self::Filter(j) => vec![&*j.child],
        }
    }

    /// Number of job nodes in the tree, this one included.
    pub fn node_count(&self) -> usize {
        1 + self.children().into_iter().map(Job::node_count).sum::<usize>()
    }

    /// Number of terminal nodes in the tree.
    pub fn leaf_count(&self) -> usize {
        if self.is_combinator() {
            self.children().into_iter().map(Job::leaf_count).sum()
        } else {
            1
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::printer::sexp(self))
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job{}", crate::printer::sexp(self))
    }
}

fn simplify(mut children: Vec<Job>, build: impl FnOnce(Vec<Job>) -> Job) -> Job {
    match children.len() {
        0 => Job::NoOp,
        1 => children.remove(0),
        _ => build(children),
    }
}

fn non_empty(
    name: &'static str,
    children: impl IntoIterator<Item = Job>,
) -> Result<Vec<Job>, PlanError> {
    let children: Vec<Job> = children.into_iter().collect();
    if children.is_empty() {
        return Err(PlanError::EmptyCombinator { name });
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::AllowAll;

    fn leaf(name: &str) -> Job {
        Job::leaf(ScriptedJob::new(name))
    }

    #[test]
    fn constructors_collapse_trivial_combinators() {
        assert!(matches!(Job::and(Vec::new()), Job::NoOp));
        assert_eq!(Job::or([leaf("a")]).name(), "a");
        assert_eq!(Job::parallel([leaf("a"), leaf("b")]).name(), "PARALLEL");
    }

    #[test]
    fn strict_constructors_reject_empty() {
        assert_eq!(
            Job::try_and(Vec::new()).unwrap_err(),
            PlanError::EmptyCombinator { name: "AND" }
        );
        assert!(Job::try_or(Vec::new()).is_err());
        assert!(Job::try_parallel(Vec::new()).is_err());
        assert_eq!(Job::try_and([leaf("a")]).unwrap().name(), "AND");
    }

    #[test]
    fn limit_rejects_zero() {
        assert_eq!(Job::limit(0, leaf("a")).unwrap_err(), PlanError::ZeroLimit);
    }

    #[test]
    fn counts_nodes_and_leaves() {
        let job = Job::priority(
            Job::and([leaf("a"), leaf("b")]),
            Job::filter(
                Arc::new(AllowAll),
                Job::timeout(Duration::from_secs(1), Job::noop()),
            ),
        );
        assert_eq!(job.node_count(), 7);
        assert_eq!(job.leaf_count(), 3);
    }

    #[test]
    fn children_keep_insertion_order() {
        let job = Job::and([leaf("x"), leaf("y"), leaf("z")]);
        let names: Vec<_> = job.children().into_iter().map(Job::name).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn display_is_single_line_sexp() {
        let job = Job::or([leaf("a"), leaf("b")]);
        assert_eq!(job.to_string(), "(OR a b)");
    }
}
