//! Viewer permission checks applied by `FILTER` nodes.
//!
//! Sub-repository permissions hide individual paths inside a repository the
//! viewer can otherwise see. Matches that are not file-scoped (repository and
//! commit matches) are never hidden by these rules.

use std::collections::HashMap;

use regex::Regex;

use crate::error::ConfigError;
use crate::result::SearchMatch;

/// Decides whether the current viewer may see a match.
///
/// Implementations must be pure: the same match always yields the same answer
/// for the lifetime of the checker.
pub trait PermissionChecker: Send + Sync {
    fn allowed(&self, m: &SearchMatch) -> bool;
}

/// Checker for viewers with no sub-repository restrictions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn allowed(&self, _m: &SearchMatch) -> bool {
        true
    }
}

/// Per-repository path deny rules for one viewer.
#[derive(Debug, Clone, Default)]
pub struct SubRepoPermissions {
    denied: HashMap<String, Vec<Regex>>,
}

impl SubRepoPermissions {
    pub fn builder() -> SubRepoPermissionsBuilder {
        SubRepoPermissionsBuilder::default()
    }

    /// Whether any rules apply to `repo`.
    pub fn restricts(&self, repo: &str) -> bool {
        self.denied.get(repo).is_some_and(|rules| !rules.is_empty())
    }
}

impl PermissionChecker for SubRepoPermissions {
    fn allowed(&self, m: &SearchMatch) -> bool {
        let Some(path) = m.path.as_deref() else {
            return true;
        };
        match self.denied.get(&m.repo) {
            Some(rules) => !rules.iter().any(|re| re.is_match(path)),
            None => true,
        }
    }
}

/// Collects deny patterns and compiles them into [`SubRepoPermissions`].
#[derive(Debug, Default)]
pub struct SubRepoPermissionsBuilder {
    rules: Vec<(String, String)>,
}

impl SubRepoPermissionsBuilder {
    /// Deny every path in `repo` matching the regular expression `pattern`.
    pub fn deny(mut self, repo: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.rules.push((repo.into(), pattern.into()));
        self
    }

    pub fn build(self) -> Result<SubRepoPermissions, ConfigError> {
        let mut denied: HashMap<String, Vec<Regex>> = HashMap::new();
        for (repo, pattern) in self.rules {
            let re = Regex::new(&pattern).map_err(|e| ConfigError::InvalidValue {
                key: format!("sub-repo rule for {repo}"),
                message: e.to_string(),
            })?;
            denied.entry(repo).or_default().push(re);
        }
        Ok(SubRepoPermissions { denied })
    }
}
