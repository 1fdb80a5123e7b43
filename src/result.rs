//! Match events streamed out of a running job tree.

use serde::{Deserialize, Serialize};

/// What a match points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Content,
    Symbol,
    Path,
    Repo,
    Commit,
}

/// A single search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// Repository the match belongs to.
    pub repo: String,
    /// File path inside the repository, if the match is file-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// 1-based line number for content and symbol matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub kind: MatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl SearchMatch {
    /// A repository-level match.
    pub fn repo(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            path: None,
            line: None,
            kind: MatchKind::Repo,
            preview: None,
        }
    }

    /// A file path match.
    pub fn path(repo: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            path: Some(path.into()),
            line: None,
            kind: MatchKind::Path,
            preview: None,
        }
    }

    /// A line of file content.
    pub fn content(
        repo: impl Into<String>,
        path: impl Into<String>,
        line: u32,
        preview: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            path: Some(path.into()),
            line: Some(line),
            kind: MatchKind::Content,
            preview: Some(preview.into()),
        }
    }

    /// A symbol definition.
    pub fn symbol(
        repo: impl Into<String>,
        path: impl Into<String>,
        line: u32,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            path: Some(path.into()),
            line: Some(line),
            kind: MatchKind::Symbol,
            preview: Some(symbol.into()),
        }
    }
}

/// A batch of matches delivered to a sink in one send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEvent {
    pub matches: Vec<SearchMatch>,
}

impl SearchEvent {
    pub fn new(matches: Vec<SearchMatch>) -> Self {
        Self { matches }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl From<Vec<SearchMatch>> for SearchEvent {
    fn from(matches: Vec<SearchMatch>) -> Self {
        Self::new(matches)
    }
}
