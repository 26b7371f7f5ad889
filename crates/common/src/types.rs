// Core domain types shared across all commitcast crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A repository identifier in `owner/name` form.
///
/// Parsed once at the config boundary so the rest of the pipeline can
/// assume a well-formed id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    owner: String,
    name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid repository id `{0}`: expected owner/name")]
pub struct RepoIdError(pub String);

impl RepoId {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepoId {
    type Err = RepoIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self { owner: owner.to_string(), name: name.to_string() })
            }
            _ => Err(RepoIdError(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepoId {
    type Error = RepoIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A single commit as reported by the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    /// Abbreviated commit id (first 7 characters).
    pub short_id: String,
    pub full_id: String,
    pub message: String,
    pub author: String,
    pub author_email: String,
    pub authored_at: DateTime<Utc>,
    /// Link to the commit on the hosting service.
    pub url: String,
    /// File-level changes; empty when the source omits them.
    #[serde(default)]
    pub files: Vec<FileChange>,
}

/// One changed file within a commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    pub additions: u32,
    pub deletions: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// The commits discovered in one fetch for one repository, in the order
/// the source returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    pub repo: RepoId,
    pub commits: Vec<Commit>,
}

impl CommitBatch {
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Durable per-repository sync progress marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub repo: RepoId,
    pub last_synced_at: DateTime<Utc>,
    /// Most recently processed commit, kept for diagnostics only.
    pub last_commit_id: Option<String>,
}

/// Result of one sync attempt for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The window was empty; checkpoint advanced, nothing delivered.
    NoNewCommits,
    /// A digest for `commits` new commits was delivered.
    Delivered { commits: usize },
}
