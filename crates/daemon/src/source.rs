// Commit source client: lists new commits for a repository.
//
// The orchestrator only sees the `CommitSource` trait; the GitHub REST
// implementation lives here. Commits with malformed fields are skipped
// with a warning rather than failing the whole fetch.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use commitcast_common::types::{ChangeKind, Commit, FileChange, RepoId};

/// Fetch failure, mapped from the hosting service's responses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("repository not found")]
    NotFound,
    #[error("access forbidden (check token permissions)")]
    Forbidden,
    #[error("rate limited by the source")]
    RateLimited,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unusable response: {0}")]
    InvalidResponse(String),
}

/// Abstraction over the commit listing API. Trait-based for testability.
pub trait CommitSource: Send + Sync {
    /// List commits strictly newer than `since`, oldest window the
    /// implementation defines when `since` is absent. Order is whatever
    /// the source returns, stable within one call.
    fn fetch(
        &self,
        repo: &RepoId,
        since: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<Vec<Commit>, SourceError>> + Send;
}

// ── GitHub implementation ───────────────────────────────────────────

const GITHUB_API_BASE: &str = "https://api.github.com";

pub struct GithubSource {
    client: reqwest::Client,
    base_url: String,
    token: String,
    /// Bounded recent window used when no checkpoint exists yet.
    page_size: u32,
}

impl GithubSource {
    pub fn new(client: reqwest::Client, token: impl Into<String>, page_size: u32) -> Self {
        Self { client, base_url: GITHUB_API_BASE.to_string(), token: token.into(), page_size }
    }

    /// Point at a non-default API base (enterprise installs, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn list(
        &self,
        repo: &RepoId,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Commit>, SourceError> {
        let url = format!("{}/repos/{repo}/commits", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "commitcast/0.1")
            .query(&[("per_page", limit.to_string())]);

        if !self.token.is_empty() {
            request = request.header("Authorization", format!("token {}", self.token));
        }
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }

        let response =
            request.send().await.map_err(|error| SourceError::Transport(error.to_string()))?;

        match response.status().as_u16() {
            200 => {}
            404 => return Err(SourceError::NotFound),
            403 => return Err(SourceError::Forbidden),
            429 => return Err(SourceError::RateLimited),
            status => {
                return Err(SourceError::Transport(format!("unexpected status {status}")));
            }
        }

        let payload: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|error| SourceError::InvalidResponse(error.to_string()))?;

        Ok(convert_commits(repo, payload))
    }
}

impl CommitSource for GithubSource {
    async fn fetch(
        &self,
        repo: &RepoId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Commit>, SourceError> {
        self.list(repo, since, self.page_size).await
    }
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    html_url: String,
    commit: ApiCommitDetail,
    #[serde(default)]
    files: Option<Vec<ApiFile>>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    message: String,
    author: Option<ApiAuthor>,
}

#[derive(Debug, Deserialize)]
struct ApiAuthor {
    name: String,
    email: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiFile {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u32,
    #[serde(default)]
    deletions: u32,
}

fn convert_commits(repo: &RepoId, payload: Vec<serde_json::Value>) -> Vec<Commit> {
    let mut commits = Vec::with_capacity(payload.len());

    for value in payload {
        // One malformed entry must not starve the repository; the rest
        // of the page still syncs.
        let raw: ApiCommit = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(repo = %repo, error = %error, "malformed commit entry, skipping");
                continue;
            }
        };

        let Some(author) = raw.commit.author else {
            warn!(repo = %repo, sha = %raw.sha, "commit missing author metadata, skipping");
            continue;
        };

        let short_id = raw.sha.chars().take(7).collect();
        let files = raw
            .files
            .unwrap_or_default()
            .into_iter()
            .map(|file| FileChange {
                path: file.filename,
                kind: parse_change_kind(&file.status),
                additions: file.additions,
                deletions: file.deletions,
            })
            .collect();

        commits.push(Commit {
            short_id,
            full_id: raw.sha,
            message: raw.commit.message,
            author: author.name,
            author_email: author.email,
            authored_at: author.date,
            url: raw.html_url,
            files,
        });
    }

    commits
}

fn parse_change_kind(status: &str) -> ChangeKind {
    match status {
        "added" => ChangeKind::Added,
        "removed" => ChangeKind::Removed,
        // renamed/copied/changed all read as modifications for digest
        // purposes.
        _ => ChangeKind::Modified,
    }
}
