// Commit digest generation.
//
// Calls an OpenAI-compatible chat endpoint with a rendered commit batch
// to produce a short natural-language digest. When the LLM is
// unreachable the orchestrator can fall back to `plain_digest`, a
// deterministic listing that keeps the notification flowing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use commitcast_common::types::{ChangeKind, CommitBatch, RepoId};

/// System prompt instructing the model to digest a commit batch.
pub const SYSTEM_PROMPT: &str = "\
You are a release-notes assistant. Summarize a batch of source-control \
commits for a team chat channel.\n\
Rules:\n\
- Group the changes: features, fixes, refactors, other\n\
- Order groups by importance; omit empty groups\n\
- Keep the whole digest under 15 lines, plain text, no markdown tables\n\
- Mention commit ids only when it disambiguates\n\
- Output ONLY the digest, nothing else";

/// Maximum file entries rendered per commit before eliding the rest.
const MAX_FILES_PER_COMMIT: usize = 5;

/// Commits listed in the deterministic fallback digest.
const FALLBACK_COMMIT_LINES: usize = 3;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SummarizeError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unusable response: {0}")]
    InvalidResponse(String),
    #[error("model returned an empty digest")]
    Empty,
}

/// Abstraction over the digest backend. Trait-based for testability.
pub trait Summarizer: Send + Sync {
    fn summarize(
        &self,
        batch: &CommitBatch,
    ) -> impl std::future::Future<Output = Result<String, SummarizeError>> + Send;
}

// ── Prompt rendering ────────────────────────────────────────────────

/// Render the batch for the model: one block per commit with id, author,
/// date, message, and up to five changed files.
pub fn build_prompt(batch: &CommitBatch) -> String {
    let mut prompt =
        format!("Repository: {}\nCommits ({}):\n", batch.repo, batch.len());

    for commit in &batch.commits {
        prompt.push_str(&format!(
            "\n---\nid: {}\nauthor: {}\ndate: {}\nmessage: {}\n",
            commit.short_id,
            commit.author,
            commit.authored_at.to_rfc3339(),
            commit.message.trim(),
        ));

        if !commit.files.is_empty() {
            prompt.push_str("files:\n");
            for file in commit.files.iter().take(MAX_FILES_PER_COMMIT) {
                let marker = match file.kind {
                    ChangeKind::Added => "A",
                    ChangeKind::Modified => "M",
                    ChangeKind::Removed => "D",
                };
                prompt.push_str(&format!("  {marker} {} (+{} -{})\n", file.path, file.additions, file.deletions));
            }
            if commit.files.len() > MAX_FILES_PER_COMMIT {
                prompt.push_str(&format!(
                    "  ... and {} more files\n",
                    commit.files.len() - MAX_FILES_PER_COMMIT
                ));
            }
        }
    }

    prompt
}

/// Wrap a digest body with the repository header and commits-page footer.
pub fn render_digest(repo: &RepoId, body: &str) -> String {
    format!(
        "[{repo}] commit digest\n{}\n{}\n\nfull history: https://github.com/{repo}/commits",
        "-".repeat(30),
        body.trim(),
    )
}

/// Deterministic digest used when the model is unavailable: first few
/// commit subjects plus a count of the rest.
pub fn plain_digest(batch: &CommitBatch) -> String {
    let mut lines = Vec::new();

    for commit in batch.commits.iter().take(FALLBACK_COMMIT_LINES) {
        let subject = commit.message.lines().next().unwrap_or_default();
        let subject = if subject.chars().count() > 50 {
            let head: String = subject.chars().take(50).collect();
            format!("{head}...")
        } else {
            subject.to_string()
        };
        lines.push(format!("* {} - {subject}", commit.short_id));
    }

    if batch.len() > FALLBACK_COMMIT_LINES {
        lines.push(format!("... and {} more commits", batch.len() - FALLBACK_COMMIT_LINES));
    }

    render_digest(&batch.repo, &lines.join("\n"))
}

// ── OpenAI-compatible implementation ────────────────────────────────

pub struct OpenAiSummarizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiSummarizer {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, batch: &CommitBatch) -> Result<String, SummarizeError> {
        let prompt = build_prompt(batch);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            temperature: 0.7,
            max_tokens: 800,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| SummarizeError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            return Err(SummarizeError::Transport(format!(
                "unexpected status {}",
                response.status().as_u16()
            )));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|error| SummarizeError::InvalidResponse(error.to_string()))?;

        let body = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(SummarizeError::Empty);
        }

        Ok(render_digest(&batch.repo, trimmed))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use commitcast_common::types::{Commit, FileChange};

    use super::*;

    fn batch(commits: Vec<Commit>) -> CommitBatch {
        CommitBatch { repo: "acme/widgets".parse().unwrap(), commits }
    }

    fn commit(short_id: &str, message: &str, files: Vec<FileChange>) -> Commit {
        Commit {
            short_id: short_id.into(),
            full_id: format!("{short_id}000000000000000000000000000000000"),
            message: message.into(),
            author: "Jo Dev".into(),
            author_email: "jo@example.com".into(),
            authored_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            url: format!("https://github.com/acme/widgets/commit/{short_id}"),
            files,
        }
    }

    fn file(path: &str) -> FileChange {
        FileChange { path: path.into(), kind: ChangeKind::Modified, additions: 1, deletions: 1 }
    }

    #[test]
    fn prompt_lists_each_commit_once() {
        let commits = vec![
            commit("abc1234", "feat: add widget polling", vec![file("src/poll.rs")]),
            commit("def5678", "fix: off-by-one in window", vec![]),
        ];
        let prompt = build_prompt(&batch(commits));

        assert!(prompt.contains("Repository: acme/widgets"));
        assert!(prompt.contains("Commits (2):"));
        assert!(prompt.contains("id: abc1234"));
        assert!(prompt.contains("id: def5678"));
        assert!(prompt.contains("M src/poll.rs (+1 -1)"));
    }

    #[test]
    fn prompt_elides_files_beyond_the_cap() {
        let files: Vec<FileChange> = (0..8).map(|i| file(&format!("src/f{i}.rs"))).collect();
        let prompt = build_prompt(&batch(vec![commit("abc1234", "big change", files)]));

        assert!(prompt.contains("M src/f4.rs"));
        assert!(!prompt.contains("src/f5.rs"));
        assert!(prompt.contains("... and 3 more files"));
    }

    #[test]
    fn digest_wraps_body_with_header_and_footer() {
        let repo: RepoId = "acme/widgets".parse().unwrap();
        let digest = render_digest(&repo, "  two fixes landed  ");
        assert!(digest.starts_with("[acme/widgets] commit digest\n"));
        assert!(digest.contains("two fixes landed"));
        assert!(digest.ends_with("https://github.com/acme/widgets/commits"));
    }

    #[test]
    fn plain_digest_truncates_long_subjects_and_counts_the_rest() {
        let commits = vec![
            commit("aaaa111", &format!("fix: {}", "x".repeat(80)), vec![]),
            commit("bbbb222", "second\n\nbody text ignored", vec![]),
            commit("cccc333", "third", vec![]),
            commit("dddd444", "fourth", vec![]),
            commit("eeee555", "fifth", vec![]),
        ];
        let digest = plain_digest(&batch(commits));

        assert!(digest.contains("* aaaa111 - fix:"));
        assert!(digest.contains("..."));
        assert!(digest.contains("* bbbb222 - second"));
        assert!(!digest.contains("body text"));
        assert!(digest.contains("... and 2 more commits"));
        assert!(!digest.contains("dddd444"));
    }

    #[test]
    fn plain_digest_with_few_commits_has_no_tail() {
        let digest = plain_digest(&batch(vec![commit("aaaa111", "only one", vec![])]));
        assert!(digest.contains("* aaaa111 - only one"));
        assert!(!digest.contains("more commits"));
    }
}
