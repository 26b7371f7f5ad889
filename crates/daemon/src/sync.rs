// Sync orchestrator: one attempt for one repository.
//
// Pipeline per attempt: read checkpoint, fetch commits newer than it,
// summarize, deliver, then advance the checkpoint. The checkpoint moves
// to the time recorded just before the fetch (not completion time, which
// would skip commits landing mid-cycle) and only after delivery has
// succeeded — an empty window also advances so a quiet repo is not
// re-fetched from the same point forever. A failed stage leaves the
// checkpoint where it was, so the same window is retried next cycle
// (at-least-once delivery).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{info, warn};

use commitcast_common::error::SyncError;
use commitcast_common::types::{CommitBatch, RepoId, SyncOutcome};

use crate::relay::Notifier;
use crate::source::CommitSource;
use crate::store::CheckpointStore;
use crate::summarize::{plain_digest, Summarizer};

pub struct Syncer<S, A, N> {
    store: Mutex<CheckpointStore>,
    source: S,
    summarizer: A,
    notifier: N,
    /// Use the deterministic digest when the model fails instead of
    /// failing the window.
    fallback_digest: bool,
    /// Per-repository exclusion: the loop and a manual trigger must not
    /// sync the same repository concurrently.
    repo_locks: Mutex<HashMap<RepoId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: CommitSource, A: Summarizer, N: Notifier> Syncer<S, A, N> {
    pub fn new(store: CheckpointStore, source: S, summarizer: A, notifier: N) -> Self {
        Self {
            store: Mutex::new(store),
            source,
            summarizer,
            notifier,
            fallback_digest: true,
            repo_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_fallback_digest(mut self, enabled: bool) -> Self {
        self.fallback_digest = enabled;
        self
    }

    fn repo_lock(&self, repo: &RepoId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.repo_locks.lock().expect("repo lock map poisoned");
        locks.entry(repo.clone()).or_default().clone()
    }

    /// Run exactly one sync attempt for `repo`.
    pub async fn sync(&self, repo: &RepoId) -> Result<SyncOutcome, SyncError> {
        let lock = self.repo_lock(repo);
        let _guard = lock.lock().await;

        let checkpoint = self
            .store
            .lock()
            .expect("checkpoint store lock poisoned")
            .get(repo)
            .map_err(|error| SyncError::Persist(format!("reading checkpoint: {error:#}")))?;
        let since = checkpoint.as_ref().map(|c| c.last_synced_at);

        // Recorded before the fetch; commits landing during the fetch
        // stay inside the next window.
        let fetch_started_at = Utc::now();

        let commits = self
            .source
            .fetch(repo, since)
            .await
            .map_err(|error| SyncError::Source(error.to_string()))?;

        if commits.is_empty() {
            let previous_commit_id =
                checkpoint.as_ref().and_then(|c| c.last_commit_id.clone());
            self.store
                .lock()
                .expect("checkpoint store lock poisoned")
                .set(repo, fetch_started_at, previous_commit_id.as_deref())
                .map_err(|error| {
                    SyncError::Persist(format!("after empty window: {error:#}"))
                })?;
            return Ok(SyncOutcome::NoNewCommits);
        }

        info!(repo = %repo, commits = commits.len(), "new commits found");

        let batch = CommitBatch { repo: repo.clone(), commits };
        let digest = match self.summarizer.summarize(&batch).await {
            Ok(text) => text,
            Err(error) if self.fallback_digest => {
                warn!(repo = %repo, error = %error, "model digest failed, using plain digest");
                plain_digest(&batch)
            }
            Err(error) => return Err(SyncError::Summarize(error.to_string())),
        };

        self.notifier
            .deliver(&digest)
            .await
            .map_err(|error| SyncError::Notify(error.to_string()))?;

        let newest_commit_id = batch
            .commits
            .iter()
            .max_by_key(|commit| commit.authored_at)
            .map(|commit| commit.full_id.clone());

        self.store
            .lock()
            .expect("checkpoint store lock poisoned")
            .set(repo, fetch_started_at, newest_commit_id.as_deref())
            .map_err(|error| SyncError::Persist(format!("after delivery: {error:#}")))?;

        Ok(SyncOutcome::Delivered { commits: batch.len() })
    }

    /// Dry run for one repository: fetch a recent window, produce the
    /// digest text, touch nothing. Used by `commitcast test`.
    pub async fn preview(&self, repo: &RepoId, limit: usize) -> Result<String, SyncError> {
        let mut commits = self
            .source
            .fetch(repo, None)
            .await
            .map_err(|error| SyncError::Source(error.to_string()))?;
        commits.truncate(limit);

        if commits.is_empty() {
            return Err(SyncError::Source("no commits found in the recent window".into()));
        }

        let batch = CommitBatch { repo: repo.clone(), commits };
        match self.summarizer.summarize(&batch).await {
            Ok(text) => Ok(text),
            Err(error) if self.fallback_digest => {
                warn!(repo = %repo, error = %error, "model digest failed, using plain digest");
                Ok(plain_digest(&batch))
            }
            Err(error) => Err(SyncError::Summarize(error.to_string())),
        }
    }

    /// Read-only checkpoint access for status reporting.
    pub fn checkpoint(
        &self,
        repo: &RepoId,
    ) -> anyhow::Result<Option<commitcast_common::types::Checkpoint>> {
        self.store.lock().expect("checkpoint store lock poisoned").get(repo)
    }
}
