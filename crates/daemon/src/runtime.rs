// Scheduler loop: drives the syncer across all configured repositories
// on a fixed cadence.
//
// One repository failing never aborts the rest of the cycle; its error
// is logged and the loop moves on. A panic escaping a repository's sync
// (a programming error, not an external failure) is caught at the task
// boundary and the loop pauses for the longer error cooldown instead of
// the normal interval. Shutdown is honored between repositories and
// between cycles, never by aborting an in-flight call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use commitcast_common::error::{SyncError, SyncStage};
use commitcast_common::types::{RepoId, SyncOutcome};

use crate::relay::Notifier;
use crate::source::CommitSource;
use crate::summarize::Summarizer;
use crate::sync::Syncer;

pub struct Scheduler<S, A, N> {
    syncer: Arc<Syncer<S, A, N>>,
    repos: Vec<RepoId>,
    poll_interval: Duration,
    error_cooldown: Duration,
}

/// Outcomes of one full pass over the repository list.
pub struct CycleReport {
    pub outcomes: Vec<(RepoId, Result<SyncOutcome, SyncError>)>,
    /// A sync panicked; the loop should back off before the next cycle.
    pub unexpected_error: bool,
}

impl<S, A, N> Scheduler<S, A, N>
where
    S: CommitSource + Send + Sync + 'static,
    A: Summarizer + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(
        syncer: Arc<Syncer<S, A, N>>,
        repos: Vec<RepoId>,
        poll_interval: Duration,
        error_cooldown: Duration,
    ) -> Self {
        Self { syncer, repos, poll_interval, error_cooldown }
    }

    /// Poll until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            repos = self.repos.len(),
            interval_sec = self.poll_interval.as_secs(),
            "scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_cycle(&shutdown).await;
            let pause = if report.unexpected_error {
                warn!(
                    cooldown_sec = self.error_cooldown.as_secs(),
                    "cycle hit an unexpected error, backing off"
                );
                self.error_cooldown
            } else {
                self.poll_interval
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// One pass over the configured repositories, in order. Stops early
    /// only on shutdown; repository failures are recorded and skipped.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let mut outcomes = Vec::with_capacity(self.repos.len());
        let mut unexpected_error = false;

        for repo in &self.repos {
            if *shutdown.borrow() {
                break;
            }

            let syncer = self.syncer.clone();
            let id = repo.clone();
            let task = tokio::spawn(async move { syncer.sync(&id).await });

            match task.await {
                Ok(result) => {
                    log_sync_result(repo, &result);
                    outcomes.push((repo.clone(), result));
                }
                Err(join_error) => {
                    // Only a panic inside sync lands here.
                    error!(repo = %repo, error = %join_error, "sync panicked");
                    unexpected_error = true;
                }
            }
        }

        CycleReport { outcomes, unexpected_error }
    }
}

fn log_sync_result(repo: &RepoId, result: &Result<SyncOutcome, SyncError>) {
    match result {
        Ok(SyncOutcome::NoNewCommits) => {
            info!(repo = %repo, "no new commits");
        }
        Ok(SyncOutcome::Delivered { commits }) => {
            info!(repo = %repo, commits, "digest delivered");
        }
        Err(error) if error.stage() == SyncStage::Persist => {
            // The window was processed but not recorded; it repeats next
            // cycle. The error names the access that failed, so a
            // delivered digest that may be re-sent is identifiable.
            error!(repo = %repo, stage = error.stage().as_str(), error = %error,
                "checkpoint not recorded, window repeats next cycle");
        }
        Err(error) => {
            warn!(repo = %repo, stage = error.stage().as_str(), error = %error,
                "sync failed, will retry next cycle");
        }
    }
}
