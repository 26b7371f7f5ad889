// End-to-end sync flow over the public API: scheduler → syncer →
// collaborators → checkpoint store, with a file-backed database that
// survives a simulated restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;

use commitcast_common::types::{Commit, CommitBatch, RepoId, SyncOutcome};
use commitcast_daemon::relay::{Notifier, NotifyError};
use commitcast_daemon::runtime::Scheduler;
use commitcast_daemon::source::{CommitSource, SourceError};
use commitcast_daemon::store::CheckpointStore;
use commitcast_daemon::summarize::{SummarizeError, Summarizer};
use commitcast_daemon::sync::Syncer;

fn repo(s: &str) -> RepoId {
    s.parse().unwrap()
}

fn commit(short_id: &str, secs: i64) -> Commit {
    Commit {
        short_id: short_id.into(),
        full_id: format!("{short_id}-full"),
        message: format!("change {short_id}"),
        author: "Jo Dev".into(),
        author_email: "jo@example.com".into(),
        authored_at: Utc.timestamp_opt(secs, 0).unwrap(),
        url: String::new(),
        files: Vec::new(),
    }
}

/// Source backed by a shared table of commits; `fetch` filters on
/// `since` the way the real API does.
#[derive(Clone, Default)]
struct TableSource {
    commits: Arc<Mutex<HashMap<RepoId, Vec<Commit>>>>,
}

impl TableSource {
    fn add(&self, repo: &RepoId, commit: Commit) {
        self.commits.lock().unwrap().entry(repo.clone()).or_default().push(commit);
    }
}

impl CommitSource for TableSource {
    async fn fetch(
        &self,
        repo: &RepoId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Commit>, SourceError> {
        let commits = self.commits.lock().unwrap();
        let all = commits.get(repo).cloned().unwrap_or_default();
        Ok(match since {
            Some(since) => all.into_iter().filter(|c| c.authored_at > since).collect(),
            None => all,
        })
    }
}

struct CountingSummarizer;

impl Summarizer for CountingSummarizer {
    async fn summarize(&self, batch: &CommitBatch) -> Result<String, SummarizeError> {
        Ok(format!("{}: {} commits", batch.repo, batch.len()))
    }
}

#[derive(Clone, Default)]
struct SwitchableNotifier {
    down: Arc<AtomicBool>,
    delivered: Arc<Mutex<Vec<String>>>,
}

impl Notifier for SwitchableNotifier {
    async fn deliver(&self, text: &str) -> Result<(), NotifyError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("relay offline".into()));
        }
        self.delivered.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn batches_survive_an_outage_and_a_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("checkpoints.db");
    let id = repo("acme/widgets");

    let source = TableSource::default();
    let notifier = SwitchableNotifier::default();
    // Old commit, outside any realistic window once a checkpoint exists.
    source.add(&id, commit("aaa", 1_000));

    // First process lifetime: relay down, nothing recorded.
    {
        let syncer = Syncer::new(
            CheckpointStore::open(&db_path).unwrap(),
            source.clone(),
            CountingSummarizer,
            notifier.clone(),
        );
        notifier.down.store(true, Ordering::SeqCst);
        syncer.sync(&id).await.unwrap_err();
        assert!(syncer.checkpoint(&id).unwrap().is_none());

        // Relay recovers; the same window is delivered.
        notifier.down.store(false, Ordering::SeqCst);
        let outcome = syncer.sync(&id).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Delivered { commits: 1 });
    }

    // Restart: checkpoint is durable, the old commit is not re-delivered.
    let syncer = Syncer::new(
        CheckpointStore::open(&db_path).unwrap(),
        source.clone(),
        CountingSummarizer,
        notifier.clone(),
    );
    let outcome = syncer.sync(&id).await.unwrap();
    assert_eq!(outcome, SyncOutcome::NoNewCommits);
    assert_eq!(notifier.delivered.lock().unwrap().len(), 1);

    // A commit newer than the checkpoint shows up next cycle.
    source.add(&id, commit("bbb", Utc::now().timestamp() + 3600));
    let outcome = syncer.sync(&id).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Delivered { commits: 1 });
    assert_eq!(
        notifier.delivered.lock().unwrap().last().unwrap(),
        "acme/widgets: 1 commits"
    );
}

#[tokio::test]
async fn scheduler_cycle_processes_repos_in_configured_order() {
    let a = repo("acme/widgets");
    let b = repo("acme/gadgets");
    let source = TableSource::default();
    source.add(&a, commit("aaa", 1_000));
    source.add(&b, commit("bbb", 2_000));
    let notifier = SwitchableNotifier::default();

    let syncer = Arc::new(Syncer::new(
        CheckpointStore::open_in_memory().unwrap(),
        source,
        CountingSummarizer,
        notifier.clone(),
    ));
    let scheduler = Scheduler::new(
        syncer,
        vec![a.clone(), b.clone()],
        Duration::from_secs(300),
        Duration::from_secs(600),
    );

    let (_tx, shutdown) = watch::channel(false);
    let report = scheduler.run_cycle(&shutdown).await;

    let repos: Vec<&RepoId> = report.outcomes.iter().map(|(repo, _)| repo).collect();
    assert_eq!(repos, vec![&a, &b]);
    assert_eq!(
        *notifier.delivered.lock().unwrap(),
        vec!["acme/widgets: 1 commits".to_string(), "acme/gadgets: 1 commits".to_string()]
    );
}
